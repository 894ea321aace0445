use super::file::FileError;
use common::sync::IrqSpinLock;
use core::num::NonZeroU32;

/// Open-count gate for one device.
///
/// `acquire` never waits: at the limit it fails with
/// [`FileError::Busy`] immediately. The count lives behind an
/// [`IrqSpinLock`] so it can be inspected from alarm context.
pub struct AccessController {
    count: IrqSpinLock<u32>,
    limit: Option<NonZeroU32>,
}

impl AccessController {
    /// Gate admitting at most `limit` holders, or any number for `None`.
    pub const fn new(limit: Option<NonZeroU32>) -> Self {
        Self {
            count: IrqSpinLock::new(0),
            limit,
        }
    }

    /// Single-owner gate.
    pub const fn exclusive() -> Self {
        Self::new(Some(NonZeroU32::MIN))
    }

    pub fn acquire(&self) -> Result<(), FileError> {
        let mut count = self.count.lock();
        if self.limit.is_some_and(|limit| *count >= limit.get()) {
            return Err(FileError::Busy);
        }
        *count += 1;
        Ok(())
    }

    /// Drop one holder. Releasing a free gate is a no-op.
    pub fn release(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
    }

    /// Current number of holders.
    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    pub fn is_free(&self) -> bool {
        self.count() == 0
    }

    pub fn limit(&self) -> Option<NonZeroU32> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_gate_admits_one() {
        let gate = AccessController::exclusive();
        assert_eq!(gate.acquire(), Ok(()));
        assert_eq!(gate.acquire(), Err(FileError::Busy));
        gate.release();
        assert!(gate.is_free());
        assert_eq!(gate.acquire(), Ok(()));
    }

    #[test]
    fn release_never_goes_negative() {
        let gate = AccessController::exclusive();
        gate.release();
        gate.release();
        assert_eq!(gate.count(), 0);
        assert_eq!(gate.acquire(), Ok(()));
        assert_eq!(gate.acquire(), Err(FileError::Busy));
    }

    #[test]
    fn shared_gate_counts_to_limit() {
        let gate = AccessController::new(NonZeroU32::new(3));
        for _ in 0..3 {
            gate.acquire().unwrap();
        }
        assert_eq!(gate.acquire(), Err(FileError::Busy));
        assert_eq!(gate.count(), 3);
    }

    #[test]
    fn unrestricted_gate_never_busy() {
        let gate = AccessController::new(None);
        for _ in 0..100 {
            gate.acquire().unwrap();
        }
        assert_eq!(gate.count(), 100);
    }
}
