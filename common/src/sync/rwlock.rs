use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

const WRITER: usize = 1 << (usize::BITS - 1);

/// A spinning read-write lock for `no_std` environments.
///
/// Any number of readers, or a single writer. Readers and the writer share
/// one atomic word: the top bit marks the writer, the remaining bits count
/// readers, so admission is a single compare-exchange in both cases.
///
/// Meant for read-mostly tables (device nodes, identifier regions) that are
/// never touched from interrupt context.
///
/// # Type Parameters
///
/// * `T` - The type of data protected by the read-write lock.
pub struct RwLock<T> {
    state: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: readers hand out `&T` concurrently, hence the `Sync` bound.
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}
unsafe impl<T: Send> Send for RwLock<T> {}

impl<T> RwLock<T> {
    /// Creates a new `RwLock` wrapping the provided data.
    ///
    /// # Example
    ///
    /// ```
    /// use common::sync::RwLock;
    ///
    /// let lock = RwLock::new(0);
    /// assert_eq!(*lock.read(), 0);
    /// ```
    pub const fn new(data: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires shared access, spinning while a writer holds the lock.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        loop {
            let current = self.state.load(Ordering::Relaxed);
            if current & WRITER == 0
                && self
                    .state
                    .compare_exchange_weak(current, current + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return RwLockReadGuard { lock: self };
            }
            core::hint::spin_loop();
        }
    }

    /// Acquires exclusive access, spinning until no reader or writer remains.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        while self
            .state
            .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        RwLockWriteGuard { lock: self }
    }
}

/// Shared access to the data protected by a `RwLock`.
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> core::ops::Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: no writer can enter while a reader is counted.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

/// Exclusive access to the data protected by a `RwLock`.
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> core::ops::Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the writer bit excludes every other holder.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> core::ops::DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the writer bit excludes every other holder.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn readers_share_access() {
        let lock = RwLock::new(7);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 14);
    }

    #[test]
    fn writer_waits_for_readers() {
        let lock = Arc::new(RwLock::new(Vec::<u32>::new()));
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for i in 0..500 {
                        lock.write().push(n * 1000 + i);
                        let len = lock.read().len();
                        assert!(len >= 1);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(lock.read().len(), 2000);
    }
}
