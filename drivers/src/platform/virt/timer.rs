//! Virtual alarm clock.
//!
//! Time only moves when a test calls [`VirtualClock::advance_ms`]; due
//! alarms then fire in deadline order on the calling thread, which plays
//! the role of the timer interrupt.

use crate::hal::timer::{AlarmSource, AlarmTimer, TimerError, TimerHandler};
use alloc::sync::Arc;
use alloc::vec::Vec;
use common::sync::IrqSpinLock;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

struct Pending {
    deadline_ms: u64,
    token: u64,
    handler: Arc<dyn TimerHandler>,
}

#[derive(Default)]
struct Channel {
    claimed: bool,
    pending: Option<Pending>,
}

struct ClockState {
    now_ms: AtomicU64,
    fired: AtomicUsize,
    channels: IrqSpinLock<Vec<Channel>>,
}

/// Host-side timer with a fixed number of compare channels.
#[derive(Clone)]
pub struct VirtualClock {
    state: Arc<ClockState>,
}

impl VirtualClock {
    /// Create a clock at time zero with `channels` compare channels.
    pub fn new(channels: usize) -> Self {
        Self {
            state: Arc::new(ClockState {
                now_ms: AtomicU64::new(0),
                fired: AtomicUsize::new(0),
                channels: IrqSpinLock::new((0..channels).map(|_| Channel::default()).collect()),
            }),
        }
    }

    /// Current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.state.now_ms.load(Ordering::Acquire)
    }

    /// Move time forward by `ms`, firing every alarm that falls due.
    ///
    /// Handlers run without the channel table locked, so they may program
    /// their channel again; a re-armed alarm that is still inside the
    /// window fires in the same call.
    pub fn advance_ms(&self, ms: u64) {
        let target = self.now_ms() + ms;
        loop {
            let due = {
                let mut channels = self.state.channels.lock();
                channels
                    .iter_mut()
                    .filter(|c| matches!(&c.pending, Some(p) if p.deadline_ms <= target))
                    .min_by_key(|c| c.pending.as_ref().map_or(u64::MAX, |p| p.deadline_ms))
                    .and_then(|c| c.pending.take())
            };
            let Some(due) = due else {
                break;
            };
            self.state.now_ms.fetch_max(due.deadline_ms, Ordering::AcqRel);
            self.state.fired.fetch_add(1, Ordering::Relaxed);
            due.handler.expire(due.token);
        }
        self.state.now_ms.fetch_max(target, Ordering::AcqRel);
    }

    /// Number of expiries delivered so far.
    pub fn fired(&self) -> usize {
        self.state.fired.load(Ordering::Relaxed)
    }

    /// Number of channels with a pending expiry.
    pub fn pending(&self) -> usize {
        self.state
            .channels
            .lock()
            .iter()
            .filter(|c| c.pending.is_some())
            .count()
    }

    /// Number of channels currently claimed.
    pub fn claimed(&self) -> usize {
        self.state.channels.lock().iter().filter(|c| c.claimed).count()
    }
}

impl AlarmSource for VirtualClock {
    fn claim(&self) -> Result<Arc<dyn AlarmTimer>, TimerError> {
        let mut channels = self.state.channels.lock();
        let index = channels
            .iter()
            .position(|c| !c.claimed)
            .ok_or(TimerError::NoFreeChannel)?;
        channels[index].claimed = true;
        Ok(Arc::new(VirtualAlarm {
            state: Arc::clone(&self.state),
            index,
        }))
    }
}

/// One claimed channel of a [`VirtualClock`].
struct VirtualAlarm {
    state: Arc<ClockState>,
    index: usize,
}

impl AlarmTimer for VirtualAlarm {
    fn now_ms(&self) -> u64 {
        self.state.now_ms.load(Ordering::Acquire)
    }

    fn program(&self, deadline_ms: u64, token: u64, handler: Arc<dyn TimerHandler>) {
        self.state.channels.lock()[self.index].pending = Some(Pending {
            deadline_ms,
            token,
            handler,
        });
    }

    fn cancel(&self) {
        self.state.channels.lock()[self.index].pending = None;
    }
}

impl Drop for VirtualAlarm {
    fn drop(&mut self) {
        let pending = {
            let mut channels = self.state.channels.lock();
            let channel = &mut channels[self.index];
            channel.claimed = false;
            channel.pending.take()
        };
        // The handler may hold the last reference to its owner.
        drop(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u64, u64)>>,
        clock: Mutex<Option<Arc<dyn AlarmTimer>>>,
    }

    impl TimerHandler for Recorder {
        fn expire(&self, token: u64) {
            let now = self.clock.lock().unwrap().as_ref().map_or(0, |c| c.now_ms());
            self.seen.lock().unwrap().push((token, now));
        }
    }

    #[test]
    fn fires_due_alarms_in_deadline_order() {
        let clock = VirtualClock::new(2);
        let a = clock.claim().unwrap();
        let b = clock.claim().unwrap();
        let rec = Arc::new(Recorder::default());
        *rec.clock.lock().unwrap() = Some(a.clone());

        a.program(30, 1, rec.clone());
        b.program(10, 2, rec.clone());
        clock.advance_ms(20);
        assert_eq!(*rec.seen.lock().unwrap(), vec![(2, 10)]);

        clock.advance_ms(20);
        assert_eq!(*rec.seen.lock().unwrap(), vec![(2, 10), (1, 30)]);
        assert_eq!(clock.now_ms(), 40);
        assert_eq!(clock.fired(), 2);
    }

    #[test]
    fn cancelled_alarm_does_not_fire() {
        let clock = VirtualClock::new(1);
        let a = clock.claim().unwrap();
        let rec = Arc::new(Recorder::default());
        a.program(5, 1, rec.clone());
        a.cancel();
        clock.advance_ms(10);
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn channels_return_to_pool_on_drop() {
        let clock = VirtualClock::new(1);
        let a = clock.claim().unwrap();
        assert_eq!(clock.claim().err(), Some(TimerError::NoFreeChannel));
        a.program(5, 1, Arc::new(Recorder::default()));
        drop(a);
        assert_eq!(clock.pending(), 0);
        assert!(clock.claim().is_ok());
    }
}
