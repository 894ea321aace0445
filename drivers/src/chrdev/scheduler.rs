//! Periodic line driver.
//!
//! An [`EventScheduler`] owns one alarm channel. While armed, every expiry
//! toggles or samples the device's line and programs the next expiry one
//! period after the current time. All state the expiry path reads sits in
//! one [`IrqSpinLock`] that the expiry holds for its whole body, so taking
//! that lock in [`disarm`](EventScheduler::disarm) or
//! [`shutdown`](EventScheduler::shutdown) waits out any expiry already
//! running.
//!
//! Lock order is scheduler state, then the line slot.

use crate::hal::timer::{AlarmTimer, TimerHandler};
use crate::line::HardwareLine;
use alloc::sync::{Arc, Weak};
use common::sync::IrqSpinLock;
use core::num::NonZeroU32;

/// Slot holding a device's line; empty before binding and after teardown.
pub type LineCell = IrqSpinLock<Option<HardwareLine>>;

/// Scheduler lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    Stopped,
    Armed,
    /// Alarm channel returned. Nothing arms the scheduler again.
    Shutdown,
}

/// What an expiry does to the line.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickPolicy {
    /// Alternate the output between active and inactive.
    Toggle,
    /// Record the input's logical level.
    Sample,
}

struct Schedule {
    state: ScheduleState,
    period_ms: NonZeroU32,
    /// Bumped on every arm/disarm; expiries carrying an older value are stale.
    token: u64,
    phase: bool,
    fired: u64,
    last_fire_ms: Option<u64>,
    sample: Option<bool>,
    /// Claimed channel, taken by `shutdown`.
    alarm: Option<Arc<dyn AlarmTimer>>,
}

impl Schedule {
    fn is_shutdown(&self) -> bool {
        self.state == ScheduleState::Shutdown
    }
}

pub struct EventScheduler {
    this: Weak<EventScheduler>,
    line: Arc<LineCell>,
    policy: TickPolicy,
    schedule: IrqSpinLock<Schedule>,
}

impl EventScheduler {
    /// Create a stopped scheduler driving `line` through `alarm`.
    pub fn new(
        alarm: Arc<dyn AlarmTimer>,
        line: Arc<LineCell>,
        period_ms: NonZeroU32,
        policy: TickPolicy,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            line,
            policy,
            schedule: IrqSpinLock::new(Schedule {
                state: ScheduleState::Stopped,
                period_ms,
                token: 0,
                phase: false,
                fired: 0,
                last_fire_ms: None,
                sample: None,
                alarm: Some(alarm),
            }),
        })
    }

    /// Arm with the stored period. Re-arming restarts the interval and
    /// resets the toggle phase. Does nothing after [`shutdown`](Self::shutdown).
    pub fn start(&self) {
        let mut s = self.schedule.lock();
        self.start_locked(&mut s);
    }

    /// Store `period_ms` and arm with it.
    pub fn arm(&self, period_ms: NonZeroU32) {
        let mut s = self.schedule.lock();
        if s.is_shutdown() {
            return;
        }
        s.period_ms = period_ms;
        self.start_locked(&mut s);
    }

    /// Stop firing. When this returns no expiry is running and none will
    /// touch the line until the next [`start`](Self::start).
    pub fn disarm(&self) {
        let mut s = self.schedule.lock();
        if !s.is_shutdown() {
            s.state = ScheduleState::Stopped;
        }
        s.token = s.token.wrapping_add(1);
        s.sample = None;
        if let Some(alarm) = s.alarm.as_ref() {
            alarm.cancel();
        }
    }

    /// Stop firing for good and give the alarm channel back.
    ///
    /// Later [`start`](Self::start), [`arm`](Self::arm) and
    /// [`set_period`](Self::set_period) calls are ignored, so handles that
    /// outlive the device cannot re-arm it.
    pub fn shutdown(&self) {
        let alarm = {
            let mut s = self.schedule.lock();
            s.state = ScheduleState::Shutdown;
            s.token = s.token.wrapping_add(1);
            s.sample = None;
            s.alarm.take()
        };
        if let Some(alarm) = alarm {
            alarm.cancel();
            log::debug!("scheduler: alarm channel released");
        }
    }

    /// Change the period. An armed scheduler restarts its interval from now.
    pub fn set_period(&self, period_ms: NonZeroU32) {
        let mut s = self.schedule.lock();
        if s.is_shutdown() {
            return;
        }
        s.period_ms = period_ms;
        if s.state == ScheduleState::Armed {
            self.rearm(&mut s);
        }
    }

    pub fn period_ms(&self) -> NonZeroU32 {
        self.schedule.lock().period_ms
    }

    pub fn state(&self) -> ScheduleState {
        self.schedule.lock().state
    }

    pub fn is_armed(&self) -> bool {
        self.state() == ScheduleState::Armed
    }

    pub fn policy(&self) -> TickPolicy {
        self.policy
    }

    /// Expiries handled since creation.
    pub fn fired(&self) -> u64 {
        self.schedule.lock().fired
    }

    /// Time of the most recent expiry.
    pub fn last_fire_ms(&self) -> Option<u64> {
        self.schedule.lock().last_fire_ms
    }

    /// Level recorded by the latest sampling expiry while armed.
    pub fn latest_sample(&self) -> Option<bool> {
        self.schedule.lock().sample
    }

    fn start_locked(&self, s: &mut Schedule) {
        if s.is_shutdown() {
            return;
        }
        s.state = ScheduleState::Armed;
        s.phase = false;
        self.rearm(s);
    }

    fn rearm(&self, s: &mut Schedule) {
        s.token = s.token.wrapping_add(1);
        let (Some(alarm), Some(handler)) = (s.alarm.as_ref(), self.this.upgrade()) else {
            return;
        };
        let deadline = alarm.now_ms() + u64::from(s.period_ms.get());
        alarm.program(deadline, s.token, handler);
    }
}

impl TimerHandler for EventScheduler {
    fn expire(&self, token: u64) {
        let mut s = self.schedule.lock();
        if s.state != ScheduleState::Armed || s.token != token {
            return;
        }

        let ticked = {
            let line = self.line.lock();
            match line.as_ref() {
                Some(line) => {
                    match self.policy {
                        TickPolicy::Toggle => {
                            s.phase = !s.phase;
                            let _ = line.set_active(s.phase);
                        }
                        TickPolicy::Sample => s.sample = Some(line.is_active()),
                    }
                    true
                }
                None => false,
            }
        };

        // No line left to drive: stay stopped instead of re-arming.
        if !ticked {
            s.state = ScheduleState::Stopped;
            s.token = s.token.wrapping_add(1);
            return;
        }

        s.fired += 1;
        s.last_fire_ms = s.alarm.as_ref().map(|a| a.now_ms());
        self.rearm(&mut s);
    }
}
