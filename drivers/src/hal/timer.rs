//! Timer Hardware Abstraction Layer.
//!
//! This module defines platform-independent traits for one-shot alarms.
//! A platform owns a free-running counter and a small number of compare
//! channels; each channel is handed out as an [`AlarmTimer`] that fires a
//! [`TimerHandler`] once, from interrupt context, when its deadline passes.

use alloc::sync::Arc;
use core::fmt;

/// Callback invoked when an alarm expires.
///
/// Runs in interrupt context: implementations must not block or sleep.
pub trait TimerHandler: Send + Sync {
    /// `token` is the value passed to [`AlarmTimer::program`], which lets
    /// the handler ignore expiries that were superseded after they fired.
    fn expire(&self, token: u64);
}

/// One compare channel of a hardware timer.
///
/// At most one expiry is pending per channel; programming a new deadline
/// replaces the previous one.
pub trait AlarmTimer: Send + Sync {
    /// Current time of the underlying free-running counter.
    fn now_ms(&self) -> u64;

    /// Fire `handler.expire(token)` once the counter reaches `deadline_ms`.
    fn program(&self, deadline_ms: u64, token: u64, handler: Arc<dyn TimerHandler>);

    /// Drop the pending expiry, if any.
    ///
    /// An expiry that is already executing is not interrupted; callers that
    /// need to wait for it synchronize through their own handler state.
    fn cancel(&self);
}

/// Source of alarm channels.
pub trait AlarmSource: Send + Sync {
    /// Claim a free compare channel. The channel returns to the pool when
    /// the last handle is dropped.
    fn claim(&self) -> Result<Arc<dyn AlarmTimer>, TimerError>;
}

/// Timer errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Every compare channel is already claimed.
    NoFreeChannel,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::NoFreeChannel => write!(f, "no free timer channel"),
        }
    }
}
