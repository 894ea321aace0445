use super::scheduler::{ScheduleState, TickPolicy};
use crate::binder::LineMode;
use core::num::NonZeroU32;

/// What `read` reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// Pure outputs: every read returns zero bytes.
    NoData,
    /// A native-endian `i32`: `active` when the line is asserted, else `inactive`.
    Level { active: i32, inactive: i32 },
}

/// How many handles may be open at once.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    Unrestricted,
    Shared(NonZeroU32),
    Exclusive,
}

impl AccessPolicy {
    /// Maximum number of concurrent holders, `None` for no limit.
    pub const fn limit(self) -> Option<NonZeroU32> {
        match self {
            AccessPolicy::Unrestricted => None,
            AccessPolicy::Shared(n) => Some(n),
            AccessPolicy::Exclusive => Some(NonZeroU32::MIN),
        }
    }
}

/// Periodic driver settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub period_ms: NonZeroU32,
    /// Whether the scheduler is armed as part of activation.
    pub initial_state: ScheduleState,
    pub policy: TickPolicy,
}

/// Default period of the periodic drivers.
pub const DEFAULT_PERIOD_MS: NonZeroU32 = match NonZeroU32::new(500) {
    Some(p) => p,
    None => unreachable!(),
};

impl SchedulerConfig {
    /// Toggle an output every `period_ms`, armed at activation.
    pub const fn toggle(period_ms: NonZeroU32) -> Self {
        Self {
            period_ms,
            initial_state: ScheduleState::Armed,
            policy: TickPolicy::Toggle,
        }
    }

    /// Sample an input every `period_ms`, armed at activation.
    pub const fn sample(period_ms: NonZeroU32) -> Self {
        Self {
            period_ms,
            initial_state: ScheduleState::Armed,
            policy: TickPolicy::Sample,
        }
    }

    /// Same settings, but left stopped until a `Start` command.
    pub const fn stopped(self) -> Self {
        Self {
            initial_state: ScheduleState::Stopped,
            ..self
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::toggle(DEFAULT_PERIOD_MS)
    }
}

/// Everything needed to activate one peripheral.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Device name; the node appears as `/dev/<name>`.
    pub name: &'static str,
    /// Class the node is grouped under.
    pub class: &'static str,
    /// Minor numbers to reserve.
    pub minors: u32,
    /// Fixed major, or `None` for a dynamic one.
    pub major: Option<u32>,
    /// Device-description node path.
    pub of_path: &'static str,
    /// Line-reference property on that node.
    pub gpio_property: &'static str,
    pub gpio_index: usize,
    pub line_mode: LineMode,
    pub read: ReadMode,
    pub access: AccessPolicy,
    pub scheduler: Option<SchedulerConfig>,
}

impl PeripheralConfig {
    /// Output device at `of_path` with sensible defaults: one dynamic
    /// minor, class named after the device, unrestricted access, no reads.
    pub const fn output(name: &'static str, of_path: &'static str, gpio_property: &'static str) -> Self {
        Self {
            name,
            class: name,
            minors: 1,
            major: None,
            of_path,
            gpio_property,
            gpio_index: 0,
            line_mode: LineMode::Output { initial_active: false },
            read: ReadMode::NoData,
            access: AccessPolicy::Unrestricted,
            scheduler: None,
        }
    }

    /// Input device reporting `active` / `inactive` on read.
    pub const fn input(
        name: &'static str,
        of_path: &'static str,
        gpio_property: &'static str,
        active: i32,
        inactive: i32,
    ) -> Self {
        Self {
            line_mode: LineMode::Input,
            read: ReadMode::Level { active, inactive },
            ..Self::output(name, of_path, gpio_property)
        }
    }

    pub const fn with_name(self, name: &'static str) -> Self {
        Self { name, class: name, ..self }
    }

    pub const fn with_major(self, major: u32) -> Self {
        Self {
            major: Some(major),
            ..self
        }
    }

    pub const fn with_property(self, gpio_property: &'static str) -> Self {
        Self { gpio_property, ..self }
    }

    pub const fn with_access(self, access: AccessPolicy) -> Self {
        Self { access, ..self }
    }

    pub const fn with_read(self, read: ReadMode) -> Self {
        Self { read, ..self }
    }

    pub const fn with_scheduler(self, scheduler: SchedulerConfig) -> Self {
        Self {
            scheduler: Some(scheduler),
            ..self
        }
    }

    /// Drive an output active right after activation.
    pub const fn initially_active(self, initial_active: bool) -> Self {
        match self.line_mode {
            LineMode::Output { .. } => Self {
                line_mode: LineMode::Output { initial_active },
                ..self
            },
            LineMode::Input => self,
        }
    }
}
