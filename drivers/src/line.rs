//! Owned handle to one digital I/O line.
//!
//! A [`HardwareLine`] is obtained by requesting a line from a
//! [`GpioController`]; dropping it returns the line to the controller.
//! Drivers speak in logical terms (active / inactive) and the handle maps
//! those onto physical levels through the line's [`GpioFlags`].

use crate::hal::gpio::{GpioController, GpioError, InputPin, OutputPin, PinLevel, PullMode, StatefulOutputPin};
use crate::of::GpioFlags;
use alloc::sync::Arc;
use core::fmt;

/// Direction a line is currently configured for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineDirection {
    /// Requested but not configured yet.
    Unconfigured,
    Input,
    Output,
}

/// An exclusively owned GPIO line.
pub struct HardwareLine {
    chip: Arc<dyn GpioController>,
    line: u32,
    flags: GpioFlags,
    direction: LineDirection,
}

impl HardwareLine {
    /// Request exclusive ownership of `line` on `chip`.
    ///
    /// # Errors
    ///
    /// Whatever the controller reports: [`GpioError::InvalidPin`] or
    /// [`GpioError::Busy`].
    pub fn request(
        chip: Arc<dyn GpioController>,
        line: u32,
        label: &str,
        flags: GpioFlags,
    ) -> Result<Self, GpioError> {
        chip.request(line, label)?;
        log::debug!("{}: line {} requested by {}", chip.name(), line, label);
        Ok(Self {
            chip,
            line,
            flags,
            direction: LineDirection::Unconfigured,
        })
    }

    /// Line number on the owning controller.
    pub fn id(&self) -> u32 {
        self.line
    }

    /// Flags the line was requested with.
    pub fn flags(&self) -> GpioFlags {
        self.flags
    }

    /// Current direction.
    pub fn direction(&self) -> LineDirection {
        self.direction
    }

    /// Whether the line is configured as an output.
    pub fn is_output(&self) -> bool {
        self.direction == LineDirection::Output
    }

    /// Configure as input, with the pull resistor taken from the flags.
    pub fn configure_input(&mut self) -> Result<(), GpioError> {
        let pull = if self.flags.contains(GpioFlags::PULL_UP) {
            PullMode::Up
        } else if self.flags.contains(GpioFlags::PULL_DOWN) {
            PullMode::Down
        } else {
            PullMode::None
        };
        self.chip.direction_input(self.line, pull)?;
        self.direction = LineDirection::Input;
        Ok(())
    }

    /// Configure as output, starting at the given logical state.
    pub fn configure_output(&mut self, active: bool) -> Result<(), GpioError> {
        self.chip.direction_output(self.line, self.physical(active))?;
        self.direction = LineDirection::Output;
        Ok(())
    }

    /// Drive the logical state of an output line.
    pub fn set_active(&self, active: bool) -> Result<(), GpioError> {
        if !self.is_output() {
            return Err(GpioError::NotOutput);
        }
        self.chip.set_level(self.line, self.physical(active));
        Ok(())
    }

    /// Logical state of the line.
    pub fn is_active(&self) -> bool {
        self.logical(self.chip.level(self.line))
    }

    fn physical(&self, active: bool) -> PinLevel {
        let level = PinLevel::from(active);
        if self.flags.contains(GpioFlags::ACTIVE_LOW) {
            level.inverted()
        } else {
            level
        }
    }

    fn logical(&self, level: PinLevel) -> bool {
        let active: bool = level.into();
        active != self.flags.contains(GpioFlags::ACTIVE_LOW)
    }
}

impl Drop for HardwareLine {
    fn drop(&mut self) {
        self.chip.free(self.line);
        log::debug!("{}: line {} released", self.chip.name(), self.line);
    }
}

impl fmt::Debug for HardwareLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareLine")
            .field("chip", &self.chip.name())
            .field("line", &self.line)
            .field("flags", &self.flags)
            .field("direction", &self.direction)
            .finish()
    }
}

impl InputPin for HardwareLine {
    type Error = GpioError;

    fn read(&self) -> Result<PinLevel, Self::Error> {
        Ok(self.chip.level(self.line))
    }
}

impl OutputPin for HardwareLine {
    type Error = GpioError;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_level(PinLevel::High)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_level(PinLevel::Low)
    }

    fn set_level(&mut self, level: PinLevel) -> Result<(), Self::Error> {
        if !self.is_output() {
            return Err(GpioError::NotOutput);
        }
        self.chip.set_level(self.line, level);
        Ok(())
    }
}

impl StatefulOutputPin for HardwareLine {
    fn output_level(&self) -> Result<PinLevel, Self::Error> {
        Ok(self.chip.level(self.line))
    }
}
