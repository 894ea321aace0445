//! GPIO (General Purpose Input/Output) Hardware Abstraction Layer.
//!
//! This module defines platform-independent traits for GPIO control.
//! [`GpioController`] is implemented once per GPIO block and hands out
//! ownership of individual lines; the pin traits at the bottom describe what
//! a driver can do with a line it owns (see [`HardwareLine`](crate::line::HardwareLine)).

use core::fmt;

/// Pin logic level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinLevel {
    /// Logic low (0V or ground).
    Low,
    /// Logic high (VDD or 3.3V/5V depending on system).
    High,
}

impl PinLevel {
    /// The opposite level.
    pub const fn inverted(self) -> Self {
        match self {
            PinLevel::Low => PinLevel::High,
            PinLevel::High => PinLevel::Low,
        }
    }
}

impl From<bool> for PinLevel {
    fn from(value: bool) -> Self {
        if value {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

impl From<PinLevel> for bool {
    fn from(level: PinLevel) -> bool {
        matches!(level, PinLevel::High)
    }
}

/// Internal pull resistor configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PullMode {
    /// No pull resistor (high impedance).
    None,
    /// Enable internal pull-up resistor.
    Up,
    /// Enable internal pull-down resistor.
    Down,
}

/// GPIO errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GpioError {
    /// The line number does not exist on this controller.
    InvalidPin,
    /// Another owner already holds the line.
    Busy,
    /// The line was used without being requested first.
    NotRequested,
    /// The controller refused the requested configuration.
    Rejected,
    /// The operation needs an output line.
    NotOutput,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::InvalidPin => write!(f, "invalid GPIO line"),
            GpioError::Busy => write!(f, "GPIO line already requested"),
            GpioError::NotRequested => write!(f, "GPIO line not requested"),
            GpioError::Rejected => write!(f, "GPIO configuration rejected"),
            GpioError::NotOutput => write!(f, "GPIO line is not an output"),
        }
    }
}

/// GPIO controller trait.
///
/// A controller arbitrates ownership of its lines: a line must be
/// `request`ed before it is configured or driven, and `free`d afterwards.
/// All methods take `&self` because lines are driven from both process and
/// timer-interrupt context; implementations keep their own interior state
/// behind IRQ-safe locks or atomics.
pub trait GpioController: Send + Sync {
    /// Controller name for diagnostics.
    fn name(&self) -> &'static str;

    /// Claim exclusive ownership of `line` on behalf of `label`.
    ///
    /// # Errors
    ///
    /// [`GpioError::InvalidPin`] for lines outside the controller,
    /// [`GpioError::Busy`] if the line is already owned.
    fn request(&self, line: u32, label: &str) -> Result<(), GpioError>;

    /// Return ownership of `line`. Freeing an unowned line is a no-op.
    fn free(&self, line: u32);

    /// Configure `line` as an input with the given pull resistor.
    fn direction_input(&self, line: u32, pull: PullMode) -> Result<(), GpioError>;

    /// Configure `line` as an output, driving `level` before the switch.
    fn direction_output(&self, line: u32, level: PinLevel) -> Result<(), GpioError>;

    /// Drive an output line. The caller must own the line.
    fn set_level(&self, line: u32, level: PinLevel);

    /// Read the current level of a line. The caller must own the line.
    fn level(&self, line: u32) -> PinLevel;
}

/// Input pin trait.
///
/// This trait represents a GPIO pin configured as an input.
pub trait InputPin {
    /// Error type for read operations.
    type Error: fmt::Debug;

    /// Read the pin state.
    fn read(&self) -> Result<PinLevel, Self::Error>;

    /// Check if the pin is currently high.
    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.read()? == PinLevel::High)
    }

    /// Check if the pin is currently low.
    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(self.read()? == PinLevel::Low)
    }
}

/// Output pin trait.
///
/// This trait represents a GPIO pin configured as an output.
pub trait OutputPin {
    /// Error type for write operations.
    type Error: fmt::Debug;

    /// Set the pin to logic high.
    fn set_high(&mut self) -> Result<(), Self::Error>;

    /// Set the pin to logic low.
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Set the pin to a specific level.
    fn set_level(&mut self, level: PinLevel) -> Result<(), Self::Error> {
        match level {
            PinLevel::High => self.set_high(),
            PinLevel::Low => self.set_low(),
        }
    }
}

/// Stateful output pin that can be toggled.
pub trait StatefulOutputPin: OutputPin {
    /// Read back the current output state.
    fn output_level(&self) -> Result<PinLevel, Self::Error>;

    /// Toggle the output state.
    fn toggle(&mut self) -> Result<(), Self::Error> {
        let level = self.output_level()?;
        self.set_level(level.inverted())
    }
}
