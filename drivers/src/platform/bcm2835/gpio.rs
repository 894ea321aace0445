//! BCM2835 GPIO Controller Driver
//!
//! This module provides both raw hardware access and the HAL
//! implementation for the BCM2835 GPIO controller.

use crate::hal::gpio::{GpioController, GpioError, PinLevel, PullMode};
use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{AtomicU64, Ordering};

/// GPIO base address.
pub const GPIO_BASE: usize = 0x2020_0000;

/// Highest GPIO line number.
pub const MAX_PIN: u32 = 53;

/// GPIO function selection.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Function {
    Input = 0b000,
    Output = 0b001,
}

/// Internal pull resistor configuration.
#[repr(u32)]
#[derive(Copy, Clone, Debug)]
pub enum Pull {
    Off = 0b00,
    Down = 0b01,
    Up = 0b10,
}

impl From<PullMode> for Pull {
    fn from(mode: PullMode) -> Self {
        match mode {
            PullMode::None => Pull::Off,
            PullMode::Up => Pull::Up,
            PullMode::Down => Pull::Down,
        }
    }
}

/// Memory-mapped register layout.
#[repr(C)]
struct Registers {
    gpfsel: [u32; 6],
    _r0: u32,
    gpset: [u32; 2],
    _r1: u32,
    gpclr: [u32; 2],
    _r2: u32,
    gplev: [u32; 2],
    _r3: u32,
    _events: [u32; 21],
    gppud: u32,
    gppudclk: [u32; 2],
}

#[inline(always)]
fn regs() -> *mut Registers {
    GPIO_BASE as *mut Registers
}

fn check_pin(pin: u32) -> Result<(), GpioError> {
    if pin <= MAX_PIN {
        Ok(())
    } else {
        Err(GpioError::InvalidPin)
    }
}

fn pin_reg_and_bit(pin: u32) -> (usize, u32) {
    let reg = (pin / 32) as usize;
    let bit = 1u32 << (pin % 32);
    (reg, bit)
}

fn delay_cycles(mut count: u32) {
    while count != 0 {
        // SAFETY: `nop` touches no memory, registers or flags.
        unsafe { core::arch::asm!("nop") };
        count -= 1;
    }
}

// ============================================================================
// Raw Hardware Functions
// ============================================================================

/// Set the function of a GPIO pin.
pub fn set_function(pin: u32, func: Function) -> Result<(), GpioError> {
    check_pin(pin)?;

    let reg = (pin / 10) as usize;
    let shift = (pin % 10) * 3;
    let mask = 0b111 << shift;

    // SAFETY: GPIO_BASE is the mapped GPIO block and `reg` is below 6.
    unsafe {
        let fsel = &raw mut (*regs()).gpfsel[reg];
        let val = read_volatile(fsel);
        let val = (val & !mask) | ((func as u32) << shift);
        write_volatile(fsel, val);
    }

    Ok(())
}

/// Drive a GPIO pin high.
pub fn set(pin: u32) -> Result<(), GpioError> {
    check_pin(pin)?;
    let (reg, bit) = pin_reg_and_bit(pin);

    // SAFETY: GPSETn is write-only; bits written as 0 have no effect.
    unsafe {
        write_volatile(&raw mut (*regs()).gpset[reg], bit);
    }

    Ok(())
}

/// Drive a GPIO pin low.
pub fn clear(pin: u32) -> Result<(), GpioError> {
    check_pin(pin)?;
    let (reg, bit) = pin_reg_and_bit(pin);

    // SAFETY: GPCLRn is write-only; bits written as 0 have no effect.
    unsafe {
        write_volatile(&raw mut (*regs()).gpclr[reg], bit);
    }

    Ok(())
}

/// Read the current logic level of a pin.
pub fn level(pin: u32) -> Result<PinLevel, GpioError> {
    check_pin(pin)?;
    let (reg, bit) = pin_reg_and_bit(pin);

    // SAFETY: GPLEVn is read-only.
    let val = unsafe { read_volatile(&raw const (*regs()).gplev[reg]) };
    Ok(PinLevel::from(val & bit != 0))
}

/// Configure the internal pull resistor.
pub fn set_pull(pin: u32, pull: Pull) -> Result<(), GpioError> {
    check_pin(pin)?;
    let (reg, bit) = pin_reg_and_bit(pin);

    // SAFETY: the GPPUD/GPPUDCLK sequence only latches into the clocked pin.
    unsafe {
        let gppud = &raw mut (*regs()).gppud;
        let clk = &raw mut (*regs()).gppudclk[reg];

        write_volatile(gppud, pull as u32);
        delay_cycles(150);

        write_volatile(clk, bit);
        delay_cycles(150);

        write_volatile(gppud, 0);
        write_volatile(clk, 0);
    }

    Ok(())
}

// ============================================================================
// HAL Implementation
// ============================================================================

/// BCM2835 GPIO controller.
///
/// Ownership of the 54 lines is tracked in one atomic bitmap so requests
/// can come from any core without a lock.
#[derive(Debug)]
pub struct Bcm2835Gpio {
    claimed: AtomicU64,
}

impl Bcm2835Gpio {
    /// Create a new GPIO controller.
    ///
    /// # Safety
    ///
    /// GPIO registers must be properly mapped, and only one controller may
    /// exist.
    pub const unsafe fn new() -> Self {
        Self {
            claimed: AtomicU64::new(0),
        }
    }

    fn is_claimed(&self, line: u32) -> bool {
        line <= MAX_PIN && self.claimed.load(Ordering::Acquire) & (1 << line) != 0
    }

    fn owned(&self, line: u32) -> Result<(), GpioError> {
        check_pin(line)?;
        if self.is_claimed(line) {
            Ok(())
        } else {
            Err(GpioError::NotRequested)
        }
    }
}

impl GpioController for Bcm2835Gpio {
    fn name(&self) -> &'static str {
        "bcm2835-gpio"
    }

    fn request(&self, line: u32, label: &str) -> Result<(), GpioError> {
        check_pin(line)?;
        let bit = 1u64 << line;
        if self.claimed.fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            return Err(GpioError::Busy);
        }
        log::debug!("bcm2835-gpio: line {} -> {}", line, label);
        Ok(())
    }

    fn free(&self, line: u32) {
        if line <= MAX_PIN {
            self.claimed.fetch_and(!(1u64 << line), Ordering::AcqRel);
        }
    }

    fn direction_input(&self, line: u32, pull: PullMode) -> Result<(), GpioError> {
        self.owned(line)?;
        set_function(line, Function::Input)?;
        set_pull(line, pull.into())
    }

    fn direction_output(&self, line: u32, level: PinLevel) -> Result<(), GpioError> {
        self.owned(line)?;
        match level {
            PinLevel::High => set(line)?,
            PinLevel::Low => clear(line)?,
        }
        set_function(line, Function::Output)
    }

    fn set_level(&self, line: u32, level: PinLevel) {
        if self.is_claimed(line) {
            let _ = match level {
                PinLevel::High => set(line),
                PinLevel::Low => clear(line),
            };
        }
    }

    fn level(&self, line: u32) -> PinLevel {
        level(line).unwrap_or(PinLevel::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Only the bookkeeping is exercised here: register access needs the
    // real peripheral window.
    #[test]
    fn ownership_bitmap() {
        let gpio = unsafe { Bcm2835Gpio::new() };
        assert_eq!(gpio.request(54, "x"), Err(GpioError::InvalidPin));
        assert_eq!(gpio.request(17, "led"), Ok(()));
        assert_eq!(gpio.request(17, "led"), Err(GpioError::Busy));
        assert_eq!(gpio.owned(18), Err(GpioError::NotRequested));
        gpio.free(17);
        assert_eq!(gpio.owned(17), Err(GpioError::NotRequested));
        assert_eq!(gpio.request(53, "edge"), Ok(()));
    }
}
