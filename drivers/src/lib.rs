//! GPIO Character-Device Subsystem
//!
//! This crate binds GPIO-backed peripherals (LEDs, beepers, keys) to
//! character-device nodes with a layered architecture:
//!
//! # Module Organization
//!
//! - [`hal`]: Platform-independent trait definitions
//! - [`platform`]: Platform-specific backends (SoC level and the virtual board)
//! - [`line`]: Owned handle to one GPIO line
//! - [`of`]: Device-description lookup
//! - [`binder`]: Device-description node to [`line::HardwareLine`] binding
//! - [`device_manager`]: Device identifiers, classes and `/dev` nodes
//! - [`chrdev`]: Peripheral lifecycle, access control, alarms and commands
//! - [`peripheral`]: Ready-made configurations for the board peripherals
//!
//! # Design Principles
//!
//! 1. **Separation of Concerns**: Platform code is separate from device logic
//! 2. **Explicit Ownership**: Every acquired resource has exactly one owner
//! 3. **Ordered Teardown**: Resources are released in reverse acquisition order
//! 4. **Interrupt Safety**: State shared with alarm callbacks sits behind IRQ-safe locks
//!
//! # Usage Example
//!
//! ```no_run
//! use drivers::chrdev::{ActivationContext, PeripheralInstance};
//! use drivers::device_manager::DeviceRegistry;
//! use drivers::peripheral;
//! use drivers::platform::virt::VirtualBoard;
//!
//! let board = VirtualBoard::new();
//! let tree = peripheral::board_tree();
//! let registry = DeviceRegistry::new();
//! let ctx = ActivationContext::new(&tree, board.board(), &registry);
//!
//! let mut led = PeripheralInstance::activate(peripheral::gpio_led(), &ctx).unwrap();
//! let file = registry.open("/dev/gpioled").unwrap();
//! file.write(&[1]).unwrap();
//! drop(file);
//! led.deactivate();
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod binder;
pub mod chrdev;
pub mod device_manager;
pub mod hal;
pub mod line;
pub mod of;
pub mod peripheral;
pub mod platform;

// Re-export commonly used types
pub use hal::gpio::{GpioController, PinLevel};
pub use hal::timer::{AlarmSource, AlarmTimer};
pub use line::HardwareLine;
