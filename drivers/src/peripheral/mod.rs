//! Board Peripherals
//!
//! Ready-made configurations for the GPIO peripherals found on the
//! reference board, and the device tree describing where they are wired.
//!
//! # Available Peripherals
//!
//! - [`gpio_led`]: LED on `/gpioled`, any number of openers
//! - [`exclusive_led`]: the same LED, one opener at a time
//! - [`beep`]: beeper on `/beep`
//! - [`key`]: push button on `/key`
//! - [`timer_led`]: the LED toggled by a periodic alarm
//!
//! # Line Numbering
//!
//! [`board_tree`] numbers lines 32 per bank, as the reference board's
//! GPIO banks do, and the virtual board models that wiring. The BCM2835
//! only has lines 0 to 53, so the beeper (line 129) is rejected with
//! `LineInvalid` there; activate against a tree describing that board's
//! own wiring instead.

use crate::chrdev::config::{AccessPolicy, DEFAULT_PERIOD_MS, PeripheralConfig, SchedulerConfig};
use crate::of::{DeviceTree, GpioFlags, GpioSpec, Node, PropValue, string};
use alloc::vec;

/// Value `read` reports while the key is pressed.
pub const KEY_PRESSED: i32 = 0xF0;
/// Value `read` reports while the key is released.
pub const KEY_RELEASED: i32 = 0x00;

/// LED line: GPIO1_IO03, active low.
pub const LED_GPIO: GpioSpec = GpioSpec::banked(1, 3, GpioFlags::ACTIVE_LOW);
/// Beeper line: SNVS_TAMPER1 (GPIO5_IO01), active low.
pub const BEEP_GPIO: GpioSpec = GpioSpec::banked(5, 1, GpioFlags::ACTIVE_LOW);
/// Key line: UART1_CTS (GPIO1_IO18), pulled up, pressed pulls it low.
pub const KEY_GPIO: GpioSpec = GpioSpec::banked(
    1,
    18,
    GpioFlags::ACTIVE_LOW.union(GpioFlags::PULL_UP),
);

/// LED driven through writes, switched on at activation.
pub const fn gpio_led() -> PeripheralConfig {
    PeripheralConfig::output("gpioled", "/gpioled", "led-gpios").initially_active(true)
}

/// LED that only one handle may hold open.
pub const fn exclusive_led() -> PeripheralConfig {
    gpio_led().with_access(AccessPolicy::Exclusive)
}

/// Beeper driven through writes, sounding at activation.
pub const fn beep() -> PeripheralConfig {
    PeripheralConfig::output("beep", "/beep", "beep-gpios").initially_active(true)
}

/// Push button reporting [`KEY_PRESSED`] / [`KEY_RELEASED`].
pub const fn key() -> PeripheralConfig {
    PeripheralConfig::input("key", "/key", "key-gpios", KEY_PRESSED, KEY_RELEASED)
}

/// LED toggled every 500 ms from activation on, controlled by commands.
pub const fn timer_led() -> PeripheralConfig {
    PeripheralConfig::output("timer", "/gpioled", "led-gpios")
        .with_scheduler(SchedulerConfig::toggle(DEFAULT_PERIOD_MS))
}

fn gpio_node(compatible: &str, property: &str, spec: GpioSpec) -> Node {
    Node::new()
        .with("compatible", string(compatible))
        .with("status", string("okay"))
        .with(property, PropValue::Gpios(vec![spec]))
}

/// Device tree of the reference board.
pub fn board_tree() -> DeviceTree {
    DeviceTree::new()
        .with_node("/gpioled", gpio_node("alientek,led", "led-gpios", LED_GPIO))
        .with_node("/beep", gpio_node("alientek,beep", "beep-gpios", BEEP_GPIO))
        .with_node("/key", gpio_node("alientek,key", "key-gpios", KEY_GPIO))
}
