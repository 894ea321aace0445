mod gpio;
mod timer;

pub use gpio::Bcm2835Gpio;
pub use timer::{Bcm2835Timer, Channel};

use super::{Board, Platform};
use alloc::sync::Arc;
use spin::Once;

pub const PERIPHERAL_BASE: usize = 0x2000_0000;

pub struct Bcm2835Platform;

// ============================================================================
// Internal Platform State (not exposed)
// ============================================================================

/// GPIO controller instance (private)
static GPIO: Once<Arc<Bcm2835Gpio>> = Once::new();

/// System timer instance (private)
static TIMER: Once<Arc<Bcm2835Timer>> = Once::new();

impl Platform for Bcm2835Platform {
    fn name() -> &'static str {
        "BCM2835 (Raspberry Pi 1/Zero)"
    }

    fn board() -> Board {
        // SAFETY: the peripheral window is identity-mapped before drivers
        // run, and `Once` guarantees a single instance of each controller.
        let gpio = GPIO.call_once(|| Arc::new(unsafe { Bcm2835Gpio::new() }));
        let timer = TIMER.call_once(|| Arc::new(unsafe { Bcm2835Timer::new() }));
        Board {
            gpio: gpio.clone(),
            timers: timer.clone(),
        }
    }
}

impl Bcm2835Platform {
    /// System-timer interrupt entry; route compare-match IRQs here.
    pub fn timer_irq(channel: Channel) {
        Bcm2835Timer::handle_irq(channel);
    }
}
