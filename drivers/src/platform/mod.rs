//! Platform Abstraction Layer
//!
//! A platform supplies the two services the character-device controller
//! needs: a GPIO controller and a pool of alarm channels. Both are handed
//! out as trait objects bundled in a [`Board`].
//!
//! # Usage
//!
//! ```no_run
//! use drivers::platform::{CurrentPlatform, Platform};
//!
//! let board = CurrentPlatform::board();
//! println!("GPIO controller: {}", board.gpio.name());
//! ```

use crate::hal::gpio::GpioController;
use crate::hal::timer::AlarmSource;
use alloc::sync::Arc;

pub mod virt;

/// Services a platform exposes to device drivers.
#[derive(Clone)]
pub struct Board {
    /// GPIO controller owning every line on the board.
    pub gpio: Arc<dyn GpioController>,
    /// Alarm channels for periodic work.
    pub timers: Arc<dyn AlarmSource>,
}

/// Platform trait - implemented by each supported SoC
pub trait Platform {
    /// Platform name for debugging
    fn name() -> &'static str;

    /// Driver-facing services of this platform.
    ///
    /// The underlying controllers are created on first use and shared by
    /// every later call.
    fn board() -> Board;
}

// Platform selection based on Cargo features
cfg_if::cfg_if! {
    if #[cfg(feature = "bcm2835")] {
        pub mod bcm2835;
        pub use bcm2835::Bcm2835Platform as CurrentPlatform;
    } else {
        pub use virt::VirtualPlatform as CurrentPlatform;
    }
}
