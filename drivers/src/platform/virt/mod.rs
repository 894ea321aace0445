//! Virtual board.
//!
//! A GPIO bank and a timer that live entirely in memory, used for host
//! builds and tests. The bank is sized for five 32-line banks so the
//! reference device tree resolves unchanged.

mod gpio;
mod timer;

pub use gpio::VirtualGpio;
pub use timer::VirtualClock;

use super::{Board, Platform};
use alloc::sync::Arc;
use spin::Once;

/// Lines on the virtual GPIO bank.
pub const VIRT_GPIO_LINES: u32 = 160;

/// Compare channels on the virtual timer.
pub const VIRT_TIMER_CHANNELS: usize = 4;

/// In-memory board with inspection hooks.
#[derive(Clone)]
pub struct VirtualBoard {
    /// GPIO bank, for wiring and fault inspection.
    pub gpio: Arc<VirtualGpio>,
    /// Timer, advanced by hand.
    pub clock: VirtualClock,
}

impl VirtualBoard {
    pub fn new() -> Self {
        Self::with_channels(VIRT_TIMER_CHANNELS)
    }

    /// Board whose timer has only `channels` compare channels.
    pub fn with_channels(channels: usize) -> Self {
        Self {
            gpio: Arc::new(VirtualGpio::new(VIRT_GPIO_LINES)),
            clock: VirtualClock::new(channels),
        }
    }

    /// Trait-object view handed to drivers.
    pub fn board(&self) -> Board {
        Board {
            gpio: self.gpio.clone(),
            timers: Arc::new(self.clock.clone()),
        }
    }
}

impl Default for VirtualBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform backed by a process-wide [`VirtualBoard`].
pub struct VirtualPlatform;

static BOARD: Once<VirtualBoard> = Once::new();

impl VirtualPlatform {
    /// The shared board, for inspection.
    pub fn virtual_board() -> &'static VirtualBoard {
        BOARD.call_once(VirtualBoard::new)
    }
}

impl Platform for VirtualPlatform {
    fn name() -> &'static str {
        "Virtual board"
    }

    fn board() -> Board {
        Self::virtual_board().board()
    }
}
