//! BCM2835 System Timer Driver
//!
//! The BCM2835 has a 64-bit free-running counter at 1MHz and
//! four compare channels that can generate interrupts. Channels 0 and 2
//! belong to the VideoCore; channels 1 and 3 are handed out as alarms.

use crate::hal::timer::{AlarmSource, AlarmTimer, TimerError, TimerHandler};
use alloc::sync::Arc;
use common::sync::IrqSpinLock;
use core::ptr::{read_volatile, write_volatile};

/// System timer base address.
pub const TIMER_BASE: usize = 0x2000_3000;

/// System timer compare channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Channel {
    Channel0 = 0,
    Channel1 = 1,
    Channel2 = 2,
    Channel3 = 3,
}

impl Channel {
    /// Get the IRQ number for this channel.
    pub fn irq_number(self) -> u32 {
        self as u32
    }

    fn bitmask(self) -> u32 {
        1 << (self as u32)
    }
}

/// Channels available to the ARM core, in claim order.
const ARM_CHANNELS: [Channel; 2] = [Channel::Channel1, Channel::Channel3];

/// Memory-mapped system timer registers.
#[repr(C)]
struct Registers {
    cs: u32,
    clo: u32,
    chi: u32,
    c: [u32; 4],
}

#[inline(always)]
fn regs() -> *mut Registers {
    TIMER_BASE as *mut Registers
}

// ============================================================================
// Raw Hardware Functions
// ============================================================================

/// Read the 64-bit free-running counter.
pub fn read_counter() -> u64 {
    // SAFETY: CLO/CHI are read-only counter registers.
    unsafe {
        // Read high word first for consistency
        let hi1 = read_volatile(&raw const (*regs()).chi);
        let lo = read_volatile(&raw const (*regs()).clo);
        let hi2 = read_volatile(&raw const (*regs()).chi);

        // If high word changed, re-read low word
        let (hi, lo) = if hi1 != hi2 {
            (hi2, read_volatile(&raw const (*regs()).clo))
        } else {
            (hi1, lo)
        };

        ((hi as u64) << 32) | (lo as u64)
    }
}

/// Program `channel` to match when the low counter word reaches `compare`.
pub fn set_compare(channel: Channel, compare: u32) {
    // SAFETY: writing CS acknowledges only this channel's match bit.
    unsafe {
        write_volatile(&raw mut (*regs()).cs, channel.bitmask());
        write_volatile(&raw mut (*regs()).c[channel as usize], compare);
    }
}

/// Clear a pending interrupt.
pub fn clear_interrupt(channel: Channel) {
    // SAFETY: writing CS acknowledges only this channel's match bit.
    unsafe {
        write_volatile(&raw mut (*regs()).cs, channel.bitmask());
    }
}

/// Check if an interrupt is pending.
pub fn is_pending(channel: Channel) -> bool {
    // SAFETY: CS is readable at any time.
    unsafe { read_volatile(&raw const (*regs()).cs) & channel.bitmask() != 0 }
}

// ============================================================================
// HAL Implementation
// ============================================================================

struct Slot {
    claimed: bool,
    armed: Option<(u64, Arc<dyn TimerHandler>)>,
}

impl Slot {
    const IDLE: Slot = Slot {
        claimed: false,
        armed: None,
    };
}

static SLOTS: IrqSpinLock<[Slot; 2]> = IrqSpinLock::new([Slot::IDLE, Slot::IDLE]);

/// BCM2835 system timer.
#[derive(Debug)]
pub struct Bcm2835Timer;

impl Bcm2835Timer {
    /// Create a new timer.
    ///
    /// # Safety
    ///
    /// Timer registers must be properly mapped.
    pub const unsafe fn new() -> Self {
        Self
    }

    /// Compare-match interrupt entry for `channel`.
    ///
    /// Acknowledges the match and runs the channel's handler, if one is
    /// armed. Called by the platform IRQ dispatcher.
    pub fn handle_irq(channel: Channel) {
        clear_interrupt(channel);
        let Some(index) = ARM_CHANNELS.iter().position(|&c| c == channel) else {
            return;
        };
        let armed = SLOTS.lock()[index].armed.take();
        if let Some((token, handler)) = armed {
            handler.expire(token);
        }
    }
}

impl AlarmSource for Bcm2835Timer {
    fn claim(&self) -> Result<Arc<dyn AlarmTimer>, TimerError> {
        let mut slots = SLOTS.lock();
        let index = slots
            .iter()
            .position(|s| !s.claimed)
            .ok_or(TimerError::NoFreeChannel)?;
        slots[index].claimed = true;
        Ok(Arc::new(Bcm2835Alarm { index }))
    }
}

/// One claimed compare channel.
struct Bcm2835Alarm {
    index: usize,
}

impl Bcm2835Alarm {
    fn channel(&self) -> Channel {
        ARM_CHANNELS[self.index]
    }
}

impl AlarmTimer for Bcm2835Alarm {
    fn now_ms(&self) -> u64 {
        read_counter() / 1000
    }

    fn program(&self, deadline_ms: u64, token: u64, handler: Arc<dyn TimerHandler>) {
        SLOTS.lock()[self.index].armed = Some((token, handler));
        // The compare register matches on the low 32 bits of the µs counter.
        set_compare(self.channel(), deadline_ms.wrapping_mul(1000) as u32);
    }

    fn cancel(&self) {
        SLOTS.lock()[self.index].armed = None;
        clear_interrupt(self.channel());
    }
}

impl Drop for Bcm2835Alarm {
    fn drop(&mut self) {
        let armed = {
            let mut slots = SLOTS.lock();
            slots[self.index].claimed = false;
            slots[self.index].armed.take()
        };
        clear_interrupt(self.channel());
        drop(armed);
    }
}
