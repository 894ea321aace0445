use crate::sync::irq::IrqControl;

const CPSR_I_BIT: u32 = 1 << 7;

/// IRQ masking through the CPSR I bit.
///
/// `State` records whether IRQs were enabled before `disable()`, so nested
/// critical sections only re-enable on the outermost exit.
///
/// - `mrs {0}, cpsr`: snapshot CPSR
/// - `cpsid i`: mask IRQs
/// - `cpsie i`: unmask IRQs
#[derive(Debug)]
pub struct ArmIrq;

impl IrqControl for ArmIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let cpsr: u32;
        // SAFETY: reading CPSR and masking IRQs has no memory effects.
        unsafe {
            core::arch::asm!(
                "mrs {0}, cpsr",
                "cpsid i",
                out(reg) cpsr,
                options(nomem, nostack)
            );
        }
        cpsr & CPSR_I_BIT == 0
    }

    #[inline(always)]
    fn restore(prev_enabled: bool) {
        if prev_enabled {
            // SAFETY: only re-enables IRQs that were enabled on entry.
            unsafe {
                core::arch::asm!("cpsie i", options(nomem, nostack));
            }
        }
    }
}
