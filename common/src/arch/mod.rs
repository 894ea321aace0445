//! Architecture selection.
//!
//! [`CurrentIrq`] is the interrupt-masking backend used by
//! [`IrqSpinLock`](crate::sync::IrqSpinLock) when no backend is named
//! explicitly.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        pub mod arm;
        pub type CurrentIrq = arm::irq::ArmIrq;
    } else {
        /// Hosted builds have no interrupt controller to mask.
        pub type CurrentIrq = crate::sync::irq::NoIrq;
    }
}
