//! Architecture-neutral kernel support shared by the driver crates.
//!
//! - [`sync`]: spin-style locks usable from interrupt context
//! - [`arch`]: per-architecture interrupt masking

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod sync;
