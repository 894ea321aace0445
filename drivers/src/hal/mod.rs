//! Hardware Abstraction Layer (HAL) - Platform-Independent Traits
//!
//! These traits are implemented by the platform backends under
//! [`platform`](crate::platform) and consumed by the character-device
//! controller, so controller code never names a concrete SoC.
//!
//! # Available Interfaces
//!
//! - [`gpio`]: line ownership and digital I/O
//! - [`timer`]: one-shot alarms fired from interrupt context

pub mod gpio;
pub mod timer;
