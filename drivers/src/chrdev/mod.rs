//! Character-device lifecycle controller.
//!
//! A [`PeripheralInstance`] ties one GPIO line to one device node:
//!
//! - [`file`]: the node-facing operations and handle type
//! - [`access`]: open-count gating
//! - [`scheduler`]: alarm-driven toggling or sampling of the line
//! - [`command`]: out-of-band commands and their `ioctl` numbers
//! - [`teardown`]: reverse-order release of acquired resources
//! - [`config`]: per-peripheral settings
//!
//! Activation acquires, in order: identifier, node, line (requested and
//! configured), then an alarm channel when the peripheral has a periodic
//! driver. Deactivation releases the same resources in reverse.

pub mod access;
pub mod command;
pub mod config;
pub mod file;
mod instance;
pub mod scheduler;
pub mod teardown;

pub use access::AccessController;
pub use command::{Command, CommandDispatcher};
pub use config::{AccessPolicy, PeripheralConfig, ReadMode, SchedulerConfig};
pub use file::{File, FileError, FileOperations, UserBuffer};
pub use instance::{ActivationContext, ActivationError, PeripheralInstance};
pub use scheduler::{EventScheduler, ScheduleState, TickPolicy};
