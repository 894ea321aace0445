//! Out-of-band device commands.
//!
//! Command codes use the Linux `ioctl` number layout so existing user
//! programs can drive the device unchanged.

use super::file::{FileError, UserBuffer};
use super::scheduler::EventScheduler;
use core::num::NonZeroU32;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;

const fn ioc(dir: u32, ty: u8, nr: u8, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT) | ((ty as u32) << IOC_TYPESHIFT) | ((nr as u32) << IOC_NRSHIFT) | (size << IOC_SIZESHIFT)
}

/// `_IO(ty, nr)`
pub const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

/// `_IOW(ty, nr, T)` for a `size`-byte argument.
pub const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_WRITE, ty, nr, size as u32)
}

/// Magic byte of the timer command set.
pub const TIMER_MAGIC: u8 = 0xEF;

/// Stop the periodic driver.
pub const CLOSE_CMD: u32 = io(TIMER_MAGIC, 0x1);
/// Start the periodic driver.
pub const OPEN_CMD: u32 = io(TIMER_MAGIC, 0x2);
/// Set the period in milliseconds; argument is an `i32`.
pub const SETPERIOD_CMD: u32 = iow(TIMER_MAGIC, 0x3, core::mem::size_of::<i32>());

/// A decoded command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Start,
    SetPeriod(i32),
}

impl Command {
    /// Decode `cmd`, copying in its argument. Unknown codes yield `None`.
    ///
    /// # Errors
    ///
    /// [`FileError::TransferFault`] if a `SetPeriod` argument is not a
    /// readable 4-byte value.
    pub fn decode(cmd: u32, arg: UserBuffer<'_>) -> Result<Option<Self>, FileError> {
        Ok(match cmd {
            CLOSE_CMD => Some(Command::Stop),
            OPEN_CMD => Some(Command::Start),
            SETPERIOD_CMD => Some(Command::SetPeriod(arg.read_i32()?)),
            _ => None,
        })
    }

    /// The `ioctl` number for this command.
    pub const fn code(self) -> u32 {
        match self {
            Command::Stop => CLOSE_CMD,
            Command::Start => OPEN_CMD,
            Command::SetPeriod(_) => SETPERIOD_CMD,
        }
    }
}

/// Applies commands to a device's scheduler.
pub struct CommandDispatcher<'a> {
    scheduler: Option<&'a EventScheduler>,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(scheduler: Option<&'a EventScheduler>) -> Self {
        Self { scheduler }
    }

    /// Decode and apply a raw command. Unknown codes succeed without effect.
    pub fn handle(&self, cmd: u32, arg: UserBuffer<'_>) -> Result<(), FileError> {
        match Command::decode(cmd, arg)? {
            Some(command) => self.dispatch(command),
            None => {
                log::debug!("ignoring unknown command {:#x}", cmd);
                Ok(())
            }
        }
    }

    /// Apply a decoded command.
    ///
    /// # Errors
    ///
    /// [`FileError::InvalidArgument`] for a non-positive period, which
    /// leaves the stored period unchanged, and [`FileError::NotSupported`]
    /// on devices without a scheduler.
    pub fn dispatch(&self, command: Command) -> Result<(), FileError> {
        let scheduler = self.scheduler.ok_or(FileError::NotSupported)?;
        log::debug!("command {:?}", command);
        match command {
            Command::Stop => scheduler.disarm(),
            Command::Start => scheduler.start(),
            Command::SetPeriod(ms) => {
                let period = u32::try_from(ms)
                    .ok()
                    .and_then(NonZeroU32::new)
                    .ok_or(FileError::InvalidArgument)?;
                scheduler.set_period(period);
            }
        }
        Ok(())
    }
}
