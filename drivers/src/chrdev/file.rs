use crate::device_manager::DevT;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

/// Errors returned to callers of a device node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileError {
    /// The device is held by another owner.
    Busy,
    /// Argument out of range or malformed.
    InvalidArgument,
    /// The caller's buffer could not be transferred.
    TransferFault,
    /// The device does not implement the operation.
    NotSupported,
    /// The device went away.
    NoDevice,
    /// No node at the given path.
    NotFound,
}

impl FileError {
    /// Linux errno value for this error.
    pub const fn errno(self) -> i32 {
        match self {
            FileError::Busy => 16,
            FileError::InvalidArgument => 22,
            FileError::TransferFault => 14,
            FileError::NotSupported => 25,
            FileError::NoDevice => 19,
            FileError::NotFound => 2,
        }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Busy => write!(f, "Device or resource busy"),
            FileError::InvalidArgument => write!(f, "Invalid argument"),
            FileError::TransferFault => write!(f, "Bad address"),
            FileError::NotSupported => write!(f, "Inappropriate ioctl for device"),
            FileError::NoDevice => write!(f, "No such device"),
            FileError::NotFound => write!(f, "No such file or directory"),
        }
    }
}

/// Argument memory passed with a command.
///
/// Models a user pointer: it is either readable with a known length or
/// unreadable altogether.
#[derive(Debug, Copy, Clone)]
pub struct UserBuffer<'a> {
    bytes: Option<&'a [u8]>,
}

impl<'a> UserBuffer<'a> {
    /// A buffer that cannot be read.
    pub const fn null() -> Self {
        Self { bytes: None }
    }

    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes: Some(bytes) }
    }

    /// Readable length, if readable at all.
    pub fn len(&self) -> Option<usize> {
        self.bytes.map(<[u8]>::len)
    }

    /// Copy a native-endian `i32` in.
    ///
    /// # Errors
    ///
    /// [`FileError::TransferFault`] unless exactly four bytes are readable.
    pub fn read_i32(&self) -> Result<i32, FileError> {
        let bytes = self.bytes.ok_or(FileError::TransferFault)?;
        let raw: [u8; 4] = bytes.try_into().map_err(|_| FileError::TransferFault)?;
        Ok(i32::from_ne_bytes(raw))
    }
}

impl<'a> From<&'a [u8]> for UserBuffer<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

/// Operations a character device implements.
///
/// Every method takes `&self`: one device serves all of its open handles.
pub trait FileOperations: Send + Sync {
    /// Called once per successful open, before the handle exists.
    fn open(&self) -> Result<(), FileError> {
        Ok(())
    }

    /// Called once when a handle is closed. Cannot fail.
    fn release(&self) {}

    /// Read into `buf`, returning the number of bytes produced.
    fn read(&self, _buf: &mut [u8]) -> Result<usize, FileError> {
        Err(FileError::NotSupported)
    }

    /// Consume `buf`, returning the number of bytes accepted.
    fn write(&self, _buf: &[u8]) -> Result<usize, FileError> {
        Err(FileError::NotSupported)
    }

    /// Out-of-band command.
    fn ioctl(&self, _cmd: u32, _arg: UserBuffer<'_>) -> Result<(), FileError> {
        Err(FileError::NotSupported)
    }
}

/// An open handle on a device node.
///
/// Dropping the handle closes it.
pub struct File {
    ops: Arc<dyn FileOperations>,
    devt: DevT,
    path: String,
    released: bool,
}

impl File {
    /// Open `ops` on behalf of a new handle.
    pub fn open(ops: Arc<dyn FileOperations>, devt: DevT, path: String) -> Result<Self, FileError> {
        ops.open()?;
        Ok(Self {
            ops,
            devt,
            path,
            released: false,
        })
    }

    /// Device number behind this handle.
    pub fn devt(&self) -> DevT {
        self.devt
    }

    /// Path the handle was opened through.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read from the device
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        self.ops.read(buf)
    }

    /// Write to the device
    pub fn write(&self, buf: &[u8]) -> Result<usize, FileError> {
        self.ops.write(buf)
    }

    /// Issue a command
    pub fn ioctl(&self, cmd: u32, arg: UserBuffer<'_>) -> Result<(), FileError> {
        self.ops.ioctl(cmd, arg)
    }

    /// Close the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ops.release();
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File {{ path: {}, devt: {} }}", self.path, self.devt)
    }
}
