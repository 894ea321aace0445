//! Virtual GPIO bank.
//!
//! Lines behave like push-pull outputs or inputs with an optional pull
//! resistor. Inputs can be wired to another line (loopback) or driven from
//! outside the bank, and any access to a line that is not currently
//! requested is counted as a fault instead of touching the line.

use crate::hal::gpio::{GpioController, GpioError, PinLevel, PullMode};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use common::sync::IrqSpinLock;
use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct VirtualLine {
    owner: Option<String>,
    output: bool,
    driven: PinLevel,
    pull: PullMode,
    external: Option<PinLevel>,
    wired_from: Option<u32>,
    reject_config: bool,
}

impl VirtualLine {
    const fn idle() -> Self {
        Self {
            owner: None,
            output: false,
            driven: PinLevel::Low,
            pull: PullMode::None,
            external: None,
            wired_from: None,
            reject_config: false,
        }
    }
}

/// Host-side GPIO controller.
pub struct VirtualGpio {
    lines: IrqSpinLock<Vec<VirtualLine>>,
    faults: AtomicUsize,
}

impl VirtualGpio {
    /// Create a bank of `count` idle lines.
    pub fn new(count: u32) -> Self {
        Self {
            lines: IrqSpinLock::new((0..count).map(|_| VirtualLine::idle()).collect()),
            faults: AtomicUsize::new(0),
        }
    }

    /// Feed `dst` from `src`: while `dst` is an input it reads what `src` outputs.
    pub fn wire(&self, src: u32, dst: u32) {
        if let Some(line) = self.lines.lock().get_mut(dst as usize) {
            line.wired_from = Some(src);
        }
    }

    /// Drive an input from outside the bank; `None` lets it float back to its pull.
    pub fn drive_external(&self, line: u32, level: impl Into<Option<PinLevel>>) {
        if let Some(l) = self.lines.lock().get_mut(line as usize) {
            l.external = level.into();
        }
    }

    /// Make every direction change on `line` fail.
    pub fn reject_direction(&self, line: u32, reject: bool) {
        if let Some(l) = self.lines.lock().get_mut(line as usize) {
            l.reject_config = reject;
        }
    }

    /// Label of the current owner.
    pub fn owner(&self, line: u32) -> Option<String> {
        self.lines.lock().get(line as usize).and_then(|l| l.owner.clone())
    }

    /// Whether `line` is currently requested.
    pub fn is_requested(&self, line: u32) -> bool {
        self.owner(line).is_some()
    }

    /// Number of lines currently requested.
    pub fn requested_count(&self) -> usize {
        self.lines.lock().iter().filter(|l| l.owner.is_some()).count()
    }

    /// Level an output line is driving, `None` for inputs.
    pub fn driven_level(&self, line: u32) -> Option<PinLevel> {
        self.lines
            .lock()
            .get(line as usize)
            .filter(|l| l.output)
            .map(|l| l.driven)
    }

    /// Accesses made to lines nobody owned at the time.
    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }

    fn fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    fn sense(lines: &[VirtualLine], line: u32) -> PinLevel {
        let l = &lines[line as usize];
        if l.output {
            return l.driven;
        }
        if let Some(level) = l.external {
            return level;
        }
        if let Some(src) = l.wired_from.and_then(|s| lines.get(s as usize)) {
            if src.output {
                return src.driven;
            }
        }
        match l.pull {
            PullMode::Up => PinLevel::High,
            PullMode::Down | PullMode::None => PinLevel::Low,
        }
    }

    fn configure(&self, line: u32, f: impl FnOnce(&mut VirtualLine)) -> Result<(), GpioError> {
        let mut lines = self.lines.lock();
        let l = lines.get_mut(line as usize).ok_or(GpioError::InvalidPin)?;
        if l.owner.is_none() {
            return Err(GpioError::NotRequested);
        }
        if l.reject_config {
            return Err(GpioError::Rejected);
        }
        f(l);
        Ok(())
    }
}

impl GpioController for VirtualGpio {
    fn name(&self) -> &'static str {
        "virt-gpio"
    }

    fn request(&self, line: u32, label: &str) -> Result<(), GpioError> {
        let mut lines = self.lines.lock();
        let l = lines.get_mut(line as usize).ok_or(GpioError::InvalidPin)?;
        if l.owner.is_some() {
            return Err(GpioError::Busy);
        }
        l.owner = Some(label.to_string());
        Ok(())
    }

    fn free(&self, line: u32) {
        if let Some(l) = self.lines.lock().get_mut(line as usize) {
            l.owner = None;
            l.output = false;
            l.pull = PullMode::None;
        }
    }

    fn direction_input(&self, line: u32, pull: PullMode) -> Result<(), GpioError> {
        self.configure(line, |l| {
            l.output = false;
            l.pull = pull;
        })
    }

    fn direction_output(&self, line: u32, level: PinLevel) -> Result<(), GpioError> {
        self.configure(line, |l| {
            l.driven = level;
            l.output = true;
        })
    }

    fn set_level(&self, line: u32, level: PinLevel) {
        let mut lines = self.lines.lock();
        match lines.get_mut(line as usize) {
            Some(l) if l.owner.is_some() && l.output => l.driven = level,
            _ => self.fault(),
        }
    }

    fn level(&self, line: u32) -> PinLevel {
        let lines = self.lines.lock();
        match lines.get(line as usize) {
            Some(l) if l.owner.is_some() => Self::sense(&lines, line),
            _ => {
                self.fault();
                PinLevel::Low
            }
        }
    }
}
