use super::access::AccessController;
use super::command::CommandDispatcher;
use super::config::{PeripheralConfig, ReadMode};
use super::file::{FileError, FileOperations, UserBuffer};
use super::scheduler::{EventScheduler, LineCell, ScheduleState, TickPolicy};
use super::teardown::Teardown;
use crate::binder::{BindError, LineRequest, ResourceBinder};
use crate::device_manager::{DevT, DeviceRegistry, RegistryError};
use crate::hal::timer::TimerError;
use crate::of::DeviceTree;
use crate::platform::Board;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use common::sync::IrqSpinLock;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

/// Activation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    Registry(RegistryError),
    Binding(BindError),
    Timer(TimerError),
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::Registry(e) => write!(f, "registration failed: {e}"),
            ActivationError::Binding(e) => write!(f, "binding failed: {e}"),
            ActivationError::Timer(e) => write!(f, "timer setup failed: {e}"),
        }
    }
}

impl From<RegistryError> for ActivationError {
    fn from(e: RegistryError) -> Self {
        ActivationError::Registry(e)
    }
}

impl From<BindError> for ActivationError {
    fn from(e: BindError) -> Self {
        ActivationError::Binding(e)
    }
}

impl From<TimerError> for ActivationError {
    fn from(e: TimerError) -> Self {
        ActivationError::Timer(e)
    }
}

/// Services a peripheral is activated against.
#[derive(Clone)]
pub struct ActivationContext<'r> {
    pub tree: &'r DeviceTree,
    pub board: Board,
    pub registry: &'r DeviceRegistry,
}

impl<'r> ActivationContext<'r> {
    pub fn new(tree: &'r DeviceTree, board: Board, registry: &'r DeviceRegistry) -> Self {
        Self { tree, board, registry }
    }
}

/// State shared between the instance, its open handles and its alarm.
struct Device {
    name: &'static str,
    devt: DevT,
    line: Arc<LineCell>,
    access: AccessController,
    scheduler: IrqSpinLock<Option<Arc<EventScheduler>>>,
    read: ReadMode,
    sample: AtomicBool,
}

impl Device {
    fn scheduler(&self) -> Option<Arc<EventScheduler>> {
        self.scheduler.lock().clone()
    }

    fn stop_scheduler(&self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.disarm();
        }
    }

    /// Shut the scheduler down for good; handles cloned earlier can no
    /// longer re-arm it.
    fn release_alarm(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
        }
    }

    fn release_line(&self) {
        let line = self.line.lock().take();
        if let Some(line) = line {
            if line.is_output() {
                let _ = line.set_active(false);
            }
        }
    }

    fn current_sample(&self) -> Result<bool, FileError> {
        let sampled = self
            .scheduler()
            .filter(|s| s.policy() == TickPolicy::Sample)
            .and_then(|s| s.latest_sample());
        let active = match sampled {
            Some(active) => active,
            None => self
                .line
                .lock()
                .as_ref()
                .map(|line| line.is_active())
                .ok_or(FileError::NoDevice)?,
        };
        self.sample.store(active, Ordering::Relaxed);
        Ok(active)
    }
}

impl FileOperations for Device {
    fn open(&self) -> Result<(), FileError> {
        self.access.acquire().inspect_err(|_| {
            log::debug!("{}: busy", self.name);
        })
    }

    fn release(&self) {
        self.access.release();
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, FileError> {
        let (active, inactive) = match self.read {
            ReadMode::NoData => return Ok(0),
            ReadMode::Level { active, inactive } => (active, inactive),
        };
        let out = buf.get_mut(..4).ok_or(FileError::TransferFault)?;
        let value = if self.current_sample()? { active } else { inactive };
        out.copy_from_slice(&value.to_ne_bytes());
        Ok(4)
    }

    fn write(&self, buf: &[u8]) -> Result<usize, FileError> {
        let active = match buf {
            [0] => false,
            [1] => true,
            _ => return Err(FileError::InvalidArgument),
        };
        let line = self.line.lock();
        let line = line.as_ref().ok_or(FileError::NoDevice)?;
        line.set_active(active).map_err(|_| FileError::NotSupported)?;
        Ok(1)
    }

    fn ioctl(&self, cmd: u32, arg: UserBuffer<'_>) -> Result<(), FileError> {
        let scheduler = self.scheduler();
        CommandDispatcher::new(scheduler.as_deref()).handle(cmd, arg)
    }
}

/// An activated peripheral.
///
/// Owns everything acquired during activation and gives it back, in
/// reverse order, on [`deactivate`](Self::deactivate) or drop.
pub struct PeripheralInstance<'r> {
    device: Arc<Device>,
    path: String,
    teardown: Teardown<'r>,
}

impl<'r> PeripheralInstance<'r> {
    /// Acquire identifier, node, line and (optionally) alarm for `config`.
    ///
    /// A failure at any step releases what the earlier steps acquired
    /// before the error is returned.
    pub fn activate(config: PeripheralConfig, ctx: &ActivationContext<'r>) -> Result<Self, ActivationError> {
        let name = config.name;
        let registry = ctx.registry;
        let mut teardown = Teardown::new();

        let devt = registry
            .allocate(name, config.minors, config.major)
            .inspect_err(|e| log::warn!("{}: identifier allocation failed: {}", name, e))?;
        let minors = config.minors;
        teardown.push("free identifier", move || registry.free(devt, minors));

        let device = Arc::new(Device {
            name,
            devt,
            line: Arc::new(IrqSpinLock::new(None)),
            access: AccessController::new(config.access.limit()),
            scheduler: IrqSpinLock::new(None),
            read: config.read,
            sample: AtomicBool::new(false),
        });

        let class = config.class;
        registry
            .publish(devt, name, class, device.clone())
            .inspect_err(|e| log::warn!("{}: node creation failed: {}", name, e))?;
        teardown.push("retract node", move || registry.retract(name, class));

        let binder = ResourceBinder::new(ctx.tree, ctx.board.gpio.clone());
        let line = binder
            .bind(&LineRequest {
                path: config.of_path,
                property: config.gpio_property,
                index: config.gpio_index,
                label: name,
                mode: config.line_mode,
            })
            .inspect_err(|e| log::warn!("{}: line binding failed: {}", name, e))?;
        *device.line.lock() = Some(line);
        let d = device.clone();
        teardown.push("release line", move || d.release_line());

        if let Some(sc) = config.scheduler {
            let alarm = ctx
                .board
                .timers
                .claim()
                .inspect_err(|e| log::warn!("{}: alarm claim failed: {}", name, e))?;
            let scheduler = EventScheduler::new(alarm, device.line.clone(), sc.period_ms, sc.policy);
            *device.scheduler.lock() = Some(scheduler.clone());
            let d = device.clone();
            teardown.push("release alarm", move || d.release_alarm());

            if sc.initial_state == ScheduleState::Armed {
                scheduler.start();
            }
            let d = device.clone();
            teardown.push("stop scheduler", move || d.stop_scheduler());
        }

        let path = format!("/dev/{name}");
        log::info!("{}: activated as {} ({})", name, path, devt);
        Ok(Self {
            device,
            path,
            teardown,
        })
    }

    /// Release everything in reverse acquisition order. Later calls do nothing.
    pub fn deactivate(&mut self) {
        if self.teardown.is_empty() {
            return;
        }
        self.teardown.run();
        log::info!("{}: deactivated", self.device.name);
    }

    pub fn name(&self) -> &'static str {
        self.device.name
    }

    pub fn devt(&self) -> DevT {
        self.device.devt
    }

    /// Path of the published node.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a line is currently held.
    pub fn is_bound(&self) -> bool {
        self.device.line.lock().is_some()
    }

    /// Handles currently open.
    pub fn access_count(&self) -> u32 {
        self.device.access.count()
    }

    pub fn scheduler(&self) -> Option<Arc<EventScheduler>> {
        self.device.scheduler()
    }

    /// State of the periodic driver; `Stopped` when there is none, including
    /// after deactivation.
    pub fn schedule_state(&self) -> ScheduleState {
        self.scheduler()
            .map_or(ScheduleState::Stopped, |s| s.state())
    }

    /// Last level observed by a read.
    pub fn last_sample(&self) -> bool {
        self.device.sample.load(Ordering::Relaxed)
    }
}

impl Drop for PeripheralInstance<'_> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for PeripheralInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralInstance")
            .field("name", &self.device.name)
            .field("devt", &self.device.devt)
            .field("bound", &self.is_bound())
            .finish()
    }
}
