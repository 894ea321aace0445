//! Device-description node to GPIO line binding.
//!
//! [`ResourceBinder::bind`] walks the four acquisition steps for a line:
//! node lookup, property lookup, line request and direction setup. A failed
//! step drops whatever the previous steps acquired before the error is
//! returned, so a failed bind never leaves a line claimed.

use crate::hal::gpio::{GpioController, GpioError};
use crate::line::HardwareLine;
use crate::of::{DeviceTree, OfError};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;

/// How the bound line is configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineMode {
    /// Input, pull resistor from the specifier flags.
    Input,
    /// Output starting at the given logical state.
    Output { initial_active: bool },
}

/// What to bind.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest<'a> {
    /// Absolute node path, e.g. `/gpioled`.
    pub path: &'a str,
    /// Line-reference property, e.g. `led-gpios`.
    pub property: &'a str,
    /// Entry within the property.
    pub index: usize,
    /// Owner label recorded by the controller.
    pub label: &'a str,
    pub mode: LineMode,
}

/// Binding errors. All of them are fatal to activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No node at the path, or the node is disabled.
    NodeNotFound(String),
    /// The node lacks the property or the requested entry.
    PropertyNotFound(String),
    /// The line is owned by someone else.
    LineBusy(u32),
    /// The controller does not know the line.
    LineInvalid(u32),
    /// The controller refused the direction setup.
    ConfigurationRejected(u32),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::NodeNotFound(path) => write!(f, "{path}: node not found"),
            BindError::PropertyNotFound(prop) => write!(f, "{prop}: property not found"),
            BindError::LineBusy(line) => write!(f, "line {line} is busy"),
            BindError::LineInvalid(line) => write!(f, "line {line} is invalid"),
            BindError::ConfigurationRejected(line) => {
                write!(f, "line {line}: direction setup rejected")
            }
        }
    }
}

/// Resolves line references against a device tree.
pub struct ResourceBinder<'t> {
    tree: &'t DeviceTree,
    gpio: Arc<dyn GpioController>,
}

impl<'t> ResourceBinder<'t> {
    pub fn new(tree: &'t DeviceTree, gpio: Arc<dyn GpioController>) -> Self {
        Self { tree, gpio }
    }

    /// Acquire and configure the line `req` points at.
    pub fn bind(&self, req: &LineRequest<'_>) -> Result<HardwareLine, BindError> {
        let node = self
            .tree
            .find_node_by_path(req.path)
            .filter(|node| node.is_available())
            .ok_or_else(|| BindError::NodeNotFound(req.path.to_string()))?;

        let spec = node
            .named_gpio(req.property, req.index)
            .map_err(|e: OfError| {
                log::debug!("{}: {}[{}]: {}", req.path, req.property, req.index, e);
                BindError::PropertyNotFound(req.property.to_string())
            })?;

        let mut line = HardwareLine::request(self.gpio.clone(), spec.line, req.label, spec.flags)
            .map_err(|e| match e {
                GpioError::Busy => BindError::LineBusy(spec.line),
                _ => BindError::LineInvalid(spec.line),
            })?;

        let configured = match req.mode {
            LineMode::Input => line.configure_input(),
            LineMode::Output { initial_active } => line.configure_output(initial_active),
        };
        // On error `line` is dropped here, which frees it.
        configured.map_err(|_| BindError::ConfigurationRejected(spec.line))?;

        log::info!("{}: bound {} to line {}", req.label, req.path, spec.line);
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::of::{GpioFlags, GpioSpec, Node, PropValue, string};
    use crate::platform::virt::VirtualGpio;
    use alloc::vec;

    fn tree() -> DeviceTree {
        DeviceTree::new()
            .with_node(
                "/gpioled",
                Node::new()
                    .with("status", string("okay"))
                    .with("led-gpios", PropValue::Gpios(vec![GpioSpec { line: 3, flags: GpioFlags::ACTIVE_LOW }])),
            )
            .with_node(
                "/off",
                Node::new()
                    .with("status", string("disabled"))
                    .with("led-gpios", PropValue::Gpios(vec![GpioSpec { line: 4, flags: GpioFlags::empty() }])),
            )
    }

    fn led<'a>(path: &'a str, property: &'a str) -> LineRequest<'a> {
        LineRequest {
            path,
            property,
            index: 0,
            label: "led",
            mode: LineMode::Output { initial_active: false },
        }
    }

    #[test]
    fn binds_and_configures_output() {
        let tree = tree();
        let gpio = Arc::new(VirtualGpio::new(8));
        let binder = ResourceBinder::new(&tree, gpio.clone());
        let line = binder.bind(&led("/gpioled", "led-gpios")).unwrap();
        assert_eq!(line.id(), 3);
        assert!(line.is_output());
        assert!(!line.is_active());
        assert_eq!(gpio.owner(3).as_deref(), Some("led"));
    }

    #[test]
    fn reports_each_failed_step() {
        let tree = tree();
        let gpio = Arc::new(VirtualGpio::new(8));
        let binder = ResourceBinder::new(&tree, gpio.clone());

        assert_eq!(
            binder.bind(&led("/missing", "led-gpios")).unwrap_err(),
            BindError::NodeNotFound("/missing".into())
        );
        assert_eq!(
            binder.bind(&led("/off", "led-gpios")).unwrap_err(),
            BindError::NodeNotFound("/off".into())
        );
        assert_eq!(
            binder.bind(&led("/gpioled", "nope-gpios")).unwrap_err(),
            BindError::PropertyNotFound("nope-gpios".into())
        );

        gpio.request(3, "someone-else").unwrap();
        assert_eq!(binder.bind(&led("/gpioled", "led-gpios")).unwrap_err(), BindError::LineBusy(3));
    }

    #[test]
    fn rejected_configuration_releases_line() {
        let tree = tree();
        let gpio = Arc::new(VirtualGpio::new(8));
        gpio.reject_direction(3, true);
        let binder = ResourceBinder::new(&tree, gpio.clone());
        assert_eq!(
            binder.bind(&led("/gpioled", "led-gpios")).unwrap_err(),
            BindError::ConfigurationRejected(3)
        );
        assert!(!gpio.is_requested(3));
    }

    #[test]
    fn out_of_range_line_is_invalid() {
        let tree = DeviceTree::new().with_node(
            "/gpioled",
            Node::new().with("led-gpios", PropValue::Gpios(vec![GpioSpec { line: 99, flags: GpioFlags::empty() }])),
        );
        let binder = ResourceBinder::new(&tree, Arc::new(VirtualGpio::new(8)));
        assert_eq!(
            binder.bind(&led("/gpioled", "led-gpios")).unwrap_err(),
            BindError::LineInvalid(99)
        );
    }
}
