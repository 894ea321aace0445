//! Device-description lookup.
//!
//! A [`DeviceTree`] maps absolute node paths (`/gpioled`, `/key`, ...) to
//! nodes carrying typed properties. How the tree was produced (flattened
//! blob, board table, test fixture) is outside this module; drivers only
//! query it through the accessors below.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

bitflags::bitflags! {
    /// Flags cell of a GPIO specifier (`<&gpio1 3 GPIO_ACTIVE_LOW>`).
    ///
    /// Bit values follow `include/dt-bindings/gpio/gpio.h`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct GpioFlags: u32 {
        /// The line is asserted when driven low.
        const ACTIVE_LOW = 1 << 0;
        /// Enable the internal pull-up resistor.
        const PULL_UP = 1 << 4;
        /// Enable the internal pull-down resistor.
        const PULL_DOWN = 1 << 5;
    }
}

/// A resolved `*-gpios` entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GpioSpec {
    /// Global line number on the platform GPIO controller.
    pub line: u32,
    /// Polarity and bias flags.
    pub flags: GpioFlags,
}

impl GpioSpec {
    /// Build a specifier from a GPIO bank, pin within the bank and flags,
    /// using the 32-lines-per-bank numbering (`gpio5_IO01` is line 129).
    ///
    /// Banks are numbered from 1; bank 0 is treated as bank 1.
    pub const fn banked(bank: u32, pin: u32, flags: GpioFlags) -> Self {
        Self {
            line: bank.saturating_sub(1) * 32 + pin,
            flags,
        }
    }
}

/// Property payloads understood by the lookup accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Boolean property with no value.
    Empty,
    /// One or more NUL-separated strings.
    Strings(Vec<String>),
    /// An array of 32-bit cells.
    Cells(Vec<u32>),
    /// A list of GPIO specifiers.
    Gpios(Vec<GpioSpec>),
}

/// Device-tree lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfError {
    /// The property does not exist on the node.
    NotFound,
    /// The property exists but holds a different kind of value.
    InvalidType,
    /// Index beyond the last element of the property.
    OutOfRange,
}

impl fmt::Display for OfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfError::NotFound => write!(f, "property not found"),
            OfError::InvalidType => write!(f, "property has the wrong type"),
            OfError::OutOfRange => write!(f, "property index out of range"),
        }
    }
}

/// A device-description node.
#[derive(Debug, Clone, Default)]
pub struct Node {
    properties: BTreeMap<String, PropValue>,
}

impl Node {
    /// Create a node without properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property insertion.
    pub fn with(mut self, name: &str, value: PropValue) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a property.
    pub fn set(&mut self, name: &str, value: PropValue) {
        self.properties.insert(name.to_string(), value);
    }

    /// Remove a property, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.properties.remove(name)
    }

    /// Raw property lookup (`of_find_property`).
    pub fn property(&self, name: &str) -> Option<&PropValue> {
        self.properties.get(name)
    }

    /// First string of a string property (`of_property_read_string`).
    pub fn read_string(&self, name: &str) -> Result<&str, OfError> {
        match self.property(name).ok_or(OfError::NotFound)? {
            PropValue::Strings(list) => list.first().map(String::as_str).ok_or(OfError::OutOfRange),
            _ => Err(OfError::InvalidType),
        }
    }

    /// First cell of a cell property (`of_property_read_u32`).
    pub fn read_u32(&self, name: &str) -> Result<u32, OfError> {
        self.read_u32_array(name)?
            .first()
            .copied()
            .ok_or(OfError::OutOfRange)
    }

    /// All cells of a cell property (`of_property_read_u32_array`).
    pub fn read_u32_array(&self, name: &str) -> Result<&[u32], OfError> {
        match self.property(name).ok_or(OfError::NotFound)? {
            PropValue::Cells(cells) => Ok(cells),
            _ => Err(OfError::InvalidType),
        }
    }

    /// Number of cells in a cell property (`of_property_count_u32_elems`).
    pub fn count_u32_elems(&self, name: &str) -> Result<usize, OfError> {
        self.read_u32_array(name).map(<[u32]>::len)
    }

    /// The `index`-th specifier of a `*-gpios` property (`of_get_named_gpio`).
    pub fn named_gpio(&self, name: &str, index: usize) -> Result<GpioSpec, OfError> {
        match self.property(name).ok_or(OfError::NotFound)? {
            PropValue::Gpios(specs) => specs.get(index).copied().ok_or(OfError::OutOfRange),
            _ => Err(OfError::InvalidType),
        }
    }

    /// Whether `compatible` lists `model`.
    pub fn is_compatible(&self, model: &str) -> bool {
        matches!(self.property("compatible"), Some(PropValue::Strings(list)) if list.iter().any(|c| c == model))
    }

    /// A node is available unless its `status` says otherwise.
    pub fn is_available(&self) -> bool {
        match self.read_string("status") {
            Ok(status) => status == "okay" || status == "ok",
            Err(_) => true,
        }
    }
}

/// Path-indexed collection of nodes.
#[derive(Debug, Clone, Default)]
pub struct DeviceTree {
    nodes: BTreeMap<String, Node>,
}

impl DeviceTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style node insertion.
    pub fn with_node(mut self, path: &str, node: Node) -> Self {
        self.insert(path, node);
        self
    }

    /// Insert or replace the node at `path`.
    pub fn insert(&mut self, path: &str, node: Node) {
        self.nodes.insert(path.to_string(), node);
    }

    /// Node at an absolute path (`of_find_node_by_path`).
    pub fn find_node_by_path(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Paths of every node whose `compatible` lists `model`.
    pub fn find_compatible<'a>(&'a self, model: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.nodes
            .iter()
            .filter(move |(_, node)| node.is_compatible(model))
            .map(|(path, _)| path.as_str())
    }
}

/// Shorthand for a single-string property.
pub fn string(value: &str) -> PropValue {
    PropValue::Strings(alloc::vec![value.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn backlight() -> Node {
        Node::new()
            .with("compatible", string("pwm-backlight"))
            .with("status", string("okay"))
            .with("brightness-levels", PropValue::Cells(vec![0, 4, 8, 16, 32, 64, 128, 255]))
            .with("default-brightness-level", PropValue::Cells(vec![6]))
    }

    #[test]
    fn reads_typed_properties() {
        let tree = DeviceTree::new().with_node("/backlight", backlight());
        let node = tree.find_node_by_path("/backlight").unwrap();

        assert!(node.is_compatible("pwm-backlight"));
        assert_eq!(node.read_string("status"), Ok("okay"));
        assert_eq!(node.read_u32("default-brightness-level"), Ok(6));
        assert_eq!(node.count_u32_elems("brightness-levels"), Ok(8));
        assert_eq!(node.read_u32_array("brightness-levels").unwrap()[7], 255);
    }

    #[test]
    fn reports_missing_and_mistyped_properties() {
        let node = backlight();
        assert_eq!(node.read_u32("missing"), Err(OfError::NotFound));
        assert_eq!(node.read_u32("status"), Err(OfError::InvalidType));
        assert_eq!(node.named_gpio("status", 0), Err(OfError::InvalidType));
    }

    #[test]
    fn resolves_named_gpio_by_index() {
        let node = Node::new().with(
            "led-gpios",
            PropValue::Gpios(vec![GpioSpec::banked(1, 3, GpioFlags::ACTIVE_LOW)]),
        );
        let spec = node.named_gpio("led-gpios", 0).unwrap();
        assert_eq!(spec.line, 3);
        assert!(spec.flags.contains(GpioFlags::ACTIVE_LOW));
        assert_eq!(node.named_gpio("led-gpios", 1), Err(OfError::OutOfRange));
    }

    #[test]
    fn disabled_status_marks_node_unavailable() {
        let mut node = backlight();
        assert!(node.is_available());
        node.set("status", string("disabled"));
        assert!(!node.is_available());
        node.remove("status");
        assert!(node.is_available());
    }

    #[test]
    fn banked_numbering() {
        assert_eq!(GpioSpec::banked(5, 1, GpioFlags::empty()).line, 129);
        assert_eq!(GpioSpec::banked(0, 7, GpioFlags::empty()).line, 7);
    }

    #[test]
    fn finds_nodes_by_compatible() {
        let tree = DeviceTree::new()
            .with_node("/backlight", backlight())
            .with_node("/key", Node::new().with("compatible", string("alientek,key")));
        let found: Vec<_> = tree.find_compatible("alientek,key").collect();
        assert_eq!(found, vec!["/key"]);
    }
}
