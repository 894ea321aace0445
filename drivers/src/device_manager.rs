//! Device identifiers and device nodes.
//!
//! The registry owns three tables: identifier regions (a major number and
//! a run of minors), device classes, and the nodes published under `/dev`.
//! Nodes carry the [`FileOperations`] that serve them; [`DeviceRegistry::open`]
//! is the only way callers reach a device.

use crate::chrdev::file::{File, FileError, FileOperations};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use common::sync::RwLock;
use core::fmt;

const MINOR_BITS: u32 = 20;
const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Highest character-device major plus one.
pub const CHRDEV_MAJOR_MAX: u32 = 512;

/// Dynamic majors are handed out from the top of each range downwards.
const DYNAMIC_MAJORS: [(u32, u32); 2] = [(234, 254), (384, 511)];

/// Packed device number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevT(u32);

impl DevT {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self((major << MINOR_BITS) | (minor & MINOR_MASK))
    }

    pub const fn major(self) -> u32 {
        self.0 >> MINOR_BITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & MINOR_MASK
    }

    /// Packed `major << 20 | minor` value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The fixed major, or part of the requested minor run, is taken.
    IdentifierInUse(u32),
    /// Every dynamic major is taken.
    Exhausted,
    /// Zero minors, too many minors, or a major beyond the limit.
    InvalidRange,
    /// The identifier was never allocated.
    NotAllocated(DevT),
    /// A class with this name already exists.
    ClassExists(String),
    /// A node with this path already exists.
    NodeExists(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::IdentifierInUse(major) => write!(f, "major {major} already in use"),
            RegistryError::Exhausted => write!(f, "no free major number"),
            RegistryError::InvalidRange => write!(f, "invalid identifier range"),
            RegistryError::NotAllocated(devt) => write!(f, "device number {devt} not allocated"),
            RegistryError::ClassExists(name) => write!(f, "class {name} already exists"),
            RegistryError::NodeExists(path) => write!(f, "{path} already exists"),
        }
    }
}

#[derive(Debug, Clone)]
struct Region {
    first: DevT,
    count: u32,
    name: String,
}

impl Region {
    fn contains(&self, devt: DevT) -> bool {
        devt.major() == self.first.major()
            && devt.minor() >= self.first.minor()
            && devt.minor() - self.first.minor() < self.count
    }

    fn overlaps(&self, first: DevT, count: u32) -> bool {
        let (a0, a1) = (self.first.minor(), self.first.minor() + self.count);
        let (b0, b1) = (first.minor(), first.minor() + count);
        self.first.major() == first.major() && a0 < b1 && b0 < a1
    }
}

struct DeviceNode {
    devt: DevT,
    class: String,
    ops: Arc<dyn FileOperations>,
}

struct Tables {
    regions: Vec<Region>,
    classes: Vec<String>,
    nodes: BTreeMap<String, DeviceNode>,
}

/// Identifier allocator and `/dev` namespace.
pub struct DeviceRegistry {
    tables: RwLock<Tables>,
}

impl DeviceRegistry {
    pub const fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                regions: Vec::new(),
                classes: Vec::new(),
                nodes: BTreeMap::new(),
            }),
        }
    }

    /// Reserve `count` minors, under `major` if given or a free dynamic
    /// major otherwise. Returns the first identifier of the run.
    pub fn allocate(&self, name: &str, count: u32, major: Option<u32>) -> Result<DevT, RegistryError> {
        if count == 0 || count > MINOR_MASK + 1 {
            return Err(RegistryError::InvalidRange);
        }
        let mut tables = self.tables.write();

        let first = match major {
            Some(major) => {
                if major == 0 || major >= CHRDEV_MAJOR_MAX {
                    return Err(RegistryError::InvalidRange);
                }
                let first = DevT::new(major, 0);
                if tables.regions.iter().any(|r| r.overlaps(first, count)) {
                    return Err(RegistryError::IdentifierInUse(major));
                }
                first
            }
            None => {
                let major = DYNAMIC_MAJORS
                    .iter()
                    .flat_map(|&(lo, hi)| (lo..=hi).rev())
                    .find(|&m| tables.regions.iter().all(|r| r.first.major() != m))
                    .ok_or(RegistryError::Exhausted)?;
                DevT::new(major, 0)
            }
        };

        tables.regions.push(Region {
            first,
            count,
            name: name.to_string(),
        });
        log::info!("{}: allocated {} ({} minors)", name, first, count);
        Ok(first)
    }

    /// Return a run obtained from [`allocate`](Self::allocate). Freeing a
    /// run that is not held is a no-op.
    pub fn free(&self, first: DevT, count: u32) {
        let mut tables = self.tables.write();
        if let Some(pos) = tables
            .regions
            .iter()
            .position(|r| r.first == first && r.count == count)
        {
            let region = tables.regions.remove(pos);
            log::debug!("{}: freed {}", region.name, first);
        }
    }

    /// Whether `devt` lies in an allocated run.
    pub fn is_allocated(&self, devt: DevT) -> bool {
        self.tables.read().regions.iter().any(|r| r.contains(devt))
    }

    /// Create `class` and the node `/dev/<name>` served by `ops`.
    ///
    /// If the node cannot be created the class is removed again before
    /// the error is returned.
    pub fn publish(
        &self,
        devt: DevT,
        name: &str,
        class: &str,
        ops: Arc<dyn FileOperations>,
    ) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if !tables.regions.iter().any(|r| r.contains(devt)) {
            return Err(RegistryError::NotAllocated(devt));
        }
        if tables.classes.iter().any(|c| c == class) {
            return Err(RegistryError::ClassExists(class.to_string()));
        }
        tables.classes.push(class.to_string());

        let path = node_path(name);
        if tables.nodes.contains_key(&path) {
            tables.classes.retain(|c| c != class);
            return Err(RegistryError::NodeExists(path));
        }
        tables.nodes.insert(
            path.clone(),
            DeviceNode {
                devt,
                class: class.to_string(),
                ops,
            },
        );
        log::info!("{}: published as {}", devt, path);
        Ok(())
    }

    /// Remove the node `/dev/<name>` and `class`. Missing entries are skipped.
    pub fn retract(&self, name: &str, class: &str) {
        let path = node_path(name);
        let mut tables = self.tables.write();
        if tables.nodes.remove(&path).is_some() {
            log::debug!("{} removed", path);
        }
        tables.classes.retain(|c| c != class);
    }

    /// Open the node at `path`.
    pub fn open(&self, path: &str) -> Result<File, FileError> {
        // Open runs without the table lock held.
        let (ops, devt) = {
            let tables = self.tables.read();
            let node = tables.nodes.get(path).ok_or(FileError::NotFound)?;
            (Arc::clone(&node.ops), node.devt)
        };
        File::open(ops, devt, path.to_string())
    }

    /// Device number behind `path`.
    pub fn lookup(&self, path: &str) -> Option<DevT> {
        self.tables.read().nodes.get(path).map(|n| n.devt)
    }

    /// Class of the node at `path`.
    pub fn class_of(&self, path: &str) -> Option<String> {
        self.tables.read().nodes.get(path).map(|n| n.class.clone())
    }

    /// Published node paths.
    pub fn nodes(&self) -> Vec<String> {
        self.tables.read().nodes.keys().cloned().collect()
    }

    /// Existing classes.
    pub fn classes(&self) -> Vec<String> {
        self.tables.read().classes.clone()
    }

    /// Number of allocated runs.
    pub fn allocated_regions(&self) -> usize {
        self.tables.read().regions.len()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn node_path(name: &str) -> String {
    format!("/dev/{name}")
}
