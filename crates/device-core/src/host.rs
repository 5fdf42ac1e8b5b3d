//! In-process device-node host: registration, bring-up, and sessions.
//!
//! Bring-up acquires the class registration, the node registration, and the
//! register-file backing, in that order. Each is a guard that releases on
//! drop, so a failure part-way through unwinds whatever was already held in
//! reverse order, and teardown of a live host does the same.

use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::transport::{encode_word, validate_read_len, RegisterPort};
use crate::{DeviceConfig, DeviceError, RegisterSnapshot, SharedDevice, WriteReceipt};

/// Default number of nodes a registry can hold.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 8;

/// Errors raised while bringing up or using a hosted node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Configuration failed validation; nothing was acquired.
    #[error("invalid device configuration: {0}")]
    InvalidConfig(String),
    /// Another live node already uses this name.
    #[error("device node {0:?} is already registered")]
    NameInUse(String),
    /// The registry has no free node slots.
    #[error("node registry is full ({capacity} nodes)")]
    RegistryFull {
        /// Registry capacity at the time of the attempt.
        capacity: usize,
    },
    /// The configured number of concurrent sessions is already open.
    #[error("session limit of {limit} reached")]
    SessionLimit {
        /// Configured session limit.
        limit: usize,
    },
    /// The register file itself failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Registry bookkeeping entry, recorded in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryEvent {
    /// A class reference was taken.
    ClassAcquired(String),
    /// A node name was claimed.
    NodeRegistered(String),
    /// A node name was released.
    NodeUnregistered(String),
    /// A class reference was dropped.
    ClassReleased(String),
}

#[derive(Debug)]
struct RegistryTable {
    capacity: usize,
    nodes: Vec<String>,
    classes: Vec<(String, usize)>,
    journal: Vec<RegistryEvent>,
}

/// Process-level namespace of device classes and node names.
///
/// Cloning yields another handle to the same namespace.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    table: Arc<Mutex<RegistryTable>>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}

impl NodeRegistry {
    /// Creates an empty registry holding at most `capacity` nodes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            table: Arc::new(Mutex::new(RegistryTable {
                capacity,
                nodes: Vec::new(),
                classes: Vec::new(),
                journal: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a reference on a device class, creating it on first use.
    #[must_use]
    pub fn acquire_class(&self, name: &str) -> ClassRegistration {
        let mut table = self.lock();
        match table.classes.iter_mut().find(|(class, _)| class == name) {
            Some((_, refs)) => *refs += 1,
            None => table.classes.push((name.to_string(), 1)),
        }
        table
            .journal
            .push(RegistryEvent::ClassAcquired(name.to_string()));
        debug!("class {name} acquired");

        ClassRegistration {
            registry: self.clone(),
            name: name.to_string(),
        }
    }

    /// Claims a node name.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::NameInUse`] when the name is taken, or
    /// [`HostError::RegistryFull`] when no slot is free.
    pub fn register_node(&self, name: &str) -> Result<NodeRegistration, HostError> {
        let mut table = self.lock();
        if table.nodes.iter().any(|node| node == name) {
            return Err(HostError::NameInUse(name.to_string()));
        }
        if table.nodes.len() >= table.capacity {
            return Err(HostError::RegistryFull {
                capacity: table.capacity,
            });
        }
        table.nodes.push(name.to_string());
        table
            .journal
            .push(RegistryEvent::NodeRegistered(name.to_string()));
        debug!("node {name} registered");

        Ok(NodeRegistration {
            registry: self.clone(),
            name: name.to_string(),
        })
    }

    /// Returns `true` while a node with this name is registered.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().nodes.iter().any(|node| node == name)
    }

    /// Number of live references on a class.
    #[must_use]
    pub fn class_refs(&self, name: &str) -> usize {
        self.lock()
            .classes
            .iter()
            .find(|(class, _)| class == name)
            .map_or(0, |(_, refs)| *refs)
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Copy of the bookkeeping journal.
    #[must_use]
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.lock().journal.clone()
    }
}

/// Reference on a device class; released on drop.
#[derive(Debug)]
pub struct ClassRegistration {
    registry: NodeRegistry,
    name: String,
}

impl Drop for ClassRegistration {
    fn drop(&mut self) {
        let mut table = self.registry.lock();
        if let Some(pos) = table.classes.iter().position(|(class, _)| *class == self.name) {
            table.classes[pos].1 -= 1;
            if table.classes[pos].1 == 0 {
                table.classes.remove(pos);
            }
        }
        table
            .journal
            .push(RegistryEvent::ClassReleased(self.name.clone()));
        debug!("class {} released", self.name);
    }
}

/// Claimed node name; unregistered on drop.
#[derive(Debug)]
pub struct NodeRegistration {
    registry: NodeRegistry,
    name: String,
}

impl NodeRegistration {
    /// Registered node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NodeRegistration {
    fn drop(&mut self) {
        let mut table = self.registry.lock();
        table.nodes.retain(|node| *node != self.name);
        table
            .journal
            .push(RegistryEvent::NodeUnregistered(self.name.clone()));
        debug!("node {} unregistered", self.name);
    }
}

#[derive(Debug)]
struct SessionTable {
    limit: usize,
    open: AtomicUsize,
    next_id: AtomicU64,
}

/// A live device node: one shared register file plus its registrations.
///
/// Fields drop in declaration order, which releases the backing first and
/// the class registration last.
#[derive(Debug)]
pub struct DeviceHost {
    device: Arc<SharedDevice>,
    node: NodeRegistration,
    _class: ClassRegistration,
    sessions: Arc<SessionTable>,
    config: DeviceConfig,
}

impl DeviceHost {
    /// Validates `config` and acquires every resource the node needs.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidConfig`] before acquiring anything,
    /// [`HostError::NameInUse`] or [`HostError::RegistryFull`] from node
    /// registration, and [`HostError::Device`] when the register bank cannot
    /// be allocated. Anything already acquired is released before returning.
    pub fn bring_up(registry: &NodeRegistry, config: DeviceConfig) -> Result<Self, HostError> {
        Self::bring_up_with(registry, config, SharedDevice::new)
    }

    /// Bring-up with the register-file backing supplied by `allocate`.
    pub(crate) fn bring_up_with(
        registry: &NodeRegistry,
        config: DeviceConfig,
        allocate: impl FnOnce() -> Result<SharedDevice, DeviceError>,
    ) -> Result<Self, HostError> {
        config.validate()?;

        let class = registry.acquire_class(&config.class_name);
        let node = registry.register_node(&config.node_name).inspect_err(|err| {
            warn!("{}: bring-up aborted: {err}", config.node_path());
        })?;
        let device = allocate().map_err(|err| {
            warn!("{}: bring-up aborted: {err}", config.node_path());
            HostError::from(err)
        })?;

        info!("{}: device node up", config.node_path());
        Ok(Self {
            device: Arc::new(device),
            node,
            _class: class,
            sessions: Arc::new(SessionTable {
                limit: config.session_limit,
                open: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
            }),
            config,
        })
    }

    /// Opens a session on the node.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SessionLimit`] when the configured number of
    /// sessions is already open.
    pub fn open(&self) -> Result<Session, HostError> {
        let limit = self.sessions.limit;
        self.sessions
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < limit).then_some(open + 1)
            })
            .map_err(|_| HostError::SessionLimit { limit })?;

        let id = self.sessions.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("{}: session {id} opened", self.config.node_path());
        Ok(Session {
            id,
            device: Arc::clone(&self.device),
            sessions: Arc::clone(&self.sessions),
        })
    }

    /// Bring-up configuration.
    #[must_use]
    pub const fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Registered node name.
    #[must_use]
    pub fn node_name(&self) -> &str {
        self.node.name()
    }

    /// Shared register file behind this node.
    #[must_use]
    pub const fn device(&self) -> &Arc<SharedDevice> {
        &self.device
    }

    /// Copies all four registers.
    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        self.device.snapshot()
    }

    /// Number of sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions.open.load(Ordering::Acquire)
    }
}

impl Drop for DeviceHost {
    fn drop(&mut self) {
        info!(
            "{}: tearing down ({} sessions still open)",
            self.config.node_path(),
            self.open_sessions()
        );
    }
}

/// One open/close-bracketed sequence of transfers on a node.
///
/// Sessions carry no register state of their own; every session of a node
/// observes the same register file.
#[derive(Debug)]
pub struct Session {
    id: u64,
    device: Arc<SharedDevice>,
    sessions: Arc<SessionTable>,
}

impl Session {
    /// Session identifier, unique per host and starting at 1.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Copies the status register into the first four bytes of `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AccessFault`] when `dst` is shorter than four
    /// bytes; the register file is not consulted.
    pub fn read_into(&self, dst: &mut [u8]) -> Result<usize, DeviceError> {
        validate_read_len(dst.len()).inspect_err(|_| {
            warn!("session {}: rejected {}-byte read", self.id, dst.len());
        })?;
        let (value, _) = self.device.read();
        let bytes = encode_word(value, dst)?;
        trace!("session {}: status -> {value:#010x}", self.id);
        Ok(bytes)
    }

    /// Hands the first four bytes of `src` to the register file.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` is shorter than
    /// four bytes.
    pub fn write_from(&self, src: &[u8]) -> Result<usize, DeviceError> {
        self.write_command(src).map(|receipt| receipt.bytes)
    }

    /// Like [`Session::write_from`], returning the completion receipt.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` is shorter than
    /// four bytes.
    pub fn write_command(&self, src: &[u8]) -> Result<WriteReceipt, DeviceError> {
        let receipt = self.device.write_command(src)?;
        trace!(
            "session {}: control <= {:#010x} (#{})",
            self.id,
            receipt.word,
            receipt.sequence
        );
        Ok(receipt)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.sessions.open.fetch_sub(1, Ordering::AcqRel);
        debug!("session {} closed", self.id);
    }
}

impl RegisterPort for Session {
    fn read_status(&mut self, dst: &mut [u8]) -> Result<usize, DeviceError> {
        self.read_into(dst)
    }

    fn write_control(&mut self, src: &[u8]) -> Result<usize, DeviceError> {
        self.write_from(src)
    }
}

impl io::Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl io::Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_from(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
