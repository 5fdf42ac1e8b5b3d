//! Register-file core for a simulated memory-mapped peripheral.

/// Error taxonomy for construction and transfers.
pub mod fault;
pub use fault::{DeviceError, ERRNO_FAULT, ERRNO_INVAL, ERRNO_NOMEM};

/// Register identifiers, command/status bits, and snapshots.
pub mod registers;
pub use registers::{
    ControlFlags, Register, RegisterSnapshot, StatusFlags, REGISTER_BYTES, REGISTER_COUNT,
};

/// Bounds-checked transfer helpers and the byte-level port contract.
pub mod transport;
pub use transport::{
    decode_word, encode_word, validate_read_len, validate_write_len, RegisterPort,
};

/// Register bank and control-write state machine.
pub mod register_file;
pub use register_file::RegisterFile;

/// Mutex-guarded register file shared by all sessions.
pub mod device;
pub use device::{SharedDevice, WriteReceipt};

/// Bring-up configuration.
pub mod config;
pub use config::{
    DeviceConfig, DEFAULT_CLASS_NAME, DEFAULT_NODE_NAME, DEFAULT_SESSION_LIMIT, MAX_NAME_LEN,
};

/// Node registry, scoped bring-up, and sessions.
pub mod host;
pub use host::{
    ClassRegistration, DeviceHost, HostError, NodeRegistration, NodeRegistry, RegistryEvent,
    Session, DEFAULT_REGISTRY_CAPACITY,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
