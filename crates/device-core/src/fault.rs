use std::io;

use thiserror::Error;

/// Errno-style value reported for [`DeviceError::OutOfMemory`].
pub const ERRNO_NOMEM: i32 = 12;
/// Errno-style value reported for [`DeviceError::AccessFault`].
pub const ERRNO_FAULT: i32 = 14;
/// Errno-style value reported for [`DeviceError::InvalidArgument`].
pub const ERRNO_INVAL: i32 = 22;

/// Stable error taxonomy for register-file construction and transfers.
///
/// Every variant is reported synchronously to the immediate caller. None of
/// them leaves the register file in a partially updated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DeviceError {
    /// Backing storage for the register bank could not be allocated.
    #[error("register bank allocation failed")]
    OutOfMemory,
    /// A write supplied fewer than four readable bytes.
    #[error("command word needs at least 4 bytes")]
    InvalidArgument,
    /// A read destination could not hold a full register value.
    #[error("read destination cannot hold a 4-byte register value")]
    AccessFault,
}

impl DeviceError {
    /// Converts the error to its positive errno-style code.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::OutOfMemory => ERRNO_NOMEM,
            Self::InvalidArgument => ERRNO_INVAL,
            Self::AccessFault => ERRNO_FAULT,
        }
    }

    /// Converts a positive errno-style code back into a device error.
    #[must_use]
    pub const fn from_errno(code: i32) -> Option<Self> {
        match code {
            ERRNO_NOMEM => Some(Self::OutOfMemory),
            ERRNO_INVAL => Some(Self::InvalidArgument),
            ERRNO_FAULT => Some(Self::AccessFault),
            _ => None,
        }
    }

    /// Construction-time errors prevent the device from coming up at all.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

impl From<DeviceError> for io::Error {
    fn from(err: DeviceError) -> Self {
        let kind = match err {
            DeviceError::OutOfMemory => io::ErrorKind::OutOfMemory,
            DeviceError::InvalidArgument | DeviceError::AccessFault => io::ErrorKind::InvalidInput,
        };
        Self::new(kind, err)
    }
}
