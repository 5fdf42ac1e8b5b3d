//! Bounds-checked byte transfers between caller buffers and register values.
//!
//! Every transfer unit is exactly [`REGISTER_BYTES`] long and carries one
//! `u32` in host-native byte order. Lengths are validated before any bytes
//! are interpreted.

use crate::{DeviceError, REGISTER_BYTES};

/// Validates that a read destination can hold one register value.
///
/// # Errors
///
/// Returns [`DeviceError::AccessFault`] when `len < 4`.
pub const fn validate_read_len(len: usize) -> Result<(), DeviceError> {
    if len >= REGISTER_BYTES {
        Ok(())
    } else {
        Err(DeviceError::AccessFault)
    }
}

/// Validates that a write source supplies at least one full command word.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidArgument`] when `len < 4`.
pub const fn validate_write_len(len: usize) -> Result<(), DeviceError> {
    if len >= REGISTER_BYTES {
        Ok(())
    } else {
        Err(DeviceError::InvalidArgument)
    }
}

/// Decodes the leading native-endian command word from a caller buffer.
///
/// Bytes past the first four are ignored.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidArgument`] when fewer than four bytes are
/// available.
pub fn decode_word(src: &[u8]) -> Result<u32, DeviceError> {
    validate_write_len(src.len())?;
    src.get(..REGISTER_BYTES)
        .and_then(|bytes| <[u8; REGISTER_BYTES]>::try_from(bytes).ok())
        .map(u32::from_ne_bytes)
        .ok_or(DeviceError::InvalidArgument)
}

/// Encodes a register value into the leading four bytes of `dst`.
///
/// Returns the number of bytes produced, always four.
///
/// # Errors
///
/// Returns [`DeviceError::AccessFault`] when `dst` is shorter than four bytes.
pub fn encode_word(value: u32, dst: &mut [u8]) -> Result<usize, DeviceError> {
    validate_read_len(dst.len())?;
    let slot = dst
        .get_mut(..REGISTER_BYTES)
        .ok_or(DeviceError::AccessFault)?;
    slot.copy_from_slice(&value.to_ne_bytes());
    Ok(REGISTER_BYTES)
}

/// Byte-level register access contract honoured by every hosting layer.
///
/// Reads always report the status register; writes always target the
/// control register and drive the state machine.
pub trait RegisterPort {
    /// Copies the current status value into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AccessFault`] when `dst` cannot hold 4 bytes.
    fn read_status(&mut self, dst: &mut [u8]) -> Result<usize, DeviceError>;

    /// Applies the command word held in the first four bytes of `src`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` is shorter than
    /// 4 bytes.
    fn write_control(&mut self, src: &[u8]) -> Result<usize, DeviceError>;
}
