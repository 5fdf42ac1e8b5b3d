//! Process-wide shared register file guarded by a mutex.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::warn;

use crate::transport::{decode_word, encode_word, RegisterPort};
use crate::{DeviceError, RegisterFile, RegisterSnapshot, StatusFlags, REGISTER_BYTES};

/// Completion record for one accepted control write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteReceipt {
    /// Completion order of this write, starting at 1.
    pub sequence: u64,
    /// Command word that was applied.
    pub word: u32,
    /// Status produced by this write, observed inside the same critical section.
    pub status: StatusFlags,
    /// Bytes consumed from the caller buffer.
    pub bytes: usize,
}

#[derive(Debug)]
struct DeviceCell {
    regs: RegisterFile,
    completed_writes: u64,
}

/// The single register file shared by every session of a device.
///
/// Each read and each write is one critical section. A write's full effect
/// sequence completes before any other access observes the bank.
#[derive(Debug)]
pub struct SharedDevice {
    cell: Mutex<DeviceCell>,
}

impl SharedDevice {
    /// Allocates the register file in its power-on state.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::OutOfMemory`] when the bank cannot be
    /// allocated.
    pub fn new() -> Result<Self, DeviceError> {
        Ok(Self {
            cell: Mutex::new(DeviceCell {
                regs: RegisterFile::initialize()?,
                completed_writes: 0,
            }),
        })
    }

    // The transition function cannot panic halfway through an update, so a
    // poisoned bank is still consistent.
    fn lock(&self) -> MutexGuard<'_, DeviceCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the status value and the transfer size (always 4).
    #[must_use]
    pub fn read(&self) -> (u32, usize) {
        self.lock().regs.read()
    }

    /// Applies the command word in `src`; returns bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` holds fewer than
    /// four bytes.
    pub fn write(&self, src: &[u8]) -> Result<usize, DeviceError> {
        self.write_command(src).map(|receipt| receipt.bytes)
    }

    /// Applies the command word in `src` and reports how it completed.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` holds fewer than
    /// four bytes. The bank and the completion sequence are untouched.
    pub fn write_command(&self, src: &[u8]) -> Result<WriteReceipt, DeviceError> {
        let word = decode_word(src).inspect_err(|_| {
            warn!("rejected {}-byte control write", src.len());
        })?;

        let mut cell = self.lock();
        let status = cell.regs.apply_command(word);
        cell.completed_writes += 1;
        Ok(WriteReceipt {
            sequence: cell.completed_writes,
            word,
            status,
            bytes: REGISTER_BYTES,
        })
    }

    /// Copies all four registers under the lock.
    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        self.lock().regs.snapshot()
    }

    /// Number of control writes accepted so far.
    #[must_use]
    pub fn completed_writes(&self) -> u64 {
        self.lock().completed_writes
    }
}

impl RegisterPort for &SharedDevice {
    fn read_status(&mut self, dst: &mut [u8]) -> Result<usize, DeviceError> {
        let (value, _) = self.read();
        encode_word(value, dst).inspect_err(|_| {
            warn!("rejected {}-byte status read", dst.len());
        })
    }

    fn write_control(&mut self, src: &[u8]) -> Result<usize, DeviceError> {
        self.write(src)
    }
}

#[cfg(test)]
mod tests {
    use super::SharedDevice;
    use crate::{ControlFlags, DeviceError, RegisterPort, StatusFlags};

    #[test]
    fn receipts_are_numbered_in_completion_order() {
        let device = SharedDevice::new().expect("device allocates");
        let first = device
            .write_command(&ControlFlags::ENABLE.bits().to_ne_bytes())
            .expect("enable accepted");
        let second = device
            .write_command(&ControlFlags::RESET.bits().to_ne_bytes())
            .expect("reset accepted");

        assert_eq!(first.sequence, 1);
        assert_eq!(first.status, StatusFlags::BUSY);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.status, StatusFlags::READY);
        assert_eq!(device.completed_writes(), 2);
    }

    #[test]
    fn rejected_write_does_not_advance_sequence() {
        let device = SharedDevice::new().expect("device allocates");
        assert_eq!(device.write(&[1, 0, 0]), Err(DeviceError::InvalidArgument));
        assert_eq!(device.completed_writes(), 0);
        assert_eq!(device.read().0, StatusFlags::READY.bits());
    }

    #[test]
    fn shared_reference_acts_as_register_port() {
        let device = SharedDevice::new().expect("device allocates");
        let mut port = &device;
        assert_eq!(port.write_control(&1_u32.to_ne_bytes()), Ok(4));

        let mut dst = [0_u8; 8];
        assert_eq!(port.read_status(&mut dst), Ok(4));
        assert_eq!(u32::from_ne_bytes([dst[0], dst[1], dst[2], dst[3]]), 0x2);
        assert_eq!(port.read_status(&mut [0_u8; 3]), Err(DeviceError::AccessFault));
    }

    #[test]
    fn poisoned_lock_still_serves_consistent_state() {
        let device = SharedDevice::new().expect("device allocates");
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = device.lock();
                    panic!("poison the bank lock");
                })
                .join()
        });

        assert_eq!(device.read().0, StatusFlags::READY.bits());
        assert_eq!(device.write(&2_u32.to_ne_bytes()), Ok(4));
    }
}
