//! Register file and the control-write state machine.
//!
//! The bank holds four 32-bit registers. Reads report `status`; writes store
//! the command word in `control` and then apply `ENABLE` followed by
//! `RESET`, so `RESET` wins when both bits arrive in one word.

use log::trace;

use crate::transport::{decode_word, encode_word, RegisterPort};
use crate::{ControlFlags, DeviceError, Register, RegisterSnapshot, StatusFlags};
use crate::{REGISTER_BYTES, REGISTER_COUNT};

/// The emulated peripheral's register bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    bank: Box<[u32]>,
}

impl RegisterFile {
    /// Allocates the register bank in its power-on state.
    ///
    /// `control`, `data` and `counter` start at zero; `status` starts at
    /// `READY`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::OutOfMemory`] when the bank cannot be
    /// allocated.
    pub fn initialize() -> Result<Self, DeviceError> {
        let mut bank = Vec::new();
        bank.try_reserve_exact(REGISTER_COUNT)
            .map_err(|_| DeviceError::OutOfMemory)?;
        bank.resize(REGISTER_COUNT, 0);

        let mut regs = Self {
            bank: bank.into_boxed_slice(),
        };
        regs.set(Register::Status, StatusFlags::READY.bits());
        Ok(regs)
    }

    fn get(&self, reg: Register) -> u32 {
        self.bank[reg.index()]
    }

    fn set(&mut self, reg: Register, value: u32) {
        trace!("{} <= {value:#010x}", reg.name());
        self.bank[reg.index()] = value;
    }

    /// Returns the raw status value and the transfer size (always 4).
    #[must_use]
    pub fn read(&self) -> (u32, usize) {
        (self.get(Register::Status), REGISTER_BYTES)
    }

    /// Decodes a command word from `src` and applies it.
    ///
    /// Returns the number of bytes consumed, always 4.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] when `src` holds fewer than
    /// four bytes. No register changes in that case.
    pub fn write(&mut self, src: &[u8]) -> Result<usize, DeviceError> {
        let word = decode_word(src)?;
        self.apply_command(word);
        Ok(REGISTER_BYTES)
    }

    /// Applies one already-decoded command word and returns the new status.
    pub fn apply_command(&mut self, word: u32) -> StatusFlags {
        let command = ControlFlags::from_bits_retain(word);
        self.set(Register::Control, word);

        if command.contains(ControlFlags::ENABLE) {
            self.set(Register::Status, StatusFlags::BUSY.bits());
        }
        if command.contains(ControlFlags::RESET) {
            self.set(Register::Counter, 0);
            self.set(Register::Status, StatusFlags::READY.bits());
        }

        let status = self.status();
        trace!(
            "command {word:#010x} (reserved {:#010x}), status -> {:#010x}",
            command.reserved_bits(),
            status.bits()
        );
        status
    }

    /// Current status bits.
    #[must_use]
    pub fn status(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.get(Register::Status))
    }

    /// Most recently accepted command word.
    #[must_use]
    pub fn control(&self) -> u32 {
        self.get(Register::Control)
    }

    /// Current counter value.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.get(Register::Counter)
    }

    /// Copies all four registers.
    #[must_use]
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            control: self.get(Register::Control),
            status: self.get(Register::Status),
            data: self.get(Register::Data),
            counter: self.get(Register::Counter),
        }
    }
}

impl RegisterPort for RegisterFile {
    fn read_status(&mut self, dst: &mut [u8]) -> Result<usize, DeviceError> {
        let (value, _) = self.read();
        encode_word(value, dst)
    }

    fn write_control(&mut self, src: &[u8]) -> Result<usize, DeviceError> {
        self.write(src)
    }
}

#[cfg(test)]
mod tests {
    use super::RegisterFile;
    use crate::{ControlFlags, DeviceError, RegisterPort, RegisterSnapshot, StatusFlags};
    use rstest::rstest;

    fn word(flags: ControlFlags) -> [u8; 4] {
        flags.bits().to_ne_bytes()
    }

    #[test]
    fn power_on_state_is_ready_with_zeroed_registers() {
        let regs = RegisterFile::initialize().expect("bank allocates");
        assert_eq!(
            regs.snapshot(),
            RegisterSnapshot {
                control: 0,
                status: StatusFlags::READY.bits(),
                data: 0,
                counter: 0,
            }
        );
        assert_eq!(regs.read(), (StatusFlags::READY.bits(), 4));
    }

    #[test]
    fn read_is_idempotent() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        regs.apply_command(ControlFlags::ENABLE.bits());
        let first = regs.read();
        for _ in 0..16 {
            assert_eq!(regs.read(), first);
        }
        assert_eq!(regs.control(), ControlFlags::ENABLE.bits());
    }

    #[rstest]
    #[case::enable_from_ready(&[0x1], StatusFlags::BUSY)]
    #[case::enable_twice(&[0x1, 0x1], StatusFlags::BUSY)]
    #[case::enable_then_reset(&[0x1, 0x2], StatusFlags::READY)]
    #[case::reset_from_ready(&[0x2], StatusFlags::READY)]
    #[case::reset_wins_in_one_word(&[0x3], StatusFlags::READY)]
    #[case::no_command_bits(&[0x0], StatusFlags::READY)]
    fn transitions_follow_command_rules(#[case] commands: &[u32], #[case] expected: StatusFlags) {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        for command in commands {
            assert_eq!(regs.write(&command.to_ne_bytes()), Ok(4));
        }
        assert_eq!(regs.status(), expected);
        assert_eq!(regs.control(), commands.last().copied().unwrap_or(0));
    }

    #[test]
    fn reset_zeroes_counter_and_control_is_not_cleared() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        regs.apply_command(ControlFlags::RESET.bits());
        assert_eq!(regs.counter(), 0);
        assert_eq!(regs.control(), ControlFlags::RESET.bits());
        assert_eq!(regs.status(), StatusFlags::READY);
    }

    #[test]
    fn reserved_bits_are_stored_without_changing_status() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        assert_eq!(regs.write(&0xF0F0_0000_u32.to_ne_bytes()), Ok(4));
        assert_eq!(regs.control(), 0xF0F0_0000);
        assert_eq!(regs.status(), StatusFlags::READY);

        assert_eq!(regs.write(&0xF0F0_0001_u32.to_ne_bytes()), Ok(4));
        assert_eq!(regs.status(), StatusFlags::BUSY);
    }

    #[test]
    fn undersized_write_leaves_every_register_unchanged() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        regs.apply_command(ControlFlags::ENABLE.bits());
        let before = regs.snapshot();

        assert_eq!(regs.write(&[0x02, 0x00]), Err(DeviceError::InvalidArgument));
        assert_eq!(regs.snapshot(), before);
    }

    #[test]
    fn port_reads_status_into_caller_buffer() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        let mut dst = [0_u8; 4];
        assert_eq!(regs.read_status(&mut dst), Ok(4));
        assert_eq!(u32::from_ne_bytes(dst), StatusFlags::READY.bits());

        let mut short = [0_u8; 2];
        assert_eq!(regs.read_status(&mut short), Err(DeviceError::AccessFault));
    }

    #[test]
    fn port_write_drives_state_machine() {
        let mut regs = RegisterFile::initialize().expect("bank allocates");
        assert_eq!(regs.write_control(&word(ControlFlags::ENABLE)), Ok(4));
        assert_eq!(regs.status(), StatusFlags::BUSY);
    }
}
