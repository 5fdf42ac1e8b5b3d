//! Register identifiers, bit vocabularies, and the host-visible snapshot.

use bitflags::bitflags;

/// Number of registers in the emulated peripheral.
pub const REGISTER_COUNT: usize = 4;

/// Width in bytes of one register transfer.
pub const REGISTER_BYTES: usize = 4;

bitflags! {
    /// Command bits carried by the control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u32 {
        /// Requests the device start working (`BUSY`).
        const ENABLE = 1 << 0;
        /// Clears the counter and returns the device to `READY`.
        const RESET = 1 << 1;
    }
}

bitflags! {
    /// State bits reported by the status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u32 {
        /// Idle and accepting commands.
        const READY = 1 << 0;
        /// Processing a previously accepted `ENABLE`.
        const BUSY = 1 << 1;
        /// Reserved error indication; no defined command sets it.
        const ERROR = 1 << 2;
    }
}

impl ControlFlags {
    /// Returns the bits outside the recognised command vocabulary.
    #[must_use]
    pub const fn reserved_bits(self) -> u32 {
        self.bits() & !Self::all().bits()
    }
}

/// Register identifier within the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// Last command word written by a client.
    Control = 0,
    /// Current device state bits.
    Status = 1,
    /// Reserved payload register.
    Data = 2,
    /// Resettable counter.
    Counter = 3,
}

impl Register {
    /// Returns the bank index for this register (`0..=3`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lower-case register name used in trace logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Status => "status",
            Self::Data => "data",
            Self::Counter => "counter",
        }
    }
}

/// Point-in-time copy of all four registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterSnapshot {
    /// Control register value.
    pub control: u32,
    /// Status register value.
    pub status: u32,
    /// Data register value.
    pub data: u32,
    /// Counter register value.
    pub counter: u32,
}

impl RegisterSnapshot {
    /// Status bits decoded from the raw status value.
    #[must_use]
    pub const fn status_flags(&self) -> StatusFlags {
        StatusFlags::from_bits_retain(self.status)
    }
}
