//! Two-wire (I²C/TWI) bus transaction engine
//!
//! The engine is split in two layers:
//!
//! - [`TwiController`]: the register-level seam. One implementation per
//!   physical target (hardware TWI peripheral, bit-banged GPIO pair, or a
//!   simulated controller in tests).
//! - [`TwiBus`]: drives a controller through START / ADDRESS / DATA / STOP,
//!   bounding every wait by an iteration budget and validating the status
//!   code after each phase.
//!
//! [`TwoWireBus`] is the byte-level operation set the engine exposes. On top
//! of it, [`TwiBus`] also implements [`embedded_hal::i2c::I2c`], so sensor
//! drivers written against embedded-hal run on it unchanged.
//!
//! Every START issued by the engine is paired with exactly one STOP, on every
//! exit path, including the error paths of a multi-byte transfer.

mod bitbang;
mod controller;
mod engine;

#[cfg(test)]
pub(crate) mod sim;

pub use bitbang::BitBangController;
pub use controller::{TwiCommand, TwiController, spin_until, status};
pub use engine::{SCAN_CAPACITY, TwiBus};

use thiserror_no_std::Error;

/// Data direction encoded in the R/W bit of the address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Combine a 7-bit device address with the R/W bit.
    pub const fn address_byte(self, address: u8) -> u8 {
        match self {
            Direction::Write => address << 1,
            Direction::Read => (address << 1) | 1,
        }
    }

    /// Direction encoded in an address byte.
    pub const fn of(address_byte: u8) -> Self {
        if address_byte & 1 == 1 {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// Acknowledge bit the controller returns after receiving a byte.
///
/// `Nack` tells the target that this is the last byte of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ack,
    Nack,
}

/// Which part of a write was not acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Address,
    Data,
}

/// Failures reported by the bus engine.
///
/// All of them are transient from the caller's perspective. The engine never
/// retries on its own.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("START condition did not complete")]
    StartTimeout,
    #[error("STOP condition did not complete")]
    StopTimeout,
    #[error("byte transmission did not complete")]
    WriteTimeout,
    #[error("{phase:?} byte rejected (status {status:#04x})")]
    WriteRejected {
        /// Address or data phase
        phase: WritePhase,
        /// Raw controller status code
        status: u8,
    },
    #[error("byte reception did not complete (status {status:#04x})")]
    ReadTimeout {
        /// Raw controller status code at the time the budget ran out
        status: u8,
    },
    #[error("unexpected status {status:#04x} after byte reception")]
    ReadUnexpectedStatus {
        /// Raw controller status code
        status: u8,
    },
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            BusError::WriteRejected {
                phase: WritePhase::Address,
                ..
            } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            BusError::WriteRejected {
                phase: WritePhase::Data,
                ..
            } => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            _ => ErrorKind::Other,
        }
    }
}

/// Byte-level operation set of a two-wire bus master.
///
/// Implementations never retry internally. A caller that gets an error in the
/// middle of a transfer must still call [`TwoWireBus::stop`] to release the bus.
pub trait TwoWireBus {
    /// Issue a START (or repeated START) and transmit the address byte.
    ///
    /// `address_byte` is the 7-bit address shifted left with the R/W bit in
    /// bit 0, see [`Direction::address_byte`].
    fn start(&mut self, address_byte: u8) -> Result<(), BusError>;

    /// Transmit one data byte and check that the target acknowledged it.
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;

    /// Receive one byte, answering with `ack`.
    fn read_byte(&mut self, ack: Ack) -> Result<u8, BusError>;

    /// Issue a STOP and wait for the controller to release the bus.
    fn stop(&mut self) -> Result<(), BusError>;

    /// Probe a 7-bit address for presence.
    ///
    /// START followed by an unconditional STOP. Reports the START result first,
    /// then the STOP result.
    fn scan(&mut self, address: u8) -> Result<(), BusError> {
        let started = self.start(Direction::Write.address_byte(address));
        let stopped = self.stop();
        started.and(stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};

    #[test]
    fn test_address_byte_direction() {
        assert_eq!(Direction::Write.address_byte(0x77), 0xEE);
        assert_eq!(Direction::Read.address_byte(0x77), 0xEF);
        assert_eq!(Direction::of(0xEF), Direction::Read);
        assert_eq!(Direction::of(0xEE), Direction::Write);
    }

    #[test]
    fn test_error_kind_mapping() {
        let address = BusError::WriteRejected {
            phase: WritePhase::Address,
            status: status::SLA_W_NACK,
        };
        assert_eq!(
            address.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );

        let data = BusError::WriteRejected {
            phase: WritePhase::Data,
            status: status::DATA_W_NACK,
        };
        assert_eq!(
            data.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );

        assert_eq!(BusError::StartTimeout.kind(), ErrorKind::Other);
    }
}
