//! Bus transaction engine over a [`TwiController`]

use embedded_hal::i2c::{ErrorType, I2c, Operation};
use log::{trace, warn};

use super::controller::{TwiCommand, TwiController, spin_until, status};
use super::{Ack, BusError, Direction, TwoWireBus, WritePhase};
use crate::config::BusConfig;

/// Number of addresses probed by [`TwiBus::scan_bus`] (`0x08..=0x77`).
pub const SCAN_CAPACITY: usize = 112;

/// Two-wire bus master.
///
/// Owns the controller for its whole lifetime. Holding `&mut TwiBus` is what
/// allows issuing transactions, so two transactions can never interleave on
/// the wire within one flow of control.
pub struct TwiBus<C> {
    controller: C,
    config: BusConfig,
}

impl<C: TwiController> TwiBus<C> {
    /// Enable the controller and take ownership of it.
    pub fn new(mut controller: C, config: BusConfig) -> Self {
        controller.enable();
        Self { controller, config }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Give the controller back.
    pub fn release(self) -> C {
        self.controller
    }

    fn wait_for_interrupt(&mut self) -> bool {
        let controller = &mut self.controller;
        spin_until(self.config.spin_budget, || controller.interrupt_flag())
    }

    fn transmit(&mut self, byte: u8) -> Result<u8, BusError> {
        self.controller.issue(TwiCommand::Transmit(byte));
        if !self.wait_for_interrupt() {
            warn!("I2C: transmit of {:#04x} timed out", byte);
            return Err(BusError::WriteTimeout);
        }
        Ok(self.controller.status())
    }

    /// Probe every valid 7-bit address and collect the ones that answer.
    pub fn scan_bus(&mut self) -> heapless::Vec<u8, SCAN_CAPACITY> {
        let mut found = heapless::Vec::new();
        for address in 0x08..=0x77 {
            if self.scan(address).is_ok() {
                trace!("I2C: device answered at {:#04x}", address);
                // The range holds exactly SCAN_CAPACITY addresses
                let _ = found.push(address);
            }
        }
        found
    }

    fn run_operations(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), BusError> {
        if operations.is_empty() {
            return self.start(Direction::Write.address_byte(address));
        }

        let mut current: Option<Direction> = None;
        for index in 0..operations.len() {
            let next_is_read = matches!(operations.get(index + 1), Some(Operation::Read(_)));
            let Some(operation) = operations.get_mut(index) else {
                break;
            };

            match operation {
                Operation::Write(bytes) => {
                    if current != Some(Direction::Write) {
                        self.start(Direction::Write.address_byte(address))?;
                        current = Some(Direction::Write);
                    }
                    for &byte in bytes.iter() {
                        self.write_byte(byte)?;
                    }
                }
                Operation::Read(buffer) => {
                    if current != Some(Direction::Read) {
                        self.start(Direction::Read.address_byte(address))?;
                        current = Some(Direction::Read);
                    }
                    // Adjacent reads form one transfer, only its final byte is NACKed
                    let last = buffer.len().saturating_sub(1);
                    for (position, slot) in buffer.iter_mut().enumerate() {
                        let ack = if position == last && !next_is_read {
                            Ack::Nack
                        } else {
                            Ack::Ack
                        };
                        *slot = self.read_byte(ack)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<C: TwiController> TwoWireBus for TwiBus<C> {
    fn start(&mut self, address_byte: u8) -> Result<(), BusError> {
        trace!("I2C: START, address byte {:#04x}", address_byte);
        self.controller.issue(TwiCommand::Start);
        if !self.wait_for_interrupt() {
            warn!("I2C: START timed out");
            return Err(BusError::StartTimeout);
        }

        let expected = match Direction::of(address_byte) {
            Direction::Write => status::SLA_W_ACK,
            Direction::Read => status::SLA_R_ACK,
        };
        let status = self.transmit(address_byte)?;
        if status != expected {
            warn!(
                "I2C: address byte {:#04x} rejected, status {:#04x}",
                address_byte, status
            );
            return Err(BusError::WriteRejected {
                phase: WritePhase::Address,
                status,
            });
        }
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        let status = self.transmit(byte)?;
        // Address acknowledge codes are accepted here as well
        if !matches!(
            status,
            status::DATA_W_ACK | status::SLA_W_ACK | status::SLA_R_ACK
        ) {
            warn!("I2C: data byte rejected, status {:#04x}", status);
            return Err(BusError::WriteRejected {
                phase: WritePhase::Data,
                status,
            });
        }
        Ok(())
    }

    fn read_byte(&mut self, ack: Ack) -> Result<u8, BusError> {
        self.controller.issue(TwiCommand::Receive {
            ack: ack == Ack::Ack,
        });
        if !self.wait_for_interrupt() {
            let status = self.controller.status();
            warn!("I2C: receive timed out, status {:#04x}", status);
            return Err(BusError::ReadTimeout { status });
        }

        match self.controller.status() {
            status::DATA_R_ACK | status::DATA_R_NACK => Ok(self.controller.data()),
            status => {
                warn!("I2C: unexpected receive status {:#04x}", status);
                Err(BusError::ReadUnexpectedStatus { status })
            }
        }
    }

    fn stop(&mut self) -> Result<(), BusError> {
        trace!("I2C: STOP");
        self.controller.issue(TwiCommand::Stop);
        let controller = &mut self.controller;
        if !spin_until(self.config.spin_budget, || !controller.stop_pending()) {
            warn!("I2C: STOP timed out");
            return Err(BusError::StopTimeout);
        }
        Ok(())
    }
}

impl<C> ErrorType for TwiBus<C> {
    type Error = BusError;
}

impl<C: TwiController> I2c for TwiBus<C> {
    /// Runs `operations` between one START and one STOP.
    ///
    /// A repeated START is generated whenever the direction changes. The STOP
    /// is issued even when an operation fails; the first error wins.
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.run_operations(address, operations);
        let stopped = self.stop();
        result.and(stopped)
    }
}
