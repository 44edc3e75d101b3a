//! Simulated TWI controller with a BMP085 attached, for host tests

use super::controller::{TwiCommand, TwiController, status};

/// Injected misbehaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    None,
    StartNeverCompletes,
    StopNeverCompletes,
    TransmitNeverCompletes,
    ReceiveNeverCompletes,
    ReceiveBusError,
    NackData,
    WrongAddressStatus,
    /// Acknowledge the first `n` address bytes, reject every later one
    NackAddressAfter(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitAddress,
    Writing { pointer_set: bool },
    Reading,
    Ignored,
}

pub(crate) struct SimController {
    pub enabled: bool,
    pub fault: Fault,
    pub address: u8,
    pub registers: [u8; 256],
    pub raw_temperature: u16,
    pub raw_pressure: u32,

    pub starts: usize,
    pub repeated_starts: usize,
    pub stops: usize,
    pub address_phases: usize,
    pub interrupt_polls: usize,
    pub receive_acks: usize,
    pub receive_nacks: usize,
    pub last_receive_ack: Option<bool>,
    /// Register pointer writes, in order
    pub selects: Vec<u8>,
    /// Values written to the control register, in order
    pub control_writes: Vec<u8>,

    held: bool,
    phase: Phase,
    pointer: u8,
    flag: bool,
    status: u8,
    data: u8,
}

impl SimController {
    /// A BMP085 loaded with the datasheet example calibration and raw codes.
    pub fn bmp085() -> Self {
        let mut sim = Self {
            enabled: false,
            fault: Fault::None,
            address: 0x77,
            registers: [0; 256],
            raw_temperature: 27898,
            raw_pressure: 23843,
            starts: 0,
            repeated_starts: 0,
            stops: 0,
            address_phases: 0,
            interrupt_polls: 0,
            receive_acks: 0,
            receive_nacks: 0,
            last_receive_ack: None,
            selects: Vec::new(),
            control_writes: Vec::new(),
            held: false,
            phase: Phase::Idle,
            pointer: 0,
            flag: false,
            status: status::NO_INFO,
            data: 0,
        };

        let coefficients: [(u8, u16); 11] = [
            (0xAA, 408),
            (0xAC, -72i16 as u16),
            (0xAE, -14383i16 as u16),
            (0xB0, 32741),
            (0xB2, 32757),
            (0xB4, 23153),
            (0xB6, 6190),
            (0xB8, 4),
            (0xBA, -32768i16 as u16),
            (0xBC, -8711i16 as u16),
            (0xBE, 2868),
        ];
        for (register, value) in coefficients {
            sim.set_register_u16(register, value);
        }
        sim.registers[0xD0] = 0x55;
        sim
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn set_register_u16(&mut self, register: u8, value: u16) {
        let [msb, lsb] = value.to_be_bytes();
        self.registers[register as usize] = msb;
        self.registers[register.wrapping_add(1) as usize] = lsb;
    }

    pub fn bus_held(&self) -> bool {
        self.held
    }

    fn write_register(&mut self, value: u8) {
        let register = self.pointer;
        self.registers[register as usize] = value;
        self.pointer = self.pointer.wrapping_add(1);

        match register {
            0xF4 => {
                self.control_writes.push(value);
                self.convert(value);
            }
            0xE0 if value == 0xB6 => {
                self.registers[0xF4] = 0;
            }
            _ => {}
        }
    }

    fn convert(&mut self, control: u8) {
        if control == 0x2E {
            self.set_register_u16(0xF6, self.raw_temperature);
        } else if control & 0x3F == 0x34 {
            let oss = control >> 6;
            let raw = self.raw_pressure << (8 - oss);
            self.registers[0xF6] = (raw >> 16) as u8;
            self.registers[0xF7] = (raw >> 8) as u8;
            self.registers[0xF8] = raw as u8;
        }
    }

    fn address_acked(&self, address_byte: u8) -> bool {
        if address_byte >> 1 != self.address {
            return false;
        }
        match self.fault {
            Fault::NackAddressAfter(n) => self.address_phases <= n,
            _ => true,
        }
    }

    fn transmit(&mut self, byte: u8) {
        match self.phase {
            Phase::AwaitAddress => {
                self.address_phases += 1;
                let read = byte & 1 == 1;
                if self.address_acked(byte) {
                    self.phase = if read {
                        Phase::Reading
                    } else {
                        Phase::Writing { pointer_set: false }
                    };
                    self.status = match (self.fault, read) {
                        (Fault::WrongAddressStatus, _) => status::SLA_W_ACK,
                        (_, true) => status::SLA_R_ACK,
                        (_, false) => status::SLA_W_ACK,
                    };
                } else {
                    self.phase = Phase::Ignored;
                    self.status = if read {
                        status::SLA_R_NACK
                    } else {
                        status::SLA_W_NACK
                    };
                }
            }
            Phase::Writing { pointer_set } => {
                if self.fault == Fault::NackData {
                    self.status = status::DATA_W_NACK;
                    return;
                }
                if pointer_set {
                    self.write_register(byte);
                } else {
                    self.pointer = byte;
                    self.selects.push(byte);
                    self.phase = Phase::Writing { pointer_set: true };
                }
                self.status = status::DATA_W_ACK;
            }
            Phase::Idle | Phase::Reading | Phase::Ignored => {
                self.status = status::BUS_ERROR;
            }
        }
    }

    fn receive(&mut self, ack: bool) {
        if self.fault == Fault::ReceiveBusError || self.phase != Phase::Reading {
            self.status = status::BUS_ERROR;
            return;
        }
        if ack {
            self.receive_acks += 1;
        } else {
            self.receive_nacks += 1;
        }
        self.last_receive_ack = Some(ack);
        self.data = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        self.status = if ack {
            status::DATA_R_ACK
        } else {
            status::DATA_R_NACK
        };
    }
}

impl TwiController for SimController {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn issue(&mut self, command: TwiCommand) {
        match command {
            TwiCommand::Start => {
                self.status = if self.held {
                    self.repeated_starts += 1;
                    status::REPEATED_START
                } else {
                    self.starts += 1;
                    status::START
                };
                self.held = true;
                self.phase = Phase::AwaitAddress;
                self.flag = self.fault != Fault::StartNeverCompletes;
            }
            TwiCommand::Transmit(byte) => {
                self.flag = self.fault != Fault::TransmitNeverCompletes;
                if self.flag {
                    self.transmit(byte);
                }
            }
            TwiCommand::Receive { ack } => {
                self.flag = self.fault != Fault::ReceiveNeverCompletes;
                if self.flag {
                    self.receive(ack);
                }
            }
            TwiCommand::Stop => {
                self.stops += 1;
                self.held = false;
                self.phase = Phase::Idle;
                self.status = status::NO_INFO;
            }
        }
    }

    fn interrupt_flag(&mut self) -> bool {
        self.interrupt_polls += 1;
        self.flag
    }

    fn stop_pending(&mut self) -> bool {
        self.fault == Fault::StopNeverCompletes
    }

    fn status(&mut self) -> u8 {
        self.status
    }

    fn data(&mut self) -> u8 {
        self.data
    }
}
