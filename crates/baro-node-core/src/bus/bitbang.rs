//! Bit-banged TWI controller over two open-drain GPIOs
//!
//! Drives SDA and SCL through embedded-hal pins and reports the same status
//! codes a hardware TWI peripheral would, so [`TwiBus`](super::TwiBus) cannot
//! tell the difference.
//!
//! Both pins must be configured as open-drain outputs with input enabled and a
//! pull-up: `set_high` releases the line, `set_low` drives it low.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use super::controller::{TwiCommand, TwiController, spin_until, status};

/// Half an SCL period at 100 kHz standard mode
const HALF_PERIOD_NS: u32 = 5_000;

/// Polls allowed for a target that holds SCL low (clock stretching)
const STRETCH_BUDGET: u16 = 1000;

/// A pin failed or a line did not reach the level it was released to.
struct LineFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitAddress,
    Writing,
    Reading,
}

pub struct BitBangController<SDA, SCL, D> {
    sda: SDA,
    scl: SCL,
    delay: D,
    phase: Phase,
    held: bool,
    flag: bool,
    stop_pending: bool,
    status: u8,
    data: u8,
}

impl<SDA, SCL, D> BitBangController<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(sda: SDA, scl: SCL, delay: D) -> Self {
        Self {
            sda,
            scl,
            delay,
            phase: Phase::Idle,
            held: false,
            flag: false,
            stop_pending: false,
            status: status::NO_INFO,
            data: 0,
        }
    }

    /// Give the pins and the delay back.
    pub fn release(self) -> (SDA, SCL, D) {
        (self.sda, self.scl, self.delay)
    }

    fn half_delay(&mut self) {
        self.delay.delay_ns(HALF_PERIOD_NS);
    }

    fn sda(&mut self, high: bool) -> Result<(), LineFault> {
        let result = if high {
            self.sda.set_high()
        } else {
            self.sda.set_low()
        };
        result.map_err(|_| LineFault)
    }

    fn scl_low(&mut self) -> Result<(), LineFault> {
        self.scl.set_low().map_err(|_| LineFault)
    }

    fn release_scl(&mut self) -> Result<(), LineFault> {
        self.scl.set_high().map_err(|_| LineFault)?;
        let scl = &mut self.scl;
        if spin_until(STRETCH_BUDGET, || scl.is_high().unwrap_or(false)) {
            Ok(())
        } else {
            Err(LineFault)
        }
    }

    fn clock_out(&mut self, high: bool) -> Result<(), LineFault> {
        self.sda(high)?;
        self.half_delay();
        self.release_scl()?;
        self.half_delay();
        self.scl_low()
    }

    fn clock_in(&mut self) -> Result<bool, LineFault> {
        self.sda(true)?;
        self.half_delay();
        self.release_scl()?;
        let bit = self.sda.is_high().map_err(|_| LineFault)?;
        self.half_delay();
        self.scl_low()?;
        Ok(bit)
    }

    fn start_condition(&mut self) -> Result<(), LineFault> {
        // SDA released before SCL so a repeated START is not read as a STOP
        self.sda(true)?;
        self.half_delay();
        self.release_scl()?;
        self.half_delay();
        self.sda(false)?;
        self.half_delay();
        self.scl_low()
    }

    fn stop_condition(&mut self) -> Result<(), LineFault> {
        self.sda(false)?;
        self.half_delay();
        self.release_lines()
    }

    /// SCL then SDA, which is a STOP when SDA was low.
    fn release_lines(&mut self) -> Result<(), LineFault> {
        self.release_scl()?;
        self.half_delay();
        self.sda(true)?;
        self.half_delay();
        match self.sda.is_high() {
            Ok(true) => Ok(()),
            _ => Err(LineFault),
        }
    }

    /// Shift out `byte` MSB first. Returns `true` when the target ACKed.
    fn shift_out(&mut self, byte: u8) -> Result<bool, LineFault> {
        for bit in (0..8).rev() {
            self.clock_out((byte >> bit) & 1 == 1)?;
        }
        let nack = self.clock_in()?;
        Ok(!nack)
    }

    fn shift_in(&mut self, ack: bool) -> Result<u8, LineFault> {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.clock_in()?);
        }
        self.clock_out(!ack)?;
        Ok(byte)
    }

    fn transmit(&mut self, byte: u8) -> Result<(), LineFault> {
        match self.phase {
            Phase::AwaitAddress => {
                let read = byte & 1 == 1;
                let acked = self.shift_out(byte)?;
                self.status = match (read, acked) {
                    (false, true) => status::SLA_W_ACK,
                    (false, false) => status::SLA_W_NACK,
                    (true, true) => status::SLA_R_ACK,
                    (true, false) => status::SLA_R_NACK,
                };
                self.phase = match (read, acked) {
                    (_, false) => Phase::Idle,
                    (true, true) => Phase::Reading,
                    (false, true) => Phase::Writing,
                };
            }
            Phase::Writing => {
                self.status = if self.shift_out(byte)? {
                    status::DATA_W_ACK
                } else {
                    status::DATA_W_NACK
                };
            }
            Phase::Idle | Phase::Reading => self.status = status::BUS_ERROR,
        }
        Ok(())
    }

    fn receive(&mut self, ack: bool) -> Result<(), LineFault> {
        if self.phase != Phase::Reading {
            self.status = status::BUS_ERROR;
            return Ok(());
        }
        self.data = self.shift_in(ack)?;
        self.status = if ack {
            status::DATA_R_ACK
        } else {
            status::DATA_R_NACK
        };
        Ok(())
    }
}

impl<SDA, SCL, D> TwiController for BitBangController<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    fn enable(&mut self) {
        // Idle bus: both lines released
        let sda = self.sda(true);
        let scl = self.scl.set_high().map_err(|_| LineFault);
        if sda.is_err() || scl.is_err() {
            warn!("I2C: could not release the bus lines");
        }
        self.phase = Phase::Idle;
        self.held = false;
    }

    fn issue(&mut self, command: TwiCommand) {
        self.flag = false;
        let outcome = match command {
            TwiCommand::Start => {
                let repeated = self.held;
                self.held = true;
                self.start_condition().map(|()| {
                    self.status = if repeated {
                        status::REPEATED_START
                    } else {
                        status::START
                    };
                    self.phase = Phase::AwaitAddress;
                })
            }
            TwiCommand::Transmit(byte) => self.transmit(byte),
            TwiCommand::Receive { ack } => self.receive(ack),
            TwiCommand::Stop => {
                self.held = false;
                self.phase = Phase::Idle;
                self.stop_pending = self.stop_condition().is_err();
                self.status = status::NO_INFO;
                return;
            }
        };

        match outcome {
            Ok(()) => self.flag = true,
            // The flag stays clear, the engine reports a timeout
            Err(LineFault) => self.status = status::BUS_ERROR,
        }
    }

    fn interrupt_flag(&mut self) -> bool {
        self.flag
    }

    fn stop_pending(&mut self) -> bool {
        if self.stop_pending {
            // A target may have let go of SCL or SDA in the meantime
            self.stop_pending = self.release_lines().is_err();
        }
        self.stop_pending
    }

    fn status(&mut self) -> u8 {
        self.status
    }

    fn data(&mut self) -> u8 {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, Direction, TwiBus, TwoWireBus, WritePhase};
    use crate::config::BusConfig;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::rc::Rc;

    #[derive(Default)]
    struct Wire {
        sda: bool,
        scl: bool,
        scl_stuck_low: bool,
        /// SDA level at every SCL rising edge
        samples: Vec<bool>,
    }

    struct Sda(Rc<RefCell<Wire>>);
    struct Scl(Rc<RefCell<Wire>>);

    impl ErrorType for Sda {
        type Error = Infallible;
    }

    impl ErrorType for Scl {
        type Error = Infallible;
    }

    impl OutputPin for Sda {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().sda = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().sda = true;
            Ok(())
        }
    }

    impl InputPin for Sda {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.borrow().sda)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.borrow().sda)
        }
    }

    impl OutputPin for Scl {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().scl = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            let mut wire = self.0.borrow_mut();
            if !wire.scl_stuck_low && !wire.scl {
                wire.scl = true;
                let sda = wire.sda;
                wire.samples.push(sda);
            }
            Ok(())
        }
    }

    impl InputPin for Scl {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0.borrow().scl)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0.borrow().scl)
        }
    }

    fn open_bus(
        wire: &Rc<RefCell<Wire>>,
    ) -> TwiBus<BitBangController<Sda, Scl, NoopDelay>> {
        let controller =
            BitBangController::new(Sda(wire.clone()), Scl(wire.clone()), NoopDelay::new());
        TwiBus::new(controller, BusConfig::default())
    }

    #[test]
    fn test_absent_device_is_nacked() {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let mut bus = open_bus(&wire);

        assert_eq!(
            bus.scan(0x77),
            Err(BusError::WriteRejected {
                phase: WritePhase::Address,
                status: status::SLA_W_NACK,
            })
        );

        // STOP leaves both lines released
        let wire = wire.borrow();
        assert!(wire.sda);
        assert!(wire.scl);
    }

    #[test]
    fn test_address_shifted_out_msb_first() {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let mut bus = open_bus(&wire);
        wire.borrow_mut().samples.clear();

        let _ = bus.start(Direction::Write.address_byte(0x77));
        let _ = bus.stop();

        let samples = wire.borrow().samples.clone();
        // SCL idles high, so the first START has no rising edge:
        // 8 address bits, ACK slot, STOP edge
        assert_eq!(samples.len(), 10);
        assert_eq!(
            &samples[0..8],
            &[true, true, true, false, true, true, true, false]
        );
        // Nobody pulled SDA low in the ACK slot
        assert!(samples[8]);
        assert!(!samples[9]);
    }

    #[test]
    fn test_stuck_clock_times_out_start() {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let mut bus = open_bus(&wire);
        wire.borrow_mut().scl = false;
        wire.borrow_mut().scl_stuck_low = true;

        assert_eq!(bus.start(0xEE), Err(BusError::StartTimeout));
    }

    #[test]
    fn test_stop_completes_once_clock_is_released() {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let mut bus = open_bus(&wire);
        let _ = bus.start(Direction::Write.address_byte(0x77));

        wire.borrow_mut().scl_stuck_low = true;
        assert_eq!(bus.stop(), Err(BusError::StopTimeout));
        // SDA is still driven low from the first half of the STOP
        assert!(!wire.borrow().sda);

        wire.borrow_mut().scl_stuck_low = false;
        assert!(!bus.controller_mut().stop_pending());
        let wire = wire.borrow();
        assert!(wire.sda);
        assert!(wire.scl);
    }

    #[test]
    fn test_enable_releases_both_lines() {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let _bus = open_bus(&wire);

        let wire = wire.borrow();
        assert!(wire.sda);
        assert!(wire.scl);
    }
}
