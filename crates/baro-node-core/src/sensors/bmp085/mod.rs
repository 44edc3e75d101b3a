//! BMP085 barometric pressure sensor
//!
//! The driver is a typestate pair. [`Bmp085`] only owns the bus and a delay;
//! [`Bmp085::initialize`] reads the factory calibration, seeds the temperature
//! term and anchors the altitude reference, returning an [`InitializedBmp085`].
//!
//! Every register access is one write transaction selecting the register
//! followed by a separate read transaction, so any [`embedded_hal::i2c::I2c`]
//! implementation works, including [`TwiBus`](crate::bus::TwiBus) and
//! [`SharedI2cDevice`](crate::shared_bus::SharedI2cDevice).

mod calibration;
mod reference;
mod registers;

pub use calibration::{Calibration, CompensatedTemperature};
pub use reference::{ReferenceCalibration, SEA_LEVEL_PA, altitude_cm, reduced_pressure_pa};
pub use registers::{
    CHIP_ID, DEFAULT_ADDRESS, Oversampling, Register, TEMPERATURE_CONVERSION_MS, command,
};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error, info};

use super::{Sensor, SensorError, SensorReadings};
use crate::config::{Bmp085Config, Reference, TemperatureUpdate};

/// Start-up time after a soft reset
const RESET_SETTLE_MS: u32 = 10;

type Result<T, E> = core::result::Result<T, SensorError<E>>;

struct Device<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Device<I2C, D> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[register, value])?;
        Ok(())
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[register])?;
        self.i2c.read(self.address, buffer)?;
        Ok(())
    }

    fn read_u16(&mut self, register: Register) -> Result<u16, I2C::Error> {
        let mut buffer = [0u8; 2];
        self.read_registers(register.addr(), &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    /// Read all eleven coefficients, one two-byte transfer each.
    fn read_calibration(&mut self) -> Result<Calibration, I2C::Error> {
        let mut words = [0u16; 11];
        for (word, register) in words.iter_mut().zip(Register::CALIBRATION) {
            let value = self.read_u16(register)?;
            // Erased or disconnected EEPROM
            if value == 0x0000 || value == 0xFFFF {
                return Err(SensorError::InvalidCalibration {
                    register: register.addr(),
                    value,
                });
            }
            *word = value;
        }
        Ok(Calibration::from_words(words))
    }

    fn read_raw_temperature(&mut self) -> Result<u16, I2C::Error> {
        self.write_register(Register::Control.addr(), command::READ_TEMPERATURE)?;
        self.delay.delay_ms(TEMPERATURE_CONVERSION_MS);
        let ut = self.read_u16(Register::Output)?;
        debug!("BMP085: UT = {}", ut);
        Ok(ut)
    }

    fn read_raw_pressure(&mut self, oversampling: Oversampling) -> Result<i32, I2C::Error> {
        self.write_register(Register::Control.addr(), oversampling.pressure_command())?;
        self.delay.delay_ms(oversampling.conversion_time_ms());

        let mut buffer = [0u8; 4];
        self.read_registers(Register::Output.addr(), &mut buffer[1..])?;
        let up = i32::from_be_bytes(buffer) >> (8 - oversampling.level());
        debug!("BMP085: UP = {} (oss {})", up, oversampling.level());
        Ok(up)
    }

    fn chip_id(&mut self) -> Result<u8, I2C::Error> {
        let mut id = [0u8; 1];
        self.read_registers(Register::ChipId.addr(), &mut id)?;
        Ok(id[0])
    }

    fn soft_reset(&mut self) -> Result<(), I2C::Error> {
        self.write_register(Register::SoftReset.addr(), command::SOFT_RESET)?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }
}

/// BMP085 that has not read its calibration yet.
pub struct Bmp085<I2C, D> {
    device: Device<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> Bmp085<I2C, D> {
    /// Driver at [`DEFAULT_ADDRESS`] until [`Bmp085::initialize`] applies the
    /// configured address.
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            device: Device {
                i2c,
                delay,
                address: DEFAULT_ADDRESS,
            },
        }
    }

    pub fn address(&self) -> u8 {
        self.device.address
    }

    pub fn chip_id(&mut self) -> Result<u8, I2C::Error> {
        self.device.chip_id()
    }

    /// Check that the device answers with the BMP085 chip id.
    pub fn verify_chip(&mut self) -> Result<(), I2C::Error> {
        match self.device.chip_id()? {
            CHIP_ID => Ok(()),
            other => Err(SensorError::UnknownChip(other)),
        }
    }

    pub fn soft_reset(&mut self) -> Result<(), I2C::Error> {
        self.device.soft_reset()
    }

    /// Read the calibration, seed the temperature term and anchor the
    /// reference from `config`.
    ///
    /// `config.address` is the only source of the device address and stays
    /// in effect after a failure. On failure the error is returned together
    /// with the still uninitialized driver.
    pub fn initialize(
        mut self,
        config: Bmp085Config,
    ) -> core::result::Result<InitializedBmp085<I2C, D>, (Self, SensorError<I2C::Error>)> {
        self.device.address = config.address;

        let seeded = self.device.read_calibration().and_then(|calibration| {
            let ut = self.device.read_raw_temperature()?;
            let temperature = calibration
                .compensate_temperature(ut)
                .ok_or(SensorError::CompensationFailed)?;
            Ok((calibration, temperature))
        });
        let (calibration, temperature) = match seeded {
            Ok(seeded) => seeded,
            Err(e) => {
                error!("BMP085: initialization failed: {:?}", e);
                return Err((self, e));
            }
        };

        let mut sensor = InitializedBmp085 {
            device: self.device,
            calibration,
            b5: temperature.b5,
            mode: config.oversampling,
            temperature_update: config.temperature_update,
            reference: ReferenceCalibration {
                pressure_pa: SEA_LEVEL_PA,
                altitude_cm: 0,
                altitude_offset_cm: 0,
                pressure_offset_pa: 0,
            },
        };

        let anchored = match config.reference {
            Reference::Pressure(pa) => sensor.set_local_pressure(pa),
            Reference::Altitude(cm) => sensor.set_local_absolute_altitude(cm),
        };
        if let Err(e) = anchored {
            error!("BMP085: initialization failed: {:?}", e);
            return Err((sensor.into_uninitialized(), e));
        }

        info!(
            "BMP085: initialized at {:#04x}, oss {}, {:?} temperature update",
            sensor.address(),
            sensor.mode.level(),
            sensor.temperature_update
        );
        Ok(sensor)
    }

    /// Give the bus and the delay back.
    pub fn release(self) -> (I2C, D) {
        (self.device.i2c, self.device.delay)
    }
}

/// BMP085 with a valid calibration set.
pub struct InitializedBmp085<I2C, D> {
    device: Device<I2C, D>,
    calibration: Calibration,
    b5: i32,
    mode: Oversampling,
    temperature_update: TemperatureUpdate,
    reference: ReferenceCalibration,
}

impl<I2C: I2c, D: DelayNs> InitializedBmp085<I2C, D> {
    pub fn address(&self) -> u8 {
        self.device.address
    }

    pub fn mode(&self) -> Oversampling {
        self.mode
    }

    /// Set the oversampling level (0..=3). Takes effect on the next pressure
    /// conversion.
    pub fn set_mode(&mut self, level: u8) -> Result<(), I2C::Error> {
        self.mode = Oversampling::try_from(level).map_err(SensorError::InvalidMode)?;
        Ok(())
    }

    pub fn set_oversampling(&mut self, oversampling: Oversampling) {
        self.mode = oversampling;
    }

    pub fn temperature_update(&self) -> TemperatureUpdate {
        self.temperature_update
    }

    pub fn set_temperature_update(&mut self, temperature_update: TemperatureUpdate) {
        self.temperature_update = temperature_update;
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Temperature term the pressure compensation currently uses.
    pub fn b5(&self) -> i32 {
        self.b5
    }

    pub fn reference(&self) -> &ReferenceCalibration {
        &self.reference
    }

    /// Run a temperature conversion and refresh B5.
    ///
    /// Returns the temperature in 0.1 °C.
    pub fn compute_true_temperature(&mut self) -> Result<i32, I2C::Error> {
        let ut = self.device.read_raw_temperature()?;
        let compensated = self
            .calibration
            .compensate_temperature(ut)
            .ok_or(SensorError::CompensationFailed)?;
        self.b5 = compensated.b5;
        debug!("BMP085: B5 = {}, T = {}", compensated.b5, compensated.decicelsius);
        Ok(compensated.decicelsius)
    }

    /// Run a pressure conversion and return the compensated pressure in Pa.
    ///
    /// With [`TemperatureUpdate::Auto`] a temperature conversion runs first.
    pub fn compute_true_pressure(&mut self) -> Result<i32, I2C::Error> {
        if self.temperature_update == TemperatureUpdate::Auto {
            self.compute_true_temperature()?;
        }
        self.convert_pressure()
    }

    fn convert_pressure(&mut self) -> Result<i32, I2C::Error> {
        let up = self.device.read_raw_pressure(self.mode)?;
        let pressure = self
            .calibration
            .compensate_pressure(up, self.b5, self.mode)
            .ok_or(SensorError::CompensationFailed)?;
        debug!("BMP085: p = {} Pa", pressure);
        Ok(pressure)
    }

    /// Pressure reduced to the reference level plus the pressure offset, in Pa.
    pub fn pressure(&mut self) -> Result<i32, I2C::Error> {
        let true_pa = self.compute_true_pressure()?;
        self.reference
            .pressure(true_pa)
            .ok_or(SensorError::CompensationFailed)
    }

    /// Altitude above the reference level plus the altitude offset, in cm.
    pub fn altitude(&mut self) -> Result<i32, I2C::Error> {
        let true_pa = self.compute_true_pressure()?;
        self.reference
            .altitude(true_pa)
            .ok_or(SensorError::CompensationFailed)
    }

    /// Re-read the calibration, then run a temperature conversion.
    ///
    /// Returns the temperature in 0.1 °C. The stored calibration and B5 are
    /// only replaced when every step succeeds.
    pub fn temperature(&mut self) -> Result<i32, I2C::Error> {
        let calibration = self.device.read_calibration()?;
        let ut = self.device.read_raw_temperature()?;
        let compensated = calibration
            .compensate_temperature(ut)
            .ok_or(SensorError::CompensationFailed)?;
        self.calibration = calibration;
        self.b5 = compensated.b5;
        Ok(compensated.decicelsius)
    }

    /// Anchor to a known local pressure in Pa, e.g. the QNH of a nearby
    /// airfield. The reference altitude is derived from a fresh reading.
    pub fn set_local_pressure(&mut self, pressure_pa: i32) -> Result<(), I2C::Error> {
        if pressure_pa <= 0 {
            return Err(SensorError::InvalidReference(pressure_pa));
        }
        let true_pa = self.compute_true_pressure()?;
        self.reference = self
            .reference
            .with_pressure(pressure_pa, true_pa)
            .ok_or(SensorError::CompensationFailed)?;
        info!(
            "BMP085: reference {} Pa, derived altitude {} cm",
            self.reference.pressure_pa, self.reference.altitude_cm
        );
        Ok(())
    }

    /// Anchor to a known local absolute altitude in cm. The reference pressure
    /// is derived from a fresh reading.
    pub fn set_local_absolute_altitude(&mut self, altitude_cm: i32) -> Result<(), I2C::Error> {
        let true_pa = self.compute_true_pressure()?;
        self.reference = self
            .reference
            .with_altitude(altitude_cm, true_pa)
            .ok_or(SensorError::CompensationFailed)?;
        info!(
            "BMP085: reference {} cm, derived pressure {} Pa",
            self.reference.altitude_cm, self.reference.pressure_pa
        );
        Ok(())
    }

    pub fn set_altitude_offset(&mut self, offset_cm: i32) {
        self.reference.altitude_offset_cm = offset_cm;
    }

    pub fn set_pressure_offset(&mut self, offset_pa: i32) {
        self.reference.pressure_offset_pa = offset_pa;
    }

    /// Choose both offsets so that the current reading reports exactly
    /// `pressure_pa` and `altitude_cm`.
    pub fn zero_calibrate(&mut self, pressure_pa: i32, altitude_cm: i32) -> Result<(), I2C::Error> {
        let true_pa = self.compute_true_pressure()?;
        self.reference = self
            .reference
            .zeroed(true_pa, pressure_pa, altitude_cm)
            .ok_or(SensorError::CompensationFailed)?;
        info!(
            "BMP085: offsets {} Pa, {} cm",
            self.reference.pressure_offset_pa, self.reference.altitude_offset_cm
        );
        Ok(())
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2C::Error> {
        self.device.write_register(register, value)
    }

    /// Read `buffer.len()` consecutive registers starting at `register`.
    pub fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), I2C::Error> {
        self.device.read_registers(register, buffer)
    }

    pub fn chip_id(&mut self) -> Result<u8, I2C::Error> {
        self.device.chip_id()
    }

    /// Drop the calibration, e.g. to run [`Bmp085::initialize`] again.
    pub fn into_uninitialized(self) -> Bmp085<I2C, D> {
        Bmp085 {
            device: self.device,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.device.i2c, self.device.delay)
    }
}

/// One complete set of BMP085 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarometerReadings {
    /// 0.1 °C
    pub temperature_dc: i32,
    /// Pa, reduced to the reference level
    pub pressure_pa: i32,
    /// cm above the reference level
    pub altitude_cm: i32,
}

impl SensorReadings<3> for BarometerReadings {
    fn to_array(self) -> [i32; 3] {
        [self.temperature_dc, self.pressure_pa, self.altitude_cm]
    }
}

impl<I2C: I2c, D: DelayNs> Sensor<3> for InitializedBmp085<I2C, D> {
    type Readings = BarometerReadings;
    type Error = SensorError<I2C::Error>;

    /// One temperature conversion followed by one pressure conversion; both
    /// derived values come from the same pressure reading.
    fn read(&mut self) -> core::result::Result<BarometerReadings, Self::Error> {
        let temperature_dc = self.compute_true_temperature()?;
        let true_pa = self.convert_pressure()?;
        Ok(BarometerReadings {
            temperature_dc,
            pressure_pa: self
                .reference
                .pressure(true_pa)
                .ok_or(SensorError::CompensationFailed)?,
            altitude_cm: self
                .reference
                .altitude(true_pa)
                .ok_or(SensorError::CompensationFailed)?,
        })
    }
}
