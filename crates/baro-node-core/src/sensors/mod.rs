pub mod bmp085;

use thiserror_no_std::Error;

pub use bmp085::{BarometerReadings, Bmp085, InitializedBmp085};

/// Errors reported by sensor drivers.
///
/// `E` is the bus error type. Bus failures are wrapped unchanged so the caller
/// can still tell a timeout from a rejected byte.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError<E> {
    #[error("bus error: {0:?}")]
    Bus(E),
    #[error("invalid oversampling level {0}")]
    InvalidMode(u8),
    #[error("calibration register {register:#04x} reads {value:#06x}")]
    InvalidCalibration { register: u8, value: u16 },
    #[error("reference pressure must be positive, got {0} Pa")]
    InvalidReference(i32),
    /// A compensation step divided by zero or overflowed, or a barometric
    /// conversion had no finite result in range
    #[error("compensation or barometric conversion has no valid result")]
    CompensationFailed,
    #[error("unexpected chip id {0:#04x}")]
    UnknownChip(u8),
}

impl<E> From<E> for SensorError<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

/// Trait for sensor reading data structures.
/// Provides compile-time guarantees about the number of values and their conversion to arrays.
pub trait SensorReadings<const COUNT: usize> {
    /// Convert the readings into a fixed-size array.
    fn to_array(self) -> [i32; COUNT];
}

/// Trait for sensors that produce typed readings.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings this sensor produces.
    type Readings: SensorReadings<COUNT> + Copy;
    type Error;

    /// Read the sensor and return typed readings.
    fn read(&mut self) -> Result<Self::Readings, Self::Error>;
}
