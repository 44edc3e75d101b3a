//! BMP085 register map and control values

use serde::{Deserialize, Serialize};

/// 7-bit bus address (`0xEE` / `0xEF` with the R/W bit)
pub const DEFAULT_ADDRESS: u8 = 0x77;

/// Value of the chip id register
pub const CHIP_ID: u8 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    CalibrationAc1 = 0xAA,
    CalibrationAc2 = 0xAC,
    CalibrationAc3 = 0xAE,
    CalibrationAc4 = 0xB0,
    CalibrationAc5 = 0xB2,
    CalibrationAc6 = 0xB4,
    CalibrationB1 = 0xB6,
    CalibrationB2 = 0xB8,
    CalibrationMb = 0xBA,
    CalibrationMc = 0xBC,
    CalibrationMd = 0xBE,
    ChipId = 0xD0,
    SoftReset = 0xE0,
    Control = 0xF4,
    /// MSB of the conversion result, followed by LSB (0xF7) and XLSB (0xF8)
    Output = 0xF6,
}

impl Register {
    /// Calibration words in EEPROM order.
    pub const CALIBRATION: [Register; 11] = [
        Register::CalibrationAc1,
        Register::CalibrationAc2,
        Register::CalibrationAc3,
        Register::CalibrationAc4,
        Register::CalibrationAc5,
        Register::CalibrationAc6,
        Register::CalibrationB1,
        Register::CalibrationB2,
        Register::CalibrationMb,
        Register::CalibrationMc,
        Register::CalibrationMd,
    ];

    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Values written to [`Register::Control`] and [`Register::SoftReset`].
pub mod command {
    pub const READ_TEMPERATURE: u8 = 0x2E;
    /// Oversampling setting goes in bits 6..=7
    pub const READ_PRESSURE: u8 = 0x34;
    pub const SOFT_RESET: u8 = 0xB6;
}

/// Temperature conversion time; the datasheet maximum is 4.5 ms.
pub const TEMPERATURE_CONVERSION_MS: u32 = 5;

/// Pressure oversampling setting (`oss`).
///
/// More internal samples lower the noise and lengthen the conversion.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Oversampling {
    /// 1 sample, 4.5 ms max, 3 µA, 0.06 hPa RMS noise
    UltraLowPower = 0,
    /// 2 samples, 7.5 ms max, 5 µA, 0.05 hPa RMS noise
    #[default]
    Standard = 1,
    /// 4 samples, 13.5 ms max, 7 µA, 0.04 hPa RMS noise
    HighResolution = 2,
    /// 8 samples, 25.5 ms max, 12 µA, 0.03 hPa RMS noise
    UltraHighResolution = 3,
}

impl Oversampling {
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Wait between triggering a pressure conversion and reading it out.
    pub const fn conversion_time_ms(self) -> u32 {
        match self {
            Oversampling::UltraLowPower => 5,
            Oversampling::Standard => 8,
            Oversampling::HighResolution => 14,
            Oversampling::UltraHighResolution => 26,
        }
    }

    /// Control register value that starts a pressure conversion.
    pub const fn pressure_command(self) -> u8 {
        command::READ_PRESSURE | (self.level() << 6)
    }
}

impl TryFrom<u8> for Oversampling {
    type Error = u8;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Oversampling::UltraLowPower),
            1 => Ok(Oversampling::Standard),
            2 => Ok(Oversampling::HighResolution),
            3 => Ok(Oversampling::UltraHighResolution),
            other => Err(other),
        }
    }
}
