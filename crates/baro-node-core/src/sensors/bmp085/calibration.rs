//! Factory calibration and fixed-point compensation
//!
//! The arithmetic follows the BMP085 datasheet step by step. Shift amounts,
//! truncating divisions and the order of operations all affect the result, so
//! nothing here may be simplified algebraically.

use super::registers::Oversampling;

/// Calibration coefficients from the sensor EEPROM.
///
/// Programmed individually for each device at the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

/// Output of the temperature compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensatedTemperature {
    /// Intermediate term the pressure compensation depends on
    pub b5: i32,
    /// Temperature in 0.1 °C
    pub decicelsius: i32,
}

impl Calibration {
    /// Build the set from the eleven raw words in EEPROM order.
    pub fn from_words(words: [u16; 11]) -> Self {
        let [ac1, ac2, ac3, ac4, ac5, ac6, b1, b2, mb, mc, md] = words;
        Self {
            ac1: ac1 as i16,
            ac2: ac2 as i16,
            ac3: ac3 as i16,
            ac4,
            ac5,
            ac6,
            b1: b1 as i16,
            b2: b2 as i16,
            mb: mb as i16,
            mc: mc as i16,
            md: md as i16,
        }
    }

    /// Compensate an uncompensated temperature code (UT).
    ///
    /// Returns `None` when the coefficients produce a zero divisor or a B5
    /// outside `i32`, which only happens with corrupt calibration data.
    pub fn compensate_temperature(&self, ut: u16) -> Option<CompensatedTemperature> {
        let x1 = ((i64::from(ut) - i64::from(self.ac6)) * i64::from(self.ac5)) >> 15;
        let x2 = (i64::from(self.mc) << 11).checked_div(x1 + i64::from(self.md))?;
        let b5 = i32::try_from(x1 + x2).ok()?;

        Some(CompensatedTemperature {
            b5,
            decicelsius: (b5 + 8) >> 4,
        })
    }

    /// Compensate an uncompensated pressure code (UP) to Pa.
    ///
    /// `up` is the 24-bit conversion result already shifted right by
    /// `8 - oss`. Signed intermediates are 32-bit and wrap like the reference
    /// implementation; `b4` and `b7` are unsigned.
    pub fn compensate_pressure(&self, up: i32, b5: i32, oversampling: Oversampling) -> Option<i32> {
        let oss = u32::from(oversampling.level());

        let b6 = b5.wrapping_sub(4000);
        let b6_squared = b6.wrapping_mul(b6) >> 12;

        let x1 = i32::from(self.b2).wrapping_mul(b6_squared) >> 11;
        let x2 = i32::from(self.ac2).wrapping_mul(b6) >> 11;
        let x3 = x1.wrapping_add(x2);
        let b3 = ((i32::from(self.ac1).wrapping_mul(4).wrapping_add(x3) << oss).wrapping_add(2)) >> 2;

        let x1 = i32::from(self.ac3).wrapping_mul(b6) >> 13;
        let x2 = i32::from(self.b1).wrapping_mul(b6_squared) >> 16;
        let x3 = x1.wrapping_add(x2).wrapping_add(2) >> 2;
        let b4 = u32::from(self.ac4).wrapping_mul(x3.wrapping_add(32768) as u32) >> 15;
        if b4 == 0 {
            return None;
        }

        let b7 = (up as u32).wrapping_sub(b3 as u32).wrapping_mul(50000 >> oss);
        // Doubling first keeps precision, but only while b7 fits in 31 bits
        let p = if b7 < 0x8000_0000 {
            (b7 << 1) / b4
        } else {
            (b7 / b4) << 1
        } as i32;

        let x1 = (p >> 8).wrapping_mul(p >> 8);
        let x1 = x1.wrapping_mul(3038) >> 16;
        let x2 = (-7357i32).wrapping_mul(p) >> 16;
        Some(p.wrapping_add(x1.wrapping_add(x2).wrapping_add(3791) >> 4))
    }
}
