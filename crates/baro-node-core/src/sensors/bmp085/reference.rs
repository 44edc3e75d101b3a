//! Barometric altitude/pressure conversion anchored to a local reference
//!
//! Uses the international barometric formula in the form given by the BMP085
//! datasheet, scaled to centimetres. Results are truncated toward zero.

use libm::powf;
use serde::{Deserialize, Serialize};

/// 44330 m expressed in cm
const SCALE_CM: f32 = 4_433_000.0;
const PRESSURE_EXPONENT: f32 = 5.255;
const ALTITUDE_EXPONENT: f32 = 0.1903;

/// Mean sea level pressure, 1013.25 hPa
pub const SEA_LEVEL_PA: i32 = 101_325;

fn truncate(value: f32) -> Option<i32> {
    (value.is_finite() && value.abs() < i32::MAX as f32).then_some(value as i32)
}

/// Altitude in cm at which `pressure_pa` is measured, relative to the level
/// where the pressure is `reference_pa`.
pub fn altitude_cm(pressure_pa: i32, reference_pa: i32) -> Option<i32> {
    if reference_pa <= 0 {
        return None;
    }
    let ratio = pressure_pa as f32 / reference_pa as f32;
    truncate(SCALE_CM * (1.0 - powf(ratio, ALTITUDE_EXPONENT)))
}

/// Pressure measured at `altitude_cm`, reduced to the reference level.
pub fn reduced_pressure_pa(pressure_pa: i32, altitude_cm: i32) -> Option<i32> {
    let base = powf(1.0 - altitude_cm as f32 / SCALE_CM, PRESSURE_EXPONENT);
    truncate(pressure_pa as f32 / base)
}

/// Reference pair plus user offsets.
///
/// The pressure/altitude pair is consistent only at the moment it was set;
/// it is not tracked as the weather changes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCalibration {
    /// Pressure at the reference level, in Pa
    pub pressure_pa: i32,
    /// Altitude of the sensor above the reference level, in cm
    pub altitude_cm: i32,
    pub altitude_offset_cm: i32,
    pub pressure_offset_pa: i32,
}

impl ReferenceCalibration {
    /// Anchor to a known local pressure; the altitude follows from `true_pa`.
    pub fn from_pressure(reference_pa: i32, true_pa: i32) -> Option<Self> {
        Some(Self {
            pressure_pa: reference_pa,
            altitude_cm: altitude_cm(true_pa, reference_pa)?,
            altitude_offset_cm: 0,
            pressure_offset_pa: 0,
        })
    }

    /// Anchor to a known local altitude; the pressure follows from `true_pa`.
    pub fn from_altitude(altitude: i32, true_pa: i32) -> Option<Self> {
        let pressure_pa = reduced_pressure_pa(true_pa, altitude)?;
        if pressure_pa <= 0 {
            return None;
        }
        Some(Self {
            pressure_pa,
            altitude_cm: altitude,
            altitude_offset_cm: 0,
            pressure_offset_pa: 0,
        })
    }

    /// Replace the pressure anchor, keeping the offsets.
    pub fn with_pressure(self, reference_pa: i32, true_pa: i32) -> Option<Self> {
        let anchored = Self::from_pressure(reference_pa, true_pa)?;
        Some(Self {
            altitude_offset_cm: self.altitude_offset_cm,
            pressure_offset_pa: self.pressure_offset_pa,
            ..anchored
        })
    }

    /// Replace the altitude anchor, keeping the offsets.
    pub fn with_altitude(self, altitude: i32, true_pa: i32) -> Option<Self> {
        let anchored = Self::from_altitude(altitude, true_pa)?;
        Some(Self {
            altitude_offset_cm: self.altitude_offset_cm,
            pressure_offset_pa: self.pressure_offset_pa,
            ..anchored
        })
    }

    /// Reported pressure for a compensated reading.
    pub fn pressure(&self, true_pa: i32) -> Option<i32> {
        reduced_pressure_pa(true_pa, self.altitude_cm)?.checked_add(self.pressure_offset_pa)
    }

    /// Reported altitude for a compensated reading.
    pub fn altitude(&self, true_pa: i32) -> Option<i32> {
        altitude_cm(true_pa, self.pressure_pa)?.checked_add(self.altitude_offset_cm)
    }

    /// Offsets that make `true_pa` report exactly `pressure_pa` / `altitude_cm`.
    pub fn zeroed(self, true_pa: i32, pressure_pa: i32, altitude: i32) -> Option<Self> {
        let base_pressure = reduced_pressure_pa(true_pa, self.altitude_cm)?;
        let base_altitude = altitude_cm(true_pa, self.pressure_pa)?;
        Some(Self {
            pressure_offset_pa: pressure_pa.checked_sub(base_pressure)?,
            altitude_offset_cm: altitude.checked_sub(base_altitude)?,
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_at_reference_pressure_is_zero() {
        assert_eq!(altitude_cm(SEA_LEVEL_PA, SEA_LEVEL_PA), Some(0));
        assert_eq!(reduced_pressure_pa(69964, 0), Some(69964));
    }

    #[test]
    fn test_altitude_of_datasheet_pressure() {
        // ~3016.7 m above mean sea level
        let altitude = altitude_cm(69964, SEA_LEVEL_PA).unwrap();
        assert!((301_600..301_750).contains(&altitude), "{altitude}");
    }

    #[test]
    fn test_reduced_pressure_grows_with_altitude() {
        let reduced = reduced_pressure_pa(69964, 30_000).unwrap();
        assert!((72_450..72_560).contains(&reduced), "{reduced}");
    }

    #[test]
    fn test_invalid_reference_pressure() {
        assert_eq!(altitude_cm(69964, 0), None);
        assert_eq!(ReferenceCalibration::from_pressure(-5, 69964), None);
    }

    #[test]
    fn test_altitude_beyond_scale_is_rejected() {
        assert_eq!(reduced_pressure_pa(69964, 4_433_000), None);
    }

    #[test]
    fn test_zeroed_reports_targets_exactly() {
        let reference = ReferenceCalibration::from_altitude(12_345, 69964).unwrap();
        let zeroed = reference.zeroed(69964, 101_000, 500).unwrap();
        assert_eq!(zeroed.pressure(69964), Some(101_000));
        assert_eq!(zeroed.altitude(69964), Some(500));
        // The anchor itself is unchanged
        assert_eq!(zeroed.pressure_pa, reference.pressure_pa);
        assert_eq!(zeroed.altitude_cm, reference.altitude_cm);
    }

    #[test]
    fn test_reanchoring_keeps_offsets() {
        let reference = ReferenceCalibration {
            pressure_pa: SEA_LEVEL_PA,
            altitude_cm: 0,
            altitude_offset_cm: 25,
            pressure_offset_pa: -10,
        };
        let moved = reference.with_pressure(69964, 69964).unwrap();
        assert_eq!(moved.altitude_cm, 0);
        assert_eq!(moved.altitude_offset_cm, 25);
        assert_eq!(moved.pressure_offset_pa, -10);
        assert_eq!(moved.altitude(69964), Some(25));
    }
}
