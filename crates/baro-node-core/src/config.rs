use serde::{Deserialize, Serialize};

use crate::sensors::bmp085::{DEFAULT_ADDRESS, Oversampling};

/// Polls allowed for each bus phase before it is reported as a timeout.
pub const DEFAULT_SPIN_BUDGET: u16 = 250;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum number of flag polls per START, byte or STOP
    pub spin_budget: u16,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            spin_budget: DEFAULT_SPIN_BUDGET,
        }
    }
}

/// When the temperature compensation term is refreshed.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUpdate {
    /// Every pressure conversion is preceded by a temperature conversion
    #[default]
    Auto,
    /// The caller refreshes temperature explicitly, e.g. once per second
    /// while sampling pressure at a higher rate
    Manual,
}

/// Known local value the altitude/pressure conversion is anchored to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// Local absolute pressure in Pa (e.g. QNH)
    Pressure(i32),
    /// Local absolute altitude in cm
    Altitude(i32),
}

impl Default for Reference {
    fn default() -> Self {
        Reference::Altitude(0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp085Config {
    pub address: u8,
    pub oversampling: Oversampling,
    pub temperature_update: TemperatureUpdate,
    pub reference: Reference,
}

impl Default for Bmp085Config {
    fn default() -> Self {
        Self::new(Oversampling::default(), Reference::default())
    }
}

impl Bmp085Config {
    pub fn new(oversampling: Oversampling, reference: Reference) -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            oversampling,
            temperature_update: TemperatureUpdate::Auto,
            reference,
        }
    }

    pub fn with_temperature_update(mut self, temperature_update: TemperatureUpdate) -> Self {
        self.temperature_update = temperature_update;
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }
}
