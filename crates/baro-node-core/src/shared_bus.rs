//! Blocking I2C bus sharing
//!
//! Several drivers can each own a [`SharedI2cDevice`] pointing at the same
//! bus. The mutex is held for one complete transaction, so the START...STOP
//! sequences of different drivers never interleave on the wire.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::i2c::{ErrorType, I2c, Operation};

/// Bus wrapped for sharing between [`SharedI2cDevice`]s.
pub type SharedBus<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

/// Wrap a bus so it can be shared.
pub fn shared_bus<T>(bus: T) -> SharedBus<T> {
    Mutex::new(RefCell::new(bus))
}

/// Per-driver handle to a [`SharedBus`].
///
/// # Example
///
/// ```ignore
/// use baro_node_core::shared_bus::{SharedBus, SharedI2cDevice, shared_bus};
/// use static_cell::StaticCell;
///
/// static I2C_BUS: StaticCell<SharedBus<MyBus>> = StaticCell::new();
///
/// let i2c_bus = I2C_BUS.init(shared_bus(bus));
/// let barometer = SharedI2cDevice::new(i2c_bus);
/// let other = SharedI2cDevice::new(i2c_bus);
/// ```
pub struct SharedI2cDevice<'a, T> {
    bus: &'a SharedBus<T>,
}

impl<'a, T> SharedI2cDevice<'a, T> {
    #[inline]
    pub const fn new(bus: &'a SharedBus<T>) -> Self {
        Self { bus }
    }
}

impl<T> ErrorType for SharedI2cDevice<'_, T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<T> I2c for SharedI2cDevice<'_, T>
where
    T: I2c,
{
    /// Runs the whole transaction with the bus locked.
    #[inline]
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus
            .lock(|bus| bus.borrow_mut().transaction(address, operations))
    }
}
