mod bme280;
mod dht;
mod ds18b20;

use crate::error::{ReadFault, SensorError};
use crate::measurement::Quantity;
use crate::record::MAX_VALUES_READ;
use serde::{Deserialize, Serialize};

pub use bme280::{BME280_DEFAULT_ADDRESS, Bme280Bus, Bme280Readings, Bme280Sensor};
pub use dht::{DhtBus, DhtModel, DhtReadings, DhtSensor};
pub use ds18b20::{DEVICE_DISCONNECTED_C, Ds18b20Readings, Ds18b20Sensor, OneWireBus};

/// Quantities produced by one acquisition, paired with their averaged value.
pub type QuantitySet = heapless::Vec<(Quantity, f64), MAX_VALUES_READ>;

/// Trait for sensor reading data structures.
/// Provides compile-time guarantees about the number of channels a single
/// physical read produces.
pub trait SensorReadings<const COUNT: usize> {
    /// Channel values in the order of [`Sensor::QUANTITIES`].
    fn to_array(&self) -> [f32; COUNT];
}

/// Adapter from a vendor read primitive to the common acquisition contract.
///
/// One physical `read` yields every channel at once; `check` is the family's
/// validity predicate and is the only place a read is accepted or rejected.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings one physical read produces.
    type Readings: SensorReadings<COUNT>;

    /// Quantity carried by each channel of [`Self::Readings`].
    const QUANTITIES: [Quantity; COUNT];

    /// Upper bound on the number of record values [`Sensor::quantities`] returns.
    const MAX_VALUES: usize = COUNT;

    /// Name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Establish the physical binding (bus init, pin configuration).
    /// Failures surface later as invalid reads.
    fn init(&mut self) -> impl Future<Output = ()>;

    /// Perform one physical read. Invalid channels are reported with the
    /// driver's own sentinel and filtered by [`Sensor::check`].
    fn read(&mut self) -> impl Future<Output = Self::Readings>;

    /// Validity predicate shared by self-test and aggregation.
    fn check(&self, readings: &Self::Readings) -> Result<(), ReadFault>;

    /// Map the per-channel means of an aggregation window to record values.
    fn quantities(&self, means: &[f64; COUNT]) -> Result<QuantitySet, SensorError> {
        let mut set = QuantitySet::new();
        for (quantity, &mean) in Self::QUANTITIES.iter().zip(means) {
            set.push((*quantity, mean))
                .map_err(|_| SensorError::CapacityExceeded {
                    capacity: MAX_VALUES_READ,
                })?;
        }
        Ok(set)
    }
}

/// Exclusive plausibility bound on temperature readings, in °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f32,
    pub max: f32,
}

impl PlausibleRange {
    /// The `0 < t < 100 °C` filter historically applied to BME280 reads.
    pub const INDOOR: Self = Self::new(0.0, 100.0);

    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value > self.min && value < self.max
    }

    #[allow(
        clippy::neg_cmp_op_on_partial_ord,
        reason = "a NaN bound must count as empty"
    )]
    pub fn is_empty(&self) -> bool {
        !(self.min < self.max)
    }
}

/// Shared temperature check: an unset range accepts every defined value.
pub(crate) fn check_temperature(
    range: Option<PlausibleRange>,
    temperature: f32,
) -> Result<(), ReadFault> {
    match range {
        Some(range) if !range.contains(temperature) => Err(ReadFault::OutOfRange),
        _ => Ok(()),
    }
}
