use super::{PlausibleRange, QuantitySet, Sensor, SensorReadings, check_temperature};
use crate::error::{ReadFault, SensorError};
use crate::measurement::Quantity;
use crate::record::MAX_VALUES_READ;
use log::warn;

/// I2C address of a BME280 with SDO tied low.
pub const BME280_DEFAULT_ADDRESS: u8 = 0x76;

/// One joint BME280 sample. Pressure is already converted to hPa.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bme280Readings {
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
    pub pressure_hpa: f32,
}

impl SensorReadings<3> for Bme280Readings {
    fn to_array(&self) -> [f32; 3] {
        [
            self.temperature_celsius,
            self.humidity_percent,
            self.pressure_hpa,
        ]
    }
}

/// I2C BME280 driver operated in forced mode.
pub trait Bme280Bus {
    /// Probe the device and configure x16 oversampling with the x16 filter.
    /// Returns `false` when no device answered at `address`.
    fn begin(&mut self, address: u8) -> impl Future<Output = bool>;

    /// Trigger one conversion of all three channels and wait for it.
    fn take_forced_measurement(&mut self) -> impl Future<Output = ()>;

    fn temperature_celsius(&mut self) -> impl Future<Output = f32>;

    fn pressure_pascal(&mut self) -> impl Future<Output = f32>;

    fn humidity_percent(&mut self) -> impl Future<Output = f32>;
}

pub struct Bme280Sensor<B> {
    bus: B,
    address: u8,
    temperature_range: Option<PlausibleRange>,
    derived_humidity: bool,
}

impl<B: Bme280Bus> Bme280Sensor<B> {
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            bus,
            address,
            temperature_range: None,
            derived_humidity: false,
        }
    }

    pub fn with_temperature_range(mut self, range: Option<PlausibleRange>) -> Self {
        self.temperature_range = range;
        self
    }

    /// Also report absolute humidity and humidity ratio.
    pub fn with_derived_humidity(mut self, enabled: bool) -> Self {
        self.derived_humidity = enabled;
        self
    }
}

impl<B: Bme280Bus> Sensor<3> for Bme280Sensor<B> {
    type Readings = Bme280Readings;

    const QUANTITIES: [Quantity; 3] = [
        Quantity::Temperature,
        Quantity::RelativeHumidity,
        Quantity::Pressure,
    ];

    const MAX_VALUES: usize = 5;

    fn name(&self) -> &'static str {
        "BME280"
    }

    async fn init(&mut self) {
        if !self.bus.begin(self.address).await {
            warn!("BME280: no device at address {:#04x}", self.address);
        }
    }

    async fn read(&mut self) -> Bme280Readings {
        self.bus.take_forced_measurement().await;

        let temperature_celsius = self.bus.temperature_celsius().await;
        let pressure_hpa = self.bus.pressure_pascal().await / 100.0;
        let humidity_percent = self.bus.humidity_percent().await;

        Bme280Readings {
            temperature_celsius,
            humidity_percent,
            pressure_hpa,
        }
    }

    /// The three channels come from one conversion, so a single undefined
    /// channel rejects the whole sample.
    fn check(&self, readings: &Bme280Readings) -> Result<(), ReadFault> {
        if readings.to_array().iter().any(|v| !v.is_finite()) {
            return Err(ReadFault::Undefined);
        }
        check_temperature(self.temperature_range, readings.temperature_celsius)
    }

    fn quantities(&self, means: &[f64; 3]) -> Result<QuantitySet, SensorError> {
        let [temperature, humidity, pressure] = *means;
        let capacity = SensorError::CapacityExceeded {
            capacity: MAX_VALUES_READ,
        };

        let mut set = QuantitySet::new();
        for pair in Self::QUANTITIES.into_iter().zip(*means) {
            set.push(pair).map_err(|_| capacity)?;
        }

        if self.derived_humidity {
            let vapour = vapour_pressure_hpa(temperature, humidity);
            set.push((
                Quantity::AbsoluteHumidity,
                absolute_humidity(temperature, vapour),
            ))
            .map_err(|_| capacity)?;
            set.push((Quantity::HumidityRatio, humidity_ratio(pressure, vapour)))
                .map_err(|_| capacity)?;
        }

        Ok(set)
    }
}

/// Partial pressure of water vapour (hPa), Magnus formula over water.
fn vapour_pressure_hpa(temperature_celsius: f64, relative_humidity: f64) -> f64 {
    let saturation =
        6.112 * libm::exp(17.67 * temperature_celsius / (temperature_celsius + 243.5));
    saturation * relative_humidity / 100.0
}

/// Water vapour density in g/m³.
fn absolute_humidity(temperature_celsius: f64, vapour_hpa: f64) -> f64 {
    216.7 * vapour_hpa / (273.15 + temperature_celsius)
}

/// Grams of water vapour per kilogram of dry air.
fn humidity_ratio(pressure_hpa: f64, vapour_hpa: f64) -> f64 {
    622.0 * vapour_hpa / (pressure_hpa - vapour_hpa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBme280;

    fn sensor() -> Bme280Sensor<ScriptedBme280> {
        Bme280Sensor::new(ScriptedBme280::new([]), BME280_DEFAULT_ADDRESS)
    }

    #[test]
    fn test_any_undefined_channel_rejects_sample() {
        let sensor = sensor();
        let good = Bme280Readings {
            temperature_celsius: 20.0,
            humidity_percent: 40.0,
            pressure_hpa: 1013.0,
        };
        assert_eq!(sensor.check(&good), Ok(()));
        let no_pressure = Bme280Readings {
            pressure_hpa: f32::NAN,
            ..good
        };
        assert_eq!(sensor.check(&no_pressure), Err(ReadFault::Undefined));
        let runaway_humidity = Bme280Readings {
            humidity_percent: f32::INFINITY,
            ..good
        };
        assert_eq!(sensor.check(&runaway_humidity), Err(ReadFault::Undefined));
    }

    #[test]
    fn test_pressure_converted_to_hpa() {
        let mut sensor = Bme280Sensor::new(
            ScriptedBme280::new([(21.0, 101_325.0, 45.0)]),
            BME280_DEFAULT_ADDRESS,
        );
        let readings = embassy_futures::block_on(sensor.read());
        assert_eq!(readings.pressure_hpa, 1013.25);
        assert_eq!(readings.temperature_celsius, 21.0);
        assert_eq!(readings.humidity_percent, 45.0);
    }

    #[test]
    fn test_plain_quantities_without_derivation() {
        let set = sensor().quantities(&[20.0, 50.0, 1013.25]).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set[2], (Quantity::Pressure, 1013.25));
    }

    #[test]
    fn test_derived_humidity() {
        let sensor = sensor().with_derived_humidity(true);
        let set = sensor.quantities(&[20.0, 50.0, 1013.25]).unwrap();
        assert_eq!(set.len(), 5);

        let (q, absolute) = set[3];
        assert_eq!(q, Quantity::AbsoluteHumidity);
        assert!((absolute - 8.64).abs() < 0.05, "absolute = {absolute}");

        let (q, ratio) = set[4];
        assert_eq!(q, Quantity::HumidityRatio);
        assert!((ratio - 7.26).abs() < 0.05, "ratio = {ratio}");
    }

    #[test]
    fn test_init_logs_missing_device_without_failing() {
        let mut sensor = sensor();
        sensor.bus.present = false;
        embassy_futures::block_on(sensor.init());
        assert_eq!(sensor.bus.begun_at, Some(BME280_DEFAULT_ADDRESS));
    }
}
