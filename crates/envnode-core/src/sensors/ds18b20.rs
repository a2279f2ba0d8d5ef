use super::{PlausibleRange, Sensor, SensorReadings, check_temperature};
use crate::error::ReadFault;
use crate::measurement::Quantity;

/// Value one-wire thermometer libraries report for a probe that did not answer.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ds18b20Readings {
    pub temperature_celsius: f32,
}

impl SensorReadings<1> for Ds18b20Readings {
    fn to_array(&self) -> [f32; 1] {
        [self.temperature_celsius]
    }
}

/// One-wire bus with DS18B20 probes attached.
pub trait OneWireBus {
    fn begin(&mut self) -> impl Future<Output = ()>;

    /// Start a conversion on every probe and wait for it to finish.
    fn request_temperatures(&mut self) -> impl Future<Output = ()>;

    /// Last converted temperature of the probe at `index`, or
    /// [`DEVICE_DISCONNECTED_C`].
    fn temperature_celsius(&mut self, index: u8) -> impl Future<Output = f32>;
}

pub struct Ds18b20Sensor<W> {
    bus: W,
    index: u8,
    temperature_range: Option<PlausibleRange>,
}

impl<W: OneWireBus> Ds18b20Sensor<W> {
    /// Bind to the first probe on the bus.
    pub fn new(bus: W) -> Self {
        Self {
            bus,
            index: 0,
            temperature_range: None,
        }
    }

    pub fn with_temperature_range(mut self, range: Option<PlausibleRange>) -> Self {
        self.temperature_range = range;
        self
    }
}

impl<W: OneWireBus> Sensor<1> for Ds18b20Sensor<W> {
    type Readings = Ds18b20Readings;

    const QUANTITIES: [Quantity; 1] = [Quantity::Temperature];

    fn name(&self) -> &'static str {
        "DS18B20"
    }

    async fn init(&mut self) {
        self.bus.begin().await;
    }

    async fn read(&mut self) -> Ds18b20Readings {
        self.bus.request_temperatures().await;
        let temperature_celsius = self.bus.temperature_celsius(self.index).await;
        Ds18b20Readings {
            temperature_celsius,
        }
    }

    fn check(&self, readings: &Ds18b20Readings) -> Result<(), ReadFault> {
        let t = readings.temperature_celsius;
        if t == DEVICE_DISCONNECTED_C {
            return Err(ReadFault::Disconnected);
        }
        if !t.is_finite() {
            return Err(ReadFault::Undefined);
        }
        check_temperature(self.temperature_range, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOneWire;

    #[test]
    fn test_disconnected_sentinel_is_rejected() {
        let sensor = Ds18b20Sensor::new(ScriptedOneWire::new([]));
        let reading = |t| Ds18b20Readings {
            temperature_celsius: t,
        };
        assert_eq!(
            sensor.check(&reading(DEVICE_DISCONNECTED_C)),
            Err(ReadFault::Disconnected)
        );
        assert_eq!(sensor.check(&reading(f32::NAN)), Err(ReadFault::Undefined));
        assert_eq!(
            sensor.check(&reading(f32::INFINITY)),
            Err(ReadFault::Undefined)
        );
        // Well below freezing is real data without a configured bound.
        assert_eq!(sensor.check(&reading(-30.5)), Ok(()));
    }

    #[test]
    fn test_read_requests_conversion_first() {
        let mut sensor = Ds18b20Sensor::new(ScriptedOneWire::new([18.25]));
        let readings = embassy_futures::block_on(sensor.read());
        assert_eq!(readings.temperature_celsius, 18.25);
        assert_eq!(sensor.bus.conversions, 1);
    }
}
