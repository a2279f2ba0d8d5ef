use super::{PlausibleRange, Sensor, SensorReadings, check_temperature};
use crate::error::ReadFault;
use crate::measurement::Quantity;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

impl DhtModel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dht11 => "DHT11",
            Self::Dht22 => "DHT22",
        }
    }
}

/// Typed readings from a DHT sensor. Channels are NaN when the driver could
/// not complete the transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReadings {
    pub temperature_celsius: f32,
    pub humidity_percent: f32,
}

impl SensorReadings<2> for DhtReadings {
    fn to_array(&self) -> [f32; 2] {
        [self.temperature_celsius, self.humidity_percent]
    }
}

/// Single-wire DHT driver, bound to its data pin by the firmware.
pub trait DhtBus {
    fn begin(&mut self, model: DhtModel) -> impl Future<Output = ()>;

    fn read(&mut self) -> impl Future<Output = DhtReadings>;
}

pub struct DhtSensor<B> {
    bus: B,
    model: DhtModel,
    temperature_range: Option<PlausibleRange>,
}

impl<B: DhtBus> DhtSensor<B> {
    pub fn new(bus: B, model: DhtModel) -> Self {
        Self {
            bus,
            model,
            temperature_range: None,
        }
    }

    pub fn with_temperature_range(mut self, range: Option<PlausibleRange>) -> Self {
        self.temperature_range = range;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: DhtBus> Sensor<2> for DhtSensor<B> {
    type Readings = DhtReadings;

    const QUANTITIES: [Quantity; 2] = [Quantity::Temperature, Quantity::RelativeHumidity];

    fn name(&self) -> &'static str {
        self.model.name()
    }

    async fn init(&mut self) {
        self.bus.begin(self.model).await;
    }

    async fn read(&mut self) -> DhtReadings {
        self.bus.read().await
    }

    fn check(&self, readings: &DhtReadings) -> Result<(), ReadFault> {
        if !readings.temperature_celsius.is_finite() || !readings.humidity_percent.is_finite() {
            return Err(ReadFault::Undefined);
        }
        check_temperature(self.temperature_range, readings.temperature_celsius)
    }
}
