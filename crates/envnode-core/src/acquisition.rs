//! The acquisition contract consumed by the firmware main loop
//!
//! The main loop only sees [`Acquisition`]: `init` once at boot, `test` as a
//! startup self-check, then `read_values` every telemetry cycle. Which sensor
//! family sits behind it is decided once, from configuration, by
//! [`AnySensor::from_config`].

use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

use crate::config::{Config, SensorSelection};
use crate::error::{ConfigError, SensorError};
use crate::record::{MAX_VALUES_READ, RecordBuilder, TelemetryRecord};
use crate::sampling::Sampler;
use crate::sensors::{
    Bme280Bus, Bme280Sensor, DhtBus, DhtModel, DhtSensor, Ds18b20Sensor, OneWireBus, Sensor,
};

/// Outcome of a successful acquisition cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired<const N: usize = MAX_VALUES_READ> {
    pub record: TelemetryRecord<N>,
    /// Samples that passed validation and went into the averages.
    pub contributing: u8,
    pub requested: u8,
}

impl<const N: usize> Acquired<N> {
    /// Whether every requested sample was valid. A usable record with
    /// skipped samples is still a success.
    pub const fn is_complete(&self) -> bool {
        self.contributing == self.requested
    }
}

/// Capability set every sensor variant offers the main loop.
pub trait Acquisition {
    /// Establish the physical binding. Failures surface in `test`/`read_values`.
    fn init(&mut self) -> impl Future<Output = ()>;

    /// One best-effort sample, used as a startup self-check.
    fn test(&mut self) -> impl Future<Output = bool>;

    /// Run a full sampling window and build a telemetry record.
    ///
    /// Fails with [`SensorError::AcquisitionFailed`] when no sample was valid;
    /// never blocks longer than the policy's worst-case latency.
    fn read_values<const N: usize>(
        &mut self,
    ) -> impl Future<Output = Result<Acquired<N>, SensorError>>;
}

/// One sensor adapter bound to its sampling engine and record builder.
///
/// The record capacity `N` of [`Acquisition::read_values`] must hold every
/// value the sensor can produce:
///
/// ```
/// # use embedded_hal_async::delay::DelayNs;
/// # use envnode_core::sensors::{Bme280Bus, Bme280Sensor};
/// # use envnode_core::{Acquisition, RecordBuilder, Sampler, SamplingPolicy, Station};
/// # struct NoDelay;
/// # impl DelayNs for NoDelay {
/// #     async fn delay_ns(&mut self, _ns: u32) {}
/// # }
/// # struct FixedBme280;
/// # impl Bme280Bus for FixedBme280 {
/// #     async fn begin(&mut self, _address: u8) -> bool { true }
/// #     async fn take_forced_measurement(&mut self) {}
/// #     async fn temperature_celsius(&mut self) -> f32 { 21.0 }
/// #     async fn pressure_pascal(&mut self) -> f32 { 101_325.0 }
/// #     async fn humidity_percent(&mut self) -> f32 { 45.0 }
/// # }
/// let mut station: Station<_, _, 3> = Station::new(
///     Bme280Sensor::new(FixedBme280, 0x76),
///     Sampler::new(NoDelay, SamplingPolicy::BME280),
///     RecordBuilder::default(),
/// );
/// let acquired = embassy_futures::block_on(station.read_values::<5>());
/// assert!(acquired.is_ok());
/// ```
///
/// A BME280 may report five values, so a two-slot record does not compile:
///
/// ```compile_fail
/// # use embedded_hal_async::delay::DelayNs;
/// # use envnode_core::sensors::{Bme280Bus, Bme280Sensor};
/// # use envnode_core::{Acquisition, RecordBuilder, Sampler, SamplingPolicy, Station};
/// # struct NoDelay;
/// # impl DelayNs for NoDelay {
/// #     async fn delay_ns(&mut self, _ns: u32) {}
/// # }
/// # struct FixedBme280;
/// # impl Bme280Bus for FixedBme280 {
/// #     async fn begin(&mut self, _address: u8) -> bool { true }
/// #     async fn take_forced_measurement(&mut self) {}
/// #     async fn temperature_celsius(&mut self) -> f32 { 21.0 }
/// #     async fn pressure_pascal(&mut self) -> f32 { 101_325.0 }
/// #     async fn humidity_percent(&mut self) -> f32 { 45.0 }
/// # }
/// let mut station: Station<_, _, 3> = Station::new(
///     Bme280Sensor::new(FixedBme280, 0x76),
///     Sampler::new(NoDelay, SamplingPolicy::BME280),
///     RecordBuilder::default(),
/// );
/// let acquired = embassy_futures::block_on(station.read_values::<2>());
/// ```
pub struct Station<S, D, const COUNT: usize> {
    sensor: S,
    sampler: Sampler<D>,
    builder: RecordBuilder,
}

impl<S, D, const COUNT: usize> Station<S, D, COUNT>
where
    S: Sensor<COUNT>,
    D: DelayNs,
{
    pub const fn new(sensor: S, sampler: Sampler<D>, builder: RecordBuilder) -> Self {
        Self {
            sensor,
            sampler,
            builder,
        }
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler<D> {
        &mut self.sampler
    }
}

impl<S, D, const COUNT: usize> Acquisition for Station<S, D, COUNT>
where
    S: Sensor<COUNT>,
    D: DelayNs,
{
    async fn init(&mut self) {
        info!("{}: initializing", self.sensor.name());
        self.sensor.init().await;
    }

    async fn test(&mut self) -> bool {
        let responsive = self
            .sampler
            .read_with_retry::<COUNT, S>(&mut self.sensor)
            .await
            .is_ok();

        if responsive {
            info!("{}: self-test passed", self.sensor.name());
        } else {
            warn!("{}: self-test failed", self.sensor.name());
        }
        responsive
    }

    /// Instantiating this with a record smaller than the sensor's
    /// `MAX_VALUES` is a compile error.
    async fn read_values<const N: usize>(&mut self) -> Result<Acquired<N>, SensorError> {
        const {
            assert!(
                <S as Sensor<COUNT>>::MAX_VALUES <= N,
                "telemetry record is smaller than what the sensor produces"
            )
        };

        let aggregate = self
            .sampler
            .sample_window::<COUNT, S>(&mut self.sensor)
            .await?;
        let means = aggregate.means().ok_or(SensorError::AcquisitionFailed {
            sensor: self.sensor.name(),
            requested: aggregate.requested(),
        })?;

        let quantities = self.sensor.quantities(&means)?;
        let record = self.builder.build::<N>(&quantities)?;

        info!("{}: final values", self.sensor.name());
        for entry in record.iter() {
            info!("  {} = {} {}", entry.key(), entry.value, entry.quantity.unit());
        }

        Ok(Acquired {
            record,
            contributing: aggregate.contributing(),
            requested: aggregate.requested(),
        })
    }
}

/// Constructs the vendor read primitives for the fitted sensor.
///
/// Only the method matching the configured family is ever called.
pub trait BusProvider {
    type Dht: DhtBus;
    type OneWire: OneWireBus;
    type Bme280: Bme280Bus;

    fn dht(&mut self, pin: u8) -> Self::Dht;

    fn one_wire(&mut self, pin: u8) -> Self::OneWire;

    fn bme280(&mut self, sda: u8, scl: u8) -> Self::Bme280;
}

/// The fixed set of sensor variants behind the acquisition contract.
pub enum AnySensor<H, W, B, D> {
    Dht(Station<DhtSensor<H>, D, 2>),
    Ds18b20(Station<Ds18b20Sensor<W>, D, 1>),
    Bme280(Station<Bme280Sensor<B>, D, 3>),
}

impl<H, W, B, D> AnySensor<H, W, B, D>
where
    H: DhtBus,
    W: OneWireBus,
    B: Bme280Bus,
    D: DelayNs,
{
    /// Validate `config` and bind the selected sensor. Configuration defects
    /// are fatal; the device must not start acquiring with them.
    pub fn from_config<P>(config: &Config, buses: &mut P, delay: D) -> Result<Self, ConfigError>
    where
        P: BusProvider<Dht = H, OneWire = W, Bme280 = B>,
    {
        config.validate()?;

        let sampler = Sampler::new(delay, config.sampling_policy());
        let builder = config.record_builder();
        let range = config.temperature_range;

        info!(
            "Acquisition: {} selected, {:?}",
            config.sensor.family().name(),
            config.sampling_policy()
        );

        let sensor = match config.sensor {
            SensorSelection::Dht11 { pin } => {
                let sensor = DhtSensor::new(buses.dht(pin), DhtModel::Dht11);
                Self::Dht(Station::new(sensor.with_temperature_range(range), sampler, builder))
            }
            SensorSelection::Dht22 { pin } => {
                let sensor = DhtSensor::new(buses.dht(pin), DhtModel::Dht22);
                Self::Dht(Station::new(sensor.with_temperature_range(range), sampler, builder))
            }
            SensorSelection::Ds18b20 { pin } => {
                let sensor = Ds18b20Sensor::new(buses.one_wire(pin)).with_temperature_range(range);
                Self::Ds18b20(Station::new(sensor, sampler, builder))
            }
            SensorSelection::Bme280 {
                sda,
                scl,
                address,
                derived_humidity,
            } => {
                let sensor = Bme280Sensor::new(buses.bme280(sda, scl), address)
                    .with_temperature_range(range)
                    .with_derived_humidity(derived_humidity);
                Self::Bme280(Station::new(sensor, sampler, builder))
            }
        };

        Ok(sensor)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dht(station) => station.sensor().name(),
            Self::Ds18b20(station) => station.sensor().name(),
            Self::Bme280(station) => station.sensor().name(),
        }
    }
}

impl<H, W, B, D> Acquisition for AnySensor<H, W, B, D>
where
    H: DhtBus,
    W: OneWireBus,
    B: Bme280Bus,
    D: DelayNs,
{
    async fn init(&mut self) {
        match self {
            Self::Dht(station) => station.init().await,
            Self::Ds18b20(station) => station.init().await,
            Self::Bme280(station) => station.init().await,
        }
    }

    async fn test(&mut self) -> bool {
        match self {
            Self::Dht(station) => station.test().await,
            Self::Ds18b20(station) => station.test().await,
            Self::Bme280(station) => station.test().await,
        }
    }

    async fn read_values<const N: usize>(&mut self) -> Result<Acquired<N>, SensorError> {
        match self {
            Self::Dht(station) => station.read_values::<N>().await,
            Self::Ds18b20(station) => station.read_values::<N>().await,
            Self::Bme280(station) => station.read_values::<N>().await,
        }
    }
}
