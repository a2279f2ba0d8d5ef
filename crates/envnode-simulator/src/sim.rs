//! Synthetic sensor buses for the desktop simulator.
//!
//! All buses observe the same slowly drifting environment, sampled on a
//! virtual clock that only advances when the core waits. Hardware sleeps are
//! shortened by `time_scale` so a full acquisition window runs in well under
//! a second.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal_async::delay::DelayNs;
use envnode_core::BusProvider;
use envnode_core::sensors::{
    Bme280Bus, DEVICE_DISCONNECTED_C, DhtBus, DhtModel, DhtReadings, OneWireBus,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seconds of simulated device time, shared by the delay and every bus.
#[derive(Clone, Default)]
pub struct VirtualClock(Rc<Cell<f64>>);

impl VirtualClock {
    pub fn now_secs(&self) -> f64 {
        self.0.get()
    }

    pub fn advance(&self, secs: f64) {
        self.0.set(self.0.get() + secs);
    }

    /// Advance the virtual clock and block the host for the scaled duration.
    pub fn sleep(&self, secs: f64, time_scale: f64) {
        self.advance(secs);
        let host = secs * time_scale;
        if host > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(host));
        }
    }
}

/// Blocking delay used in place of `embassy_time::Delay`.
pub struct HostDelay {
    clock: VirtualClock,
    time_scale: f64,
}

impl HostDelay {
    pub fn new(clock: VirtualClock, time_scale: f64) -> Self {
        Self { clock, time_scale }
    }
}

impl DelayNs for HostDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.sleep(f64::from(ns) / 1e9, self.time_scale);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.sleep(f64::from(ms) / 1e3, self.time_scale);
    }
}

/// Ground truth the simulated sensors measure, plus per-read noise and faults.
pub struct Environment {
    clock: VirtualClock,
    rng: StdRng,
    failure_rate: f64,
}

impl Environment {
    fn new(clock: VirtualClock, rng: StdRng, failure_rate: f64) -> Self {
        Self {
            clock,
            rng,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Temperature: 20–26 °C sinusoidal with slow drift.
    fn temperature(&self) -> f64 {
        let t = self.clock.now_secs();
        23.0 + 3.0 * (t / 1200.0).sin() + 0.5 * (t / 370.0).cos()
    }

    /// Humidity: 40–60 % with a different period.
    fn humidity(&self) -> f64 {
        let t = self.clock.now_secs();
        50.0 + 10.0 * (t / 1800.0).sin() + 2.0 * (t / 230.0).cos()
    }

    /// Pressure in Pa: around 1013 hPa with a long weather cycle.
    fn pressure(&self) -> f64 {
        let t = self.clock.now_secs();
        101_300.0 + 400.0 * (t / 7200.0).sin()
    }

    fn noise(&mut self, amplitude: f64) -> f64 {
        self.rng.random_range(-amplitude..=amplitude)
    }

    fn fails(&mut self) -> bool {
        let failed = self.rng.random_bool(self.failure_rate);
        if failed {
            debug!("simulated read fault at t={:.1}s", self.clock.now_secs());
        }
        failed
    }
}

pub struct SimulatedDht {
    env: Environment,
}

impl DhtBus for SimulatedDht {
    async fn begin(&mut self, model: DhtModel) {
        info!("{}: simulated bus started", model.name());
    }

    async fn read(&mut self) -> DhtReadings {
        if self.env.fails() {
            return DhtReadings {
                temperature_celsius: f32::NAN,
                humidity_percent: f32::NAN,
            };
        }

        let temperature = self.env.temperature() + self.env.noise(0.2);
        let humidity = self.env.humidity() + self.env.noise(1.0);
        DhtReadings {
            temperature_celsius: temperature as f32,
            humidity_percent: humidity as f32,
        }
    }
}

pub struct SimulatedOneWire {
    env: Environment,
    converted: f32,
}

impl OneWireBus for SimulatedOneWire {
    async fn begin(&mut self) {
        info!("DS18B20: simulated one-wire bus started");
    }

    async fn request_temperatures(&mut self) {
        // Conversion at 12-bit resolution takes 750 ms.
        self.env.clock.advance(0.75);
        self.converted = if self.env.fails() {
            DEVICE_DISCONNECTED_C
        } else {
            (self.env.temperature() + self.env.noise(0.0625)) as f32
        };
    }

    async fn temperature_celsius(&mut self, _index: u8) -> f32 {
        self.converted
    }
}

pub struct SimulatedBme280 {
    env: Environment,
    present: bool,
    sample: (f32, f32, f32),
}

impl Bme280Bus for SimulatedBme280 {
    async fn begin(&mut self, address: u8) -> bool {
        info!("BME280: simulated device at {:#04x}", address);
        self.present
    }

    async fn take_forced_measurement(&mut self) {
        let temperature = (self.env.temperature() + self.env.noise(0.1)) as f32;
        let humidity = (self.env.humidity() + self.env.noise(0.5)) as f32;
        let pressure = if self.env.fails() {
            f32::NAN
        } else {
            (self.env.pressure() + self.env.noise(5.0)) as f32
        };
        self.sample = (temperature, pressure, humidity);
    }

    async fn temperature_celsius(&mut self) -> f32 {
        self.sample.0
    }

    async fn pressure_pascal(&mut self) -> f32 {
        self.sample.1
    }

    async fn humidity_percent(&mut self) -> f32 {
        self.sample.2
    }
}

/// Hands out simulated buses that all observe one environment.
pub struct SimulatedBuses {
    clock: VirtualClock,
    failure_rate: f64,
    seed: Option<u64>,
}

impl SimulatedBuses {
    pub fn new(clock: VirtualClock, failure_rate: f64, seed: Option<u64>) -> Self {
        Self {
            clock,
            failure_rate,
            seed,
        }
    }

    fn environment(&self) -> Environment {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Environment::new(self.clock.clone(), rng, self.failure_rate)
    }
}

impl BusProvider for SimulatedBuses {
    type Dht = SimulatedDht;
    type OneWire = SimulatedOneWire;
    type Bme280 = SimulatedBme280;

    fn dht(&mut self, pin: u8) -> SimulatedDht {
        info!("DHT data line on GPIO{}", pin);
        SimulatedDht {
            env: self.environment(),
        }
    }

    fn one_wire(&mut self, pin: u8) -> SimulatedOneWire {
        info!("One-wire bus on GPIO{}", pin);
        SimulatedOneWire {
            env: self.environment(),
            converted: DEVICE_DISCONNECTED_C,
        }
    }

    fn bme280(&mut self, sda: u8, scl: u8) -> SimulatedBme280 {
        info!("I2C bus on SDA GPIO{}, SCL GPIO{}", sda, scl);
        SimulatedBme280 {
            env: self.environment(),
            present: true,
            sample: (f32::NAN, f32::NAN, f32::NAN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envnode_core::{Acquisition, AnySensor, Config, MAX_VALUES_READ, SensorSelection};

    fn run(config: Config, failure_rate: f64) -> Option<String> {
        let clock = VirtualClock::default();
        let mut buses = SimulatedBuses::new(clock.clone(), failure_rate, Some(42));
        let delay = HostDelay::new(clock, 0.0);
        let mut sensor = AnySensor::from_config(&config, &mut buses, delay).ok()?;

        embassy_futures::block_on(sensor.init());
        let acquired = embassy_futures::block_on(sensor.read_values::<MAX_VALUES_READ>()).ok()?;
        serde_json::to_string(&acquired.record).ok()
    }

    #[test]
    fn test_every_family_produces_a_record() {
        let selections = [
            SensorSelection::Dht11 { pin: 4 },
            SensorSelection::Ds18b20 { pin: 5 },
            SensorSelection::Bme280 {
                sda: 21,
                scl: 22,
                address: 0x76,
                derived_humidity: true,
            },
        ];

        for sensor in selections {
            let config = Config {
                sensor,
                ..Config::default()
            };
            let json = run(config, 0.0).expect("acquisition succeeds without faults");
            assert!(json.starts_with(r#"{"temperature":""#), "{json}");
        }
    }

    #[test]
    fn test_permanent_faults_fail_the_cycle() {
        assert_eq!(run(Config::default(), 1.0), None);
    }

    #[test]
    fn test_delay_advances_virtual_clock() {
        let clock = VirtualClock::default();
        let mut delay = HostDelay::new(clock.clone(), 0.0);
        embassy_futures::block_on(delay.delay_ms(2100));
        assert!((clock.now_secs() - 2.1).abs() < 1e-9);
    }
}
