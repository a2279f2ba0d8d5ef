//! Scripted buses and a recording delay for unit tests.

use std::collections::VecDeque;

use embedded_hal_async::delay::DelayNs;

use crate::sensors::{
    Bme280Bus, DEVICE_DISCONNECTED_C, DhtBus, DhtModel, DhtReadings, OneWireBus,
};

/// Delay that returns immediately and remembers how long it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls: usize,
}

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
        self.calls += 1;
    }
}

/// DHT bus replaying `(temperature, humidity)` pairs; NaN once exhausted.
pub struct ScriptedDht {
    script: VecDeque<(f32, f32)>,
    pub started: Option<DhtModel>,
    pub reads: usize,
}

impl ScriptedDht {
    pub fn new(script: impl IntoIterator<Item = (f32, f32)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            started: None,
            reads: 0,
        }
    }
}

impl DhtBus for ScriptedDht {
    async fn begin(&mut self, model: DhtModel) {
        self.started = Some(model);
    }

    async fn read(&mut self) -> DhtReadings {
        self.reads += 1;
        let (temperature_celsius, humidity_percent) =
            self.script.pop_front().unwrap_or((f32::NAN, f32::NAN));
        DhtReadings {
            temperature_celsius,
            humidity_percent,
        }
    }
}

/// DHT bus returning a fixed environment plus a small deterministic jitter.
pub struct NoisyDht {
    pub temperature: f32,
    pub humidity: f32,
    state: u32,
}

impl NoisyDht {
    pub fn new(temperature: f32, humidity: f32, seed: u32) -> Self {
        Self {
            temperature,
            humidity,
            state: seed,
        }
    }

    /// Next jitter in [-0.1, 0.1).
    fn jitter(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.2
    }
}

impl DhtBus for NoisyDht {
    async fn begin(&mut self, _model: DhtModel) {}

    async fn read(&mut self) -> DhtReadings {
        DhtReadings {
            temperature_celsius: self.temperature + self.jitter(),
            humidity_percent: self.humidity + self.jitter(),
        }
    }
}

/// One-wire bus replaying temperatures; the disconnected sentinel once exhausted.
pub struct ScriptedOneWire {
    script: VecDeque<f32>,
    current: f32,
    pub conversions: usize,
}

impl ScriptedOneWire {
    pub fn new(script: impl IntoIterator<Item = f32>) -> Self {
        Self {
            script: script.into_iter().collect(),
            current: DEVICE_DISCONNECTED_C,
            conversions: 0,
        }
    }
}

impl OneWireBus for ScriptedOneWire {
    async fn begin(&mut self) {}

    async fn request_temperatures(&mut self) {
        self.conversions += 1;
        self.current = self.script.pop_front().unwrap_or(DEVICE_DISCONNECTED_C);
    }

    async fn temperature_celsius(&mut self, _index: u8) -> f32 {
        self.current
    }
}

/// BME280 bus replaying `(temperature °C, pressure Pa, humidity %)` conversions.
pub struct ScriptedBme280 {
    script: VecDeque<(f32, f32, f32)>,
    current: (f32, f32, f32),
    pub present: bool,
    pub begun_at: Option<u8>,
}

impl ScriptedBme280 {
    pub fn new(script: impl IntoIterator<Item = (f32, f32, f32)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            current: (f32::NAN, f32::NAN, f32::NAN),
            present: true,
            begun_at: None,
        }
    }
}

impl Bme280Bus for ScriptedBme280 {
    async fn begin(&mut self, address: u8) -> bool {
        self.begun_at = Some(address);
        self.present
    }

    async fn take_forced_measurement(&mut self) {
        self.current = self
            .script
            .pop_front()
            .unwrap_or((f32::NAN, f32::NAN, f32::NAN));
    }

    async fn temperature_celsius(&mut self) -> f32 {
        self.current.0
    }

    async fn pressure_pascal(&mut self) -> f32 {
        self.current.1
    }

    async fn humidity_percent(&mut self) -> f32 {
        self.current.2
    }
}
