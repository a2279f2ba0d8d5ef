//! Hardware-independent core library for envnode
//!
//! This crate contains the sensor acquisition layer of the envnode telemetry
//! device: the acquisition contract consumed by the firmware main loop, the
//! sampling/retry/aggregation engine, the fixed-capacity telemetry record
//! builder, and one adapter per supported sensor family (DHT11/22, DS18B20,
//! BME280).
//!
//! It is `#![no_std]` and never allocates, so it compiles on embedded
//! targets as well as desktop hosts (for the simulator and tests).

#![no_std]

#[cfg(test)]
extern crate std;

pub mod acquisition;
pub mod config;
pub mod error;
pub mod measurement;
pub mod record;
pub mod sampling;
pub mod sensors;

#[cfg(test)]
mod testing;

pub use acquisition::{Acquired, Acquisition, AnySensor, BusProvider, Station};
pub use config::{Config, SensorFamily, SensorSelection};
pub use error::{ConfigError, ReadFault, SensorError};
pub use measurement::{Measurement, Quantity};
pub use record::{MAX_VALUES_READ, RecordBuilder, TelemetryRecord};
pub use sampling::{Aggregate, Sampler, SamplingPolicy};
