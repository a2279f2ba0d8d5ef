//! Acquisition configuration injected by the firmware's config loader

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SensorError};
use crate::measurement::{DEFAULT_PRECISION, MAX_PRECISION};
use crate::record::{MAX_VALUES_READ, RecordBuilder};
use crate::sampling::SamplingPolicy;
use crate::sensors::{BME280_DEFAULT_ADDRESS, DhtModel, PlausibleRange};

/// The supported sensor families. Exactly one is fitted per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    Dht(DhtModel),
    Ds18b20,
    Bme280,
}

impl SensorFamily {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dht(model) => model.name(),
            Self::Ds18b20 => "DS18B20",
            Self::Bme280 => "BME280",
        }
    }

    pub const fn default_policy(self) -> SamplingPolicy {
        match self {
            Self::Dht(_) => SamplingPolicy::DHT,
            Self::Ds18b20 => SamplingPolicy::DS18B20,
            Self::Bme280 => SamplingPolicy::BME280,
        }
    }
}

/// Selected sensor and the pins it is wired to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorSelection {
    Dht11 {
        pin: u8,
    },
    Dht22 {
        pin: u8,
    },
    Ds18b20 {
        pin: u8,
    },
    Bme280 {
        sda: u8,
        scl: u8,
        #[serde(default = "default_bme280_address")]
        address: u8,
        #[serde(default)]
        derived_humidity: bool,
    },
}

fn default_bme280_address() -> u8 {
    BME280_DEFAULT_ADDRESS
}

impl SensorSelection {
    pub const fn family(&self) -> SensorFamily {
        match self {
            Self::Dht11 { .. } => SensorFamily::Dht(DhtModel::Dht11),
            Self::Dht22 { .. } => SensorFamily::Dht(DhtModel::Dht22),
            Self::Ds18b20 { .. } => SensorFamily::Ds18b20,
            Self::Bme280 { .. } => SensorFamily::Bme280,
        }
    }

    /// Number of record values this selection produces per acquisition.
    pub const fn value_count(&self) -> usize {
        match self {
            Self::Dht11 { .. } | Self::Dht22 { .. } => 2,
            Self::Ds18b20 { .. } => 1,
            Self::Bme280 {
                derived_humidity: true,
                ..
            } => 5,
            Self::Bme280 { .. } => 3,
        }
    }
}

/// Optional overrides of a family's default [`SamplingPolicy`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplingOverrides {
    pub samples: Option<u8>,
    pub max_attempts: Option<u8>,
    pub settle_ms: Option<u32>,
    pub retry_backoff_ms: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub sensor: SensorSelection,
    #[serde(default)]
    pub sampling: SamplingOverrides,
    /// Decimal places of every reported value.
    #[serde(default = "default_precision")]
    pub precision: u8,
    /// Key budget of the telemetry record, at most [`MAX_VALUES_READ`].
    #[serde(default = "default_max_values")]
    pub max_values: usize,
    /// Plausibility bound on temperature. Unset accepts any defined reading.
    #[serde(default)]
    pub temperature_range: Option<PlausibleRange>,
}

fn default_precision() -> u8 {
    DEFAULT_PRECISION
}

fn default_max_values() -> usize {
    MAX_VALUES_READ
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorSelection::Dht22 { pin: 4 },
            sampling: SamplingOverrides::default(),
            precision: DEFAULT_PRECISION,
            max_values: MAX_VALUES_READ,
            temperature_range: None,
        }
    }
}

impl Config {
    /// The selected family's policy with any overrides applied.
    pub fn sampling_policy(&self) -> SamplingPolicy {
        let base = self.sensor.family().default_policy();
        SamplingPolicy {
            samples: self.sampling.samples.unwrap_or(base.samples),
            max_attempts: self.sampling.max_attempts.unwrap_or(base.max_attempts),
            settle_ms: self.sampling.settle_ms.unwrap_or(base.settle_ms),
            retry_backoff_ms: self
                .sampling
                .retry_backoff_ms
                .unwrap_or(base.retry_backoff_ms),
        }
    }

    pub fn record_builder(&self) -> RecordBuilder {
        RecordBuilder::new(self.precision, self.max_values)
    }

    /// Reject configurations the device must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = self.sampling_policy();
        if policy.samples == 0 {
            return Err(ConfigError::NoSamples);
        }
        if policy.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.precision > MAX_PRECISION {
            return Err(ConfigError::PrecisionTooHigh(self.precision));
        }
        if self.temperature_range.is_some_and(|r| r.is_empty()) {
            return Err(ConfigError::EmptyRange);
        }
        if self.max_values > MAX_VALUES_READ {
            return Err(SensorError::CapacityExceeded {
                capacity: MAX_VALUES_READ,
            }
            .into());
        }

        let produced = self.sensor.value_count();
        if produced > self.max_values {
            return Err(ConfigError::TooManyValues {
                family: self.sensor.family().name(),
                produced,
                allowed: self.max_values,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sampling_policy(), SamplingPolicy::DHT);
        assert_eq!(config.sensor.family().name(), "DHT22");
    }

    #[test]
    fn test_overrides_apply_per_field() {
        let config = Config {
            sensor: SensorSelection::Ds18b20 { pin: 5 },
            sampling: SamplingOverrides {
                samples: Some(10),
                retry_backoff_ms: Some(500),
                ..Default::default()
            },
            ..Default::default()
        };
        let policy = config.sampling_policy();
        assert_eq!(policy.samples, 10);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_backoff_ms, 500);
        assert_eq!(policy.settle_ms, 0);
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let base = Config::default();

        let no_samples = Config {
            sampling: SamplingOverrides {
                samples: Some(0),
                ..Default::default()
            },
            ..base
        };
        assert_eq!(no_samples.validate(), Err(ConfigError::NoSamples));

        let precise = Config {
            precision: 7,
            ..base
        };
        assert_eq!(precise.validate(), Err(ConfigError::PrecisionTooHigh(7)));

        let inverted = Config {
            temperature_range: Some(PlausibleRange::new(50.0, -10.0)),
            ..base
        };
        assert_eq!(inverted.validate(), Err(ConfigError::EmptyRange));
    }

    #[test]
    fn test_capacity_checked_at_startup() {
        let oversized = Config {
            max_values: MAX_VALUES_READ + 1,
            ..Config::default()
        };
        assert_eq!(
            oversized.validate(),
            Err(ConfigError::Capacity(SensorError::CapacityExceeded {
                capacity: MAX_VALUES_READ
            }))
        );

        let derived = Config {
            sensor: SensorSelection::Bme280 {
                sda: 21,
                scl: 22,
                address: BME280_DEFAULT_ADDRESS,
                derived_humidity: true,
            },
            max_values: 3,
            ..Config::default()
        };
        assert_eq!(
            derived.validate(),
            Err(ConfigError::TooManyValues {
                family: "BME280",
                produced: 5,
                allowed: 3
            })
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "sensor": { "bme280": { "sda": 21, "scl": 22, "derived_humidity": true } },
            "sampling": { "samples": 3 },
            "temperature_range": { "min": -40.0, "max": 85.0 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.sensor,
            SensorSelection::Bme280 {
                sda: 21,
                scl: 22,
                address: 0x76,
                derived_humidity: true
            }
        );
        assert_eq!(config.precision, 1);
        assert_eq!(config.max_values, MAX_VALUES_READ);
        assert_eq!(config.sampling_policy().samples, 3);
        assert_eq!(config.validate(), Ok(()));
    }
}
