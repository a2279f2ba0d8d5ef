//! Error types for the acquisition layer

use thiserror_no_std::Error;

/// Why a single physical read was rejected by a sensor's validity predicate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    /// The driver returned NaN for at least one channel.
    #[error("undefined value")]
    Undefined,
    /// The driver reported its disconnected-device sentinel.
    #[error("device disconnected")]
    Disconnected,
    /// The value is defined but outside the configured plausibility range.
    #[error("value out of plausible range")]
    OutOfRange,
}

/// Errors raised while acquiring telemetry from a sensor.
///
/// `TransientRead` and `SampleExhausted` are recovered inside the sampling
/// engine; only `AcquisitionFailed` and `CapacityExceeded` reach callers of
/// [`Acquisition::read_values`](crate::Acquisition::read_values).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: transient read failure ({fault})")]
    TransientRead {
        sensor: &'static str,
        fault: ReadFault,
    },
    #[error("{sensor}: no valid read after {attempts} attempts")]
    SampleExhausted { sensor: &'static str, attempts: u8 },
    #[error("{sensor}: no valid sample out of {requested}")]
    AcquisitionFailed { sensor: &'static str, requested: u8 },
    #[error("{key}: aggregated value is not a finite number")]
    UndefinedValue { key: &'static str },
    #[error("telemetry record capacity of {capacity} values exceeded")]
    CapacityExceeded { capacity: usize },
}

/// Configuration defects detected at startup. All of them are fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sample count must be at least 1")]
    NoSamples,
    #[error("attempt count must be at least 1")]
    NoAttempts,
    #[error("decimal precision {0} exceeds the supported maximum")]
    PrecisionTooHigh(u8),
    #[error("plausibility range is empty")]
    EmptyRange,
    #[error("{family} produces {produced} values but only {allowed} are allowed")]
    TooManyValues {
        family: &'static str,
        produced: usize,
        allowed: usize,
    },
    #[error("{0}")]
    Capacity(SensorError),
}

impl From<SensorError> for ConfigError {
    fn from(value: SensorError) -> Self {
        Self::Capacity(value)
    }
}
