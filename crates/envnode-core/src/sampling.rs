//! Sampling, retry and aggregation engine
//!
//! Every acquisition is a window of `samples` samples. Each sample is one
//! call to [`Sampler::read_with_retry`], which performs up to `max_attempts`
//! physical reads and returns the first one that passes the sensor's
//! validity predicate. Samples that exhaust their attempts are skipped; the
//! window succeeds when at least one sample was valid and reports the mean of
//! exactly the valid samples.
//!
//! ```text
//! Idle -> Sampling(attempt 1..=max_attempts)
//!      -> ValidSample -> Accumulating | InvalidSample -> Retry or SampleExhausted
//!      -> Averaging -> Done(ok) | Done(AcquisitionFailed)
//! ```
//!
//! Waits go through an injected [`DelayNs`] so firmware can pass
//! `embassy_time::Delay` and tests can observe the timing without sleeping.

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::error::SensorError;
use crate::sensors::{Sensor, SensorReadings};

/// Timing and count parameters of one acquisition window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Samples requested per window.
    pub samples: u8,
    /// Physical reads allowed per sample.
    pub max_attempts: u8,
    /// Wait after every physical read (sensor minimum sampling interval).
    pub settle_ms: u32,
    /// Wait after an invalid read before the next attempt.
    pub retry_backoff_ms: u32,
}

impl SamplingPolicy {
    /// DHT11/22: the read is always followed by the 2 s minimum interval,
    /// which also serves as the retry backoff.
    pub const DHT: Self = Self {
        samples: 5,
        max_attempts: 3,
        settle_ms: 2100,
        retry_backoff_ms: 0,
    };

    pub const DS18B20: Self = Self {
        samples: 5,
        max_attempts: 3,
        settle_ms: 0,
        retry_backoff_ms: 2000,
    };

    pub const BME280: Self = Self {
        samples: 5,
        max_attempts: 3,
        settle_ms: 0,
        retry_backoff_ms: 2000,
    };

    /// Hard upper bound on the duration of one window, given the time a
    /// single physical read takes. Callers size their watchdogs from this.
    pub const fn worst_case_latency_ms(&self, per_read_ms: u32) -> u64 {
        let reads = self.samples as u64 * self.max_attempts as u64;
        reads * (self.settle_ms as u64 + self.retry_backoff_ms as u64 + per_read_ms as u64)
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::BME280
    }
}

/// Running sums of the valid samples in a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate<const COUNT: usize> {
    sums: [f64; COUNT],
    contributing: u8,
    requested: u8,
}

impl<const COUNT: usize> Aggregate<COUNT> {
    pub const fn new(requested: u8) -> Self {
        Self {
            sums: [0.0; COUNT],
            contributing: 0,
            requested,
        }
    }

    pub fn accumulate(&mut self, values: &[f32; COUNT]) {
        for (sum, &value) in self.sums.iter_mut().zip(values) {
            *sum += f64::from(value);
        }
        self.contributing = self.contributing.saturating_add(1);
    }

    /// Per-channel mean over the valid samples, `None` if there were none.
    pub fn means(&self) -> Option<[f64; COUNT]> {
        if self.contributing == 0 {
            return None;
        }
        let n = f64::from(self.contributing);
        Some(core::array::from_fn(|i| self.sums[i] / n))
    }

    pub const fn contributing(&self) -> u8 {
        self.contributing
    }

    pub const fn requested(&self) -> u8 {
        self.requested
    }

    /// Whether every requested sample was valid.
    pub const fn is_complete(&self) -> bool {
        self.contributing == self.requested
    }
}

pub struct Sampler<D> {
    delay: D,
    policy: SamplingPolicy,
}

impl<D: DelayNs> Sampler<D> {
    pub const fn new(delay: D, policy: SamplingPolicy) -> Self {
        Self { delay, policy }
    }

    pub const fn policy(&self) -> &SamplingPolicy {
        &self.policy
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Read the sensor until one read passes its validity predicate.
    ///
    /// Returns [`SensorError::SampleExhausted`] after `max_attempts` invalid
    /// reads. Backoff is only waited before a further attempt.
    pub async fn read_with_retry<const COUNT: usize, S: Sensor<COUNT>>(
        &mut self,
        sensor: &mut S,
    ) -> Result<[f32; COUNT], SensorError> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let readings = sensor.read().await;

            if self.policy.settle_ms > 0 {
                self.delay.delay_ms(self.policy.settle_ms).await;
            }

            match sensor.check(&readings) {
                Ok(()) => return Ok(readings.to_array()),
                Err(fault) => {
                    let transient = SensorError::TransientRead {
                        sensor: sensor.name(),
                        fault,
                    };
                    warn!("{} (attempt {}/{})", transient, attempt, attempts);

                    if attempt < attempts && self.policy.retry_backoff_ms > 0 {
                        self.delay.delay_ms(self.policy.retry_backoff_ms).await;
                    }
                }
            }
        }

        let exhausted = SensorError::SampleExhausted {
            sensor: sensor.name(),
            attempts,
        };
        error!("{}", exhausted);
        Err(exhausted)
    }

    /// Run a full window and average the valid samples.
    pub async fn sample_window<const COUNT: usize, S: Sensor<COUNT>>(
        &mut self,
        sensor: &mut S,
    ) -> Result<Aggregate<COUNT>, SensorError> {
        let samples = self.policy.samples.max(1);
        let mut aggregate = Aggregate::<COUNT>::new(samples);

        info!("{}: measuring {} samples", sensor.name(), samples);

        for sample in 1..=samples {
            // Exhausted samples were already logged and are simply not counted.
            if let Ok(values) = self.read_with_retry::<COUNT, S>(sensor).await {
                debug!("{}: sample {}: {:?}", sensor.name(), sample, values);
                aggregate.accumulate(&values);
            }
        }

        if aggregate.contributing() == 0 {
            let failed = SensorError::AcquisitionFailed {
                sensor: sensor.name(),
                requested: samples,
            };
            error!("{}", failed);
            return Err(failed);
        }

        if !aggregate.is_complete() {
            warn!(
                "{}: only {}/{} samples valid",
                sensor.name(),
                aggregate.contributing(),
                samples
            );
        }

        Ok(aggregate)
    }
}
