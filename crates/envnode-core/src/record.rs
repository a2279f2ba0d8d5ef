//! Fixed-capacity telemetry record handed to the uplink encoder
//!
//! The record replaces a dynamically sized JSON document: its capacity is a
//! compile-time constant so the encoder can size its buffer up front and no
//! acquisition cycle ever allocates.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::SensorError;
use crate::measurement::{DEFAULT_PRECISION, FormattedValue, Measurement, Quantity};

/// Maximum number of distinct keys a telemetry record can hold.
pub const MAX_VALUES_READ: usize = 5;

/// One key/value pair of a [`TelemetryRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntry {
    pub quantity: Quantity,
    pub value: FormattedValue,
}

impl RecordEntry {
    pub const fn key(&self) -> &'static str {
        self.quantity.key()
    }
}

/// Insertion-ordered map from quantity key to formatted value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryRecord<const N: usize = MAX_VALUES_READ> {
    entries: heapless::Vec<RecordEntry, N>,
}

impl<const N: usize> TelemetryRecord<N> {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a formatted value. An existing key keeps its position and has
    /// its value replaced; a new key beyond capacity is refused.
    pub fn insert(&mut self, quantity: Quantity, value: FormattedValue) -> Result<(), SensorError> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.quantity == quantity) {
            entry.value = value;
            return Ok(());
        }

        self.entries
            .push(RecordEntry { quantity, value })
            .map_err(|_| SensorError::CapacityExceeded { capacity: N })
    }

    pub fn get(&self, quantity: Quantity) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.quantity == quantity)
            .map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries.iter()
    }
}

impl<const N: usize> Serialize for TelemetryRecord<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(entry.key(), entry.value.as_str())?;
        }
        map.end()
    }
}

/// Turns aggregated means into a telemetry record.
///
/// `limit` is the configured key budget (at most the record capacity). Going
/// over it is an error, never a silently dropped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBuilder {
    precision: u8,
    limit: usize,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION, MAX_VALUES_READ)
    }
}

impl RecordBuilder {
    pub const fn new(precision: u8, limit: usize) -> Self {
        Self { precision, limit }
    }

    /// Build a record from `(quantity, mean)` pairs, in order.
    ///
    /// A non-finite mean means the aggregation produced nothing usable for
    /// that quantity; the whole record is refused instead of carrying it.
    pub fn build<const N: usize>(
        &self,
        values: &[(Quantity, f64)],
    ) -> Result<TelemetryRecord<N>, SensorError> {
        let capacity = self.limit.min(N);
        if values.len() > capacity {
            return Err(SensorError::CapacityExceeded { capacity });
        }

        let mut record = TelemetryRecord::new();
        for &(quantity, value) in values {
            let formatted = Measurement::new(quantity, value, self.precision)
                .and_then(|m| m.formatted())
                .ok_or(SensorError::UndefinedValue {
                    key: quantity.key(),
                })?;
            record.insert(quantity, formatted)?;
        }

        Ok(record)
    }
}
