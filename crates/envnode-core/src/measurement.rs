//! Physical quantities and their fixed-decimal rendering

use core::fmt::Write;

/// Highest number of decimal places a measurement may be rendered with.
pub const MAX_PRECISION: u8 = 6;

/// Decimal precision used when none is configured.
pub const DEFAULT_PRECISION: u8 = 1;

/// Longest rendering we ever produce: sign, 10 integer digits, point, 6 decimals.
pub const FORMATTED_CAPACITY: usize = 20;

/// Fixed-decimal rendering of a measurement value.
pub type FormattedValue = heapless::String<FORMATTED_CAPACITY>;

/// The closed vocabulary of quantities a telemetry record may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    RelativeHumidity,
    AbsoluteHumidity,
    HumidityRatio,
    Pressure,
}

impl Quantity {
    /// Key under which the quantity appears in the telemetry record.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::RelativeHumidity => "relativeH",
            Self::AbsoluteHumidity => "absoluteH",
            Self::HumidityRatio => "ratioH",
            Self::Pressure => "pressure",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::RelativeHumidity => "%",
            Self::AbsoluteHumidity => "g/m3",
            Self::HumidityRatio => "g/kg",
            Self::Pressure => "hPa",
        }
    }
}

/// A named physical value with the precision it is reported at.
///
/// Measurements are immutable once built; the raw `f64` is kept so that
/// rounding only ever happens at output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    quantity: Quantity,
    value: f64,
    precision: u8,
}

impl Measurement {
    /// Returns `None` for NaN/infinite values or an unsupported precision,
    /// so an undefined reading can never be mistaken for a real one.
    pub fn new(quantity: Quantity, value: f64, precision: u8) -> Option<Self> {
        if !value.is_finite() || precision > MAX_PRECISION {
            return None;
        }

        Some(Self {
            quantity,
            value,
            precision,
        })
    }

    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub const fn key(&self) -> &'static str {
        self.quantity.key()
    }

    pub const fn unit(&self) -> &'static str {
        self.quantity.unit()
    }

    /// Render the value with the measurement's fixed precision.
    ///
    /// Only fails for magnitudes no environmental sensor produces.
    pub fn formatted(&self) -> Option<FormattedValue> {
        format_fixed(self.value, self.precision)
    }
}

/// Format `value` with exactly `precision` decimals, rounding half away from
/// zero (`0.25` at one decimal renders as `"0.3"`, `-0.25` as `"-0.3"`).
pub fn format_fixed(value: f64, precision: u8) -> Option<FormattedValue> {
    if !value.is_finite() || precision > MAX_PRECISION {
        return None;
    }

    let scale = 10_i64.pow(u32::from(precision));
    let scaled = value * scale as f64;
    // i64 holds far more than any sensor range; refuse rather than saturate.
    if scaled.abs() >= 1.0e15 {
        return None;
    }

    // libm::round ties away from zero.
    let rounded = libm::round(scaled) as i64;

    let integer = (rounded / scale).unsigned_abs();
    let fraction = (rounded % scale).unsigned_abs();

    let mut out = FormattedValue::new();
    if rounded < 0 {
        out.push('-').ok()?;
    }
    write!(out, "{integer}").ok()?;
    if precision > 0 {
        write!(out, ".{fraction:0width$}", width = usize::from(precision)).ok()?;
    }

    Some(out)
}
