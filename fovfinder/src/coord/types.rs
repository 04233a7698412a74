//! Coordinate types and errors

use std::fmt;

use thiserror::Error;

/// Number of arcseconds in one degree.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Lowest declination degrees value accepted by coordinate inputs.
pub const MIN_DEC_DEG_FIELD: i32 = -89;

/// Highest declination degrees value accepted by coordinate inputs.
pub const MAX_DEC_DEG_FIELD: i32 = 89;

/// Highest right ascension hours value accepted by coordinate inputs.
pub const MAX_RA_HOURS_FIELD: i32 = 23;

/// Errors from coordinate parsing and validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Malformed sexagesimal or coordinate text.
    #[error("cannot parse '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// A sexagesimal leading field outside what the input accepts.
    #[error("{unit} field {value} outside [{min}, {max}]")]
    FieldOutOfRange {
        unit: AngleUnit,
        value: i32,
        min: i32,
        max: i32,
    },
}

impl CoordError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        CoordError::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Unit of the leading sexagesimal field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    /// Hour angle (`HH:MM:SS`), 15 degrees per hour. Used for right ascension.
    Hours,
    /// Degrees (`+-DD:MM:SS`). Used for declination.
    Degrees,
}

impl AngleUnit {
    /// Degrees represented by one unit of the leading field.
    pub fn degrees_per_unit(self) -> f64 {
        match self {
            AngleUnit::Hours => 15.0,
            AngleUnit::Degrees => 1.0,
        }
    }

    /// Inclusive range accepted for the leading field by coordinate inputs.
    pub fn field_limits(self) -> (i32, i32) {
        match self {
            AngleUnit::Hours => (0, MAX_RA_HOURS_FIELD),
            AngleUnit::Degrees => (MIN_DEC_DEG_FIELD, MAX_DEC_DEG_FIELD),
        }
    }
}

impl fmt::Display for AngleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleUnit::Hours => write!(f, "hours"),
            AngleUnit::Degrees => write!(f, "degrees"),
        }
    }
}

/// A sky position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    /// Right ascension in degrees, [0, 360).
    pub ra: f64,
    /// Declination in degrees, [-90, 90].
    pub dec: f64,
}

impl SkyPoint {
    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }
}

impl From<(f64, f64)> for SkyPoint {
    fn from((ra, dec): (f64, f64)) -> Self {
        Self { ra, dec }
    }
}

impl From<SkyPoint> for (f64, f64) {
    fn from(p: SkyPoint) -> Self {
        (p.ra, p.dec)
    }
}
