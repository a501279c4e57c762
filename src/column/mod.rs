//! The column engine: chunk accumulation, type conflict resolution and
//! typed array output.

pub(crate) mod casts;
pub(crate) mod chunk;

mod array;
mod series;

pub use array::Array;
pub use array::DataType;
pub use casts::default_datetime_formats;
pub use casts::f8_is_i8;
pub use casts::f8_to_ms_win;
pub use casts::f8_to_rk;
pub use casts::i8_to_rk;
pub use casts::ms_to_f8_win;
pub use casts::rk_to_f8;
pub use series::Series;

use std::str::FromStr;
use thiserror::Error;

/// Errors related to column configuration.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Invalid conflict resolution mode '{0}'")]
    ConflictMode(String),
}

/// Controls whether strings are coerced into the numeric or temporal
/// type of their column when chunk types conflict.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConflictResolve {
    #[default]
    No,
    Temporal,
    Numeric,
    All,
}

impl ConflictResolve {
    /// Coerce numerics and strings toward temporal columns.
    pub fn to_datetime(self) -> bool {
        matches!(self, ConflictResolve::Temporal | ConflictResolve::All)
    }

    /// Coerce strings toward numeric columns.
    pub fn to_numerics(self) -> bool {
        matches!(self, ConflictResolve::Numeric | ConflictResolve::All)
    }
}

impl FromStr for ConflictResolve {
    type Err = ColumnError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "no" => Ok(Self::No),
            "temporal" => Ok(Self::Temporal),
            "numeric" => Ok(Self::Numeric),
            "all" => Ok(Self::All),
            _ => Err(ColumnError::ConflictMode(name.to_string())),
        }
    }
}

/// Settings for finalizing a series into a typed array.
#[derive(Clone, Debug)]
pub struct ConcatOptions {
    /// Coerce numeric chunks (and parse string chunks) to temporal when
    /// the column contains temporal data.
    pub to_datetime: bool,
    /// Parse string chunks as floats when the column contains numeric
    /// data; also enables the string → float → temporal retry.
    pub to_numerics: bool,
    /// Ordered strptime patterns for string-to-temporal attempts.
    pub datetime_formats: Vec<String>,
    /// Decimal precision of the integer-feasibility check.
    pub float_precision: i32,
}

impl Default for ConcatOptions {
    fn default() -> ConcatOptions {
        ConcatOptions {
            to_datetime: false,
            to_numerics: false,
            datetime_formats: default_datetime_formats(),
            float_precision: 6,
        }
    }
}

impl ConcatOptions {
    /// Options implied by a conflict-resolution mode.
    pub fn resolving(conflict: ConflictResolve) -> ConcatOptions {
        ConcatOptions {
            to_datetime: conflict.to_datetime(),
            to_numerics: conflict.to_numerics(),
            ..ConcatOptions::default()
        }
    }
}
