//! Finalized column data and its logical type.

use crate::column::casts::dt_has_d;
use crate::column::casts::dt_has_t;
use crate::workbook::cell::TemporalKind;

/// One finalized column: a typed vector with element-level nulls.
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    /// Unix milliseconds; time-only values stay inside `[0, 86_400_000)`.
    TimestampMs(Vec<Option<i64>>),
    Utf8(Vec<Option<String>>),
}

/// Logical column type, refining timestamps into date/time/duration when
/// the styles and the values agree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    Int64,
    Float64,
    Timestamp,
    Date,
    Time,
    Duration,
    Utf8,
}

impl Array {
    pub fn len(&self) -> usize {
        match self {
            Array::Int64(values) => values.len(),
            Array::Float64(values) => values.len(),
            Array::TimestampMs(values) => values.len(),
            Array::Utf8(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of null elements.
    pub fn null_count(&self) -> usize {
        match self {
            Array::Int64(values) => values.iter().filter(|value| value.is_none()).count(),
            Array::Float64(values) => values.iter().filter(|value| value.is_none()).count(),
            Array::TimestampMs(values) => values.iter().filter(|value| value.is_none()).count(),
            Array::Utf8(values) => values.iter().filter(|value| value.is_none()).count(),
        }
    }

    /// Logical type of the column. `kind` is the temporal flavor the
    /// style catalog observed for the column's cells; timestamp columns
    /// without a decisive style are classified from their values (no date
    /// part means a time, no time part means a date).
    pub fn logical_type(&self, kind: Option<TemporalKind>) -> DataType {
        match self {
            Array::Int64(_) => DataType::Int64,
            Array::Float64(_) => DataType::Float64,
            Array::Utf8(_) => DataType::Utf8,
            Array::TimestampMs(values) => match kind {
                Some(TemporalKind::Duration) => DataType::Duration,
                Some(TemporalKind::Time) => DataType::Time,
                Some(TemporalKind::Date) if !dt_has_t(values) => DataType::Date,
                Some(_) => DataType::Timestamp,
                None if !dt_has_d(values) => DataType::Time,
                None if !dt_has_t(values) => DataType::Date,
                None => DataType::Timestamp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_type_refinement() {
        let midnights = Array::TimestampMs(vec![Some(1_678_838_400_000), None]);
        assert_eq!(midnights.logical_type(Some(TemporalKind::Date)), DataType::Date);
        assert_eq!(midnights.logical_type(None), DataType::Date);

        let afternoon = Array::TimestampMs(vec![Some(1_678_838_400_000 + 3_600_000)]);
        assert_eq!(afternoon.logical_type(Some(TemporalKind::Date)), DataType::Timestamp);
        assert_eq!(afternoon.logical_type(Some(TemporalKind::DateTime)), DataType::Timestamp);

        let clock = Array::TimestampMs(vec![Some(3_600_000)]);
        assert_eq!(clock.logical_type(None), DataType::Time);
        assert_eq!(clock.logical_type(Some(TemporalKind::Duration)), DataType::Duration);

        assert_eq!(Array::Int64(vec![]).logical_type(None), DataType::Int64);
        assert_eq!(Array::Utf8(vec![]).logical_type(None), DataType::Utf8);
    }

    #[test]
    fn null_counting() {
        let array = Array::Float64(vec![Some(1.0), None, None]);
        assert_eq!(array.len(), 3);
        assert_eq!(array.null_count(), 2);
    }
}
