//! Per-column accumulator over the cell stream.
//!
//! Cells arrive in document order; runs of one payload representation
//! build up in an open buffer that flushes into an immutable chunk on a
//! representation change or a row gap. Gaps materialize as null chunks so
//! chunks always cover rows `0..=e_row` without holes.

use crate::column::array::Array;
use crate::column::chunk::concatenate;
use crate::column::chunk::Chunk;
use crate::column::ConcatOptions;
use crate::workbook::cell::Cell;
use crate::workbook::cell::CellValue;
use crate::workbook::cell::TemporalKind;
use crate::workbook::shared::SharedStrings;

/// Open buffer of the series, one slot per payload representation.
#[derive(Debug, Default)]
enum Buffer {
    #[default]
    Empty,
    Text(Vec<String>),
    Shared(Vec<u32>),
    Float(Vec<f64>),
    Serial(Vec<f64>),
    Rk { raw: Vec<u32>, temporal: bool },
    Bool(Vec<bool>),
}

impl Buffer {
    /// Whether a cell payload can extend this buffer without a flush.
    fn accepts(&self, value: &CellValue) -> bool {
        matches!(
            (self, value),
            (Buffer::Text(_), CellValue::Text(_))
                | (Buffer::Shared(_), CellValue::Shared(_))
                | (Buffer::Float(_), CellValue::Number(_))
                | (Buffer::Serial(_), CellValue::Serial { .. })
                | (Buffer::Bool(_), CellValue::Bool(_))
        ) || match (self, value) {
            (Buffer::Rk { temporal, .. }, CellValue::Rk { temporal: tag, .. }) => {
                *temporal == tag.is_some()
            }
            _ => false,
        }
    }

    fn for_value(value: &CellValue) -> Buffer {
        match value {
            CellValue::Text(_) => Buffer::Text(Vec::new()),
            CellValue::Shared(_) => Buffer::Shared(Vec::new()),
            CellValue::Number(_) => Buffer::Float(Vec::new()),
            CellValue::Serial { .. } => Buffer::Serial(Vec::new()),
            CellValue::Rk { temporal, .. } => Buffer::Rk { raw: Vec::new(), temporal: temporal.is_some() },
            CellValue::Bool(_) => Buffer::Bool(Vec::new()),
        }
    }

    fn push(&mut self, value: CellValue) {
        match (self, value) {
            (Buffer::Text(data), CellValue::Text(text)) => data.push(text),
            (Buffer::Shared(data), CellValue::Shared(index)) => data.push(index),
            (Buffer::Float(data), CellValue::Number(number)) => data.push(number),
            (Buffer::Serial(data), CellValue::Serial { value, .. }) => data.push(value),
            (Buffer::Rk { raw, .. }, CellValue::Rk { raw: value, .. }) => raw.push(value),
            (Buffer::Bool(data), CellValue::Bool(value)) => data.push(value),
            _ => unreachable!("buffer accepts() checked before push"),
        }
    }

    /// Converts the buffer to a chunk, `None` when it holds nothing.
    fn into_chunk(self) -> Option<Chunk> {
        match self {
            Buffer::Empty => None,
            Buffer::Text(data) if data.is_empty() => None,
            Buffer::Text(data) => Some(Chunk::Text(data)),
            Buffer::Shared(data) if data.is_empty() => None,
            Buffer::Shared(data) => Some(Chunk::Shared(data)),
            Buffer::Float(data) if data.is_empty() => None,
            Buffer::Float(data) => Some(Chunk::Float(data)),
            Buffer::Serial(data) if data.is_empty() => None,
            Buffer::Serial(data) => Some(Chunk::Serial(data)),
            Buffer::Rk { raw, .. } if raw.is_empty() => None,
            Buffer::Rk { raw, temporal } => Some(Chunk::Rk { raw, temporal }),
            Buffer::Bool(data) if data.is_empty() => None,
            Buffer::Bool(data) => Some(Chunk::Bool(data)),
        }
    }
}

/// Accumulates one column's cells and finalizes them into a typed array.
#[derive(Debug, Default)]
pub struct Series {
    chunks: Vec<Chunk>,
    open: Buffer,
    pending_nulls: usize,
    s_row: Option<u32>,
    e_row: Option<u32>,
    temporal_kind: Option<TemporalKind>,
}

impl Series {
    pub fn new() -> Series {
        Series::default()
    }

    /// Adds a cell. Cells at or before the last observed row are ignored;
    /// a row gap records a pending null run, and a representation change
    /// flushes the open buffer into a chunk.
    pub fn add(&mut self, cell: Cell) {
        let row = cell.row;
        if let Some(e_row) = self.e_row {
            if row <= e_row {
                return;
            }
        }

        let gap = match self.e_row {
            None => row as usize,
            Some(e_row) => (row - e_row - 1) as usize,
        };
        if gap > 0 {
            self.flush();
            self.pending_nulls += gap;
        }

        if !self.open.accepts(&cell.value) {
            self.flush();
            self.open = Buffer::for_value(&cell.value);
        }

        match &cell.value {
            CellValue::Serial { kind, .. } => {
                self.temporal_kind = TemporalKind::merge(self.temporal_kind, *kind);
            }
            CellValue::Rk { temporal: Some(kind), .. } => {
                self.temporal_kind = TemporalKind::merge(self.temporal_kind, *kind);
            }
            _ => (),
        }

        self.open.push(cell.value);
        self.e_row = Some(row);
        if self.s_row.is_none() {
            self.s_row = Some(row);
        }
    }

    /// Rows between the first and last observed cell, inclusive.
    pub fn len(&self) -> usize {
        match (self.s_row, self.e_row) {
            (Some(s_row), Some(e_row)) => (e_row - s_row + 1) as usize,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.e_row.is_none()
    }

    /// Total rows the series covers from row 0, leading nulls included.
    pub fn span(&self) -> usize {
        self.e_row.map(|e_row| e_row as usize + 1).unwrap_or(0)
    }

    /// Dominant temporal flavor observed among styled cells, if any.
    pub fn temporal_kind(&self) -> Option<TemporalKind> {
        self.temporal_kind
    }

    /// Finalizes the series into one typed array, applying the slicing
    /// and conflict-resolution rules of the chunk engine. A series that
    /// never saw a cell yields nulls of the requested length.
    pub fn into_array(
        mut self,
        shared: &SharedStrings,
        offset: usize,
        length: usize,
        mask: Option<&[bool]>,
        options: &ConcatOptions,
    ) -> Array {
        self.flush();
        if self.pending_nulls > 0 {
            self.chunks.push(Chunk::Null(self.pending_nulls));
            self.pending_nulls = 0;
        }
        if self.chunks.is_empty() {
            return Array::Utf8(vec![None; length]);
        }
        concatenate(self.chunks, offset, length, mask, shared, options)
    }

    fn flush(&mut self) {
        let buffer = std::mem::take(&mut self.open);
        if let Some(chunk) = buffer.into_chunk() {
            if self.pending_nulls > 0 {
                self.chunks.push(Chunk::Null(self.pending_nulls));
                self.pending_nulls = 0;
            }
            self.chunks.push(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::casts::i8_to_rk;

    fn cell(row: u32, value: CellValue) -> Cell {
        Cell { row, col: 0, value }
    }

    fn finalize(series: Series) -> Array {
        series.into_array(&SharedStrings::empty(), 0, 0, None, &ConcatOptions::default())
    }

    #[test]
    fn contiguous_numbers() {
        let mut series = Series::new();
        for (row, value) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            series.add(cell(row as u32, CellValue::Number(value)));
        }
        assert_eq!(series.len(), 4);
        assert_eq!(series.span(), 4);
        assert_eq!(finalize(series), Array::Int64(vec![Some(1), Some(2), Some(3), Some(4)]));
    }

    #[test]
    fn row_gaps_become_nulls() {
        let mut series = Series::new();
        series.add(cell(1, CellValue::Number(1.0)));
        series.add(cell(4, CellValue::Number(2.0)));
        assert_eq!(series.span(), 5);
        assert_eq!(
            finalize(series),
            Array::Int64(vec![None, Some(1), None, None, Some(2)])
        );
    }

    #[test]
    fn stale_rows_are_ignored() {
        let mut series = Series::new();
        series.add(cell(2, CellValue::Number(1.0)));
        series.add(cell(2, CellValue::Number(9.0)));
        series.add(cell(1, CellValue::Number(9.0)));
        assert_eq!(series.len(), 1);
        assert_eq!(finalize(series), Array::Int64(vec![None, None, Some(1)]));
    }

    #[test]
    fn representation_change_splits_chunks() {
        let mut series = Series::new();
        series.add(cell(0, CellValue::Number(1.0)));
        series.add(cell(1, CellValue::Rk { raw: i8_to_rk(2), temporal: None }));
        series.add(cell(2, CellValue::Number(3.0)));
        assert_eq!(finalize(series), Array::Int64(vec![Some(1), Some(2), Some(3)]));
    }

    #[test]
    fn mixed_types_downgrade_to_strings() {
        let mut series = Series::new();
        series.add(cell(0, CellValue::Number(42.0)));
        series.add(cell(1, CellValue::Text("hello".into())));
        assert_eq!(
            finalize(series),
            Array::Utf8(vec![Some("42".into()), Some("hello".into())])
        );
    }

    #[test]
    fn empty_series_padded_with_nulls() {
        let series = Series::new();
        let array = series.into_array(&SharedStrings::empty(), 0, 3, None, &ConcatOptions::default());
        assert_eq!(array, Array::Utf8(vec![None, None, None]));
    }

    #[test]
    fn temporal_kind_tracking() {
        let mut series = Series::new();
        series.add(cell(0, CellValue::Serial { value: 45_000.0, kind: TemporalKind::Date }));
        assert_eq!(series.temporal_kind(), Some(TemporalKind::Date));
        series.add(cell(1, CellValue::Serial { value: 0.25, kind: TemporalKind::Time }));
        assert_eq!(series.temporal_kind(), Some(TemporalKind::DateTime));
    }
}
