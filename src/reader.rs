//! One-call reading: stream a worksheet's cells into per-column series
//! and finalize every column into a typed array.

use crate::column::Array;
use crate::column::ConcatOptions;
use crate::column::ConflictResolve;
use crate::column::DataType;
use crate::column::Series;
use crate::error::SheetError;
use crate::workbook::cell::NullPredicate;
use crate::workbook::SheetOptions;
use crate::workbook::SheetRef;
use crate::workbook::Workbook;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;

/// Options for [`read_table`].
pub struct ReadOptions {
    /// Worksheet to read, by index or name.
    pub sheet: SheetRef,
    /// Logical rows discarded before the first yield.
    pub skip_rows: u32,
    /// Maximum logical rows read after the skip; 0 means no limit.
    pub take_rows: u32,
    /// When set, rows that produced no cell count toward neither limit.
    pub take_rows_non_empty: bool,
    /// 0-based column indices to suppress.
    pub skip_cols: HashSet<u32>,
    /// Cell texts to treat as null, on top of the builtin error strings.
    pub null: NullPredicate,
    /// strptime patterns for string-to-temporal coercion; `None` selects
    /// the default ISO + European matrix.
    pub datetime_formats: Option<Vec<String>>,
    /// Whether strings coerce into numeric/temporal columns.
    pub conflict_resolve: ConflictResolve,
    /// Decimal precision of the float-to-integer feasibility check.
    pub float_precision: i32,
    /// Invoked once per completed row, for progress reporting.
    pub row_callback: Option<Box<dyn FnMut()>>,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            sheet: SheetRef::Index(0),
            skip_rows: 0,
            take_rows: 0,
            take_rows_non_empty: false,
            skip_cols: HashSet::new(),
            null: NullPredicate::new(),
            datetime_formats: None,
            conflict_resolve: ConflictResolve::No,
            float_precision: 6,
            row_callback: None,
        }
    }
}

/// One finalized column of a [`Table`].
#[derive(Debug)]
pub struct Column {
    /// 0-based worksheet column index.
    pub index: u32,
    /// Logical type, with timestamps refined by style and values.
    pub data_type: DataType,
    pub array: Array,
}

/// The columnar result of reading one worksheet. Columns appear in
/// worksheet order and all have the same length.
#[derive(Debug, Default)]
pub struct Table {
    pub columns: Vec<Column>,
}

impl Table {
    /// Number of rows (the common column length).
    pub fn len(&self) -> usize {
        self.columns.first().map(|column| column.array.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column by worksheet index.
    pub fn column(&self, index: u32) -> Option<&Column> {
        self.columns.iter().find(|column| column.index == index)
    }
}

/// Reads one worksheet of a workbook file into typed columns.
pub fn read_table<P: AsRef<Path>>(path: P, options: ReadOptions) -> Result<Table, SheetError> {
    let file = File::open(path)?;
    read_table_from(BufReader::new(file), options)
}

/// Reads one worksheet from any seekable byte source into typed columns.
pub fn read_table_from<RS: Read + Seek>(reader: RS, options: ReadOptions) -> Result<Table, SheetError> {
    let ReadOptions {
        sheet,
        skip_rows,
        take_rows,
        take_rows_non_empty,
        skip_cols,
        null,
        datetime_formats,
        conflict_resolve,
        float_precision,
        row_callback,
    } = options;

    let mut workbook = Workbook::from_reader_with(reader, null)?;
    let mut columns: BTreeMap<u32, Series> = BTreeMap::new();
    {
        let cells = workbook.sheet_cells(
            &sheet,
            SheetOptions {
                skip_rows,
                take_rows,
                take_rows_non_empty,
                skip_cols,
                row_callback,
            },
        )?;
        for cell in cells {
            let cell = cell?;
            columns.entry(cell.col).or_default().add(cell);
        }
    }

    let mut concat = ConcatOptions::resolving(conflict_resolve);
    concat.float_precision = float_precision;
    if let Some(formats) = datetime_formats {
        concat.datetime_formats = formats;
    }

    // Pad every column to the longest span so rows line up.
    let length = columns.values().map(Series::span).max().unwrap_or(0);
    let shared = workbook.shared_strings()?;

    let mut table = Table::default();
    for (index, series) in columns {
        let kind = series.temporal_kind();
        let array = series.into_array(shared, 0, length, None, &concat);
        let data_type = array.logical_type(kind);
        table.columns.push(Column { index, data_type, array });
    }
    Ok(table)
}
