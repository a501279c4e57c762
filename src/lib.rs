//! # sheetframe
//!
//! Streaming reader for Excel workbooks in the XML-based XLSX and the
//! binary BIFF12-based XLSB formats, producing columnar arrays whose
//! types are inferred from the cells and their styles.
//!
//! The pieces compose bottom-up:
//!
//! - [`biff12`]: record framing over any byte stream (variable-length id
//!   and size, lazy scanning with id filters).
//! - [`workbook`]: the workbook handle with its shared-string table and
//!   style catalog, and per-worksheet lazy cell extractors for both
//!   formats.
//! - [`column`]: the series/chunk engine that stitches cells into typed
//!   columns, resolving numeric/temporal/string conflicts with the Excel
//!   serial-date convention (including the 1900 leap-year quirk).
//! - [`read_table`]: the one-call path from a file to a [`Table`].
//!
//! ```no_run
//! use sheetframe::{read_table, ReadOptions};
//!
//! let table = read_table("report.xlsx", ReadOptions::default())?;
//! for column in &table.columns {
//!     println!("column {} is {:?}", column.index, column.data_type);
//! }
//! # Ok::<(), sheetframe::SheetError>(())
//! ```

pub mod biff12;
pub mod column;
pub mod workbook;

mod error;
mod helpers;
mod reader;

pub use crate::column::Array;
pub use crate::column::ColumnError;
pub use crate::column::ConcatOptions;
pub use crate::column::ConflictResolve;
pub use crate::column::DataType;
pub use crate::column::Series;
pub use crate::error::SheetError;
pub use crate::helpers::xml::XmlError;
pub use crate::reader::read_table;
pub use crate::reader::read_table_from;
pub use crate::reader::Column;
pub use crate::reader::ReadOptions;
pub use crate::reader::Table;
pub use crate::workbook::cell::Cell;
pub use crate::workbook::cell::CellValue;
pub use crate::workbook::cell::NullPredicate;
pub use crate::workbook::cell::TemporalKind;
pub use crate::workbook::shared::SharedStrings;
pub use crate::workbook::styles::CellStyle;
pub use crate::workbook::styles::StyleCatalog;
pub use crate::workbook::SheetCells;
pub use crate::workbook::SheetOptions;
pub use crate::workbook::SheetRef;
pub use crate::workbook::Workbook;
pub use crate::workbook::WorkbookError;
pub use crate::workbook::WorkbookFormat;
