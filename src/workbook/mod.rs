//! Workbook handle: opens the OPC container, detects the format, builds
//! the shared-string table and style catalog once, and hands out lazy
//! cell extractors per worksheet.

pub mod cell;
pub(crate) mod rels;
pub mod shared;
pub mod styles;
pub mod xlsb;
pub mod xlsx;

use crate::biff12::Biff12Reader;
use crate::error::SheetError;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::workbook::cell::NullPredicate;
use crate::workbook::cell::RowPolicy;
use crate::workbook::shared::SharedStrings;
use crate::workbook::styles::StyleCatalog;
use crate::workbook::xlsb::XlsbCells;
use crate::workbook::xlsx::XlsxCells;
use either::Either;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// Structural workbook failures.
#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Not a recognizable XLSX or XLSB workbook")]
    UnsupportedFormat,

    #[error("Missing required workbook member '{0}'")]
    MissingMember(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Sheet index {0} out of range for {1} sheets")]
    SheetIndexOutOfRange(usize, usize),
}

/// Container flavor, decided by which workbook member is present.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Xlsb,
}

/// Selects a worksheet by position or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetRef {
    Index(usize),
    Name(String),
}

impl From<usize> for SheetRef {
    fn from(index: usize) -> SheetRef {
        SheetRef::Index(index)
    }
}

impl From<&str> for SheetRef {
    fn from(name: &str) -> SheetRef {
        SheetRef::Name(name.to_string())
    }
}

impl From<String> for SheetRef {
    fn from(name: String) -> SheetRef {
        SheetRef::Name(name)
    }
}

/// Extraction window and hooks for one worksheet walk.
#[derive(Default)]
pub struct SheetOptions {
    /// Logical rows discarded before the first yield.
    pub skip_rows: u32,
    /// Maximum logical rows yielded after the skip; 0 means no limit.
    pub take_rows: u32,
    /// When set, rows that produced no cell count toward neither limit.
    pub take_rows_non_empty: bool,
    /// 0-based column indices to suppress.
    pub skip_cols: HashSet<u32>,
    /// Invoked once per completed row.
    pub row_callback: Option<Box<dyn FnMut()>>,
}

/// The lazy cell sequence of one worksheet, in document order.
pub type SheetCells<'a, RS> = Either<XlsxCells<'a, RS>, XlsbCells<'a, RS>>;

/// An open workbook. Shared strings and the style catalog are built on
/// first use and read-only afterwards.
pub struct Workbook<RS: Read + Seek> {
    zip: ZipArchive<RS>,
    format: WorkbookFormat,
    sheets: Vec<(String, String)>,
    null: NullPredicate,
    shared: Option<SharedStrings>,
    styles: Option<StyleCatalog>,
}

impl Workbook<BufReader<File>> {
    /// Opens a workbook file with the default null predicate.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Workbook<BufReader<File>>, SheetError> {
        Workbook::open_with(path, NullPredicate::new())
    }

    /// Opens a workbook file with a caller-supplied null predicate. The
    /// predicate participates in the shared-strings build, so it must be
    /// fixed at open time.
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        null: NullPredicate,
    ) -> Result<Workbook<BufReader<File>>, SheetError> {
        let file = File::open(path)?;
        Workbook::from_reader_with(BufReader::new(file), null)
    }
}

impl<RS: Read + Seek> Workbook<RS> {
    pub fn from_reader(reader: RS) -> Result<Workbook<RS>, SheetError> {
        Workbook::from_reader_with(reader, NullPredicate::new())
    }

    pub fn from_reader_with(reader: RS, null: NullPredicate) -> Result<Workbook<RS>, SheetError> {
        let mut zip = ZipArchive::new(reader).map_err(|_| WorkbookError::UnsupportedFormat)?;
        let format = if contains_member(&zip, "xl/workbook.xml") {
            WorkbookFormat::Xlsx
        } else if contains_member(&zip, "xl/workbook.bin") {
            WorkbookFormat::Xlsb
        } else {
            return Err(WorkbookError::UnsupportedFormat)?;
        };
        let sheets = match format {
            WorkbookFormat::Xlsx => xlsx::load_workbook(&mut zip)?,
            WorkbookFormat::Xlsb => xlsb::load_workbook(&mut zip)?,
        };
        Ok(Workbook {
            zip,
            format,
            sheets,
            null,
            shared: None,
            styles: None,
        })
    }

    pub fn format(&self) -> WorkbookFormat {
        self.format
    }

    /// Worksheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// The workbook shared-string table, built on first call.
    pub fn shared_strings(&mut self) -> Result<&SharedStrings, SheetError> {
        self.ensure_loaded()?;
        Ok(self.shared.as_ref().expect("shared strings loaded"))
    }

    /// The workbook style catalog, built on first call.
    pub fn style_catalog(&mut self) -> Result<&StyleCatalog, SheetError> {
        self.ensure_loaded()?;
        Ok(self.styles.as_ref().expect("style catalog loaded"))
    }

    /// Starts a lazy cell walk over one worksheet. Dropping the returned
    /// iterator releases the underlying ZIP entry.
    pub fn sheet_cells(
        &mut self,
        sheet: &SheetRef,
        options: SheetOptions,
    ) -> Result<SheetCells<'_, RS>, SheetError> {
        let path = self.sheet_path(sheet)?;
        self.ensure_loaded()?;
        let policy = RowPolicy::new(options.skip_rows, options.take_rows, options.take_rows_non_empty);

        let format = self.format;
        let Workbook { zip, null, shared, styles, .. } = self;
        let shared = shared.as_ref().expect("shared strings loaded");
        let styles = styles.as_ref().expect("style catalog loaded");

        match format {
            WorkbookFormat::Xlsx => {
                let file = zip.file(&path)?
                    .ok_or(WorkbookError::MissingMember(path))?;
                Ok(Either::Left(XlsxCells::new(
                    XmlReader::new(BufReader::new(file)),
                    styles,
                    shared,
                    null,
                    policy,
                    options.skip_cols,
                    options.row_callback,
                )))
            }
            WorkbookFormat::Xlsb => {
                let file = zip.file(&path)?
                    .ok_or(WorkbookError::MissingMember(path))?;
                Ok(Either::Right(XlsbCells::new(
                    Biff12Reader::new(BufReader::new(file)),
                    styles,
                    shared,
                    null,
                    policy,
                    options.skip_cols,
                    options.row_callback,
                )))
            }
        }
    }

    fn sheet_path(&self, sheet: &SheetRef) -> Result<String, WorkbookError> {
        match sheet {
            SheetRef::Index(index) => self
                .sheets
                .get(*index)
                .map(|(_, path)| path.to_owned())
                .ok_or(WorkbookError::SheetIndexOutOfRange(*index, self.sheets.len())),
            SheetRef::Name(name) => self
                .sheets
                .iter()
                .find(|(sheet_name, _)| sheet_name == name)
                .map(|(_, path)| path.to_owned())
                .ok_or_else(|| WorkbookError::SheetNotFound(name.to_owned())),
        }
    }

    fn ensure_loaded(&mut self) -> Result<(), SheetError> {
        if self.shared.is_none() {
            let shared = match self.format {
                WorkbookFormat::Xlsx => SharedStrings::load_xlsx(&mut self.zip, &self.null)?,
                WorkbookFormat::Xlsb => SharedStrings::load_xlsb(&mut self.zip, &self.null)?,
            };
            self.shared = Some(shared);
        }
        if self.styles.is_none() {
            let styles = match self.format {
                WorkbookFormat::Xlsx => StyleCatalog::load_xlsx(&mut self.zip)?,
                WorkbookFormat::Xlsb => StyleCatalog::load_xlsb(&mut self.zip)?,
            };
            self.styles = Some(styles);
        }
        Ok(())
    }
}

fn contains_member<RS: Read + Seek>(zip: &ZipArchive<RS>, name: &str) -> bool {
    zip.file_names().any(|member| name.eq_ignore_ascii_case(member))
}
