//! Streaming cell extractor for XLSB worksheets, driven by the BIFF12
//! record scanner.

use crate::biff12::Biff12Reader;
use crate::error::SheetError;
use crate::workbook::cell::Cell;
use crate::workbook::cell::CellValue;
use crate::workbook::cell::NullPredicate;
use crate::workbook::cell::RowPolicy;
use crate::workbook::shared::SharedStrings;
use crate::workbook::styles::StyleCatalog;
use std::collections::HashSet;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;

// BIFF12 record ids used across the crate

/// Row header record
pub(crate) const BRT_ROW_HDR: u16 = 0;
/// Cell containing an RK number (compressed numeric)
pub(crate) const BRT_CELL_RK: u16 = 2;
/// Cell containing a boolean value
pub(crate) const BRT_CELL_BOOL: u16 = 4;
/// Cell containing a double
pub(crate) const BRT_CELL_REAL: u16 = 5;
/// Cell containing an inline string
pub(crate) const BRT_CELL_ST: u16 = 6;
/// Cell containing a shared string reference
pub(crate) const BRT_CELL_ISST: u16 = 7;
/// Formula with a cached string result
pub(crate) const BRT_FMLA_STRING: u16 = 8;
/// Formula with a cached numeric result
pub(crate) const BRT_FMLA_NUM: u16 = 9;
/// Formula with a cached boolean result
pub(crate) const BRT_FMLA_BOOL: u16 = 10;
/// Shared string table item
pub(crate) const BRT_SST_ITEM: u16 = 19;
/// Number format definition
pub(crate) const BRT_FMT: u16 = 44;
/// Cell formatting record (XF)
pub(crate) const BRT_XF: u16 = 47;
/// End of the worksheet bundle list
pub(crate) const BRT_END_BUNDLE_SHS: u16 = 144;
/// End of the sheet data section
pub(crate) const BRT_END_SHEET_DATA: u16 = 146;
/// Worksheet bundle entry
pub(crate) const BRT_BUNDLE_SH: u16 = 156;

/// Reads the worksheet bundle of `xl/workbook.bin` in workbook order, as
/// `(name, member path)` pairs resolved through the relationship map.
/// The scan stops in front of `BrtEndBundleShs`.
pub(crate) fn load_workbook<RS: Read + Seek>(
    zip: &mut zip::ZipArchive<RS>,
) -> Result<Vec<(String, String)>, SheetError> {
    use crate::helpers::zip::ZipHelper;
    use crate::workbook::rels::load_relationships;
    use crate::workbook::WorkbookError;

    let relationships = load_relationships(zip, "xl/_rels/workbook.bin.rels")?;
    let mut reader = zip.biff_reader("xl/workbook.bin")?
        .ok_or_else(|| WorkbookError::MissingMember("xl/workbook.bin".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    while reader.scan_until(&[BRT_BUNDLE_SH], &[BRT_END_BUNDLE_SHS])?.is_some() {
        // BrtBundleSh: u32 hsState, u32 iTabID, XLWideString rel id,
        // XLWideString sheet name.
        if reader.size() < 12 {
            continue;
        }
        let (rel_id, bound) = reader.wide_str(8)?;
        let Some(rel_id) = rel_id else { continue };
        let Some(path) = relationships.get(rel_id.as_ref()).cloned() else { continue };
        let (name, _) = reader.wide_str(bound)?;
        let Some(name) = name else { continue };
        sheets.push((name.to_string(), path));
    }
    Ok(sheets)
}

/// Record ids the worksheet walk cares about.
const SHEET_RECORDS: [u16; 10] = [
    BRT_ROW_HDR,
    BRT_CELL_RK,
    BRT_CELL_BOOL,
    BRT_CELL_REAL,
    BRT_CELL_ST,
    BRT_CELL_ISST,
    BRT_FMLA_STRING,
    BRT_FMLA_NUM,
    BRT_FMLA_BOOL,
    BRT_END_SHEET_DATA,
];

/// Lazy cell sequence over one XLSB worksheet stream.
///
/// Rows are delimited by `BrtRowHdr` records and counted by occurrence;
/// `BrtEndSheetData` is the logical terminator. Dropping the iterator
/// releases the underlying ZIP entry.
pub struct XlsbCells<'a, RS: Read + Seek> {
    reader: Biff12Reader<BufReader<ZipFile<'a, RS>>>,
    styles: &'a StyleCatalog,
    shared: &'a SharedStrings,
    null: &'a NullPredicate,
    policy: RowPolicy,
    skip_cols: HashSet<u32>,
    row_callback: Option<Box<dyn FnMut() + 'a>>,
    started: bool,
    done: bool,
}

impl<'a, RS: Read + Seek> XlsbCells<'a, RS> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reader: Biff12Reader<BufReader<ZipFile<'a, RS>>>,
        styles: &'a StyleCatalog,
        shared: &'a SharedStrings,
        null: &'a NullPredicate,
        policy: RowPolicy,
        skip_cols: HashSet<u32>,
        row_callback: Option<Box<dyn FnMut() + 'a>>,
    ) -> XlsbCells<'a, RS> {
        XlsbCells {
            reader,
            styles,
            shared,
            null,
            policy,
            skip_cols,
            row_callback,
            started: false,
            done: false,
        }
    }

    fn close_row(&mut self) -> bool {
        let stop = self.policy.end_row();
        if let Some(callback) = &mut self.row_callback {
            callback();
        }
        if stop {
            self.done = true;
        }
        stop
    }

    fn advance(&mut self) -> Result<Option<Cell>, SheetError> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.reader.scan(&SHEET_RECORDS)? {
                None => {
                    if self.started {
                        self.close_row();
                    }
                    self.done = true;
                    return Ok(None);
                }
                Some(BRT_ROW_HDR) => {
                    if self.started && self.close_row() {
                        return Ok(None);
                    }
                    self.started = true;
                }
                Some(BRT_END_SHEET_DATA) => {
                    if self.started {
                        self.close_row();
                    }
                    self.done = true;
                    return Ok(None);
                }
                Some(id) => {
                    if !self.started {
                        continue;
                    }
                    if let Some(cell) = self.decode_cell(id)? {
                        return Ok(Some(cell));
                    }
                }
            }
        }
    }

    /// Decodes a cell record. Every cell payload starts with the column
    /// (bytes 0..4) and the 3-byte style index (bytes 4..7); the value
    /// follows at byte 8. Returns `None` for suppressed or bad cells.
    fn decode_cell(&mut self, id: u16) -> Result<Option<Cell>, SheetError> {
        if self.reader.size() < 9 {
            return Ok(None);
        }
        let col = self.reader.get_u32(0);
        if self.skip_cols.contains(&col) {
            return Ok(None);
        }
        let temporal = self.styles.temporal(self.reader.get_style(4));

        let value = match id {
            BRT_CELL_ST | BRT_FMLA_STRING => match self.reader.cell_str(8) {
                Ok(Some(text)) if !self.null.is_null(&text) => CellValue::Text(text.into_owned()),
                Ok(Some(_)) => return Ok(None),
                Ok(None) => {
                    log::warn!("undecodable UTF-16 in string cell, skipping");
                    return Ok(None);
                }
                Err(error) => {
                    log::warn!("truncated string cell payload, skipping: {error}");
                    return Ok(None);
                }
            },
            BRT_CELL_ISST => {
                if self.reader.size() < 12 {
                    return Ok(None);
                }
                let index = self.reader.get_u32(8);
                if self.shared.is_null(index) {
                    return Ok(None);
                }
                CellValue::Shared(index)
            }
            BRT_CELL_REAL | BRT_FMLA_NUM => {
                if self.reader.size() < 16 {
                    return Ok(None);
                }
                let number = self.reader.get_f64(8);
                match temporal {
                    Some(kind) => CellValue::Serial { value: number, kind },
                    None => CellValue::Number(number),
                }
            }
            BRT_CELL_BOOL | BRT_FMLA_BOOL => CellValue::Bool(self.reader.data()[8] != 0),
            _ => {
                // BrtCellRk
                if self.reader.size() < 12 {
                    return Ok(None);
                }
                CellValue::Rk { raw: self.reader.get_u32(8), temporal }
            }
        };

        self.policy.mark_cell();
        let row = match self.policy.emit_row() {
            Some(row) => row,
            None => return Ok(None),
        };
        Ok(Some(Cell { row, col, value }))
    }
}

impl<'a, RS: Read + Seek> Iterator for XlsbCells<'a, RS> {
    type Item = Result<Cell, SheetError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(cell)) => Some(Ok(cell)),
            Ok(None) => None,
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}
