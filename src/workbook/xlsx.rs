//! Streaming cell extractor for XLSX worksheets, driven by the pull XML
//! parser.

use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::workbook::cell::column_index;
use crate::workbook::cell::Cell;
use crate::workbook::cell::CellValue;
use crate::workbook::cell::NullPredicate;
use crate::workbook::cell::RowPolicy;
use crate::workbook::shared::read_string_value;
use crate::workbook::shared::SharedStrings;
use crate::workbook::styles::StyleCatalog;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;

const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_VALUE: QName = QName(b"v");
const TAG_INLINE_STRING: QName = QName(b"is");

/// Reads the worksheet list of `xl/workbook.xml` in workbook order, as
/// `(name, member path)` pairs resolved through the relationship map.
pub(crate) fn load_workbook<RS: Read + Seek>(
    zip: &mut zip::ZipArchive<RS>,
) -> Result<Vec<(String, String)>, SheetError> {
    use crate::helpers::xml::XmlAttributeHelper;
    use crate::helpers::zip::ZipHelper;
    use crate::match_xml_events;
    use crate::workbook::rels::load_relationships;
    use crate::workbook::WorkbookError;

    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| WorkbookError::MissingMember("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<'_, str>>;
            let mut id = None::<Cow<'_, str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// How the `t` attribute (plus the style) asks the cell value to be read.
#[derive(Copy, Clone, Debug)]
enum CellTag {
    /// `t="s"`, the value is a shared-string index.
    Shared,
    /// `t="b"`, the value is 0 or 1.
    Boolean,
    /// `t="str"`, `t="inlineStr"` and `t="d"`: plain text.
    Str,
    /// `t="n"` or no `t`: numeric, subject to the style catalog.
    Number,
}

/// Lazy cell sequence over one XLSX worksheet stream.
///
/// A pull-based state machine over the SAX events: `<c>` opens a cell,
/// its `<v>` or `<is>` content is the value, `</row>` advances the row
/// policy. Dropping the iterator releases the ZIP entry and the parser.
pub struct XlsxCells<'a, RS: Read + Seek> {
    reader: XmlReader<BufReader<ZipFile<'a, RS>>>,
    styles: &'a StyleCatalog,
    shared: &'a SharedStrings,
    null: &'a NullPredicate,
    policy: RowPolicy,
    skip_cols: HashSet<u32>,
    row_callback: Option<Box<dyn FnMut() + 'a>>,
    done: bool,
}

impl<'a, RS: Read + Seek> XlsxCells<'a, RS> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reader: XmlReader<BufReader<ZipFile<'a, RS>>>,
        styles: &'a StyleCatalog,
        shared: &'a SharedStrings,
        null: &'a NullPredicate,
        policy: RowPolicy,
        skip_cols: HashSet<u32>,
        row_callback: Option<Box<dyn FnMut() + 'a>>,
    ) -> XlsxCells<'a, RS> {
        XlsxCells {
            reader,
            styles,
            shared,
            null,
            policy,
            skip_cols,
            row_callback,
            done: false,
        }
    }

    fn advance(&mut self) -> Result<Option<Cell>, SheetError> {
        if self.done {
            return Ok(None);
        }
        loop {
            let event = match self.reader.next()? {
                Some(event) => event,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };
            match event {
                Event::Start(start) if start.name() == TAG_CELL => {
                    let reference = start.get_attribute_value("r")?.map(Cow::into_owned);
                    let tag = match start.get_attribute_value("t")?.as_deref() {
                        Some("s") => CellTag::Shared,
                        Some("b") => CellTag::Boolean,
                        Some("str") | Some("inlineStr") | Some("d") | Some("e") => CellTag::Str,
                        _ => CellTag::Number,
                    };
                    let style = start.parse_attribute_value::<u32>("s")?;
                    if let Some(cell) = self.read_cell(reference, tag, style)? {
                        return Ok(Some(cell));
                    }
                }
                Event::End(end) if end.name() == TAG_ROW => {
                    let stop = self.policy.end_row();
                    if let Some(callback) = &mut self.row_callback {
                        callback();
                    }
                    if stop {
                        self.done = true;
                        return Ok(None);
                    }
                }
                _ => (),
            }
        }
    }

    /// Consumes the events up to `</c>`, collecting the value text, and
    /// builds the cell. Returns `None` for suppressed cells.
    fn read_cell(
        &mut self,
        reference: Option<String>,
        tag: CellTag,
        style: Option<u32>,
    ) -> Result<Option<Cell>, SheetError> {
        let mut value = String::new();
        let mut in_value = false;
        loop {
            let event = match self.reader.next()? {
                Some(event) => event,
                None => break,
            };
            match event {
                Event::End(end) if end.name() == TAG_CELL => break,
                Event::Start(start) if start.name() == TAG_VALUE => in_value = true,
                Event::End(end) if end.name() == TAG_VALUE => in_value = false,
                Event::Start(start) if start.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut self.reader, TAG_INLINE_STRING, false)?;
                }
                Event::Text(text) if in_value => value.push_str(&text.xml_content()?),
                Event::CData(text) if in_value => value.push_str(&text.xml_content()?),
                Event::GeneralRef(general) if in_value => value.push_bytes_ref(&general)?,
                _ => (),
            }
        }

        let col = match reference.as_deref().and_then(column_index) {
            Some(col) => col,
            None => return Ok(None),
        };
        if self.skip_cols.contains(&col) {
            return Ok(None);
        }
        let text = value.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let value = match tag {
            CellTag::Shared => {
                let index: u32 = match text.parse() {
                    Ok(index) => index,
                    Err(_) => return Ok(None),
                };
                if self.shared.is_null(index) {
                    return Ok(None);
                }
                CellValue::Shared(index)
            }
            CellTag::Boolean => {
                if self.null.is_null(text) {
                    return Ok(None);
                }
                CellValue::Bool(text == "1" || text.eq_ignore_ascii_case("true"))
            }
            CellTag::Str => {
                if self.null.is_null(text) {
                    return Ok(None);
                }
                CellValue::Text(text.to_string())
            }
            CellTag::Number => {
                if self.null.is_null(text) {
                    return Ok(None);
                }
                match text.parse::<f64>() {
                    Ok(number) => match style.and_then(|style| self.styles.temporal(style)) {
                        Some(kind) => CellValue::Serial { value: number, kind },
                        None => CellValue::Number(number),
                    },
                    // Not a float after all; keep the one cell as text.
                    Err(_) => CellValue::Text(text.to_string()),
                }
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

impl<'a, RS: Read + Seek> Iterator for XlsxCells<'a, RS> {
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
