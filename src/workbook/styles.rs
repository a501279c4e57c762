//! Style catalog: resolves cell XF indices to a semantic value class.
//!
//! Whether a float cell is a date is not a property of the cell but of its
//! style's number format; 45000.0 renders as either "45000" or
//! "2023-03-15" depending on the XF it references. The catalog merges the
//! builtin format ids with workbook-defined format codes.

use crate::error::SheetError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::workbook::cell::TemporalKind;
use crate::workbook::xlsb::BRT_FMT;
use crate::workbook::xlsb::BRT_XF;
use quick_xml::events::Event;
use quick_xml::name::QName;
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");

/// Builtin temporal format ids: 0x0E-0x11 dates, 0x12-0x15 times, 0x16
/// date-time, 0x2D-0x2F elapsed (duration) formats.
fn builtin_temporal(id: u32) -> Option<TemporalKind> {
    match id {
        0x0E..=0x11 => Some(TemporalKind::Date),
        0x12..=0x15 => Some(TemporalKind::Time),
        0x16 => Some(TemporalKind::DateTime),
        0x2D..=0x2F => Some(TemporalKind::Duration),
        _ => None,
    }
}

/// Builtin plain-numeric format ids.
fn builtin_numeric(id: u32) -> bool {
    matches!(id, 0x01..=0x04 | 0x25..=0x28 | 0x30)
}

/// Value class a cell style assigns to numeric cell payloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellStyle {
    Numeric,
    Temporal(TemporalKind),
}

/// Mapping from cell XF index to the value class its format implies.
#[derive(Debug, Default)]
pub struct StyleCatalog {
    map: HashMap<u32, CellStyle>,
}

impl StyleCatalog {
    pub(crate) fn empty() -> StyleCatalog {
        StyleCatalog::default()
    }

    /// Value class for a cell's XF index; `None` for styles that imply
    /// neither numeric nor temporal rendering.
    pub fn lookup(&self, xf: u32) -> Option<CellStyle> {
        self.map.get(&xf).copied()
    }

    /// Temporal flavor for a cell's XF index, if any.
    pub fn temporal(&self, xf: u32) -> Option<TemporalKind> {
        match self.lookup(xf) {
            Some(CellStyle::Temporal(kind)) => Some(kind),
            _ => None,
        }
    }

    /// Builds the catalog from `xl/styles.xml`. A workbook without one
    /// gets an empty catalog.
    pub(crate) fn load_xlsx<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<StyleCatalog, SheetError> {
        let mut reader = match zip.xml_reader("xl/styles.xml")? {
            Some(reader) => reader,
            None => return Ok(StyleCatalog::empty()),
        };

        let mut has_custom_formats = false;
        let mut custom_formats_context = false;
        let mut custom_formats = HashMap::<u32, String>::new();

        let mut has_format_indexes = false;
        let mut format_indexes_context = false;
        let mut format_indexes = Vec::<u32>::new();

        match_xml_events!(reader => {
            Event::Start(event) if !custom_formats_context && event.name() == TAG_CUSTOM_FORMATS => {
                has_custom_formats = true;
                custom_formats_context = true;
            }
            Event::End(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMATS => {
                custom_formats_context = false;
                if has_custom_formats && has_format_indexes {
                    break;
                }
            }
            Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
                let id = event.parse_attribute_value::<u32>("numFmtId")?;
                let format = event.get_attribute_value("formatCode")?;
                if let Some((id, format)) = id.zip(format) {
                    custom_formats.insert(id, first_section(&format).to_string());
                }
            }

            Event::Start(event) if !format_indexes_context && event.name() == TAG_FORMAT_INDEXES => {
                has_format_indexes = true;
                format_indexes_context = true;
            }
            Event::End(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEXES => {
                format_indexes_context = false;
                if has_custom_formats && has_format_indexes {
                    break;
                }
            }
            Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
                let id = event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0);
                format_indexes.push(id);
            }
        });

        Ok(StyleCatalog::build(custom_formats, format_indexes))
    }

    /// Builds the catalog from `xl/styles.bin` in one pass over its
    /// `BrtFmt` and `BrtXF` records. XFs whose parent is 0xFFFF are style
    /// XFs, not cell XFs, and are ignored.
    pub(crate) fn load_xlsb<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<StyleCatalog, SheetError> {
        let mut reader = match zip.biff_reader("xl/styles.bin")? {
            Some(reader) => reader,
            None => return Ok(StyleCatalog::empty()),
        };

        let mut custom_formats = HashMap::<u32, String>::new();
        let mut format_indexes = Vec::<u32>::new();

        while let Some(id) = reader.scan(&[BRT_FMT, BRT_XF])? {
            if id == BRT_FMT {
                if reader.size() < 6 {
                    continue;
                }
                let format_id = reader.get_u16(0) as u32;
                if let (Some(code), _) = reader.wide_str(2)? {
                    custom_formats.insert(format_id, first_section(&code).to_string());
                }
            } else if reader.size() >= 4 && reader.get_u16(0) != 0xFFFF {
                format_indexes.push(reader.get_u16(2) as u32);
            }
        }

        Ok(StyleCatalog::build(custom_formats, format_indexes))
    }

    fn build(custom_formats: HashMap<u32, String>, format_indexes: Vec<u32>) -> StyleCatalog {
        let classified: HashMap<u32, Option<CellStyle>> = custom_formats
            .into_iter()
            .map(|(id, code)| (id, classify_format(&code)))
            .collect();

        let mut map = HashMap::new();
        for (xf, format_id) in format_indexes.into_iter().enumerate() {
            // Workbook-defined codes win over the builtin id tables.
            let style = match classified.get(&format_id) {
                Some(style) => *style,
                None => builtin_temporal(format_id)
                    .map(CellStyle::Temporal)
                    .or_else(|| builtin_numeric(format_id).then_some(CellStyle::Numeric)),
            };
            if let Some(style) = style {
                map.insert(xf as u32, style);
            }
        }
        StyleCatalog { map }
    }
}

/// Only the first (positive-number) section of a format code matters.
fn first_section(code: &str) -> &str {
    code.split(';').next().unwrap_or(code)
}

/// Decides the value class a custom format code implies.
///
/// Elapsed-time brackets mark durations; otherwise an unescaped,
/// unquoted, unbracketed d/m/h/y/s makes the code temporal, with the
/// flavor taken from which of them occur.
pub(crate) fn classify_format(code: &str) -> Option<CellStyle> {
    if code == "0" || code.contains(".00") {
        return Some(CellStyle::Numeric);
    }

    let elapsed = Regex::new(r"(?i)\[hh?\](:mm(:ss(\.0*)?)?)?|\[mm?\](:ss(\.0*)?)?|\[ss?\](\.0*)?")
        .expect("Hardcode regex pattern");
    if elapsed.is_match(code) {
        return Some(CellStyle::Temporal(TemporalKind::Duration));
    }

    let mut is_escaped = false;
    let mut is_literal = false;
    let mut is_bracket = false;
    let mut is_date = false;
    let mut is_time = false;
    let mut is_month = false;
    for character in code.chars() {
        match character {
            _ if is_escaped => is_escaped = false,
            '_' | '\\' if !is_escaped => is_escaped = true,

            '"' if is_literal => is_literal = false,
            '"' if !is_literal && !is_bracket => is_literal = true,

            ']' if is_bracket => is_bracket = false,
            '[' if !is_bracket && !is_literal => is_bracket = true,
            _ if is_literal || is_bracket => (),

            'Y' | 'y' | 'D' | 'd' => is_date = true,
            'H' | 'h' | 'S' | 's' => is_time = true,
            'M' | 'm' => is_month = true,
            _ => (),
        }
    }

    if is_date && is_time {
        Some(CellStyle::Temporal(TemporalKind::DateTime))
    } else if is_date {
        Some(CellStyle::Temporal(TemporalKind::Date))
    } else if is_time {
        Some(CellStyle::Temporal(TemporalKind::Time))
    } else if is_month {
        Some(CellStyle::Temporal(TemporalKind::Date))
    } else {
        None
    }
}
