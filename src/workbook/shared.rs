//! Workbook-global shared-string tables.
//!
//! Cells reference shared strings by ordinal. Entries whose text matches
//! the null predicate (or is empty) are stored as nulls and their indices
//! recorded, so extractors can suppress cells that point at them.

use crate::error::SheetError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::workbook::cell::NullPredicate;
use crate::workbook::xlsb::BRT_SST_ITEM;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashSet;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");

/// Read-once, read-many shared-string arena.
#[derive(Debug, Default)]
pub struct SharedStrings {
    strings: Vec<Option<String>>,
    nulls: HashSet<u32>,
}

impl SharedStrings {
    pub(crate) fn empty() -> SharedStrings {
        SharedStrings::default()
    }

    /// Dereferences an index, `None` for null entries or out-of-range
    /// indices.
    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).and_then(|entry| entry.as_deref())
    }

    /// True when the index points at a null entry (or at nothing at all).
    pub fn is_null(&self, index: u32) -> bool {
        self.nulls.contains(&index) || index as usize >= self.strings.len()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    fn push(&mut self, text: Option<String>) {
        if text.is_none() {
            self.nulls.insert(self.strings.len() as u32);
        }
        self.strings.push(text);
    }

    /// Loads `xl/sharedStrings.xml`; a workbook without one gets an empty
    /// table.
    pub(crate) fn load_xlsx<RS: Read + Seek>(
        zip: &mut ZipArchive<RS>,
        null: &NullPredicate,
    ) -> Result<SharedStrings, SheetError> {
        let mut shared = SharedStrings::empty();
        let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared),
        };

        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                let text = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                let text = text.trim();
                if text.is_empty() || null.is_null(text) {
                    shared.push(None);
                } else {
                    shared.push(Some(text.to_string()));
                }
            }
        });
        Ok(shared)
    }

    /// Loads `xl/sharedStrings.bin` by scanning its `BrtSSTItem` records.
    pub(crate) fn load_xlsb<RS: Read + Seek>(
        zip: &mut ZipArchive<RS>,
        null: &NullPredicate,
    ) -> Result<SharedStrings, SheetError> {
        let mut shared = SharedStrings::empty();
        let mut reader = match zip.biff_reader("xl/sharedStrings.bin")? {
            Some(reader) => reader,
            None => return Ok(shared),
        };

        while reader.scan(&[BRT_SST_ITEM])?.is_some() {
            // Payload: flags byte, then the XLWideString text.
            match reader.cell_str(1)? {
                Some(text) if !null.is_null(&text) => {
                    let text = text.into_owned();
                    shared.push(Some(text));
                }
                Some(_) => shared.push(None),
                None => {
                    log::warn!("undecodable shared string {}, storing null", shared.len());
                    shared.push(None);
                }
            }
        }
        Ok(shared)
    }
}

/// Collects the character data of a string element, skipping phonetic
/// runs and resolving entity references. With `is_text_content` the
/// element's own character data counts; otherwise only nested `<t>`
/// elements do.
pub(crate) fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName<'_>,
    is_text_content: bool,
) -> Result<String, SheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
