//! End-to-end reads of XLSB workbooks assembled in memory with the
//! crate's own BIFF12 record encoder.

use pretty_assertions::assert_eq;
use sheetframe::biff12::Record;
use sheetframe::column::i8_to_rk;
use sheetframe::{
    read_table_from, Array, DataType, ReadOptions, SheetRef, Workbook, WorkbookFormat,
};
use std::io::Cursor;
use std::io::Write;

// Record ids, as the file format defines them.
const ROW_HDR: u16 = 0;
const CELL_RK: u16 = 2;
const CELL_BOOL: u16 = 4;
const CELL_REAL: u16 = 5;
const CELL_ST: u16 = 6;
const CELL_ISST: u16 = 7;
const FMLA_NUM: u16 = 9;
const SST_ITEM: u16 = 19;
const FMT: u16 = 44;
const XF: u16 = 47;
const END_BUNDLE_SHS: u16 = 144;
const END_SHEET_DATA: u16 = 146;
const BUNDLE_SH: u16 = 156;

fn wide_string(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut bytes = (units.len() as u32).to_le_bytes().to_vec();
    for unit in units {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

fn stream(records: &[Record]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for record in records {
        record.write_to(&mut bytes).expect("encode record");
    }
    bytes
}

fn row_hdr(row: u32) -> Record {
    let mut data = row.to_le_bytes().to_vec();
    data.extend_from_slice(&[0u8; 13]);
    Record::new(ROW_HDR, data)
}

/// Cell payload prefix: column, then the 3-byte style index plus flags.
fn cell_prefix(col: u32, style: u32) -> Vec<u8> {
    let mut data = col.to_le_bytes().to_vec();
    data.extend_from_slice(&style.to_le_bytes());
    data
}

fn rk_cell(col: u32, style: u32, raw: u32) -> Record {
    let mut data = cell_prefix(col, style);
    data.extend_from_slice(&raw.to_le_bytes());
    Record::new(CELL_RK, data)
}

fn real_cell(col: u32, style: u32, value: f64) -> Record {
    let mut data = cell_prefix(col, style);
    data.extend_from_slice(&value.to_le_bytes());
    Record::new(CELL_REAL, data)
}

fn formula_num_cell(col: u32, style: u32, value: f64) -> Record {
    let mut data = cell_prefix(col, style);
    data.extend_from_slice(&value.to_le_bytes());
    Record::new(FMLA_NUM, data)
}

fn bool_cell(col: u32, value: bool) -> Record {
    let mut data = cell_prefix(col, 0);
    data.push(value as u8);
    Record::new(CELL_BOOL, data)
}

fn inline_string_cell(col: u32, text: &str) -> Record {
    let mut data = cell_prefix(col, 0);
    data.extend_from_slice(&wide_string(text));
    Record::new(CELL_ST, data)
}

fn shared_string_cell(col: u32, index: u32) -> Record {
    let mut data = cell_prefix(col, 0);
    data.extend_from_slice(&index.to_le_bytes());
    Record::new(CELL_ISST, data)
}

fn sst_item(text: &str) -> Record {
    let mut data = vec![0u8];
    data.extend_from_slice(&wide_string(text));
    Record::new(SST_ITEM, data)
}

fn fmt_record(id: u16, code: &str) -> Record {
    let mut data = id.to_le_bytes().to_vec();
    data.extend_from_slice(&wide_string(code));
    Record::new(FMT, data)
}

fn xf_record(parent: u16, fmt: u16) -> Record {
    let mut data = parent.to_le_bytes().to_vec();
    data.extend_from_slice(&fmt.to_le_bytes());
    data.extend_from_slice(&[0u8; 4]);
    Record::new(XF, data)
}

fn workbook_bin(sheets: &[(&str, &str)]) -> Vec<u8> {
    let mut records = Vec::new();
    for (index, (rel_id, name)) in sheets.iter().enumerate() {
        let mut data = 0u32.to_le_bytes().to_vec();
        data.extend_from_slice(&(index as u32 + 1).to_le_bytes());
        data.extend_from_slice(&wide_string(rel_id));
        data.extend_from_slice(&wide_string(name));
        records.push(Record::new(BUNDLE_SH, data));
    }
    records.push(Record::new(END_BUNDLE_SHS, Vec::new()));
    stream(&records)
}

fn rels(sheets: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (index, (rel_id, _)) in sheets.iter().enumerate() {
        body.push_str(&format!(
            r#"<Relationship Id="{rel_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.bin"/>"#,
            index + 1
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#
    )
}

struct Builder {
    sheets: Vec<(&'static str, &'static str, Vec<Record>)>,
    shared: Vec<&'static str>,
    styles: Option<Vec<Record>>,
}

impl Builder {
    fn new() -> Builder {
        Builder { sheets: Vec::new(), shared: Vec::new(), styles: None }
    }

    fn sheet(mut self, name: &'static str, records: Vec<Record>) -> Builder {
        let rel_id: &'static str = ["rId1", "rId2", "rId3"][self.sheets.len()];
        self.sheets.push((rel_id, name, records));
        self
    }

    fn shared(mut self, strings: &[&'static str]) -> Builder {
        self.shared = strings.to_vec();
        self
    }

    fn styles(mut self, records: Vec<Record>) -> Builder {
        self.styles = Some(records);
        self
    }

    fn build(self) -> Cursor<Vec<u8>> {
        let names: Vec<(&str, &str)> = self.sheets.iter().map(|(rel, name, _)| (*rel, *name)).collect();
        let workbook = workbook_bin(&names);
        let rels = rels(&names);

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        let mut put = |name: String, data: &[u8]| {
            writer.start_file(name, options).expect("start member");
            writer.write_all(data).expect("write member");
        };
        put("xl/workbook.bin".to_string(), &workbook);
        put("xl/_rels/workbook.bin.rels".to_string(), rels.as_bytes());
        for (index, (_, _, records)) in self.sheets.iter().enumerate() {
            put(format!("xl/worksheets/sheet{}.bin", index + 1), &stream(records));
        }
        if !self.shared.is_empty() {
            let items: Vec<Record> = self.shared.iter().map(|text| sst_item(text)).collect();
            put("xl/sharedStrings.bin".to_string(), &stream(&items));
        }
        if let Some(styles) = &self.styles {
            put("xl/styles.bin".to_string(), &stream(styles));
        }
        writer.finish().expect("finish archive")
    }
}

#[test]
fn unstyled_row_infers_basic_types() {
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(42)),
                real_cell(1, 0, 3.14),
                inline_string_cell(2, "hello"),
                bool_cell(3, true),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");

    assert_eq!(table.len(), 1);
    assert_eq!(table.column(0).unwrap().array, Array::Int64(vec![Some(42)]));
    assert_eq!(table.column(1).unwrap().array, Array::Float64(vec![Some(3.14)]));
    assert_eq!(
        table.column(2).unwrap().array,
        Array::Utf8(vec![Some("hello".to_string())])
    );
    assert_eq!(table.column(3).unwrap().array, Array::Float64(vec![Some(1.0)]));
}

#[test]
fn shared_strings_dereference_and_suppress_nulls() {
    let zip = Builder::new()
        .shared(&["kept", "#N/A"])
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                shared_string_cell(0, 0),
                shared_string_cell(1, 1),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(
        table.column(0).unwrap().array,
        Array::Utf8(vec![Some("kept".to_string())])
    );
    assert!(table.column(1).is_none());
}

#[test]
fn builtin_date_style_tags_serials() {
    // XF 0 is plain, XF 1 references builtin format 14 (a date).
    let styles = vec![xf_record(0, 0), xf_record(0, 14)];
    let zip = Builder::new()
        .styles(styles)
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                real_cell(0, 1, 45_000.0),
                row_hdr(1),
                formula_num_cell(0, 1, 45_001.0),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");

    let column = table.column(0).unwrap();
    assert_eq!(
        column.array,
        Array::TimestampMs(vec![Some(1_678_838_400_000), Some(1_678_924_800_000)])
    );
    assert_eq!(column.data_type, DataType::Date);
}

#[test]
fn custom_format_tags_rk_cells_as_temporal() {
    let styles = vec![
        fmt_record(164, "yyyy-mm-dd hh:mm"),
        xf_record(0, 0),
        xf_record(0, 164),
    ];
    let zip = Builder::new()
        .styles(styles)
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 1, i8_to_rk(45_000)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");

    let column = table.column(0).unwrap();
    assert_eq!(column.array, Array::TimestampMs(vec![Some(1_678_838_400_000)]));
    assert_eq!(column.data_type, DataType::Timestamp);
}

#[test]
fn style_xfs_with_parent_ffff_are_ignored() {
    // The first record is a cell-style XF and must not shift the catalog.
    let styles = vec![xf_record(0xFFFF, 14), xf_record(0, 0), xf_record(0, 14)];
    let zip = Builder::new()
        .styles(styles)
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                real_cell(0, 0, 45_000.0),
                real_cell(1, 1, 45_000.0),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(table.column(0).unwrap().array, Array::Int64(vec![Some(45_000)]));
    assert_eq!(
        table.column(1).unwrap().array,
        Array::TimestampMs(vec![Some(1_678_838_400_000)])
    );
}

#[test]
fn rk_cent_values_expand() {
    use sheetframe::column::f8_to_rk;
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, f8_to_rk(123.45)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(table.column(0).unwrap().array, Array::Float64(vec![Some(123.45)]));
}

#[test]
fn empty_row_records_become_null_gaps() {
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(1)),
                row_hdr(1),
                row_hdr(2),
                rk_cell(0, 0, i8_to_rk(3)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(
        table.column(0).unwrap().array,
        Array::Int64(vec![Some(1), None, Some(3)])
    );
}

#[test]
fn non_empty_mode_collapses_blank_rows() {
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(1)),
                row_hdr(1),
                row_hdr(2),
                rk_cell(0, 0, i8_to_rk(3)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(
        zip,
        ReadOptions {
            take_rows_non_empty: true,
            ..ReadOptions::default()
        },
    )
    .expect("read");
    assert_eq!(
        table.column(0).unwrap().array,
        Array::Int64(vec![Some(1), Some(3)])
    );
}

#[test]
fn skip_and_take_rows_window() {
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(1)),
                row_hdr(1),
                rk_cell(0, 0, i8_to_rk(2)),
                row_hdr(2),
                rk_cell(0, 0, i8_to_rk(3)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();
    let table = read_table_from(
        zip,
        ReadOptions {
            skip_rows: 1,
            take_rows: 1,
            ..ReadOptions::default()
        },
    )
    .expect("read");
    assert_eq!(table.len(), 1);
    assert_eq!(table.column(0).unwrap().array, Array::Int64(vec![Some(2)]));
}

#[test]
fn records_after_end_sheet_data_are_ignored() {
    let zip = Builder::new()
        .sheet(
            "Sheet1",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(1)),
                Record::new(END_SHEET_DATA, Vec::new()),
                row_hdr(1),
                rk_cell(0, 0, i8_to_rk(9)),
            ],
        )
        .build();
    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(table.len(), 1);
    assert_eq!(table.column(0).unwrap().array, Array::Int64(vec![Some(1)]));
}

#[test]
fn truncated_sheet_stream_ends_quietly() {
    let mut records = stream(&[row_hdr(0), rk_cell(0, 0, i8_to_rk(7))]);
    // Start another record and cut it short.
    records.extend_from_slice(&[CELL_RK as u8, 12]);
    records.extend_from_slice(&1u32.to_le_bytes());

    let names = [("rId1", "Sheet1")];
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("xl/workbook.bin".to_string(), options).expect("start");
    writer.write_all(&workbook_bin(&names)).expect("write");
    writer.start_file("xl/_rels/workbook.bin.rels".to_string(), options).expect("start");
    writer.write_all(rels(&names).as_bytes()).expect("write");
    writer.start_file("xl/worksheets/sheet1.bin".to_string(), options).expect("start");
    writer.write_all(&records).expect("write");
    let zip = writer.finish().expect("finish");

    let table = read_table_from(zip, ReadOptions::default()).expect("read");
    assert_eq!(table.column(0).unwrap().array, Array::Int64(vec![Some(7)]));
}

#[test]
fn multiple_sheets_resolve_by_name_and_index() {
    let zip = Builder::new()
        .sheet(
            "First",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(1)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .sheet(
            "Second",
            vec![
                row_hdr(0),
                rk_cell(0, 0, i8_to_rk(2)),
                Record::new(END_SHEET_DATA, Vec::new()),
            ],
        )
        .build();

    let mut workbook = Workbook::from_reader(zip).expect("open");
    assert_eq!(workbook.format(), WorkbookFormat::Xlsb);
    assert_eq!(workbook.sheet_names(), vec!["First", "Second"]);

    let cells: Vec<_> = workbook
        .sheet_cells(&SheetRef::Name("Second".to_string()), Default::default())
        .expect("cells")
        .collect::<Result<_, _>>()
        .expect("no errors");
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].row, 0);
    assert_eq!(cells[0].col, 0);
}
