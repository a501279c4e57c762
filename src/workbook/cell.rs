use std::collections::HashSet;

/// Temporal flavor of a numeric cell style, decided by its number format.
///
/// Excel stores every temporal value as a plain serial-date float; which
/// flavor the float means is a property of the style, not the cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TemporalKind {
    DateTime,
    Date,
    Time,
    Duration,
}

impl TemporalKind {
    /// Widens an accumulated kind with another observation. Mixed kinds
    /// fall back to the general date-time flavor.
    pub(crate) fn merge(current: Option<TemporalKind>, other: TemporalKind) -> Option<TemporalKind> {
        match current {
            None => Some(other),
            Some(kind) if kind == other => Some(kind),
            Some(_) => Some(TemporalKind::DateTime),
        }
    }
}

/// Payload of a single extracted cell.
///
/// Each variant pairs one wire representation with what it still needs:
/// `Text` and `Number` are final, `Shared` awaits the string table,
/// `Rk` awaits expansion, `Serial` awaits the epoch conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    /// Inline UTF-8 text in its final form.
    Text(String),
    /// Index into the workbook shared-string table.
    Shared(u32),
    /// IEEE-754 double in its final form.
    Number(f64),
    /// Excel serial day count, tagged with its style's temporal flavor.
    Serial { value: f64, kind: TemporalKind },
    /// Raw RK-compressed number.
    Rk { raw: u32, temporal: Option<TemporalKind> },
    /// Single-byte boolean.
    Bool(bool),
}

/// A cell emitted by a worksheet extractor. Rows and columns are 0-based;
/// the row is relative to the extraction window (after `skip_rows`).
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
}

/// Cell texts Excel renders for formula errors, plus their Russian
/// localizations. Cells carrying any of these are suppressed.
pub(crate) const ERROR_STRINGS: [&str; 14] = [
    "#NULL!",
    "#DIV/0!",
    "#VALUE!",
    "#REF!",
    "#NAME?",
    "#NUM!",
    "#N/A",
    "#GETTING_DATA",
    "#ДЕЛ/0!",
    "#ЗНАЧ!",
    "#ССЫЛКА!",
    "#ИМЯ?",
    "#ЧИСЛО!",
    "#Н/Д",
];

/// Decides which cell texts count as null and are never emitted.
///
/// The builtin error strings are always included; callers may add literal
/// strings or an arbitrary predicate on top.
#[derive(Default)]
pub struct NullPredicate {
    extra: HashSet<String>,
    custom: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl NullPredicate {
    pub fn new() -> NullPredicate {
        NullPredicate::default()
    }

    /// Additional literal strings to treat as null.
    pub fn with_values<I>(values: I) -> NullPredicate
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        NullPredicate {
            extra: values.into_iter().map(Into::into).collect(),
            custom: None,
        }
    }

    /// An arbitrary predicate, checked after the builtin error strings.
    pub fn with_fn<F>(predicate: F) -> NullPredicate
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        NullPredicate {
            extra: HashSet::new(),
            custom: Some(Box::new(predicate)),
        }
    }

    pub fn is_null(&self, text: &str) -> bool {
        ERROR_STRINGS.contains(&text)
            || self.extra.contains(text)
            || self.custom.as_ref().map(|predicate| predicate(text)).unwrap_or(false)
    }
}

impl std::fmt::Debug for NullPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullPredicate")
            .field("extra", &self.extra)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Row accounting shared by the XLSX and XLSB extractors.
///
/// Rows are counted logically: the first `skip` counted rows are
/// discarded, then at most `take` counted rows are yielded (0 means no
/// limit). With `non_empty` set, a row that produced no surviving cell
/// advances nothing, so it consumes neither the skip nor the take budget.
#[derive(Debug)]
pub(crate) struct RowPolicy {
    skip: u32,
    take: u32,
    non_empty: bool,
    counted: u32,
    had_cells: bool,
}

impl RowPolicy {
    pub(crate) fn new(skip: u32, take: u32, non_empty: bool) -> RowPolicy {
        RowPolicy {
            skip,
            take,
            non_empty,
            counted: 0,
            had_cells: false,
        }
    }

    /// Output row index for cells of the current row, or `None` while the
    /// row falls outside the skip/take window.
    pub(crate) fn emit_row(&self) -> Option<u32> {
        if self.counted < self.skip {
            return None;
        }
        let row = self.counted - self.skip;
        if self.take != 0 && row >= self.take {
            return None;
        }
        Some(row)
    }

    /// Notes that the current row produced a cell (before windowing).
    pub(crate) fn mark_cell(&mut self) {
        self.had_cells = true;
    }

    /// Closes the current row. Returns true when the take limit is
    /// exhausted and iteration should stop.
    pub(crate) fn end_row(&mut self) -> bool {
        if self.had_cells || !self.non_empty {
            self.counted += 1;
        }
        self.had_cells = false;
        self.take != 0 && self.counted >= self.skip && self.counted - self.skip >= self.take
    }
}

/// Decodes the column letters of an `A1`-style reference to a 0-based
/// column index. Trailing row digits are ignored.
pub(crate) fn column_index(reference: &str) -> Option<u32> {
    let mut col = 0u32;
    let mut seen = false;
    for byte in reference.bytes() {
        if byte.is_ascii_uppercase() {
            col = col * 26 + (byte - 64) as u32;
            seen = true;
        } else if byte.is_ascii_lowercase() {
            col = col * 26 + (byte - 96) as u32;
            seen = true;
        } else {
            break;
        }
    }
    if seen {
        Some(col - 1)
    } else {
        None
    }
}
