//! Homogeneous runs of cell payloads within one column.
//!
//! Each chunk keeps its values in the cheapest form the extractor could
//! produce; `prepare` rewrites a chunk into its final in-memory form, and
//! `concatenate` resolves a common type across chunks and emits one typed
//! array.

use crate::column::array::Array;
use crate::column::casts::f8_is_i8;
use crate::column::casts::f8_to_ms_win;
use crate::column::casts::ms_to_string;
use crate::column::casts::parse_temporal;
use crate::column::casts::rk_to_f8;
use crate::column::ConcatOptions;
use crate::workbook::shared::SharedStrings;

/// A homogeneous run within a column. `Null` carries only its length.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Chunk {
    /// Run of absent cells.
    Null(usize),
    /// Owned UTF-8 strings in final form.
    Text(Vec<String>),
    /// Indices into the workbook shared-string table.
    Shared(Vec<u32>),
    /// Doubles in final form (also expanded RK numbers and booleans).
    Float(Vec<f64>),
    /// Excel serial day counts awaiting the epoch conversion.
    Serial(Vec<f64>),
    /// Unix milliseconds, the final temporal form.
    Millis(Vec<i64>),
    /// Raw RK numbers, optionally style-tagged as temporal.
    Rk { raw: Vec<u32>, temporal: bool },
    /// Raw booleans.
    Bool(Vec<bool>),
}

impl Chunk {
    pub(crate) fn size(&self) -> usize {
        match self {
            Chunk::Null(length) => *length,
            Chunk::Text(data) => data.len(),
            Chunk::Shared(data) => data.len(),
            Chunk::Float(data) => data.len(),
            Chunk::Serial(data) => data.len(),
            Chunk::Millis(data) => data.len(),
            Chunk::Rk { raw, .. } => raw.len(),
            Chunk::Bool(data) => data.len(),
        }
    }

    pub(crate) fn is_string(&self) -> bool {
        matches!(self, Chunk::Text(_) | Chunk::Shared(_))
    }

    pub(crate) fn is_temporal(&self) -> bool {
        matches!(self, Chunk::Serial(_) | Chunk::Millis(_) | Chunk::Rk { temporal: true, .. })
    }

    pub(crate) fn is_numeric(&self) -> bool {
        matches!(self, Chunk::Float(_) | Chunk::Bool(_) | Chunk::Rk { temporal: false, .. })
    }

    /// Rewrites the chunk into its final in-memory form: shared indices
    /// become owned text, RK numbers expand, serial dates become unix
    /// milliseconds, booleans widen to doubles. Idempotent.
    pub(crate) fn prepare(self, shared: &SharedStrings) -> Chunk {
        match self {
            Chunk::Shared(data) => Chunk::Text(
                data.into_iter()
                    .map(|index| shared.get(index).unwrap_or_default().to_string())
                    .collect(),
            ),
            Chunk::Serial(data) => Chunk::Millis(data.into_iter().map(f8_to_ms_win).collect()),
            Chunk::Rk { raw, temporal: false } => {
                Chunk::Float(raw.into_iter().map(rk_to_f8).collect())
            }
            Chunk::Rk { raw, temporal: true } => {
                Chunk::Millis(raw.into_iter().map(|value| f8_to_ms_win(rk_to_f8(value))).collect())
            }
            Chunk::Bool(data) => Chunk::Float(data.into_iter().map(|value| value as u8 as f64).collect()),
            other => other,
        }
    }

    /// Reinterprets a numeric chunk as temporal (floats become serial day
    /// counts). String and already-temporal chunks pass through.
    fn into_temporal(self) -> Chunk {
        match self {
            Chunk::Float(data) => Chunk::Serial(data),
            Chunk::Bool(data) => {
                Chunk::Serial(data.into_iter().map(|value| value as u8 as f64).collect())
            }
            Chunk::Rk { raw, .. } => Chunk::Rk { raw, temporal: true },
            other => other,
        }
    }

    /// Sub-chunk covering `range` (clamped to the chunk's size).
    pub(crate) fn take(self, range: std::ops::Range<usize>) -> Chunk {
        let size = self.size();
        let start = range.start.min(size);
        let end = range.end.min(size).max(start);
        fn slice<T>(mut data: Vec<T>, start: usize, end: usize) -> Vec<T> {
            data.truncate(end);
            data.drain(..start);
            data
        }
        match self {
            Chunk::Null(_) => Chunk::Null(end - start),
            Chunk::Text(data) => Chunk::Text(slice(data, start, end)),
            Chunk::Shared(data) => Chunk::Shared(slice(data, start, end)),
            Chunk::Float(data) => Chunk::Float(slice(data, start, end)),
            Chunk::Serial(data) => Chunk::Serial(slice(data, start, end)),
            Chunk::Millis(data) => Chunk::Millis(slice(data, start, end)),
            Chunk::Rk { raw, temporal } => Chunk::Rk { raw: slice(raw, start, end), temporal },
            Chunk::Bool(data) => Chunk::Bool(slice(data, start, end)),
        }
    }

    /// Keeps the elements whose mask bit is set. The mask must not be
    /// longer than the chunk.
    pub(crate) fn take_mask(self, mask: &[bool]) -> Chunk {
        fn filter<T>(data: Vec<T>, mask: &[bool]) -> Vec<T> {
            data.into_iter()
                .zip(mask)
                .filter_map(|(value, &keep)| keep.then_some(value))
                .collect()
        }
        match self {
            Chunk::Null(_) => Chunk::Null(mask.iter().filter(|&&keep| keep).count()),
            Chunk::Text(data) => Chunk::Text(filter(data, mask)),
            Chunk::Shared(data) => Chunk::Shared(filter(data, mask)),
            Chunk::Float(data) => Chunk::Float(filter(data, mask)),
            Chunk::Serial(data) => Chunk::Serial(filter(data, mask)),
            Chunk::Millis(data) => Chunk::Millis(filter(data, mask)),
            Chunk::Rk { raw, temporal } => Chunk::Rk { raw: filter(raw, mask), temporal },
            Chunk::Bool(data) => Chunk::Bool(filter(data, mask)),
        }
    }
}

/// Applies offset/length/mask slicing to a chunk sequence.
///
/// The first surviving chunk is top-stripped so exactly `offset` elements
/// are dropped; with a `length`, the last chunk is bottom-stripped so
/// exactly `length` elements remain, padding the tail with a null chunk
/// when the data runs short. A boolean mask replaces `length` with its
/// population count and keeps only the flagged elements.
pub(crate) fn take_over(
    chunks: Vec<Chunk>,
    mut offset: usize,
    length: usize,
    mask: Option<&[bool]>,
) -> Vec<Chunk> {
    let mut result = Vec::new();
    let mut cum_len = 0usize;
    let mut target = length;

    if let Some(mask) = mask {
        target = mask.iter().filter(|&&keep| keep).count();
        if target == 0 {
            return result;
        }
        let mut mask_off = 0usize;
        for mut chunk in chunks {
            if offset > 0 {
                if offset >= chunk.size() {
                    offset -= chunk.size();
                    continue;
                }
                let size = chunk.size();
                chunk = chunk.take(offset..size);
                offset = 0;
            }
            let begin = mask_off.min(mask.len());
            let end = (mask_off + chunk.size()).min(mask.len());
            mask_off += chunk.size();
            let segment = &mask[begin..end];
            if segment.iter().all(|&keep| !keep) {
                continue;
            }
            let taken = chunk.take(0..segment.len()).take_mask(segment);
            if taken.size() > 0 {
                cum_len += taken.size();
                result.push(taken);
            }
        }
    } else {
        for mut chunk in chunks {
            if offset > 0 {
                if offset >= chunk.size() {
                    offset -= chunk.size();
                    continue;
                }
                let size = chunk.size();
                chunk = chunk.take(offset..size);
                offset = 0;
            }
            cum_len += chunk.size();
            if target != 0 && cum_len > target {
                let keep = chunk.size() + target - cum_len;
                chunk = chunk.take(0..keep);
            }
            if chunk.size() > 0 {
                result.push(chunk);
            }
            if target != 0 && cum_len >= target {
                break;
            }
        }
    }

    if target != 0 && cum_len < target {
        result.push(Chunk::Null(target - cum_len));
    }
    result
}

/// Concatenates a chunk sequence into one typed array.
///
/// The common type follows the chunk categories present and the conflict
/// settings: temporal wins when conversions succeed, numeric columns that
/// survive the integer-feasibility check come out as int64, and any
/// unresolved mix downgrades the whole column to strings.
pub(crate) fn concatenate(
    chunks: Vec<Chunk>,
    offset: usize,
    length: usize,
    mask: Option<&[bool]>,
    shared: &SharedStrings,
    options: &ConcatOptions,
) -> Array {
    let mut chunks = if offset > 0 || length > 0 || mask.is_some() {
        take_over(chunks, offset, length, mask)
    } else {
        chunks
    };

    let has_temporal = chunks.iter().any(Chunk::is_temporal);
    let has_numeric = chunks.iter().any(Chunk::is_numeric);
    let has_string = chunks.iter().any(Chunk::is_string);
    let has_bool = chunks.iter().any(|chunk| matches!(chunk, Chunk::Bool(_)));

    let mut utf8_fallback = false;

    if has_temporal {
        if options.to_datetime {
            for slot in chunks.iter_mut() {
                let chunk = std::mem::replace(slot, Chunk::Null(0));
                *slot = if chunk.is_numeric() {
                    chunk.into_temporal()
                } else if chunk.is_string() {
                    match strings_to_temporal(chunk.prepare(shared), options) {
                        Ok(converted) => converted,
                        Err(original) => {
                            utf8_fallback = true;
                            original
                        }
                    }
                } else {
                    chunk
                };
            }
        } else if has_numeric || has_string {
            utf8_fallback = true;
        }
    } else if has_numeric && has_string {
        if options.to_numerics {
            for slot in chunks.iter_mut() {
                if !slot.is_string() {
                    continue;
                }
                let chunk = std::mem::replace(slot, Chunk::Null(0));
                match strings_to_numeric(chunk.prepare(shared)) {
                    Ok(converted) => *slot = converted,
                    Err(original) => {
                        *slot = original;
                        utf8_fallback = true;
                        break;
                    }
                }
            }
        } else {
            utf8_fallback = true;
        }
    }

    if utf8_fallback {
        log::debug!("column downgraded to strings after failed conflict resolution");
        let mut values = Vec::new();
        for chunk in chunks {
            push_strings(chunk.prepare(shared), &mut values);
        }
        return Array::Utf8(values);
    }

    if has_temporal {
        let mut values = Vec::new();
        for chunk in chunks {
            match chunk.prepare(shared) {
                Chunk::Null(length) => values.extend(std::iter::repeat_n(None, length)),
                Chunk::Millis(data) => values.extend(data.into_iter().map(Some)),
                // Only nulls and temporal chunks remain on this path.
                other => values.extend(std::iter::repeat_n(None, other.size())),
            }
        }
        return Array::TimestampMs(values);
    }

    if has_numeric {
        let chunks: Vec<Chunk> = chunks.into_iter().map(|chunk| chunk.prepare(shared)).collect();
        let is_integer = !has_bool
            && chunks.iter().all(|chunk| match chunk {
                Chunk::Float(data) => f8_is_i8(data, options.float_precision),
                _ => true,
            });
        if is_integer {
            let mut values = Vec::new();
            for chunk in chunks {
                match chunk {
                    Chunk::Null(length) => values.extend(std::iter::repeat_n(None, length)),
                    Chunk::Float(data) => values.extend(data.into_iter().map(|value| Some(value as i64))),
                    other => values.extend(std::iter::repeat_n(None, other.size())),
                }
            }
            return Array::Int64(values);
        }
        let mut values = Vec::new();
        for chunk in chunks {
            match chunk {
                Chunk::Null(length) => values.extend(std::iter::repeat_n(None, length)),
                Chunk::Float(data) => values.extend(data.into_iter().map(Some)),
                other => values.extend(std::iter::repeat_n(None, other.size())),
            }
        }
        return Array::Float64(values);
    }

    // Strings only, or nothing but nulls.
    let mut values = Vec::new();
    for chunk in chunks {
        push_strings(chunk.prepare(shared), &mut values);
    }
    Array::Utf8(values)
}

/// Attempts the strptime chain on a prepared text chunk; with
/// `to_numerics` set, strings that fail strptime are retried as floats
/// and read as serial dates. Returns the original chunk on failure.
fn strings_to_temporal(chunk: Chunk, options: &ConcatOptions) -> Result<Chunk, Chunk> {
    let texts = match chunk {
        Chunk::Text(texts) => texts,
        other => return Ok(other),
    };
    let parsed: Option<Vec<i64>> = texts
        .iter()
        .map(|text| parse_temporal(text, &options.datetime_formats))
        .collect();
    if let Some(millis) = parsed {
        return Ok(Chunk::Millis(millis));
    }
    if options.to_numerics {
        let numbers: Option<Vec<f64>> = texts.iter().map(|text| text.trim().parse().ok()).collect();
        if let Some(serials) = numbers {
            return Ok(Chunk::Serial(serials));
        }
    }
    Err(Chunk::Text(texts))
}

/// Attempts to parse a prepared text chunk as floats. Returns the
/// original chunk on failure.
fn strings_to_numeric(chunk: Chunk) -> Result<Chunk, Chunk> {
    let texts = match chunk {
        Chunk::Text(texts) => texts,
        other => return Ok(other),
    };
    let numbers: Option<Vec<f64>> = texts.iter().map(|text| text.trim().parse().ok()).collect();
    match numbers {
        Some(values) => Ok(Chunk::Float(values)),
        None => Err(Chunk::Text(texts)),
    }
}

/// Renders a prepared chunk as strings, the universal fallback type.
fn push_strings(chunk: Chunk, values: &mut Vec<Option<String>>) {
    match chunk {
        Chunk::Null(length) => values.extend(std::iter::repeat_n(None, length)),
        Chunk::Text(data) => values.extend(data.into_iter().map(Some)),
        Chunk::Float(data) => values.extend(data.into_iter().map(|value| Some(value.to_string()))),
        Chunk::Millis(data) => values.extend(data.into_iter().map(|value| Some(ms_to_string(value)))),
        // prepare() leaves no other variants behind
        other => values.extend(std::iter::repeat_n(None, other.size())),
    }
}
