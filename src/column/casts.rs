//! Scalar conversions behind the column engine: the RK number codec, the
//! Excel serial-date ↔ unix-millisecond mapping, the integer-feasibility
//! predicate and the multi-format string-to-timestamp parser.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;

pub(crate) const MS_PER_DAY: i64 = 86_400_000;

/// Expands a 4-byte RK number to a double.
///
/// Bit 1 selects a 30-bit signed integer body (shifted) versus the high
/// half of an IEEE-754 double; bit 0 divides the result by 100.
pub fn rk_to_f8(raw: u32) -> f64 {
    let is_integer = raw & 0b10 != 0;
    let is_cents = raw & 0b01 != 0;
    let body = raw & 0xFFFF_FFFC;
    let value = if is_integer {
        ((body as i32) >> 2) as f64
    } else {
        f64::from_bits((body as u64) << 32)
    };
    if is_cents {
        value / 100.0
    } else {
        value
    }
}

/// Compresses a double back into RK form. Values that are integers (or
/// integers of hundredths) use the integer body; everything else keeps
/// the high half of its bit pattern and loses the low 32 bits.
pub fn f8_to_rk(value: f64) -> u32 {
    let cents = (value * 100.0).round() / 100.0;
    if value == cents {
        if value.trunc() == cents {
            (((value.round() as i32) << 2) as u32) | 2
        } else {
            ((((value * 100.0).round() as i32) << 2) as u32) | 3
        }
    } else {
        (value.to_bits() >> 32) as u32 & 0xFFFF_FFFC
    }
}

/// Compresses an integer into RK form (30-bit signed body).
pub fn i8_to_rk(value: i64) -> u32 {
    (((value as i32) << 2) as u32) | 2
}

/// Excel serial date (days since 1900, fractional day is time of day) to
/// unix milliseconds.
///
/// Excel's 1900 date system counts the nonexistent 1900-02-29, so serials
/// at or past 60 sit one day further from the epoch than earlier ones.
/// Serials in `[0, 1)` come out as a same-day time of day in milliseconds.
pub fn f8_to_ms_win(value: f64) -> i64 {
    let shift = if value >= 1.0 {
        if value < 60.0 {
            25_568.0
        } else {
            25_569.0
        }
    } else {
        0.0
    };
    ((value - shift) * 86_400_000.0).round() as i64
}

/// Unix milliseconds back to an Excel serial date; inverse of
/// [`f8_to_ms_win`] for every timestamp at or after 1900-03-01.
pub fn ms_to_f8_win(ms: i64) -> f64 {
    if (0..MS_PER_DAY).contains(&ms) {
        ms as f64 / 86_400_000.0
    } else if ms >= -2_203_891_200_000 {
        ms as f64 / 86_400_000.0 + 25_569.0
    } else {
        ms as f64 / 86_400_000.0 + 25_568.0
    }
}

/// True when rounding every value to `precision` decimals agrees with
/// truncation, i.e. the floats are really integers in disguise.
pub fn f8_is_i8(values: &[f64], precision: i32) -> bool {
    let scale = 10f64.powi(precision);
    values.iter().all(|&value| value.trunc() == (value * scale).round() / scale)
}

/// Any timestamp with a time-of-day part?
pub(crate) fn dt_has_t(values: &[Option<i64>]) -> bool {
    values.iter().flatten().any(|&value| value % MS_PER_DAY != 0)
}

/// Any timestamp with a date part?
pub(crate) fn dt_has_d(values: &[Option<i64>]) -> bool {
    values.iter().flatten().any(|&value| value > MS_PER_DAY)
}

const DATE_FORMATS: [&str; 7] = [
    // ISO-8601
    "%Y-%m-%d",
    // Common European formats
    "%d/%m/%Y",
    "%d/%m/%y",
    "%d.%m.%Y",
    "%d.%m.%y",
    "%d-%m-%Y",
    "%d-%m-%y",
];

const TIME_FORMATS: [&str; 5] = ["%T", "%R", "%r", "%I:%M %p", "%T%.f"];

/// The default strptime patterns: every date format crossed with every
/// time format (space- and T-separated), the bare dates, then the bare
/// times.
pub fn default_datetime_formats() -> Vec<String> {
    let mut formats = Vec::new();
    for date in DATE_FORMATS {
        for time in TIME_FORMATS {
            formats.push(format!("{date} {time}"));
            formats.push(format!("{date}T{time}"));
        }
        formats.push(date.to_string());
    }
    formats.extend(TIME_FORMATS.iter().map(|format| format.to_string()));
    formats
}

/// Parses one cell text against the format list, first as a date-time,
/// then as a bare date (midnight), then as a bare time (ms of day).
/// Negative results fold into the positive time-of-day range, keeping the
/// same convention as the serial-date conversion for values below one day.
pub(crate) fn parse_temporal(text: &str, formats: &[String]) -> Option<i64> {
    for format in formats {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(fold_negative(datetime.and_utc().timestamp_millis()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            let midnight = date.and_hms_opt(0, 0, 0).expect("Append 00:00:00");
            return Some(fold_negative(midnight.and_utc().timestamp_millis()));
        }
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            let ms = time.num_seconds_from_midnight() as i64 * 1_000
                + (time.nanosecond() / 1_000_000) as i64;
            return Some(ms);
        }
    }
    None
}

fn fold_negative(ms: i64) -> i64 {
    if ms < 0 {
        ms.rem_euclid(MS_PER_DAY)
    } else {
        ms
    }
}

/// Renders a unix-millisecond timestamp the way the column engine casts
/// temporal data to text.
pub(crate) fn ms_to_string(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(datetime) if ms % 1_000 == 0 => datetime.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
        Some(datetime) => datetime.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rk_integer_and_cents() {
        assert_eq!(rk_to_f8(i8_to_rk(42)), 42.0);
        assert_eq!(rk_to_f8(i8_to_rk(-5)), -5.0);
        assert_eq!(rk_to_f8(f8_to_rk(3.14)), 3.14); // cent-flagged
        assert_eq!(rk_to_f8(f8_to_rk(1.5)), 1.5);
    }

    #[test]
    fn rk_roundtrip_lossless_values() {
        for value in [0.0, 1.0, -1.0, 536_870_911.0, -536_870_912.0, 0.01, -0.25, 123.45] {
            let raw = f8_to_rk(value);
            assert_eq!(f8_to_rk(rk_to_f8(raw)), raw, "value {value}");
        }
    }

    #[test]
    fn rk_float_body() {
        // 2.5 has a zero low word, so the float body is exact.
        let raw = f8_to_rk(2.5);
        assert_eq!(raw & 0b11, 0);
        assert_eq!(rk_to_f8(raw), 2.5);
    }

    #[test]
    fn serial_date_epoch_shift() {
        // 2023-03-15 is serial 45000 in the 1900 system.
        let expected = NaiveDate::from_ymd_opt(2023, 3, 15)
            .expect("NaiveDate literal")
            .and_hms_opt(0, 0, 0)
            .expect("midnight")
            .and_utc()
            .timestamp_millis();
        assert_eq!(f8_to_ms_win(45_000.0), expected);
    }

    #[test]
    fn serial_sixty_is_the_fictitious_leap_day() {
        // Serial 60 is Excel's 1900-02-29; converted on the real calendar
        // it lands on 1900-02-28, one day away from a quirk-less mapping.
        let real = NaiveDate::from_ymd_opt(1900, 2, 28)
            .expect("NaiveDate literal")
            .and_hms_opt(0, 0, 0)
            .expect("midnight")
            .and_utc()
            .timestamp_millis();
        assert_eq!(f8_to_ms_win(60.0), real);
        let naive = ((60.0 - 25_568.0) * 86_400_000.0) as i64;
        assert_eq!(naive - f8_to_ms_win(60.0), MS_PER_DAY);
    }

    #[test]
    fn serial_fraction_is_time_of_day() {
        assert_eq!(f8_to_ms_win(0.5), MS_PER_DAY / 2);
        assert_eq!(f8_to_ms_win(0.0), 0);
    }

    #[test]
    fn ms_serial_roundtrip() {
        for ms in [
            -2_203_891_200_000, // 1900-03-01
            -1,
            0,
            1_000,
            MS_PER_DAY - 1,
            MS_PER_DAY,
            1_678_838_400_000, // 2023-03-15
            4_102_444_800_000, // 2100-01-01
        ] {
            assert_eq!(f8_to_ms_win(ms_to_f8_win(ms)), ms, "ms {ms}");
        }
    }

    #[test]
    fn integer_feasibility() {
        assert!(f8_is_i8(&[1.0, 2.0, 3.0, 4.0], 6));
        assert!(f8_is_i8(&[5.0000001, -3.0], 6));
        assert!(!f8_is_i8(&[5.1], 6));
        assert!(!f8_is_i8(&[0.5, 1.0], 6));
        assert!(f8_is_i8(&[], 6));
    }

    #[test]
    fn strptime_formats() {
        let formats = default_datetime_formats();
        let date = parse_temporal("2023-03-15", &formats).expect("date");
        assert_eq!(date, 1_678_838_400_000);
        let datetime = parse_temporal("15.03.2023 12:30:00", &formats).expect("datetime");
        assert_eq!(datetime, 1_678_838_400_000 + 12 * 3_600_000 + 30 * 60_000);
        let time = parse_temporal("06:15", &formats).expect("time");
        assert_eq!(time, 6 * 3_600_000 + 15 * 60_000);
        assert_eq!(parse_temporal("not a date", &formats), None);
    }

    #[test]
    fn strptime_negative_results_fold_to_time_of_day() {
        let formats = default_datetime_formats();
        let folded = parse_temporal("1960-01-01", &formats).expect("date");
        assert!((0..MS_PER_DAY).contains(&folded));
    }

    #[test]
    fn timestamp_rendering() {
        assert_eq!(ms_to_string(1_678_838_400_000), "2023-03-15 00:00:00");
        assert_eq!(ms_to_string(1_678_838_400_250), "2023-03-15 00:00:00.250");
    }
}
