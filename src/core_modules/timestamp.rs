// THEORY:
// Snippet filenames carry their capture time, and the time-lapse assembler
// orders frames by it. Several slightly divergent filename grammars have
// shipped over the system's lifetime (colon-separated times, underscore
// separators for filesystems that reject colons, and a compact digits-only
// form), so this module unifies them into one explicit grammar:
//
//     YYYY-MM-DDTHH:MM:SS      colon-separated
//     YYYY-MM-DDTHH_MM_SS      underscore-separated
//     YYYY-MM-DDTHHMMSS        compact
//
// each with optional fractional seconds and an optional trailing `Z`,
// embedded anywhere in the filename (prefixes like a plate id are ignored).
//
// A filename that does not contain a parseable timestamp produces a typed
// error, and the caller excludes the file from the sequence. Substituting
// the current time here would silently corrupt every elapsed-hour
// calculation built on top of the sequence, so it is never done.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Why a filename yielded no capture timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("no capture timestamp found in filename '{0}'")]
    NotFound(String),
    #[error("unparseable capture timestamp '{0}'")]
    Unparseable(String),
}

/// Extracts and parses the capture timestamp embedded in a snippet filename.
pub fn parse_capture_timestamp(filename: &str) -> Result<NaiveDateTime, TimestampError> {
    let stem = strip_extension(filename);

    let start = find_date_start(stem)
        .ok_or_else(|| TimestampError::NotFound(filename.to_string()))?;
    let tail = stem[start..].trim_end_matches('Z');

    // `find_date_start` guarantees at least `YYYY-MM-DDT`.
    let (date, time) = tail.split_at(10);
    let time = &time[1..]; // drop the 'T'

    let canonical_time = normalize_time(time)
        .ok_or_else(|| TimestampError::Unparseable(tail.to_string()))?;
    let canonical = format!("{date}T{canonical_time}");

    NaiveDateTime::parse_from_str(&canonical, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| TimestampError::Unparseable(tail.to_string()))
}

/// Drops a single trailing alphabetic extension (".png", ".JPG", ...). A
/// trailing fractional-second component is all digits and is kept.
fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            stem
        }
        _ => filename,
    }
}

/// Finds the byte offset of the first `YYYY-MM-DDT` shaped substring.
fn find_date_start(stem: &str) -> Option<usize> {
    let bytes = stem.as_bytes();
    if bytes.len() < 11 {
        return None;
    }
    (0..=bytes.len() - 11).find(|&i| {
        let w = &bytes[i..i + 11];
        w[0..4].iter().all(u8::is_ascii_digit)
            && w[4] == b'-'
            && w[5..7].iter().all(u8::is_ascii_digit)
            && w[7] == b'-'
            && w[8..10].iter().all(u8::is_ascii_digit)
            && w[10] == b'T'
    })
}

/// Normalizes a time component of any accepted form to `HH:MM:SS[.frac]`.
fn normalize_time(time: &str) -> Option<String> {
    let time = time.replace('_', ":");
    let (main, frac) = match time.split_once('.') {
        Some((main, frac)) => (main.to_string(), Some(frac.to_string())),
        None => (time, None),
    };

    let colon_form = if main.contains(':') {
        main
    } else if main.len() == 6 && main.chars().all(|c| c.is_ascii_digit()) {
        format!("{}:{}:{}", &main[0..2], &main[2..4], &main[4..6])
    } else {
        return None;
    };

    match frac {
        Some(f) if f.chars().all(|c| c.is_ascii_digit()) && !f.is_empty() => {
            Some(format!("{colon_form}.{f}"))
        }
        Some(_) => None,
        None => Some(colon_form),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn expected(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn colon_separated_form_parses() {
        let ts = parse_capture_timestamp("2025-12-02T15:51:10.png").expect("parse");
        assert_eq!(ts, expected(15, 51, 10));
    }

    #[test]
    fn underscore_separated_form_parses() {
        let ts = parse_capture_timestamp("2025-12-02T15_51_10.png").expect("parse");
        assert_eq!(ts, expected(15, 51, 10));
    }

    #[test]
    fn compact_form_parses() {
        let ts = parse_capture_timestamp("2025-12-02T155110.png").expect("parse");
        assert_eq!(ts, expected(15, 51, 10));
    }

    #[test]
    fn trailing_z_and_fractional_seconds_are_accepted() {
        let ts = parse_capture_timestamp("2025-12-02T15:51:10.250Z.png").expect("parse");
        assert_eq!(ts.time().hour(), 15);
        assert_eq!(ts.time().second(), 10);

        let compact = parse_capture_timestamp("2025-12-02T155110.250Z.jpg").expect("parse");
        assert_eq!(compact, ts);
    }

    #[test]
    fn plate_prefix_is_ignored() {
        let ts = parse_capture_timestamp("SMP-9414B8_2025-12-02T15_51_10Z.png").expect("parse");
        assert_eq!(ts, expected(15, 51, 10));
    }

    #[test]
    fn filename_without_timestamp_is_not_found() {
        let err = parse_capture_timestamp("plate_closeup.png").unwrap_err();
        assert!(matches!(err, TimestampError::NotFound(_)));
    }

    #[test]
    fn malformed_time_is_unparseable_not_substituted() {
        let err = parse_capture_timestamp("2025-12-02T99.png").unwrap_err();
        assert!(matches!(err, TimestampError::Unparseable(_)));

        let err = parse_capture_timestamp("2025-12-02T25:90:90.png").unwrap_err();
        assert!(matches!(err, TimestampError::Unparseable(_)));
    }
}
