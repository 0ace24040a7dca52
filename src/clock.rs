use chrono::{NaiveTime, Timelike};

// tried in order; the 12-hour form first so "01:30 PM" never matches %H:%M
const CLOCK_FORMATS: [&str; 3] = ["%I:%M %p", "%H:%M:%S", "%H:%M"];

/// Parses a wall-clock cell in 24-hour (`HH:MM[:SS]`) or 12-hour
/// (`HH:MM AM/PM`, `H AM/PM`) form. Returns `None` for blank or unparseable text.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let text = raw.trim().to_uppercase().replace('.', ":");
    if text.is_empty() {
        return None;
    }
    // "1 PM": chrono needs a minute field to build a time
    let bare_hour = text
        .split_once(' ')
        .filter(|(hour, _)| !hour.contains(':'))
        .map(|(hour, meridiem)| format!("{hour}:00 {}", meridiem.trim()));
    let text = bare_hour.unwrap_or(text);

    CLOCK_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&text, format).ok())
}

/// Minutes since midnight, ignoring seconds.
pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Splits a start cell holding a whole range (e.g. `01:30 PM 03:00 PM`) when
/// the end cell was left empty. Otherwise the cells are returned unchanged.
pub fn split_range_cells(start: &str, end: &str) -> (String, String) {
    let start = start.trim();
    let end = end.trim();
    if !end.is_empty() || !start.contains(' ') {
        return (start.to_string(), end.to_string());
    }

    let parts: Vec<&str> = start.split_whitespace().collect();
    match parts.len() {
        n if n >= 4 => (
            format!("{} {}", parts[0], parts[1]),
            format!("{} {}", parts[2], parts[3]),
        ),
        3 => (format!("{} {}", parts[0], parts[1]), parts[2].to_string()),
        _ => (start.to_string(), String::new()),
    }
}

/// Outcome of reading a `(from, to)` pair of clock cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockRange {
    Valid(NaiveTime, NaiveTime),
    /// One or both cells were blank.
    Missing,
    /// A non-blank cell could not be parsed.
    Unparseable(String),
    /// Both parsed, but `end <= start`.
    NonPositive(NaiveTime, NaiveTime),
}

pub fn parse_range(start: &str, end: &str) -> ClockRange {
    let (start, end) = split_range_cells(start, end);
    if start.is_empty() || end.is_empty() {
        return ClockRange::Missing;
    }
    let (Some(from), Some(to)) = (parse_clock(&start), parse_clock(&end)) else {
        return ClockRange::Unparseable(format!("start={start:?} end={end:?}"));
    };
    if to <= from {
        ClockRange::NonPositive(from, to)
    } else {
        ClockRange::Valid(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parses_24_hour_forms() {
        assert_eq!(parse_clock("13:30"), Some(hm(13, 30)));
        assert_eq!(parse_clock(" 09:05:00 "), Some(hm(9, 5)));
        assert_eq!(parse_clock("8.45"), Some(hm(8, 45)));
    }

    #[test]
    fn test_parses_12_hour_forms() {
        assert_eq!(parse_clock("01:30 PM"), Some(hm(13, 30)));
        assert_eq!(parse_clock("1 pm"), Some(hm(13, 0)));
        assert_eq!(parse_clock("12:00 AM"), Some(hm(0, 0)));
        assert_eq!(parse_clock("9:15 am"), Some(hm(9, 15)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("noon"), None);
        assert_eq!(parse_clock("25:00"), None);
    }

    #[test]
    fn test_splits_combined_cell() {
        let (s, e) = split_range_cells("01:30 PM 03:00 PM", "");
        assert_eq!(s, "01:30 PM");
        assert_eq!(e, "03:00 PM");

        let (s, e) = split_range_cells("09:00", "10:00");
        assert_eq!((s.as_str(), e.as_str()), ("09:00", "10:00"));
    }

    #[test]
    fn test_range_outcomes() {
        assert_eq!(parse_range("09:00", "10:00"), ClockRange::Valid(hm(9, 0), hm(10, 0)));
        assert_eq!(parse_range("09:00", ""), ClockRange::Missing);
        assert!(matches!(parse_range("10:00", "09:00"), ClockRange::NonPositive(..)));
        assert!(matches!(parse_range("xx", "09:00"), ClockRange::Unparseable(_)));
        assert_eq!(minute_of_day(hm(13, 30)), 810);
    }
}
