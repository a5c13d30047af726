//! Due-date text normalization.
//!
//! The site renders dates in whichever shape the course author's locale
//! produced. Parsing is an ordered chain of attempts, each returning
//! `Option`; the first success wins and total failure is `None`, never an
//! error. No format mismatch is control-flowed through panics or errors.

use chrono::{Datelike, Local, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

use super::html;

static PAREN_WEEKDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)0-9]*\)").expect("static regex is valid"));
static PAREN_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d{1,2}:\d{2}\s*[apAP][mM])\)").expect("static regex is valid")
});
static LEADING_WEEKDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+,\s*").expect("static regex is valid"));

/// Parse scraped due-date text, inferring the current calendar year for
/// formats that omit one.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    parse_date_with_year(raw, Local::now().year())
}

/// Same as [`parse_date`] with an explicit year for the year-less
/// abbreviated format. Year inference near a calendar-year boundary is a
/// known ambiguity; the caller picks the year.
pub fn parse_date_with_year(raw: &str, year: i32) -> Option<NaiveDateTime> {
    let cleaned = clean(raw);
    if cleaned.is_empty() || cleaned == "None" {
        return None;
    }

    const ATTEMPTS: &[fn(&str, i32) -> Option<NaiveDateTime>] = &[
        parse_iso,
        parse_korean_long,
        parse_english_long,
        parse_abbreviated,
    ];
    ATTEMPTS.iter().find_map(|attempt| attempt(&cleaned, year))
}

fn clean(raw: &str) -> String {
    let decoded = html::decode_entities(raw);
    html::normalize_ws(decoded.trim_end_matches('.'))
}

/// `2025-09-22 00:00:00` or `2025-09-20 23:59`.
fn parse_iso(s: &str, _year: i32) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .ok()
}

/// `2025년 10월 12일 (금) 23:59` — unit words for year/month/day with an
/// optional parenthetical weekday.
fn parse_korean_long(s: &str, _year: i32) -> Option<NaiveDateTime> {
    if !s.contains('년') {
        return None;
    }
    let no_weekday = PAREN_WEEKDAY_RE.replace_all(s, " ");
    // "요일" first: its "일" would otherwise be eaten by the day-unit pass.
    let spaced = no_weekday
        .replace("요일", " ")
        .replace(['년', '월', '일'], " ");
    let normalized = html::normalize_ws(&spaced);
    NaiveDateTime::parse_from_str(&normalized, "%Y %m %d %H:%M").ok()
}

/// `Friday, 12 October 2025, 11:59 PM`.
fn parse_english_long(s: &str, _year: i32) -> Option<NaiveDateTime> {
    let stripped = LEADING_WEEKDAY_RE.replace(s, "");
    NaiveDateTime::parse_from_str(&stripped, "%d %B %Y, %I:%M %p").ok()
}

/// `Sep 28 (Sunday) 11:59 pm` or `Nov 9 (11:59pm)` — abbreviated month and
/// day with no explicit year.
fn parse_abbreviated(s: &str, year: i32) -> Option<NaiveDateTime> {
    let unwrapped = PAREN_TIME_RE.replace_all(s, " $1");
    let no_weekday = PAREN_WEEKDAY_RE.replace_all(&unwrapped, " ");
    let normalized = html::normalize_ws(&no_weekday);
    let with_year = format!("{year} {normalized}");
    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %I:%M %p")
        .or_else(|_| NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %I:%M%p"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn iso_with_seconds() {
        assert_eq!(
            parse_date_with_year("2025-09-22 00:00:00", 2024),
            Some(at(2025, 9, 22, 0, 0))
        );
    }

    #[test]
    fn iso_without_seconds() {
        assert_eq!(
            parse_date_with_year("2025-09-20 23:59", 2024),
            Some(at(2025, 9, 20, 23, 59))
        );
    }

    #[test]
    fn korean_long_with_weekday() {
        assert_eq!(
            parse_date_with_year("2025년 10월 12일 (금) 23:59", 2024),
            Some(at(2025, 10, 12, 23, 59))
        );
    }

    #[test]
    fn english_long() {
        assert_eq!(
            parse_date_with_year("Friday, 12 October 2025, 11:59 PM", 2024),
            Some(at(2025, 10, 12, 23, 59))
        );
    }

    #[test]
    fn abbreviated_with_weekday_uses_injected_year() {
        assert_eq!(
            parse_date_with_year("Sep 28 (Sunday) 11:59 pm", 2025),
            Some(at(2025, 9, 28, 23, 59))
        );
    }

    #[test]
    fn abbreviated_with_parenthetical_time() {
        assert_eq!(
            parse_date_with_year("Nov 9 (11:59pm)", 2025),
            Some(at(2025, 11, 9, 23, 59))
        );
    }

    #[test]
    fn nbsp_and_trailing_dot_are_cleaned() {
        assert_eq!(
            parse_date_with_year("2025-09-20&nbsp;23:59.", 2025),
            Some(at(2025, 9, 20, 23, 59))
        );
    }

    #[test]
    fn garbage_is_none_not_panic() {
        for s in ["", "None", "no deadline", "2025-13-40 99:99", "tomorrow"] {
            assert_eq!(parse_date_with_year(s, 2025), None, "input: {s:?}");
        }
    }

    #[test]
    fn first_matching_format_wins() {
        // ISO must win before anything looser gets a chance to reinterpret.
        assert_eq!(
            parse_date_with_year("2025-01-02 03:04", 2099),
            Some(at(2025, 1, 2, 3, 4))
        );
    }
}
