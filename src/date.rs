//! Best-effort conversion of genealogical date strings into calendar dates.

use serde::Serializer;
use time::Date;

/// Approximation qualifiers that may precede a date, as whole words.
const QUALIFIERS: [&str; 10] = [
    "ABOUT",
    "BEFORE",
    "AFTER",
    "ESTIMATED",
    "CALCULATED",
    "ABT",
    "BEF",
    "AFT",
    "EST",
    "CAL",
];

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Parses a GEDCOM date such as `31 DEC 1990`, `DEC 1990`, `1990` or
/// `ABT 1990`.
///
/// Partial dates resolve to the first day of the missing period. Two
/// tokens that are not a month and a year are read as a day and a year
/// in January. Returns `None` when no interpretation produces a valid
/// date.
pub fn parse_gedcom_date(raw: &str) -> Option<Date> {
    let upper = raw.trim().to_uppercase();
    let stripped = strip_qualifiers(&upper);
    let parts: Vec<&str> = stripped.split_whitespace().collect();

    match parts.as_slice() {
        [day, month, year] => {
            ymd(parse_year(year)?, month_number(month).unwrap_or(1), day.parse().ok()?)
        }
        [first, year] => match month_number(first) {
            Some(month) => ymd(parse_year(year)?, month, 1),
            None => ymd(parse_year(year)?, 1, first.parse().ok()?),
        },
        [year] => ymd(parse_year(year)?, 1, 1),
        _ => None,
    }
}

fn strip_qualifiers(date: &str) -> &str {
    let mut rest = date.trim();

    while let Some(qualifier) = QUALIFIERS.iter().find(|q| is_qualified_by(rest, q)) {
        rest = rest[qualifier.len()..].trim_start_matches('.').trim();
    }

    rest
}

/// Whether `date` starts with `qualifier` as a whole word.
fn is_qualified_by(date: &str, qualifier: &str) -> bool {
    date.starts_with(qualifier)
        && date[qualifier.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '.')
}

/// Returns the month number for a three-letter month abbreviation.
pub fn month_number(token: &str) -> Option<u8> {
    MONTHS
        .iter()
        .position(|m| *m == token)
        .map(|index| index as u8 + 1)
}

fn parse_year(token: &str) -> Option<i32> {
    token.parse().ok().filter(|year| (1..=9999).contains(year))
}

fn ymd(year: i32, month: u8, day: u8) -> Option<Date> {
    Date::try_from_ymd(year, month, day).ok()
}

/// Formats a date as `YYYY-MM-DD`.
pub fn iso(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Serializes an optional date as `YYYY-MM-DD` or `null`.
pub fn serialize_option<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where S: Serializer {
    match date {
        Some(date) => serializer.serialize_some(&iso(*date)),
        None => serializer.serialize_none(),
    }
}
