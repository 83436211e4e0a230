use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::error::{LedgerError, LedgerResult};

const MONTH_ABBREVIATIONS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn day_first_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})[-/](\d{1,2})[-/](\d{4})").expect("day-first regex"))
}

fn year_first_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})").expect("year-first regex"))
}

fn month_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2})\s+([A-Za-z]{3})\s+(\d{4})").expect("month-name regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateNotation {
    DayFirst,
    YearFirst,
    MonthName,
}

/// Search order used when scanning free text for a date.
const SCAN_ORDER: &[DateNotation] = &[
    DateNotation::DayFirst,
    DateNotation::YearFirst,
    DateNotation::MonthName,
];

impl DateNotation {
    fn regex(self) -> &'static Regex {
        match self {
            Self::DayFirst => day_first_re(),
            Self::YearFirst => year_first_re(),
            Self::MonthName => month_name_re(),
        }
    }
}

/// A statement date: comparable calendar parts plus the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub display: String,
}

impl StatementDate {
    pub fn naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// `YYYY-MM` bucket key.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Location of a date inside a longer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Finds the first date in `line`, trying day-first, then year-first, then
/// month-name notation. The first notation that matches anywhere wins.
pub fn find_first_date(line: &str) -> Option<DateMatch> {
    SCAN_ORDER.iter().find_map(|notation| {
        notation.regex().find(line).map(|m| DateMatch {
            start: m.start(),
            end: m.end(),
            text: m.as_str().to_string(),
        })
    })
}

fn month_from_abbreviation(text: &str) -> Option<u32> {
    let lower = text.to_ascii_lowercase();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| *m == lower)
        .map(|idx| idx as u32 + 1)
}

fn captures_whole<'t>(re: &Regex, text: &'t str) -> Option<regex::Captures<'t>> {
    re.captures(text)
        .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == text.len()))
}

fn parse_parts(notation: DateNotation, text: &str) -> Option<(i32, u32, u32)> {
    let caps = captures_whole(notation.regex(), text)?;
    match notation {
        DateNotation::DayFirst => Some((
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        )),
        DateNotation::YearFirst => Some((
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )),
        DateNotation::MonthName => Some((
            caps[3].parse().ok()?,
            month_from_abbreviation(&caps[2])?,
            caps[1].parse().ok()?,
        )),
    }
}

/// Normalizes a date cell in one of the three supported notations.
///
/// A leading four-digit group selects year-first; any other numeric form is
/// read day-first. The calendar date must exist.
pub fn normalize_date(raw: &str) -> LedgerResult<StatementDate> {
    let text = raw.trim();
    let leading_digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    let notation = if leading_digits == 4 {
        DateNotation::YearFirst
    } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
        DateNotation::MonthName
    } else {
        DateNotation::DayFirst
    };

    let (year, month, day) = parse_parts(notation, text)
        .ok_or_else(|| LedgerError::UnrecognizedDateFormat(raw.to_string()))?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| LedgerError::UnrecognizedDateFormat(raw.to_string()))?;

    Ok(StatementDate {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        display: text.to_string(),
    })
}
