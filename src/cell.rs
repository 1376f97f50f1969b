//! Typed spreadsheet cells
//!
//! Every table column declares a [`CellKind`]; [`parse_cell`] turns the raw
//! text of a cell into a [`CellValue`] of that kind and [`format_cell`] does
//! the reverse. Errors are per cell so the codec can collect all of them.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use thiserror::Error;

use crate::iri::{IriError, PrefixMap};
use crate::validate::ViolationKind;
use crate::vocab::{XSD_DATE, XSD_GYEAR, XSD_GYEAR_MONTH};

/// Separator of alternate labels within one cell
pub const TEXT_LIST_SEPARATOR: &str = " | ";

/// Separator between an ordered collection and a position
pub const POSITION_SEPARATOR: char = '#';

static LANGUAGE_TAG: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{1,8})*$"));

/// How a column's cells are read and written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Text,
    /// Alternate labels separated by " | "
    TextList,
    Iri,
    /// Whitespace separated IRIs or CURIEs
    IriList,
    Language,
    /// One of a fixed set of values
    Choice(&'static [&'static str]),
    /// Yes or No
    Flag,
    /// Collection memberships, "coll" or "coll # 3", one per line
    Memberships,
}

/// A parsed cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Empty,
    Text(String),
    Texts(Vec<String>),
    Iri(String),
    Iris(Vec<String>),
    Language(String),
    Choice(String),
    Flag(bool),
    Memberships(Vec<Membership>),
}

/// A concept or collection being a member of a collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Membership {
    pub collection: String,
    /// 1-based position for ordered collections
    pub position: Option<usize>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("{source}: \"{value}\"")]
    Iri { value: String, source: IriError },

    #[error("invalid language code \"{0}\"")]
    Language(String),

    #[error("\"{value}\" is not one of: {}", .allowed.join("; "))]
    Choice {
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("expected Yes or No, got \"{0}\"")]
    Flag(String),

    #[error("invalid position in \"{0}\", expected \"<collection> # <number>\"")]
    Position(String),
}

impl CellError {
    pub fn kind(&self) -> ViolationKind {
        match self {
            CellError::Iri {
                source: IriError::UnknownPrefix(_),
                ..
            } => ViolationKind::UnknownPrefix,
            CellError::Iri { .. } => ViolationKind::MalformedIri,
            CellError::Language(_)
            | CellError::Choice { .. }
            | CellError::Flag(_)
            | CellError::Position(_) => ViolationKind::InvalidValue,
        }
    }
}

/// Parse a raw cell. Blank cells are [`CellValue::Empty`] for every kind.
pub fn parse_cell(kind: CellKind, raw: &str, prefixes: &PrefixMap) -> Result<CellValue, CellError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(CellValue::Empty);
    }
    let value = match kind {
        CellKind::Text => CellValue::Text(raw.to_string()),
        CellKind::TextList => CellValue::Texts(parse_text_list(raw)),
        CellKind::Iri => CellValue::Iri(expand(raw, prefixes)?),
        CellKind::IriList => CellValue::Iris(parse_iri_list(raw, prefixes)?),
        CellKind::Language => CellValue::Language(parse_language(raw)?),
        CellKind::Choice(allowed) => {
            let found = allowed
                .iter()
                .find(|a| a.eq_ignore_ascii_case(raw))
                .ok_or(CellError::Choice {
                    value: raw.to_string(),
                    allowed,
                })?;
            CellValue::Choice(found.to_string())
        }
        CellKind::Flag => CellValue::Flag(parse_flag(raw)?),
        CellKind::Memberships => CellValue::Memberships(parse_memberships(raw, prefixes)?),
    };
    Ok(value)
}

/// Text of a cell as written to the sheet
pub fn format_cell(value: &CellValue, prefixes: &PrefixMap) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(t) | CellValue::Language(t) | CellValue::Choice(t) => t.clone(),
        CellValue::Texts(items) => format_text_list(items),
        CellValue::Iri(iri) => prefixes.compress(iri),
        CellValue::Iris(iris) => dedup(iris.iter().map(|i| prefixes.compress(i))).join("\n"),
        CellValue::Flag(true) => "Yes".to_string(),
        CellValue::Flag(false) => "No".to_string(),
        CellValue::Memberships(items) => items
            .iter()
            .map(|m| match m.position {
                Some(pos) => format!(
                    "{} {} {}",
                    prefixes.compress(&m.collection),
                    POSITION_SEPARATOR,
                    pos
                ),
                None => prefixes.compress(&m.collection),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn expand(raw: &str, prefixes: &PrefixMap) -> Result<String, CellError> {
    prefixes.expand(raw).map_err(|source| CellError::Iri {
        value: raw.to_string(),
        source,
    })
}

/// Whitespace separated; a trailing comma on an item is tolerated
pub fn parse_iri_list(raw: &str, prefixes: &PrefixMap) -> Result<Vec<String>, CellError> {
    let iris = raw
        .split_whitespace()
        .map(|item| item.trim_end_matches(','))
        .filter(|item| !item.is_empty())
        .map(|item| expand(item, prefixes))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dedup(iris))
}

/// Split on " | ", honoring `\|` as a literal bar
pub fn parse_text_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => items.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    items.push(current);
    dedup(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    )
}

pub fn format_text_list(items: &[String]) -> String {
    dedup(items.iter().map(|i| i.replace('|', "\\|"))).join(TEXT_LIST_SEPARATOR)
}

pub fn parse_language(raw: &str) -> Result<String, CellError> {
    let valid = LANGUAGE_TAG.as_ref().is_ok_and(|re| re.is_match(raw));
    if valid {
        Ok(raw.to_ascii_lowercase())
    } else {
        Err(CellError::Language(raw.to_string()))
    }
}

pub fn parse_flag(raw: &str) -> Result<bool, CellError> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        _ => Err(CellError::Flag(raw.to_string())),
    }
}

/// One membership per line (or comma separated): "coll" or "coll # 3"
pub fn parse_memberships(raw: &str, prefixes: &PrefixMap) -> Result<Vec<Membership>, CellError> {
    let mut out = Vec::new();
    for entry in raw.split(['\n', ',']).map(str::trim).filter(|e| !e.is_empty()) {
        let membership = match entry.split_once(POSITION_SEPARATOR) {
            Some((collection, position)) => {
                let position: usize = position
                    .trim()
                    .parse()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| CellError::Position(entry.to_string()))?;
                Membership {
                    collection: expand(collection.trim(), prefixes)?,
                    position: Some(position),
                }
            }
            None => Membership {
                collection: expand(entry, prefixes)?,
                position: None,
            },
        };
        if !out.contains(&membership) {
            out.push(membership);
        }
    }
    Ok(out)
}

/// Remove repeated items, keeping the first occurrence
pub fn dedup<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// A date of year, month or day precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialDate {
    Year(i32),
    YearMonth(i32, u32),
    Date(NaiveDate),
}

impl PartialDate {
    pub fn datatype(&self) -> &'static str {
        match self {
            PartialDate::Year(_) => XSD_GYEAR,
            PartialDate::YearMonth(..) => XSD_GYEAR_MONTH,
            PartialDate::Date(_) => XSD_DATE,
        }
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialDate::Year(y) => write!(f, "{:04}", y),
            PartialDate::YearMonth(y, m) => write!(f, "{:04}-{:02}", y, m),
            PartialDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Accepts YYYY, YYYY-MM and YYYY-MM-DD; a time part after 'T' or a space is
/// dropped
pub fn parse_date(raw: &str) -> Result<PartialDate, String> {
    let raw = raw.trim();
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    let invalid = || format!("\"{}\" is not a date (YYYY, YYYY-MM or YYYY-MM-DD)", raw);
    let parts: Vec<&str> = date_part.split('-').collect();
    match parts.as_slice() {
        [y] if y.len() == 4 => y.parse().map(PartialDate::Year).map_err(|_| invalid()),
        [y, m] if y.len() == 4 && m.len() == 2 => {
            let year = y.parse().map_err(|_| invalid())?;
            let month: u32 = m.parse().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| PartialDate::YearMonth(d.year(), d.month()))
                .ok_or_else(invalid)
        }
        [_, _, _] => NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map(PartialDate::Date)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> PrefixMap {
        let mut map = PrefixMap::well_known();
        map.insert("ex", "https://example.org/voc_");
        map
    }

    #[test]
    fn test_iri_list_whitespace_and_commas() {
        let iris = parse_iri_list("ex:0000001, ex:0000002\n  https://other.org/x ex:0000001", &prefixes())
            .unwrap();
        assert_eq!(
            iris,
            vec![
                "https://example.org/voc_0000001",
                "https://example.org/voc_0000002",
                "https://other.org/x"
            ]
        );
    }

    #[test]
    fn test_unknown_prefix_kind() {
        let err = parse_cell(CellKind::Iri, "nope:1", &prefixes()).unwrap_err();
        assert_eq!(err.kind(), ViolationKind::UnknownPrefix);
        let err = parse_cell(CellKind::Iri, "not an iri", &prefixes()).unwrap_err();
        assert_eq!(err.kind(), ViolationKind::MalformedIri);
    }

    #[test]
    fn test_text_list_escapes() {
        let items = vec!["a|b".to_string(), "c".to_string(), "c".to_string()];
        let text = format_text_list(&items);
        assert_eq!(text, "a\\|b | c");
        assert_eq!(parse_text_list(&text), vec!["a|b", "c"]);
    }

    #[test]
    fn test_language() {
        assert_eq!(parse_language("EN").unwrap(), "en");
        assert_eq!(parse_language("de-CH").unwrap(), "de-ch");
        assert!(parse_language("english!").is_err());
    }

    #[test]
    fn test_choice_and_flag() {
        let kind = CellKind::Choice(&["Yes", "No"]);
        assert_eq!(
            parse_cell(kind, "yes", &prefixes()).unwrap(),
            CellValue::Choice("Yes".into())
        );
        assert!(parse_cell(kind, "maybe", &prefixes()).is_err());
        assert_eq!(parse_flag("No"), Ok(false));
    }

    #[test]
    fn test_memberships() {
        let parsed = parse_memberships("ex:0000010 # 2\nex:0000011", &prefixes()).unwrap();
        assert_eq!(
            parsed,
            vec![
                Membership {
                    collection: "https://example.org/voc_0000010".into(),
                    position: Some(2)
                },
                Membership {
                    collection: "https://example.org/voc_0000011".into(),
                    position: None
                },
            ]
        );
        let text = format_cell(&CellValue::Memberships(parsed.clone()), &prefixes());
        assert_eq!(text, "ex:0000010 # 2\nex:0000011");
        assert!(parse_memberships("ex:0000010 # zero", &prefixes()).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024").unwrap().to_string(), "2024");
        assert_eq!(parse_date("2024-03").unwrap().datatype(), XSD_GYEAR_MONTH);
        assert_eq!(parse_date("2024-03-05T10:00:00").unwrap().to_string(), "2024-03-05");
        assert!(parse_date("2024-13").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_empty_cells() {
        for kind in [CellKind::Text, CellKind::Iri, CellKind::Flag] {
            assert_eq!(parse_cell(kind, "  ", &prefixes()).unwrap(), CellValue::Empty);
        }
    }
}
