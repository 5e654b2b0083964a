use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    // Older files carry a time part on the Connection dates; only the day is kept.
    static ref DATE_REGEX: Regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[ T]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$").unwrap();
}

pub const TRIBO_LEVI: &str = "Tribo Levi";
pub const TRIBO_JUDA: &str = "Tribo Judá";

/// The group a row is scored or counted against.
///
/// Always a non-empty, trimmed name. The known set lives in the
/// configuration; this type only guarantees the name is usable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tribe(String);

impl Tribe {
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Tribe(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tribe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Tribe::new(&value).ok_or_else(|| "tribe name cannot be empty".to_string())
    }
}

impl From<Tribe> for String {
    fn from(value: Tribe) -> Self {
        value.0
    }
}

impl fmt::Display for Tribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn default_tribes() -> Vec<Tribe> {
    vec![Tribe(TRIBO_LEVI.to_string()), Tribe(TRIBO_JUDA.to_string())]
}

/// Which of the two tables a record belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Points,
    Connection,
}

impl DatasetKind {
    /// Canonical column names, in the order they are written.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            DatasetKind::Points => &["Date", "Tribe", "Game", "Points"],
            DatasetKind::Connection => &["Date", "Tribe", "Jovens"],
        }
    }

    pub fn value_column(self) -> ValueColumn {
        match self {
            DatasetKind::Points => ValueColumn::Points,
            DatasetKind::Connection => ValueColumn::Jovens,
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            DatasetKind::Points => "pontos_tribos.csv",
            DatasetKind::Connection => "conexao_tribos.csv",
        }
    }

    /// Connection rows with an unreadable date are dropped on load; Points
    /// rows with one fail the load.
    pub fn drops_bad_dates(self) -> bool {
        matches!(self, DatasetKind::Connection)
    }

    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Points => "points",
            DatasetKind::Connection => "connection",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "points" | "pontos" => Some(DatasetKind::Points),
            "connection" | "conexao" | "conexão" => Some(DatasetKind::Connection),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A numeric column that can be summed per tribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueColumn {
    Points,
    Jovens,
}

impl ValueColumn {
    pub fn name(self) -> &'static str {
        match self {
            ValueColumn::Points => "Points",
            ValueColumn::Jovens => "Jovens",
        }
    }
}

/// Maps a header cell to its canonical column name.
///
/// Older files use Portuguese headers.
pub fn canonical_column(header: &str) -> &str {
    match header.trim() {
        "Data" => "Date",
        "Tribo" => "Tribe",
        "Jogo" => "Game",
        "Pontos" => "Points",
        "YouthCount" => "Jovens",
        other => other,
    }
}

/// A field that failed to parse, with the canonical column it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub column: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(column: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            column,
            message: message.into(),
        }
    }

    pub fn is_date(&self) -> bool {
        self.column == "Date"
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}: {}", self.column, self.message)
    }
}

/// Parse an ISO-8601 calendar date, ignoring any time part.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_REGEX.captures(text.trim())?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Parse a non-negative count. Integral floats such as `5.0` are accepted.
pub fn parse_count(text: &str) -> Result<u32, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("value is missing".to_string());
    }
    if let Ok(n) = text.parse::<i64>() {
        return count_from_i64(n);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => count_from_i64(f as i64),
        _ => Err(format!("'{}' is not a whole number", text)),
    }
}

fn count_from_i64(n: i64) -> Result<u32, String> {
    if n < 0 {
        return Err("must not be negative".to_string());
    }
    u32::try_from(n).map_err(|_| format!("{} is too large", n))
}

/// Behaviour shared by the two row types.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: DatasetKind;

    fn date(&self) -> NaiveDate;

    fn tribe(&self) -> &Tribe;

    /// The value of a numeric column, or `None` if this kind has no such column.
    fn value(&self, column: ValueColumn) -> Option<u64>;

    /// Field text in `KIND.columns()` order.
    fn to_fields(&self) -> Vec<String>;

    /// Build a record from field text in `KIND.columns()` order.
    fn from_fields(fields: &[&str]) -> Result<Self, FieldError>;
}

fn field<'a>(fields: &[&'a str], index: usize, column: &'static str) -> Result<&'a str, FieldError> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| FieldError::new(column, "value is missing"))
}

fn date_field(fields: &[&str]) -> Result<NaiveDate, FieldError> {
    let text = field(fields, 0, "Date")?;
    parse_date(text).ok_or_else(|| FieldError::new("Date", format!("'{}' is not a date", text)))
}

fn tribe_field(fields: &[&str]) -> Result<Tribe, FieldError> {
    let text = field(fields, 1, "Tribe")?;
    Tribe::new(text).ok_or_else(|| FieldError::new("Tribe", "tribe name cannot be empty"))
}

/// One game result for a tribe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRecord {
    pub date: NaiveDate,
    pub tribe: Tribe,
    pub game: String,
    pub points: u32,
}

impl Record for PointsRecord {
    const KIND: DatasetKind = DatasetKind::Points;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn tribe(&self) -> &Tribe {
        &self.tribe
    }

    fn value(&self, column: ValueColumn) -> Option<u64> {
        match column {
            ValueColumn::Points => Some(u64::from(self.points)),
            ValueColumn::Jovens => None,
        }
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.tribe.to_string(),
            self.game.clone(),
            self.points.to_string(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        let date = date_field(fields)?;
        let tribe = tribe_field(fields)?;
        let game = field(fields, 2, "Game")?.to_string();
        let points =
            parse_count(field(fields, 3, "Points")?).map_err(|e| FieldError::new("Points", e))?;
        Ok(PointsRecord {
            date,
            tribe,
            game,
            points,
        })
    }
}

/// Youth attendance for a tribe on a given day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub date: NaiveDate,
    pub tribe: Tribe,
    #[serde(alias = "jovens")]
    pub youth_count: u32,
}

impl Record for ConnectionRecord {
    const KIND: DatasetKind = DatasetKind::Connection;

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn tribe(&self) -> &Tribe {
        &self.tribe
    }

    fn value(&self, column: ValueColumn) -> Option<u64> {
        match column {
            ValueColumn::Jovens => Some(u64::from(self.youth_count)),
            ValueColumn::Points => None,
        }
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.tribe.to_string(),
            self.youth_count.to_string(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError> {
        let date = date_field(fields)?;
        let tribe = tribe_field(fields)?;
        let youth_count =
            parse_count(field(fields, 2, "Jovens")?).map_err(|e| FieldError::new("Jovens", e))?;
        Ok(ConnectionRecord {
            date,
            tribe,
            youth_count,
        })
    }
}
