//! Records flowing through the pipeline
//!
//! `Item` (API) → `NormalizedItem` (journaled) → `EnrichedItem` (transient)
//! → `ResultRecord` (one CSV line).

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// A repository as returned by the primary collection API.
///
/// Only `name` and `created_at` are interpreted; everything else is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    pub fn new(name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: created_at.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// The checkpointed unit: one line of the journal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedItem {
    pub name: String,
    pub created_at: String,
}

impl NormalizedItem {
    pub fn new(name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: created_at.into(),
        }
    }
}

impl From<&Item> for NormalizedItem {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            created_at: format_date(&item.created_at),
        }
    }
}

impl From<Item> for NormalizedItem {
    fn from(item: Item) -> Self {
        Self::from(&item)
    }
}

/// A contributor as returned by the dependent API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub login: String,
}

impl Member {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedItem {
    pub item: NormalizedItem,
    pub members: Vec<Member>,
}

/// Terminal unit, one line of the output CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub name: String,
    pub created_at: String,
    pub new_member_count: u64,
}

impl ResultRecord {
    pub const DELIMITER: char = ';';

    /// `name;createdAt;count\n`
    pub fn to_csv_line(&self) -> String {
        format!(
            "{}{d}{}{d}{}\n",
            self.name,
            self.created_at,
            self.new_member_count,
            d = Self::DELIMITER
        )
    }

    /// Parse one CSV line (without its newline). `None` if the shape is wrong.
    pub fn from_csv_line(line: &str) -> Option<Self> {
        let mut fields = line.split(Self::DELIMITER);
        let name = fields.next()?;
        let created_at = fields.next()?;
        let count = fields.next()?.trim().parse().ok()?;
        if name.is_empty() || fields.next().is_some() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            created_at: created_at.to_string(),
            new_member_count: count,
        })
    }
}

/// Date portion (`YYYY-MM-DD`) of an ISO-8601 timestamp.
///
/// Anything that is not recognisably a timestamp or a date is returned
/// unchanged.
pub fn format_date(raw: &str) -> String {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.date_naive().format("%Y-%m-%d").to_string();
    }

    let date_part = raw.split('T').next().unwrap_or(raw);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}
