//! Document store seam shared by the news client, the session manager and the
//! route guard.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

pub mod firestore;
pub mod sqlite;

pub use firestore::FirestoreStore;
pub use sqlite::SqliteStore;

const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Write-only sentinel; the store replaces it with its own clock.
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    // Cross-type ordering follows the hosted store: null, bool, number, timestamp, string.
    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Integer(_) | FieldValue::Double(_) => 2,
            FieldValue::Timestamp(_) | FieldValue::ServerTimestamp => 3,
            FieldValue::String(_) => 4,
        }
    }

    pub fn order_cmp(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Double(b)) => (*a as f64).total_cmp(b),
            (Double(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::String).unwrap_or(FieldValue::Null)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn get_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(FieldValue::as_timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Inserts a new document under a generated id and returns the id.
    fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Creates or replaces the document stored under `id`.
    fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Merges `fields` into an existing document. Missing documents are an error.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Deletes the document; deleting a missing document succeeds.
    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Every document that carries all ordered-by fields, sorted.
    fn list_ordered(&self, collection: &str, order: &[OrderBy]) -> Result<Vec<Document>>;
}

pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Replaces `ServerTimestamp` sentinels with `now`.
pub fn resolve_server_timestamps(fields: Fields, now: DateTime<Utc>) -> Fields {
    fields
        .into_iter()
        .map(|(k, v)| match v {
            FieldValue::ServerTimestamp => (k, FieldValue::Timestamp(now)),
            other => (k, other),
        })
        .collect()
}

/// In-process ordering used by backends that cannot sort server side.
pub fn sort_documents(mut docs: Vec<Document>, order: &[OrderBy]) -> Vec<Document> {
    docs.retain(|d| order.iter().all(|o| d.fields.contains_key(&o.field)));
    docs.sort_by(|a, b| {
        for o in order {
            let (Some(x), Some(y)) = (a.get(&o.field), b.get(&o.field)) else {
                continue;
            };
            let ord = match o.direction {
                Direction::Ascending => x.order_cmp(y),
                Direction::Descending => y.order_cmp(x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    });
    docs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(id: &str, fields: &[(&str, FieldValue)]) -> Document {
        Document {
            id: id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn sort_skips_documents_without_order_fields() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let docs = vec![
            doc("a", &[("at", FieldValue::Timestamp(t))]),
            doc("b", &[("title", "no timestamp".into())]),
        ];
        let sorted = sort_documents(docs, &[OrderBy::desc("at")]);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].id, "a");
    }

    #[test]
    fn auto_ids_are_twenty_alphanumerics() {
        let id = auto_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
