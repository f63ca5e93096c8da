// src/backend/record.rs
// =============================================================================
// One row of the managed table, decoded through the configured Schema.
//
// The tool only cares about three columns (id, title, image URL). The extra
// display columns are carried along untouched so `show` can print them.
// =============================================================================

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Schema;
use crate::error::{LinkerError, Result};

/// Row identifier: tables use either integer or text primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parses user input: "42" becomes Int(42), anything else stays text.
    pub fn parse(raw: &str) -> RecordId {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(raw.to_string()),
        }
    }

    fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Int).or_else(|| Some(RecordId::Text(n.to_string()))),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    /// Identity check that ignores int vs text ("42" matches 42).
    pub fn same_as(&self, other: &RecordId) -> bool {
        self == other || self.to_string() == other.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

// Integers sort numerically and come before text ids
impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecordId::Int(a), RecordId::Int(b)) => a.cmp(b),
            (RecordId::Int(_), RecordId::Text(_)) => Ordering::Less,
            (RecordId::Text(_), RecordId::Int(_)) => Ordering::Greater,
            (RecordId::Text(a), RecordId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    /// None when the column is null, missing or blank
    pub image_url: Option<String>,
    /// Configured extra display columns, in configuration order
    pub extra: Vec<(String, Value)>,
}

impl Record {
    /// Decodes a JSON row using the column names from `schema`.
    pub fn from_row(row: &Map<String, Value>, schema: &Schema) -> Result<Record> {
        let id = row
            .get(&schema.id_column)
            .and_then(RecordId::from_value)
            .ok_or_else(|| {
                LinkerError::Schema(format!("row has no usable '{}' column", schema.id_column))
            })?;

        let title = match row.get(&schema.title_column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => {
                return Err(LinkerError::Schema(format!(
                    "row {} has no '{}' column",
                    id, schema.title_column
                )))
            }
        };

        let image_url = row
            .get(&schema.image_url_column)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let extra = schema
            .extra_columns
            .iter()
            .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
            .collect();

        Ok(Record {
            id,
            title,
            image_url,
            extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_from_row_with_default_schema() {
        let schema = Schema::default();
        let record = Record::from_row(
            &row(json!({
                "id": 42,
                "title": "Sea View",
                "image_url": "https://x/a.jpg",
                "listing_url": "https://listing",
                "ignored": true
            })),
            &schema,
        )
        .unwrap();

        assert_eq!(record.id, RecordId::Int(42));
        assert_eq!(record.title, "Sea View");
        assert_eq!(record.image_url.as_deref(), Some("https://x/a.jpg"));
        assert_eq!(record.extra, vec![("listing_url".to_string(), json!("https://listing"))]);
    }

    #[test]
    fn test_missing_or_blank_image_is_none() {
        let schema = Schema::default();
        let a = Record::from_row(&row(json!({"id": "a", "title": "A"})), &schema).unwrap();
        let b = Record::from_row(&row(json!({"id": "b", "title": "B", "image_url": "  "})), &schema)
            .unwrap();
        let c = Record::from_row(&row(json!({"id": "c", "title": "C", "image_url": null})), &schema)
            .unwrap();
        assert_eq!(a.image_url, None);
        assert_eq!(b.image_url, None);
        assert_eq!(c.image_url, None);
    }

    #[test]
    fn test_missing_id_is_schema_error() {
        let result = Record::from_row(&row(json!({"title": "A"})), &Schema::default());
        assert!(matches!(result, Err(LinkerError::Schema(_))));
    }

    #[test]
    fn test_custom_columns() {
        let schema = Schema {
            table: "users".to_string(),
            id_column: "user_id".to_string(),
            title_column: "username".to_string(),
            image_url_column: "avatar_url".to_string(),
            extra_columns: vec!["email".to_string()],
        };
        let record = Record::from_row(
            &row(json!({"user_id": "u-1", "username": "ada", "avatar_url": "https://a"})),
            &schema,
        )
        .unwrap();
        assert_eq!(record.id, RecordId::Text("u-1".to_string()));
        assert_eq!(record.extra, vec![("email".to_string(), Value::Null)]);
    }

    #[test]
    fn test_record_id_ordering_and_matching() {
        let mut ids = vec![
            RecordId::Text("b".to_string()),
            RecordId::Int(10),
            RecordId::Int(2),
            RecordId::Text("a".to_string()),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                RecordId::Int(2),
                RecordId::Int(10),
                RecordId::Text("a".to_string()),
                RecordId::Text("b".to_string()),
            ]
        );
        assert!(RecordId::parse("42").same_as(&RecordId::Int(42)));
        assert!(RecordId::Text("42".to_string()).same_as(&RecordId::Int(42)));
        assert!(!RecordId::parse("43").same_as(&RecordId::Int(42)));
    }
}
