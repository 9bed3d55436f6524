use std::fmt;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};

/// Value-type family of an indexed member. Decides which index table a
/// value is stored in and which column type the member gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeFamily {
    Integer,
    Fractal,
    Boolean,
    DateTime,
    Guid,
    String,
    Enum,   // Stored as its string name
    Text,   // Free text, not length bounded
}

/// Physical index table a family is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexTable {
    Integers,
    Fractals,
    Booleans,
    Dates,
    Guids,
    Strings,
    Texts,
}

impl DataTypeFamily {
    pub fn index_table(&self) -> IndexTable {
        match self {
            DataTypeFamily::Integer => IndexTable::Integers,
            DataTypeFamily::Fractal => IndexTable::Fractals,
            DataTypeFamily::Boolean => IndexTable::Booleans,
            DataTypeFamily::DateTime => IndexTable::Dates,
            DataTypeFamily::Guid => IndexTable::Guids,
            // Enums share the string table
            DataTypeFamily::String | DataTypeFamily::Enum => IndexTable::Strings,
            DataTypeFamily::Text => IndexTable::Texts,
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            DataTypeFamily::String | DataTypeFamily::Enum | DataTypeFamily::Text
        )
    }
}

impl IndexTable {
    pub const ALL: [IndexTable; 7] = [
        IndexTable::Integers,
        IndexTable::Fractals,
        IndexTable::Booleans,
        IndexTable::Dates,
        IndexTable::Guids,
        IndexTable::Strings,
        IndexTable::Texts,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            IndexTable::Integers => "Integers",
            IndexTable::Fractals => "Fractals",
            IndexTable::Booleans => "Booleans",
            IndexTable::Dates => "Dates",
            IndexTable::Guids => "Guids",
            IndexTable::Strings => "Strings",
            IndexTable::Texts => "Texts",
        }
    }

    /// String and text tables carry an extra `StringValue` column
    pub fn has_string_value(&self) -> bool {
        matches!(self, IndexTable::Strings | IndexTable::Texts)
    }

    /// Family used to type the `Value` column
    pub fn value_family(&self) -> DataTypeFamily {
        match self {
            IndexTable::Integers => DataTypeFamily::Integer,
            IndexTable::Fractals => DataTypeFamily::Fractal,
            IndexTable::Booleans => DataTypeFamily::Boolean,
            IndexTable::Dates => DataTypeFamily::DateTime,
            IndexTable::Guids => DataTypeFamily::Guid,
            IndexTable::Strings => DataTypeFamily::String,
            IndexTable::Texts => DataTypeFamily::Text,
        }
    }
}

/// Uniqueness scope of a unique index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniqueMode {
    PerType,      // Unique across all instances of the structure type
    PerInstance,  // Unique within one instance only
}

/// Scalar value of an index entry or a query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Fractal(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON member value into the family's scalar representation
    pub fn from_json(json: &serde_json::Value, family: DataTypeFamily) -> Result<Value> {
        use serde_json::Value as Json;

        let value = match (family, json) {
            (_, Json::Null) => Some(Value::Null),
            (DataTypeFamily::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
            (DataTypeFamily::Integer, Json::String(s)) => s.parse().ok().map(Value::Integer),
            (DataTypeFamily::Fractal, Json::Number(n)) => n.as_f64().map(Value::Fractal),
            (DataTypeFamily::Fractal, Json::String(s)) => s.parse().ok().map(Value::Fractal),
            (DataTypeFamily::Boolean, Json::Bool(b)) => Some(Value::Boolean(*b)),
            (DataTypeFamily::DateTime, Json::String(s)) => parse_datetime(s).map(Value::DateTime),
            (DataTypeFamily::Guid, Json::String(s)) => Uuid::parse_str(s).ok().map(Value::Guid),
            (DataTypeFamily::String | DataTypeFamily::Enum | DataTypeFamily::Text, Json::String(s)) => {
                Some(Value::String(s.clone()))
            }
            (DataTypeFamily::String | DataTypeFamily::Enum | DataTypeFamily::Text, Json::Number(n)) => {
                Some(Value::String(n.to_string()))
            }
            (DataTypeFamily::String | DataTypeFamily::Enum | DataTypeFamily::Text, Json::Bool(b)) => {
                Some(Value::String(b.to_string()))
            }
            _ => None,
        };

        value.ok_or_else(|| Error::new(
            ErrorKind::Serialization,
            format!("Cannot read {} as {:?}", json, family),
        ))
    }

    /// Stringified form, as stored in unique and `StringValue` columns
    pub fn to_sql_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Fractal(f) => Some(f.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::DateTime(d) => Some(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Guid(g) => Some(g.hyphenated().to_string()),
            Value::String(s) => Some(s.clone()),
            Value::List(items) => Some(
                items.iter()
                    .filter_map(|v| v.to_sql_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            other => write!(f, "{}", other.to_sql_string().unwrap_or_default()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Fractal(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Guid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

/// Accepts RFC 3339 and naive ISO timestamps (read as UTC)
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
