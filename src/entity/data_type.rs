use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Primitive data types of the client object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Int16,
    Int32,
    Int64,
    Decimal,
    Double,
    Single,
    Boolean,
    Byte,
    Guid,
    DateTime,
    DateTimeOffset,
    Time,
    Binary,
}

impl DataType {
    /// Resolve an `Edm.*` type name.
    pub fn from_edm(name: &str) -> Option<Self> {
        let short = name.strip_prefix("Edm.").unwrap_or(name);
        let data_type = match short {
            "String" => Self::String,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Decimal" => Self::Decimal,
            "Double" => Self::Double,
            "Single" => Self::Single,
            "Boolean" => Self::Boolean,
            "Byte" | "SByte" => Self::Byte,
            "Guid" => Self::Guid,
            "DateTime" | "Date" => Self::DateTime,
            "DateTimeOffset" => Self::DateTimeOffset,
            "Time" | "TimeOfDay" | "Duration" => Self::Time,
            "Binary" => Self::Binary,
            _ => return None,
        };
        Some(data_type)
    }

    /// Types serialized as JSON strings to survive IEEE754 precision loss.
    pub fn quotes_json(&self) -> bool {
        matches!(self, Self::Int64 | Self::Decimal)
    }

    /// Format a value as a URL literal of the newer dialect.
    ///
    /// Strings are single-quoted with `''` escaping; binary uses `binary'..'`;
    /// everything else, GUIDs and dates included, is written bare.
    pub fn fmt_odata_literal(&self, value: &JsonValue) -> String {
        let raw = match value {
            JsonValue::Null => return "null".to_string(),
            JsonValue::String(text) => text.clone(),
            other => other.to_string(),
        };
        match self {
            Self::String => format!("'{}'", raw.replace('\'', "''")),
            Self::Binary => format!("binary'{}'", raw),
            _ => raw,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edm.{:?}", self)
    }
}
