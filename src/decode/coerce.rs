//! Type coercion for result cells.
//!
//! The engine hands back every cell as text. The column manifest says what
//! each column was declared as, and this module maps text to native values
//! accordingly.

use tracing::trace;

use crate::decode::temporal::{parse_temporal, TemporalKind};
use crate::decode::value::{Record, Value};
use crate::engine::ColumnInfo;

/// Ordered column-name to declared-type mapping for one result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnManifest {
    columns: Vec<ColumnInfo>,
}

impl ColumnManifest {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Declared type of a column, if the manifest knows it.
    pub fn type_of(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.data_type.as_str())
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<ColumnInfo> for ColumnManifest {
    fn from_iter<I: IntoIterator<Item = ColumnInfo>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Coercion settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoercionOptions {
    /// Parse dates and timestamps into UTC instants.
    pub utc_dates: bool,
}

/// How a declared type maps onto a native value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Temporal(TemporalKind),
    Text,
}

impl ColumnType {
    /// Classifies a declared type name. Unknown types are text.
    pub fn classify(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "boolean" => Self::Boolean,
            "tinyint" | "smallint" | "int" | "integer" | "bigint" => Self::Integer,
            "float" | "real" | "double" => Self::Float,
            "date" => Self::Temporal(TemporalKind::Date),
            "timestamp" => Self::Temporal(TemporalKind::Timestamp),
            "timestamp with time zone" => Self::Temporal(TemporalKind::TimestampWithZone),
            _ => Self::Text,
        }
    }
}

/// Decodes one cell. Empty text is always NULL.
///
/// Values that do not parse as their declared type are kept as text.
pub fn coerce_cell(raw: &str, declared: Option<&str>, options: CoercionOptions) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }

    let column_type = declared.map_or(ColumnType::Text, ColumnType::classify);
    let coerced = match column_type {
        ColumnType::Boolean => parse_bool(raw).map(Value::Bool),
        ColumnType::Integer => parse_integer(raw),
        ColumnType::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
        ColumnType::Temporal(kind) if options.utc_dates => {
            parse_temporal(kind, raw).map(Value::Timestamp)
        }
        ColumnType::Temporal(_) | ColumnType::Text => None,
    };

    coerced.unwrap_or_else(|| {
        if column_type != ColumnType::Text {
            trace!("Keeping {:?} cell as text: {:?}", column_type, raw);
        }
        Value::String(raw.to_string())
    })
}

/// Decodes every cell of a row against the manifest.
pub fn coerce_record<'a, I>(cells: I, manifest: &ColumnManifest, options: CoercionOptions) -> Record
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    cells
        .into_iter()
        .map(|(name, raw)| (name, coerce_cell(raw, manifest.type_of(name), options)))
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Some(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_integer(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(Value::Float))
}
