// Schema definition, type inference and value coercion
// Author: Gabriel Demetrios Lafis

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use super::{DataSet, DataType, Field, Schema, Value};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// A single value that could not be converted to the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cannot convert '{value}' to {target}")]
pub struct CoercionError {
    pub value: String,
    pub target: DataType,
}

impl CoercionError {
    fn new(value: &Value, target: DataType) -> Self {
        CoercionError {
            value: value.to_string(),
            target,
        }
    }
}

/// Parse a timestamp from the textual forms the extractors commonly see
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parse a boolean literal
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Convert a value to the target type.
///
/// Missing values stay missing for every target.
pub fn coerce_value(value: &Value, target: DataType) -> Result<Value, CoercionError> {
    let fail = || CoercionError::new(value, target);

    match (value, target) {
        (Value::Null, _) => Ok(Value::Null),

        (Value::Boolean(b), DataType::Boolean) => Ok(Value::Boolean(*b)),
        (Value::Integer(i), DataType::Boolean) => Ok(Value::Boolean(*i != 0)),
        (Value::Float(f), DataType::Boolean) => Ok(Value::Boolean(*f != 0.0)),
        (Value::String(s), DataType::Boolean) => parse_bool(s).map(Value::Boolean).ok_or_else(fail),

        (Value::Boolean(b), DataType::Integer) => Ok(Value::Integer(i64::from(*b))),
        (Value::Integer(i), DataType::Integer) => Ok(Value::Integer(*i)),
        (Value::Float(f), DataType::Integer) => {
            if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Ok(Value::Integer(f.trunc() as i64))
            } else {
                Err(fail())
            }
        }
        (Value::String(s), DataType::Integer) => {
            s.trim().parse::<i64>().map(Value::Integer).map_err(|_| fail())
        }

        (Value::Boolean(b), DataType::Float) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        (Value::Integer(i), DataType::Float) => Ok(Value::Float(*i as f64)),
        (Value::Float(f), DataType::Float) => Ok(Value::Float(*f)),
        (Value::String(s), DataType::Float) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(fail()),
        },

        (Value::Timestamp(t), DataType::Timestamp) => Ok(Value::Timestamp(*t)),
        (Value::String(s), DataType::Timestamp) => {
            parse_timestamp(s).map(Value::Timestamp).ok_or_else(fail)
        }

        (Value::String(s), DataType::String | DataType::Categorical) => Ok(Value::String(s.clone())),
        (other, DataType::String | DataType::Categorical) => Ok(Value::String(other.to_string())),

        _ => Err(fail()),
    }
}

/// Infers column types for datasets read from text formats
pub struct SchemaInference;

impl SchemaInference {
    /// Narrow every String column whose present values all parse as one
    /// type (Integer, then Float, then Boolean).
    pub fn infer(mut dataset: DataSet) -> DataSet {
        for idx in 0..dataset.schema.fields.len() {
            if dataset.schema.fields[idx].data_type != DataType::String {
                continue;
            }

            let candidate = [DataType::Integer, DataType::Float, DataType::Boolean]
                .into_iter()
                .find(|target| Self::column_parses_as(&dataset, idx, *target));

            if let Some(target) = candidate {
                for row in &mut dataset.data {
                    if let Ok(value) = coerce_value(&row.values[idx], target) {
                        row.values[idx] = value;
                    }
                }
                dataset.schema.fields[idx].data_type = target;
            }
        }

        dataset
    }

    fn column_parses_as(dataset: &DataSet, idx: usize, target: DataType) -> bool {
        let mut present = dataset.column_values(idx).filter(|v| !v.is_null()).peekable();
        if present.peek().is_none() {
            return false;
        }

        present.all(|value| match (value, target) {
            // "1"/"0" are integers before they are booleans
            (Value::String(s), DataType::Boolean) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "false")
            }
            _ => coerce_value(value, target).is_ok(),
        })
    }
}

/// Schema builder for creating schemas
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        SchemaBuilder { fields: Vec::new() }
    }

    /// Add a field to the schema
    pub fn add_field(mut self, name: &str, data_type: DataType, nullable: bool) -> Self {
        self.fields.push(Field::new(name.to_string(), data_type, nullable));
        self
    }

    /// Add a boolean field
    pub fn add_boolean(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Boolean, nullable)
    }

    /// Add an integer field
    pub fn add_integer(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Integer, nullable)
    }

    /// Add a float field
    pub fn add_float(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Float, nullable)
    }

    /// Add a string field
    pub fn add_string(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::String, nullable)
    }

    /// Add a timestamp field
    pub fn add_timestamp(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Timestamp, nullable)
    }

    /// Build the schema
    pub fn build(self) -> Schema {
        Schema::new(self.fields)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
