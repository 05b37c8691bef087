// Data module for handling data structures and formats
// Author: Gabriel Demetrios Lafis

mod csv;
mod excel;
mod json;
mod schema;

pub use csv::*;
pub use excel::*;
pub use json::*;
pub use schema::*;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

/// Represents a generic data source
pub trait DataSource {
    /// Read data from the source
    fn read(&self) -> Result<DataSet, DataError>;

    /// Get the source name
    fn name(&self) -> &str;
}

/// Represents a generic data sink
pub trait DataSink {
    /// Write data to the sink
    fn write(&self, data: &DataSet) -> Result<(), DataError>;

    /// Get the sink name
    fn name(&self) -> &str;
}

/// Represents a dataset with schema and data
///
/// Rows are stored row-major. Every row holds exactly one value per schema
/// field and field names are unique; the mutating methods below keep both
/// invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub schema: Schema,
    pub data: Vec<Row>,
    pub metadata: Metadata,
}

impl DataSet {
    /// Create a new empty dataset
    pub fn new(schema: Schema) -> Self {
        DataSet {
            schema,
            data: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Create a dataset from a schema and a batch of rows
    pub fn with_rows(schema: Schema, rows: Vec<Row>) -> Result<Self, DataError> {
        schema.check_unique()?;
        let mut dataset = DataSet::new(schema);
        for row in rows {
            dataset.add_row(row)?;
        }
        Ok(dataset)
    }

    /// Add a row to the dataset
    pub fn add_row(&mut self, row: Row) -> Result<(), DataError> {
        if row.values.len() != self.schema.fields.len() {
            return Err(DataError::SchemaMismatch {
                expected: self.schema.fields.len(),
                found: row.values.len(),
            });
        }

        self.data.push(row);
        Ok(())
    }

    /// Get the number of rows in the dataset
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.data.len(), self.schema.fields.len())
    }

    /// Index of the column with the given name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Index of the column with the given name, or a `ColumnNotFound` error
    pub fn require_column(&self, name: &str) -> Result<usize, DataError> {
        self.column_index(name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    /// Names of all columns in schema order
    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Iterate over the values of one column
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.data.iter().map(move |row| &row.values[index])
    }

    /// Clone the values of one column into a vector
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.column_index(name)?;
        Some(self.column_values(idx).cloned().collect())
    }

    /// Append a new column
    pub fn add_column(&mut self, field: Field, values: Vec<Value>) -> Result<(), DataError> {
        if self.column_index(&field.name).is_some() {
            return Err(DataError::DuplicateColumn(field.name));
        }
        if values.len() != self.data.len() {
            return Err(DataError::SchemaMismatch {
                expected: self.data.len(),
                found: values.len(),
            });
        }

        self.schema.fields.push(field);
        for (row, value) in self.data.iter_mut().zip(values) {
            row.values.push(value);
        }
        Ok(())
    }

    /// Insert a column, replacing the values and type of an existing column
    /// with the same name
    pub fn set_column(
        &mut self,
        name: &str,
        data_type: DataType,
        values: Vec<Value>,
    ) -> Result<(), DataError> {
        match self.column_index(name) {
            Some(idx) => self.replace_column(idx, data_type, values),
            None => self.add_column(Field::new(name.to_string(), data_type, true), values),
        }
    }

    /// Replace the values and type of the column at `index`
    pub fn replace_column(
        &mut self,
        index: usize,
        data_type: DataType,
        values: Vec<Value>,
    ) -> Result<(), DataError> {
        if values.len() != self.data.len() {
            return Err(DataError::SchemaMismatch {
                expected: self.data.len(),
                found: values.len(),
            });
        }

        let field = &mut self.schema.fields[index];
        field.nullable = field.nullable || values.iter().any(Value::is_null);
        field.data_type = data_type;
        for (row, value) in self.data.iter_mut().zip(values) {
            row.values[index] = value;
        }
        Ok(())
    }

    /// Remove the column at `index`
    pub fn remove_column(&mut self, index: usize) -> Field {
        for row in &mut self.data {
            row.values.remove(index);
        }
        self.schema.fields.remove(index)
    }

    /// Keep only the rows whose mask entry is `true`
    pub fn retain_rows(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.data.retain(|_| flags.next().copied().unwrap_or(false));
    }

    /// Reorder rows by the given permutation of row indices
    pub fn reorder_rows(&mut self, order: &[usize]) {
        let mut rows: Vec<Option<Row>> = std::mem::take(&mut self.data)
            .into_iter()
            .map(Some)
            .collect();
        self.data = order.iter().filter_map(|&i| rows[i].take()).collect();
    }

    /// Total number of missing cells
    pub fn missing_count(&self) -> usize {
        self.data
            .iter()
            .map(|row| row.values.iter().filter(|v| v.is_null()).count())
            .sum()
    }

    /// Union the rows of several datasets.
    ///
    /// The result schema holds every column in first-seen order; cells a source
    /// does not provide are missing. Integer and Float columns widen to Float,
    /// any other disagreement widens to String.
    pub fn concat(datasets: Vec<DataSet>) -> Result<DataSet, DataError> {
        let mut fields: Vec<Field> = Vec::new();
        for dataset in &datasets {
            for field in &dataset.schema.fields {
                match fields.iter_mut().find(|f| f.name == field.name) {
                    Some(existing) => {
                        existing.data_type = existing.data_type.widen(&field.data_type);
                        existing.nullable |= field.nullable;
                    }
                    None => fields.push(field.clone()),
                }
            }
        }

        let schema = Schema::new(fields);
        let total = datasets.iter().map(DataSet::len).sum();
        let mut result = DataSet::new(schema);
        result.data.reserve(total);

        for dataset in datasets {
            let mapping: Vec<Option<usize>> = result
                .schema
                .fields
                .iter()
                .map(|f| dataset.column_index(&f.name))
                .collect();

            for (key, value) in &dataset.metadata.properties {
                result.metadata.add(key.clone(), value.clone());
            }

            for row in dataset.data {
                let values = mapping
                    .iter()
                    .zip(&result.schema.fields)
                    .map(|(idx, field)| match idx {
                        Some(i) => field.data_type.widen_value(row.values[*i].clone()),
                        None => Value::Null,
                    })
                    .collect();
                result.data.push(Row::new(values));
            }
        }

        for field in &mut result.schema.fields {
            field.nullable = true;
        }

        Ok(result)
    }
}

/// Represents a row in a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    /// Create a new row with the given values
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    /// Get a reference to a value by index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// Represents a value in a row. `Null` is the missing marker.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Whether this is the missing marker
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value (Integer and Float only)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Whether the value is an Integer or a non-NaN Float
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// The natural data type of a non-missing value
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
            Value::Timestamp(_) => Some(DataType::Timestamp),
        }
    }

    /// Total order used for sorting and grouping.
    ///
    /// Numbers compare numerically across Integer/Float, values of different
    /// kinds order by kind, and missing values sort last.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Integer(a), Value::Float(b)) if !b.is_nan() => cmp_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) if !a.is_nan() => cmp_integer_float(*b, *a).reverse(),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::Timestamp(_) => 2,
            Value::String(_) => 3,
            Value::Null => 4,
        }
    }
}

/// The float as an i64 when it holds an integral value in range
fn exact_integer(f: f64) -> Option<i64> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && f >= -BOUND && f < BOUND {
        Some(f as i64)
    } else {
        None
    }
}

/// Compare without rounding the integer through f64. `f` must not be NaN.
fn cmp_integer_float(i: i64, f: f64) -> Ordering {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if let Some(j) = exact_integer(f) {
        i.cmp(&j)
    } else if f >= BOUND {
        Ordering::Less
    } else if f < -BOUND {
        Ordering::Greater
    } else if i <= f.floor() as i64 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                exact_integer(*b) == Some(*a)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            // Integers and integral floats compare equal, so they must hash alike
            Value::Integer(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                match exact_integer(*f) {
                    Some(i) => i.hash(state),
                    None => f.to_bits().hash(state),
                }
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Timestamp(t) => {
                4u8.hash(state);
                t.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(t) => {
                if t.num_seconds_from_midnight() == 0 && t.nanosecond() == 0 {
                    write!(f, "{}", t.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Represents a schema for a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema with the given fields
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    /// Get a reference to a field by name
    pub fn get_field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn check_unique(&self) -> Result<(), DataError> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DataError::DuplicateColumn(field.name.clone()));
            }
        }
        Ok(())
    }
}

/// Represents a field in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    /// Create a new field
    pub fn new(name: String, data_type: DataType, nullable: bool) -> Self {
        Field {
            name,
            data_type,
            nullable,
        }
    }
}

/// Represents a data type for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
    Timestamp,
    /// Text with a finite domain
    Categorical,
}

impl DataType {
    /// Integer or Float
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// String or Categorical
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::String | DataType::Categorical)
    }

    /// Smallest type able to hold values of both `self` and `other`
    pub fn widen(&self, other: &DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => *a,
            (a, b) if a.is_numeric() && b.is_numeric() => DataType::Float,
            _ => DataType::String,
        }
    }

    /// Convert a value into this (widened) type without loss
    pub fn widen_value(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Float, Value::Integer(i)) => Value::Float(i as f64),
            (DataType::String, Value::String(s)) => Value::String(s),
            (DataType::String, other) => Value::String(other.to_string()),
            (_, other) => other,
        }
    }

    /// Name used in provenance details and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool",
            DataType::Integer => "int64",
            DataType::Float => "float64",
            DataType::String => "object",
            DataType::Timestamp => "datetime",
            DataType::Categorical => "category",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents metadata for a dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub properties: HashMap<String, String>,
}

impl Metadata {
    /// Create new empty metadata
    pub fn new() -> Self {
        Metadata {
            properties: HashMap::new(),
        }
    }

    /// Add a property to the metadata
    pub fn add(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    /// Get a property from the metadata
    pub fn get(&self, key: &str) -> Option<&String> {
        self.properties.get(key)
    }
}

/// Represents an error in the data module
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Schema mismatch: expected {expected} values, found {found}")]
    SchemaMismatch { expected: usize, found: usize },
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Workbook error: {0}")]
    Workbook(String),
}
