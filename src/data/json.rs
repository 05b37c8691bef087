// JSON data source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};

use super::{DataError, DataSet, DataSink, DataSource, DataType, Field, Row, Schema, Value};

/// JSON data source reading an array of flat objects
pub struct JsonSource {
    path: PathBuf,
    name: String,
    array_path: Option<String>,
}

impl JsonSource {
    /// Create a new JSON data source
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        JsonSource {
            name: path.to_string_lossy().to_string(),
            path,
            array_path: None,
        }
    }

    /// Create a new JSON data source with a dotted path to the array
    pub fn with_array_path<P: AsRef<Path>, S: Into<String>>(path: P, array_path: S) -> Self {
        let mut source = Self::new(path);
        source.array_path = Some(array_path.into());
        source
    }

    /// Convert a JSON value to a data value. Nested values are kept as
    /// their JSON text.
    pub fn json_to_value(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            JsonValue::String(s) => Value::String(s.clone()),
            nested => Value::String(nested.to_string()),
        }
    }

    /// Build a dataset from the parsed document
    pub fn from_json(&self, json: &JsonValue) -> Result<DataSet, DataError> {
        let array = match self.array_path {
            Some(ref array_path) => {
                let mut current = json;
                for part in array_path.split('.') {
                    current = current.get(part).ok_or_else(|| {
                        DataError::ParseError(format!("Path '{}' not found in JSON", array_path))
                    })?;
                }
                current.as_array().ok_or_else(|| {
                    DataError::ParseError(format!("Path '{}' is not an array", array_path))
                })?
            }
            None => json.as_array().ok_or_else(|| {
                DataError::ParseError(
                    "JSON root is not an array and no array path provided".to_string(),
                )
            })?,
        };

        let objects: Vec<&Map<String, JsonValue>> = array
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    DataError::ParseError("Array element is not an object".to_string())
                })
            })
            .collect::<Result<_, _>>()?;

        // Column union in first-seen order
        let mut names: Vec<String> = Vec::new();
        for obj in &objects {
            for key in obj.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns: Vec<Vec<Value>> = names
            .iter()
            .map(|name| {
                objects
                    .iter()
                    .map(|obj| obj.get(name).map_or(Value::Null, Self::json_to_value))
                    .collect()
            })
            .collect();

        let mut fields = Vec::with_capacity(names.len());
        for (name, values) in names.into_iter().zip(columns.iter_mut()) {
            let data_type = values
                .iter()
                .filter_map(Value::data_type)
                .reduce(|a, b| a.widen(&b))
                .unwrap_or(DataType::String);
            for value in values.iter_mut() {
                *value = data_type.widen_value(std::mem::replace(value, Value::Null));
            }
            fields.push(Field::new(name, data_type, true));
        }

        let mut dataset = DataSet::new(Schema::new(fields));
        for i in 0..objects.len() {
            let values = columns.iter().map(|col| col[i].clone()).collect();
            dataset.add_row(Row::new(values))?;
        }

        Ok(dataset)
    }
}

impl DataSource for JsonSource {
    fn read(&self) -> Result<DataSet, DataError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let json: JsonValue = serde_json::from_reader(reader)
            .map_err(|e| DataError::ParseError(e.to_string()))?;

        let mut dataset = self.from_json(&json)?;
        dataset.metadata.add("source".to_string(), "json".to_string());
        dataset.metadata.add("path".to_string(), self.name.clone());

        Ok(dataset)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Convert a data value to a JSON value
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Timestamp(_) => JsonValue::String(value.to_string()),
    }
}

/// Convert a whole dataset to an array of JSON objects
pub fn dataset_to_json(data: &DataSet) -> JsonValue {
    let array = data
        .data
        .iter()
        .map(|row| {
            let obj: Map<String, JsonValue> = data
                .schema
                .fields
                .iter()
                .zip(&row.values)
                .map(|(field, value)| (field.name.clone(), value_to_json(value)))
                .collect();
            JsonValue::Object(obj)
        })
        .collect();

    JsonValue::Array(array)
}

/// JSON data sink
pub struct JsonSink {
    path: PathBuf,
    name: String,
    pretty: bool,
}

impl JsonSink {
    /// Create a new JSON data sink
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        JsonSink {
            name: path.to_string_lossy().to_string(),
            path,
            pretty,
        }
    }
}

impl DataSink for JsonSink {
    fn write(&self, data: &DataSet) -> Result<(), DataError> {
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);

        let json = dataset_to_json(data);

        let to_io = |e: serde_json::Error| DataError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e));
        if self.pretty {
            serde_json::to_writer_pretty(writer, &json).map_err(to_io)?;
        } else {
            serde_json::to_writer(writer, &json).map_err(to_io)?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
