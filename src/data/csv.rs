// CSV data source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;

use super::{DataError, DataSet, DataSink, DataSource, DataType, Field, Row, Schema, Value};

/// Cell texts read as the missing marker
pub(crate) const NA_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

/// CSV data source
pub struct CsvSource {
    path: PathBuf,
    name: String,
    has_header: bool,
    delimiter: u8,
}

impl CsvSource {
    /// Create a new CSV data source
    pub fn new<P: AsRef<Path>>(path: P, has_header: bool, delimiter: char) -> Self {
        let path = path.as_ref().to_path_buf();
        CsvSource {
            name: path.to_string_lossy().to_string(),
            path,
            has_header,
            delimiter: delimiter as u8,
        }
    }

    /// Decode raw bytes, falling back from UTF-8 to Windows-1252
    /// (a superset of Latin-1)
    fn decode(bytes: &[u8]) -> (String, &'static str) {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), "utf-8"),
            Err(_) => {
                let (text, _, _) = WINDOWS_1252.decode(bytes);
                (text.into_owned(), "windows-1252")
            }
        }
    }

    /// Parse decoded CSV text into a dataset of String columns
    pub fn parse_str(&self, text: &str) -> Result<DataSet, DataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = csv_reader.records();

        let headers: Vec<String> = if self.has_header {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(|e| DataError::ParseError(e.to_string()))?;
                    unique_headers(record.iter().map(|s| s.trim().to_string()).collect())
                }
                None => return Err(DataError::ParseError("Empty CSV file".to_string())),
            }
        } else {
            Vec::new()
        };

        let mut rows = Vec::new();
        for result in records {
            let record = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            rows.push(record);
        }

        let width = if self.has_header {
            headers.len()
        } else {
            rows.iter().map(|r| r.len()).max().unwrap_or(0)
        };
        let headers = if self.has_header {
            headers
        } else {
            (0..width).map(|i| format!("column_{}", i)).collect()
        };

        let fields: Vec<Field> = headers
            .into_iter()
            .map(|name| Field::new(name, DataType::String, true))
            .collect();
        let mut dataset = DataSet::new(Schema::new(fields));

        for (line, record) in rows.iter().enumerate() {
            if record.len() > width {
                return Err(DataError::ParseError(format!(
                    "Row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    width
                )));
            }

            let mut values: Vec<Value> = record
                .iter()
                .map(|field| {
                    if NA_VALUES.contains(&field.trim()) {
                        Value::Null
                    } else {
                        Value::String(field.to_string())
                    }
                })
                .collect();
            values.resize(width, Value::Null);
            dataset.add_row(Row::new(values))?;
        }

        Ok(dataset)
    }
}

/// Make header names unique by suffixing repeats with `.1`, `.2`, ...
pub(crate) fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", header, n);
        }
        seen.push(candidate);
    }
    seen
}

impl DataSource for CsvSource {
    fn read(&self) -> Result<DataSet, DataError> {
        let bytes = fs::read(&self.path)?;
        let (text, encoding) = Self::decode(&bytes);
        let mut dataset = self.parse_str(&text)?;

        dataset.metadata.add("source".to_string(), "csv".to_string());
        dataset.metadata.add("path".to_string(), self.name.clone());
        dataset.metadata.add("encoding".to_string(), encoding.to_string());

        Ok(dataset)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// CSV data sink
pub struct CsvSink {
    path: PathBuf,
    name: String,
    delimiter: u8,
}

impl CsvSink {
    /// Create a new CSV data sink
    pub fn new<P: AsRef<Path>>(path: P, delimiter: char) -> Self {
        let path = path.as_ref().to_path_buf();
        CsvSink {
            name: path.to_string_lossy().to_string(),
            path,
            delimiter: delimiter as u8,
        }
    }
}

impl DataSink for CsvSink {
    fn write(&self, data: &DataSet) -> Result<(), DataError> {
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        let to_io = |e: csv::Error| DataError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e));

        csv_writer
            .write_record(data.schema.fields.iter().map(|field| field.name.as_str()))
            .map_err(to_io)?;

        for row in &data.data {
            csv_writer
                .write_record(row.values.iter().map(|value| value.to_string()))
                .map_err(to_io)?;
        }

        csv_writer.flush()?;

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
