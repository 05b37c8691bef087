// Extraction: discover input files and read them into one dataset
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::data::{
    CsvSource, DataError, DataSet, DataSource, DataType, ExcelSource, JsonSource, Schema, SchemaInference,
    Value,
};
use crate::utils::LogSink;

const TARGET: &str = "extract";

/// Represents an error raised while reading input files
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Could not decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractionError {
    fn from_data(path: &Path, err: DataError) -> Self {
        match err {
            DataError::IoError(e) => ExtractionError::Io(e),
            other => ExtractionError::Decode {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        }
    }
}

/// The combined result of reading a directory
#[derive(Debug, Clone)]
pub struct Extraction {
    pub table: DataSet,
    pub processed_files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
}

/// Produces a table from a directory of files
pub trait Extractor {
    /// Files in `dir` whose names match any of `patterns`, sorted and
    /// without repeats
    fn discover(&self, dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ExtractionError>;

    /// Read one file
    fn read(&self, path: &Path) -> Result<DataSet, ExtractionError>;

    /// Read every discovered file and union the rows. Files that fail to
    /// read are skipped.
    fn extract(&self, dir: &Path, patterns: &[String], add_source_columns: bool) -> Result<Extraction, ExtractionError>;
}

/// Descriptive information about a discovered file
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Local>>,
    pub extension: String,
}

/// Reads CSV, TSV, JSON and Excel files from the local filesystem
pub struct FileExtractor {
    log: Arc<dyn LogSink>,
}

impl FileExtractor {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        FileExtractor { log }
    }

    /// Name, size, modification time and extension of each discovered file
    pub fn file_info(&self, dir: &Path, patterns: &[String]) -> Result<Vec<FileInfo>, ExtractionError> {
        self.discover(dir, patterns)?
            .into_iter()
            .map(|path| {
                let meta = fs::metadata(&path)?;
                Ok(FileInfo {
                    name: file_name(&path),
                    size_bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Local>::from),
                    extension: extension(&path),
                    path,
                })
            })
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Append a constant String column
fn tag_column(dataset: &mut DataSet, name: &str, value: &str) -> Result<(), DataError> {
    let values = vec![Value::String(value.to_string()); dataset.len()];
    dataset.set_column(name, DataType::String, values)
}

impl Extractor for FileExtractor {
    fn discover(&self, dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ExtractionError> {
        if !dir.is_dir() {
            return Err(ExtractionError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Input directory does not exist: {}", dir.display()),
            )));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }

        let mut discovered = BTreeSet::new();
        for pattern in patterns {
            let matcher = glob::Pattern::new(pattern).map_err(|e| ExtractionError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            let before = discovered.len();
            let mut matched = 0;
            for path in &entries {
                if matcher.matches(&file_name(path)) {
                    matched += 1;
                    discovered.insert(path.clone());
                }
            }
            self.log.info(
                TARGET,
                &format!(
                    "Found {} files matching pattern '{}' ({} new)",
                    matched,
                    pattern,
                    discovered.len() - before
                ),
            );
        }

        self.log
            .info(TARGET, &format!("Total discovered files: {}", discovered.len()));
        Ok(discovered.into_iter().collect())
    }

    fn read(&self, path: &Path) -> Result<DataSet, ExtractionError> {
        let dataset = match extension(path).as_str() {
            "csv" => CsvSource::new(path, true, ',')
                .read()
                .map(SchemaInference::infer),
            "tsv" => CsvSource::new(path, true, '\t')
                .read()
                .map(SchemaInference::infer),
            "json" => JsonSource::new(path).read(),
            "xlsx" | "xls" => ExcelSource::new(path).read().map(SchemaInference::infer),
            other => return Err(ExtractionError::UnsupportedFormat(format!(".{}", other))),
        };

        let dataset = dataset.map_err(|e| ExtractionError::from_data(path, e))?;
        self.log.debug(
            TARGET,
            &format!("Read {}: {} rows", path.display(), dataset.len()),
        );
        Ok(dataset)
    }

    fn extract(&self, dir: &Path, patterns: &[String], add_source_columns: bool) -> Result<Extraction, ExtractionError> {
        let files = self.discover(dir, patterns)?;
        let mut tables = Vec::with_capacity(files.len());
        let mut processed_files = Vec::new();
        let mut skipped_files = Vec::new();

        if files.is_empty() {
            self.log.warn(TARGET, "No files found to extract data from");
        }

        for path in files {
            let name = file_name(&path);
            self.log.info(TARGET, &format!("Processing file: {}", name));

            let tagged = self.read(&path).and_then(|mut table| {
                if add_source_columns {
                    tag_column(&mut table, "source_file", &name)
                        .and_then(|_| tag_column(&mut table, "source_path", &path.to_string_lossy()))
                        .map_err(|e| ExtractionError::from_data(&path, e))?;
                }
                Ok(table)
            });

            match tagged {
                Ok(table) => {
                    self.log.info(
                        TARGET,
                        &format!("Successfully processed {}: {} rows", name, table.len()),
                    );
                    tables.push(table);
                    processed_files.push(path);
                }
                Err(err) => {
                    self.log
                        .warn(TARGET, &format!("Failed to process file {}: {}", name, err));
                    skipped_files.push(path);
                }
            }
        }

        let table = if tables.is_empty() {
            DataSet::new(Schema::new(Vec::new()))
        } else {
            DataSet::concat(tables).map_err(|e| ExtractionError::from_data(dir, e))?
        };

        self.log.info(
            TARGET,
            &format!(
                "Combined dataset: {} rows, {} columns from {} files",
                table.len(),
                table.schema.fields.len(),
                processed_files.len()
            ),
        );

        Ok(Extraction {
            table,
            processed_files,
            skipped_files,
        })
    }
}
