// Configuration utilities
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::data::Value;
use crate::load::OutputFormat;
use crate::processing::{
    AggregationSpec, BusinessRule, KeepPolicy, KpiKind, MissingStrategy, NameCollision, TargetType,
};

use super::{parse_level_filter, AppError, AppResult};

/// A bare scalar as it appears in a configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl From<ConfigScalar> for Value {
    fn from(scalar: ConfigScalar) -> Self {
        match scalar {
            ConfigScalar::Bool(b) => Value::Boolean(b),
            ConfigScalar::Int(i) => Value::Integer(i),
            ConfigScalar::Float(f) => Value::Float(f),
            ConfigScalar::Text(s) => Value::String(s),
            ConfigScalar::Null => Value::Null,
        }
    }
}

impl From<Value> for ConfigScalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Boolean(b) => ConfigScalar::Bool(b),
            Value::Integer(i) => ConfigScalar::Int(i),
            Value::Float(f) => ConfigScalar::Float(f),
            Value::String(s) => ConfigScalar::Text(s),
            Value::Timestamp(ts) => ConfigScalar::Text(Value::Timestamp(ts).to_string()),
            Value::Null => ConfigScalar::Null,
        }
    }
}

/// Serde helper keeping a mapping in document order as `Vec<(String, T)>`
pub mod ordered_map {
    use std::fmt;
    use std::marker::PhantomData;

    use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};

    pub fn serialize<S, T>(entries: &[(String, T)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        struct OrderedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
            type Value = Vec<(String, T)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    match entries.iter().position(|(k, _)| *k == key) {
                        Some(pos) => entries[pos] = (key, value),
                        None => entries.push((key, value)),
                    }
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_any(OrderedVisitor(PhantomData))
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub transformation: TransformConfig,
    pub loading: LoadingConfig,
    pub reporting: ReportingConfig,
    pub logging: LoggingConfig,
}

/// Where input files come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub input_directory: PathBuf,
    pub file_patterns: Vec<String>,
    pub add_source_column: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            input_directory: PathBuf::from("data/input"),
            file_patterns: ["*.csv", "*.tsv", "*.json", "*.xlsx", "*.xls"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            add_source_column: true,
        }
    }
}

/// Transformation steps and their parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub standardize_columns: bool,
    pub name_collision: NameCollision,
    pub handle_missing: bool,
    #[serde(with = "ordered_map")]
    pub missing_strategy: Vec<(String, MissingStrategy)>,
    pub remove_duplicates: bool,
    pub duplicate_subset: Option<Vec<String>>,
    pub keep: KeepPolicy,
    pub convert_types: bool,
    #[serde(with = "ordered_map")]
    pub type_mapping: Vec<(String, TargetType)>,
    #[serde(with = "ordered_map")]
    pub calculations: Vec<(String, String)>,
    pub business_rules: Vec<BusinessRule>,
    #[serde(with = "ordered_map")]
    pub kpi_config: Vec<(String, KpiKind)>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            standardize_columns: true,
            name_collision: NameCollision::default(),
            handle_missing: true,
            missing_strategy: Vec::new(),
            remove_duplicates: true,
            duplicate_subset: None,
            keep: KeepPolicy::default(),
            convert_types: true,
            type_mapping: Vec::new(),
            calculations: Vec::new(),
            business_rules: Vec::new(),
            kpi_config: Vec::new(),
        }
    }
}

/// Extra content of the summary report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Report name to formula; column results are totalled
    #[serde(with = "ordered_map")]
    pub custom_kpis: Vec<(String, String)>,
    pub group_by: Vec<String>,
    #[serde(with = "ordered_map")]
    pub aggregations: Vec<(String, AggregationSpec)>,
}

/// Output artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub output_directory: PathBuf,
    pub formats: Vec<OutputFormat>,
    pub create_visualizations: bool,
    pub summary_config: SummaryConfig,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        LoadingConfig {
            output_directory: PathBuf::from("data/output"),
            formats: vec![OutputFormat::Csv, OutputFormat::ExcelStyled, OutputFormat::Summary],
            create_visualizations: true,
            summary_config: SummaryConfig::default(),
        }
    }
}

/// Report naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// strftime pattern for the artifact base name
    pub base_filename: String,
    pub include_metadata: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            base_filename: "automated_report_%Y%m%d_%H%M%S".to_string(),
            include_metadata: true,
        }
    }
}

impl ReportingConfig {
    /// Artifact base name for a run started at `now`
    pub fn base_name(&self, now: DateTime<Local>) -> String {
        now.format(&self.base_filename).to_string()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Config::from_json_str(&contents),
            Some("yaml") | Some("yml") => Config::from_yaml_str(&contents),
            _ => Err(AppError::config(format!(
                "unsupported config file format: {}",
                path.display()
            ))),
        }
    }

    pub fn from_json_str(contents: &str) -> AppResult<Self> {
        let config: Config = serde_json::from_str(contents).map_err(|e| AppError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> AppResult<Self> {
        let config: Config = serde_yaml::from_str(contents).map_err(|e| AppError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot check on its own
    pub fn validate(&self) -> AppResult<()> {
        for pattern in &self.extraction.file_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| AppError::config(format!("invalid file pattern '{}': {}", pattern, e)))?;
        }

        if self.loading.formats.is_empty() {
            return Err(AppError::config("at least one output format is required"));
        }

        if StrftimeItems::new(&self.reporting.base_filename).any(|item| matches!(item, Item::Error)) {
            return Err(AppError::config(format!(
                "invalid base filename pattern '{}'",
                self.reporting.base_filename
            )));
        }

        let summary = &self.loading.summary_config;
        if !summary.aggregations.is_empty() && summary.group_by.is_empty() {
            return Err(AppError::config("summary aggregations require group_by"));
        }

        Ok(())
    }

    /// Get the log level filter
    pub fn log_level_filter(&self) -> log::LevelFilter {
        parse_level_filter(&self.logging.level)
    }
}
