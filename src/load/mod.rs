// Loading: write the transformed table and its reports to disk
// Author: Gabriel Demetrios Lafis

mod charts;
mod styled;
mod summary;
mod workbook;

pub use charts::*;
pub use styled::*;
pub use summary::*;
pub use workbook::*;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::data::{CsvSink, DataError, DataSet, DataSink, ExcelSink, JsonSink};
use crate::utils::{LogSink, SummaryConfig};

const TARGET: &str = "load";

/// Represents an error raised while writing artifacts
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

/// A report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    /// Plain delimited text
    Csv,
    /// Array of row objects
    Json,
    /// Bordered text table
    Styled,
    /// Summary statistics as JSON
    Summary,
    /// One-sheet workbook
    Excel,
    /// One-sheet workbook with a styled header, borders and fitted widths
    ExcelStyled,
    /// Workbook with data, summary, grouped rows and a bar chart
    ExcelSummary,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Styled => "styled",
            OutputFormat::Summary => "summary",
            OutputFormat::Excel => "excel",
            OutputFormat::ExcelStyled => "excel_styled",
            OutputFormat::ExcelSummary => "excel_summary",
        }
    }

    /// File name of this format's artifact for `base_name`
    pub fn file_name(&self, base_name: &str) -> String {
        match self {
            OutputFormat::Csv => format!("{}.csv", base_name),
            OutputFormat::Json => format!("{}.json", base_name),
            OutputFormat::Styled => format!("{}_styled.txt", base_name),
            OutputFormat::Summary => format!("{}_summary.json", base_name),
            OutputFormat::Excel => format!("{}.xlsx", base_name),
            OutputFormat::ExcelStyled => format!("{}_styled.xlsx", base_name),
            OutputFormat::ExcelSummary => format!("{}_summary.xlsx", base_name),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            "csv" | "tabular" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "styled" | "text" => Ok(OutputFormat::Styled),
            "summary" => Ok(OutputFormat::Summary),
            "excel" | "xlsx" => Ok(OutputFormat::Excel),
            "excel_styled" => Ok(OutputFormat::ExcelStyled),
            "excel_summary" | "summary_workbook" => Ok(OutputFormat::ExcelSummary),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumes a table and configuration, produces named artifacts
pub trait Loader {
    /// Write the table in each requested format. A format that fails is
    /// logged and left out of the returned map.
    fn emit(
        &self,
        table: &DataSet,
        base_name: &str,
        formats: &[OutputFormat],
        summary: &SummaryConfig,
    ) -> Result<BTreeMap<String, PathBuf>, LoadError>;

    /// Write the chart data sets that apply to the table
    fn emit_charts(&self, table: &DataSet, base_name: &str) -> Result<BTreeMap<String, PathBuf>, LoadError>;

    /// Write the run metadata report
    fn emit_metadata(&self, base_name: &str, metadata: &JsonValue) -> Result<PathBuf, LoadError>;
}

/// Writes artifacts into one output directory
pub struct ReportLoader {
    output_dir: PathBuf,
    log: Arc<dyn LogSink>,
}

impl ReportLoader {
    pub fn new<P: AsRef<Path>>(output_dir: P, log: Arc<dyn LogSink>) -> Self {
        ReportLoader {
            output_dir: output_dir.as_ref().to_path_buf(),
            log,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_format(
        &self,
        table: &DataSet,
        path: &Path,
        format: OutputFormat,
        summary: &SummaryConfig,
    ) -> Result<(), LoadError> {
        match format {
            OutputFormat::Csv => CsvSink::new(path, ',').write(table)?,
            OutputFormat::Json => JsonSink::new(path, true).write(table)?,
            OutputFormat::Styled => fs::write(path, render_table(table))?,
            OutputFormat::Summary => {
                let report = build_summary(table, summary, Arc::clone(&self.log));
                fs::write(path, serde_json::to_string_pretty(&report)?)?;
            }
            OutputFormat::Excel => ExcelSink::new(path).write(table)?,
            OutputFormat::ExcelStyled => ExcelSink::styled(path).write(table)?,
            OutputFormat::ExcelSummary => {
                write_summary_workbook(table, summary, Arc::clone(&self.log), path)?
            }
        }
        Ok(())
    }
}

impl Loader for ReportLoader {
    fn emit(
        &self,
        table: &DataSet,
        base_name: &str,
        formats: &[OutputFormat],
        summary: &SummaryConfig,
    ) -> Result<BTreeMap<String, PathBuf>, LoadError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut outputs = BTreeMap::new();

        for format in formats {
            let path = self.output_dir.join(format.file_name(base_name));
            match self.write_format(table, &path, *format, summary) {
                Ok(()) => {
                    self.log
                        .info(TARGET, &format!("Saved {} report to {}", format, path.display()));
                    outputs.insert(format.to_string(), path);
                }
                Err(err) => {
                    self.log
                        .error(TARGET, &format!("Failed to create {} format: {}", format, err));
                }
            }
        }

        self.log
            .info(TARGET, &format!("Created {} report formats", outputs.len()));
        Ok(outputs)
    }

    fn emit_charts(&self, table: &DataSet, base_name: &str) -> Result<BTreeMap<String, PathBuf>, LoadError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut outputs = BTreeMap::new();

        for chart in chart_data(table) {
            let path = self
                .output_dir
                .join(format!("{}_{}.csv", base_name, chart.kind.as_str()));
            match CsvSink::new(&path, ',').write(&chart.data) {
                Ok(()) => {
                    self.log.info(
                        TARGET,
                        &format!("Created {} data: {}", chart.title, path.display()),
                    );
                    outputs.insert(chart.kind.as_str().to_string(), path);
                }
                Err(err) => {
                    self.log.warn(
                        TARGET,
                        &format!("Failed to create {} data: {}", chart.kind.as_str(), err),
                    );
                }
            }
        }

        Ok(outputs)
    }

    fn emit_metadata(&self, base_name: &str, metadata: &JsonValue) -> Result<PathBuf, LoadError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}_metadata.json", base_name));
        fs::write(&path, serde_json::to_string_pretty(metadata)?)?;
        self.log
            .info(TARGET, &format!("Created metadata report: {}", path.display()));
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataSource, Row, SchemaBuilder, Value};
    use crate::utils::MemorySink;

    fn table() -> DataSet {
        let schema = SchemaBuilder::new()
            .add_string("region", true)
            .add_integer("units", true)
            .add_float("revenue", true)
            .build();
        DataSet::with_rows(
            schema,
            vec![
                Row::new(vec!["North".into(), Value::Integer(3), Value::Float(30.0)]),
                Row::new(vec!["South".into(), Value::Integer(1), Value::Float(12.5)]),
                Row::new(vec!["North".into(), Value::Integer(2), Value::Float(21.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_format_aliases() {
        assert_eq!("excel_styled".parse::<OutputFormat>(), Ok(OutputFormat::ExcelStyled));
        assert_eq!("Excel".parse::<OutputFormat>(), Ok(OutputFormat::Excel));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Styled));
        assert_eq!(OutputFormat::ExcelSummary.file_name("r"), "r_summary.xlsx");
        assert_eq!("tabular".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("pdf".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_emit_writes_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ReportLoader::new(dir.path().join("out"), Arc::new(MemorySink::new()));
        let formats = [
            OutputFormat::Csv,
            OutputFormat::Json,
            OutputFormat::Styled,
            OutputFormat::Summary,
        ];

        let outputs = loader
            .emit(&table(), "report", &formats, &SummaryConfig::default())
            .unwrap();

        assert_eq!(outputs.len(), 4);
        let csv = fs::read_to_string(&outputs["csv"]).unwrap();
        assert!(csv.starts_with("region,units,revenue"));
        let styled = fs::read_to_string(&outputs["styled"]).unwrap();
        assert!(styled.contains("North"));
        let summary: JsonValue =
            serde_json::from_str(&fs::read_to_string(&outputs["summary"]).unwrap()).unwrap();
        assert_eq!(summary["total_rows"], 3);
    }

    #[test]
    fn test_emit_writes_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ReportLoader::new(dir.path(), Arc::new(MemorySink::new()));
        let formats = [OutputFormat::Excel, OutputFormat::ExcelStyled, OutputFormat::ExcelSummary];

        let outputs = loader
            .emit(&table(), "report", &formats, &SummaryConfig::default())
            .unwrap();

        assert_eq!(outputs.len(), 3);
        assert!(outputs["excel"].ends_with("report.xlsx"));
        assert!(outputs["excel_styled"].ends_with("report_styled.xlsx"));
        assert!(outputs["excel_summary"].ends_with("report_summary.xlsx"));
        let styled = crate::data::ExcelSource::new(&outputs["excel_styled"]).read().unwrap();
        assert_eq!(styled.data, table().data);
    }

    #[test]
    fn test_emit_charts_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ReportLoader::new(dir.path(), Arc::new(MemorySink::new()));

        let charts = loader.emit_charts(&table(), "report").unwrap();
        assert_eq!(
            charts.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["bar_chart_data", "correlation_data"]
        );
        assert!(charts["bar_chart_data"].ends_with("report_bar_chart_data.csv"));

        let path = loader
            .emit_metadata("report", &serde_json::json!({"status": "success"}))
            .unwrap();
        assert!(path.ends_with("report_metadata.json"));
        assert!(fs::read_to_string(path).unwrap().contains("success"));
    }
}
