// Orchestrator tests with mocked extraction and loading
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockall::mock;
use serde_json::Value as JsonValue;

use rust_reporting_pipeline::{
    data::{DataSet, Row, SchemaBuilder, Value},
    extract::{Extraction, ExtractionError, Extractor},
    load::{LoadError, Loader, OutputFormat},
    orchestrator::{PipelineOrchestrator, PipelineState, RunStatus},
    utils::{Config, MemorySink, SummaryConfig},
};

mock! {
    pub Source {}
    impl Extractor for Source {
        fn discover(&self, dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ExtractionError>;
        fn read(&self, path: &Path) -> Result<DataSet, ExtractionError>;
        fn extract(&self, dir: &Path, patterns: &[String], add_source_columns: bool) -> Result<Extraction, ExtractionError>;
    }
}

mock! {
    pub Sink {}
    impl Loader for Sink {
        fn emit(
            &self,
            table: &DataSet,
            base_name: &str,
            formats: &[OutputFormat],
            summary: &SummaryConfig,
        ) -> Result<BTreeMap<String, PathBuf>, LoadError>;
        fn emit_charts(&self, table: &DataSet, base_name: &str) -> Result<BTreeMap<String, PathBuf>, LoadError>;
        fn emit_metadata(&self, base_name: &str, metadata: &JsonValue) -> Result<PathBuf, LoadError>;
    }
}

fn sales_table() -> DataSet {
    let schema = SchemaBuilder::new()
        .add_string("Region", true)
        .add_integer("Units", true)
        .build();
    DataSet::with_rows(
        schema,
        vec![
            Row::new(vec!["North".into(), Value::Integer(3)]),
            Row::new(vec!["South".into(), Value::Integer(1)]),
            Row::new(vec!["North".into(), Value::Integer(3)]),
        ],
    )
    .unwrap()
}

fn extraction(table: DataSet) -> Extraction {
    Extraction {
        table,
        processed_files: vec![PathBuf::from("in/sales.csv")],
        skipped_files: Vec::new(),
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.extraction.input_directory = PathBuf::from("in");
    config.loading.output_directory = PathBuf::from("out");
    config.loading.formats = vec![OutputFormat::Csv];
    config.loading.create_visualizations = false;
    config.reporting.base_filename = "report".to_string();
    config
}

fn outputs(entries: &[(&str, &str)]) -> BTreeMap<String, PathBuf> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), PathBuf::from(v)))
        .collect()
}

#[test]
fn test_successful_run_reports_every_phase() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .withf(|dir, patterns, add_source| dir == Path::new("in") && patterns.len() == 5 && *add_source)
        .times(1)
        .returning(|_, _, _| Ok(extraction(sales_table())));

    let mut sink = MockSink::new();
    sink.expect_emit()
        .withf(|table, base, formats, _| table.len() == 2 && base == "report" && formats == [OutputFormat::Csv].as_slice())
        .times(1)
        .returning(|_, _, _, _| Ok(outputs(&[("csv", "out/report.csv")])));
    sink.expect_emit_charts().never();
    sink.expect_emit_metadata()
        .withf(|base, metadata| {
            base == "report"
                && metadata["pipeline_results"]["extraction"]["rows"] == 3
                && metadata["pipeline_execution"]["base_name"] == "report"
        })
        .times(1)
        .returning(|_, _| Ok(PathBuf::from("out/report_metadata.json")));

    let mut orchestrator = PipelineOrchestrator::new(config(), source, sink, Arc::new(MemorySink::new()));
    let result = orchestrator.run();

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(orchestrator.state(), PipelineState::Done);
    assert_eq!(
        result.output_files,
        outputs(&[("csv", "out/report.csv"), ("metadata", "out/report_metadata.json")])
    );

    let summary = result.data_summary.unwrap();
    assert_eq!(summary.input_files_processed, 1);
    assert_eq!(summary.total_rows_processed, 2);
    assert_eq!(summary.total_columns, 2);
    assert_eq!(summary.output_files_generated, 2);

    let transformation = result.phases.transformation.unwrap();
    assert_eq!(transformation.shape_before, (3, 2));
    assert_eq!(transformation.shape_after, (2, 2));
    assert_eq!(
        transformation.provenance.last().unwrap().operation,
        "Complete Transformation Pipeline"
    );
    assert!(result.phases.loading.is_some());
}

#[test]
fn test_zero_rows_fails_after_extraction() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .returning(|_, _, _| Ok(extraction(DataSet::new(SchemaBuilder::new().build()))));

    let mut sink = MockSink::new();
    sink.expect_emit().never();
    sink.expect_emit_metadata().never();

    let mut orchestrator = PipelineOrchestrator::new(config(), source, sink, Arc::new(MemorySink::new()));
    let result = orchestrator.run();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(orchestrator.state(), PipelineState::Failed);
    assert!(result.error.unwrap().contains("No data was extracted"));
    assert_eq!(result.phases.extraction.unwrap().rows, 0);
    assert!(result.phases.transformation.is_none());
    assert!(result.data_summary.is_none());
    assert!(result.output_files.is_empty());
}

#[test]
fn test_extraction_error_fails_run() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .returning(|_, _, _| Err(ExtractionError::UnsupportedFormat("xlsx".to_string())));
    let sink = MockSink::new();

    let sink_log = Arc::new(MemorySink::new());
    let mut orchestrator = PipelineOrchestrator::new(config(), source, sink, sink_log.clone());
    let result = orchestrator.run();

    assert!(!result.is_success());
    assert!(result.error.unwrap().contains("xlsx"));
    assert!(result.phases.extraction.is_none());
    assert!(sink_log
        .entries()
        .iter()
        .any(|e| e.message.starts_with("ETL pipeline failed")));
}

#[test]
fn test_emit_error_fails_run_with_transformation_recorded() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .returning(|_, _, _| Ok(extraction(sales_table())));

    let mut sink = MockSink::new();
    sink.expect_emit()
        .returning(|_, _, _, _| Err(LoadError::Io(io::Error::new(io::ErrorKind::Other, "disk full"))));
    sink.expect_emit_metadata().never();

    let mut orchestrator = PipelineOrchestrator::new(config(), source, sink, Arc::new(MemorySink::new()));
    let result = orchestrator.run();

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error.unwrap().contains("disk full"));
    assert!(result.phases.transformation.is_some());
    assert!(result.phases.loading.is_none());
}

#[test]
fn test_chart_and_metadata_failures_are_not_fatal() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .returning(|_, _, _| Ok(extraction(sales_table())));

    let mut sink = MockSink::new();
    sink.expect_emit()
        .returning(|_, _, _, _| Ok(outputs(&[("csv", "out/report.csv")])));
    sink.expect_emit_charts()
        .withf(|_, base| base == "report")
        .times(1)
        .returning(|_, _| Err(LoadError::Io(io::Error::new(io::ErrorKind::Other, "no space"))));
    sink.expect_emit_metadata()
        .times(1)
        .returning(|_, _| Err(LoadError::Io(io::Error::new(io::ErrorKind::Other, "read-only"))));

    let mut cfg = config();
    cfg.loading.create_visualizations = true;

    let log = Arc::new(MemorySink::new());
    let mut orchestrator = PipelineOrchestrator::new(cfg, source, sink, log.clone());
    let result = orchestrator.run();

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.output_files, outputs(&[("csv", "out/report.csv")]));
    assert!(log
        .warnings()
        .iter()
        .any(|w| w.starts_with("Failed to create some visualizations")));
}

#[test]
fn test_charts_are_merged_into_outputs() {
    let mut source = MockSource::new();
    source
        .expect_extract()
        .returning(|_, _, _| Ok(extraction(sales_table())));

    let mut sink = MockSink::new();
    sink.expect_emit()
        .returning(|_, _, _, _| Ok(outputs(&[("csv", "out/report.csv")])));
    sink.expect_emit_charts()
        .returning(|_, _| Ok(outputs(&[("bar_chart_data", "out/report_bar_chart_data.csv")])));

    let mut cfg = config();
    cfg.loading.create_visualizations = true;
    cfg.reporting.include_metadata = false;

    let mut orchestrator = PipelineOrchestrator::new(cfg, source, sink, Arc::new(MemorySink::new()));
    let result = orchestrator.run();

    assert_eq!(
        result.output_files,
        outputs(&[("bar_chart_data", "out/report_bar_chart_data.csv"), ("csv", "out/report.csv")])
    );
    assert_eq!(result.phases.loading.unwrap().files_generated, 2);
}
