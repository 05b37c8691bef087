// Pipeline orchestration: extraction, transformation and loading
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use serde::Serialize;
use serde_json::json;

use crate::data::DataSet;
use crate::extract::{Extractor, FileExtractor};
use crate::load::{Loader, ReportLoader};
use crate::processing::{ProvenanceEntry, TransformationPipeline};
use crate::utils::{AppError, AppResult, Config, LogSink};

const TARGET: &str = "pipeline";

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionPhase {
    pub duration_seconds: f64,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationPhase {
    pub duration_seconds: f64,
    pub shape_before: (usize, usize),
    pub shape_after: (usize, usize),
    pub provenance: Vec<ProvenanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadingPhase {
    pub duration_seconds: f64,
    pub files_generated: usize,
    pub output_files: BTreeMap<String, PathBuf>,
}

/// Results of the phases that ran
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseResults {
    pub extraction: Option<ExtractionPhase>,
    pub transformation: Option<TransformationPhase>,
    pub loading: Option<LoadingPhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub input_files_processed: usize,
    pub total_rows_processed: usize,
    pub total_columns: usize,
    pub output_files_generated: usize,
}

/// Outcome of one complete run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub status: RunStatus,
    pub duration_seconds: f64,
    pub data_summary: Option<DataSummary>,
    pub output_files: BTreeMap<String, PathBuf>,
    pub phases: PhaseResults,
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Runs extraction, transformation and loading in sequence
pub struct PipelineOrchestrator<E: Extractor, L: Loader> {
    config: Config,
    extractor: E,
    loader: L,
    log: Arc<dyn LogSink>,
    state: PipelineState,
}

impl PipelineOrchestrator<FileExtractor, ReportLoader> {
    /// Orchestrator reading from and writing to the configured directories
    pub fn from_config(config: Config, log: Arc<dyn LogSink>) -> Self {
        let extractor = FileExtractor::new(Arc::clone(&log));
        let loader = ReportLoader::new(&config.loading.output_directory, Arc::clone(&log));
        PipelineOrchestrator::new(config, extractor, loader, log)
    }
}

impl<E: Extractor, L: Loader> PipelineOrchestrator<E, L> {
    pub fn new(config: Config, extractor: E, loader: L, log: Arc<dyn LogSink>) -> Self {
        PipelineOrchestrator {
            config,
            extractor,
            loader,
            log,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline once. Failures are reported in the result,
    /// together with the phases that completed.
    pub fn run(&mut self) -> PipelineResult {
        let started = Instant::now();
        let base_name = self.config.reporting.base_name(Local::now());
        let mut phases = PhaseResults::default();

        self.log.info(TARGET, "Starting complete ETL pipeline");

        match self.execute(&base_name, &mut phases) {
            Ok((summary, output_files)) => {
                self.state = PipelineState::Done;
                let duration = started.elapsed().as_secs_f64();
                self.log.info(
                    TARGET,
                    &format!("ETL pipeline completed successfully in {:.2} seconds", duration),
                );
                PipelineResult {
                    status: RunStatus::Success,
                    duration_seconds: duration,
                    data_summary: Some(summary),
                    output_files,
                    phases,
                    error: None,
                }
            }
            Err(err) => {
                self.state = PipelineState::Failed;
                self.log.error(TARGET, &format!("ETL pipeline failed: {}", err));
                PipelineResult {
                    status: RunStatus::Failed,
                    duration_seconds: started.elapsed().as_secs_f64(),
                    data_summary: None,
                    output_files: BTreeMap::new(),
                    phases,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn execute(
        &mut self,
        base_name: &str,
        phases: &mut PhaseResults,
    ) -> AppResult<(DataSummary, BTreeMap<String, PathBuf>)> {
        self.state = PipelineState::Extracting;
        let (raw, files_processed) = self.extract(phases)?;

        self.state = PipelineState::Transforming;
        let transformed = self.transform(raw, phases)?;

        self.state = PipelineState::Loading;
        let output_files = self.load(&transformed, base_name, phases)?;

        Ok((
            DataSummary {
                input_files_processed: files_processed,
                total_rows_processed: transformed.len(),
                total_columns: transformed.schema.fields.len(),
                output_files_generated: output_files.len(),
            },
            output_files,
        ))
    }

    fn extract(&self, phases: &mut PhaseResults) -> AppResult<(DataSet, usize)> {
        let started = Instant::now();
        let settings = &self.config.extraction;
        self.log.info(
            TARGET,
            &format!("Starting data extraction from {}", settings.input_directory.display()),
        );

        let extraction = self.extractor.extract(
            &settings.input_directory,
            &settings.file_patterns,
            settings.add_source_column,
        )?;

        let (rows, columns) = extraction.table.shape();
        phases.extraction = Some(ExtractionPhase {
            duration_seconds: started.elapsed().as_secs_f64(),
            files_processed: extraction.processed_files.len(),
            files_skipped: extraction.skipped_files.len(),
            rows,
            columns,
        });

        if rows == 0 {
            return Err(AppError::DataAbsent(
                "No data was extracted. Please check input files.".to_string(),
            ));
        }

        self.log.info(
            TARGET,
            &format!("Extraction completed: {} rows, {} columns", rows, columns),
        );
        Ok((extraction.table, extraction.processed_files.len()))
    }

    fn transform(&self, raw: DataSet, phases: &mut PhaseResults) -> AppResult<DataSet> {
        let started = Instant::now();
        let shape_before = raw.shape();
        let mut pipeline = TransformationPipeline::new(&self.config.transformation, Arc::clone(&self.log));

        let result = pipeline.transform(raw);
        let provenance = pipeline.provenance().to_vec();

        let transformed = match result {
            Ok(table) => table,
            Err(err) => {
                phases.transformation = Some(TransformationPhase {
                    duration_seconds: started.elapsed().as_secs_f64(),
                    shape_before,
                    shape_after: shape_before,
                    provenance,
                });
                return Err(err.into());
            }
        };

        phases.transformation = Some(TransformationPhase {
            duration_seconds: started.elapsed().as_secs_f64(),
            shape_before,
            shape_after: transformed.shape(),
            provenance,
        });
        Ok(transformed)
    }

    fn load(
        &self,
        table: &DataSet,
        base_name: &str,
        phases: &mut PhaseResults,
    ) -> AppResult<BTreeMap<String, PathBuf>> {
        let started = Instant::now();
        let loading = &self.config.loading;

        let mut output_files = self.loader.emit(
            table,
            base_name,
            &loading.formats,
            &loading.summary_config,
        )?;

        if loading.create_visualizations {
            match self.loader.emit_charts(table, base_name) {
                Ok(charts) => output_files.extend(charts),
                Err(err) => self
                    .log
                    .warn(TARGET, &format!("Failed to create some visualizations: {}", err)),
            }
        }

        phases.loading = Some(LoadingPhase {
            duration_seconds: started.elapsed().as_secs_f64(),
            files_generated: output_files.len(),
            output_files: output_files.clone(),
        });

        if self.config.reporting.include_metadata {
            let metadata = json!({
                "pipeline_execution": {
                    "execution_time": Local::now().to_rfc3339(),
                    "input_directory": self.config.extraction.input_directory,
                    "output_directory": loading.output_directory,
                    "base_name": base_name,
                },
                "pipeline_results": phases,
                "configuration": self.config,
            });
            match self.loader.emit_metadata(base_name, &metadata) {
                Ok(path) => {
                    output_files.insert("metadata".to_string(), path);
                }
                Err(err) => self
                    .log
                    .error(TARGET, &format!("Failed to create metadata report: {}", err)),
            }
        }

        self.log.info(
            TARGET,
            &format!("Data loading completed. Generated {} files", output_files.len()),
        );
        Ok(output_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemorySink;
    use std::fs;

    #[test]
    fn test_empty_input_is_data_absent() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.extraction.input_directory = input.path().to_path_buf();
        config.loading.output_directory = output.path().to_path_buf();

        let mut orchestrator = PipelineOrchestrator::from_config(config, Arc::new(MemorySink::new()));
        assert_eq!(orchestrator.state(), PipelineState::Idle);

        let result = orchestrator.run();
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.unwrap().contains("No data"));
        assert!(result.phases.extraction.is_some());
        assert!(result.phases.transformation.is_none());
        assert_eq!(orchestrator.state(), PipelineState::Failed);
    }

    #[test]
    fn test_full_run_writes_artifacts() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(
            input.path().join("sales.csv"),
            "Region,Units,Price\nNorth,3,2.5\nSouth,1,4.0\nNorth,3,2.5\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.extraction.input_directory = input.path().to_path_buf();
        config.loading.output_directory = output.path().to_path_buf();
        config.reporting.base_filename = "report".to_string();

        let mut orchestrator = PipelineOrchestrator::from_config(config, Arc::new(MemorySink::new()));
        let result = orchestrator.run();

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(orchestrator.state(), PipelineState::Done);
        let summary = result.data_summary.unwrap();
        assert_eq!(summary.input_files_processed, 1);
        assert_eq!(summary.total_rows_processed, 2);
        for key in ["csv", "excel_styled", "summary", "bar_chart_data", "correlation_data", "metadata"] {
            assert!(result.output_files[key].exists(), "missing {}", key);
        }
        assert!(output.path().join("report.csv").exists());
    }
}
