// Staged transformation pipeline with provenance tracking
// Author: Gabriel Demetrios Lafis

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::data::DataSet;
use crate::utils::{LogSink, TransformConfig};

use super::{
    ApplyRules, CalculateKpis, CalculatedFields, ConvertTypes, DataProcessor, Deduplicate, ProcessContext,
    ProcessingError, ResolveMissing, StandardizeNames,
};

const TARGET: &str = "transform";

/// One completed step of a transformation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvenanceEntry {
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub details: String,
    pub shape_before: (usize, usize),
    pub shape_after: (usize, usize),
    pub warnings: usize,
}

/// Pipeline for chaining processors in a fixed order.
///
/// Every executed step appends one [`ProvenanceEntry`]; the log is
/// append-only and readable through [`TransformationPipeline::provenance`].
pub struct TransformationPipeline {
    steps: Vec<Box<dyn DataProcessor>>,
    log: Arc<dyn LogSink>,
    provenance: Vec<ProvenanceEntry>,
}

impl TransformationPipeline {
    /// Build the standard step sequence from configuration
    pub fn new(config: &TransformConfig, log: Arc<dyn LogSink>) -> Self {
        let mut pipeline = TransformationPipeline::empty(log);

        if config.standardize_columns {
            pipeline = pipeline.add(StandardizeNames::new(config.name_collision));
        }
        if config.handle_missing {
            pipeline = pipeline.add(ResolveMissing::new(config.missing_strategy.clone()));
        }
        if config.remove_duplicates {
            pipeline = pipeline.add(Deduplicate::new(config.duplicate_subset.clone(), config.keep));
        }
        if config.convert_types {
            pipeline = pipeline.add(ConvertTypes::new(config.type_mapping.clone()));
        }
        if !config.calculations.is_empty() {
            pipeline = pipeline.add(CalculatedFields::new(config.calculations.clone()));
        }
        if !config.business_rules.is_empty() {
            pipeline = pipeline.add(ApplyRules::new(config.business_rules.clone()));
        }
        if !config.kpi_config.is_empty() {
            pipeline = pipeline.add(CalculateKpis::new(config.kpi_config.clone()));
        }

        pipeline
    }

    /// A pipeline with no steps
    pub fn empty(log: Arc<dyn LogSink>) -> Self {
        TransformationPipeline {
            steps: Vec::new(),
            log,
            provenance: Vec::new(),
        }
    }

    /// Append a processor
    pub fn add<P: DataProcessor + 'static>(mut self, processor: P) -> Self {
        self.steps.push(Box::new(processor));
        self
    }

    /// Names of the configured steps, in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step over `input`.
    ///
    /// Step-level problems (a bad formula, an unparseable cell) are logged as
    /// warnings and do not stop the run; only structural errors propagate.
    pub fn transform(&mut self, input: DataSet) -> Result<DataSet, ProcessingError> {
        let initial_shape = input.shape();
        let mut current = input;
        let mut ctx = ProcessContext::new(Arc::clone(&self.log), TARGET);
        let mut total_warnings = 0;

        self.log.info(
            TARGET,
            &format!(
                "Starting transformation of {} rows x {} columns",
                initial_shape.0, initial_shape.1
            ),
        );

        for step in &self.steps {
            ctx.reset();
            let shape_before = current.shape();
            ctx.debug(&format!("Running {} ({:?})", step.name(), step.processor_type()));

            current = step.process(current, &mut ctx)?;

            let shape_after = current.shape();
            total_warnings += ctx.warnings();
            self.log.info(
                TARGET,
                &format!(
                    "{}: {:?} -> {:?} {}",
                    step.name(),
                    shape_before,
                    shape_after,
                    ctx.notes().join("; ")
                ),
            );
            self.provenance.push(ProvenanceEntry {
                timestamp: Local::now(),
                operation: step.name().to_string(),
                details: ctx.notes().join("; "),
                shape_before,
                shape_after,
                warnings: ctx.warnings(),
            });
        }

        let final_shape = current.shape();
        self.provenance.push(ProvenanceEntry {
            timestamp: Local::now(),
            operation: "Complete Transformation Pipeline".to_string(),
            details: format!(
                "Executed {} steps with {} warnings",
                self.steps.len(),
                total_warnings
            ),
            shape_before: initial_shape,
            shape_after: final_shape,
            warnings: total_warnings,
        });
        self.log.info(
            TARGET,
            &format!(
                "Transformation complete: {:?} -> {:?}",
                initial_shape, final_shape
            ),
        );

        Ok(current)
    }

    /// Steps executed so far
    pub fn provenance(&self) -> &[ProvenanceEntry] {
        &self.provenance
    }
}
