// Processing module for data transformation and analysis
// Author: Gabriel Demetrios Lafis

mod aggregate;
mod columns;
mod dedup;
mod kpi;
mod pipeline;
mod rules;
mod stats;

pub use aggregate::*;
pub use columns::*;
pub use dedup::*;
pub use kpi::*;
pub use pipeline::*;
pub use rules::*;
pub use stats::*;

use std::sync::Arc;

use thiserror::Error;

use crate::data::{DataError, DataSet};
use crate::expression::ExpressionError;
use crate::utils::LogSink;

/// Represents a data processor that transforms data
pub trait DataProcessor {
    /// Process a dataset and return the transformed dataset
    fn process(&self, input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError>;

    /// Get the processor name
    fn name(&self) -> &str;

    /// Get the processor type
    fn processor_type(&self) -> ProcessorType;
}

/// Represents a processor type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorType {
    Standardize,
    MissingValues,
    Deduplicate,
    TypeConversion,
    CalculatedFields,
    BusinessRules,
    Kpi,
    Aggregate,
}

/// Per-step state handed to a processor: where to log, and the notes that
/// end up in the step's provenance entry
pub struct ProcessContext {
    log: Arc<dyn LogSink>,
    target: String,
    notes: Vec<String>,
    warnings: usize,
}

impl ProcessContext {
    pub fn new(log: Arc<dyn LogSink>, target: &str) -> Self {
        ProcessContext {
            log,
            target: target.to_string(),
            notes: Vec::new(),
            warnings: 0,
        }
    }

    /// Record a recoverable problem
    pub fn warn(&mut self, message: &str) {
        self.warnings += 1;
        self.log.warn(&self.target, message);
    }

    pub fn debug(&self, message: &str) {
        self.log.debug(&self.target, message);
    }

    /// Add a line to the step summary
    pub fn note<S: Into<String>>(&mut self, note: S) {
        self.notes.push(note.into());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Clear the notes and warnings of the previous step
    pub fn reset(&mut self) {
        self.notes.clear();
        self.warnings = 0;
    }

    pub fn sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.log)
    }
}

/// Represents an error in the processing module
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Data error: {0}")]
    DataError(#[from] DataError),
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
