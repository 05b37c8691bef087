// Rust Reporting Pipeline
// Author: Gabriel Demetrios Lafis

//! # Rust Reporting Pipeline
//!
//! A configuration-driven batch pipeline that turns a directory of tabular
//! files into cleaned, enriched reports.
//!
//! ## Features
//!
//! - Extraction of CSV, TSV, JSON and Excel files with encoding fallback
//! - Column standardization, missing value handling, deduplication and
//!   type conversion
//! - Calculated fields, business rules and KPIs written as expressions
//! - Grouped aggregation and summary statistics
//! - CSV, JSON, Excel workbook, styled text, summary, chart data and metadata outputs
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rust_reporting_pipeline::{
//!     data::{DataSet, Row, SchemaBuilder, Value},
//!     processing::TransformationPipeline,
//!     utils::{LogFacadeSink, TransformConfig},
//! };
//!
//! let schema = SchemaBuilder::new()
//!     .add_string("Product Name", true)
//!     .add_integer("Sales Amount", true)
//!     .build();
//!
//! let mut dataset = DataSet::new(schema);
//! dataset.add_row(Row::new(vec!["Widget".into(), Value::Integer(100)])).unwrap();
//! dataset.add_row(Row::new(vec!["Widget".into(), Value::Integer(100)])).unwrap();
//! dataset.add_row(Row::new(vec!["Gadget".into(), Value::Null])).unwrap();
//!
//! let mut pipeline = TransformationPipeline::new(&TransformConfig::default(), LogFacadeSink::shared());
//! let result = pipeline.transform(dataset).unwrap();
//!
//! assert_eq!(result.column_names(), vec!["product_name", "sales_amount"]);
//! assert_eq!(result.len(), 2);
//! assert_eq!(pipeline.provenance().last().unwrap().operation, "Complete Transformation Pipeline");
//! ```

pub mod data;
pub mod expression;
pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod processing;
pub mod sample;
pub mod utils;

// Re-export main types
pub use data::{DataSet, DataType, Field, Row, Schema, Value};
pub use orchestrator::{PipelineOrchestrator, PipelineResult};
pub use processing::TransformationPipeline;
pub use utils::Config;
