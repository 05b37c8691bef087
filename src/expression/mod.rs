// Constrained formula language over dataset columns
// Author: Gabriel Demetrios Lafis

//! Formulas used by calculated fields, KPIs and business rules.
//!
//! A formula is parsed into an [`Expr`] tree over a closed grammar: column
//! references, literals, arithmetic, comparison and boolean operators, and the
//! reductions `sum`, `mean`, `max`, `min` and `count`. Anything else
//! (assignment, attribute access, `@` locals, unknown functions) is rejected
//! at parse time, so evaluating a formula can never reach outside the
//! dataset it is given.
//!
//! ```
//! use rust_reporting_pipeline::data::{DataSet, SchemaBuilder, Row, Value};
//! use rust_reporting_pipeline::expression::{Evaluated, Expression};
//!
//! let schema = SchemaBuilder::new().add_integer("qty", false).add_float("price", false).build();
//! let ds = DataSet::with_rows(schema, vec![
//!     Row::new(vec![Value::Integer(2), Value::Float(1.5)]),
//!     Row::new(vec![Value::Integer(4), Value::Float(0.5)]),
//! ]).unwrap();
//!
//! let revenue = Expression::parse("qty * price").unwrap().evaluate(&ds).unwrap();
//! assert_eq!(revenue, Evaluated::Column(vec![Value::Float(3.0), Value::Float(2.0)]));
//!
//! let total = Expression::parse("sum(qty * price)").unwrap().evaluate(&ds).unwrap();
//! assert_eq!(total, Evaluated::Scalar(Value::Float(5.0)));
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::*;
pub use lexer::{Lexer, Token};
pub use parser::*;

use thiserror::Error;

use crate::data::DataSet;

/// Errors raised while parsing or evaluating a formula
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Operation not allowed: {0}")]
    DisallowedOperation(String),
    #[error("Type error: {0}")]
    TypeMismatch(String),
}

impl ExpressionError {
    pub(crate) fn syntax<S: Into<String>>(position: usize, message: S) -> Self {
        ExpressionError::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// A parsed formula together with its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse a formula
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = Lexer::new(source).tokenize()?;
        let root = Parser::new(tokens).parse()?;
        Ok(Expression {
            source: source.to_string(),
            root,
        })
    }

    /// The formula as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed tree
    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Evaluate the formula against a dataset
    pub fn evaluate(&self, dataset: &DataSet) -> Result<Evaluated, ExpressionError> {
        Evaluator::new(dataset).eval(&self.root)
    }

    /// Evaluate the formula as a row filter. Missing results count as `false`.
    pub fn evaluate_mask(&self, dataset: &DataSet) -> Result<Vec<bool>, ExpressionError> {
        self.evaluate(dataset)?.into_mask(dataset.len())
    }
}
