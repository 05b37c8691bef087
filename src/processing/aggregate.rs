// Aggregate operations for data processing
// Author: Gabriel Demetrios Lafis

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{DataSet, DataType, Field, Row, Schema, Value};

use super::stats;
use super::{DataProcessor, ProcessContext, ProcessingError, ProcessorType};

/// Represents an aggregation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregateFunction {
    Sum,
    Mean,
    /// Present values
    Count,
    /// All rows, missing included
    Size,
    Min,
    Max,
    Median,
    Std,
    NUnique,
    First,
    Last,
}

impl AggregateFunction {
    /// Get the name of the aggregation function
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Mean => "mean",
            AggregateFunction::Count => "count",
            AggregateFunction::Size => "size",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Median => "median",
            AggregateFunction::Std => "std",
            AggregateFunction::NUnique => "nunique",
            AggregateFunction::First => "first",
            AggregateFunction::Last => "last",
        }
    }

    fn needs_numeric(&self) -> bool {
        matches!(
            self,
            AggregateFunction::Sum
                | AggregateFunction::Mean
                | AggregateFunction::Median
                | AggregateFunction::Std
        )
    }

    /// Get the output data type of the aggregation function
    pub fn output_type(&self, input_type: DataType) -> DataType {
        match self {
            AggregateFunction::Sum => match input_type {
                DataType::Integer | DataType::Boolean => DataType::Integer,
                _ => DataType::Float,
            },
            AggregateFunction::Mean | AggregateFunction::Median | AggregateFunction::Std => {
                DataType::Float
            }
            AggregateFunction::Count | AggregateFunction::Size | AggregateFunction::NUnique => {
                DataType::Integer
            }
            AggregateFunction::Min
            | AggregateFunction::Max
            | AggregateFunction::First
            | AggregateFunction::Last => input_type,
        }
    }

    /// Apply the function to the values of one group
    pub fn apply(&self, values: &[&Value]) -> Value {
        let present = || values.iter().copied().filter(|v| !v.is_null());
        let numbers = || {
            present()
                .filter_map(|v| match v {
                    Value::Boolean(b) => Some(f64::from(u8::from(*b))),
                    other => other.as_f64(),
                })
                .collect::<Vec<f64>>()
        };

        match self {
            AggregateFunction::Sum => {
                let mut int_sum: Option<i64> = Some(0);
                for v in present() {
                    int_sum = match v {
                        Value::Integer(i) => int_sum.and_then(|s| s.checked_add(*i)),
                        Value::Boolean(b) => int_sum.map(|s| s + i64::from(*b)),
                        _ => None,
                    };
                }
                int_sum.map_or_else(|| Value::Float(numbers().iter().sum()), Value::Integer)
            }
            AggregateFunction::Mean => stats::mean(&numbers()).map_or(Value::Null, Value::Float),
            AggregateFunction::Median => stats::median(&numbers()).map_or(Value::Null, Value::Float),
            AggregateFunction::Std => stats::std_dev(&numbers()).map_or(Value::Null, Value::Float),
            AggregateFunction::Count => Value::Integer(present().count() as i64),
            AggregateFunction::Size => Value::Integer(values.len() as i64),
            AggregateFunction::NUnique => {
                Value::Integer(present().collect::<HashSet<_>>().len() as i64)
            }
            AggregateFunction::Min => present()
                .min_by(|a, b| a.total_cmp(b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateFunction::Max => present()
                .max_by(|a, b| a.total_cmp(b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateFunction::First => present().next().cloned().unwrap_or(Value::Null),
            AggregateFunction::Last => present().last().cloned().unwrap_or(Value::Null),
        }
    }
}

impl TryFrom<String> for AggregateFunction {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        match name.trim().to_lowercase().as_str() {
            "sum" => Ok(AggregateFunction::Sum),
            "mean" | "avg" | "average" => Ok(AggregateFunction::Mean),
            "count" => Ok(AggregateFunction::Count),
            "size" => Ok(AggregateFunction::Size),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            "median" => Ok(AggregateFunction::Median),
            "std" => Ok(AggregateFunction::Std),
            "nunique" => Ok(AggregateFunction::NUnique),
            "first" => Ok(AggregateFunction::First),
            "last" => Ok(AggregateFunction::Last),
            _ => Err(format!("unknown aggregation function '{}'", name)),
        }
    }
}

impl From<AggregateFunction> for String {
    fn from(function: AggregateFunction) -> Self {
        function.name().to_string()
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The aggregations requested for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationSpec {
    /// One function; the output keeps the column name
    Single(AggregateFunction),
    /// Several functions; outputs are named `{column}_{function}`
    Many(Vec<AggregateFunction>),
}

impl AggregationSpec {
    /// Output column names paired with their functions
    fn outputs(&self, column: &str, group_by: &[String]) -> Vec<(String, AggregateFunction)> {
        match self {
            AggregationSpec::Single(function) => {
                let name = if group_by.iter().any(|g| g == column) {
                    format!("{}_{}", column, function)
                } else {
                    column.to_string()
                };
                vec![(name, *function)]
            }
            AggregationSpec::Many(functions) => functions
                .iter()
                .map(|function| (format!("{}_{}", column, function), *function))
                .collect(),
        }
    }
}

/// Group rows by the values of `group_by` and aggregate the requested
/// columns. Missing keys form their own group; output rows are ordered by
/// group key.
pub fn aggregate(
    input: &DataSet,
    group_by: &[String],
    aggregations: &[(String, AggregationSpec)],
) -> Result<DataSet, ProcessingError> {
    if group_by.is_empty() {
        return Err(ProcessingError::InvalidArgument(
            "aggregation needs at least one group-by column".to_string(),
        ));
    }

    let group_indices: Vec<usize> = group_by
        .iter()
        .map(|c| input.require_column(c))
        .collect::<Result<_, _>>()?;

    // (source column, output name, function)
    let mut outputs: Vec<(usize, String, AggregateFunction)> = Vec::new();
    for (column, spec) in aggregations {
        let idx = input.require_column(column)?;
        let data_type = input.schema.fields[idx].data_type;
        for (name, function) in spec.outputs(column, group_by) {
            if function.needs_numeric() && !(data_type.is_numeric() || data_type == DataType::Boolean) {
                return Err(ProcessingError::InvalidArgument(format!(
                    "cannot compute {} of non-numeric column '{}'",
                    function, column
                )));
            }
            outputs.push((idx, name, function));
        }
    }

    let mut groups: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    let mut keys: Vec<Vec<Value>> = Vec::new();
    for (i, row) in input.data.iter().enumerate() {
        let key: Vec<Value> = group_indices.iter().map(|&g| row.values[g].clone()).collect();
        groups
            .entry(key)
            .or_insert_with_key(|key| {
                keys.push(key.clone());
                Vec::new()
            })
            .push(i);
    }

    keys.sort_by(|a, b| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut fields: Vec<Field> = group_indices
        .iter()
        .map(|&g| input.schema.fields[g].clone())
        .collect();
    for (idx, name, function) in &outputs {
        let input_type = input.schema.fields[*idx].data_type;
        fields.push(Field::new(name.clone(), function.output_type(input_type), true));
    }

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let members = groups.get(&key).map(Vec::as_slice).unwrap_or_default();
        let mut values = key;
        for (idx, _, function) in &outputs {
            let column: Vec<&Value> = members.iter().map(|&r| &input.data[r].values[*idx]).collect();
            let result = function.apply(&column);
            values.push(function.output_type(input.schema.fields[*idx].data_type).widen_value(result));
        }
        rows.push(Row::new(values));
    }

    Ok(DataSet::with_rows(Schema::new(fields), rows)?)
}

/// Pipeline step wrapping [`aggregate`]
pub struct Aggregate {
    group_by: Vec<String>,
    aggregations: Vec<(String, AggregationSpec)>,
}

impl Aggregate {
    pub fn new(group_by: Vec<String>, aggregations: Vec<(String, AggregationSpec)>) -> Self {
        Aggregate {
            group_by,
            aggregations,
        }
    }
}

impl DataProcessor for Aggregate {
    fn process(&self, input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let mut output = aggregate(&input, &self.group_by, &self.aggregations)?;
        output.metadata = input.metadata;
        ctx.note(format!(
            "Aggregated data by [{}] into {} groups",
            self.group_by.join(", "),
            output.len()
        ));
        Ok(output)
    }

    fn name(&self) -> &str {
        "Data Aggregation"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Aggregate
    }
}
