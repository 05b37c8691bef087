// Duplicate row removal
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{DataError, DataSet, Value};
use crate::utils::ConfigScalar;

use super::{DataProcessor, ProcessContext, ProcessingError, ProcessorType};

/// Which member of a duplicate group survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigScalar", into = "ConfigScalar")]
pub enum KeepPolicy {
    First,
    Last,
    /// Drop every member of a duplicate group
    None,
}

impl Default for KeepPolicy {
    fn default() -> Self {
        KeepPolicy::First
    }
}

impl TryFrom<ConfigScalar> for KeepPolicy {
    type Error = String;

    fn try_from(scalar: ConfigScalar) -> Result<Self, Self::Error> {
        match scalar {
            ConfigScalar::Text(text) => match text.to_lowercase().as_str() {
                "first" => Ok(KeepPolicy::First),
                "last" => Ok(KeepPolicy::Last),
                "none" | "false" => Ok(KeepPolicy::None),
                _ => Err(format!("unknown keep policy '{}'", text)),
            },
            ConfigScalar::Bool(false) => Ok(KeepPolicy::None),
            other => Err(format!("unknown keep policy {:?}", other)),
        }
    }
}

impl From<KeepPolicy> for ConfigScalar {
    fn from(policy: KeepPolicy) -> Self {
        let name = match policy {
            KeepPolicy::First => "first",
            KeepPolicy::Last => "last",
            KeepPolicy::None => "none",
        };
        ConfigScalar::Text(name.to_string())
    }
}

/// Remove duplicate rows.
///
/// Rows are duplicates when they agree on `key_columns` (all columns when
/// `None` or empty). Retained rows keep their relative order. Returns the reduced
/// dataset and the number of rows removed.
pub fn remove_duplicates(
    mut dataset: DataSet,
    key_columns: Option<&[String]>,
    keep: KeepPolicy,
) -> Result<(DataSet, usize), DataError> {
    let keys: Vec<usize> = match key_columns {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|c| dataset.require_column(c))
            .collect::<Result<_, _>>()?,
        _ => (0..dataset.schema.fields.len()).collect(),
    };

    let key_of = |values: &[Value]| -> Vec<Value> { keys.iter().map(|&i| values[i].clone()).collect() };

    let mut first_seen: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut last_seen: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut group_size: HashMap<Vec<Value>, usize> = HashMap::new();
    let row_keys: Vec<Vec<Value>> = dataset.data.iter().map(|row| key_of(&row.values)).collect();

    for (i, key) in row_keys.iter().enumerate() {
        first_seen.entry(key.clone()).or_insert(i);
        last_seen.insert(key.clone(), i);
        *group_size.entry(key.clone()).or_insert(0) += 1;
    }

    let keep_mask: Vec<bool> = row_keys
        .iter()
        .enumerate()
        .map(|(i, key)| match keep {
            KeepPolicy::First => first_seen.get(key) == Some(&i),
            KeepPolicy::Last => last_seen.get(key) == Some(&i),
            KeepPolicy::None => group_size.get(key) == Some(&1),
        })
        .collect();

    let before = dataset.len();
    dataset.retain_rows(&keep_mask);
    let removed = before - dataset.len();
    Ok((dataset, removed))
}

/// Pipeline step wrapping [`remove_duplicates`]
pub struct Deduplicate {
    subset: Option<Vec<String>>,
    keep: KeepPolicy,
}

impl Deduplicate {
    pub fn new(subset: Option<Vec<String>>, keep: KeepPolicy) -> Self {
        Deduplicate { subset, keep }
    }
}

impl DataProcessor for Deduplicate {
    fn process(&self, input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let (output, removed) = remove_duplicates(input, self.subset.as_deref(), self.keep)?;
        ctx.note(format!("Removed {} duplicate rows", removed));
        Ok(output)
    }

    fn name(&self) -> &str {
        "Duplicate Removal"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Deduplicate
    }
}
