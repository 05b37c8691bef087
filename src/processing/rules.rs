// Business rules: conditional assignment and row filtering
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::{coerce_value, DataSet, DataType, Value};
use crate::expression::Expression;

use super::{DataProcessor, ProcessContext, ProcessingError, ProcessorType};

fn unnamed_rule() -> String {
    "Unnamed Rule".to_string()
}

/// A conditional mutation, as written in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRule {
    #[serde(default = "unnamed_rule")]
    pub name: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub action: String,
}

impl BusinessRule {
    pub fn new(name: &str, condition: &str, action: &str) -> Self {
        BusinessRule {
            name: name.to_string(),
            condition: condition.to_string(),
            action: action.to_string(),
        }
    }
}

/// What a rule does to the rows matching its condition
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Assign { column: String, value: Value },
    Drop,
}

impl RuleAction {
    /// Parse `drop`, `drop_rows`, `set_<column>=<literal>` or
    /// `set <column> = <literal>`
    pub fn parse(action: &str) -> Result<Self, String> {
        let action = action.trim();
        let lowered = action.to_lowercase();

        if lowered == "drop" || lowered == "drop_rows" {
            return Ok(RuleAction::Drop);
        }

        let assignment = if lowered.starts_with("set_") || lowered.starts_with("set ") {
            &action[4..]
        } else {
            return Err(format!("unrecognized action '{}'", action));
        };

        let (column, literal) = assignment
            .split_once('=')
            .ok_or_else(|| format!("assignment '{}' has no '='", action))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(format!("assignment '{}' names no column", action));
        }

        Ok(RuleAction::Assign {
            column: column.to_string(),
            value: parse_literal(literal),
        })
    }
}

/// Interpret the right-hand side of an assignment
pub fn parse_literal(text: &str) -> Value {
    let text = text.trim();

    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return Value::String(text[1..text.len() - 1].to_string());
        }
    }

    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }

    match text.to_lowercase().as_str() {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "null" | "none" => Value::Null,
        _ => Value::String(text.to_string()),
    }
}

/// Set `column` to `value` on the rows selected by `mask`
fn assign(dataset: &mut DataSet, column: &str, value: &Value, mask: &[bool]) -> Result<(), ProcessingError> {
    match dataset.column_index(column) {
        Some(idx) => {
            let current = dataset.schema.fields[idx].data_type;
            let (data_type, fill) = match coerce_value(value, current) {
                Ok(fill) => (current, fill),
                Err(_) => (DataType::String, DataType::String.widen_value(value.clone())),
            };
            let values = dataset
                .column_values(idx)
                .zip(mask)
                .map(|(old, &hit)| {
                    if hit {
                        fill.clone()
                    } else {
                        data_type.widen_value(old.clone())
                    }
                })
                .collect();
            dataset.replace_column(idx, data_type, values)?;
        }
        None => {
            let data_type = value.data_type().unwrap_or(DataType::String);
            let values = mask
                .iter()
                .map(|&hit| if hit { value.clone() } else { Value::Null })
                .collect();
            dataset.set_column(column, data_type, values)?;
        }
    }
    Ok(())
}

/// Applies rules in order; each rule sees the effects of the ones before
/// it. A malformed rule is skipped with a warning.
pub struct ApplyRules {
    rules: Vec<BusinessRule>,
}

impl ApplyRules {
    pub fn new(rules: Vec<BusinessRule>) -> Self {
        ApplyRules { rules }
    }

    fn apply(&self, dataset: &mut DataSet, rule: &BusinessRule) -> Result<(), ProcessingError> {
        if rule.condition.trim().is_empty() {
            return Err(ProcessingError::InvalidArgument("rule has no condition".to_string()));
        }

        let action = RuleAction::parse(&rule.action).map_err(ProcessingError::InvalidArgument)?;
        let mask = Expression::parse(&rule.condition)?.evaluate_mask(dataset)?;

        match action {
            RuleAction::Drop => {
                let keep: Vec<bool> = mask.iter().map(|hit| !hit).collect();
                dataset.retain_rows(&keep);
            }
            RuleAction::Assign { column, value } => assign(dataset, &column, &value, &mask)?,
        }
        Ok(())
    }
}

impl DataProcessor for ApplyRules {
    fn process(&self, mut input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let mut applied = Vec::new();

        for rule in &self.rules {
            match self.apply(&mut input, rule) {
                Ok(()) => applied.push(rule.name.as_str()),
                Err(err) => ctx.warn(&format!("Failed to apply business rule {}: {}", rule.name, err)),
            }
        }

        ctx.note(format!(
            "Applied {} rules: {}",
            applied.len(),
            applied.join(", ")
        ));
        Ok(input)
    }

    fn name(&self) -> &str {
        "Business Rules Application"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::BusinessRules
    }
}
