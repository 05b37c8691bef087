// Summary statistics report
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};

use crate::data::{dataset_to_json, value_to_json, DataSet, DataType, Value};
use crate::expression::{Evaluated, Expression};
use crate::processing::{mean, numeric_values, round_to, Aggregate, DataProcessor, ProcessContext};
use crate::utils::{LogSink, SummaryConfig};

const TARGET: &str = "summary";

/// Columns added by extraction, left out of categorical statistics
const SOURCE_COLUMNS: &[&str] = &["source_file", "source_path"];

/// Categorical columns with at most this many distinct values get a top value
const TOP_VALUE_LIMIT: usize = 10;

fn numeric_summary(table: &DataSet, idx: usize) -> JsonValue {
    let column: Vec<&Value> = table.column_values(idx).collect();
    let present = || column.iter().copied().filter(|v| !v.is_null());

    let total = if table.schema.fields[idx].data_type == DataType::Integer {
        present()
            .try_fold(0i64, |acc, v| match v {
                Value::Integer(i) => acc.checked_add(*i),
                _ => None,
            })
            .map_or_else(|| json!(numeric_values(table, idx).iter().sum::<f64>()), |t| json!(t))
    } else {
        json!(numeric_values(table, idx).iter().sum::<f64>())
    };

    let average = mean(&numeric_values(table, idx)).map(|m| round_to(m, 2));
    let max = present().max_by(|a, b| a.total_cmp(b)).map_or(JsonValue::Null, value_to_json);
    let min = present().min_by(|a, b| a.total_cmp(b)).map_or(JsonValue::Null, value_to_json);

    json!({
        "total": total,
        "average": average,
        "max": max,
        "min": min,
    })
}

fn categorical_summary(table: &DataSet, idx: usize) -> JsonValue {
    let mut order: Vec<&Value> = Vec::new();
    let mut counts: HashMap<&Value, usize> = HashMap::new();
    for value in table.column_values(idx).filter(|v| !v.is_null()) {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut summary = Map::new();
    summary.insert("unique_values".to_string(), json!(order.len()));
    if !order.is_empty() && order.len() <= TOP_VALUE_LIMIT {
        // first-seen wins ties
        let mut top = order[0];
        for &value in &order {
            if counts[value] > counts[top] {
                top = value;
            }
        }
        summary.insert("top_value".to_string(), value_to_json(top));
    }
    JsonValue::Object(summary)
}

/// Evaluate a custom KPI formula: a scalar result is reported as is, a
/// column result is totalled
fn custom_kpi(table: &DataSet, formula: &str) -> Result<JsonValue, String> {
    let evaluated = Expression::parse(formula)
        .and_then(|expr| expr.evaluate(table))
        .map_err(|e| e.to_string())?;

    match evaluated {
        Evaluated::Scalar(value) => Ok(value_to_json(&value)),
        Evaluated::Column(values) => {
            let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
            if numbers.is_empty() && values.iter().any(|v| !v.is_null()) {
                return Err("formula does not produce numbers".to_string());
            }
            Ok(json!(numbers.iter().sum::<f64>()))
        }
    }
}

/// Build the summary report of a table
pub fn build_summary(table: &DataSet, config: &SummaryConfig, log: Arc<dyn LogSink>) -> JsonValue {
    let mut numeric = Map::new();
    let mut categorical = Map::new();

    for (idx, field) in table.schema.fields.iter().enumerate() {
        if field.data_type.is_numeric() {
            numeric.insert(field.name.clone(), numeric_summary(table, idx));
        } else if field.data_type.is_textual() && !SOURCE_COLUMNS.contains(&field.name.as_str()) {
            categorical.insert(field.name.clone(), categorical_summary(table, idx));
        }
    }

    let mut kpis = Map::new();
    for (name, formula) in &config.custom_kpis {
        match custom_kpi(table, formula) {
            Ok(value) => {
                kpis.insert(name.clone(), value);
            }
            Err(err) => log.warn(
                TARGET,
                &format!("Failed to calculate custom KPI {}: {}", name, err),
            ),
        }
    }

    let mut report = json!({
        "total_rows": table.len(),
        "total_columns": table.schema.fields.len(),
        "missing_values": table.missing_count(),
        "numeric_columns": numeric,
        "categorical_columns": categorical,
        "custom_kpis": kpis,
    });

    if let Some(grouped) = aggregated_table(table, config, log) {
        report["aggregated"] = dataset_to_json(&grouped);
    }

    report
}

/// The grouped rows of the summary, when `group_by` is configured. A failed
/// aggregation is logged and yields `None`.
pub fn aggregated_table(table: &DataSet, config: &SummaryConfig, log: Arc<dyn LogSink>) -> Option<DataSet> {
    if config.group_by.is_empty() {
        return None;
    }

    let step = Aggregate::new(config.group_by.clone(), config.aggregations.clone());
    let mut ctx = ProcessContext::new(Arc::clone(&log), TARGET);
    match step.process(table.clone(), &mut ctx) {
        Ok(grouped) => Some(grouped),
        Err(err) => {
            log.warn(TARGET, &format!("Failed to aggregate summary data: {}", err));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, SchemaBuilder};
    use crate::processing::{AggregateFunction, AggregationSpec};
    use crate::utils::MemorySink;

    fn table() -> DataSet {
        let schema = SchemaBuilder::new()
            .add_string("region", true)
            .add_integer("units", true)
            .add_float("price", true)
            .add_string("source_file", false)
            .build();
        let rows = vec![
            ("North", Some(3), 2.0),
            ("South", None, 4.0),
            ("North", Some(2), 1.333),
        ];
        DataSet::with_rows(
            schema,
            rows.into_iter()
                .map(|(r, u, p)| Row::new(vec![r.into(), Value::from(u), Value::Float(p), "a.csv".into()]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_basic_statistics() {
        let sink = Arc::new(MemorySink::new());
        let report = build_summary(&table(), &SummaryConfig::default(), sink);

        assert_eq!(report["total_rows"], 3);
        assert_eq!(report["total_columns"], 4);
        assert_eq!(report["missing_values"], 1);
        assert_eq!(report["numeric_columns"]["units"]["total"], 5);
        assert_eq!(report["numeric_columns"]["units"]["max"], 3);
        assert_eq!(report["numeric_columns"]["price"]["average"], 2.44);
        assert_eq!(report["categorical_columns"]["region"]["unique_values"], 2);
        assert_eq!(report["categorical_columns"]["region"]["top_value"], "North");
        assert!(report["categorical_columns"].get("source_file").is_none());
        assert!(report.get("aggregated").is_none());
    }

    #[test]
    fn test_custom_kpis_and_grouping() {
        let config = SummaryConfig {
            custom_kpis: vec![
                ("revenue".to_string(), "units * price".to_string()),
                ("peak".to_string(), "max(price)".to_string()),
                ("broken".to_string(), "nope + 1".to_string()),
            ],
            group_by: vec!["region".to_string()],
            aggregations: vec![(
                "units".to_string(),
                AggregationSpec::Single(AggregateFunction::Sum),
            )],
        };
        let sink = Arc::new(MemorySink::new());
        let report = build_summary(&table(), &config, sink.clone());

        let revenue = report["custom_kpis"]["revenue"].as_f64().unwrap();
        assert!((revenue - 8.666).abs() < 1e-9);
        assert_eq!(report["custom_kpis"]["peak"], 4.0);
        assert!(report["custom_kpis"].get("broken").is_none());
        assert_eq!(sink.warnings().len(), 1);

        let groups = report["aggregated"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["region"], "North");
    }
}
