// Key performance indicator computation
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::{DataSet, DataType, Value};
use crate::expression::{Expression, ExpressionError};

use super::{DataProcessor, ProcessContext, ProcessingError, ProcessorType};

/// How a KPI column is computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawKpi", into = "RawKpi")]
pub enum KpiKind {
    /// A formula evaluated per row
    Simple { formula: String },
    /// Percent change of `base_column` from the previous row, ordered by `period_column`
    Growth {
        base_column: String,
        period_column: String,
    },
    /// `numerator / denominator`, row by row
    Ratio {
        numerator: String,
        denominator: String,
    },
    /// Running sum of `base_column` in row order
    Cumulative { base_column: String },
}

/// Document form of a KPI entry. `type` defaults to `simple`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawKpi {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    period_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    numerator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    denominator: Option<String>,
}

impl TryFrom<RawKpi> for KpiKind {
    type Error = String;

    fn try_from(raw: RawKpi) -> Result<Self, Self::Error> {
        let kind = raw.kind.unwrap_or_else(|| "simple".to_string());
        let required = |field: Option<String>, name: &str| {
            field
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("{} KPI requires '{}'", kind, name))
        };

        match kind.as_str() {
            "simple" => Ok(KpiKind::Simple {
                formula: required(raw.formula, "formula")?,
            }),
            "growth" => Ok(KpiKind::Growth {
                base_column: required(raw.base_column, "base_column")?,
                period_column: required(raw.period_column, "period_column")?,
            }),
            "ratio" => Ok(KpiKind::Ratio {
                numerator: required(raw.numerator, "numerator")?,
                denominator: required(raw.denominator, "denominator")?,
            }),
            "cumulative" => Ok(KpiKind::Cumulative {
                base_column: required(raw.base_column, "base_column")?,
            }),
            other => Err(format!("unknown KPI type '{}'", other)),
        }
    }
}

impl From<KpiKind> for RawKpi {
    fn from(kind: KpiKind) -> Self {
        match kind {
            KpiKind::Simple { formula } => RawKpi {
                kind: Some("simple".to_string()),
                formula: Some(formula),
                ..RawKpi::default()
            },
            KpiKind::Growth {
                base_column,
                period_column,
            } => RawKpi {
                kind: Some("growth".to_string()),
                base_column: Some(base_column),
                period_column: Some(period_column),
                ..RawKpi::default()
            },
            KpiKind::Ratio {
                numerator,
                denominator,
            } => RawKpi {
                kind: Some("ratio".to_string()),
                numerator: Some(numerator),
                denominator: Some(denominator),
                ..RawKpi::default()
            },
            KpiKind::Cumulative { base_column } => RawKpi {
                kind: Some("cumulative".to_string()),
                base_column: Some(base_column),
                ..RawKpi::default()
            },
        }
    }
}

/// Percent change from the previous value. The first value, missing
/// operands and a zero predecessor all yield `Null`.
pub fn growth(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let previous = if i == 0 { None } else { values[i - 1].as_f64() };
        let change = match (previous, value.as_f64()) {
            (Some(prev), Some(current)) if prev != 0.0 => {
                Value::Float((current - prev) / prev * 100.0)
            }
            _ => Value::Null,
        };
        out.push(change);
    }
    out
}

/// Elementwise quotient; a zero or missing denominator yields `Null`
pub fn ratio(numerators: &[Value], denominators: &[Value]) -> Vec<Value> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(n, d)| match (n.as_f64(), d.as_f64()) {
            (Some(n), Some(d)) if d != 0.0 => Value::Float(n / d),
            _ => Value::Null,
        })
        .collect()
}

/// Running sum. Missing cells stay missing while the total carries on.
pub fn cumulative(values: &[Value]) -> Vec<Value> {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;

    values
        .iter()
        .map(|value| match value {
            Value::Integer(i) => {
                int_total = int_total.and_then(|t| t.checked_add(*i));
                float_total += *i as f64;
                int_total.map_or(Value::Float(float_total), Value::Integer)
            }
            other => match other.as_f64() {
                Some(f) => {
                    int_total = None;
                    float_total += f;
                    Value::Float(float_total)
                }
                None => Value::Null,
            },
        })
        .collect()
}

fn numeric_column(dataset: &DataSet, column: &str) -> Result<usize, ProcessingError> {
    let idx = dataset.require_column(column)?;
    let data_type = dataset.schema.fields[idx].data_type;
    if !data_type.is_numeric() {
        return Err(ExpressionError::TypeMismatch(format!(
            "column '{}' is {}, expected a number",
            column, data_type
        ))
        .into());
    }
    Ok(idx)
}

/// Compute one KPI into `dataset`. On error the dataset is unchanged.
pub fn compute_kpi(dataset: &mut DataSet, name: &str, kind: &KpiKind) -> Result<(), ProcessingError> {
    match kind {
        KpiKind::Simple { formula } => {
            let evaluated = Expression::parse(formula)?.evaluate(dataset)?;
            let (data_type, values) = evaluated.into_typed_column(dataset.len());
            dataset.set_column(name, data_type, values)?;
        }
        KpiKind::Growth {
            base_column,
            period_column,
        } => {
            let base = numeric_column(dataset, base_column)?;
            let period = dataset.require_column(period_column)?;

            let mut order: Vec<usize> = (0..dataset.len()).collect();
            order.sort_by(|&a, &b| {
                dataset.data[a].values[period].total_cmp(&dataset.data[b].values[period])
            });
            dataset.reorder_rows(&order);

            let values: Vec<Value> = dataset.column_values(base).cloned().collect();
            dataset.set_column(name, DataType::Float, growth(&values))?;
        }
        KpiKind::Ratio {
            numerator,
            denominator,
        } => {
            let num = numeric_column(dataset, numerator)?;
            let den = numeric_column(dataset, denominator)?;
            let nums: Vec<Value> = dataset.column_values(num).cloned().collect();
            let dens: Vec<Value> = dataset.column_values(den).cloned().collect();
            dataset.set_column(name, DataType::Float, ratio(&nums, &dens))?;
        }
        KpiKind::Cumulative { base_column } => {
            let base = numeric_column(dataset, base_column)?;
            let values: Vec<Value> = dataset.column_values(base).cloned().collect();
            let running = cumulative(&values);
            let data_type = if running.iter().any(|v| matches!(v, Value::Float(_))) {
                DataType::Float
            } else {
                dataset.schema.fields[base].data_type
            };
            let running = running.into_iter().map(|v| data_type.widen_value(v)).collect();
            dataset.set_column(name, data_type, running)?;
        }
    }
    Ok(())
}

/// Computes the configured KPIs in order. A KPI that cannot be computed is
/// skipped with a single warning naming it.
pub struct CalculateKpis {
    kpis: Vec<(String, KpiKind)>,
}

impl CalculateKpis {
    pub fn new(kpis: Vec<(String, KpiKind)>) -> Self {
        CalculateKpis { kpis }
    }
}

impl DataProcessor for CalculateKpis {
    fn process(&self, mut input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let mut calculated = Vec::new();

        for (name, kind) in &self.kpis {
            match compute_kpi(&mut input, name, kind) {
                Ok(()) => calculated.push(name.as_str()),
                Err(err) => ctx.warn(&format!("Failed to calculate KPI {}: {}", name, err)),
            }
        }

        ctx.note(format!(
            "Calculated {} KPIs: {}",
            calculated.len(),
            calculated.join(", ")
        ));
        Ok(input)
    }

    fn name(&self) -> &str {
        "KPI Calculation"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Kpi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, SchemaBuilder};
    use crate::utils::MemorySink;
    use std::sync::Arc;

    fn monthly() -> DataSet {
        let schema = SchemaBuilder::new()
            .add_string("month", true)
            .add_integer("revenue", true)
            .add_integer("cost", true)
            .build();
        let rows = vec![
            ("2024-03", 150, 0),
            ("2024-01", 100, 50),
            ("2024-02", 0, 25),
        ];
        DataSet::with_rows(
            schema,
            rows.into_iter()
                .map(|(m, r, c)| Row::new(vec![m.into(), Value::Integer(r), Value::Integer(c)]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_growth_helper() {
        let out = growth(&[Value::Integer(100), Value::Integer(150)]);
        assert_eq!(out, vec![Value::Null, Value::Float(50.0)]);
        let out = growth(&[Value::Integer(0), Value::Integer(10), Value::Null, Value::Integer(5)]);
        assert_eq!(out, vec![Value::Null, Value::Null, Value::Null, Value::Null]);
    }

    #[test]
    fn test_growth_sorts_by_period() {
        let mut ds = monthly();
        let kind = KpiKind::Growth {
            base_column: "revenue".to_string(),
            period_column: "month".to_string(),
        };
        compute_kpi(&mut ds, "revenue_growth", &kind).unwrap();
        assert_eq!(
            ds.column("month").unwrap(),
            vec!["2024-01".into(), "2024-02".into(), "2024-03".into()]
        );
        assert_eq!(
            ds.column("revenue_growth").unwrap(),
            vec![Value::Null, Value::Float(-100.0), Value::Null]
        );
    }

    #[test]
    fn test_ratio_zero_denominator_is_missing() {
        let mut ds = monthly();
        let kind = KpiKind::Ratio {
            numerator: "revenue".to_string(),
            denominator: "cost".to_string(),
        };
        compute_kpi(&mut ds, "margin", &kind).unwrap();
        assert_eq!(
            ds.column("margin").unwrap(),
            vec![Value::Null, Value::Float(2.0), Value::Float(0.0)]
        );
    }

    #[test]
    fn test_cumulative_keeps_integers_and_skips_missing() {
        assert_eq!(
            cumulative(&[Value::Integer(1), Value::Null, Value::Integer(2)]),
            vec![Value::Integer(1), Value::Null, Value::Integer(3)]
        );
        assert_eq!(
            cumulative(&[Value::Integer(1), Value::Float(0.5)]),
            vec![Value::Integer(1), Value::Float(1.5)]
        );
    }

    #[test]
    fn test_failed_kpi_warns_once_and_is_absent() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = ProcessContext::new(sink.clone(), "kpi");
        let kpis = vec![
            ("bad".to_string(), KpiKind::Simple { formula: "missing_col * 2".to_string() }),
            ("double".to_string(), KpiKind::Simple { formula: "revenue * 2".to_string() }),
        ];
        let out = CalculateKpis::new(kpis).process(monthly(), &mut ctx).unwrap();
        assert!(out.column("bad").is_none());
        assert!(out.column("double").is_some());
        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("bad"));
    }

    #[test]
    fn test_growth_on_text_leaves_table_unsorted() {
        let mut ds = monthly();
        let before = ds.clone();
        let kind = KpiKind::Growth {
            base_column: "month".to_string(),
            period_column: "revenue".to_string(),
        };
        assert!(compute_kpi(&mut ds, "g", &kind).is_err());
        assert_eq!(ds, before);
    }

    #[test]
    fn test_kpi_kind_from_document() {
        let simple: KpiKind = serde_json::from_str(r#"{"formula": "a + b"}"#).unwrap();
        assert_eq!(simple, KpiKind::Simple { formula: "a + b".to_string() });
        let ratio: KpiKind =
            serde_json::from_str(r#"{"type": "ratio", "numerator": "a", "denominator": "b"}"#).unwrap();
        assert!(matches!(ratio, KpiKind::Ratio { .. }));
        assert!(serde_json::from_str::<KpiKind>(r#"{"type": "growth", "base_column": "a"}"#).is_err());
        assert!(serde_json::from_str::<KpiKind>(r#"{"type": "median"}"#).is_err());
    }

    #[test]
    fn test_simple_kpi_widens_to_one_type() {
        let mut ds = monthly();
        let kind = KpiKind::Simple {
            formula: "2 ** (cost - 25)".to_string(),
        };
        compute_kpi(&mut ds, "scaled", &kind).unwrap();
        assert_eq!(ds.schema.get_field_by_name("scaled").unwrap().data_type, DataType::Float);
        let scaled = ds.column("scaled").unwrap();
        assert!(scaled.iter().all(|v| matches!(v, Value::Float(_))));
        assert_eq!(scaled[1], Value::Float(33554432.0));
    }
}
