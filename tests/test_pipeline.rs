// Pipeline tests
// Author: Gabriel Demetrios Lafis

use std::collections::HashSet;
use std::sync::Arc;

use rust_reporting_pipeline::{
    data::{DataSet, Row, SchemaBuilder, Value},
    processing::{
        aggregate, compute_kpi, growth, ratio, remove_duplicates, AggregateFunction, AggregationSpec,
        BusinessRule, DataProcessor, KeepPolicy, KpiKind, MissingStrategy, NameCollision, ProcessContext,
        ResolveMissing, StandardizeNames, TransformationPipeline,
    },
    utils::{MemorySink, TransformConfig},
};

fn context(sink: &Arc<MemorySink>) -> ProcessContext {
    ProcessContext::new(sink.clone(), "test")
}

fn product_sales() -> DataSet {
    let schema = SchemaBuilder::new()
        .add_string("Product Name", true)
        .add_integer("Sales Amount", true)
        .build();
    DataSet::with_rows(
        schema,
        vec![
            Row::new(vec!["Widget".into(), Value::Integer(100)]),
            Row::new(vec!["Widget".into(), Value::Integer(100)]),
            Row::new(vec!["Gadget".into(), Value::Null]),
        ],
    )
    .unwrap()
}

fn regional_sales() -> DataSet {
    let schema = SchemaBuilder::new()
        .add_string("region", true)
        .add_string("channel", true)
        .add_integer("units", true)
        .add_string("month", true)
        .build();
    let rows = vec![
        ("North", "web", 5, "2024-02"),
        ("South", "store", 3, "2024-01"),
        ("North", "store", 2, "2024-03"),
        ("North", "web", 7, "2024-04"),
        ("East", "web", 1, "2024-05"),
        ("South", "store", 4, "2024-06"),
    ];
    DataSet::with_rows(
        schema,
        rows.into_iter()
            .map(|(r, c, u, m)| Row::new(vec![r.into(), c.into(), Value::Integer(u), m.into()]))
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_standardize_names_is_idempotent() {
    let schema = SchemaBuilder::new()
        .add_string("  Sales Amount ", true)
        .add_string("Product-Name", true)
        .add_string("Région__Code", true)
        .add_string("%%", true)
        .add_string("Q1 (2024)", true)
        .build();
    let table = DataSet::with_rows(schema, vec![Row::new(vec![Value::Null; 5])]).unwrap();

    let sink = Arc::new(MemorySink::new());
    let step = StandardizeNames::new(NameCollision::Overwrite);
    let once = step.process(table, &mut context(&sink)).unwrap();
    let twice = step.process(once.clone(), &mut context(&sink)).unwrap();

    assert_eq!(
        once.column_names(),
        vec!["sales_amount", "product_name", "r_gion_code", "column_3", "q1_2024"]
    );
    assert_eq!(once.column_names(), twice.column_names());
}

#[test]
fn test_fill_constant_touches_only_its_column() {
    let schema = SchemaBuilder::new()
        .add_string("region", true)
        .add_integer("units", true)
        .build();
    let table = DataSet::with_rows(
        schema,
        vec![
            Row::new(vec![Value::Null, Value::Null]),
            Row::new(vec!["North".into(), Value::Integer(4)]),
            Row::new(vec![Value::Null, Value::Null]),
        ],
    )
    .unwrap();

    let sink = Arc::new(MemorySink::new());
    let step = ResolveMissing::new(vec![
        ("region".to_string(), MissingStrategy::FillConstant("Unknown".into())),
        ("units".to_string(), MissingStrategy::FillConstant(Value::Integer(0))),
    ]);
    let out = step.process(table.clone(), &mut context(&sink)).unwrap();

    let region = out.column("region").unwrap();
    assert!(region.iter().all(|v| !v.is_null()));
    assert_eq!(region[0], Value::from("Unknown"));
    assert_eq!(out.column("units").unwrap(), vec![Value::Integer(0), Value::Integer(4), Value::Integer(0)]);

    let only_region = ResolveMissing::new(vec![(
        "region".to_string(),
        MissingStrategy::FillConstant("Unknown".into()),
    )]);
    let mut complete_units = table.clone();
    for (i, row) in complete_units.data.iter_mut().enumerate() {
        row.values[1] = Value::Integer(i as i64 * 10);
    }
    let out = only_region.process(complete_units.clone(), &mut context(&sink)).unwrap();
    assert_eq!(out.missing_count(), 0);
    assert_eq!(out.column("units"), complete_units.column("units"));
    assert_eq!(out.len(), complete_units.len());
}

#[test]
fn test_remove_duplicates_keep_first_is_idempotent() {
    let table = regional_sales();
    let keys = vec!["region".to_string(), "channel".to_string()];

    let (once, removed) = remove_duplicates(table.clone(), Some(keys.as_slice()), KeepPolicy::First).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(
        once.column("units").unwrap(),
        vec![Value::Integer(5), Value::Integer(3), Value::Integer(2), Value::Integer(1)]
    );

    let (twice, removed_again) = remove_duplicates(once.clone(), Some(keys.as_slice()), KeepPolicy::First).unwrap();
    assert_eq!(removed_again, 0);
    assert_eq!(once, twice);
}

#[test]
fn test_aggregate_has_one_row_per_group_and_counts_every_row() {
    let table = regional_sales();
    let group_by = vec!["region".to_string(), "channel".to_string()];
    let out = aggregate(
        &table,
        &group_by,
        &[(
            "units".to_string(),
            AggregationSpec::Many(vec![AggregateFunction::Count, AggregateFunction::Sum]),
        )],
    )
    .unwrap();

    let distinct: HashSet<(String, String)> = table
        .data
        .iter()
        .map(|row| (row.values[0].to_string(), row.values[1].to_string()))
        .collect();
    assert_eq!(out.len(), distinct.len());

    let count_idx = out.column_index("units_count").unwrap();
    let total: i64 = out
        .column_values(count_idx)
        .map(|v| match v {
            Value::Integer(i) => *i,
            _ => 0,
        })
        .sum();
    assert_eq!(total as usize, table.len());
}

#[test]
fn test_ratio_kpi_zero_denominator_is_missing() {
    let nums = vec![Value::Integer(10), Value::Integer(5), Value::Float(1.5)];
    let dens = vec![Value::Integer(0), Value::Integer(2), Value::Float(0.0)];
    assert_eq!(ratio(&nums, &dens), vec![Value::Null, Value::Float(2.5), Value::Null]);

    let schema = SchemaBuilder::new().add_integer("sales", true).add_integer("visits", true).build();
    let mut table = DataSet::with_rows(
        schema,
        vec![
            Row::new(vec![Value::Integer(10), Value::Integer(0)]),
            Row::new(vec![Value::Integer(10), Value::Integer(0)]),
        ],
    )
    .unwrap();
    compute_kpi(
        &mut table,
        "conversion",
        &KpiKind::Ratio {
            numerator: "sales".to_string(),
            denominator: "visits".to_string(),
        },
    )
    .unwrap();
    assert!(table.column("conversion").unwrap().iter().all(Value::is_null));
}

#[test]
fn test_growth_kpi_in_period_order() {
    assert_eq!(
        growth(&[Value::Integer(100), Value::Integer(150)]),
        vec![Value::Null, Value::Float(50.0)]
    );

    let schema = SchemaBuilder::new().add_string("period", true).add_integer("revenue", true).build();
    let mut table = DataSet::with_rows(
        schema,
        vec![
            Row::new(vec!["2024-02".into(), Value::Integer(150)]),
            Row::new(vec!["2024-01".into(), Value::Integer(100)]),
        ],
    )
    .unwrap();
    compute_kpi(
        &mut table,
        "revenue_growth",
        &KpiKind::Growth {
            base_column: "revenue".to_string(),
            period_column: "period".to_string(),
        },
    )
    .unwrap();

    assert_eq!(table.column("period").unwrap()[0], Value::from("2024-01"));
    assert_eq!(
        table.column("revenue_growth").unwrap(),
        vec![Value::Null, Value::Float(50.0)]
    );
}

#[test]
fn test_end_to_end_cleaning_scenario() {
    let mut config = TransformConfig::default();
    config.missing_strategy = vec![
        ("product_name".to_string(), MissingStrategy::FillConstant("Unknown".into())),
        ("sales_amount".to_string(), MissingStrategy::FillMean),
    ];
    config.keep = KeepPolicy::First;

    let sink = Arc::new(MemorySink::new());
    let mut pipeline = TransformationPipeline::new(&config, sink);
    let out = pipeline.transform(product_sales()).unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out.column_names(), vec!["product_name", "sales_amount"]);
    assert_eq!(
        out.column("product_name").unwrap(),
        vec![Value::from("Widget"), Value::from("Gadget")]
    );
    assert_eq!(out.column("sales_amount").unwrap()[1], Value::Float(100.0));
}

#[test]
fn test_empty_duplicate_subset_compares_whole_rows() {
    let mut config = TransformConfig::default();
    config.duplicate_subset = Some(Vec::new());

    let mut pipeline = TransformationPipeline::new(&config, Arc::new(MemorySink::new()));
    let out = pipeline.transform(product_sales()).unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(
        out.column("product_name").unwrap(),
        vec![Value::from("Widget"), Value::from("Gadget")]
    );
}

#[test]
fn test_drop_rule_end_to_end() {
    let schema = SchemaBuilder::new()
        .add_string("Product Name", true)
        .add_integer("Sales Amount", true)
        .build();
    let table = DataSet::with_rows(
        schema,
        vec![
            Row::new(vec!["Widget".into(), Value::Integer(150)]),
            Row::new(vec!["Gadget".into(), Value::Integer(90)]),
        ],
    )
    .unwrap();

    let mut config = TransformConfig::default();
    config.business_rules = vec![BusinessRule::new("high value", "sales_amount > 100", "drop")];

    let mut pipeline = TransformationPipeline::new(&config, Arc::new(MemorySink::new()));
    let out = pipeline.transform(table).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out.column("sales_amount").unwrap(), vec![Value::Integer(90)]);
}

#[test]
fn test_malformed_kpi_is_skipped_with_one_warning() {
    let mut config = TransformConfig::default();
    config.kpi_config = vec![
        (
            "broken_kpi".to_string(),
            KpiKind::Simple {
                formula: "no_such_column * 2".to_string(),
            },
        ),
        (
            "double_sales".to_string(),
            KpiKind::Simple {
                formula: "sales_amount * 2".to_string(),
            },
        ),
    ];

    let sink = Arc::new(MemorySink::new());
    let mut pipeline = TransformationPipeline::new(&config, sink.clone());
    let out = pipeline.transform(product_sales()).unwrap();

    assert!(out.column_index("broken_kpi").is_none());
    assert!(out.column_index("double_sales").is_some());
    let mentions = sink
        .warnings()
        .iter()
        .filter(|w| w.contains("broken_kpi"))
        .count();
    assert_eq!(mentions, 1);
}
