// Simple pipeline example
// Author: Gabriel Demetrios Lafis

use rust_reporting_pipeline::{
    data::{DataSet, DataType, Field, Row, Schema, Value},
    load::render_table,
    processing::{
        ApplyRules, BusinessRule, CalculateKpis, CalculatedFields, Deduplicate, KeepPolicy, KpiKind,
        NameCollision, ResolveMissing, StandardizeNames, TransformationPipeline,
    },
    utils::{init_logging, LogFacadeSink},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(log::LevelFilter::Warn, None)?;

    // Create a schema
    let schema = Schema::new(vec![
        Field::new("Order ID".to_string(), DataType::Integer, false),
        Field::new("Region".to_string(), DataType::String, true),
        Field::new("Units Sold".to_string(), DataType::Integer, true),
        Field::new("Unit Price".to_string(), DataType::Float, true),
        Field::new("Month".to_string(), DataType::String, false),
    ]);

    // Create a dataset
    let mut dataset = DataSet::new(schema);
    dataset.add_row(Row::new(vec![
        Value::Integer(1),
        "North".into(),
        Value::Integer(12),
        Value::Float(9.5),
        "2024-01".into(),
    ]))?;
    dataset.add_row(Row::new(vec![
        Value::Integer(2),
        Value::Null,
        Value::Integer(4),
        Value::Float(20.0),
        "2024-02".into(),
    ]))?;
    dataset.add_row(Row::new(vec![
        Value::Integer(2),
        Value::Null,
        Value::Integer(4),
        Value::Float(20.0),
        "2024-02".into(),
    ]))?;
    dataset.add_row(Row::new(vec![
        Value::Integer(3),
        "South".into(),
        Value::Integer(30),
        Value::Null,
        "2024-03".into(),
    ]))?;

    println!("Original dataset:");
    println!("{}", render_table(&dataset));

    // Create a pipeline
    let mut pipeline = TransformationPipeline::empty(LogFacadeSink::shared())
        .add(StandardizeNames::new(NameCollision::Overwrite))
        .add(ResolveMissing::new(Vec::new()))
        .add(Deduplicate::new(None, KeepPolicy::First))
        .add(CalculatedFields::new(vec![(
            "revenue".to_string(),
            "units_sold * unit_price".to_string(),
        )]))
        .add(ApplyRules::new(vec![BusinessRule::new(
            "Bulk orders",
            "units_sold >= 10",
            "set_tier = 'bulk'",
        )]))
        .add(CalculateKpis::new(vec![(
            "revenue_growth".to_string(),
            KpiKind::Growth {
                base_column: "revenue".to_string(),
                period_column: "month".to_string(),
            },
        )]));

    let result = pipeline.transform(dataset)?;

    println!("\nProcessed dataset:");
    println!("{}", render_table(&result));

    println!("\nProvenance:");
    for entry in pipeline.provenance() {
        println!(
            "  {:<32} {:?} -> {:?}  {}",
            entry.operation, entry.shape_before, entry.shape_after, entry.details
        );
    }

    Ok(())
}

