// Transformation benchmarks
// Author: Gabriel Demetrios Lafis

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rust_reporting_pipeline::{
    expression::Expression,
    processing::{aggregate, AggregateFunction, AggregationSpec, BusinessRule, KpiKind, TransformationPipeline},
    sample,
    utils::{MemorySink, TransformConfig},
};

fn transform_config() -> TransformConfig {
    let mut config = TransformConfig::default();
    config.calculations = vec![(
        "net_amount".to_string(),
        "total_amount * (1 - discount_percent / 100)".to_string(),
    )];
    config.business_rules = vec![BusinessRule::new(
        "High value",
        "total_amount > 2000",
        "set_segment = 'high'",
    )];
    config.kpi_config = vec![(
        "amount_per_unit".to_string(),
        KpiKind::Ratio {
            numerator: "total_amount".to_string(),
            denominator: "quantity".to_string(),
        },
    )];
    config
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let config = transform_config();

    for records in [1_000usize, 10_000] {
        let data = sample::sales_data(&mut StdRng::seed_from_u64(42), records);
        group.bench_with_input(BenchmarkId::from_parameter(records), &data, |b, data| {
            b.iter(|| {
                let mut pipeline = TransformationPipeline::new(&config, Arc::new(MemorySink::new()));
                black_box(pipeline.transform(data.clone()).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_expression(c: &mut Criterion) {
    let data = sample::sales_data(&mut StdRng::seed_from_u64(7), 10_000);
    let expr = Expression::parse("Quantity * Unit_Price > 500 and Region == 'North'").unwrap();

    c.bench_function("evaluate_mask", |b| {
        b.iter(|| black_box(expr.evaluate_mask(&data).unwrap()))
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let data = sample::sales_data(&mut StdRng::seed_from_u64(11), 10_000);
    let group_by = vec!["Region".to_string(), "Product_Category".to_string()];
    let aggregations = vec![(
        "Total_Amount".to_string(),
        AggregationSpec::Many(vec![AggregateFunction::Sum, AggregateFunction::Mean]),
    )];

    c.bench_function("aggregate", |b| {
        b.iter(|| black_box(aggregate(&data, &group_by, &aggregations).unwrap()))
    });
}

criterion_group!(benches, bench_transform, bench_expression, bench_aggregate);
criterion_main!(benches);
