// Summary workbook: data, statistics, grouped rows and a bar chart
// Author: Gabriel Demetrios Lafis

use std::path::Path;
use std::sync::Arc;

use rust_xlsxwriter::{Chart, ChartType, Workbook, Worksheet, XlsxError};
use serde_json::Value as JsonValue;

use crate::data::{column_width, header_format, write_cell, write_table_sheet, DataSet, JsonSource, Value};
use crate::utils::{LogSink, SummaryConfig};

use super::{aggregated_table, bar_chart, build_summary, LoadError};

const CHART_SHEET: &str = "Charts";

/// Flatten a summary report into metric/value rows. Column statistics
/// follow table order and custom KPIs follow configuration order.
pub fn summary_rows(table: &DataSet, config: &SummaryConfig, report: &JsonValue) -> Vec<(String, Value)> {
    let cell = |json: &JsonValue| JsonSource::json_to_value(json);
    let mut rows = vec![
        ("Total Rows".to_string(), cell(&report["total_rows"])),
        ("Total Columns".to_string(), cell(&report["total_columns"])),
        ("Missing Values".to_string(), cell(&report["missing_values"])),
    ];

    for field in &table.schema.fields {
        let name = &field.name;
        if let Some(stats) = report["numeric_columns"].get(name) {
            for (label, key) in [("Total", "total"), ("Average", "average"), ("Max", "max"), ("Min", "min")] {
                rows.push((format!("{} - {}", name, label), cell(&stats[key])));
            }
        } else if let Some(stats) = report["categorical_columns"].get(name) {
            rows.push((format!("{} - Unique Values", name), cell(&stats["unique_values"])));
            if let Some(top) = stats.get("top_value") {
                rows.push((format!("{} - Top Value", name), cell(top)));
            }
        }
    }

    for (name, _) in &config.custom_kpis {
        if let Some(value) = report["custom_kpis"].get(name) {
            rows.push((name.clone(), cell(value)));
        }
    }
    rows
}

fn write_metric_sheet(sheet: &mut Worksheet, rows: &[(String, Value)]) -> Result<(), XlsxError> {
    let header = header_format();
    sheet.write_with_format(0, 0, "Metric", &header)?;
    sheet.write_with_format(0, 1, "Value", &header)?;

    for (i, (metric, value)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write(row, 0, metric.as_str())?;
        write_cell(sheet, row, 1, value, None)?;
    }

    sheet.set_column_width(0, column_width("Metric", rows.iter().map(|(m, _)| m.clone())))?;
    sheet.set_column_width(1, column_width("Value", rows.iter().map(|(_, v)| v.to_string())))?;
    Ok(())
}

/// Write the summary workbook to `path`.
///
/// Sheets: `Data` (the table), `Summary` (metric/value rows), `Aggregated`
/// (only when `group_by` is configured and succeeds) and `Charts` (a column
/// chart over the bar chart data, only for tables with more than one row).
pub fn write_summary_workbook(
    table: &DataSet,
    config: &SummaryConfig,
    log: Arc<dyn LogSink>,
    path: &Path,
) -> Result<(), LoadError> {
    let statistics = SummaryConfig {
        group_by: Vec::new(),
        ..config.clone()
    };
    let report = build_summary(table, &statistics, Arc::clone(&log));
    let mut workbook = Workbook::new();

    let data = workbook.add_worksheet();
    data.set_name("Data")?;
    write_table_sheet(data, table, false)?;

    let summary = workbook.add_worksheet();
    summary.set_name("Summary")?;
    write_metric_sheet(summary, &summary_rows(table, config, &report))?;

    if let Some(grouped) = aggregated_table(table, config, log) {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Aggregated")?;
        write_table_sheet(sheet, &grouped, true)?;
    }

    if let Some(chart_data) = bar_chart(table).filter(|_| table.len() > 1) {
        let sheet = workbook.add_worksheet();
        sheet.set_name(CHART_SHEET)?;
        write_table_sheet(sheet, &chart_data.data, false)?;

        let last = chart_data.data.len() as u32;
        let mut chart = Chart::new(ChartType::Column);
        chart
            .add_series()
            .set_name(chart_data.data.schema.fields[1].name.as_str())
            .set_categories((CHART_SHEET, 1, 0, last, 0))
            .set_values((CHART_SHEET, 1, 1, last, 1));
        chart.title().set_name(chart_data.title.as_str());
        chart.x_axis().set_name(chart_data.data.schema.fields[0].name.as_str());
        chart.y_axis().set_name("Values");
        sheet.insert_chart(1, 3, &chart)?;
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Row, SchemaBuilder};
    use crate::processing::{AggregateFunction, AggregationSpec};
    use crate::utils::MemorySink;
    use calamine::{open_workbook_auto, Data, Reader};

    fn table() -> DataSet {
        let schema = SchemaBuilder::new()
            .add_string("region", true)
            .add_integer("units", true)
            .build();
        DataSet::with_rows(
            schema,
            vec![
                Row::new(vec!["North".into(), Value::Integer(3)]),
                Row::new(vec!["South".into(), Value::Integer(1)]),
                Row::new(vec!["North".into(), Value::Integer(2)]),
            ],
        )
        .unwrap()
    }

    fn config() -> SummaryConfig {
        SummaryConfig {
            custom_kpis: vec![("units_total".to_string(), "units * 1".to_string())],
            group_by: vec!["region".to_string()],
            aggregations: vec![(
                "units".to_string(),
                AggregationSpec::Single(AggregateFunction::Sum),
            )],
        }
    }

    #[test]
    fn test_summary_rows_follow_table_order() {
        let report = build_summary(&table(), &config(), Arc::new(MemorySink::new()));
        let rows = summary_rows(&table(), &config(), &report);
        let metrics: Vec<&str> = rows.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(
            metrics,
            vec![
                "Total Rows",
                "Total Columns",
                "Missing Values",
                "region - Unique Values",
                "region - Top Value",
                "units - Total",
                "units - Average",
                "units - Max",
                "units - Min",
                "units_total",
            ]
        );
        assert_eq!(rows[4].1, Value::from("North"));
        assert_eq!(rows[5].1, Value::Integer(6));
    }

    #[test]
    fn test_workbook_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report_summary.xlsx");
        let sink = Arc::new(MemorySink::new());
        write_summary_workbook(&table(), &config(), sink.clone(), &path).unwrap();
        assert!(sink.warnings().is_empty());

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Data", "Summary", "Aggregated", "Charts"]);

        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((1, 0)), Some(&Data::String("Total Rows".to_string())));
        match summary.get_value((1, 1)) {
            Some(Data::Float(n)) => assert_eq!(*n, 3.0),
            Some(Data::Int(n)) => assert_eq!(*n, 3),
            other => panic!("unexpected {:?}", other),
        }

        let aggregated = workbook.worksheet_range("Aggregated").unwrap();
        assert_eq!(aggregated.height(), 3);
    }

    #[test]
    fn test_single_row_has_no_chart_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.xlsx");
        let mut one = table();
        one.data.truncate(1);
        write_summary_workbook(&one, &SummaryConfig::default(), Arc::new(MemorySink::new()), &path).unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Data", "Summary"]);
    }
}
