// Chart data sets derived from the final table
// Author: Gabriel Demetrios Lafis

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::data::{DataSet, DataType, Field, Row, Schema, Value};
use crate::processing::{correlation_matrix, AggregateFunction};

/// Columns added by extraction, never charted
const SOURCE_COLUMNS: &[&str] = &["source_file", "source_path"];

/// Categories kept in a bar chart
const TOP_CATEGORIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Correlation,
    TimeSeries,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar_chart_data",
            ChartKind::Correlation => "correlation_data",
            ChartKind::TimeSeries => "time_series_data",
        }
    }
}

/// The data behind one chart
#[derive(Debug, Clone)]
pub struct ChartData {
    pub kind: ChartKind,
    pub title: String,
    pub data: DataSet,
}

fn numeric_columns(table: &DataSet) -> Vec<usize> {
    (0..table.schema.fields.len())
        .filter(|&i| table.schema.fields[i].data_type.is_numeric())
        .collect()
}

fn categorical_columns(table: &DataSet) -> Vec<usize> {
    (0..table.schema.fields.len())
        .filter(|&i| {
            let field = &table.schema.fields[i];
            field.data_type.is_textual() && !SOURCE_COLUMNS.contains(&field.name.as_str())
        })
        .collect()
}

/// Every chart the table supports
pub fn chart_data(table: &DataSet) -> Vec<ChartData> {
    [bar_chart(table), correlation_chart(table), time_series(table)]
        .into_iter()
        .flatten()
        .collect()
}

/// Sum of the first numeric column per value of the first categorical
/// column, for the most frequent categories
pub fn bar_chart(table: &DataSet) -> Option<ChartData> {
    let cat = *categorical_columns(table).first()?;
    let num = *numeric_columns(table).first()?;

    let mut order: Vec<Value> = Vec::new();
    let mut members: HashMap<Value, Vec<&Value>> = HashMap::new();
    for row in &table.data {
        let key = &row.values[cat];
        if key.is_null() {
            continue;
        }
        members
            .entry(key.clone())
            .or_insert_with_key(|k| {
                order.push(k.clone());
                Vec::new()
            })
            .push(&row.values[num]);
    }

    // stable sort keeps first-seen order among equal counts
    order.sort_by_key(|k| std::cmp::Reverse(members.get(k).map_or(0, Vec::len)));
    order.truncate(TOP_CATEGORIES);

    let cat_field = &table.schema.fields[cat];
    let num_field = &table.schema.fields[num];
    let sum_type = AggregateFunction::Sum.output_type(num_field.data_type);
    let schema = Schema::new(vec![
        Field::new(cat_field.name.clone(), cat_field.data_type, false),
        Field::new(num_field.name.clone(), sum_type, true),
    ]);

    let rows = order
        .into_iter()
        .map(|key| {
            let values = members.get(&key).map(Vec::as_slice).unwrap_or_default();
            let total = sum_type.widen_value(AggregateFunction::Sum.apply(values));
            Row::new(vec![key, total])
        })
        .collect();

    Some(ChartData {
        kind: ChartKind::Bar,
        title: format!("{} by {}", num_field.name, cat_field.name),
        data: DataSet::with_rows(schema, rows).ok()?,
    })
}

/// Pairwise correlation of all numeric columns
pub fn correlation_chart(table: &DataSet) -> Option<ChartData> {
    let columns = numeric_columns(table);
    if columns.len() < 2 {
        return None;
    }

    let names: Vec<String> = columns
        .iter()
        .map(|&i| table.schema.fields[i].name.clone())
        .collect();

    let mut fields = vec![Field::new("column".to_string(), DataType::String, false)];
    fields.extend(
        names
            .iter()
            .map(|name| Field::new(name.clone(), DataType::Float, true)),
    );

    let rows = correlation_matrix(table, &columns)
        .into_iter()
        .zip(&names)
        .map(|(coefficients, name)| {
            let mut values = vec![Value::String(name.clone())];
            values.extend(coefficients.into_iter().map(Value::from));
            Row::new(values)
        })
        .collect();

    Some(ChartData {
        kind: ChartKind::Correlation,
        title: "Correlation Matrix".to_string(),
        data: DataSet::with_rows(Schema::new(fields), rows).ok()?,
    })
}

/// Daily sums of the first numeric column along the first timestamp column
pub fn time_series(table: &DataSet) -> Option<ChartData> {
    let ts = (0..table.schema.fields.len())
        .find(|&i| table.schema.fields[i].data_type == DataType::Timestamp)?;
    let num = *numeric_columns(table).first()?;

    let mut days: BTreeMap<NaiveDate, Vec<&Value>> = BTreeMap::new();
    for row in &table.data {
        if let Value::Timestamp(moment) = &row.values[ts] {
            days.entry(moment.date()).or_default().push(&row.values[num]);
        }
    }

    let ts_field = &table.schema.fields[ts];
    let num_field = &table.schema.fields[num];
    let sum_type = AggregateFunction::Sum.output_type(num_field.data_type);
    let schema = Schema::new(vec![
        Field::new(ts_field.name.clone(), DataType::Timestamp, false),
        Field::new(num_field.name.clone(), sum_type, true),
    ]);

    let rows = days
        .into_iter()
        .filter_map(|(day, values)| {
            let midnight = day.and_hms_opt(0, 0, 0)?;
            let total = sum_type.widen_value(AggregateFunction::Sum.apply(&values));
            Some(Row::new(vec![Value::Timestamp(midnight), total]))
        })
        .collect();

    Some(ChartData {
        kind: ChartKind::TimeSeries,
        title: format!("{} over Time", num_field.name),
        data: DataSet::with_rows(schema, rows).ok()?,
    })
}
