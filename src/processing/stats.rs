// Statistical helpers shared by aggregation, cleaning and reporting
// Author: Gabriel Demetrios Lafis

use crate::data::{DataSet, Value};

/// Present numeric values of a column, in row order
pub fn numeric_values(dataset: &DataSet, index: usize) -> Vec<f64> {
    dataset.column_values(index).filter_map(Value::as_f64).collect()
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample variance (n - 1 denominator), `None` below two values
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    Some(values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

/// Sample standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Pearson correlation of two equally long series.
///
/// `None` when the series are shorter than two values or either is constant.
pub fn correlation(values1: &[f64], values2: &[f64]) -> Option<f64> {
    if values1.len() < 2 || values1.len() != values2.len() {
        return None;
    }

    let mean1 = mean(values1)?;
    let mean2 = mean(values2)?;

    let mut numerator = 0.0;
    let mut denom1 = 0.0;
    let mut denom2 = 0.0;

    for (x, y) in values1.iter().zip(values2) {
        let diff1 = x - mean1;
        let diff2 = y - mean2;
        numerator += diff1 * diff2;
        denom1 += diff1 * diff1;
        denom2 += diff2 * diff2;
    }

    if denom1 == 0.0 || denom2 == 0.0 {
        None
    } else {
        Some(numerator / (denom1.sqrt() * denom2.sqrt()))
    }
}

/// Pairwise correlation matrix over the given columns. Each pair uses only
/// the rows where both values are present.
pub fn correlation_matrix(dataset: &DataSet, columns: &[usize]) -> Vec<Vec<Option<f64>>> {
    columns
        .iter()
        .map(|&a| {
            columns
                .iter()
                .map(|&b| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = dataset
                        .data
                        .iter()
                        .filter_map(|row| row.values[a].as_f64().zip(row.values[b].as_f64()))
                        .unzip();
                    correlation(&xs, &ys)
                })
                .collect()
        })
        .collect()
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
