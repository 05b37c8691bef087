// Deterministic sample input files
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::data::{CsvSink, DataError, DataSet, DataSink, Row, SchemaBuilder, Value};
use crate::processing::round_to;

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Electronics", &["Laptop", "Smartphone", "Tablet", "Headphones", "Camera"]),
    ("Clothing", &["T-Shirt", "Jeans", "Dress", "Jacket", "Shoes"]),
    ("Books", &["Fiction Novel", "Textbook", "Cookbook", "Biography", "Self-Help"]),
    ("Home & Garden", &["Furniture", "Kitchenware", "Bedding", "Tools", "Plants"]),
    ("Sports", &["Running Shoes", "Gym Equipment", "Outdoor Gear", "Supplements"]),
    ("Toys", &["Action Figure", "Board Game", "Puzzle", "Doll"]),
];
const REGIONS: &[&str] = &["North", "South", "East", "West", "Central"];
const SALES_REPS: &[&str] = &[
    "Alice Johnson",
    "Bob Smith",
    "Carol Davis",
    "David Wilson",
    "Eva Brown",
    "Frank Miller",
];
const CUSTOMER_TYPES: &[&str] = &["Individual", "Business", "Government"];
const PAYMENT_METHODS: &[&str] = &["Credit Card", "Cash", "Bank Transfer", "Check"];
const FIRST_NAMES: &[&str] = &["John", "Jane", "Michael", "Sarah", "David", "Lisa", "Robert", "Emily"];
const LAST_NAMES: &[&str] = &["Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller"];
const CITIES: &[&str] = &["New York", "Los Angeles", "Chicago", "Houston", "Phoenix", "Austin"];
const LOYALTY: &[&str] = &["Bronze", "Silver", "Gold", "Platinum"];

pub const SALES_RECORDS: usize = 1000;
pub const CUSTOMER_RECORDS: usize = 500;

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn day(start: Option<NaiveDate>, offset: i64) -> Value {
    start
        .and_then(|date| (date + Duration::days(offset)).and_hms_opt(0, 0, 0))
        .map_or(Value::Null, Value::Timestamp)
}

/// Sales transactions between 2023-01-01 and 2024-01-31
pub fn sales_data(rng: &mut StdRng, records: usize) -> DataSet {
    let schema = SchemaBuilder::new()
        .add_timestamp("Date", true)
        .add_string("Product_Category", true)
        .add_string("Product_Name", true)
        .add_integer("Quantity", true)
        .add_float("Unit_Price", true)
        .add_float("Total_Amount", true)
        .add_float("Discount_Percent", true)
        .add_string("Sales_Rep", true)
        .add_string("Region", true)
        .add_string("Customer_Type", true)
        .add_string("Payment_Method", true)
        .build();
    let start = NaiveDate::from_ymd_opt(2023, 1, 1);
    let mut dataset = DataSet::new(schema);

    for _ in 0..records {
        let (category, products) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let product = pick(rng, products);
        let base_price: f64 = rng.gen_range(10.0..500.0);
        let quantity: i64 = rng.gen_range(1..=20);
        let discount: f64 = rng.gen_range(0.0..0.3);
        let unit_price = base_price * (1.0 - discount);

        dataset.data.push(Row::new(vec![
            day(start, rng.gen_range(0..396)),
            category.into(),
            product.into(),
            Value::Integer(quantity),
            Value::Float(round_to(unit_price, 2)),
            Value::Float(round_to(unit_price * quantity as f64, 2)),
            Value::Float(round_to(discount * 100.0, 1)),
            pick(rng, SALES_REPS).into(),
            pick(rng, REGIONS).into(),
            pick(rng, CUSTOMER_TYPES).into(),
            pick(rng, PAYMENT_METHODS).into(),
        ]));
    }

    dataset
}

/// Customer master data
pub fn customer_data(rng: &mut StdRng, records: usize) -> DataSet {
    let schema = SchemaBuilder::new()
        .add_string("Customer_ID", false)
        .add_string("First_Name", true)
        .add_string("Last_Name", true)
        .add_string("Email", true)
        .add_string("City", true)
        .add_integer("Age", true)
        .add_timestamp("Registration_Date", true)
        .add_integer("Total_Purchases", true)
        .add_float("Total_Spent", true)
        .add_string("Loyalty_Status", true)
        .build();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1);
    let mut dataset = DataSet::new(schema);

    for i in 0..records {
        let first = pick(rng, FIRST_NAMES);
        let last = pick(rng, LAST_NAMES);
        dataset.data.push(Row::new(vec![
            Value::String(format!("CUST_{:05}", i + 1)),
            first.into(),
            last.into(),
            Value::String(format!("{}.{}@email.com", first.to_lowercase(), last.to_lowercase())),
            pick(rng, CITIES).into(),
            Value::Integer(rng.gen_range(18..=80)),
            day(start, rng.gen_range(0..=1460)),
            Value::Integer(rng.gen_range(1..=50)),
            Value::Float(round_to(rng.gen_range(50.0..5000.0), 2)),
            pick(rng, LOYALTY).into(),
        ]));
    }

    dataset
}

/// Blank out roughly `fraction` of the cells of the named columns
pub fn with_missing(mut dataset: DataSet, rng: &mut StdRng, columns: &[&str], fraction: f64) -> DataSet {
    let targets: Vec<usize> = columns.iter().filter_map(|c| dataset.column_index(c)).collect();
    for row in &mut dataset.data {
        for &idx in &targets {
            if rng.gen_bool(fraction) {
                row.values[idx] = Value::Null;
            }
        }
    }
    dataset
}

/// Append copies of `count` randomly chosen rows
pub fn with_duplicates(mut dataset: DataSet, rng: &mut StdRng, count: usize) -> DataSet {
    if dataset.is_empty() {
        return dataset;
    }
    let copies: Vec<Row> = (0..count)
        .map(|_| dataset.data[rng.gen_range(0..dataset.len())].clone())
        .collect();
    dataset.data.extend(copies);
    dataset
}

/// Write the sample files into `dir` and return their paths
pub fn generate<P: AsRef<Path>>(dir: P, seed: u64) -> Result<Vec<PathBuf>, DataError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let sales = sales_data(&mut rng, SALES_RECORDS);
    let sales_missing = with_missing(
        sales_data(&mut rng, SALES_RECORDS / 5),
        &mut rng,
        &["Unit_Price", "Region", "Sales_Rep"],
        0.1,
    );
    let customers = customer_data(&mut rng, CUSTOMER_RECORDS);
    let customers_dup = with_duplicates(customer_data(&mut rng, CUSTOMER_RECORDS / 5), &mut rng, 20);

    let files = [
        ("sales_data_2023.csv", sales),
        ("sales_data_with_missing.csv", sales_missing),
        ("customer_data.csv", customers),
        ("customer_data_with_duplicates.csv", customers_dup),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, dataset) in files {
        let path = dir.join(name);
        CsvSink::new(&path, ',').write(&dataset)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = sales_data(&mut StdRng::seed_from_u64(7), 20);
        let b = sales_data(&mut StdRng::seed_from_u64(7), 20);
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn test_missing_and_duplicates() {
        let mut rng = StdRng::seed_from_u64(1);
        let customers = customer_data(&mut rng, 50);
        assert_eq!(customers.missing_count(), 0);

        let dup = with_duplicates(customers.clone(), &mut rng, 5);
        assert_eq!(dup.len(), 55);

        let missing = with_missing(customers, &mut rng, &["City"], 1.0);
        assert_eq!(missing.missing_count(), 50);
    }

    #[test]
    fn test_generate_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = generate(dir.path(), 42).unwrap();
        assert_eq!(files.len(), 4);
        assert!(files.iter().all(|f| f.exists()));
    }
}
