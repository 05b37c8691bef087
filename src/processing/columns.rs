// Column cleaning: names, missing values, type conversion and calculated fields
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{coerce_value, DataSet, DataType, Field, Row, Schema, Value};
use crate::expression::Expression;
use crate::utils::ConfigScalar;

use super::stats;
use super::{DataProcessor, ProcessContext, ProcessingError, ProcessorType};

/// Canonical form of a column name: lowercase, every character outside
/// `[a-z0-9]` replaced by `_`, runs of `_` collapsed, no leading or trailing
/// `_`. May return an empty string.
pub fn sanitize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let mut result = String::with_capacity(lowered.len());
    let mut last_was_underscore = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            result.push('_');
            last_was_underscore = true;
        }
    }

    result.trim_matches('_').to_string()
}

/// What to do when two columns standardize to the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCollision {
    /// The later column replaces the earlier one, at the earlier position
    Overwrite,
    /// Refuse to standardize
    Error,
    /// Keep both, suffixing the later one with `_1`, `_2`, ...
    Suffix,
}

impl Default for NameCollision {
    fn default() -> Self {
        NameCollision::Overwrite
    }
}

/// Renames every column to its canonical form
pub struct StandardizeNames {
    policy: NameCollision,
}

impl StandardizeNames {
    pub fn new(policy: NameCollision) -> Self {
        StandardizeNames { policy }
    }
}

impl DataProcessor for StandardizeNames {
    fn process(&self, input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        // Output slots: canonical name plus the source column that fills it
        let mut slots: Vec<(String, usize)> = Vec::with_capacity(input.schema.fields.len());
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (idx, field) in input.schema.fields.iter().enumerate() {
            let mut name = sanitize_column_name(&field.name);
            if name.is_empty() {
                name = format!("column_{}", idx);
            }

            match positions.get(&name).copied() {
                None => {
                    positions.insert(name.clone(), slots.len());
                    slots.push((name, idx));
                }
                Some(slot) => {
                    let earlier = &input.schema.fields[slots[slot].1].name;
                    match self.policy {
                        NameCollision::Error => {
                            return Err(ProcessingError::Configuration(format!(
                                "columns '{}' and '{}' both standardize to '{}'",
                                earlier, field.name, name
                            )));
                        }
                        NameCollision::Overwrite => {
                            ctx.warn(&format!(
                                "Column '{}' overwrites '{}' after standardization to '{}'",
                                field.name, earlier, name
                            ));
                            slots[slot].1 = idx;
                        }
                        NameCollision::Suffix => {
                            let mut n = 1;
                            let mut candidate = format!("{}_{}", name, n);
                            while positions.contains_key(&candidate) {
                                n += 1;
                                candidate = format!("{}_{}", name, n);
                            }
                            ctx.warn(&format!(
                                "Column '{}' renamed to '{}' to avoid a collision with '{}'",
                                field.name, candidate, earlier
                            ));
                            positions.insert(candidate.clone(), slots.len());
                            slots.push((candidate, idx));
                        }
                    }
                }
            }
        }

        let renamed = slots
            .iter()
            .filter(|(name, src)| *name != input.schema.fields[*src].name)
            .count();

        let fields = slots
            .iter()
            .map(|(name, src)| {
                let source = &input.schema.fields[*src];
                Field::new(name.clone(), source.data_type, source.nullable)
            })
            .collect();
        let rows = input
            .data
            .iter()
            .map(|row| Row::new(slots.iter().map(|(_, src)| row.values[*src].clone()).collect()))
            .collect();

        let mut output = DataSet::with_rows(Schema::new(fields), rows)?;
        output.metadata = input.metadata;

        ctx.note(format!(
            "Renamed {} of {} columns",
            renamed,
            input.schema.fields.len()
        ));
        Ok(output)
    }

    fn name(&self) -> &str {
        "Column Standardization"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Standardize
    }
}

/// How missing cells of one column are resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigScalar", into = "ConfigScalar")]
pub enum MissingStrategy {
    /// Remove rows where the column is missing
    Drop,
    /// Fill with the mean of the present values (numeric columns)
    FillMean,
    /// Fill with a literal
    FillConstant(Value),
    /// Carry the previous present value forward
    Forward,
    /// Carry the next present value backward
    Backward,
    /// Mean for numeric columns, `"Unknown"` for everything else
    Auto,
}

impl From<ConfigScalar> for MissingStrategy {
    fn from(scalar: ConfigScalar) -> Self {
        match scalar {
            ConfigScalar::Text(text) => match text.trim().to_lowercase().as_str() {
                "drop" => MissingStrategy::Drop,
                "mean" | "fill_mean" | "fill-mean" => MissingStrategy::FillMean,
                "fill" | "auto" => MissingStrategy::Auto,
                "forward" | "ffill" => MissingStrategy::Forward,
                "backward" | "bfill" => MissingStrategy::Backward,
                _ => MissingStrategy::FillConstant(Value::String(text)),
            },
            ConfigScalar::Null => MissingStrategy::Auto,
            other => MissingStrategy::FillConstant(other.into()),
        }
    }
}

impl From<MissingStrategy> for ConfigScalar {
    fn from(strategy: MissingStrategy) -> Self {
        match strategy {
            MissingStrategy::Drop => ConfigScalar::Text("drop".to_string()),
            MissingStrategy::FillMean => ConfigScalar::Text("mean".to_string()),
            MissingStrategy::FillConstant(value) => value.into(),
            MissingStrategy::Forward => ConfigScalar::Text("forward".to_string()),
            MissingStrategy::Backward => ConfigScalar::Text("backward".to_string()),
            MissingStrategy::Auto => ConfigScalar::Text("fill".to_string()),
        }
    }
}

/// Resolves missing cells column by column. Columns without an explicit
/// strategy use [`MissingStrategy::Auto`].
pub struct ResolveMissing {
    strategies: Vec<(String, MissingStrategy)>,
}

impl ResolveMissing {
    pub fn new(strategies: Vec<(String, MissingStrategy)>) -> Self {
        ResolveMissing { strategies }
    }

    fn strategy_for(&self, column: &str) -> MissingStrategy {
        self.strategies
            .iter()
            .find(|(name, _)| name == column)
            .map_or(MissingStrategy::Auto, |(_, strategy)| strategy.clone())
    }
}

impl DataProcessor for ResolveMissing {
    fn process(&self, mut input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let missing_before = input.missing_count();

        for (name, _) in &self.strategies {
            if input.column_index(name).is_none() {
                ctx.warn(&format!(
                    "Missing-value strategy for unknown column '{}' ignored",
                    name
                ));
            }
        }

        for idx in 0..input.schema.fields.len() {
            let field = &input.schema.fields[idx];
            if !input.column_values(idx).any(Value::is_null) {
                continue;
            }
            let column = field.name.clone();

            let strategy = match self.strategy_for(&column) {
                MissingStrategy::Auto if field.data_type.is_numeric() => MissingStrategy::FillMean,
                MissingStrategy::Auto => MissingStrategy::FillConstant(Value::from("Unknown")),
                other => other,
            };

            match strategy {
                MissingStrategy::Drop => {
                    let keep: Vec<bool> = input.column_values(idx).map(|v| !v.is_null()).collect();
                    input.retain_rows(&keep);
                }
                MissingStrategy::FillMean => fill_mean(&mut input, idx, ctx)?,
                MissingStrategy::FillConstant(value) => fill_constant(&mut input, idx, &value, ctx)?,
                MissingStrategy::Forward => fill_directional(&mut input, idx, false, ctx)?,
                MissingStrategy::Backward => fill_directional(&mut input, idx, true, ctx)?,
                MissingStrategy::Auto => {}
            }
        }

        ctx.note(format!(
            "Reduced missing values from {} to {}",
            missing_before,
            input.missing_count()
        ));
        Ok(input)
    }

    fn name(&self) -> &str {
        "Missing Value Handling"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::MissingValues
    }
}

fn fill_mean(dataset: &mut DataSet, idx: usize, ctx: &mut ProcessContext) -> Result<(), ProcessingError> {
    let column = dataset.schema.fields[idx].name.clone();
    if !dataset.schema.fields[idx].data_type.is_numeric() {
        ctx.warn(&format!(
            "Cannot fill non-numeric column '{}' with its mean",
            column
        ));
        return Ok(());
    }

    let mean = match stats::mean(&stats::numeric_values(dataset, idx)) {
        Some(mean) => mean,
        None => {
            ctx.warn(&format!("Column '{}' has no values to compute a mean from", column));
            return Ok(());
        }
    };

    let values = dataset
        .column_values(idx)
        .map(|v| match v {
            Value::Null => Value::Float(mean),
            other => DataType::Float.widen_value(other.clone()),
        })
        .collect();
    dataset.replace_column(idx, DataType::Float, values)?;
    Ok(())
}

fn fill_constant(
    dataset: &mut DataSet,
    idx: usize,
    constant: &Value,
    ctx: &mut ProcessContext,
) -> Result<(), ProcessingError> {
    let field = &dataset.schema.fields[idx];
    if constant.is_null() {
        ctx.warn(&format!("Fill value for column '{}' is itself missing", field.name));
        return Ok(());
    }

    let (data_type, fill) = match coerce_value(constant, field.data_type) {
        Ok(fill) => (field.data_type, fill),
        Err(_) => {
            ctx.debug(&format!(
                "Column '{}' becomes text to hold fill value '{}'",
                field.name, constant
            ));
            (DataType::String, Value::String(constant.to_string()))
        }
    };

    let values = dataset
        .column_values(idx)
        .map(|v| match v {
            Value::Null => fill.clone(),
            other => data_type.widen_value(other.clone()),
        })
        .collect();
    dataset.replace_column(idx, data_type, values)?;
    Ok(())
}

/// Forward fill (or backward fill when `reverse`). The gap at the far end,
/// which has no neighbour to copy from, is filled from the other direction.
fn fill_directional(
    dataset: &mut DataSet,
    idx: usize,
    reverse: bool,
    ctx: &mut ProcessContext,
) -> Result<(), ProcessingError> {
    let mut values: Vec<Value> = dataset.column_values(idx).cloned().collect();
    if values.iter().all(Value::is_null) {
        ctx.warn(&format!(
            "Column '{}' has no values to propagate",
            dataset.schema.fields[idx].name
        ));
        return Ok(());
    }

    let order: Vec<usize> = if reverse {
        (0..values.len()).rev().collect()
    } else {
        (0..values.len()).collect()
    };

    let mut last: Option<Value> = None;
    for &i in &order {
        match (&values[i], &last) {
            (Value::Null, Some(previous)) => values[i] = previous.clone(),
            (Value::Null, None) => {}
            (present, _) => last = Some(present.clone()),
        }
    }

    let mut last: Option<Value> = None;
    for &i in order.iter().rev() {
        match (&values[i], &last) {
            (Value::Null, Some(next)) => values[i] = next.clone(),
            (Value::Null, None) => {}
            (present, _) => last = Some(present.clone()),
        }
    }

    let data_type = dataset.schema.fields[idx].data_type;
    dataset.replace_column(idx, data_type, values)?;
    Ok(())
}

/// Target of a type conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetType {
    Datetime,
    Numeric,
    Category,
    Integer,
    Float,
    Text,
    Boolean,
}

impl TryFrom<String> for TargetType {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        match name.trim().to_lowercase().as_str() {
            "datetime" | "datetime64" | "timestamp" | "date" => Ok(TargetType::Datetime),
            "numeric" => Ok(TargetType::Numeric),
            "category" | "categorical" => Ok(TargetType::Category),
            "int" | "int64" | "integer" => Ok(TargetType::Integer),
            "float" | "float64" => Ok(TargetType::Float),
            "str" | "string" | "object" => Ok(TargetType::Text),
            "bool" | "boolean" => Ok(TargetType::Boolean),
            _ => Err(format!("unknown conversion target '{}'", name)),
        }
    }
}

impl From<TargetType> for String {
    fn from(target: TargetType) -> Self {
        target.to_string()
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::Datetime => "datetime",
            TargetType::Numeric => "numeric",
            TargetType::Category => "category",
            TargetType::Integer => "int64",
            TargetType::Float => "float64",
            TargetType::Text => "string",
            TargetType::Boolean => "bool",
        };
        f.write_str(name)
    }
}

impl TargetType {
    /// The column type a conversion produces, given the current values
    fn resolve(&self, values: &[Value]) -> DataType {
        match self {
            TargetType::Datetime => DataType::Timestamp,
            TargetType::Category => DataType::Categorical,
            TargetType::Integer => DataType::Integer,
            TargetType::Float => DataType::Float,
            TargetType::Text => DataType::String,
            TargetType::Boolean => DataType::Boolean,
            TargetType::Numeric => {
                let all_integral = values.iter().filter(|v| !v.is_null()).all(|v| match v {
                    Value::Integer(_) | Value::Boolean(_) => true,
                    Value::String(s) => s.trim().parse::<i64>().is_ok(),
                    _ => false,
                });
                if all_integral {
                    DataType::Integer
                } else {
                    DataType::Float
                }
            }
        }
    }
}

/// Converts columns to requested types. Cells that do not convert become
/// missing; a column where nothing converts is left as it was.
pub struct ConvertTypes {
    mapping: Vec<(String, TargetType)>,
}

impl ConvertTypes {
    pub fn new(mapping: Vec<(String, TargetType)>) -> Self {
        ConvertTypes { mapping }
    }
}

impl DataProcessor for ConvertTypes {
    fn process(&self, mut input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let mut converted = Vec::new();

        for (column, target) in &self.mapping {
            let idx = match input.column_index(column) {
                Some(idx) => idx,
                None => {
                    ctx.warn(&format!("Cannot convert unknown column '{}'", column));
                    continue;
                }
            };

            let original_type = input.schema.fields[idx].data_type;
            let values: Vec<Value> = input.column_values(idx).cloned().collect();
            let data_type = target.resolve(&values);

            let mut present = 0;
            let mut failures = 0;
            let new_values: Vec<Value> = values
                .iter()
                .map(|value| {
                    if value.is_null() {
                        return Value::Null;
                    }
                    present += 1;
                    coerce_value(value, data_type).unwrap_or_else(|_| {
                        failures += 1;
                        Value::Null
                    })
                })
                .collect();

            if present > 0 && failures == present {
                ctx.warn(&format!(
                    "Failed to convert {} to {}: no value could be converted",
                    column, target
                ));
                continue;
            }
            if failures > 0 {
                ctx.warn(&format!(
                    "{} value(s) of {} could not be converted to {} and are now missing",
                    failures, column, target
                ));
            }

            input.replace_column(idx, data_type, new_values)?;
            converted.push(format!("{}: {} -> {}", column, original_type, data_type));
        }

        ctx.note(format!(
            "Converted {} columns: {}",
            converted.len(),
            converted.join("; ")
        ));
        Ok(input)
    }

    fn name(&self) -> &str {
        "Data Type Conversion"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::TypeConversion
    }
}

/// Adds or replaces columns computed from formulas, in order. Each formula
/// sees the columns created before it; a failing formula is skipped.
pub struct CalculatedFields {
    calculations: Vec<(String, String)>,
}

impl CalculatedFields {
    pub fn new(calculations: Vec<(String, String)>) -> Self {
        CalculatedFields { calculations }
    }
}

impl DataProcessor for CalculatedFields {
    fn process(&self, mut input: DataSet, ctx: &mut ProcessContext) -> Result<DataSet, ProcessingError> {
        let mut created = Vec::new();

        for (name, formula) in &self.calculations {
            let result = Expression::parse(formula).and_then(|expr| expr.evaluate(&input));
            match result {
                Ok(evaluated) => {
                    let (data_type, values) = evaluated.into_typed_column(input.len());
                    input.set_column(name, data_type, values)?;
                    created.push(format!("{} = {}", name, formula));
                }
                Err(err) => {
                    ctx.warn(&format!("Failed to create calculated field {}: {}", name, err));
                }
            }
        }

        ctx.note(format!(
            "Created {} fields: {}",
            created.len(),
            created.join("; ")
        ));
        Ok(input)
    }

    fn name(&self) -> &str {
        "Calculated Fields Creation"
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::CalculatedFields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SchemaBuilder;
    use crate::utils::MemorySink;
    use std::sync::Arc;

    fn ctx() -> (Arc<MemorySink>, ProcessContext) {
        let sink = Arc::new(MemorySink::new());
        let ctx = ProcessContext::new(sink.clone(), "test");
        (sink, ctx)
    }

    fn table(names: &[&str], rows: Vec<Vec<Value>>) -> DataSet {
        let schema = Schema::new(
            names
                .iter()
                .zip(&rows[0])
                .map(|(n, v)| Field::new(n.to_string(), v.data_type().unwrap_or(DataType::String), true))
                .collect(),
        );
        DataSet::with_rows(schema, rows.into_iter().map(Row::new).collect()).unwrap()
    }

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("Product Name"), "product_name");
        assert_eq!(sanitize_column_name("  Sales ($) -- 2024 "), "sales_2024");
        assert_eq!(sanitize_column_name("__a__b__"), "a_b");
        assert_eq!(sanitize_column_name("Café"), "caf");
        assert_eq!(sanitize_column_name("%%"), "");
    }

    #[test]
    fn test_collision_overwrite_keeps_later_values_at_first_position() {
        let ds = table(
            &["Total", "x", "TOTAL"],
            vec![vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]],
        );
        let (sink, mut ctx) = ctx();
        let out = StandardizeNames::new(NameCollision::Overwrite)
            .process(ds, &mut ctx)
            .unwrap();
        assert_eq!(out.column_names(), vec!["total", "x"]);
        assert_eq!(out.data[0].values, vec![Value::Integer(3), Value::Integer(2)]);
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_collision_error_and_suffix_policies() {
        let ds = table(&["a b", "A-B"], vec![vec![Value::Integer(1), Value::Integer(2)]]);
        let (_, mut ctx) = ctx();
        assert!(matches!(
            StandardizeNames::new(NameCollision::Error).process(ds.clone(), &mut ctx),
            Err(ProcessingError::Configuration(_))
        ));
        let out = StandardizeNames::new(NameCollision::Suffix)
            .process(ds, &mut ctx)
            .unwrap();
        assert_eq!(out.column_names(), vec!["a_b", "a_b_1"]);
    }

    #[test]
    fn test_empty_name_becomes_positional() {
        let ds = table(&["id", "???"], vec![vec![Value::Integer(1), Value::Integer(2)]]);
        let (_, mut ctx) = ctx();
        let out = StandardizeNames::new(NameCollision::Overwrite)
            .process(ds, &mut ctx)
            .unwrap();
        assert_eq!(out.column_names(), vec!["id", "column_1"]);
    }

    #[test]
    fn test_auto_fills_mean_and_unknown() {
        let ds = table(
            &["amount", "name"],
            vec![
                vec![Value::Integer(10), "a".into()],
                vec![Value::Null, Value::Null],
                vec![Value::Integer(20), "b".into()],
            ],
        );
        let (_, mut ctx) = ctx();
        let out = ResolveMissing::new(vec![]).process(ds, &mut ctx).unwrap();
        assert_eq!(out.schema.fields[0].data_type, DataType::Float);
        assert_eq!(out.data[1].values, vec![Value::Float(15.0), "Unknown".into()]);
        assert_eq!(out.missing_count(), 0);
    }

    #[test]
    fn test_constant_that_does_not_fit_turns_column_into_text() {
        let ds = table(
            &["qty"],
            vec![vec![Value::Integer(1)], vec![Value::Null]],
        );
        let (_, mut ctx) = ctx();
        let strategies = vec![("qty".to_string(), MissingStrategy::FillConstant("n/a".into()))];
        let out = ResolveMissing::new(strategies).process(ds, &mut ctx).unwrap();
        assert_eq!(out.schema.fields[0].data_type, DataType::String);
        assert_eq!(out.column("qty").unwrap(), vec![Value::from("1"), Value::from("n/a")]);
    }

    #[test]
    fn test_forward_fill_backfills_leading_gap() {
        let ds = table(
            &["v"],
            vec![
                vec![Value::Integer(0)],
                vec![Value::Null],
                vec![Value::Integer(2)],
                vec![Value::Null],
            ],
        );
        let mut ds = ds;
        ds.data[0].values[0] = Value::Null;
        let (_, mut ctx) = ctx();
        let strategies = vec![("v".to_string(), MissingStrategy::Forward)];
        let out = ResolveMissing::new(strategies).process(ds, &mut ctx).unwrap();
        assert_eq!(
            out.column("v").unwrap(),
            vec![Value::Integer(2), Value::Integer(2), Value::Integer(2), Value::Integer(2)]
        );
    }

    #[test]
    fn test_backward_fill_and_drop() {
        let ds = table(
            &["v", "w"],
            vec![
                vec![Value::Integer(1), Value::Integer(1)],
                vec![Value::Null, Value::Null],
                vec![Value::Integer(3), Value::Integer(3)],
            ],
        );
        let (_, mut ctx) = ctx();
        let strategies = vec![
            ("v".to_string(), MissingStrategy::Backward),
            ("w".to_string(), MissingStrategy::Drop),
        ];
        let out = ResolveMissing::new(strategies).process(ds, &mut ctx).unwrap();
        assert_eq!(out.column("v").unwrap(), vec![Value::Integer(1), Value::Integer(3)]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_all_missing_column_is_reported() {
        let schema = SchemaBuilder::new().add_float("v", true).build();
        let ds = DataSet::with_rows(schema, vec![Row::new(vec![Value::Null])]).unwrap();
        let (sink, mut ctx) = ctx();
        let out = ResolveMissing::new(vec![]).process(ds, &mut ctx).unwrap();
        assert_eq!(out.missing_count(), 1);
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_missing_strategy_from_config_scalars() {
        assert_eq!(MissingStrategy::from(ConfigScalar::Text("ffill".into())), MissingStrategy::Forward);
        assert_eq!(MissingStrategy::from(ConfigScalar::Text("fill".into())), MissingStrategy::Auto);
        assert_eq!(
            MissingStrategy::from(ConfigScalar::Int(0)),
            MissingStrategy::FillConstant(Value::Integer(0))
        );
        assert_eq!(
            MissingStrategy::from(ConfigScalar::Text("N/A".into())),
            MissingStrategy::FillConstant("N/A".into())
        );
    }

    #[test]
    fn test_convert_types_per_cell_failures() {
        let ds = table(
            &["amount", "date"],
            vec![
                vec!["10".into(), "2024-01-01".into()],
                vec!["abc".into(), "not a date".into()],
                vec!["2.5".into(), "2024-01-03".into()],
            ],
        );
        let (sink, mut ctx) = ctx();
        let mapping = vec![
            ("amount".to_string(), TargetType::Numeric),
            ("date".to_string(), TargetType::Datetime),
        ];
        let out = ConvertTypes::new(mapping).process(ds, &mut ctx).unwrap();
        assert_eq!(out.schema.fields[0].data_type, DataType::Float);
        assert_eq!(
            out.column("amount").unwrap(),
            vec![Value::Float(10.0), Value::Null, Value::Float(2.5)]
        );
        assert_eq!(out.schema.fields[1].data_type, DataType::Timestamp);
        assert!(out.data[1].values[1].is_null());
        assert_eq!(sink.warnings().len(), 2);
    }

    #[test]
    fn test_convert_types_leaves_column_when_nothing_converts() {
        let ds = table(&["name"], vec![vec!["x".into()], vec!["y".into()]]);
        let (sink, mut ctx) = ctx();
        let out = ConvertTypes::new(vec![("name".to_string(), TargetType::Integer)])
            .process(ds.clone(), &mut ctx)
            .unwrap();
        assert_eq!(out, ds);
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_target_type_names() {
        assert_eq!(TargetType::try_from("int64".to_string()), Ok(TargetType::Integer));
        assert_eq!(TargetType::try_from("object".to_string()), Ok(TargetType::Text));
        assert!(TargetType::try_from("complex128".to_string()).is_err());
    }

    #[test]
    fn test_calculated_fields_skip_failures() {
        let ds = table(
            &["sales_amount", "quantity"],
            vec![vec![Value::Integer(1000), Value::Integer(10)]],
        );
        let (sink, mut ctx) = ctx();
        let calculations = vec![
            ("unit_price".to_string(), "sales_amount / quantity".to_string()),
            ("broken".to_string(), "nope * 2".to_string()),
            ("big".to_string(), "unit_price > 50".to_string()),
        ];
        let out = CalculatedFields::new(calculations).process(ds, &mut ctx).unwrap();
        assert_eq!(out.column("unit_price").unwrap(), vec![Value::Float(100.0)]);
        assert_eq!(out.column("big").unwrap(), vec![Value::Boolean(true)]);
        assert!(out.column("broken").is_none());
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn test_calculated_fields_widen_mixed_results() {
        let ds = table(
            &["exponent"],
            vec![vec![Value::Integer(2)], vec![Value::Integer(-1)], vec![Value::Integer(3)]],
        );
        let (_, mut ctx) = ctx();
        let calculations = vec![("power".to_string(), "2 ** exponent".to_string())];
        let out = CalculatedFields::new(calculations).process(ds, &mut ctx).unwrap();
        assert_eq!(out.schema.get_field_by_name("power").unwrap().data_type, DataType::Float);
        assert_eq!(
            out.column("power").unwrap(),
            vec![Value::Float(4.0), Value::Float(0.5), Value::Float(8.0)]
        );
        assert!(out.column("power").unwrap().iter().all(|v| matches!(v, Value::Float(_))));
    }
}
