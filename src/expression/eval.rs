// Vectorized evaluation of formula trees
// Author: Gabriel Demetrios Lafis

use std::cmp::Ordering;

use crate::data::{parse_timestamp, DataSet, DataType, Value};

use super::parser::{BinaryOp, Expr, Function, UnaryOp};
use super::ExpressionError;

/// Result of evaluating a formula: one value per row, or a single value
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Column(Vec<Value>),
    Scalar(Value),
}

impl Evaluated {
    /// Expand to one value per row, broadcasting a scalar
    pub fn into_column(self, len: usize) -> Vec<Value> {
        match self {
            Evaluated::Column(values) => values,
            Evaluated::Scalar(value) => vec![value; len],
        }
    }

    /// Expand to one value per row, each widened to the result's type
    pub fn into_typed_column(self, len: usize) -> (DataType, Vec<Value>) {
        let data_type = self.data_type();
        let values = self
            .into_column(len)
            .into_iter()
            .map(|v| data_type.widen_value(v))
            .collect();
        (data_type, values)
    }

    /// Interpret the result as a row filter
    pub fn into_mask(self, len: usize) -> Result<Vec<bool>, ExpressionError> {
        self.into_column(len)
            .iter()
            .map(|value| match value {
                Value::Boolean(b) => Ok(*b),
                Value::Null => Ok(false),
                other => Err(ExpressionError::TypeMismatch(format!(
                    "condition produced non-boolean value '{}'",
                    other
                ))),
            })
            .collect()
    }

    /// The type a column built from this result should carry
    pub fn data_type(&self) -> DataType {
        let values: &[Value] = match self {
            Evaluated::Column(values) => values,
            Evaluated::Scalar(value) => std::slice::from_ref(value),
        };
        values
            .iter()
            .filter_map(Value::data_type)
            .reduce(|a, b| a.widen(&b))
            .unwrap_or(DataType::Float)
    }
}

/// Evaluates formula trees against one dataset
pub struct Evaluator<'a> {
    dataset: &'a DataSet,
}

impl<'a> Evaluator<'a> {
    pub fn new(dataset: &'a DataSet) -> Self {
        Evaluator { dataset }
    }

    pub fn eval(&self, expr: &Expr) -> Result<Evaluated, ExpressionError> {
        match expr {
            Expr::Literal(value) => Ok(Evaluated::Scalar(value.clone())),
            Expr::Column(name) => {
                let idx = self
                    .dataset
                    .column_index(name)
                    .ok_or_else(|| ExpressionError::UnknownColumn(name.clone()))?;
                Ok(Evaluated::Column(
                    self.dataset.column_values(idx).cloned().collect(),
                ))
            }
            Expr::Unary(op, inner) => match self.eval(inner)? {
                Evaluated::Scalar(v) => Ok(Evaluated::Scalar(apply_unary(*op, &v)?)),
                Evaluated::Column(values) => values
                    .iter()
                    .map(|v| apply_unary(*op, v))
                    .collect::<Result<_, _>>()
                    .map(Evaluated::Column),
            },
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                match (left, right) {
                    (Evaluated::Scalar(a), Evaluated::Scalar(b)) => {
                        Ok(Evaluated::Scalar(apply_binary(*op, &a, &b)?))
                    }
                    (left, right) => {
                        let len = self.dataset.len();
                        let left = left.into_column(len);
                        let right = right.into_column(len);
                        left.iter()
                            .zip(&right)
                            .map(|(a, b)| apply_binary(*op, a, b))
                            .collect::<Result<_, _>>()
                            .map(Evaluated::Column)
                    }
                }
            }
            Expr::Call(function, arg) => {
                let values = self.eval(arg)?.into_column_or_single();
                reduce(*function, &values).map(Evaluated::Scalar)
            }
        }
    }
}

impl Evaluated {
    fn into_column_or_single(self) -> Vec<Value> {
        match self {
            Evaluated::Column(values) => values,
            Evaluated::Scalar(value) => vec![value],
        }
    }
}

fn type_error(op: &str, a: &Value, b: &Value) -> ExpressionError {
    ExpressionError::TypeMismatch(format!(
        "unsupported operand types for {}: {:?} and {:?}",
        op,
        a.data_type(),
        b.data_type()
    ))
}

/// Numeric view used by arithmetic; booleans count as 0 and 1
fn arith_operand(value: &Value) -> Option<Value> {
    match value {
        Value::Boolean(b) => Some(Value::Integer(i64::from(*b))),
        Value::Integer(_) | Value::Float(_) => Some(value.clone()),
        _ => None,
    }
}

fn truthiness(value: &Value, op: &str) -> Result<Option<bool>, ExpressionError> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        Value::Integer(i) => Ok(Some(*i != 0)),
        Value::Float(f) => Ok(Some(*f != 0.0)),
        other => Err(ExpressionError::TypeMismatch(format!(
            "'{}' expects boolean operands, got '{}'",
            op, other
        ))),
    }
}

fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value, ExpressionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match op {
        UnaryOp::Not => Ok(truthiness(value, "not")?.map_or(Value::Null, |b| Value::Boolean(!b))),
        UnaryOp::Plus | UnaryOp::Neg => {
            let operand = arith_operand(value).ok_or_else(|| {
                ExpressionError::TypeMismatch(format!("bad operand for unary minus: '{}'", value))
            })?;
            if op == UnaryOp::Plus {
                return Ok(operand);
            }
            Ok(match operand {
                Value::Integer(i) => i
                    .checked_neg()
                    .map_or(Value::Float(-(i as f64)), Value::Integer),
                Value::Float(f) => Value::Float(-f),
                other => other,
            })
        }
    }
}

fn apply_binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExpressionError> {
    match op {
        BinaryOp::And => {
            let (x, y) = (truthiness(a, "and")?, truthiness(b, "and")?);
            Ok(match (x, y) {
                (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            })
        }
        BinaryOp::Or => {
            let (x, y) = (truthiness(a, "or")?, truthiness(b, "or")?);
            Ok(match (x, y) {
                (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            })
        }
        op if op.is_comparison() => compare(op, a, b),
        op => arithmetic(op, a, b),
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExpressionError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }

    let ordering = match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::String(s)) => parse_timestamp(s).map(|y| x.cmp(&y)),
        (Value::String(s), Value::Timestamp(y)) => parse_timestamp(s).map(|x| x.cmp(y)),
        (x, y) => match (arith_operand(x), arith_operand(y)) {
            (Some(x), Some(y)) => x.as_f64().zip(y.as_f64()).and_then(|(x, y)| x.partial_cmp(&y)),
            _ => None,
        },
    };

    let result = match (op, ordering) {
        (BinaryOp::Eq, Some(o)) => o == Ordering::Equal,
        (BinaryOp::Ne, Some(o)) => o != Ordering::Equal,
        // Values of unrelated kinds are simply unequal
        (BinaryOp::Eq, None) => false,
        (BinaryOp::Ne, None) => true,
        (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
        (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinaryOp::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => return Err(type_error("comparison", a, b)),
        _ => unreachable!("non-comparison operator"),
    };
    Ok(Value::Boolean(result))
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, ExpressionError> {
    if a.is_null() || b.is_null() {
        return Ok(Value::Null);
    }

    if let (BinaryOp::Add, Value::String(x), Value::String(y)) = (op, a, b) {
        return Ok(Value::String(format!("{}{}", x, y)));
    }

    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Mod => "%",
        _ => "**",
    };
    let (x, y) = match (arith_operand(a), arith_operand(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(type_error(symbol, a, b)),
    };

    if let (Value::Integer(i), Value::Integer(j)) = (&x, &y) {
        if let Some(value) = integer_arithmetic(op, *i, *j) {
            return Ok(value);
        }
    }

    let (x, y) = match (x.as_f64(), y.as_f64()) {
        (Some(x), Some(y)) => (x, y),
        // NaN operand
        _ => return Ok(Value::Null),
    };

    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if y == 0.0 => return Ok(Value::Null),
        BinaryOp::Div => x / y,
        BinaryOp::FloorDiv => (x / y).floor(),
        BinaryOp::Mod => x - y * (x / y).floor(),
        _ => x.powf(y),
    };

    Ok(if result.is_finite() {
        Value::Float(result)
    } else {
        Value::Null
    })
}

/// Exact integer arithmetic. `None` means "redo in floating point".
fn integer_arithmetic(op: BinaryOp, i: i64, j: i64) -> Option<Value> {
    match op {
        BinaryOp::Add => i.checked_add(j).map(Value::Integer),
        BinaryOp::Sub => i.checked_sub(j).map(Value::Integer),
        BinaryOp::Mul => i.checked_mul(j).map(Value::Integer),
        BinaryOp::FloorDiv | BinaryOp::Mod if j == 0 => Some(Value::Null),
        BinaryOp::FloorDiv => {
            let q = i.checked_div(j)?;
            let floored = if i % j != 0 && ((i < 0) != (j < 0)) { q - 1 } else { q };
            Some(Value::Integer(floored))
        }
        BinaryOp::Mod => {
            let r = i.checked_rem(j)?;
            let r = if r != 0 && ((r < 0) != (j < 0)) { r + j } else { r };
            Some(Value::Integer(r))
        }
        BinaryOp::Pow if j >= 0 => u32::try_from(j)
            .ok()
            .and_then(|e| i.checked_pow(e))
            .map(Value::Integer),
        _ => None,
    }
}

/// Apply a reduction, skipping missing values
fn reduce(function: Function, values: &[Value]) -> Result<Value, ExpressionError> {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();

    match function {
        Function::Count => Ok(Value::Integer(present.len() as i64)),
        Function::Max | Function::Min => {
            let wanted = if function == Function::Max {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            Ok(present
                .into_iter()
                .reduce(|best, v| if v.total_cmp(best) == wanted { v } else { best })
                .cloned()
                .unwrap_or(Value::Null))
        }
        Function::Sum | Function::Mean => {
            let mut int_sum: Option<i64> = Some(0);
            let mut float_sum = 0.0;
            for value in &present {
                match arith_operand(value) {
                    Some(Value::Integer(i)) => {
                        int_sum = int_sum.and_then(|s| s.checked_add(i));
                        float_sum += i as f64;
                    }
                    Some(Value::Float(f)) => {
                        int_sum = None;
                        float_sum += f;
                    }
                    _ => {
                        return Err(ExpressionError::TypeMismatch(format!(
                            "{}() over non-numeric value '{}'",
                            function, value
                        )))
                    }
                }
            }

            if function == Function::Mean {
                return Ok(if present.is_empty() {
                    Value::Null
                } else {
                    Value::Float(float_sum / present.len() as f64)
                });
            }
            Ok(int_sum.map_or(Value::Float(float_sum), Value::Integer))
        }
    }
}
