//! Native operator semantics.
//!
//! Every operator is a pure function over the evaluated argument slice and
//! never fails: a missing argument reads as `undefined`, and values that do
//! not fit the operator coerce (to `NaN`, to a string, to `undefined`) instead
//! of raising.

use std::cmp::Ordering;

use crate::ast::Operator;
use crate::value::{parse_index, Value};

/// Apply `op` to already evaluated arguments.
pub fn apply(op: Operator, args: &[Value]) -> Value {
    let arg = |i: usize| args.get(i).unwrap_or(&Value::Undefined);
    match op {
        Operator::Multiply => Value::Number(arg(0).to_number() * arg(1).to_number()),
        Operator::Divide => Value::Number(arg(0).to_number() / arg(1).to_number()),
        Operator::Add => add(arg(0), arg(1)),
        Operator::Subtract => Value::Number(arg(0).to_number() - arg(1).to_number()),
        Operator::Greater => Value::Bool(compare(arg(0), arg(1)) == Some(Ordering::Greater)),
        Operator::Less => Value::Bool(compare(arg(0), arg(1)) == Some(Ordering::Less)),
        Operator::GreaterOrEqual => Value::Bool(matches!(
            compare(arg(0), arg(1)),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        Operator::LessOrEqual => Value::Bool(matches!(
            compare(arg(0), arg(1)),
            Some(Ordering::Less | Ordering::Equal)
        )),
        Operator::Equal => Value::Bool(loose_equals(arg(0), arg(1))),
        Operator::Or => {
            if arg(0).is_truthy() {
                arg(0).clone()
            } else {
                arg(1).clone()
            }
        }
        Operator::And => {
            if arg(0).is_truthy() {
                arg(1).clone()
            } else {
                arg(0).clone()
            }
        }
        Operator::Not => Value::Bool(!arg(0).is_truthy()),
        Operator::Select => {
            if arg(0).is_truthy() {
                arg(1).clone()
            } else {
                arg(2).clone()
            }
        }
        Operator::Negate => Value::Number(-arg(0).to_number()),
        Operator::Index => index(arg(0), arg(1)),
    }
}

/// `+`: string concatenation when either side is (or collapses to) a string,
/// numeric addition otherwise.
pub fn add(left: &Value, right: &Value) -> Value {
    let left = left.to_primitive();
    let right = right.to_primitive();
    if left.is_string() || right.is_string() {
        let mut s = left.to_display_string();
        s.push_str(&right.to_display_string());
        Value::from(s)
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

/// Relational ordering. Two strings compare lexicographically, anything else
/// numerically; `None` when either side is `NaN`.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let left = left.to_primitive();
    let right = right.to_primitive();
    match (&left, &right) {
        (Value::String(a), Value::String(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Loose `==`.
///
/// `null` and `undefined` equal each other and nothing else; booleans compare
/// as `0`/`1`; a number against a string compares numerically; arrays and
/// objects equal only themselves, or a primitive matching their string form.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => {
            left.same_allocation(right)
        }
        (Value::Bool(_), other) | (other, Value::Bool(_)) => {
            let flag = if left.is_bool() { left } else { right };
            loose_equals(&Value::Number(flag.to_number()), other)
        }
        (Value::Number(n), Value::String(_)) | (Value::String(_), Value::Number(n)) => {
            let text = if left.is_string() { left } else { right };
            *n == text.to_number()
        }
        (Value::Array(_) | Value::Object(_), primitive)
        | (primitive, Value::Array(_) | Value::Object(_)) => {
            let container = if left.is_array() || left.is_object() {
                left
            } else {
                right
            };
            loose_equals(&container.to_primitive(), primitive)
        }
        _ => false,
    }
}

/// `a[b]`: member of an array or object, `undefined` for anything else.
pub fn index(target: &Value, key: &Value) -> Value {
    match target {
        Value::Array(arr) => {
            let position = match key {
                Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
                Value::String(s) if s.as_ref() == "length" => {
                    return Value::from(arr.len());
                }
                Value::String(s) => parse_index(s),
                _ => None,
            };
            position
                .and_then(|i| arr.get(i))
                .cloned()
                .unwrap_or(Value::Undefined)
        }
        Value::Object(map) => map
            .get(key.to_display_string().as_str())
            .cloned()
            .unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}
