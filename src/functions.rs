// Built-in function implementations
//
// Built-ins are bound at parse time by reserved name and take the evaluated
// argument list as a whole. Like the operators, they never fail.

use serde::{Deserialize, Serialize};

use crate::datetime;
use crate::operators;
use crate::value::Value;

/// Reserved built-in function names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Trunc,
    Ceil,
    Floor,
    Min,
    Max,
    Sum,
    /// Integers unchanged, other numbers as a two-decimal string.
    Number,
    /// Thousands grouped with spaces.
    FormattedNumber,
    DateTime,
    Date,
    Duration,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Trunc,
        Builtin::Ceil,
        Builtin::Floor,
        Builtin::Min,
        Builtin::Max,
        Builtin::Sum,
        Builtin::Number,
        Builtin::FormattedNumber,
        Builtin::DateTime,
        Builtin::Date,
        Builtin::Duration,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Trunc => "trunc",
            Builtin::Ceil => "ceil",
            Builtin::Floor => "floor",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Number => "number",
            Builtin::FormattedNumber => "fnumber",
            Builtin::DateTime => "datetime",
            Builtin::Date => "date",
            Builtin::Duration => "duration",
        }
    }
}

/// Call a built-in on evaluated arguments.
pub fn call(builtin: Builtin, args: &[Value]) -> Value {
    let first = args.first().unwrap_or(&Value::Undefined);
    match builtin {
        Builtin::Trunc => numeric::round(first, f64::trunc),
        Builtin::Ceil => numeric::round(first, f64::ceil),
        Builtin::Floor => numeric::round(first, f64::floor),
        Builtin::Min => numeric::min(aggregate_input(args)),
        Builtin::Max => numeric::max(aggregate_input(args)),
        Builtin::Sum => numeric::sum(aggregate_input(args)),
        Builtin::Number => format::fixed(first),
        Builtin::FormattedNumber => format::spaced(first),
        Builtin::DateTime => datetime::format_datetime(first),
        Builtin::Date => datetime::format_date(first),
        Builtin::Duration => datetime::format_duration(first),
    }
}

/// `min`/`max`/`sum` take either one array argument or a variadic list.
fn aggregate_input(args: &[Value]) -> &[Value] {
    match args.first() {
        Some(Value::Array(arr)) => arr.as_slice(),
        _ => args,
    }
}

/// Built-in numeric functions
pub mod numeric {
    use super::*;

    /// trunc/ceil/floor
    pub fn round(value: &Value, f: fn(f64) -> f64) -> Value {
        Value::Number(f(value.to_number()))
    }

    /// Smallest number; `Infinity` when empty, `NaN` if any element is not a number.
    pub fn min(values: &[Value]) -> Value {
        fold_numbers(values, f64::INFINITY, f64::min)
    }

    /// Largest number; `-Infinity` when empty, `NaN` if any element is not a number.
    pub fn max(values: &[Value]) -> Value {
        fold_numbers(values, f64::NEG_INFINITY, f64::max)
    }

    fn fold_numbers(values: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> Value {
        let mut acc = init;
        for value in values {
            let n = value.to_number();
            if n.is_nan() {
                return Value::Number(f64::NAN);
            }
            acc = pick(acc, n);
        }
        Value::Number(acc)
    }

    /// Fold with `+` from `0`, so string elements concatenate.
    pub fn sum(values: &[Value]) -> Value {
        values
            .iter()
            .fold(Value::Number(0.0), |acc, v| operators::add(&acc, v))
    }
}

/// Number formatting helpers
pub mod format {
    use super::*;

    /// `number(x)`
    pub fn fixed(value: &Value) -> Value {
        match value {
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => value.clone(),
            Value::Number(n) if n.is_finite() => Value::from(two_decimals(*n)),
            Value::Number(n) => Value::from(crate::value::number_to_string(*n)),
            _ => Value::Undefined,
        }
    }

    /// Two decimals, exact midpoints such as `1.125` rounded away from zero.
    ///
    /// A finite double lies exactly halfway between two hundredths only when
    /// it is an odd multiple of `1/8`; every other value is already rounded
    /// correctly by `{:.2}`.
    fn two_decimals(n: f64) -> String {
        let eighths = n * 8.0;
        if eighths.fract() == 0.0 && eighths.abs() < 1e15 && eighths % 2.0 != 0.0 {
            return format!("{:.2}", (n * 100.0).round() / 100.0);
        }
        format!("{:.2}", n)
    }

    /// `fnumber(x)`: `1234567.5` → `"1 234 567.5"`.
    pub fn spaced(value: &Value) -> Value {
        let n = value.to_number();
        if !n.is_finite() {
            return Value::Undefined;
        }
        let text = crate::value::number_to_string(n);
        if text.contains('e') {
            return Value::from(text);
        }
        let (sign, unsigned) = match text.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", text.as_str()),
        };
        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (unsigned, None),
        };

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(' ');
            }
            grouped.push(digit);
        }

        let mut result = format!("{}{}", sign, grouped);
        if let Some(fraction) = fraction {
            result.push('.');
            result.push_str(fraction);
        }
        Value::from(result)
    }
}
