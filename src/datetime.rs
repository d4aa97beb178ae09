// Date, time and duration formatting for the `datetime`, `date` and
// `duration` built-ins. Inputs are millisecond counts; output is UTC.

use chrono::{DateTime, Utc};

use crate::value::Value;

const DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M";
const DATE_FORMAT: &str = "%d.%m.%Y";

/// Interpret a value as a millisecond Unix timestamp.
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let millis = value.to_number();
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

/// `datetime(ms)` → `DD.MM.YYYY HH:MM`
pub fn format_datetime(value: &Value) -> Value {
    render(value, DATETIME_FORMAT)
}

/// `date(ms)` → `DD.MM.YYYY`
pub fn format_date(value: &Value) -> Value {
    render(value, DATE_FORMAT)
}

fn render(value: &Value, pattern: &str) -> Value {
    if !value.is_number() && !value.is_string() {
        return Value::Undefined;
    }
    match timestamp(value) {
        Some(dt) => Value::from(dt.format(pattern).to_string()),
        None => Value::Undefined,
    }
}

/// `duration(ms)` → `HH:MM:SS`, or `Nd HH:MM:SS` from one day up.
pub fn format_duration(value: &Value) -> Value {
    if !value.is_number() && !value.is_string() {
        return Value::Undefined;
    }
    let millis = value.to_number();
    if !millis.is_finite() {
        return Value::Undefined;
    }

    let total = (millis.abs() / 1000.0).trunc() as u64;
    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if millis < 0.0 && total > 0 {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&format!("{}d ", days));
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
    Value::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime() {
        // 2021-03-04 05:06:07 UTC
        let ms = Value::from(1_614_834_367_000_i64);
        assert_eq!(format_datetime(&ms), Value::string("04.03.2021 05:06"));
        assert_eq!(format_date(&ms), Value::string("04.03.2021"));
        assert_eq!(format_date(&Value::from(0)), Value::string("01.01.1970"));
    }

    #[test]
    fn test_datetime_rejects_non_numbers() {
        assert_eq!(format_datetime(&Value::Undefined), Value::Undefined);
        assert_eq!(format_date(&Value::string("soon")), Value::Undefined);
        assert_eq!(format_date(&Value::from(f64::INFINITY)), Value::Undefined);
        assert_eq!(format_date(&Value::from(1e300)), Value::Undefined);
    }

    #[test]
    fn test_duration() {
        assert_eq!(format_duration(&Value::from(0)), Value::string("00:00:00"));
        assert_eq!(format_duration(&Value::from(61_500)), Value::string("00:01:01"));
        assert_eq!(format_duration(&Value::from(3_725_000)), Value::string("01:02:05"));
        assert_eq!(
            format_duration(&Value::from(90_061_000)),
            Value::string("1d 01:01:01")
        );
        assert_eq!(format_duration(&Value::from(-5_000)), Value::string("-00:00:05"));
        assert_eq!(format_duration(&Value::Null), Value::Undefined);
    }
}
