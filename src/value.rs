// Value: Arc-wrapped dynamic value type shared by subjects, scopes and results
// Clones are O(1); payloads are immutable once built

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A dynamically typed value produced or consumed by a formula.
///
/// Arrays, objects and strings are wrapped in `Arc` so that a subject row,
/// the scope bindings derived from it and the results built from it all share
/// one allocation. `Arc` rather than `Rc` keeps values `Send + Sync`, which
/// lets a host evaluate one formula over many rows on several threads.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The no-value sentinel. Unresolved names, failed lookups and type
    /// mismatches all evaluate to this instead of raising.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<IndexMap<String, Value>>),
}

// ── Type checks ──────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` or `undefined`.
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Index into an object by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Resolve a dotted attribute path (`Fortress.Wood`, `items.0.name`).
    ///
    /// Objects are walked by key and arrays by canonical integer index. Any
    /// missing segment or non-container along the way yields `Undefined`.
    pub fn get_path(&self, path: &str) -> Value {
        let mut current = self;
        for segment in path.split('.') {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(arr) => parse_index(segment).and_then(|i| arr.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Undefined,
            }
        }
        current.clone()
    }

    /// The element sequence a collection special form iterates over.
    ///
    /// Arrays yield their elements, objects their member values in insertion
    /// order and strings their characters; every other value is empty.
    pub fn values(&self) -> Vec<Value> {
        match self {
            Value::Array(arr) => arr.as_ref().clone(),
            Value::Object(map) => map.values().cloned().collect(),
            Value::String(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
            _ => Vec::new(),
        }
    }
}

/// Parse a canonical non-negative integer index (`"0"`, `"12"`, not `"012"`).
pub(crate) fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

// ── Coercions ────────────────────────────────────────────────────────────────

impl Value {
    /// Truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are falsy.
    /// Arrays and objects are always truthy, even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Numeric coercion. Never fails; unconvertible values become `NaN`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            // Through the joined rendering: `[]` and `[null]` are 0, `[1, 2]` is NaN
            Value::Array(_) => string_to_number(&self.to_display_string()),
            Value::Object(_) => f64::NAN,
        }
    }

    /// String coercion used by concatenation, object keys and comparisons.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Array(arr) => arr
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Arrays and objects collapse to their string form; primitives are kept.
    pub(crate) fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) => Value::string(self.to_display_string()),
            other => other.clone(),
        }
    }

    /// Whether both values share the same array/object allocation.
    pub(crate) fn same_allocation(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Parse a numeric string the way formula tokens and coercions do.
///
/// Surrounding whitespace is ignored and the empty string is `0`. Decimal
/// literals with optional sign and exponent, `Infinity`, and `0x`/`0o`/`0b`
/// prefixed integers are accepted; anything else is `NaN`.
pub fn string_to_number(s: &str) -> f64 {
    parse_number(s).unwrap_or(f64::NAN)
}

/// Like [`string_to_number`] but distinguishes "not a number" from `NaN`.
pub(crate) fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let lower = s.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }
    // Rust's float parser also takes "inf"/"nan"; reject anything that is not
    // plain digits, sign, point or exponent before handing it over.
    let plain = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !plain || !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Shortest round-trip rendering of a number.
///
/// Integral values print without a fractional part; magnitudes at or above
/// `1e21` and below `1e-6` switch to exponent form (`1e+21`, `1e-7`).
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    if n.fract() == 0.0 {
        return format!("{}", n as i128);
    }
    format!("{}", n)
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    #[inline]
    pub fn array(v: Vec<Value>) -> Self {
        Value::Array(Arc::new(v))
    }

    #[inline]
    pub fn object(m: IndexMap<String, Value>) -> Self {
        Value::Object(Arc::new(m))
    }
}

// ── From impls ───────────────────────────────────────────────────────────────

impl From<bool> for Value {
    #[inline]
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    #[inline]
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u64> for Value {
    #[inline]
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    #[inline]
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    #[inline]
    fn from(v: Vec<Value>) -> Self {
        Value::Array(Arc::new(v))
    }
}

impl From<IndexMap<String, Value>> for Value {
    #[inline]
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Object(Arc::new(m))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Undefined, Into::into)
    }
}

// ── PartialEq ────────────────────────────────────────────────────────────────

/// Structural equality, for tests and host code. Formulas use the loose `==`
/// operator in [`crate::operators`] instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // NaN != NaN
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "\"{}\"", escape_json_string(s)),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", escape_json_string(k), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn escape_json_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

// ── Serialization ────────────────────────────────────────────────────────────

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serializer.serialize_none()
                } else if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

// ── Deserialization (single-pass JSON→Value) ─────────────────────────────────

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v.into()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            vec.push(elem);
        }
        Ok(Value::array(vec))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut m = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            m.insert(k, v);
        }
        Ok(Value::object(m))
    }
}

// ── JSON string I/O ──────────────────────────────────────────────────────────

impl Value {
    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a JSON string into a Value (single pass, no intermediate serde_json::Value).
    pub fn from_json_str(s: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// ── Conversion from/to serde_json::Value ─────────────────────────────────────

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(arr) => {
                Value::Array(Arc::new(arr.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => {
                let m: IndexMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::Object(Arc::new(m))
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serde_json::Value::Null
                } else {
                    serde_json::json!(*n)
                }
            }
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => {
                let m: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect();
                serde_json::Value::Object(m)
            }
        }
    }
}

// ── value! macro ─────────────────────────────────────────────────────────────

/// Macro for constructing Value literals, similar to serde_json::json!
///
/// Usage:
///   value!(undefined)      → Value::Undefined
///   value!(null)           → Value::Null
///   value!(true)           → Value::Bool(true)
///   value!(42)             → Value::Number(42.0)
///   value!("hello")        → Value::String(Arc::from("hello"))
///   value!([1, 2, 3])      → Value::Array(Arc::new(vec![...]))
///   value!({"k": v, ...})  → Value::Object(Arc::new(IndexMap from pairs))
///   value!(expr)           → Value::from(expr)
#[macro_export]
macro_rules! value {
    (undefined) => {
        $crate::value::Value::Undefined
    };

    (null) => {
        $crate::value::Value::Null
    };

    (true) => {
        $crate::value::Value::Bool(true)
    };

    (false) => {
        $crate::value::Value::Bool(false)
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::value::Value::Array(::std::sync::Arc::new(vec![ $( $crate::value!($elem) ),* ]))
    };

    ({ $($key:tt : $val:tt),* $(,)? }) => {
        {
            #[allow(unused_mut)]
            let mut map = ::indexmap::IndexMap::new();
            $(
                map.insert(($key).to_string(), $crate::value!($val));
            )*
            $crate::value::Value::Object(::std::sync::Arc::new(map))
        }
    };

    // Expression (fallback: numbers, variables, function calls, etc.)
    ($other:expr) => {
        $crate::value::Value::from($other)
    };
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_cheap() {
        let arr = Value::array(vec![Value::from(1i64), Value::from(2i64)]);
        let arr2 = arr.clone();
        if let (Value::Array(a), Value::Array(b)) = (&arr, &arr2) {
            assert!(Arc::ptr_eq(a, b));
        } else {
            panic!("expected arrays");
        }
        assert!(arr.same_allocation(&arr2));
        assert!(!arr.same_allocation(&Value::array(vec![Value::from(1i64), Value::from(2i64)])));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_to_number() {
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::string(" 12.5 ").to_number(), 12.5);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert_eq!(Value::string("0x1f").to_number(), 31.0);
        assert_eq!(Value::string("1e3").to_number(), 1000.0);
        assert!(Value::string("inf").to_number().is_nan());
        assert!(Value::string("12px").to_number().is_nan());
        assert_eq!(Value::string("Infinity").to_number(), f64::INFINITY);
        assert_eq!(value!([]).to_number(), 0.0);
        assert_eq!(value!([7]).to_number(), 7.0);
        assert!(value!([1, 2]).to_number().is_nan());
        assert_eq!(value!([null]).to_number(), 0.0);
        assert_eq!(value!([[" 4 "]]).to_number(), 4.0);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(14.0), "14");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_display_string() {
        assert_eq!(value!([1, null, "a"]).to_display_string(), "1,,a");
        assert_eq!(value!({"a": 1}).to_display_string(), "[object Object]");
        assert_eq!(Value::Undefined.to_display_string(), "undefined");
    }

    #[test]
    fn test_get_path() {
        let v = value!({"Fortress": {"Wood": 120, "Items": [{"Name": "Axe"}]}});
        assert_eq!(v.get_path("Fortress.Wood"), Value::Number(120.0));
        assert_eq!(v.get_path("Fortress.Items.0.Name"), Value::string("Axe"));
        assert_eq!(v.get_path("Fortress.Items.01"), Value::Undefined);
        assert_eq!(v.get_path("Fortress.Stone"), Value::Undefined);
        assert_eq!(v.get_path("Fortress.Wood.Extra"), Value::Undefined);
        assert_eq!(Value::Undefined.get_path("a"), Value::Undefined);
    }

    #[test]
    fn test_values() {
        assert_eq!(value!({"a": 1, "b": 2}).values(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(value!("ab").values(), vec![Value::string("a"), Value::string("b")]);
        assert!(Value::Number(5.0).values().is_empty());
        assert!(Value::Undefined.values().is_empty());
    }

    #[test]
    fn test_value_macro() {
        assert!(value!(null).is_null());
        assert!(value!(undefined).is_undefined());
        assert_eq!(value!([1i64, 2i64, 3i64]).as_array().map(|a| a.len()), Some(3));

        let obj = value!({"name": "Alice", "age": 30i64});
        assert_eq!(obj.get("name").and_then(|v| v.as_str()), Some("Alice"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let v = value!({"name": "Alice", "scores": [1i64, 2i64, 3i64], "active": true});
        let json_str = v.to_json_string().unwrap();
        let parsed = Value::from_json_str(&json_str).unwrap();
        assert_eq!(v, parsed);
        assert_eq!(Value::Undefined.to_json_string().unwrap(), "null");
        assert_eq!(Value::Number(f64::NAN).to_json_string().unwrap(), "null");
    }

    #[test]
    fn test_from_serde_json() {
        let sv = serde_json::json!({"name": "Alice", "age": 30, "scores": [1, 2, 3]});
        let v = Value::from(sv);
        assert_eq!(v.get("name").and_then(|v| v.as_str()), Some("Alice"));
        assert_eq!(v.get("age").and_then(|v| v.as_f64()), Some(30.0));
    }
}
