//! Conversions between `waymark_core::value::Value` and rusqlite's owned
//! value type.

use rusqlite::types::Value as SqlValue;
use waymark_core::value::Value;

pub fn encode_value(v: &Value) -> SqlValue {
  match v {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Real(f) => SqlValue::Real(*f),
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Blob(b) => SqlValue::Blob(b.clone()),
  }
}

pub fn decode_value(v: SqlValue) -> Value {
  match v {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(i) => Value::Integer(i),
    SqlValue::Real(f) => Value::Real(f),
    SqlValue::Text(s) => Value::Text(s),
    SqlValue::Blob(b) => Value::Blob(b),
  }
}

pub fn encode_params(values: &[Value]) -> Vec<SqlValue> {
  values.iter().map(encode_value).collect()
}

/// Borrow owned `(column, value)` pairs in the shape the `Database` trait
/// takes.
pub fn borrow_pairs(values: &[(String, Value)]) -> Vec<(&str, Value)> {
  values.iter().map(|(c, v)| (c.as_str(), v.clone())).collect()
}
