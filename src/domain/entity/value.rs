use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use crate::domain::entity::data_type::DataType;
use thiserror::Error;

// 値変換エラーの定義
#[derive(Error, Debug, PartialEq)]
pub enum ValueError {
    #[error("Cannot convert {0} into a column value")]
    UnsupportedJson(String),

    #[error("Number {0} is out of range")]
    NumberOutOfRange(String),
}

// レコード内の値の表現
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Null => DataType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 数値として解釈できる場合はf64で返す
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// SQLの比較規則で2つの値を比較する
    /// NULLとの比較や比較不能な型の組み合わせはNoneを返す
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            // 真偽値は0/1として数値と比較する
            (Value::Boolean(a), b) => Value::Integer(*a as i64).compare(b),
            (a, Value::Boolean(b)) => a.compare(&Value::Integer(*b as i64)),
            // 数値と数値に見える文字列
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// SQLの `=` と同じ意味での等価判定
    pub fn sql_eq(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// LIKEパターンとの照合（`%` と `_` をサポート、大文字小文字は区別しない）
    pub fn matches_like(&self, pattern: &str) -> bool {
        if self.is_null() {
            return false;
        }
        let text: Vec<char> = self.to_string().to_lowercase().chars().collect();
        let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
        like_match(&text, &pattern)
    }

    /// JSONの値から変換する（配列とオブジェクトは値になれない）
    pub fn from_json(json: &serde_json::Value) -> Result<Value, ValueError> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(ValueError::NumberOutOfRange(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(ValueError::UnsupportedJson(other.to_string())),
        }
    }

    /// JSONの値に変換する
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Timestamp(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Null => serde_json::Value::Null,
        }
    }
}

// `%` は0文字以上、`_` はちょうど1文字
fn like_match(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", *b as i64),
            Value::Timestamp(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Integer(val)
    }
}
impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Integer(val as i64)
    }
}
impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Float(val)
    }
}
impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}
impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_string())
    }
}
impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Boolean(val)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(val: DateTime<Utc>) -> Self {
        Value::Timestamp(val)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        val.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Alice Smith", "%ice%", true ; "contains")]
    #[test_case("Alice Smith", "alice%", true ; "prefix ignores case")]
    #[test_case("Alice Smith", "%smith", true ; "suffix")]
    #[test_case("Alice Smith", "%bob%", false ; "missing")]
    #[test_case("Alice", "Al_ce", true ; "single wildcard")]
    #[test_case("Alice", "Alice", true ; "no wildcard")]
    #[test_case("Alic", "Alice", false ; "shorter text")]
    #[test_case("", "%%", true ; "empty keyword")]
    fn like_patterns(text: &str, pattern: &str, expected: bool) {
        assert_eq!(Value::from(text).matches_like(pattern), expected);
    }

    #[test]
    fn like_works_on_non_text_values() {
        assert!(Value::Integer(12345).matches_like("%234%"));
        assert!(!Value::Null.matches_like("%%"));
    }

    #[test]
    fn numeric_comparisons_cross_types() {
        assert_eq!(Value::Integer(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        assert!(Value::Integer(18).sql_eq(&Value::from("18")));
        assert!(Value::Boolean(true).sql_eq(&Value::Integer(1)));
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::from("abc").compare(&Value::Integer(1)), None);
    }

    #[test]
    fn json_conversion_rejects_nested_values() {
        assert_eq!(Value::from_json(&serde_json::json!(3)).unwrap(), Value::Integer(3));
        assert_eq!(Value::from_json(&serde_json::json!(true)).unwrap(), Value::Boolean(true));
        assert!(Value::from_json(&serde_json::json!({"a": 1})).is_err());
    }
}
