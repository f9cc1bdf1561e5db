use chrono::{NaiveDate, NaiveDateTime};

/// Значение одного поля строки.
///
/// Отсутствие значения выражается только через [`Value::Null`]; `NaN` в
/// [`Value::Float`] остаётся значением и отклоняется кодировщиком.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Максимальная длина фрагмента значения в сообщениях об ошибках.
const PREVIEW_CHARS: usize = 32;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Короткое имя варианта.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Описание значения для сообщений об ошибках: вид и усечённое
    /// содержимое.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("bool {b}"),
            Value::Int(i) => format!("int {i}"),
            Value::Float(f) => format!("float {f}"),
            Value::Text(s) => {
                let mut preview: String = s.chars().take(PREVIEW_CHARS).collect();
                if s.chars().count() > PREVIEW_CHARS {
                    preview.push('…');
                }
                format!("text '{preview}'")
            }
            Value::Bytes(b) => format!("bytes ({} bytes)", b.len()),
            Value::Date(d) => format!("date {d}"),
            Value::DateTime(dt) => format!("datetime {dt}"),
        }
    }

    /// Преобразует JSON-значение (строки входных JSON lines).
    ///
    /// Числа без дробной части в диапазоне `i64` становятся [`Value::Int`],
    /// остальные числа [`Value::Float`]. Массивы и объекты не поддерживаются.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Представление значения в JSON (вывод `inspect`).
    ///
    /// Байты выводятся как hex-строка с префиксом `0x`, даты в ISO-8601.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(format!("0x{}", hex::encode_upper(b))),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => {
                serde_json::Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(5u8)), Value::Int(5));
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn test_nan_is_not_null() {
        let v = Value::from(f64::NAN);
        assert!(!v.is_null());
        assert_eq!(v.kind(), "float");
    }

    #[test]
    fn test_describe_truncates_long_text() {
        let v = Value::Text("x".repeat(100));
        let d = v.describe();
        assert!(d.starts_with("text 'xxxx"));
        assert!(d.ends_with("…'"));
        assert!(d.chars().count() < 50);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&json!(null)), Some(Value::Null));
        assert_eq!(Value::from_json(&json!(42)), Some(Value::Int(42)));
        assert_eq!(Value::from_json(&json!(1.5)), Some(Value::Float(1.5)));
        assert_eq!(
            Value::from_json(&json!(u64::MAX)),
            Some(Value::Float(u64::MAX as f64))
        );
        assert_eq!(Value::from_json(&json!("a")), Some(Value::Text("a".into())));
        assert_eq!(Value::from_json(&json!([1])), None);
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Bytes(vec![0xE6, 0x10]).to_json(), json!("0xE610"));
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_micro_opt(13, 45, 30, 123_456)
            .unwrap();
        assert_eq!(Value::DateTime(dt).to_json(), json!("2024-01-15T13:45:30.123456"));
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
    }
}
