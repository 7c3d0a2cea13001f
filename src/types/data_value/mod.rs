//! 动态数据值
//!
//! 字段值、查询值和存储记录共用同一种表示。数组和对象可以嵌套，
//! 嵌入的值对象在实体内部就是一个 `Object`

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 通用数据值
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// 字节数组，转换为JSON时编码为base64
    Bytes(Vec<u8>),
    /// 带时区偏移的日期时间
    DateTime(DateTime<FixedOffset>),
    DateTimeUTC(DateTime<Utc>),
    Uuid(Uuid),
    /// 未拆解的JSON，字段加载时展开为数组或对象
    Json(JsonValue),
    Array(Vec<DataValue>),
    /// 对象或嵌入值
    Object(HashMap<String, DataValue>),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// null、空字符串、空数组、空对象都视为"空"，必填字段遇到时按缺失处理
    pub fn is_empty(&self) -> bool {
        match self {
            DataValue::Null | DataValue::Json(JsonValue::Null) => true,
            DataValue::String(s) => s.is_empty(),
            DataValue::Array(items) => items.is_empty(),
            DataValue::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let DataValue::String(s) = self { Some(s) } else { None }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if let DataValue::Int(i) = self { Some(*i) } else { None }
    }

    /// 整数也可以按浮点数读取
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let DataValue::Bool(b) = self { Some(*b) } else { None }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, DataValue>> {
        if let DataValue::Object(map) = self { Some(map) } else { None }
    }

    pub fn as_array(&self) -> Option<&[DataValue]> {
        if let DataValue::Array(items) = self { Some(items) } else { None }
    }

    /// 排序比较
    ///
    /// Null 排在所有非空值之前，整数与浮点数、UUID与字符串、两种日期时间之间可以互相比较，
    /// 其余不同类型返回 None
    pub fn compare(&self, other: &DataValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::String(b)) => Some(a.to_string().as_str().cmp(b.as_str())),
            (Self::String(a), Self::Uuid(b)) => Some(a.as_str().cmp(b.to_string().as_str())),
            (Self::DateTime(_) | Self::DateTimeUTC(_), Self::DateTime(_) | Self::DateTimeUTC(_)) => {
                Some(self.instant()?.cmp(&other.instant()?))
            }
            _ => None,
        }
    }

    fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            DataValue::DateTime(dt) => Some(dt.with_timezone(&Utc)),
            DataValue::DateTimeUTC(dt) => Some(*dt),
            _ => None,
        }
    }

    /// 转换为不带类型标签的JSON
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            DataValue::Null => JsonValue::Null,
            DataValue::Bool(b) => JsonValue::Bool(*b),
            DataValue::Int(i) => JsonValue::from(*i),
            // NaN 和无穷大没有JSON表示
            DataValue::Float(f) => serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            DataValue::Bytes(bytes) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            DataValue::Json(json) => json.clone(),
            DataValue::Array(items) => items.iter().map(DataValue::to_json_value).collect(),
            DataValue::Object(map) => JsonValue::Object(
                map.iter().map(|(key, value)| (key.clone(), value.to_json_value())).collect(),
            ),
            DataValue::String(_) | DataValue::DateTime(_) | DataValue::DateTimeUTC(_) | DataValue::Uuid(_) => {
                JsonValue::String(self.to_string())
            }
        }
    }

    /// 把JSON拆解为数组、对象和标量，与 [`to_json_value`](Self::to_json_value) 互逆
    pub fn from_json(json: JsonValue) -> DataValue {
        match json {
            JsonValue::Null => DataValue::Null,
            JsonValue::Bool(b) => DataValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Int(i),
                None => n.as_f64().map_or(DataValue::Null, DataValue::Float),
            },
            JsonValue::String(s) => DataValue::String(s),
            JsonValue::Array(items) => DataValue::Array(items.into_iter().map(DataValue::from_json).collect()),
            JsonValue::Object(map) => {
                DataValue::Object(map.into_iter().map(|(key, value)| (key, DataValue::from_json(value))).collect())
            }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => f.write_str("null"),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Float(v) => write!(f, "{}", v),
            DataValue::String(s) => f.write_str(s),
            DataValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            DataValue::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            DataValue::DateTimeUTC(dt) => f.write_str(&dt.to_rfc3339()),
            DataValue::Uuid(uuid) => write!(f, "{}", uuid),
            DataValue::Json(json) => write!(f, "{}", json),
            DataValue::Array(_) | DataValue::Object(_) => write!(f, "{}", self.to_json_value()),
        }
    }
}

// 日志和断言里直接显示值
impl fmt::Debug for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! impl_from {
    ($($source:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$source> for DataValue {
                fn from($v: $source) -> Self {
                    $body
                }
            }
        )*
    };
}

impl_from! {
    bool => |v| DataValue::Bool(v),
    i32 => |v| DataValue::Int(i64::from(v)),
    i64 => |v| DataValue::Int(v),
    u32 => |v| DataValue::Int(i64::from(v)),
    f32 => |v| DataValue::Float(f64::from(v)),
    f64 => |v| DataValue::Float(v),
    String => |v| DataValue::String(v),
    &str => |v| DataValue::String(v.to_owned()),
    &String => |v| DataValue::String(v.clone()),
    Uuid => |v| DataValue::Uuid(v),
    DateTime<Utc> => |v| DataValue::DateTimeUTC(v),
    DateTime<FixedOffset> => |v| DataValue::DateTime(v),
    JsonValue => |v| DataValue::Json(v),
    HashMap<String, DataValue> => |v| DataValue::Object(v),
    &DataValue => |v| v.clone(),
}

impl<T: Into<DataValue>> From<Vec<T>> for DataValue {
    fn from(items: Vec<T>) -> Self {
        DataValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DataValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(DataValue::Null.is_empty());
        assert!(DataValue::from("").is_empty());
        assert!(DataValue::Array(vec![]).is_empty());
        assert!(!DataValue::from(0).is_empty());
        assert!(!DataValue::from(false).is_empty());
    }

    #[test]
    fn test_compare_mixed_kinds() {
        assert_eq!(DataValue::Int(3).compare(&DataValue::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(DataValue::Null.compare(&DataValue::Int(1)), Some(Ordering::Less));
        assert_eq!(DataValue::from("a").compare(&DataValue::Int(1)), None);

        let utc = Utc::now();
        let shifted = DataValue::DateTime(utc.fixed_offset());
        assert_eq!(shifted.compare(&DataValue::DateTimeUTC(utc)), Some(Ordering::Equal));
    }

    #[test]
    fn test_json_is_untagged() {
        let json = serde_json::json!({"name": "Jim", "tags": [1, 2.5], "ok": true});
        let value = DataValue::from_json(json.clone());
        let obj = value.as_object().expect("应当是对象");
        assert_eq!(obj.get("name"), Some(&DataValue::from("Jim")));
        assert_eq!(value.to_json_value(), json);
        assert_eq!(DataValue::from(vec![1, 2]).to_string(), "[1,2]");
    }
}
