//! 字段类型定义模块
//!
//! 定义元素字段的类型、约束、加载校验以及与存储值之间的双向转换

use crate::model::meta::ElementRef;
use crate::types::DataValue;
use chrono::{DateTime, NaiveDateTime};
use std::fmt;

/// 必填字段缺失时的消息
pub const MSG_REQUIRED: &str = "is required";
/// 类型不匹配时的消息
pub const MSG_INVALID: &str = "Value is not a valid type for this field.";

/// 字段类型枚举
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// 自动生成的标识；`increment` 为 true 时由适配器生成序列值
    Auto { increment: bool },
    /// 用户提供的标识（字符串或整数）
    Identifier,
    /// 字符串类型
    String {
        max_length: Option<usize>,
        min_length: Option<usize>,
        regex: Option<String>,
    },
    /// 文本类型
    Text,
    /// 整数类型
    Integer {
        min_value: Option<i64>,
        max_value: Option<i64>,
    },
    /// 浮点数类型
    Float {
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
    /// 布尔类型
    Boolean,
    /// 日期时间类型
    DateTime,
    /// UUID类型
    Uuid,
    /// 字典类型
    Dict,
    /// 列表类型
    List { item_type: Box<FieldType> },
    /// 指向另一个聚合的多对一引用，保存对方的标识
    Reference { target: ElementRef, via: Option<String> },
    /// 反向一对一关联，按需从子元素的存储中读取
    HasOne { target: ElementRef, via: Option<String> },
    /// 反向一对多关联，变更先暂存，保存所属实体时落盘
    HasMany { target: ElementRef, via: Option<String> },
    /// 嵌入的值对象，存储时展开为影子属性
    ValueObject { target: ElementRef },
}

impl FieldType {
    /// 是否为反向关联（不持有数据）
    pub fn is_association(&self) -> bool {
        matches!(self, FieldType::HasOne { .. } | FieldType::HasMany { .. })
    }

    /// 关联/嵌入字段指向的元素
    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            FieldType::Reference { target, .. }
            | FieldType::HasOne { target, .. }
            | FieldType::HasMany { target, .. }
            | FieldType::ValueObject { target } => Some(target),
            _ => None,
        }
    }

    /// 将原始值转换为本类型的规范值
    fn cast(&self, value: DataValue) -> Result<DataValue, Vec<String>> {
        match self {
            FieldType::Auto { .. } | FieldType::Identifier | FieldType::Reference { .. } => {
                cast_identity(value)
            }
            FieldType::String { max_length, min_length, regex } => {
                let s = cast_string(value)?;
                let mut errors = Vec::new();
                let length = s.chars().count();
                if let Some(max) = max_length {
                    if length > *max {
                        errors.push(format!(
                            "Ensure this value has at most {} characters (it has {}).",
                            max, length
                        ));
                    }
                }
                if let Some(min) = min_length {
                    if length < *min {
                        errors.push(format!(
                            "Ensure this value has at least {} characters (it has {}).",
                            min, length
                        ));
                    }
                }
                if let Some(pattern) = regex {
                    match regex::Regex::new(pattern) {
                        Ok(re) if re.is_match(&s) => {}
                        Ok(_) => errors.push(format!("'{}' does not match the pattern {}.", s, pattern)),
                        Err(e) => errors.push(format!("Invalid pattern {}: {}", pattern, e)),
                    }
                }
                if errors.is_empty() {
                    Ok(DataValue::String(s))
                } else {
                    Err(errors)
                }
            }
            FieldType::Text => cast_string(value).map(DataValue::String),
            FieldType::Integer { min_value, max_value } => {
                let i = match value {
                    DataValue::Int(i) => i,
                    DataValue::Float(f) if f.is_finite() => f.trunc() as i64,
                    DataValue::String(ref s) => match s.trim().parse::<i64>() {
                        Ok(i) => i,
                        Err(_) => match s.trim().parse::<f64>() {
                            Ok(f) if f.is_finite() => f.trunc() as i64,
                            _ => return Err(vec![format!("'{}' value must be an integer.", s)]),
                        },
                    },
                    other => return Err(vec![format!("'{}' value must be an integer.", other)]),
                };
                let mut errors = Vec::new();
                if let Some(min) = min_value {
                    if i < *min {
                        errors.push(format!("Ensure this value is greater than or equal to {}.", min));
                    }
                }
                if let Some(max) = max_value {
                    if i > *max {
                        errors.push(format!("Ensure this value is less than or equal to {}.", max));
                    }
                }
                if errors.is_empty() { Ok(DataValue::Int(i)) } else { Err(errors) }
            }
            FieldType::Float { min_value, max_value } => {
                let f = match value {
                    DataValue::Float(f) => f,
                    DataValue::Int(i) => i as f64,
                    DataValue::String(ref s) => match s.trim().parse::<f64>() {
                        Ok(f) => f,
                        Err(_) => return Err(vec![format!("'{}' value must be a float.", s)]),
                    },
                    other => return Err(vec![format!("'{}' value must be a float.", other)]),
                };
                let mut errors = Vec::new();
                if let Some(min) = min_value {
                    if f < *min {
                        errors.push(format!("Ensure this value is greater than or equal to {}.", min));
                    }
                }
                if let Some(max) = max_value {
                    if f > *max {
                        errors.push(format!("Ensure this value is less than or equal to {}.", max));
                    }
                }
                if errors.is_empty() { Ok(DataValue::Float(f)) } else { Err(errors) }
            }
            FieldType::Boolean => match value {
                DataValue::Bool(b) => Ok(DataValue::Bool(b)),
                DataValue::Int(0) => Ok(DataValue::Bool(false)),
                DataValue::Int(1) => Ok(DataValue::Bool(true)),
                DataValue::String(ref s) => match s.trim().to_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Ok(DataValue::Bool(true)),
                    "false" | "f" | "no" | "n" | "0" => Ok(DataValue::Bool(false)),
                    _ => Err(vec![format!("'{}' value must be either True or False.", s)]),
                },
                other => Err(vec![format!("'{}' value must be either True or False.", other)]),
            },
            FieldType::DateTime => match value {
                DataValue::DateTime(dt) => Ok(DataValue::DateTime(dt)),
                DataValue::DateTimeUTC(dt) => Ok(DataValue::DateTime(dt.fixed_offset())),
                DataValue::String(ref s) => parse_datetime(s)
                    .map(DataValue::DateTime)
                    .ok_or_else(|| vec![format!("'{}' value has an invalid format.", s)]),
                other => Err(vec![format!("'{}' value has an invalid format.", other)]),
            },
            FieldType::Uuid => match value {
                DataValue::Uuid(u) => Ok(DataValue::Uuid(u)),
                DataValue::String(ref s) => uuid::Uuid::parse_str(s)
                    .map(DataValue::Uuid)
                    .map_err(|_| vec![format!("'{}' is not a valid UUID.", s)]),
                other => Err(vec![format!("'{}' is not a valid UUID.", other)]),
            },
            FieldType::Dict => match value {
                DataValue::Object(obj) => Ok(DataValue::Object(obj)),
                DataValue::Json(json @ serde_json::Value::Object(_)) => {
                    Ok(DataValue::from_json(json))
                }
                _ => Err(vec![MSG_INVALID.to_string()]),
            },
            FieldType::List { item_type } => match value {
                DataValue::Array(items) => {
                    let mut cast = Vec::with_capacity(items.len());
                    let mut errors = Vec::new();
                    for item in items {
                        match item_type.cast(item) {
                            Ok(v) => cast.push(v),
                            Err(e) => errors.extend(e),
                        }
                    }
                    if errors.is_empty() { Ok(DataValue::Array(cast)) } else { Err(errors) }
                }
                DataValue::Json(json @ serde_json::Value::Array(_)) => {
                    self.cast(DataValue::from_json(json))
                }
                _ => Err(vec![MSG_INVALID.to_string()]),
            },
            // 嵌入值由构造管道递归校验，这里只检查形状
            FieldType::ValueObject { .. } => match value {
                DataValue::Object(obj) => Ok(DataValue::Object(obj)),
                _ => Err(vec![MSG_INVALID.to_string()]),
            },
            FieldType::HasOne { .. } | FieldType::HasMany { .. } => Err(vec![MSG_INVALID.to_string()]),
        }
    }

    /// 规范值转换为存储值
    fn to_storage(&self, value: &DataValue) -> DataValue {
        match (self, value) {
            (_, DataValue::Null) => DataValue::Null,
            (_, DataValue::Uuid(u)) => DataValue::String(u.to_string()),
            (FieldType::DateTime, DataValue::DateTime(dt)) => DataValue::String(dt.to_rfc3339()),
            (FieldType::DateTime, DataValue::DateTimeUTC(dt)) => DataValue::String(dt.to_rfc3339()),
            (FieldType::List { item_type }, DataValue::Array(items)) => {
                DataValue::Array(items.iter().map(|item| item_type.to_storage(item)).collect())
            }
            (_, other) => other.clone(),
        }
    }
}

fn cast_identity(value: DataValue) -> Result<DataValue, Vec<String>> {
    match value {
        DataValue::String(s) => Ok(DataValue::String(s)),
        DataValue::Int(i) => Ok(DataValue::Int(i)),
        DataValue::Uuid(u) => Ok(DataValue::String(u.to_string())),
        _ => Err(vec![MSG_INVALID.to_string()]),
    }
}

fn cast_string(value: DataValue) -> Result<String, Vec<String>> {
    match value {
        DataValue::String(s) => Ok(s),
        DataValue::Int(_) | DataValue::Float(_) | DataValue::Bool(_) | DataValue::Uuid(_) => {
            Ok(value.to_string())
        }
        _ => Err(vec![MSG_INVALID.to_string()]),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<chrono::FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// 字段默认值
#[derive(Clone)]
pub enum FieldDefault {
    /// 固定值
    Value(DataValue),
    /// 每次取值时调用的工厂函数
    Factory(fn() -> DataValue),
}

impl FieldDefault {
    /// 产生一个默认值
    pub fn produce(&self) -> DataValue {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(v) => write!(f, "Value({})", v),
            FieldDefault::Factory(_) => write!(f, "Factory"),
        }
    }
}

/// 字段定义
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// 字段名，由元素声明时填入
    pub name: String,
    /// 存储属性名覆盖
    pub referenced_as: Option<String>,
    /// 字段类型
    pub field_type: FieldType,
    /// 是否必填
    pub required: bool,
    /// 是否唯一
    pub unique: bool,
    /// 是否为标识字段
    pub identifier: bool,
    /// 默认值
    pub default: Option<FieldDefault>,
    /// 可选值列表
    pub choices: Option<Vec<DataValue>>,
    /// 字段描述
    pub description: Option<String>,
}

impl FieldDefinition {
    /// 创建新的字段定义
    pub fn new(field_type: FieldType) -> Self {
        Self {
            name: String::new(),
            referenced_as: None,
            field_type,
            required: false,
            unique: false,
            identifier: false,
            default: None,
            choices: None,
            description: None,
        }
    }

    /// 设置为必填字段
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// 设置为唯一字段
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// 设置为标识字段，标识字段总是必填且唯一
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self.required = true;
        self.unique = true;
        self
    }

    /// 设置默认值
    pub fn default_value(mut self, value: impl Into<DataValue>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// 设置默认值工厂
    pub fn default_with(mut self, factory: fn() -> DataValue) -> Self {
        self.default = Some(FieldDefault::Factory(factory));
        self
    }

    /// 设置可选值
    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DataValue>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// 设置存储属性名
    pub fn referenced_as(mut self, attribute: &str) -> Self {
        self.referenced_as = Some(attribute.to_string());
        self
    }

    /// 设置关联属性
    ///
    /// 引用字段上是目标元素中被引用的属性，反向关联上是子元素中保存所属标识的属性
    pub fn via(mut self, attribute: &str) -> Self {
        match &mut self.field_type {
            FieldType::Reference { via, .. }
            | FieldType::HasOne { via, .. }
            | FieldType::HasMany { via, .. } => *via = Some(attribute.to_string()),
            _ => {}
        }
        self
    }

    /// 设置字段描述
    pub fn description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// 字符串最大长度
    pub fn max_length(&self) -> Option<usize> {
        match &self.field_type {
            FieldType::String { max_length, .. } => *max_length,
            _ => None,
        }
    }

    /// 是否由适配器生成序列值
    pub fn is_increment(&self) -> bool {
        matches!(self.field_type, FieldType::Auto { increment: true })
    }

    /// 是否为自动生成的字段
    pub fn is_auto(&self) -> bool {
        matches!(self.field_type, FieldType::Auto { .. })
    }

    /// 存储属性名
    ///
    /// 引用字段为 `{字段名}_{目标属性}`，目标属性缺省为目标的标识属性，`via` 可以覆盖
    pub fn attribute_name(&self) -> String {
        if let Some(attr) = &self.referenced_as {
            return attr.clone();
        }
        match &self.field_type {
            FieldType::Reference { target, via } => {
                let linked = via.clone().unwrap_or_else(|| target.id_attribute());
                format!("{}_{}", self.name, linked)
            }
            _ => self.name.clone(),
        }
    }

    /// 加载并校验一个原始值
    ///
    /// `raw` 为 None 表示调用方没有提供该字段：有默认值时取默认值，
    /// 必填时报告缺失，否则为 Null
    pub fn load(&self, raw: Option<DataValue>) -> Result<DataValue, Vec<String>> {
        let value = match raw {
            Some(value) => value,
            None => match &self.default {
                Some(default) => default.produce(),
                None => DataValue::Null,
            },
        };

        if value.is_empty() {
            // 序列标识在持久化之前允许为空
            if self.required && !self.is_increment() {
                return Err(vec![MSG_REQUIRED.to_string()]);
            }
            if value.is_null() {
                return Ok(DataValue::Null);
            }
        }

        let value = self.field_type.cast(value)?;
        self.check_choices(&value)?;
        Ok(value)
    }

    fn check_choices(&self, value: &DataValue) -> Result<(), Vec<String>> {
        let Some(choices) = &self.choices else {
            return Ok(());
        };
        let candidates: Vec<&DataValue> = match value {
            DataValue::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let mut errors = Vec::new();
        for candidate in candidates {
            if !candidate.is_null() && !choices.contains(candidate) {
                let allowed: Vec<String> = choices.iter().map(repr).collect();
                errors.push(format!(
                    "Value `{}` is not a valid choice. Must be among [{}]",
                    repr(candidate),
                    allowed.join(", ")
                ));
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// 规范值转换为存储值
    pub fn to_storage(&self, value: &DataValue) -> DataValue {
        self.field_type.to_storage(value)
    }

    /// 存储值还原为规范值，与 [`to_storage`](Self::to_storage) 对称
    pub fn from_storage(&self, stored: DataValue) -> Result<DataValue, Vec<String>> {
        if stored.is_null() {
            return Ok(DataValue::Null);
        }
        self.field_type.cast(stored)
    }
}

fn repr(value: &DataValue) -> String {
    match value {
        DataValue::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::convenience::*;

    #[test]
    fn test_absent_required_field() {
        let field = string_field(Some(50)).required().named("first_name");
        assert_eq!(field.load(None), Err(vec![MSG_REQUIRED.to_string()]));
        assert_eq!(field.load(Some(DataValue::from(""))), Err(vec![MSG_REQUIRED.to_string()]));
    }

    #[test]
    fn test_absent_optional_field_uses_default() {
        let field = integer_field(None, None).default_value(21).named("age");
        assert_eq!(field.load(None), Ok(DataValue::Int(21)));
        let field = integer_field(None, None).named("age");
        assert_eq!(field.load(None), Ok(DataValue::Null));
    }

    #[test]
    fn test_integer_coercion() {
        let field = integer_field(None, None).named("age");
        assert_eq!(field.load(Some(DataValue::Float(3.7))), Ok(DataValue::Int(3)));
        assert_eq!(field.load(Some(DataValue::from("42"))), Ok(DataValue::Int(42)));
        assert_eq!(
            field.load(Some(DataValue::from("abc"))),
            Err(vec!["'abc' value must be an integer.".to_string()])
        );
    }

    #[test]
    fn test_max_length() {
        let field = string_field(Some(3)).named("code");
        let errors = field.load(Some(DataValue::from("abcd"))).unwrap_err();
        assert_eq!(errors, vec!["Ensure this value has at most 3 characters (it has 4).".to_string()]);
        assert_eq!(field.max_length(), Some(3));
    }

    #[test]
    fn test_choices() {
        let field = string_field(Some(15)).choices(["WIP", "DONE"]).named("status");
        assert!(field.load(Some(DataValue::from("DONE"))).is_ok());
        let errors = field.load(Some(DataValue::from("OPEN"))).unwrap_err();
        assert_eq!(errors, vec!["Value `'OPEN'` is not a valid choice. Must be among ['WIP', 'DONE']".to_string()]);
    }

    #[test]
    fn test_increment_auto_may_be_empty() {
        let field = auto_field(true).identifier().named("id");
        assert_eq!(field.load(None), Ok(DataValue::Null));
        let field = auto_field(false).identifier().named("id");
        assert!(field.load(None).is_err());
    }

    #[test]
    fn test_storage_round_trip() {
        let field = datetime_field().named("born_at");
        let value = field.load(Some(DataValue::from("2020-01-02T03:04:05.123456+08:00"))).unwrap();
        let stored = field.to_storage(&value);
        assert!(matches!(stored, DataValue::String(_)));
        assert_eq!(field.from_storage(stored), Ok(value));

        let field = uuid_field().named("token");
        let value = DataValue::Uuid(uuid::Uuid::new_v4());
        assert_eq!(field.from_storage(field.to_storage(&value)), Ok(value));
    }

    #[test]
    fn test_list_items_are_cast() {
        let field = list_field(FieldType::Integer { min_value: None, max_value: None }).named("scores");
        assert_eq!(
            field.load(Some(DataValue::from(vec!["1", "2"]))),
            Ok(DataValue::Array(vec![DataValue::Int(1), DataValue::Int(2)]))
        );
    }
}
