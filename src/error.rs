//! 错误处理模块
//!
//! 定义领域层统一的错误类型。面向用户的描述在构造时通过 i18n 生成，
//! 结构化信息（字段错误表、模式名、查询条件等）保存在各变体字段中

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::i18n::tf;

/// 按字段聚合的错误消息表
///
/// 校验过程中先累积全部错误，最后一次性抛出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMessages {
    inner: BTreeMap<String, Vec<String>>,
}

impl ErrorMessages {
    /// 创建空的错误表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建只包含一条消息的错误表
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut messages = Self::new();
        messages.add(field, message);
        messages
    }

    /// 为字段追加一条消息
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.inner.entry(field.into()).or_default().push(message.into());
    }

    /// 为字段追加多条消息
    pub fn extend<I, S>(&mut self, field: impl Into<String>, messages: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.inner.entry(field.into()).or_default();
        entry.extend(messages.into_iter().map(Into::into));
    }

    /// 合并另一张错误表
    pub fn merge(&mut self, other: ErrorMessages) {
        for (field, messages) in other.inner {
            self.extend(field, messages);
        }
    }

    /// 以 `{prefix}_{field}` 的形式重新命名后合并
    pub fn merge_prefixed(&mut self, prefix: &str, other: ErrorMessages) {
        for (field, messages) in other.inner {
            self.extend(format!("{}_{}", prefix, field), messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// 获取字段的全部消息
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.inner.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.contains_key(field)
    }

    /// 出错字段名（有序）
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.inner.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.inner
    }
}

impl fmt::Display for ErrorMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.inner {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: [{}]", field, messages.join(", "))?;
        }
        Ok(())
    }
}

impl From<BTreeMap<String, Vec<String>>> for ErrorMessages {
    fn from(inner: BTreeMap<String, Vec<String>>) -> Self {
        Self { inner }
    }
}

/// 领域层错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 字段级或跨字段校验失败
    #[error("{message}")]
    Validation {
        messages: ErrorMessages,
        message: String,
    },

    /// 查询没有匹配到任何记录
    #[error("{message}")]
    ObjectNotFound {
        schema: String,
        criteria: String,
        message: String,
    },

    /// 对未声明属性的赋值，或对关联字段的误用
    #[error("{message}")]
    InvalidAttribute { name: String, message: String },

    /// 编程错误：实例化抽象类型、缺少聚合声明等
    #[error("{message}")]
    IncorrectUsage { message: String },

    /// 存储适配器透传的错误
    #[error("{message}")]
    Adapter { adapter: String, message: String },

    /// 配置或注册表错误
    #[error("{message}")]
    Config { message: String },

    /// 序列化错误
    #[error("{message}")]
    Serialization { message: String },

    /// IO错误
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 第三方适配器的其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomainError {
    /// 构造校验错误
    pub fn validation(messages: ErrorMessages) -> Self {
        let message = tf("error.validation", &[("message", &messages.to_string())]);
        DomainError::Validation { messages, message }
    }

    /// 构造未找到错误
    pub fn not_found(schema: impl Into<String>, criteria: impl Into<String>) -> Self {
        let schema = schema.into();
        let criteria = criteria.into();
        let message = tf("error.not_found", &[("schema", &schema), ("criteria", &criteria)]);
        DomainError::ObjectNotFound { schema, criteria, message }
    }

    /// 构造非法属性错误
    pub fn invalid_attribute(element: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let message = tf("error.invalid_attribute", &[("element", element), ("name", &name)]);
        DomainError::InvalidAttribute { name, message }
    }

    /// 构造用法错误
    pub fn incorrect_usage(message: impl Into<String>) -> Self {
        let message = tf("error.incorrect_usage", &[("message", &message.into())]);
        DomainError::IncorrectUsage { message }
    }

    /// 构造适配器错误
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        let adapter = adapter.into();
        let message = tf("error.adapter", &[("adapter", &adapter), ("message", &message.into())]);
        DomainError::Adapter { adapter, message }
    }

    /// 构造配置错误
    pub fn config(message: impl Into<String>) -> Self {
        let message = tf("error.config", &[("message", &message.into())]);
        DomainError::Config { message }
    }

    /// 构造序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        let message = tf("error.serialization", &[("message", &message.into())]);
        DomainError::Serialization { message }
    }

    /// 校验错误对应的字段错误表
    pub fn messages(&self) -> Option<&ErrorMessages> {
        match self {
            DomainError::Validation { messages, .. } => Some(messages),
            _ => None,
        }
    }
}

/// 领域层结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 快速创建错误的宏
#[macro_export]
macro_rules! domain_error {
    (validation, $field:expr, $msg:expr) => {
        $crate::error::DomainError::validation($crate::error::ErrorMessages::single($field, $msg))
    };
    (usage, $msg:expr) => {
        $crate::error::DomainError::incorrect_usage($msg)
    };
    (adapter, $adapter:expr, $msg:expr) => {
        $crate::error::DomainError::adapter($adapter, $msg)
    };
    (config, $msg:expr) => {
        $crate::error::DomainError::config($msg)
    };
    (serialization, $msg:expr) => {
        $crate::error::DomainError::serialization($msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefixed_renames_keys() {
        let mut nested = ErrorMessages::new();
        nested.add("street", "is required");
        nested.add("zip", "is invalid");

        let mut parent = ErrorMessages::single("name", "is required");
        parent.merge_prefixed("address", nested);

        assert_eq!(parent.len(), 3);
        assert_eq!(parent.get("address_street"), Some(&["is required".to_string()][..]));
        assert!(parent.contains("address_zip"));
        assert!(!parent.contains("street"));
    }

    #[test]
    fn test_validation_error_carries_messages() {
        let err = domain_error!(validation, "age", "is required");
        let messages = err.messages().expect("应当是校验错误");
        assert_eq!(messages.fields().collect::<Vec<_>>(), vec!["age"]);
    }

    #[test]
    fn test_display_is_ordered() {
        let mut messages = ErrorMessages::new();
        messages.add("b", "two");
        messages.add("a", "one");
        messages.add("a", "uno");
        assert_eq!(messages.to_string(), "a: [one, uno]; b: [two]");
    }
}
