use crate::types::data_value::DataValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 查询键中字段名与查找后缀的分隔符，如 `age__gte`
pub const LOOKUP_SEPARATOR: &str = "__";

/// 查询条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    /// 字段名（存储属性名）
    pub field: String,
    /// 操作符
    pub operator: QueryOperator,
    /// 值
    pub value: DataValue,
    /// 是否大小写不敏感（仅对字符串操作符有效）
    #[serde(default)]
    pub case_insensitive: bool,
}

/// 查询操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryOperator {
    /// 等于
    Eq,
    /// 不等于
    Ne,
    /// 大于
    Gt,
    /// 大于等于
    Gte,
    /// 小于
    Lt,
    /// 小于等于
    Lte,
    /// 包含（字符串或数组元素）
    Contains,
    /// 开始于（字符串）
    StartsWith,
    /// 结束于（字符串）
    EndsWith,
    /// 在列表中
    In,
    /// 不在列表中
    NotIn,
    /// 正则表达式匹配
    Regex,
    /// 为空
    IsNull,
    /// 不为空
    IsNotNull,
}

impl QueryCondition {
    /// 创建相等条件
    pub fn eq(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operator: QueryOperator::Eq,
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// 解析 `field__lookup` 形式的查询键
    ///
    /// 不认识的后缀视为字段名的一部分，按相等比较
    pub fn from_lookup(key: &str, value: DataValue) -> Self {
        let (field, lookup) = match key.rsplit_once(LOOKUP_SEPARATOR) {
            Some((field, lookup)) if !field.is_empty() => (field, lookup),
            _ => return Self::eq(key, value),
        };

        let (operator, case_insensitive) = match lookup {
            "exact" => (QueryOperator::Eq, false),
            "iexact" => (QueryOperator::Eq, true),
            "ne" => (QueryOperator::Ne, false),
            "contains" => (QueryOperator::Contains, false),
            "icontains" => (QueryOperator::Contains, true),
            "gt" => (QueryOperator::Gt, false),
            "gte" => (QueryOperator::Gte, false),
            "lt" => (QueryOperator::Lt, false),
            "lte" => (QueryOperator::Lte, false),
            "in" => (QueryOperator::In, false),
            "nin" => (QueryOperator::NotIn, false),
            "startswith" => (QueryOperator::StartsWith, false),
            "endswith" => (QueryOperator::EndsWith, false),
            "regex" => (QueryOperator::Regex, false),
            "isnull" => {
                let operator = if value.as_bool().unwrap_or(true) {
                    QueryOperator::IsNull
                } else {
                    QueryOperator::IsNotNull
                };
                return Self {
                    field: field.to_string(),
                    operator,
                    value: DataValue::Null,
                    case_insensitive: false,
                };
            }
            _ => return Self::eq(key, value),
        };

        Self {
            field: field.to_string(),
            operator,
            value,
            case_insensitive,
        }
    }

    /// 判断一个属性值是否满足条件，供内存型适配器使用
    ///
    /// `actual` 为 None 表示记录中不存在该属性
    pub fn matches(&self, actual: Option<&DataValue>) -> bool {
        let actual = actual.unwrap_or(&DataValue::Null);
        match self.operator {
            QueryOperator::IsNull => actual.is_null(),
            QueryOperator::IsNotNull => !actual.is_null(),
            QueryOperator::Eq => self.equals(actual, &self.value),
            QueryOperator::Ne => !self.equals(actual, &self.value),
            QueryOperator::Gt => self.ordered(actual, |o| o == Ordering::Greater),
            QueryOperator::Gte => self.ordered(actual, |o| o != Ordering::Less),
            QueryOperator::Lt => self.ordered(actual, |o| o == Ordering::Less),
            QueryOperator::Lte => self.ordered(actual, |o| o != Ordering::Greater),
            QueryOperator::Contains => match actual {
                DataValue::String(s) => self.text_op(s, |hay, needle| hay.contains(needle)),
                DataValue::Array(items) => items.iter().any(|item| self.equals(item, &self.value)),
                _ => false,
            },
            QueryOperator::StartsWith => match actual {
                DataValue::String(s) => self.text_op(s, |hay, needle| hay.starts_with(needle)),
                _ => false,
            },
            QueryOperator::EndsWith => match actual {
                DataValue::String(s) => self.text_op(s, |hay, needle| hay.ends_with(needle)),
                _ => false,
            },
            QueryOperator::In => match &self.value {
                DataValue::Array(options) => options.iter().any(|opt| self.equals(actual, opt)),
                _ => false,
            },
            QueryOperator::NotIn => match &self.value {
                DataValue::Array(options) => !options.iter().any(|opt| self.equals(actual, opt)),
                _ => true,
            },
            QueryOperator::Regex => match (actual, &self.value) {
                (DataValue::String(s), DataValue::String(pattern)) => regex::Regex::new(pattern)
                    .map(|re| re.is_match(s))
                    .unwrap_or(false),
                _ => false,
            },
        }
    }

    fn equals(&self, actual: &DataValue, expected: &DataValue) -> bool {
        match (actual, expected) {
            (DataValue::String(a), DataValue::String(b)) if self.case_insensitive => {
                a.to_lowercase() == b.to_lowercase()
            }
            _ => actual == expected || actual.compare(expected) == Some(Ordering::Equal),
        }
    }

    fn ordered(&self, actual: &DataValue, accept: impl Fn(Ordering) -> bool) -> bool {
        if actual.is_null() {
            return false;
        }
        actual.compare(&self.value).map(accept).unwrap_or(false)
    }

    fn text_op(&self, haystack: &str, op: impl Fn(&str, &str) -> bool) -> bool {
        let Some(needle) = self.value.as_str() else {
            return false;
        };
        if self.case_insensitive {
            op(&haystack.to_lowercase(), &needle.to_lowercase())
        } else {
            op(haystack, needle)
        }
    }
}

/// 排序配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortConfig {
    /// 字段名
    pub field: String,
    /// 排序方向
    pub direction: SortDirection,
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// 升序
    Asc,
    /// 降序
    Desc,
}

impl SortConfig {
    /// 解析排序项，前缀 `-` 表示降序
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                direction: SortDirection::Desc,
            },
            None => Self {
                field: spec.to_string(),
                direction: SortDirection::Asc,
            },
        }
    }
}
