//! 数据容器模块
//!
//! [`FieldValues`] 是只允许已声明字段的值表，[`Container`] 在其上
//! 提供按值比较的普通容器/值对象实例

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{DomainError, DomainResult};
use crate::i18n::tf;
use crate::model::meta::{Element, ElementMeta, meta};
use crate::model::pipeline;
use crate::types::DataValue;

/// 受保护的字段值表
///
/// 只能写入元素声明过的数据字段，写入时会经过字段校验
#[derive(Clone)]
pub struct FieldValues {
    meta: Arc<ElementMeta>,
    values: HashMap<String, DataValue>,
}

impl FieldValues {
    pub(crate) fn new(meta: Arc<ElementMeta>) -> Self {
        Self {
            meta,
            values: HashMap::new(),
        }
    }

    /// 所属元素的元数据
    pub fn meta(&self) -> &Arc<ElementMeta> {
        &self.meta
    }

    /// 读取字段值；未声明或未加载的字段返回 None
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.values.get(name)
    }

    /// 字段是否缺失（未设置或为空值）
    pub fn is_absent(&self, name: &str) -> bool {
        self.values.get(name).map(DataValue::is_empty).unwrap_or(true)
    }

    /// 校验并写入字段
    ///
    /// 未声明的名称或反向关联字段返回 [`DomainError::InvalidAttribute`]，
    /// 校验失败返回只包含该字段的 [`DomainError::Validation`]
    pub fn set(&mut self, name: &str, value: impl Into<DataValue>) -> DomainResult<()> {
        let meta = Arc::clone(&self.meta);
        let field = match meta.field(name) {
            Some(field) if !field.field_type.is_association() => field,
            _ => return Err(DomainError::invalid_attribute(meta.name(), name)),
        };

        match pipeline::load_field(&meta, field, Some(value.into())) {
            Ok(loaded) => {
                self.values.insert(name.to_string(), loaded);
                Ok(())
            }
            Err(messages) => Err(DomainError::validation(messages)),
        }
    }

    /// 跳过校验直接写入，仅用于回填适配器生成的值
    pub(crate) fn insert(&mut self, name: String, value: DataValue) {
        self.values.insert(name, value);
    }

    /// 字段名到值的副本
    pub fn to_map(&self) -> HashMap<String, DataValue> {
        self.values.clone()
    }

    pub(crate) fn into_map(self) -> HashMap<String, DataValue> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataValue)> {
        self.values.iter()
    }
}

impl PartialEq for FieldValues {
    fn eq(&self, other: &Self) -> bool {
        self.meta.name() == other.meta.name() && self.values == other.values
    }
}

impl fmt::Debug for FieldValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.meta.name()).field("values", &self.values).finish()
    }
}

/// 普通容器与值对象实例，按值比较
pub struct Container<T: Element> {
    values: FieldValues,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> Container<T> {
    /// 通过构造管道创建实例
    pub fn new(data: HashMap<String, DataValue>) -> DomainResult<Self> {
        let meta = meta::<T>()?;
        if meta.has_identity() {
            return Err(DomainError::incorrect_usage(format!(
                "{} has identity, construct it as an Entity",
                meta.name()
            )));
        }
        let values = pipeline::construct(&meta, data)?;
        Ok(Self {
            values,
            _marker: PhantomData,
        })
    }

    pub fn meta(&self) -> &Arc<ElementMeta> {
        self.values.meta()
    }

    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<DataValue>) -> DomainResult<()> {
        self.values.set(name, value)
    }

    /// 字段值表
    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// 字段名到值的映射
    pub fn to_dict(&self) -> HashMap<String, DataValue> {
        self.values.to_map()
    }

    /// 以当前值为基础替换部分字段，重新走构造管道得到新实例
    pub fn clone_with(&self, changes: HashMap<String, DataValue>) -> DomainResult<Self> {
        let mut data = self.to_dict();
        data.extend(changes);
        Self::new(data)
    }
}

impl<T: Element> Clone for Container<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> PartialEq for Container<T> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<T: Element> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.values, f)
    }
}

impl<T: Element> fmt::Display for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} object", self.meta().name())
    }
}

pub(crate) fn abstract_error(meta: &ElementMeta) -> DomainError {
    DomainError::incorrect_usage(tf("error.abstract_element", &[("element", meta.name())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;
    use crate::error::ErrorMessages;
    use crate::model::convenience::*;
    use crate::model::meta::ElementDecl;

    struct Building;
    impl Element for Building {
        fn declare() -> ElementDecl {
            ElementDecl::container::<Self>()
                .field("name", string_field(Some(50)))
                .field("floors", integer_field(None, None))
                .field("status", string_field(Some(15)).choices(["WIP", "DONE"]))
        }

        fn defaults(values: &mut FieldValues) -> DomainResult<()> {
            if values.is_absent("status") {
                let status = if values.get("floors").and_then(DataValue::as_i64) == Some(4) {
                    "DONE"
                } else {
                    "WIP"
                };
                values.set("status", status)?;
            }
            Ok(())
        }

        fn clean(values: &FieldValues) -> ErrorMessages {
            let mut errors = ErrorMessages::new();
            let floors = values.get("floors").and_then(DataValue::as_i64).unwrap_or(0);
            if floors >= 4 && values.get("status").and_then(DataValue::as_str) != Some("DONE") {
                errors.add("status", "should be DONE");
            }
            errors
        }
    }

    struct Balance;
    impl Element for Balance {
        fn declare() -> ElementDecl {
            ElementDecl::value_object::<Self>()
                .field("currency", string_field(Some(3)).required())
                .field("amount", float_field(None, None).required())
        }
    }

    struct AbstractShape;
    impl Element for AbstractShape {
        fn declare() -> ElementDecl {
            ElementDecl::container::<Self>()
                .abstract_element()
                .field("sides", integer_field(None, None))
        }
    }

    #[test]
    fn test_defaults_hook_fills_absent_field() {
        let building = Container::<Building>::new(data! {"name" => "Foo", "floors" => 4}).unwrap();
        assert_eq!(building.get("status"), Some(&DataValue::from("DONE")));

        let building = Container::<Building>::new(data! {"name" => "Foo", "floors" => 2}).unwrap();
        assert_eq!(building.get("status"), Some(&DataValue::from("WIP")));
    }

    #[test]
    fn test_clean_hook_errors_are_raised() {
        let err = Container::<Building>::new(data! {"name" => "Foo", "floors" => 5, "status" => "WIP"})
            .unwrap_err();
        let messages = err.messages().unwrap();
        assert_eq!(messages.get("status"), Some(&["should be DONE".to_string()][..]));
    }

    #[test]
    fn test_errors_are_accumulated() {
        let err = Container::<Balance>::new(data! {"currency" => "TOOLONG", "amount" => "abc"}).unwrap_err();
        let messages = err.messages().unwrap();
        assert_eq!(messages.fields().collect::<Vec<_>>(), vec!["amount", "currency"]);
    }

    #[test]
    fn test_undeclared_attribute_is_rejected() {
        let mut balance = Container::<Balance>::new(data! {"currency" => "USD", "amount" => 10.0}).unwrap();
        let err = balance.set("owner", "John").unwrap_err();
        assert!(matches!(err, DomainError::InvalidAttribute { ref name, .. } if name == "owner"));

        let err = Container::<Balance>::new(data! {"currency" => "USD", "amount" => 1.0, "owner" => "x"})
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_value_equality_and_clone_with() {
        let a = Container::<Balance>::new(data! {"currency" => "USD", "amount" => 10.0}).unwrap();
        let b = Container::<Balance>::new(data! {"currency" => "USD", "amount" => 10}).unwrap();
        assert_eq!(a, b);

        let c = a.clone_with(data! {"amount" => 20.0}).unwrap();
        assert_ne!(a, c);
        assert_eq!(c.get("currency"), Some(&DataValue::from("USD")));
    }

    #[test]
    fn test_abstract_container_cannot_be_built() {
        let err = Container::<AbstractShape>::new(data! {"sides" => 3}).unwrap_err();
        assert!(matches!(err, DomainError::IncorrectUsage { .. }));
    }
}
