//! 元素选项模块
//!
//! 每个元素类型的选项只解析一次：本类型显式声明的值优先，
//! 其次是父类型已解析的值（仅限可继承选项），最后是类型默认值

use convert_case::{Case, Casing};

use crate::model::meta::ElementRef;

/// 元素种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// 普通数据容器
    Container,
    /// 值对象，按值比较，没有标识
    ValueObject,
    /// 实体，必须声明所属聚合
    Entity,
    /// 聚合根
    Aggregate,
    /// 事件溯源聚合
    EventSourcedAggregate,
}

impl ElementKind {
    /// 是否拥有标识和生命周期
    pub fn has_identity(&self) -> bool {
        matches!(
            self,
            ElementKind::Entity | ElementKind::Aggregate | ElementKind::EventSourcedAggregate
        )
    }
}

/// 在本类型上显式声明的选项
#[derive(Debug, Clone, Default)]
pub(crate) struct OptionOverrides {
    pub is_abstract: Option<bool>,
    pub schema_name: Option<String>,
    pub provider: Option<String>,
    pub aggregate_cls: Option<ElementRef>,
    pub order_by: Option<Vec<String>>,
    pub stream_name: Option<String>,
}

/// 解析完成的元素选项
#[derive(Debug, Clone)]
pub struct ElementOptions {
    /// 抽象类型不能实例化，不继承
    pub is_abstract: bool,
    /// 存储模式名，默认是类型名的 snake_case，不继承
    pub schema_name: String,
    /// 存储提供者键
    pub provider: String,
    /// 所属聚合
    pub aggregate_cls: Option<ElementRef>,
    /// 默认排序，`-` 前缀表示降序
    pub order_by: Vec<String>,
    /// 事件流名，仅事件溯源聚合有值
    pub stream_name: Option<String>,
}

impl ElementOptions {
    pub(crate) fn resolve(
        type_name: &str,
        kind: ElementKind,
        overrides: &OptionOverrides,
        parent: Option<&ElementOptions>,
    ) -> Self {
        let snake_name = type_name.to_case(Case::Snake);

        let provider = overrides
            .provider
            .clone()
            .or_else(|| parent.map(|p| p.provider.clone()))
            .unwrap_or_else(|| crate::config::current().default_provider.clone());

        let aggregate_cls = overrides
            .aggregate_cls
            .or_else(|| parent.and_then(|p| p.aggregate_cls));

        let order_by = overrides
            .order_by
            .clone()
            .or_else(|| parent.map(|p| p.order_by.clone()))
            .unwrap_or_default();

        let stream_name = match kind {
            ElementKind::EventSourcedAggregate => Some(
                overrides
                    .stream_name
                    .clone()
                    .or_else(|| parent.and_then(|p| p.stream_name.clone()))
                    .unwrap_or_else(|| snake_name.clone()),
            ),
            _ => None,
        };

        Self {
            is_abstract: overrides.is_abstract.unwrap_or(false),
            schema_name: overrides.schema_name.clone().unwrap_or(snake_name),
            provider,
            aggregate_cls,
            order_by,
            stream_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_parent() {
        let options = ElementOptions::resolve(
            "PersonAutoSSN",
            ElementKind::Aggregate,
            &OptionOverrides::default(),
            None,
        );
        assert_eq!(options.schema_name, "person_auto_ssn");
        assert_eq!(options.provider, "default");
        assert!(!options.is_abstract);
        assert!(options.order_by.is_empty());
        assert!(options.stream_name.is_none());
    }

    #[test]
    fn test_inheritance_rules() {
        let parent_overrides = OptionOverrides {
            is_abstract: Some(true),
            schema_name: Some("pepes".to_string()),
            provider: Some("non-default".to_string()),
            order_by: Some(vec!["-age".to_string()]),
            ..Default::default()
        };
        let parent = ElementOptions::resolve("DbPerson", ElementKind::Aggregate, &parent_overrides, None);
        let child = ElementOptions::resolve(
            "SqlPerson",
            ElementKind::Aggregate,
            &OptionOverrides::default(),
            Some(&parent),
        );

        // schema_name 与 abstract 不继承
        assert_eq!(child.schema_name, "sql_person");
        assert!(!child.is_abstract);
        assert_eq!(child.provider, "non-default");
        assert_eq!(child.order_by, vec!["-age".to_string()]);
    }

    #[test]
    fn test_stream_name_for_event_sourced() {
        let options = ElementOptions::resolve(
            "UserAccount",
            ElementKind::EventSourcedAggregate,
            &OptionOverrides::default(),
            None,
        );
        assert_eq!(options.stream_name.as_deref(), Some("user_account"));
    }
}
