//! 元素声明与元数据模块
//!
//! 元素类型通过 [`Element::declare`] 显式给出字段表和选项，
//! 第一次使用时解析为不可变的 [`ElementMeta`] 并按类型缓存

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rat_logger::debug;

use crate::error::{DomainError, DomainResult, ErrorMessages};
use crate::i18n::tf;
use crate::model::container::FieldValues;
use crate::model::convenience::auto_field;
use crate::model::field_types::{FieldDefinition, FieldType};
use crate::model::options::{ElementKind, ElementOptions, OptionOverrides};

/// 领域元素
///
/// 实现者通常是一个空结构体，实例数据由 [`Container`](crate::model::Container)
/// 或 [`Entity`](crate::model::Entity) 持有
pub trait Element: Send + Sync + 'static {
    /// 声明字段表与选项
    fn declare() -> ElementDecl;

    /// 根据其他字段补全缺失字段，在字段加载之后调用
    fn defaults(_values: &mut FieldValues) -> DomainResult<()> {
        Ok(())
    }

    /// 跨字段校验，返回的错误与字段错误合并
    fn clean(_values: &FieldValues) -> ErrorMessages {
        ErrorMessages::new()
    }
}

/// 取类型名的最后一段，去掉模块路径和泛型参数
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// 指向另一个元素类型的句柄，按需解析其元数据
#[derive(Clone, Copy)]
pub struct ElementRef {
    name: &'static str,
    resolve: fn() -> DomainResult<Arc<ElementMeta>>,
    id_attribute: fn() -> String,
}

impl ElementRef {
    /// 创建指向 `T` 的句柄
    pub fn of<T: Element>() -> Self {
        Self {
            name: short_type_name::<T>(),
            resolve: meta::<T>,
            id_attribute: declared_id_attribute::<T>,
        }
    }

    /// 目标类型名
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 解析目标元数据
    pub fn meta(&self) -> DomainResult<Arc<ElementMeta>> {
        (self.resolve)()
    }

    /// 目标的标识属性名
    ///
    /// 只读取声明，不解析元数据，因此自引用或互相引用的元素也可以调用
    pub fn id_attribute(&self) -> String {
        (self.id_attribute)()
    }
}

fn declared_id_attribute<T: Element>() -> String {
    let decl = T::declare();
    match decl.fields.iter().find(|f| f.identifier) {
        Some(field) => field.attribute_name(),
        None => decl
            .parent
            .map(|parent| parent.id_attribute())
            .unwrap_or_else(|| "id".to_string()),
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementRef({})", self.name)
    }
}

/// 元素声明构建器
pub struct ElementDecl {
    name: String,
    kind: ElementKind,
    parent: Option<ElementRef>,
    fields: Vec<FieldDefinition>,
    overrides: OptionOverrides,
}

impl ElementDecl {
    /// 创建新的元素声明
    pub fn new<T: Element>(kind: ElementKind) -> Self {
        Self {
            name: short_type_name::<T>().to_string(),
            kind,
            parent: None,
            fields: Vec::new(),
            overrides: OptionOverrides::default(),
        }
    }

    pub fn container<T: Element>() -> Self {
        Self::new::<T>(ElementKind::Container)
    }

    pub fn value_object<T: Element>() -> Self {
        Self::new::<T>(ElementKind::ValueObject)
    }

    pub fn entity<T: Element>() -> Self {
        Self::new::<T>(ElementKind::Entity)
    }

    pub fn aggregate<T: Element>() -> Self {
        Self::new::<T>(ElementKind::Aggregate)
    }

    pub fn event_sourced_aggregate<T: Element>() -> Self {
        Self::new::<T>(ElementKind::EventSourcedAggregate)
    }

    /// 继承父类型的字段和可继承选项
    pub fn extends<P: Element>(mut self) -> Self {
        self.parent = Some(ElementRef::of::<P>());
        self
    }

    /// 添加字段，与父类型同名的字段会被覆盖
    pub fn field(mut self, name: &str, definition: FieldDefinition) -> Self {
        self.fields.push(definition.named(name));
        self
    }

    /// 标记为抽象类型
    pub fn abstract_element(mut self) -> Self {
        self.overrides.is_abstract = Some(true);
        self
    }

    /// 设置存储模式名
    pub fn schema_name(mut self, schema_name: &str) -> Self {
        self.overrides.schema_name = Some(schema_name.to_string());
        self
    }

    /// 设置存储提供者键
    pub fn provider(mut self, provider: &str) -> Self {
        self.overrides.provider = Some(provider.to_string());
        self
    }

    /// 设置所属聚合
    pub fn aggregate_cls<A: Element>(mut self) -> Self {
        self.overrides.aggregate_cls = Some(ElementRef::of::<A>());
        self
    }

    /// 设置默认排序
    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.overrides.order_by = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// 设置事件流名
    pub fn stream_name(mut self, stream_name: &str) -> Self {
        self.overrides.stream_name = Some(stream_name.to_string());
        self
    }
}

/// 存储属性的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSource {
    /// 直接对应一个字段
    Field(String),
    /// 嵌入值对象展开的影子属性
    Shadow { field: String, sub_field: String },
}

pub(crate) type DefaultsHook = fn(&mut FieldValues) -> DomainResult<()>;
pub(crate) type CleanHook = fn(&FieldValues) -> ErrorMessages;

/// 元素元数据，每个类型解析一次
pub struct ElementMeta {
    name: String,
    kind: ElementKind,
    options: ElementOptions,
    fields: Vec<FieldDefinition>,
    id_field: Option<usize>,
    embedded: HashMap<String, Arc<ElementMeta>>,
    attributes: Vec<(String, AttributeSource)>,
    pub(crate) defaults_hook: DefaultsHook,
    pub(crate) clean_hook: CleanHook,
}

impl ElementMeta {
    pub(crate) fn resolve(
        decl: ElementDecl,
        defaults_hook: DefaultsHook,
        clean_hook: CleanHook,
    ) -> DomainResult<Self> {
        let parent = match &decl.parent {
            Some(parent) => Some(parent.meta()?),
            None => None,
        };

        let mut fields: Vec<FieldDefinition> = parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        for mut field in decl.fields {
            // 引用属性名依赖目标声明，解析一次后固定下来
            if matches!(field.field_type, FieldType::Reference { .. }) && field.referenced_as.is_none() {
                field.referenced_as = Some(field.attribute_name());
            }
            match fields.iter().position(|existing| existing.name == field.name) {
                Some(pos) => fields[pos] = field,
                None => fields.push(field),
            }
        }

        let identifiers: Vec<&str> = fields
            .iter()
            .filter(|f| f.identifier)
            .map(|f| f.name.as_str())
            .collect();
        if identifiers.len() > 1 {
            return Err(DomainError::incorrect_usage(tf(
                "error.multiple_identifiers",
                &[("element", &decl.name), ("fields", &identifiers.join(", "))],
            )));
        }
        if !decl.kind.has_identity() && !identifiers.is_empty() {
            return Err(DomainError::incorrect_usage(format!(
                "{} cannot declare an identifier field",
                decl.name
            )));
        }
        if decl.kind.has_identity() && identifiers.is_empty() {
            fields.insert(0, auto_field(false).identifier().named("id"));
        }
        let id_field = fields.iter().position(|f| f.identifier);

        let options = ElementOptions::resolve(
            &decl.name,
            decl.kind,
            &decl.overrides,
            parent.as_ref().map(|p| &p.options),
        );

        if decl.kind == ElementKind::Entity && options.aggregate_cls.is_none() && !options.is_abstract {
            return Err(DomainError::incorrect_usage(tf(
                "error.aggregate_missing",
                &[("element", &decl.name)],
            )));
        }

        let mut embedded = HashMap::new();
        let mut attributes: Vec<(String, AttributeSource)> = Vec::new();
        for field in &fields {
            match &field.field_type {
                FieldType::HasOne { .. } | FieldType::HasMany { .. } => {}
                FieldType::ValueObject { target } => {
                    let nested = target.meta()?;
                    if nested.kind != ElementKind::ValueObject {
                        return Err(DomainError::incorrect_usage(format!(
                            "{}.{} must embed a value object, {} is {:?}",
                            decl.name, field.name, nested.name, nested.kind
                        )));
                    }
                    for sub in nested.data_fields() {
                        let attribute = sub
                            .referenced_as
                            .clone()
                            .unwrap_or_else(|| format!("{}_{}", field.name, sub.name));
                        attributes.push((
                            attribute,
                            AttributeSource::Shadow {
                                field: field.name.clone(),
                                sub_field: sub.name.clone(),
                            },
                        ));
                    }
                    embedded.insert(field.name.clone(), nested);
                }
                _ => attributes.push((field.attribute_name(), AttributeSource::Field(field.name.clone()))),
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (attribute, _) in &attributes {
            if !seen.insert(attribute.as_str()) {
                return Err(DomainError::incorrect_usage(format!(
                    "{} maps more than one field to attribute '{}'",
                    decl.name, attribute
                )));
            }
        }

        debug!(
            "解析元素元数据: name={}, kind={:?}, schema={}, provider={}, 字段数={}",
            decl.name, decl.kind, options.schema_name, options.provider, fields.len()
        );

        Ok(Self {
            name: decl.name,
            kind: decl.kind,
            options,
            fields,
            id_field,
            embedded,
            attributes,
            defaults_hook,
            clean_hook,
        })
    }

    /// 类型名
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn options(&self) -> &ElementOptions {
        &self.options
    }

    pub fn schema_name(&self) -> &str {
        &self.options.schema_name
    }

    pub fn provider(&self) -> &str {
        &self.options.provider
    }

    pub fn is_abstract(&self) -> bool {
        self.options.is_abstract
    }

    pub fn has_identity(&self) -> bool {
        self.kind.has_identity()
    }

    /// 全部字段，按声明顺序（注入的标识字段在最前）
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// 按名称查找字段
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 持有数据的字段（不含反向关联）
    pub fn data_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.field_type.is_association())
    }

    /// 标识字段
    pub fn id_field(&self) -> Option<&FieldDefinition> {
        self.id_field.map(|idx| &self.fields[idx])
    }

    /// 标识字段的存储属性名
    pub fn id_attribute(&self) -> Option<String> {
        self.id_field().map(FieldDefinition::attribute_name)
    }

    /// 嵌入字段对应的值对象元数据
    pub fn embedded(&self, field: &str) -> Option<&Arc<ElementMeta>> {
        self.embedded.get(field)
    }

    /// 全部存储属性，按字段顺序
    pub fn attributes(&self) -> &[(String, AttributeSource)] {
        &self.attributes
    }

    /// 查找存储属性的来源
    pub fn attribute_source(&self, attribute: &str) -> Option<&AttributeSource> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, source)| source)
    }

    /// 字段名转换为存储属性名；不是字段名时原样返回
    pub fn attribute_for(&self, name: &str) -> String {
        match self.field(name) {
            Some(field) if !matches!(field.field_type, FieldType::ValueObject { .. }) => field.attribute_name(),
            _ => name.to_string(),
        }
    }

    /// 子元素上指向本元素的关联属性名，缺省为 `{类型名}_{标识属性}`
    pub fn linked_attribute(&self, via: Option<&str>) -> String {
        match via {
            Some(via) => via.to_string(),
            None => format!(
                "{}_{}",
                self.name.to_case(Case::Snake),
                self.id_attribute().unwrap_or_else(|| "id".to_string())
            ),
        }
    }
}

impl fmt::Debug for ElementMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementMeta")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("fields", &self.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

// 按类型缓存的元数据
static ELEMENT_METAS: Lazy<DashMap<TypeId, Arc<ElementMeta>>> = Lazy::new(DashMap::new);

/// 获取元素类型 `T` 的元数据，首次调用时解析并登记到全局元素目录
pub fn meta<T: Element>() -> DomainResult<Arc<ElementMeta>> {
    let type_id = TypeId::of::<T>();
    if let Some(found) = ELEMENT_METAS.get(&type_id) {
        return Ok(Arc::clone(found.value()));
    }

    // 解析期间可能递归解析父类型和嵌入类型，不能持有分片锁
    let resolved = Arc::new(ElementMeta::resolve(T::declare(), T::defaults, T::clean)?);
    let meta = Arc::clone(ELEMENT_METAS.entry(type_id).or_insert(resolved).value());
    crate::registry::global_registry().catalogue(Arc::clone(&meta));
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::convenience::*;

    struct MetaAddress;
    impl Element for MetaAddress {
        fn declare() -> ElementDecl {
            ElementDecl::value_object::<Self>()
                .field("street", string_field(Some(50)).required())
                .field("zip", string_field(Some(6)).referenced_as("postal_code"))
        }
    }

    struct MetaCustomer;
    impl Element for MetaCustomer {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .field("name", string_field(Some(50)).required())
                .field("address", value_object_field::<MetaAddress>())
                .field("account", reference_field::<MetaCustomer>())
        }
    }

    struct MetaOrphan;
    impl Element for MetaOrphan {
        fn declare() -> ElementDecl {
            ElementDecl::entity::<Self>().field("name", string_field(None))
        }
    }

    struct MetaTwoIds;
    impl Element for MetaTwoIds {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .field("a", identifier_field())
                .field("b", identifier_field())
        }
    }

    #[test]
    fn test_injected_identifier() {
        let meta = meta::<MetaCustomer>().unwrap();
        let id = meta.id_field().unwrap();
        assert_eq!(id.name, "id");
        assert!(id.is_auto());
        assert_eq!(meta.fields()[0].name, "id");
        assert_eq!(meta.schema_name(), "meta_customer");
    }

    #[test]
    fn test_shadow_and_reference_attributes() {
        let meta = meta::<MetaCustomer>().unwrap();
        let attributes: Vec<&str> = meta.attributes().iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(attributes, vec!["id", "name", "address_street", "postal_code", "account_id"]);
        assert_eq!(
            meta.attribute_source("address_street"),
            Some(&AttributeSource::Shadow {
                field: "address".to_string(),
                sub_field: "street".to_string()
            })
        );
        assert_eq!(meta.attribute_for("account"), "account_id");
    }

    struct MetaWarehouse;
    impl Element for MetaWarehouse {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .field("code", identifier_field())
                .field("email", string_field(None).unique())
        }
    }

    struct MetaShipment;
    impl Element for MetaShipment {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .field("origin", reference_field::<MetaWarehouse>())
                .field("contact", reference_field::<MetaWarehouse>().via("email"))
                .field("previous", reference_field::<MetaShipment>())
        }
    }

    #[test]
    fn test_reference_uses_target_identifier() {
        let meta = meta::<MetaShipment>().unwrap();
        let attributes: Vec<&str> = meta.attributes().iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(attributes, vec!["id", "origin_code", "contact_email", "previous_id"]);
        assert_eq!(meta.attribute_for("origin"), "origin_code");
        assert_eq!(ElementRef::of::<MetaWarehouse>().id_attribute(), "code");
    }

    #[test]
    fn test_entity_requires_aggregate() {
        let err = meta::<MetaOrphan>().unwrap_err();
        assert!(matches!(err, DomainError::IncorrectUsage { .. }));
    }

    #[test]
    fn test_single_identifier() {
        let err = meta::<MetaTwoIds>().unwrap_err();
        assert!(matches!(err, DomainError::IncorrectUsage { .. }));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<MetaCustomer>(), "MetaCustomer");
        assert_eq!(short_type_name::<Vec<MetaCustomer>>(), "Vec");
    }
}
