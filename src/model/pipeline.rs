//! 构造管道模块
//!
//! 实例构造按固定顺序执行以下阶段：
//!
//! 1. 结构检查：抽象类型、未声明的键
//! 2. 标识分配：自动标识缺失时生成UUID
//! 3. 关联解析：引用字段可以用存储属性名传入
//! 4. 值对象嵌入：由影子属性重建嵌入值
//! 5. 字段加载：逐字段校验，错误累积而不是立即返回
//! 6. `defaults` 钩子
//! 7. `clean` 钩子
//!
//! 全部阶段结束后如果有累积错误，整体返回校验错误

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rat_logger::error;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult, ErrorMessages};
use crate::model::container::{FieldValues, abstract_error};
use crate::model::field_types::{FieldDefinition, FieldType, MSG_INVALID};
use crate::model::meta::{AttributeSource, ElementMeta};
use crate::types::DataValue;

/// 构造过程中的共享状态
pub(crate) struct ConstructionContext {
    meta: Arc<ElementMeta>,
    input: HashMap<String, DataValue>,
    values: FieldValues,
    errors: ErrorMessages,
    /// 已由前面阶段处理过的字段
    settled: HashSet<String>,
}

/// 构造管道中的一个阶段
pub(crate) trait ConstructionStage: Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()>;
}

struct StructureGuard;
struct IdentityStage;
struct AssociationStage;
struct ValueObjectStage;
struct FieldLoadStage;
struct DefaultsStage;
struct CleanStage;

static STAGES: &[&dyn ConstructionStage] = &[
    &StructureGuard,
    &IdentityStage,
    &AssociationStage,
    &ValueObjectStage,
    &FieldLoadStage,
    &DefaultsStage,
    &CleanStage,
];

/// 运行完整的构造管道
pub(crate) fn construct(
    meta: &Arc<ElementMeta>,
    input: HashMap<String, DataValue>,
) -> DomainResult<FieldValues> {
    let mut ctx = ConstructionContext {
        meta: Arc::clone(meta),
        input,
        values: FieldValues::new(Arc::clone(meta)),
        errors: ErrorMessages::new(),
        settled: HashSet::new(),
    };

    for stage in STAGES {
        crate::debug_log!("构造 {}: 阶段 {}", meta.name(), stage.name());
        stage.apply(&mut ctx)?;
    }

    if !ctx.errors.is_empty() {
        error!("{} 构造校验失败: {}", meta.name(), ctx.errors);
        return Err(DomainError::validation(ctx.errors));
    }
    Ok(ctx.values)
}

/// 加载单个字段，嵌入值对象会递归走构造管道
///
/// 返回的错误表已经按 `{字段}_{子字段}` 规则命名
pub(crate) fn load_field(
    meta: &ElementMeta,
    field: &FieldDefinition,
    raw: Option<DataValue>,
) -> Result<DataValue, ErrorMessages> {
    let embedded = matches!(field.field_type, FieldType::ValueObject { .. })
        && matches!(raw, Some(DataValue::Object(_)));
    if embedded {
        let (Some(DataValue::Object(map)), Some(nested)) = (raw, meta.embedded(&field.name)) else {
            return Err(ErrorMessages::single(&field.name, MSG_INVALID));
        };
        return embed(&field.name, nested, map);
    }

    field.load(raw).map_err(|messages| {
        let mut errors = ErrorMessages::new();
        errors.extend(&field.name, messages);
        errors
    })
}

fn embed(
    field_name: &str,
    nested: &Arc<ElementMeta>,
    input: HashMap<String, DataValue>,
) -> Result<DataValue, ErrorMessages> {
    match construct(nested, input) {
        Ok(values) => Ok(DataValue::Object(values.into_map())),
        Err(DomainError::Validation { messages, .. }) => {
            let mut errors = ErrorMessages::new();
            errors.merge_prefixed(field_name, messages);
            Err(errors)
        }
        Err(other) => Err(ErrorMessages::single(field_name, other.to_string())),
    }
}

impl ConstructionStage for StructureGuard {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        if ctx.meta.is_abstract() {
            return Err(abstract_error(&ctx.meta));
        }

        let mut keys: Vec<&String> = ctx.input.keys().collect();
        keys.sort();
        for key in keys {
            let allowed = match ctx.meta.field(key) {
                Some(field) => !field.field_type.is_association(),
                None => ctx.meta.attribute_source(key).is_some(),
            };
            if !allowed {
                return Err(DomainError::invalid_attribute(ctx.meta.name(), key.as_str()));
            }
        }
        Ok(())
    }
}

impl ConstructionStage for IdentityStage {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        let Some(id_field) = ctx.meta.id_field() else {
            return Ok(());
        };
        if !matches!(id_field.field_type, FieldType::Auto { increment: false }) {
            return Ok(());
        }
        let missing = ctx
            .input
            .get(&id_field.name)
            .map(DataValue::is_empty)
            .unwrap_or(true);
        if missing {
            let generated = Uuid::new_v4().to_string();
            crate::debug_log!("为 {} 生成标识: {}", ctx.meta.name(), generated);
            ctx.input.insert(id_field.name.clone(), DataValue::String(generated));
        }
        Ok(())
    }
}

impl ConstructionStage for AssociationStage {
    fn name(&self) -> &'static str {
        "association"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        let meta = Arc::clone(&ctx.meta);
        for field in meta.fields() {
            if !matches!(field.field_type, FieldType::Reference { .. }) {
                continue;
            }
            let attribute = field.attribute_name();
            if attribute == field.name {
                continue;
            }
            let by_attribute = ctx.input.remove(&attribute);
            if let (Some(value), false) = (by_attribute, ctx.input.contains_key(&field.name)) {
                ctx.input.insert(field.name.clone(), value);
            }
        }
        Ok(())
    }
}

impl ConstructionStage for ValueObjectStage {
    fn name(&self) -> &'static str {
        "value_object"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        let meta = Arc::clone(&ctx.meta);
        for field in meta.fields() {
            let FieldType::ValueObject { .. } = field.field_type else {
                continue;
            };

            // 先取出影子属性，直接传入嵌入值时影子属性被忽略
            let mut shadow = HashMap::new();
            for (attribute, source) in meta.attributes() {
                if let AttributeSource::Shadow { field: owner, sub_field } = source {
                    if owner == &field.name {
                        if let Some(value) = ctx.input.remove(attribute) {
                            shadow.insert(sub_field.clone(), value);
                        }
                    }
                }
            }
            if ctx.input.contains_key(&field.name) || shadow.values().all(DataValue::is_null) {
                continue;
            }

            let Some(nested) = meta.embedded(&field.name) else {
                continue;
            };
            match embed(&field.name, nested, shadow) {
                Ok(value) => ctx.values.insert(field.name.clone(), value),
                Err(errors) => ctx.errors.merge(errors),
            }
            ctx.settled.insert(field.name.clone());
        }
        Ok(())
    }
}

impl ConstructionStage for FieldLoadStage {
    fn name(&self) -> &'static str {
        "field_load"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        let meta = Arc::clone(&ctx.meta);
        for field in meta.data_fields() {
            if ctx.settled.contains(&field.name) {
                continue;
            }
            let raw = ctx.input.remove(&field.name);
            match load_field(&meta, field, raw) {
                Ok(value) => ctx.values.insert(field.name.clone(), value),
                Err(errors) => ctx.errors.merge(errors),
            }
        }
        Ok(())
    }
}

impl ConstructionStage for DefaultsStage {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        match (ctx.meta.defaults_hook)(&mut ctx.values) {
            Ok(()) => Ok(()),
            Err(DomainError::Validation { messages, .. }) => {
                ctx.errors.merge(messages);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }
}

impl ConstructionStage for CleanStage {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn apply(&self, ctx: &mut ConstructionContext) -> DomainResult<()> {
        let custom = (ctx.meta.clean_hook)(&ctx.values);
        ctx.errors.merge(custom);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;
    use crate::model::convenience::*;
    use crate::model::meta::{Element, ElementDecl, meta};

    struct PipeAddress;
    impl Element for PipeAddress {
        fn declare() -> ElementDecl {
            ElementDecl::value_object::<Self>()
                .field("street", string_field(Some(10)).required())
                .field("city", string_field(Some(20)).required())
        }
    }

    struct PipeUser;
    impl Element for PipeUser {
        fn declare() -> ElementDecl {
            ElementDecl::aggregate::<Self>()
                .field("email", string_field(Some(50)).required())
                .field("address", value_object_field::<PipeAddress>())
                .field("manager", reference_field::<PipeUser>())
        }
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<&str> = STAGES.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["structure", "identity", "association", "value_object", "field_load", "defaults", "clean"]
        );
    }

    #[test]
    fn test_identity_generated_before_validation() {
        let meta = meta::<PipeUser>().unwrap();
        let values = construct(&meta, data! {"email" => "a@b.c"}).unwrap();
        let id = values.get("id").and_then(DataValue::as_str).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_value_object_from_shadow_attributes() {
        let meta = meta::<PipeUser>().unwrap();
        let values = construct(
            &meta,
            data! {"email" => "a@b.c", "address_street" => "Main", "address_city" => "Oslo"},
        )
        .unwrap();
        let address = values.get("address").and_then(DataValue::as_object).unwrap();
        assert_eq!(address.get("city"), Some(&DataValue::from("Oslo")));
    }

    #[test]
    fn test_embedded_errors_are_renamespaced() {
        let meta = meta::<PipeUser>().unwrap();
        let err = construct(
            &meta,
            data! {"email" => "a@b.c", "address_street" => "A very long street name"},
        )
        .unwrap_err();
        let messages = err.messages().unwrap();
        assert!(messages.contains("address_street"));
        assert!(messages.contains("address_city"));
        assert!(!messages.contains("street"));
    }

    #[test]
    fn test_reference_by_attribute_name() {
        let meta = meta::<PipeUser>().unwrap();
        let values = construct(&meta, data! {"email" => "a@b.c", "manager_id" => "boss"}).unwrap();
        assert_eq!(values.get("manager"), Some(&DataValue::from("boss")));
    }
}
