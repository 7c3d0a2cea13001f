//! 实体模块
//!
//! 实体在容器之上增加标识、生命周期状态和关联暂存区，按标识比较

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rat_logger::error;

use crate::adapter::StorageRecord;
use crate::error::{DomainError, DomainResult, ErrorMessages};
use crate::model::association::{AssociationCache, StagedChanges};
use crate::model::container::FieldValues;
use crate::model::field_types::FieldType;
use crate::model::meta::{AttributeSource, Element, ElementMeta, ElementRef, meta};
use crate::model::pipeline;
use crate::model::state::EntityState;
use crate::types::DataValue;

/// 拥有标识和生命周期的领域实体
pub struct Entity<T: Element> {
    values: FieldValues,
    state: EntityState,
    staged: AssociationCache,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> Entity<T> {
    /// 通过构造管道创建新实体，状态为新建
    pub fn new(data: HashMap<String, DataValue>) -> DomainResult<Self> {
        let meta = meta::<T>()?;
        if !meta.has_identity() {
            return Err(DomainError::incorrect_usage(format!(
                "{} has no identity, construct it as a Container",
                meta.name()
            )));
        }
        let values = pipeline::construct(&meta, data)?;
        Ok(Self::from_values(values))
    }

    fn from_values(values: FieldValues) -> Self {
        Self {
            values,
            state: EntityState::default(),
            staged: AssociationCache::default(),
            _marker: PhantomData,
        }
    }

    pub fn meta(&self) -> &Arc<ElementMeta> {
        self.values.meta()
    }

    /// 标识值，尚未生成时为 Null
    pub fn id(&self) -> DataValue {
        self.meta()
            .id_field()
            .and_then(|field| self.values.get(&field.name))
            .cloned()
            .unwrap_or(DataValue::Null)
    }

    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.values.get(name)
    }

    /// 校验并修改单个字段，已持久化的实体标记为已修改
    pub fn set(&mut self, name: &str, value: impl Into<DataValue>) -> DomainResult<()> {
        self.values.set(name, value)?;
        self.state.mark_changed();
        Ok(())
    }

    /// 批量修改字段
    ///
    /// 全部新值和跨字段校验通过后才整体生效，任何错误都不会留下部分修改
    pub fn update(&mut self, data: HashMap<String, DataValue>) -> DomainResult<()> {
        let mut candidate = self.values.clone();
        let mut errors = ErrorMessages::new();

        let mut entries: Vec<(String, DataValue)> = data.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in entries {
            match candidate.set(&name, value) {
                Ok(()) => {}
                Err(DomainError::Validation { messages, .. }) => errors.merge(messages),
                Err(other) => return Err(other),
            }
        }
        errors.merge((self.meta().clean_hook)(&candidate));

        if !errors.is_empty() {
            error!("{} 更新校验失败: {}", self.meta().name(), errors);
            return Err(DomainError::validation(errors));
        }
        self.values = candidate;
        self.state.mark_changed();
        Ok(())
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn state(&self) -> &EntityState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    /// 字段名到值的映射，反向关联不包含在内
    pub fn to_dict(&self) -> HashMap<String, DataValue> {
        self.values.to_map()
    }

    /// 存储属性名，按字段顺序
    pub fn attributes(&self) -> Vec<&str> {
        self.meta().attributes().iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 转换为存储记录：值对象展开为影子属性，引用字段使用其属性名
    pub fn to_storage(&self) -> StorageRecord {
        let meta = self.meta();
        let mut record = StorageRecord::new();
        for (attribute, source) in meta.attributes() {
            let stored = match source {
                AttributeSource::Field(name) => match (meta.field(name), self.values.get(name)) {
                    (Some(field), Some(value)) => field.to_storage(value),
                    _ => DataValue::Null,
                },
                AttributeSource::Shadow { field, sub_field } => {
                    let nested = meta.embedded(field).and_then(|m| m.field(sub_field));
                    let value = self
                        .values
                        .get(field)
                        .and_then(DataValue::as_object)
                        .and_then(|obj| obj.get(sub_field));
                    match (nested, value) {
                        (Some(sub), Some(value)) => sub.to_storage(value),
                        _ => DataValue::Null,
                    }
                }
            };
            record.insert(attribute.clone(), stored);
        }
        record
    }

    /// 由存储记录还原实体，状态为已读取
    ///
    /// 记录中未声明的属性被忽略
    pub fn from_storage(record: StorageRecord) -> DomainResult<Self> {
        let meta = meta::<T>()?;
        let mut input = HashMap::new();
        let mut errors = ErrorMessages::new();

        for (attribute, stored) in record {
            let (key, decoded) = match meta.attribute_source(&attribute) {
                Some(AttributeSource::Field(name)) => {
                    let Some(field) = meta.field(name) else { continue };
                    (name.clone(), field.from_storage(stored))
                }
                Some(AttributeSource::Shadow { field, sub_field }) => {
                    let Some(sub) = meta.embedded(field).and_then(|m| m.field(sub_field)) else {
                        continue;
                    };
                    (attribute.clone(), sub.from_storage(stored))
                }
                None => {
                    crate::debug_log!("{} 忽略未声明的存储属性: {}", meta.name(), attribute);
                    continue;
                }
            };
            match decoded {
                Ok(value) => {
                    input.insert(key, value);
                }
                Err(messages) => errors.extend(&attribute, messages),
            }
        }
        if !errors.is_empty() {
            return Err(DomainError::validation(errors));
        }

        let values = pipeline::construct(&meta, input)?;
        let mut entity = Self::from_values(values);
        entity.state.mark_retrieved();
        Ok(entity)
    }

    /// 在反向一对多关联上暂存一个子实体
    ///
    /// 子实体的关联属性被设为本实体的标识；子实体为新建时记为新增，否则记为更新
    pub fn add<C: Element>(&mut self, field: &str, child: &mut Entity<C>) -> DomainResult<()> {
        let linked = self.link_child(field, child.meta())?;
        let owner_id = self.id();
        if owner_id.is_null() {
            return Err(DomainError::incorrect_usage(format!(
                "{} has no identity yet, save it before adding to '{}'",
                self.meta().name(),
                field
            )));
        }
        child.set_attribute(&linked, owner_id)?;

        let key = child.id().to_string();
        let record = child.to_storage();
        let staged = self.staged.entry(field);
        if child.state().is_new() {
            staged.stage_add(key, record);
        } else {
            staged.stage_update(key, record);
        }
        Ok(())
    }

    /// 在反向一对多关联上暂存移除一个子实体
    pub fn remove<C: Element>(&mut self, field: &str, child: &Entity<C>) -> DomainResult<()> {
        self.link_child(field, child.meta())?;
        let key = child.id().to_string();
        self.staged.entry(field).stage_remove(key, child.to_storage());
        Ok(())
    }

    /// 关联字段上暂存的变更
    pub fn staged(&self, field: &str) -> Option<&StagedChanges> {
        self.staged.get(field)
    }

    /// 是否有未落盘的关联变更
    pub fn has_staged_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    pub(crate) fn staged_changes(&self) -> &AssociationCache {
        &self.staged
    }

    /// 回到之前取下的字段值和状态，暂存区不受影响
    pub(crate) fn restore(&mut self, values: FieldValues, state: EntityState) {
        self.values = values;
        self.state = state;
    }

    pub(crate) fn clear_staged(&mut self) {
        self.staged = AssociationCache::default();
    }

    /// 回填适配器生成的值（例如序列标识），只覆盖当前为空的字段
    pub(crate) fn backfill(&mut self, record: &StorageRecord) {
        let meta = Arc::clone(self.meta());
        for (attribute, stored) in record {
            if stored.is_null() {
                continue;
            }
            let Some(AttributeSource::Field(name)) = meta.attribute_source(attribute) else {
                continue;
            };
            if !self.values.is_absent(name) {
                continue;
            }
            if let Some(field) = meta.field(name) {
                if let Ok(value) = field.from_storage(stored.clone()) {
                    self.values.insert(name.clone(), value);
                }
            }
        }
    }

    /// 按存储属性名写入字段
    fn set_attribute(&mut self, attribute: &str, value: DataValue) -> DomainResult<()> {
        match self.meta().attribute_source(attribute) {
            Some(AttributeSource::Field(name)) => {
                let name = name.clone();
                self.set(&name, value)
            }
            _ => Err(DomainError::invalid_attribute(self.meta().name(), attribute)),
        }
    }

    /// 检查关联字段并返回子元素上的关联属性名
    fn link_child(&self, field: &str, child: &ElementMeta) -> DomainResult<String> {
        let (target, via) = has_many_target(self.meta(), field)?;
        if target.name() != child.name() {
            return Err(DomainError::incorrect_usage(format!(
                "{}.{} holds {}, not {}",
                self.meta().name(),
                field,
                target.name(),
                child.name()
            )));
        }
        Ok(self.meta().linked_attribute(via.as_deref()))
    }
}

/// 取反向一对多关联字段的目标与 `via`
pub(crate) fn has_many_target(meta: &ElementMeta, field: &str) -> DomainResult<(ElementRef, Option<String>)> {
    match meta.field(field).map(|f| &f.field_type) {
        Some(FieldType::HasMany { target, via }) => Ok((*target, via.clone())),
        _ => Err(DomainError::invalid_attribute(meta.name(), field)),
    }
}

impl<T: Element> Clone for Entity<T> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            state: self.state,
            staged: self.staged.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Element> PartialEq for Entity<T> {
    fn eq(&self, other: &Self) -> bool {
        let id = self.id();
        !id.is_null() && self.meta().schema_name() == other.meta().schema_name() && id == other.id()
    }
}

impl<T: Element> fmt::Debug for Entity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.meta().name())
            .field("id", &self.id())
            .field("state", &self.state)
            .field("values", &self.values)
            .finish()
    }
}

impl<T: Element> fmt::Display for Entity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} object ({})", self.meta().name(), self.id())
    }
}
