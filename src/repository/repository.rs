//! 仓储核心定义

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use rat_logger::{debug, error, info};

use crate::adapter::{DomainAdapter, FilterCriteria};
use crate::error::{DomainError, DomainResult, ErrorMessages};
use crate::model::entity::has_many_target;
use crate::model::{Element, ElementMeta, Entity, FieldType, meta};
use crate::registry::global_registry;
use crate::repository::query_set::QuerySet;
use crate::types::{DataValue, QueryCondition};

/// 聚合仓储
///
/// 所有操作都会冻结全局注册表，并通过元素的存储提供者访问适配器
pub struct Repository<T: Element> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element> Repository<T> {
    /// 创建新的仓储
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }

    fn prepare(&self) -> DomainResult<(Arc<ElementMeta>, Arc<dyn DomainAdapter>)> {
        let meta = meta::<T>()?;
        let registry = global_registry();
        registry.freeze();
        let adapter = registry.get_adapter_for(&meta)?;
        Ok((meta, adapter))
    }

    /// 创建查询集合
    pub fn query(&self) -> QuerySet<T> {
        QuerySet::new()
    }

    /// 按标识读取
    pub async fn get(&self, id: impl Into<DataValue>) -> DomainResult<Entity<T>> {
        let meta = meta::<T>()?;
        let id_field = meta.id_field().ok_or_else(|| {
            DomainError::incorrect_usage(format!("{} has no identifier field", meta.name()))
        })?;
        let mut criteria = HashMap::new();
        criteria.insert(id_field.name.clone(), id.into());
        self.find_by(criteria).await
    }

    /// 读取满足全部条件的第一个实体，没有时返回 [`DomainError::ObjectNotFound`]
    pub async fn find_by(&self, criteria: HashMap<String, DataValue>) -> DomainResult<Entity<T>> {
        let meta = meta::<T>()?;
        let described = describe(&criteria);
        debug!("查找 {}: {}", meta.schema_name(), described);

        let found = self.query().filter_all(criteria).per_page(1).first().await?;
        found.ok_or_else(|| DomainError::not_found(meta.schema_name(), described))
    }

    /// 是否存在满足全部条件的实体
    pub async fn exists(&self, criteria: HashMap<String, DataValue>) -> DomainResult<bool> {
        self.query().filter_all(criteria).exists().await
    }

    /// 构造、校验唯一性并持久化新实体
    pub async fn create(&self, data: HashMap<String, DataValue>) -> DomainResult<Entity<T>> {
        let mut entity = Entity::<T>::new(data)?;
        self.save(&mut entity).await?;
        Ok(entity)
    }

    /// 保存实体
    ///
    /// 新建时创建，已修改时更新，然后落盘暂存的关联变更；其他状态不访问存储
    pub async fn save(&self, entity: &mut Entity<T>) -> DomainResult<()> {
        let (meta, adapter) = self.prepare()?;
        if entity.state().is_destroyed() {
            return Err(DomainError::incorrect_usage(format!(
                "{} has been deleted and cannot be saved",
                entity
            )));
        }

        if entity.state().is_new() {
            self.validate_unique(&meta, adapter.as_ref(), entity, false).await?;
            debug!("创建 {}: id={}", meta.schema_name(), entity.id());
            let stored = adapter.create_object(&meta, entity.to_storage()).await?;
            entity.backfill(&stored);
            entity.state_mut().mark_saved();
        } else if entity.state().is_changed() {
            self.validate_unique(&meta, adapter.as_ref(), entity, true).await?;
            debug!("更新 {}: id={}", meta.schema_name(), entity.id());
            let stored = adapter.update_object(&meta, entity.to_storage()).await?;
            entity.backfill(&stored);
            entity.state_mut().mark_saved();
        }

        if entity.has_staged_changes() {
            self.sync_associations(&meta, entity).await?;
        }
        Ok(())
    }

    /// 批量修改字段后保存
    ///
    /// 实体本身没有写入存储时（例如唯一性检查失败），字段值和状态恢复为调用前的样子
    pub async fn update(&self, entity: &mut Entity<T>, data: HashMap<String, DataValue>) -> DomainResult<()> {
        let previous = (entity.values().clone(), *entity.state());
        entity.update(data)?;
        match self.save(entity).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if entity.state().is_changed() || entity.state().is_new() {
                    let (values, state) = previous;
                    entity.restore(values, state);
                }
                Err(e)
            }
        }
    }

    /// 删除实体，返回删除数量
    ///
    /// 尚未持久化或没有标识的实体不访问存储，返回0且状态不变
    pub async fn delete(&self, entity: &mut Entity<T>) -> DomainResult<u64> {
        let (meta, adapter) = self.prepare()?;
        if entity.state().is_new() {
            return Ok(0);
        }
        let id = entity.id();
        let Some(id_attribute) = meta.id_attribute().filter(|_| !id.is_null()) else {
            return Ok(0);
        };

        debug!("删除 {}: id={}", meta.schema_name(), id);
        let deleted = adapter
            .delete_objects(&meta, &[QueryCondition::eq(id_attribute, id_storage(&meta, &id))])
            .await?;
        entity.state_mut().mark_destroyed();
        Ok(deleted)
    }

    /// 删除该元素的全部记录
    pub async fn delete_all(&self) -> DomainResult<u64> {
        let (meta, adapter) = self.prepare()?;
        let deleted = adapter.delete_objects(&meta, &[]).await?;
        info!("清空 {}: 删除 {} 条记录", meta.schema_name(), deleted);
        Ok(deleted)
    }

    /// 读取引用字段指向的实体，引用为空时返回 None
    pub async fn fetch_reference<R: Element>(&self, entity: &Entity<T>, field: &str) -> DomainResult<Option<Entity<R>>> {
        let (target, via) = match entity.meta().field(field).map(|f| &f.field_type) {
            Some(FieldType::Reference { target, via }) => (*target, via.clone()),
            _ => return Err(DomainError::invalid_attribute(entity.meta().name(), field)),
        };
        let target_meta = meta::<R>()?;
        if target.name() != target_meta.name() {
            return Err(DomainError::incorrect_usage(format!(
                "{}.{} references {}, not {}",
                entity.meta().name(),
                field,
                target.name(),
                target_meta.name()
            )));
        }

        let Some(value) = entity.get(field).filter(|v| !v.is_null()).cloned() else {
            return Ok(None);
        };
        match via {
            Some(via) => {
                let mut criteria = HashMap::new();
                criteria.insert(via, value);
                Repository::<R>::new().find_by(criteria).await.map(Some)
            }
            None => Repository::<R>::new().get(value).await.map(Some),
        }
    }

    /// 读取反向一对一关联的子实体
    pub async fn fetch_has_one<C: Element>(&self, entity: &Entity<T>, field: &str) -> DomainResult<Option<Entity<C>>> {
        let via = match entity.meta().field(field).map(|f| &f.field_type) {
            Some(FieldType::HasOne { target, via }) => {
                check_target::<C>(entity.meta(), field, target.name())?;
                via.clone()
            }
            _ => return Err(DomainError::invalid_attribute(entity.meta().name(), field)),
        };
        let linked = entity.meta().linked_attribute(via.as_deref());
        if entity.id().is_null() {
            return Ok(None);
        }

        let child_meta = meta::<C>()?;
        let criteria = FilterCriteria {
            page: 1,
            per_page: 1,
            filters: vec![QueryCondition::eq(linked, id_storage(entity.meta(), &entity.id()))],
            ..Default::default()
        };
        let adapter = self.child_adapter(&child_meta)?;
        let result = adapter.filter_objects(&child_meta, &criteria).await?;
        result.items.into_iter().next().map(Entity::<C>::from_storage).transpose()
    }

    /// 读取反向一对多关联的全部子实体，暂存的变更覆盖在存储结果之上
    pub async fn fetch_has_many<C: Element>(&self, entity: &Entity<T>, field: &str) -> DomainResult<Vec<Entity<C>>> {
        let (target, via) = has_many_target(entity.meta(), field)?;
        check_target::<C>(entity.meta(), field, target.name())?;
        let linked = entity.meta().linked_attribute(via.as_deref());

        let child_meta = meta::<C>()?;
        let adapter = self.child_adapter(&child_meta)?;
        let mut records = Vec::new();
        if !entity.id().is_null() {
            let mut criteria = QuerySet::<C>::new()
                .filter(&linked, id_storage(entity.meta(), &entity.id()))
                .criteria(&child_meta);
            loop {
                let result = adapter.filter_objects(&child_meta, &criteria).await?;
                let fetched = result.items.len();
                records.extend(result.items);
                if fetched == 0 || records.len() as u64 >= result.total {
                    break;
                }
                criteria.page += 1;
            }
        }

        let id_attribute = child_meta.id_attribute().unwrap_or_else(|| "id".to_string());
        let key_of = |record: &crate::adapter::StorageRecord| {
            record.get(&id_attribute).cloned().unwrap_or(DataValue::Null).to_string()
        };
        if let Some(staged) = entity.staged(field) {
            records.retain(|record| !staged.is_removed(&key_of(record)));
            for record in records.iter_mut() {
                if let Some(replacement) = staged.replacement(&key_of(record)) {
                    *record = replacement.clone();
                }
            }
            records.extend(staged.added().cloned());
        }

        records.into_iter().map(Entity::<C>::from_storage).collect()
    }

    fn child_adapter(&self, child: &ElementMeta) -> DomainResult<Arc<dyn DomainAdapter>> {
        let registry = global_registry();
        registry.freeze();
        registry.get_adapter_for(child)
    }

    /// 按 删除 → 更新 → 新增 的顺序落盘暂存的关联变更，然后清空暂存区
    async fn sync_associations(&self, meta: &ElementMeta, entity: &mut Entity<T>) -> DomainResult<()> {
        let staged = entity.staged_changes().clone();
        for (field, changes) in staged.iter() {
            let (target, _) = has_many_target(meta, field)?;
            let child_meta = target.meta()?;
            let adapter = self.child_adapter(&child_meta)?;
            let id_attribute = child_meta.id_attribute().ok_or_else(|| {
                DomainError::incorrect_usage(format!("{} has no identifier field", child_meta.name()))
            })?;
            debug!(
                "同步关联 {}.{}: 删除={}, 更新={}, 新增={}",
                meta.name(),
                field,
                changes.removed().count(),
                changes.updated().count(),
                changes.added().count()
            );

            for record in changes.removed() {
                let id = record.get(&id_attribute).cloned().unwrap_or(DataValue::Null);
                adapter
                    .delete_objects(&child_meta, &[QueryCondition::eq(id_attribute.clone(), id)])
                    .await?;
            }
            for record in changes.updated() {
                adapter.update_object(&child_meta, record.clone()).await?;
            }
            for record in changes.added() {
                adapter.create_object(&child_meta, record.clone()).await?;
            }
        }
        entity.clear_staged();
        Ok(())
    }

    /// 唯一性检查，全部冲突累积后一起返回
    ///
    /// 这是建议性检查，并发写入仍需要存储层的唯一索引兜底
    async fn validate_unique(
        &self,
        meta: &ElementMeta,
        adapter: &dyn DomainAdapter,
        entity: &Entity<T>,
        exclude_self: bool,
    ) -> DomainResult<()> {
        let mut errors = ErrorMessages::new();
        let id = entity.id();
        let excludes = match meta.id_attribute() {
            Some(id_attribute) if exclude_self && !id.is_null() => {
                vec![QueryCondition::eq(id_attribute, id_storage(meta, &id))]
            }
            _ => Vec::new(),
        };

        for field in meta.data_fields().filter(|f| f.unique) {
            let Some(value) = entity.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let criteria = FilterCriteria {
                page: 1,
                per_page: 1,
                filters: vec![QueryCondition::eq(field.attribute_name(), field.to_storage(value))],
                excludes: excludes.clone(),
                ..Default::default()
            };
            let found = adapter.filter_objects(meta, &criteria).await?;
            if found.total > 0 {
                errors.add(
                    &field.name,
                    format!("{} with {} '{}' is already present.", meta.name(), field.name, value),
                );
            }
        }

        if !errors.is_empty() {
            error!("{} 唯一性校验失败: {}", meta.name(), errors);
            return Err(DomainError::validation(errors));
        }
        Ok(())
    }
}

impl<T: Element> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn id_storage(meta: &ElementMeta, id: &DataValue) -> DataValue {
    meta.id_field()
        .map(|field| field.to_storage(id))
        .unwrap_or_else(|| id.clone())
}

fn check_target<C: Element>(owner: &ElementMeta, field: &str, target: &str) -> DomainResult<()> {
    let child = meta::<C>()?;
    if child.name() != target {
        return Err(DomainError::incorrect_usage(format!(
            "{}.{} holds {}, not {}",
            owner.name(),
            field,
            target,
            child.name()
        )));
    }
    Ok(())
}

/// 查询条件的可读形式，按键排序
fn describe(criteria: &HashMap<String, DataValue>) -> String {
    let mut entries: Vec<String> = criteria.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    entries.sort();
    entries.join(", ")
}
