//! 内存适配器实现
//!
//! 每个存储模式一张记录表，支持全部查询操作符、多键排序、分页和序列标识，
//! 用于测试和原型开发

use std::cmp::Ordering;

use async_trait::async_trait;
use dashmap::DashMap;
use rat_logger::{debug, warn};

use crate::adapter::{DomainAdapter, FilterCriteria, FilterResult, StorageRecord};
use crate::error::{DomainError, DomainResult};
use crate::model::ElementMeta;
use crate::types::{DataValue, QueryCondition, SortConfig, SortDirection};

const ADAPTER_TYPE: &str = "memory";

/// 内存适配器
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    /// 记录表映射 (存储模式名 -> 记录)
    tables: DashMap<String, Vec<StorageRecord>>,
    /// 序列映射 (存储模式名 -> 最后分配的序列值)
    sequences: DashMap<String, i64>,
}

impl MemoryAdapter {
    /// 创建新的内存适配器
    pub fn new() -> Self {
        Self::default()
    }

    /// 存储模式中的全部记录
    pub fn records(&self, schema: &str) -> Vec<StorageRecord> {
        self.tables
            .get(schema)
            .map(|table| table.value().clone())
            .unwrap_or_default()
    }

    /// 存储模式中的记录数
    pub fn len(&self, schema: &str) -> usize {
        self.tables.get(schema).map(|table| table.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, schema: &str) -> bool {
        self.len(schema) == 0
    }

    /// 清空全部记录和序列
    pub fn clear(&self) {
        self.tables.clear();
        self.sequences.clear();
    }

    fn next_sequence(&self, schema: &str) -> i64 {
        let mut entry = self.sequences.entry(schema.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// 存储层的唯一约束检查，`skip` 为正在更新的记录下标
    fn check_unique(
        meta: &ElementMeta,
        table: &[StorageRecord],
        record: &StorageRecord,
        skip: Option<usize>,
    ) -> DomainResult<()> {
        for field in meta.data_fields().filter(|f| f.unique) {
            let attribute = field.attribute_name();
            let Some(value) = record.get(&attribute).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = table
                .iter()
                .enumerate()
                .any(|(idx, existing)| Some(idx) != skip && existing.get(&attribute) == Some(value));
            if clash {
                warn!("内存适配器唯一约束冲突: {}.{} = {}", meta.schema_name(), attribute, value);
                return Err(DomainError::adapter(
                    ADAPTER_TYPE,
                    format!("unique constraint violated on {}.{}", meta.schema_name(), attribute),
                ));
            }
        }
        Ok(())
    }

    fn id_attribute(meta: &ElementMeta) -> DomainResult<String> {
        meta.id_attribute().ok_or_else(|| {
            DomainError::adapter(ADAPTER_TYPE, format!("{} has no identity attribute", meta.name()))
        })
    }
}

fn compare_records(a: &StorageRecord, b: &StorageRecord, order_by: &[SortConfig]) -> Ordering {
    for sort in order_by {
        let left = a.get(&sort.field).unwrap_or(&DataValue::Null);
        let right = b.get(&sort.field).unwrap_or(&DataValue::Null);
        let ordering = left.compare(right).unwrap_or(Ordering::Equal);
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl DomainAdapter for MemoryAdapter {
    fn adapter_type(&self) -> &'static str {
        ADAPTER_TYPE
    }

    async fn create_object(&self, meta: &ElementMeta, mut record: StorageRecord) -> DomainResult<StorageRecord> {
        let schema = meta.schema_name();
        let id_attribute = Self::id_attribute(meta)?;

        let needs_sequence = meta.id_field().map(|f| f.is_increment()).unwrap_or(false)
            && record.get(&id_attribute).map(DataValue::is_null).unwrap_or(true);
        if needs_sequence {
            let next = self.next_sequence(schema);
            debug!("内存适配器分配序列标识: {}.{} = {}", schema, id_attribute, next);
            record.insert(id_attribute.clone(), DataValue::Int(next));
        }

        let mut table = self.tables.entry(schema.to_string()).or_default();
        Self::check_unique(meta, &table, &record, None)?;
        table.push(record.clone());
        debug!("内存适配器创建记录: schema={}, id={:?}", schema, record.get(&id_attribute));
        Ok(record)
    }

    async fn update_object(&self, meta: &ElementMeta, record: StorageRecord) -> DomainResult<StorageRecord> {
        let schema = meta.schema_name();
        let id_attribute = Self::id_attribute(meta)?;
        let id = record.get(&id_attribute).cloned().unwrap_or(DataValue::Null);

        let mut table = self.tables.entry(schema.to_string()).or_default();
        let Some(position) = table.iter().position(|existing| existing.get(&id_attribute) == Some(&id)) else {
            return Err(DomainError::not_found(schema, format!("{}={}", id_attribute, id)));
        };
        Self::check_unique(meta, &table, &record, Some(position))?;
        table[position] = record.clone();
        debug!("内存适配器更新记录: schema={}, id={}", schema, id);
        Ok(record)
    }

    async fn delete_objects(&self, meta: &ElementMeta, conditions: &[QueryCondition]) -> DomainResult<u64> {
        let schema = meta.schema_name();
        let Some(mut table) = self.tables.get_mut(schema) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|record| {
            !conditions
                .iter()
                .all(|condition| condition.matches(record.get(&condition.field)))
        });
        let deleted = (before - table.len()) as u64;
        debug!("内存适配器删除记录: schema={}, 数量={}", schema, deleted);
        Ok(deleted)
    }

    async fn filter_objects(&self, meta: &ElementMeta, criteria: &FilterCriteria) -> DomainResult<FilterResult> {
        let schema = meta.schema_name();
        let mut matched: Vec<StorageRecord> = self
            .tables
            .get(schema)
            .map(|table| table.iter().filter(|record| criteria.selects(record)).cloned().collect())
            .unwrap_or_default();

        if !criteria.order_by.is_empty() {
            matched.sort_by(|a, b| compare_records(a, b, &criteria.order_by));
        }

        let total = matched.len() as u64;
        let items: Vec<StorageRecord> = matched
            .into_iter()
            .skip(criteria.offset())
            .take(criteria.per_page)
            .collect();
        debug!(
            "内存适配器过滤: schema={}, 条件数={}, 总数={}, 本页={}",
            schema,
            criteria.filters.len(),
            total,
            items.len()
        );
        Ok(FilterResult { items, total })
    }
}
