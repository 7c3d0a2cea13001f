//! 存储适配器模块
//!
//! 提供统一的存储操作接口，屏蔽不同存储后端的实现差异。
//! 适配器只接收存储属性名和存储值，字段到属性的转换由仓储完成

use std::collections::HashMap;

mod memory;

pub use memory::MemoryAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainResult;
use crate::model::ElementMeta;
use crate::types::{DataValue, QueryCondition, SortConfig};

/// 存储记录：存储属性名到存储值
pub type StorageRecord = HashMap<String, DataValue>;

/// 过滤查询参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// 页码，从1开始
    pub page: usize,
    /// 每页条数
    pub per_page: usize,
    /// 排序，按顺序依次比较
    pub order_by: Vec<SortConfig>,
    /// 记录必须满足全部过滤条件
    pub filters: Vec<QueryCondition>,
    /// 满足全部排除条件的记录被排除
    pub excludes: Vec<QueryCondition>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            order_by: Vec::new(),
            filters: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

impl FilterCriteria {
    /// 当前页的起始偏移
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// 记录是否被选中：满足全部过滤条件，且不同时满足全部排除条件
    pub fn selects(&self, record: &StorageRecord) -> bool {
        let included = self
            .filters
            .iter()
            .all(|condition| condition.matches(record.get(&condition.field)));
        let excluded = !self.excludes.is_empty()
            && self
                .excludes
                .iter()
                .all(|condition| condition.matches(record.get(&condition.field)));
        included && !excluded
    }
}

/// 过滤查询结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterResult {
    /// 当前页的记录
    pub items: Vec<StorageRecord>,
    /// 满足条件的记录总数（不受分页影响）
    pub total: u64,
}

/// 存储适配器trait，定义统一的存储操作接口
#[async_trait]
pub trait DomainAdapter: Send + Sync {
    /// 适配器类型名，用于日志和诊断
    fn adapter_type(&self) -> &'static str;

    /// 创建记录，返回补全了适配器生成字段（如序列标识）的记录
    async fn create_object(&self, meta: &ElementMeta, record: StorageRecord) -> DomainResult<StorageRecord>;

    /// 按标识属性更新记录
    async fn update_object(&self, meta: &ElementMeta, record: StorageRecord) -> DomainResult<StorageRecord>;

    /// 删除满足全部条件的记录，返回删除数量；条件为空时删除全部
    async fn delete_objects(&self, meta: &ElementMeta, conditions: &[QueryCondition]) -> DomainResult<u64>;

    /// 过滤、排序并分页
    async fn filter_objects(&self, meta: &ElementMeta, criteria: &FilterCriteria) -> DomainResult<FilterResult>;
}
