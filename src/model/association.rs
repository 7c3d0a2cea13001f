//! 反向一对多关联的暂存区
//!
//! 通过 [`Entity::add`](crate::model::Entity::add) / [`Entity::remove`](crate::model::Entity::remove)
//! 产生的变更先记在这里，保存所属实体时由仓储按 删除 → 更新 → 新增 的顺序落盘

use std::collections::{BTreeMap, HashMap};

use crate::adapter::StorageRecord;

/// 单个关联字段上暂存的子元素变更，按子元素标识索引
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedChanges {
    added: BTreeMap<String, StorageRecord>,
    updated: BTreeMap<String, StorageRecord>,
    removed: BTreeMap<String, StorageRecord>,
}

impl StagedChanges {
    /// 暂存新增的子元素
    pub(crate) fn stage_add(&mut self, key: String, record: StorageRecord) {
        self.removed.remove(&key);
        self.added.insert(key, record);
    }

    /// 暂存已持久化子元素的修改
    pub(crate) fn stage_update(&mut self, key: String, record: StorageRecord) {
        self.removed.remove(&key);
        if self.added.contains_key(&key) {
            self.added.insert(key, record);
        } else {
            self.updated.insert(key, record);
        }
    }

    /// 暂存移除；尚未落盘的新增直接撤销
    pub(crate) fn stage_remove(&mut self, key: String, record: StorageRecord) {
        if self.added.remove(&key).is_some() {
            return;
        }
        self.updated.remove(&key);
        self.removed.insert(key, record);
    }

    pub fn added(&self) -> impl Iterator<Item = &StorageRecord> {
        self.added.values()
    }

    pub fn updated(&self) -> impl Iterator<Item = &StorageRecord> {
        self.updated.values()
    }

    pub fn removed(&self) -> impl Iterator<Item = &StorageRecord> {
        self.removed.values()
    }

    pub(crate) fn is_removed(&self, key: &str) -> bool {
        self.removed.contains_key(key)
    }

    pub(crate) fn replacement(&self, key: &str) -> Option<&StorageRecord> {
        self.updated.get(key).or_else(|| self.added.get(key))
    }

    pub(crate) fn is_added(&self, key: &str) -> bool {
        self.added.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// 暂存的变更数
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// 实体上全部关联字段的暂存区
#[derive(Debug, Clone, Default)]
pub(crate) struct AssociationCache {
    fields: HashMap<String, StagedChanges>,
}

impl AssociationCache {
    pub(crate) fn entry(&mut self, field: &str) -> &mut StagedChanges {
        self.fields.entry(field.to_string()).or_default()
    }

    pub(crate) fn get(&self, field: &str) -> Option<&StagedChanges> {
        self.fields.get(field)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.values().all(StagedChanges::is_empty)
    }

    /// 按字段名排序的暂存区
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &StagedChanges)> {
        let mut entries: Vec<_> = self.fields.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;

    #[test]
    fn test_remove_cancels_pending_add() {
        let mut staged = StagedChanges::default();
        staged.stage_add("c1".to_string(), data! {"id" => "c1"});
        staged.stage_remove("c1".to_string(), data! {"id" => "c1"});
        assert!(staged.is_empty());
    }

    #[test]
    fn test_remove_after_update() {
        let mut staged = StagedChanges::default();
        staged.stage_update("c1".to_string(), data! {"id" => "c1", "title" => "new"});
        staged.stage_remove("c1".to_string(), data! {"id" => "c1"});
        assert_eq!(staged.updated().count(), 0);
        assert!(staged.is_removed("c1"));
        assert_eq!(staged.len(), 1);
    }

    #[test]
    fn test_update_of_pending_add_stays_added() {
        let mut staged = StagedChanges::default();
        staged.stage_add("c1".to_string(), data! {"id" => "c1", "title" => "a"});
        staged.stage_update("c1".to_string(), data! {"id" => "c1", "title" => "b"});
        assert!(staged.is_added("c1"));
        assert_eq!(staged.updated().count(), 0);
        assert_eq!(
            staged.replacement("c1").and_then(|r| r.get("title")),
            Some(&crate::types::DataValue::from("b"))
        );
    }
}
