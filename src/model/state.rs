//! 实体生命周期状态

/// 实体的生命周期标志
///
/// 状态迁移：新建 → 已持久化 → 已修改 → 已删除。
/// 新建和已删除的实体不会进入已修改状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityState {
    new: bool,
    changed: bool,
    destroyed: bool,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            new: true,
            changed: false,
            destroyed: false,
        }
    }
}

impl EntityState {
    pub fn is_new(&self) -> bool {
        self.new
    }

    /// 已持久化且未删除
    pub fn is_persisted(&self) -> bool {
        !self.new && !self.destroyed
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// 重置为新建状态
    pub fn mark_new(&mut self) {
        self.new = true;
        self.changed = false;
        self.destroyed = false;
    }

    /// 创建或保存成功
    pub fn mark_saved(&mut self) {
        self.new = false;
        self.changed = false;
    }

    /// 从存储中读出
    pub fn mark_retrieved(&mut self) {
        self.new = false;
        self.changed = false;
        self.destroyed = false;
    }

    /// 持久化之后有字段被修改
    pub fn mark_changed(&mut self) {
        if !(self.new || self.destroyed) {
            self.changed = true;
        }
    }

    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.changed = false;
    }
}
