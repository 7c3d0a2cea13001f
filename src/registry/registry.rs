//! 注册表核心定义

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use rat_logger::{debug, info, warn};

use crate::adapter::DomainAdapter;
use crate::error::{DomainError, DomainResult};
use crate::i18n::{t, tf};
use crate::model::{Element, ElementMeta, meta};

/// 领域注册表 - 管理存储提供者和已解析的元素
///
/// 生命周期：启动时注册提供者，第一次仓储操作时冻结，关闭后所有查找失败
pub struct DomainRegistry {
    /// 存储提供者映射 (提供者键 -> 适配器)
    pub(crate) providers: DashMap<String, Arc<dyn DomainAdapter>>,
    /// 元素目录 (类型名 -> 元数据)
    pub(crate) elements: DashMap<String, Arc<ElementMeta>>,
    frozen: AtomicBool,
    closed: AtomicBool,
}

impl DomainRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            elements: DashMap::new(),
            frozen: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// 注册存储提供者
    ///
    /// 冻结或关闭之后注册、重复注册同一个键都返回配置错误
    pub fn register_provider(&self, key: &str, adapter: Arc<dyn DomainAdapter>) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::config(t("error.registry_closed")));
        }
        if self.is_frozen() {
            warn!("注册表已冻结，拒绝注册存储提供者: {}", key);
            return Err(DomainError::config(tf("error.registry_frozen", &[("provider", key)])));
        }
        if self.providers.contains_key(key) {
            return Err(DomainError::config(tf("error.provider_exists", &[("provider", key)])));
        }

        info!("注册存储提供者: key={}, type={}", key, adapter.adapter_type());
        self.providers.insert(key.to_string(), adapter);
        Ok(())
    }

    /// 已注册的提供者键，按字母序
    pub fn providers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.providers.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// 登记已解析的元素，同名元素只保留第一次登记的
    pub fn catalogue(&self, meta: Arc<ElementMeta>) {
        self.elements
            .entry(meta.name().to_string())
            .or_insert_with(|| {
                debug!("登记元素: {} -> {}", meta.name(), meta.schema_name());
                meta
            });
    }

    /// 按类型名查找已登记的元素
    pub fn element_by_name(&self, name: &str) -> DomainResult<Arc<ElementMeta>> {
        self.elements
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DomainError::incorrect_usage(format!("Element '{}' is not registered", name)))
    }

    /// 已登记的元素名，按字母序
    pub fn registered_elements(&self) -> Vec<String> {
        let mut names: Vec<String> = self.elements.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// 获取元素类型 `T` 绑定的适配器
    pub fn get_adapter<T: Element>(&self) -> DomainResult<Arc<dyn DomainAdapter>> {
        let meta = meta::<T>()?;
        self.get_adapter_for(&meta)
    }

    /// 获取元素绑定的适配器
    pub fn get_adapter_for(&self, meta: &ElementMeta) -> DomainResult<Arc<dyn DomainAdapter>> {
        if self.is_closed() {
            return Err(DomainError::config(t("error.registry_closed")));
        }
        self.providers
            .get(meta.provider())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DomainError::config(tf("error.provider_not_found", &[("provider", meta.provider())])))
    }

    /// 冻结注册表，之后不再接受新的提供者
    pub fn freeze(&self) {
        if !self.frozen.swap(true, Ordering::SeqCst) {
            info!("注册表已冻结，提供者: {:?}", self.providers());
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// 关闭注册表并释放全部适配器
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let count = self.providers.len();
        self.providers.clear();
        info!("注册表已关闭，释放 {} 个存储提供者", count);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DomainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainRegistry")
            .field("providers", &self.providers())
            .field("elements", &self.registered_elements())
            .field("frozen", &self.is_frozen())
            .field("closed", &self.is_closed())
            .finish()
    }
}
