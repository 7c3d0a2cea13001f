//! 注册表模块
//!
//! 进程级的存储提供者与元素目录，提供全局便捷函数

mod registry;

pub use registry::DomainRegistry;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::adapter::DomainAdapter;
use crate::error::DomainResult;
use crate::model::ElementMeta;

/// 全局注册表实例
static GLOBAL_REGISTRY: Lazy<DomainRegistry> = Lazy::new(DomainRegistry::new);

/// 获取全局注册表
pub fn global_registry() -> &'static DomainRegistry {
    &GLOBAL_REGISTRY
}

/// 便捷函数 - 注册存储提供者
pub fn register_provider(key: &str, adapter: Arc<dyn DomainAdapter>) -> DomainResult<()> {
    global_registry().register_provider(key, adapter)
}

/// 便捷函数 - 按类型名查找元素
pub fn element_by_name(name: &str) -> DomainResult<Arc<ElementMeta>> {
    global_registry().element_by_name(name)
}
