//! 测试支持模块
//!
//! 内存适配器以及在全局注册表上安装它的便捷函数

use std::sync::Arc;

use crate::error::DomainResult;
use crate::registry::global_registry;

pub use crate::adapter::MemoryAdapter;

/// 在全局注册表上以 `key` 注册一个新的内存适配器
///
/// 返回适配器句柄，便于测试直接检查存储内容。必须在第一次仓储操作之前调用
pub fn install_memory_provider(key: &str) -> DomainResult<Arc<MemoryAdapter>> {
    let adapter = Arc::new(MemoryAdapter::new());
    global_registry().register_provider(key, adapter.clone())?;
    Ok(adapter)
}
