//! rat_domain - 领域对象建模层
//!
//! 以声明式字段表描述实体、聚合与值对象，提供身份管理、校验管道、
//! 关联装配以及基于可插拔适配器的仓储与延迟查询

// 导出所有公共模块
pub mod error;
pub mod i18n;
pub mod types;
pub mod model;
pub mod adapter;
pub mod registry;
pub mod repository;
pub mod config;
pub mod testing;

// 重新导出常用类型和函数
pub use error::{DomainError, DomainResult, ErrorMessages};
pub use types::*;
pub use model::{
    AttributeSource, Container, Element, ElementDecl, ElementKind, ElementMeta, ElementOptions, ElementRef,
    Entity, EntityState, FieldDefault, StagedChanges, FieldDefinition, FieldType, FieldValues, meta,
    auto_field, boolean_field, datetime_field, dict_field, float_field, has_many_field,
    has_one_field, identifier_field, integer_field, list_field, reference_field,
    string_field, text_field, uuid_field, value_object_field,
};
pub use adapter::{DomainAdapter, FilterCriteria, FilterResult, MemoryAdapter, StorageRecord};
pub use registry::{DomainRegistry, element_by_name, global_registry, register_provider};
pub use repository::{QuerySet, Repository, ResultSet};
pub use config::{
    DomainConfig, DomainConfigBuilder, LogLevel, LoggingConfig, LoggingConfigBuilder, init_logging,
};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_domain库
///
/// 注册多语言错误消息，并根据 RAT_LANG 环境变量选择语言
///
/// 注意：日志系统由调用者自行初始化，可使用 [`config::init_logging`]
pub fn init() {
    i18n::ErrorMessageI18n::init();
}

/// 使用显式配置初始化rat_domain库
///
/// 除了 [`init`] 的工作外，还会切换语言并安装全局配置，
/// 之后的默认分页大小和默认存储提供者都从该配置读取
pub fn init_with_config(config: DomainConfig) {
    i18n::ErrorMessageI18n::init();
    i18n::apply_language(&config.language);
    config::install(config);
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
