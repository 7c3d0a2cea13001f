//! # 配置管理模块 - 核心配置类型
//!
//! 提供领域层的全局配置，支持构建器模式和文件加载。
//! 构建器严格要求所有配置项显式设置；未安装配置时使用 [`DomainConfig::baseline`]

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use rat_logger::{LevelFilter, LoggerBuilder, handler::term::TermConfig, info};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// 领域层配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// 元素未声明 provider 时使用的存储提供者键
    pub default_provider: String,
    /// 查询集合默认的每页条数
    pub default_per_page: usize,
    /// 错误消息语言
    pub language: String,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否启用结构化日志
    pub structured: bool,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 错误级别
    Error,
    /// 警告级别
    Warn,
    /// 信息级别
    Info,
    /// 调试级别
    Debug,
    /// 跟踪级别
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl DomainConfig {
    /// 创建配置构建器
    pub fn builder() -> super::builders::DomainConfigBuilder {
        super::builders::DomainConfigBuilder::new()
    }

    /// 未安装任何配置时的基线配置
    pub fn baseline() -> Self {
        Self {
            default_provider: "default".to_string(),
            default_per_page: 10,
            language: "zh-CN".to_string(),
            logging: LoggingConfig {
                level: LogLevel::Info,
                console: true,
                structured: false,
            },
        }
    }

    /// 从配置文件加载配置，扩展名为 `toml` 时按TOML解析，否则按JSON解析
    ///
    /// # 参数
    ///
    /// * `config_path` - 配置文件路径
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> DomainResult<Self> {
        let content = std::fs::read_to_string(config_path.as_ref())?;

        let config: DomainConfig = if is_toml(config_path.as_ref()) {
            toml::from_str(&content)
                .map_err(|e| crate::domain_error!(serialization, format!("解析TOML配置文件失败: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| crate::domain_error!(serialization, format!("解析JSON配置文件失败: {}", e)))?
        };
        config.validate()?;

        info!("从文件加载配置: {:?}", config_path.as_ref());
        Ok(config)
    }

    /// 保存配置到文件
    ///
    /// # 参数
    ///
    /// * `config_path` - 配置文件路径
    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> DomainResult<()> {
        let content = if is_toml(config_path.as_ref()) {
            toml::to_string_pretty(self)
                .map_err(|e| crate::domain_error!(serialization, format!("序列化TOML配置失败: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| crate::domain_error!(serialization, format!("序列化JSON配置失败: {}", e)))?
        };

        std::fs::write(config_path.as_ref(), content)?;

        info!("保存配置到文件: {:?}", config_path.as_ref());
        Ok(())
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.default_provider.trim().is_empty() {
            return Err(crate::domain_error!(config, "默认存储提供者不能为空"));
        }
        if self.default_per_page == 0 {
            return Err(crate::domain_error!(config, "默认每页条数不能为零"));
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("toml")
}

static GLOBAL_CONFIG: Lazy<ArcSwap<DomainConfig>> =
    Lazy::new(|| ArcSwap::from_pointee(DomainConfig::baseline()));

/// 当前生效的全局配置
pub fn current() -> Arc<DomainConfig> {
    GLOBAL_CONFIG.load_full()
}

/// 安装全局配置
///
/// 已解析的元素不受影响，新的默认提供者只作用于之后第一次解析的元素
pub fn install(config: DomainConfig) {
    info!(
        "安装全局配置: provider={}, per_page={}, language={}",
        config.default_provider, config.default_per_page, config.language
    );
    GLOBAL_CONFIG.store(Arc::new(config));
}

/// 按日志配置初始化 rat_logger
///
/// 库本身从不初始化日志系统，由调用者决定是否调用
pub fn init_logging(config: &LoggingConfig) -> DomainResult<()> {
    let mut builder = LoggerBuilder::new().with_level(config.level.into());
    if config.console {
        builder = builder.add_terminal_with_config(TermConfig::default());
    }
    builder
        .init()
        .map_err(|e| DomainError::config(format!("日志初始化失败: {}", e)))?;

    info!(
        "日志系统已初始化: 级别={:?}, 控制台={}, 结构化={}",
        config.level, config.console, config.structured
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline() {
        let config = DomainConfig::baseline();
        assert_eq!(config.default_provider, "default");
        assert_eq!(config.default_per_page, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = DomainConfig::baseline();
        config.default_per_page = 0;
        assert!(matches!(config.validate(), Err(DomainError::Config { .. })));
    }

    #[test]
    fn test_log_level_mapping() {
        assert!(matches!(LevelFilter::from(LogLevel::Debug), LevelFilter::Debug));
        assert!(matches!(LevelFilter::from(LogLevel::Error), LevelFilter::Error));
    }
}
