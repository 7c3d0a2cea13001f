//! # 日志配置构建器模块

use crate::config::core::{LogLevel, LoggingConfig};
use crate::error::DomainResult;
use rat_logger::debug;

/// 日志配置构建器
///
/// 级别、控制台和结构化三个选项都没有默认值，缺一个 [`build`](Self::build) 就失败
#[derive(Debug, Default)]
pub struct LoggingConfigBuilder {
    level: Option<LogLevel>,
    console: Option<bool>,
    structured: Option<bool>,
}

impl LoggingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有配置为起点，只改动需要的选项
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: Some(config.level),
            console: Some(config.console),
            structured: Some(config.structured),
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// 是否挂载终端输出
    pub fn console(mut self, console: bool) -> Self {
        self.console = Some(console);
        self
    }

    pub fn structured(mut self, structured: bool) -> Self {
        self.structured = Some(structured);
        self
    }

    /// 构建日志配置，未设置的选项返回 [`DomainError::Config`](crate::DomainError::Config)
    pub fn build(self) -> DomainResult<LoggingConfig> {
        let (Some(level), Some(console), Some(structured)) = (self.level, self.console, self.structured) else {
            let mut missing = Vec::new();
            if self.level.is_none() {
                missing.push("level");
            }
            if self.console.is_none() {
                missing.push("console");
            }
            if self.structured.is_none() {
                missing.push("structured");
            }
            return Err(crate::domain_error!(
                config,
                format!("日志配置缺少选项: {}", missing.join(", "))
            ));
        };

        debug!("创建日志配置: 级别={:?}, 控制台={}, 结构化={}", level, console, structured);
        Ok(LoggingConfig {
            level,
            console,
            structured,
        })
    }
}

impl LoggingConfig {
    /// 创建日志配置构建器
    pub fn builder() -> LoggingConfigBuilder {
        LoggingConfigBuilder::new()
    }
}
