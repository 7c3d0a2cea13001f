//! # 领域配置构建器模块

use crate::config::core::{DomainConfig, LoggingConfig};
use crate::error::DomainResult;
use rat_logger::debug;

/// 领域配置构建器
///
/// 所有配置项都必须显式设置
#[derive(Debug, Default)]
pub struct DomainConfigBuilder {
    default_provider: Option<String>,
    default_per_page: Option<usize>,
    language: Option<String>,
    logging: Option<LoggingConfig>,
}

impl DomainConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置默认存储提供者键
    pub fn default_provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    /// 设置默认每页条数
    pub fn default_per_page(mut self, per_page: usize) -> Self {
        self.default_per_page = Some(per_page);
        self
    }

    /// 设置错误消息语言，如 `zh-CN`、`en-US`、`ja-JP`
    pub fn language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = Some(language.into());
        self
    }

    /// 设置日志配置
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// 构建领域配置
    ///
    /// # 错误
    ///
    /// 如果任何必需的配置项未设置或取值无效，将返回错误
    pub fn build(self) -> DomainResult<DomainConfig> {
        let default_provider = self
            .default_provider
            .ok_or_else(|| crate::domain_error!(config, "默认存储提供者必须设置"))?;
        let default_per_page = self
            .default_per_page
            .ok_or_else(|| crate::domain_error!(config, "默认每页条数必须设置"))?;
        let language = self
            .language
            .ok_or_else(|| crate::domain_error!(config, "语言必须设置"))?;
        let logging = self
            .logging
            .ok_or_else(|| crate::domain_error!(config, "日志配置必须设置"))?;

        let config = DomainConfig {
            default_provider,
            default_per_page,
            language,
            logging,
        };
        config.validate()?;

        debug!(
            "创建领域配置: provider={}, per_page={}, language={}",
            config.default_provider, config.default_per_page, config.language
        );
        Ok(config)
    }
}
