use crate::app::registrator::{RegistrationSettings, DEFAULT_RETRY_DELAY};
use crate::core::directory_cache::{RefreshSchedule, DEFAULT_REFRESH_PERIOD};
use crate::core::fan_out::{FanOutSettings, DEFAULT_MAX_CONCURRENCY, DEFAULT_REQUEST_TIMEOUT};
use crate::core::ConfigProvider;
use crate::domain::model::{ApiKind, Provider};
use crate::utils::error::{MiddlewareError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_required_field,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub fan_out: FanOutConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    pub provider: Option<Provider>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub url: Option<String>,
    pub refresh_initial_delay_ms: Option<u64>,
    pub refresh_period_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FanOutConfig {
    pub max_concurrency: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub enabled: Option<bool>,
    pub retry_delay_seconds: Option<u64>,
    pub served_apis: Option<BTreeSet<ApiKind>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
}

impl MiddlewareConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MiddlewareError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MiddlewareError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DIRECTORY_URL})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MiddlewareError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        // 目錄位址是唯一必填的設定
        let url = validate_required_field("directory.url", &self.directory.url)?;
        validate_url("directory.url", url)?;

        if let Some(period) = self.directory.refresh_period_ms {
            validate_positive_number("directory.refresh_period_ms", period, 1)?;
        }

        if let Some(concurrency) = self.fan_out.max_concurrency {
            validate_positive_number("fan_out.max_concurrency", concurrency as u64, 1)?;
        }

        if let Some(timeout) = self.fan_out.request_timeout_seconds {
            validate_range(
                "fan_out.request_timeout_seconds",
                timeout,
                1,
                MAX_REQUEST_TIMEOUT_SECONDS,
            )?;
        }

        if let Some(provider) = &self.provider {
            validate_non_empty_string("provider.id", &provider.id)?;
            if !provider.service_url.is_empty() {
                validate_url("provider.service_url", &provider.service_url)?;
            }
        }

        Ok(())
    }

    pub fn refresh_schedule(&self) -> RefreshSchedule {
        RefreshSchedule {
            initial_delay: Duration::from_millis(
                self.directory.refresh_initial_delay_ms.unwrap_or(0),
            ),
            period: self
                .directory
                .refresh_period_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REFRESH_PERIOD),
        }
    }

    pub fn fan_out_settings(&self) -> FanOutSettings {
        FanOutSettings {
            max_concurrency: self.max_concurrency(),
            request_timeout: self
                .fan_out
                .request_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn registration_settings(&self) -> RegistrationSettings {
        RegistrationSettings {
            enabled: self.registration.enabled.unwrap_or(false),
            retry_delay: self
                .registration
                .retry_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_DELAY),
            served_apis: self.registration.served_apis.clone(),
        }
    }

    pub fn log_format(&self) -> LogFormat {
        self.logging
            .as_ref()
            .and_then(|l| l.format)
            .unwrap_or_default()
    }
}

impl ConfigProvider for MiddlewareConfig {
    fn directory_url(&self) -> &str {
        self.directory.url.as_deref().unwrap_or_default()
    }

    fn max_concurrency(&self) -> usize {
        self.fan_out
            .max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    fn request_timeout_seconds(&self) -> u64 {
        self.fan_out
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_secs())
    }
}

impl Validate for MiddlewareConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
