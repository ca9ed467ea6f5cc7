use crate::domain::model::{join_csv, ApiKind, MobilityType, Mode, Provider, RawProvider};
use crate::domain::ports::DirectorySource;
use crate::utils::error::{MiddlewareError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client of the service directory.
#[derive(Debug, Clone)]
pub struct HttpDirectoryClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpDirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 查詢 service directory：模式與類型任一符合，API 須全部支援
    pub async fn search(
        &self,
        any_of_modes: &BTreeSet<Mode>,
        all_of_apis: &BTreeSet<ApiKind>,
        any_of_mobility_types: &BTreeSet<MobilityType>,
    ) -> Result<Option<Vec<RawProvider>>> {
        let url = format!("{}/search", self.base_url);

        // 只查詢啟用中的服務，空的篩選條件不送出
        let mut query = vec![("active", "true".to_string())];
        if !any_of_modes.is_empty() {
            query.push(("modes", join_csv(any_of_modes)));
        }
        if !all_of_apis.is_empty() {
            query.push(("apis", join_csv(all_of_apis)));
        }
        if !any_of_mobility_types.is_empty() {
            query.push(("mobilityTypes", join_csv(any_of_mobility_types)));
        }

        tracing::debug!("Querying service directory: {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await?;

        // 非 2xx 視為抓取失敗
        let status = response.status();
        if !status.is_success() {
            return Err(MiddlewareError::DirectoryFetchError {
                message: format!("{} answered with status {}", url, status),
            });
        }

        // 目錄可能回傳空內容或 null
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DirectorySource for HttpDirectoryClient {
    async fn fetch_providers(&self) -> Result<Option<Vec<RawProvider>>> {
        tracing::info!("Querying service directory for all available providers...");
        self.search(&BTreeSet::new(), &BTreeSet::new(), &BTreeSet::new())
            .await
    }

    async fn register(&self, provider: &Provider) -> Result<()> {
        let url = format!("{}/services", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(provider)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MiddlewareError::RegistrationError {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MiddlewareError::RegistrationError {
                message: format!("{} answered with status {}", url, status),
            });
        }

        Ok(())
    }
}
