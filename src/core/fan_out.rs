use crate::core::capability_index::ProviderFilter;
use crate::core::directory_cache::ProviderDirectoryCache;
use crate::domain::model::Provider;
use crate::utils::error::{MiddlewareError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Header carrying the per-provider user token.
pub const TOKEN_HEADER: &str = "token";

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the per-provider token comes from.
#[derive(Clone, Default)]
pub enum TokenSource {
    #[default]
    None,
    /// Same lookup for every provider.
    Getter(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
    /// Explicit service id to token map. Providers missing from the map are
    /// not called at all.
    Map(HashMap<String, String>),
}

impl TokenSource {
    pub fn getter<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        TokenSource::Getter(Arc::new(lookup))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        TokenSource::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// 使用 token 對照表時，只有表內的 provider 會被呼叫
    pub fn admits(&self, service_id: &str) -> bool {
        match self {
            TokenSource::Map(tokens) => tokens.contains_key(service_id),
            _ => true,
        }
    }

    pub fn token_for(&self, service_id: &str) -> Option<String> {
        match self {
            TokenSource::None => None,
            TokenSource::Getter(lookup) => lookup(service_id),
            TokenSource::Map(tokens) => tokens.get(service_id).cloned(),
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::None => f.write_str("TokenSource::None"),
            TokenSource::Getter(_) => f.write_str("TokenSource::Getter(..)"),
            TokenSource::Map(tokens) => f
                .debug_tuple("TokenSource::Map")
                .field(&tokens.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// One outbound GET to one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub service_id: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub token: Option<String>,
}

impl ProviderRequest {
    pub fn get(provider: &Provider, path: &str) -> Self {
        Self {
            service_id: provider.id.clone(),
            url: format!("{}{}", provider.base_url(), path),
            query: Vec::new(),
            token: None,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Blank tokens are dropped.
    pub fn token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutSettings {
    pub max_concurrency: usize,
    pub request_timeout: Duration,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Sends one request per selected provider, concurrently, and merges the
/// answers. A provider that fails or answers `null` contributes nothing.
pub struct FanOutEngine {
    cache: Arc<ProviderDirectoryCache>,
    client: Client,
    settings: FanOutSettings,
}

impl FanOutEngine {
    pub fn new(cache: Arc<ProviderDirectoryCache>, settings: FanOutSettings) -> Self {
        Self::with_client(cache, Client::new(), settings)
    }

    pub fn with_client(
        cache: Arc<ProviderDirectoryCache>,
        client: Client,
        settings: FanOutSettings,
    ) -> Self {
        Self {
            cache,
            client,
            settings: FanOutSettings {
                max_concurrency: settings.max_concurrency.max(1),
                ..settings
            },
        }
    }

    pub fn cache(&self) -> &Arc<ProviderDirectoryCache> {
        &self.cache
    }

    pub fn settings(&self) -> FanOutSettings {
        self.settings
    }

    /// Selects providers from the current snapshot, builds their requests
    /// and runs them.
    ///
    /// Results of different providers come back in completion order; the
    /// order inside one provider's list is kept.
    pub async fn dispatch<T, F>(
        &self,
        filter: &ProviderFilter,
        tokens: &TokenSource,
        build: F,
    ) -> Vec<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&Provider, Option<String>) -> ProviderRequest,
    {
        // 整次查詢只用同一份 snapshot
        let snapshot = self.cache.snapshot().await;

        let requests: Vec<ProviderRequest> = filter
            .apply(&snapshot)
            .into_iter()
            // 有 token 對照表時，表外的 provider 不呼叫
            .filter(|provider| tokens.admits(&provider.id))
            .map(|provider| build(provider, tokens.token_for(&provider.id)))
            .collect();

        tracing::debug!(
            generation = snapshot.generation(),
            selected = requests.len(),
            "📡 Dispatching provider requests"
        );

        self.execute_all(requests).await
    }

    /// Runs already built requests, at most `max_concurrency` at a time.
    pub async fn execute_all<T>(&self, requests: Vec<ProviderRequest>) -> Vec<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if requests.is_empty() {
            return Vec::new();
        }

        // 以 semaphore 限制同時進行的請求數
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let mut calls = JoinSet::new();

        for request in requests {
            let client = self.client.clone();
            let permits = Arc::clone(&permits);
            let timeout = self.settings.request_timeout;

            calls.spawn(async move {
                // permit 持有到請求結束
                let _permit = permits.acquire_owned().await.ok();
                let service_id = request.service_id.clone();
                let outcome = call_provider::<T>(&client, request, timeout).await;
                (service_id, outcome)
            });
        }

        let mut results = Vec::new();
        // 依完成順序收集結果，失敗的 provider 不影響其他結果
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((service_id, Ok(Some(items)))) => {
                    tracing::debug!(service_id = %service_id, count = items.len(), "Provider answered");
                    results.extend(items);
                }
                Ok((service_id, Ok(None))) => {
                    tracing::warn!(service_id = %service_id, "⚠️ Provider returned an empty body, skipping");
                }
                Ok((service_id, Err(e))) => {
                    tracing::warn!(service_id = %service_id, error = %e, "⚠️ Provider request failed, skipping");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "⚠️ Provider call did not complete, skipping");
                }
            }
        }

        results
    }
}

/// `Ok(None)` for an empty or `null` body.
async fn call_provider<T: DeserializeOwned>(
    client: &Client,
    request: ProviderRequest,
    timeout: Duration,
) -> Result<Option<Vec<T>>> {
    tracing::debug!(service_id = %request.service_id, url = %request.url, "Calling provider");

    let mut builder = client
        .get(&request.url)
        .query(&request.query)
        .timeout(timeout);

    // token 放在 header
    if let Some(token) = &request.token {
        builder = builder.header(TOKEN_HEADER, token);
    }

    let response = builder.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MiddlewareError::ProviderRequestError {
            service_id: request.service_id,
            message: format!("unexpected status {}", status),
        });
    }

    // 空白內容視同 null
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    Ok(serde_json::from_slice::<Option<Vec<T>>>(&body)?)
}
