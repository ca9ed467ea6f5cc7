use crate::domain::model::{ApiKind, Provider};
use crate::domain::ports::DirectorySource;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    pub enabled: bool,
    pub retry_delay: Duration,
    /// APIs this process actually serves. `None` trusts the configured set.
    pub served_apis: Option<BTreeSet<ApiKind>>,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            served_apis: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Disabled,
    NothingToRegister,
    Registered { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// 比對設定的 API 與實際提供的 API，只保留兩者皆有的
pub fn reconcile_apis(
    configured: &BTreeSet<ApiKind>,
    served: &BTreeSet<ApiKind>,
) -> BTreeSet<ApiKind> {
    // 設定了但沒有實作
    for api in configured.difference(served) {
        tracing::warn!(
            "⚠️ API {} is configured but not served by this provider, it will not be advertised",
            api
        );
    }
    // 有實作但沒有設定
    for api in served.difference(configured) {
        tracing::warn!(
            "⚠️ API {} is served but not configured, it will not be advertised",
            api
        );
    }

    configured.intersection(served).copied().collect()
}

/// Registers this provider at the service directory, retrying with a fixed
/// delay until it succeeds or shutdown is signalled.
pub struct ProviderRegistrator {
    directory: Arc<dyn DirectorySource>,
    provider: Option<Provider>,
    settings: RegistrationSettings,
}

impl ProviderRegistrator {
    pub fn new(
        directory: Arc<dyn DirectorySource>,
        provider: Option<Provider>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            directory,
            provider,
            settings,
        }
    }

    /// The provider as it will be advertised, after API reconciliation.
    pub fn advertised_provider(&self) -> Option<Provider> {
        let mut provider = self.provider.clone()?;
        if let Some(served) = &self.settings.served_apis {
            provider.apis = reconcile_apis(&provider.apis, served);
        }
        Some(provider)
    }

    pub async fn register_until_success(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> RegistrationOutcome {
        if !self.settings.enabled {
            tracing::warn!("Service registration is disabled");
            return RegistrationOutcome::Disabled;
        }

        let Some(provider) = self.advertised_provider() else {
            tracing::warn!(
                "No provider description configured, nothing will be registered and no consumer will find this service"
            );
            return RegistrationOutcome::NothingToRegister;
        };

        tracing::info!("📝 Registering provider '{}' at the service directory...", provider.id);

        let mut attempts = 0;
        loop {
            // 已收到關閉訊號就不再嘗試
            if *shutdown.borrow() {
                return RegistrationOutcome::Cancelled { attempts };
            }

            attempts += 1;
            match self.directory.register(&provider).await {
                Ok(()) => {
                    tracing::info!("✅ Registration successful after {} attempt(s)", attempts);
                    return RegistrationOutcome::Registered { attempts };
                }
                Err(e) => {
                    tracing::info!(
                        "Registration failed. Retrying after {:?}",
                        self.settings.retry_delay
                    );
                    tracing::trace!(error = %e, "Registration failure reason");
                }
            }

            // 固定間隔重試，關閉時立即結束
            tokio::select! {
                _ = tokio::time::sleep(self.settings.retry_delay) => {}
                _ = shutdown.changed() => {
                    tracing::info!("Registration retry cancelled by shutdown");
                    return RegistrationOutcome::Cancelled { attempts };
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<RegistrationOutcome> {
        tokio::spawn(async move { self.register_until_success(shutdown).await })
    }
}
