use crate::domain::model::{DirectorySnapshot, Provider, RawProvider};
use crate::domain::ports::DirectorySource;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 預設每天刷新一次
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    pub initial_delay: Duration,
    pub period: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            period: DEFAULT_REFRESH_PERIOD,
        }
    }
}

/// Registry of known providers, refreshed from the service directory.
///
/// The current snapshot lives in a watch channel: every reader waiting for
/// the first load shares the same signal, and later refreshes just replace
/// the value. Readers never see a partially built snapshot and keep the one
/// they hold for as long as they need it.
pub struct ProviderDirectoryCache {
    source: Arc<dyn DirectorySource>,
    current: watch::Sender<Option<Arc<DirectorySnapshot>>>,
    // 寫入鎖，同時記錄最後發布的 generation
    generation: Mutex<u64>,
}

impl ProviderDirectoryCache {
    pub fn new(source: Arc<dyn DirectorySource>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            source,
            current,
            generation: Mutex::new(0),
        }
    }

    /// Fetches the provider list once and publishes it as a new snapshot.
    ///
    /// A failed fetch or a `null` body publishes an empty snapshot; the
    /// previous providers are not kept.
    pub async fn refresh(&self) -> Arc<DirectorySnapshot> {
        tracing::info!("🔄 Refreshing available providers from service directory");

        let providers: Vec<Provider> = match self.source.fetch_providers().await {
            Ok(Some(raw)) => raw.into_iter().map(RawProvider::sanitize).collect(),
            Ok(None) => {
                tracing::warn!(
                    "⚠️ Service directory returned a null provider list, publishing an empty snapshot"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "⚠️ Fetching providers failed, publishing an empty snapshot"
                );
                Vec::new()
            }
        };

        let snapshot = self.publish(providers);
        tracing::debug!(
            generation = snapshot.generation(),
            providers = snapshot.len(),
            "Done refreshing available providers"
        );
        snapshot
    }

    fn publish(&self, providers: Vec<Provider>) -> Arc<DirectorySnapshot> {
        let mut generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;

        let snapshot = Arc::new(DirectorySnapshot::new(*generation, providers));
        // 持有寫入鎖時發布，generation 與發布順序一致
        self.current.send_replace(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Returns the latest snapshot, waiting for the first refresh if none
    /// has been published yet. Never waits again afterwards.
    pub async fn snapshot(&self) -> Arc<DirectorySnapshot> {
        let current = self.current.borrow().clone();
        if let Some(snapshot) = current {
            return snapshot;
        }

        tracing::debug!("Waiting for the first provider snapshot");
        let mut receiver = self.current.subscribe();
        // 尚未載入，等待第一次刷新
        let published = match receiver.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };

        // sender 屬於 self，等待期間 channel 不會關閉
        published.unwrap_or_else(|| Arc::new(DirectorySnapshot::new(0, Vec::new())))
    }

    /// Current snapshot without waiting, `None` before the first refresh.
    pub fn try_snapshot(&self) -> Option<Arc<DirectorySnapshot>> {
        self.current.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Starts the periodic refresh on the current runtime.
    pub fn spawn_refresh_task(self: &Arc<Self>, schedule: RefreshSchedule) -> RefreshHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);

        let task = tokio::spawn(async move {
            tracing::info!(
                initial_delay_ms = schedule.initial_delay.as_millis() as u64,
                period_ms = schedule.period.as_millis() as u64,
                "Provider refresh task started"
            );

            tokio::select! {
                _ = tokio::time::sleep(schedule.initial_delay) => {}
                _ = shutdown_rx.changed() => {
                    tracing::info!("Provider refresh task stopped before first run");
                    return;
                }
            }

            // 錯過的 tick 直接略過，不補跑
            let mut ticker = tokio::time::interval(schedule.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cache.refresh().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            tracing::info!("Provider refresh task stopped");
        });

        RefreshHandle { shutdown, task }
    }
}

/// Handle of the periodic refresh task. Dropping it also stops the task.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    pub async fn shutdown(self) {
        // 任務可能已經結束
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Provider refresh task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ApiKind, Mode};
    use crate::utils::error::{MiddlewareError, Result};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready};

    /// Directory double answering from a queue; the last answer repeats.
    struct ScriptedDirectory {
        answers: Mutex<VecDeque<Result<Option<Vec<RawProvider>>>>>,
        last: Option<Vec<RawProvider>>,
        calls: AtomicUsize,
    }

    impl ScriptedDirectory {
        fn new(answers: Vec<Result<Option<Vec<RawProvider>>>>, last: Option<Vec<RawProvider>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                last,
                calls: AtomicUsize::new(0),
            }
        }

        fn always(providers: Vec<RawProvider>) -> Self {
            Self::new(vec![], Some(providers))
        }
    }

    #[async_trait]
    impl DirectorySource for ScriptedDirectory {
        async fn fetch_providers(&self) -> Result<Option<Vec<RawProvider>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.answers.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.last.clone()))
        }

        async fn register(&self, _provider: &Provider) -> Result<()> {
            Ok(())
        }
    }

    fn raw(id: &str) -> RawProvider {
        RawProvider {
            id: id.to_string(),
            service_url: Some(format!("http://{}/api", id)),
            apis: Some([ApiKind::Options].into()),
            modes: Some([Mode::Car].into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_refresh_sanitizes_missing_sets() {
        let incomplete = RawProvider {
            id: "incomplete".to_string(),
            ..Default::default()
        };
        let cache = ProviderDirectoryCache::new(Arc::new(ScriptedDirectory::always(vec![incomplete])));

        let snapshot = cache.refresh().await;

        let provider = snapshot.get("incomplete").unwrap();
        assert!(provider.apis.is_empty());
        assert!(provider.modes.is_empty());
        assert!(provider.mobility_types.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_twice_bumps_generation_with_equal_content() {
        let cache = ProviderDirectoryCache::new(Arc::new(ScriptedDirectory::always(vec![
            raw("demo1"),
            raw("demo2"),
        ])));

        let first = cache.refresh().await;
        let second = cache.refresh().await;

        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert_eq!(first.providers(), second.providers());
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &cache.snapshot().await));
    }

    #[tokio::test]
    async fn test_fetch_failure_publishes_empty_snapshot() {
        let directory = ScriptedDirectory::new(
            vec![
                Ok(Some(vec![raw("demo1")])),
                Err(MiddlewareError::DirectoryFetchError {
                    message: "connection refused".to_string(),
                }),
                Ok(None),
            ],
            Some(vec![raw("demo1")]),
        );
        let cache = ProviderDirectoryCache::new(Arc::new(directory));

        assert_eq!(cache.refresh().await.len(), 1);

        let after_error = cache.refresh().await;
        assert!(after_error.is_empty());
        assert_eq!(after_error.generation(), 2);

        let after_null = cache.refresh().await;
        assert!(after_null.is_empty());
        assert_eq!(after_null.generation(), 3);

        assert_eq!(cache.refresh().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_waits_for_first_refresh() {
        let cache = Arc::new(ProviderDirectoryCache::new(Arc::new(ScriptedDirectory::always(
            vec![raw("demo1")],
        ))));
        assert!(cache.try_snapshot().is_none());
        assert!(!cache.is_loaded());

        let mut waiting = tokio_test::task::spawn(cache.snapshot());
        assert_pending!(waiting.poll());

        let published = cache.refresh().await;

        assert!(waiting.is_woken());
        let seen = assert_ready!(waiting.poll());
        assert!(Arc::ptr_eq(&seen, &published));
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_concurrent_waiters_see_the_same_snapshot() {
        let cache = Arc::new(ProviderDirectoryCache::new(Arc::new(ScriptedDirectory::always(
            vec![raw("demo1"), raw("demo2")],
        ))));

        let mut waiters = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            waiters.push(tokio::spawn(async move { cache.snapshot().await }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        let published = cache.refresh().await;

        for waiter in waiters {
            let seen = waiter.await.unwrap();
            assert!(Arc::ptr_eq(&seen, &published));
            assert_eq!(seen.generation(), 1);
        }
    }

    /// 第二次之後的抓取會卡住很久
    struct SlowAfterFirstDirectory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DirectorySource for SlowAfterFirstDirectory {
        async fn fetch_providers(&self) -> Result<Option<Vec<RawProvider>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(Some(vec![raw("demo1")]))
        }

        async fn register(&self, _provider: &Provider) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_snapshot_does_not_wait_for_refresh_in_flight() {
        let directory = Arc::new(SlowAfterFirstDirectory {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ProviderDirectoryCache::new(directory.clone()));
        cache.refresh().await;

        let refreshing = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.refresh().await })
        };
        while directory.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        let seen = tokio::time::timeout(Duration::from_millis(100), cache.snapshot())
            .await
            .expect("snapshot must not wait for the running refresh");
        assert_eq!(seen.generation(), 1);
        assert_eq!(seen.len(), 1);

        refreshing.abort();
    }

    #[tokio::test]
    async fn test_refresh_task_runs_periodically_and_stops() {
        let directory = Arc::new(ScriptedDirectory::always(vec![raw("demo1")]));
        let cache = Arc::new(ProviderDirectoryCache::new(directory.clone()));

        let handle = cache.spawn_refresh_task(RefreshSchedule {
            initial_delay: Duration::from_millis(10),
            period: Duration::from_millis(20),
        });

        let first = cache.snapshot().await;
        assert_eq!(first.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;

        let calls = directory.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected several refreshes, got {}", calls);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_refresh_task_shutdown_during_initial_delay() {
        let directory = Arc::new(ScriptedDirectory::always(vec![raw("demo1")]));
        let cache = Arc::new(ProviderDirectoryCache::new(directory.clone()));

        let handle = cache.spawn_refresh_task(RefreshSchedule {
            initial_delay: Duration::from_secs(60),
            period: Duration::from_secs(60),
        });
        handle.shutdown().await;

        assert_eq!(directory.calls.load(Ordering::SeqCst), 0);
        assert!(!cache.is_loaded());
    }
}
