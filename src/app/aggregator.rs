use crate::adapters::provider_requests::{
    build_get_bookings_request, build_get_options_request, build_search_places_request,
    OptionsQuery, PlacesQuery,
};
use crate::core::capability_index::ProviderFilter;
use crate::core::directory_cache::ProviderDirectoryCache;
use crate::core::fan_out::{FanOutEngine, FanOutSettings, TokenSource};
use crate::domain::booking_state::BookingState;
use crate::domain::model::{
    ApiKind, Booking, DirectorySnapshot, MobilityType, Mode, Place, Provider, TripOption,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Consumer-facing queries across all known providers.
pub struct MobilityAggregator {
    engine: FanOutEngine,
}

impl MobilityAggregator {
    pub fn new(cache: Arc<ProviderDirectoryCache>, settings: FanOutSettings) -> Self {
        Self {
            engine: FanOutEngine::new(cache, settings),
        }
    }

    pub fn engine(&self) -> &FanOutEngine {
        &self.engine
    }

    pub async fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.engine.cache().snapshot().await
    }

    /// 依 id 篩選；空集合代表全部
    pub async fn providers_by_ids(&self, ids: &BTreeSet<String>) -> Vec<Provider> {
        let snapshot = self.snapshot().await;
        ProviderFilter::new()
            .with_ids(ids.iter().cloned())
            .apply(&snapshot)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn provider(&self, service_id: &str) -> Option<Provider> {
        self.snapshot().await.get(service_id).cloned()
    }

    pub async fn providers_matching(
        &self,
        any_of_modes: &BTreeSet<Mode>,
        any_of_mobility_types: &BTreeSet<MobilityType>,
        all_of_apis: &BTreeSet<ApiKind>,
    ) -> Vec<Provider> {
        let snapshot = self.snapshot().await;
        ProviderFilter::new()
            .requiring_apis(all_of_apis.iter().copied())
            .allowing_modes(any_of_modes.iter().copied())
            .allowing_mobility_types(any_of_mobility_types.iter().copied())
            .apply(&snapshot)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn search_places(&self, query: &PlacesQuery, tokens: &TokenSource) -> Vec<Place> {
        // 只問有 PLACES_API 的 provider
        let filter = ProviderFilter::new().requiring_api(ApiKind::Places);

        let places: Vec<Place> = self
            .engine
            .dispatch(&filter, tokens, |provider, token| {
                build_search_places_request(provider, query, token)
            })
            .await;

        tracing::info!("📍 Place search returned {} places", places.len());
        places
    }

    pub async fn get_options(&self, query: &OptionsQuery, tokens: &TokenSource) -> Vec<TripOption> {
        // OPTIONS_API 加上查詢指定的模式與移動類型
        let filter = ProviderFilter::new()
            .requiring_api(ApiKind::Options)
            .allowing_modes(query.modes_allowed.iter().copied())
            .allowing_mobility_types(query.mobility_types_allowed.iter().copied());

        let options: Vec<TripOption> = self
            .engine
            .dispatch(&filter, tokens, |provider, token| {
                build_get_options_request(provider, query, token)
            })
            .await;

        tracing::info!("🚗 Option search returned {} options", options.len());
        options
    }

    pub async fn get_bookings(
        &self,
        service_ids: &BTreeSet<String>,
        state: Option<BookingState>,
        tokens: &TokenSource,
    ) -> Vec<Booking> {
        // BOOKING_API，限定在指定的 id
        let filter = ProviderFilter::new()
            .requiring_api(ApiKind::Booking)
            .with_ids(service_ids.iter().cloned());

        let bookings: Vec<Booking> = self
            .engine
            .dispatch(&filter, tokens, |provider, token| {
                build_get_bookings_request(provider, state, token)
            })
            .await;

        tracing::info!("📒 Booking query returned {} bookings", bookings.len());
        bookings
    }
}
