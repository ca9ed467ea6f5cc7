//! Builders for the provider endpoints used by the consumer aggregations.
//!
//! Optional parameters are only added when present and sensible.

use crate::core::fan_out::ProviderRequest;
use crate::domain::booking_state::BookingState;
use crate::domain::model::{join_csv, Coordinates, MobilityType, Mode, Provider};
use crate::utils::datetime::to_epoch_millis;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub const OPTIONS_PATH: &str = "/options";
pub const PLACES_PATH: &str = "/places";
pub const BOOKINGS_PATH: &str = "/bookings";

/// Parameters of `GET /options`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsQuery {
    pub from: Coordinates,
    pub from_place_id: Option<String>,
    pub to: Option<Coordinates>,
    pub to_place_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub radius_meter: Option<i32>,
    pub sharing_allowed: Option<bool>,
    pub modes_allowed: BTreeSet<Mode>,
    pub mobility_types_allowed: BTreeSet<MobilityType>,
    pub limit_to: Option<u32>,
}

impl OptionsQuery {
    pub fn new(from: Coordinates) -> Self {
        Self {
            from,
            from_place_id: None,
            to: None,
            to_place_id: None,
            start_time: None,
            end_time: None,
            radius_meter: None,
            sharing_allowed: None,
            modes_allowed: BTreeSet::new(),
            mobility_types_allowed: BTreeSet::new(),
            limit_to: None,
        }
    }
}

/// Parameters of `GET /places`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacesQuery {
    pub query: Option<String>,
    pub area_center: Option<Coordinates>,
    pub radius_meter: Option<i32>,
    pub limit_to: Option<u32>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn non_empty_csv<T: std::fmt::Display>(values: &BTreeSet<T>) -> Option<String> {
    (!values.is_empty()).then(|| join_csv(values))
}

pub fn build_get_options_request(
    provider: &Provider,
    query: &OptionsQuery,
    token: Option<String>,
) -> ProviderRequest {
    ProviderRequest::get(provider, OPTIONS_PATH)
        .query("from", query.from)
        .query_opt("fromPlaceId", non_blank(&query.from_place_id))
        .query_opt("to", query.to)
        .query_opt("toPlaceId", non_blank(&query.to_place_id))
        .query_opt("startTime", query.start_time.as_ref().map(to_epoch_millis))
        .query_opt("endTime", query.end_time.as_ref().map(to_epoch_millis))
        .query_opt("radiusMeter", query.radius_meter.filter(|r| *r >= 0))
        .query_opt("sharingAllowed", query.sharing_allowed)
        .query_opt("modesAllowed", non_empty_csv(&query.modes_allowed))
        .query_opt(
            "mobilityTypesAllowed",
            non_empty_csv(&query.mobility_types_allowed),
        )
        .query_opt("limitTo", query.limit_to)
        .token(token)
}

pub fn build_search_places_request(
    provider: &Provider,
    query: &PlacesQuery,
    token: Option<String>,
) -> ProviderRequest {
    ProviderRequest::get(provider, PLACES_PATH)
        .query_opt("query", non_blank(&query.query))
        .query_opt("areaCenter", query.area_center)
        .query_opt("radiusMeter", query.radius_meter.filter(|r| *r >= 0))
        .query_opt("limitTo", query.limit_to)
        .token(token)
}

pub fn build_get_bookings_request(
    provider: &Provider,
    state: Option<BookingState>,
    token: Option<String>,
) -> ProviderRequest {
    ProviderRequest::get(provider, BOOKINGS_PATH)
        .query_opt("state", state)
        .token(token)
}
