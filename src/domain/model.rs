use crate::utils::datetime;
use crate::utils::error::{MiddlewareError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// 產生以字面名稱在網路上傳輸的封閉列舉
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = MiddlewareError;

            fn from_str(value: &str) -> Result<Self> {
                let wanted = value.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| MiddlewareError::UnknownValueError {
                        kind: $kind,
                        value: value.to_string(),
                    })
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum!(
    /// The APIs a provider can expose to consumers.
    ApiKind, "api" {
        Assets => "ASSETS_API",
        Places => "PLACES_API",
        Options => "OPTIONS_API",
        Booking => "BOOKING_API",
        Tokens => "TOKENS_API",
        Users => "USERS_API",
    }
);

wire_enum!(
    Mode, "mode" {
        Walk => "WALK",
        Bike => "BIKE",
        Car => "CAR",
        Scooter => "SCOOTER",
        Moped => "MOPED",
        Motorcycle => "MOTORCYCLE",
        Bus => "BUS",
        Tram => "TRAM",
        Metro => "METRO",
        Train => "TRAIN",
        Ferry => "FERRY",
        Taxi => "TAXI",
        Other => "OTHER",
    }
);

wire_enum!(
    MobilityType, "mobility type" {
        FreeFloating => "FREE_FLOATING",
        StationBased => "STATION_BASED",
        RideSharing => "RIDE_SHARING",
        RideHailing => "RIDE_HAILING",
        PublicTransport => "PUBLIC_TRANSPORT",
    }
);

/// 以逗號串接，用於查詢參數
pub fn join_csv<T: fmt::Display>(values: &BTreeSet<T>) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Provider record exactly as the service directory delivers it. Capability
/// sets may be missing or `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProvider {
    pub id: String,
    #[serde(default, alias = "provider_name")]
    pub provider_name: Option<String>,
    #[serde(default, alias = "service_name")]
    pub service_name: Option<String>,
    #[serde(default, alias = "service_url")]
    pub service_url: Option<String>,
    #[serde(default)]
    pub apis: Option<BTreeSet<ApiKind>>,
    #[serde(default)]
    pub modes: Option<BTreeSet<Mode>>,
    #[serde(default, alias = "mobility_types")]
    pub mobility_types: Option<BTreeSet<MobilityType>>,
}

impl RawProvider {
    /// 缺少的能力集合一律補成空集合
    pub fn sanitize(self) -> Provider {
        Provider {
            id: self.id,
            provider_name: self.provider_name.unwrap_or_default(),
            service_name: self.service_name.unwrap_or_default(),
            service_url: self.service_url.unwrap_or_default(),
            apis: self.apis.unwrap_or_default(),
            modes: self.modes.unwrap_or_default(),
            mobility_types: self.mobility_types.unwrap_or_default(),
        }
    }
}

/// A mobility provider known to the service directory. The capability sets
/// are always present; absence is an empty set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawProvider")]
pub struct Provider {
    pub id: String,
    pub provider_name: String,
    pub service_name: String,
    pub service_url: String,
    pub apis: BTreeSet<ApiKind>,
    pub modes: BTreeSet<Mode>,
    pub mobility_types: BTreeSet<MobilityType>,
}

impl From<RawProvider> for Provider {
    fn from(raw: RawProvider) -> Self {
        raw.sanitize()
    }
}

impl Provider {
    pub fn new(id: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_name: String::new(),
            service_name: String::new(),
            service_url: service_url.into(),
            apis: BTreeSet::new(),
            modes: BTreeSet::new(),
            mobility_types: BTreeSet::new(),
        }
    }

    pub fn with_apis(mut self, apis: impl IntoIterator<Item = ApiKind>) -> Self {
        self.apis = apis.into_iter().collect();
        self
    }

    pub fn with_modes(mut self, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.modes = modes.into_iter().collect();
        self
    }

    pub fn with_mobility_types(mut self, types: impl IntoIterator<Item = MobilityType>) -> Self {
        self.mobility_types = types.into_iter().collect();
        self
    }

    pub fn supports_api(&self, api: ApiKind) -> bool {
        self.apis.contains(&api)
    }

    pub fn supports_all_apis(&self, apis: &BTreeSet<ApiKind>) -> bool {
        apis.is_subset(&self.apis)
    }

    pub fn supports_any_mode(&self, modes: &BTreeSet<Mode>) -> bool {
        !self.modes.is_disjoint(modes)
    }

    pub fn supports_any_mobility_type(&self, types: &BTreeSet<MobilityType>) -> bool {
        !self.mobility_types.is_disjoint(types)
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }
}

/// Immutable point-in-time view of the service directory.
#[derive(Debug, PartialEq, Eq)]
pub struct DirectorySnapshot {
    generation: u64,
    providers: Vec<Provider>,
}

impl DirectorySnapshot {
    pub fn new(generation: u64, providers: Vec<Provider>) -> Self {
        Self {
            generation,
            providers,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn get(&self, service_id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == service_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let value = format!("{},{}", lat, lon);
        if !(-90.0..=90.0).contains(&lat) {
            return Err(MiddlewareError::InvalidCoordinatesError {
                value,
                reason: "latitude must be between -90 and 90".to_string(),
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(MiddlewareError::InvalidCoordinatesError {
                value,
                reason: "longitude must be between -180 and 180".to_string(),
            });
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl FromStr for Coordinates {
    type Err = MiddlewareError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = |reason: &str| MiddlewareError::InvalidCoordinatesError {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        // 格式：<lat>,<lon>
        let (lat, lon) = value
            .split_once(',')
            .ok_or_else(|| invalid("expected <lat>,<lon>"))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("latitude is not a number"))?;
        let lon = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("longitude is not a number"))?;

        Self::new(lat, lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}

impl Place {
    pub fn at(coordinates: Coordinates) -> Self {
        Self {
            id: None,
            name: None,
            lat: coordinates.lat,
            lon: coordinates.lon,
            service_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub service_id: String,
    #[serde(deserialize_with = "datetime::flexible::deserialize")]
    pub start_time: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "datetime::flexible_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    pub from: Place,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Place>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

/// A way to travel from A to (optionally) B offered by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripOption {
    pub service_id: String,
    pub leg: Leg,
    /// Booking this option starts the trip right away, skipping `BOOKED`.
    pub immediate_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_reference: Option<String>,
    #[serde(
        default,
        deserialize_with = "datetime::flexible_option::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub valid_until: Option<DateTime<Utc>>,
}

impl TripOption {
    /// Takes over everything except `immediate_start` from `other`.
    pub fn update_from(&mut self, other: &TripOption) -> &mut Self {
        self.service_id = other.service_id.clone();
        self.leg = other.leg.clone();
        self.option_reference = other.option_reference.clone();
        self.valid_until = other.valid_until;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub state: crate::domain::booking_state::BookingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<TripOption>,
}
