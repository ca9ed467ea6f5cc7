pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{HttpDirectoryClient, OptionsQuery, PlacesQuery};
pub use app::{MobilityAggregator, ProviderRegistrator, RegistrationOutcome, RegistrationSettings};
pub use config::{LogFormat, MiddlewareConfig};
pub use core::{
    FanOutEngine, FanOutSettings, ProviderDirectoryCache, ProviderFilter, RefreshSchedule,
    TokenSource,
};
pub use domain::booking_state::{can_advance, BookingState};
pub use domain::model::{
    ApiKind, Booking, Coordinates, DirectorySnapshot, Leg, MobilityType, Mode, Place, Provider,
    TripOption,
};
pub use utils::error::{MiddlewareError, Result};
