use crate::adapters::provider_requests::{OptionsQuery, PlacesQuery};
use crate::core::fan_out::TokenSource;
use crate::domain::booking_state::BookingState;
use crate::domain::model::{ApiKind, Coordinates, MobilityType, Mode};
use crate::utils::datetime::parse_flexible;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Parser)]
#[command(name = "mobility-middleware")]
#[command(about = "Aggregates mobility providers registered at a service directory")]
pub struct CliArgs {
    #[arg(long, default_value = "middleware.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Keep the provider directory fresh and register this provider until Ctrl-C
    Serve,
    /// List known providers
    Providers(ProvidersArgs),
    /// Search places across providers
    Places(PlacesArgs),
    /// Search trip options across providers
    Options(OptionsArgs),
    /// List bookings across providers
    Bookings(BookingsArgs),
}

/// 每個 provider 的 token，格式為 `serviceId=token`
#[derive(Debug, Clone, Default, Args)]
pub struct TokenArgs {
    #[arg(long = "token", value_parser = parse_token_pair)]
    pub tokens: Vec<(String, String)>,
}

impl TokenArgs {
    /// Without any `--token`, every provider is called without a token.
    pub fn token_source(&self) -> TokenSource {
        if self.tokens.is_empty() {
            TokenSource::None
        } else {
            TokenSource::map(self.tokens.iter().cloned())
        }
    }
}

fn parse_token_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((id, token)) if !id.trim().is_empty() => {
            Ok((id.trim().to_string(), token.trim().to_string()))
        }
        _ => Err(format!("expected serviceId=token, got '{}'", value)),
    }
}

#[derive(Debug, Clone, Args)]
pub struct ProvidersArgs {
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    #[arg(long, value_delimiter = ',')]
    pub modes: Vec<Mode>,

    #[arg(long, value_delimiter = ',')]
    pub mobility_types: Vec<MobilityType>,

    #[arg(long, value_delimiter = ',')]
    pub apis: Vec<ApiKind>,
}

#[derive(Debug, Clone, Args)]
pub struct PlacesArgs {
    #[arg(long)]
    pub query: Option<String>,

    #[arg(long, allow_hyphen_values = true, help = "lat,lon")]
    pub area_center: Option<Coordinates>,

    #[arg(long, allow_negative_numbers = true)]
    pub radius: Option<i32>,

    #[arg(long)]
    pub limit_to: Option<u32>,

    #[command(flatten)]
    pub tokens: TokenArgs,
}

impl PlacesArgs {
    pub fn to_query(&self) -> PlacesQuery {
        PlacesQuery {
            query: self.query.clone(),
            area_center: self.area_center,
            radius_meter: self.radius,
            limit_to: self.limit_to,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct OptionsArgs {
    #[arg(long, allow_hyphen_values = true, help = "lat,lon")]
    pub from: Coordinates,

    #[arg(long)]
    pub from_place_id: Option<String>,

    #[arg(long, allow_hyphen_values = true, help = "lat,lon")]
    pub to: Option<Coordinates>,

    #[arg(long)]
    pub to_place_id: Option<String>,

    #[arg(long, value_parser = parse_flexible, help = "Epoch millis or RFC 3339")]
    pub start_time: Option<DateTime<Utc>>,

    #[arg(long, value_parser = parse_flexible, help = "Epoch millis or RFC 3339")]
    pub end_time: Option<DateTime<Utc>>,

    #[arg(long, allow_negative_numbers = true)]
    pub radius: Option<i32>,

    #[arg(long)]
    pub sharing_allowed: Option<bool>,

    #[arg(long, value_delimiter = ',')]
    pub modes: Vec<Mode>,

    #[arg(long, value_delimiter = ',')]
    pub mobility_types: Vec<MobilityType>,

    #[arg(long)]
    pub limit_to: Option<u32>,

    #[command(flatten)]
    pub tokens: TokenArgs,
}

impl OptionsArgs {
    pub fn to_query(&self) -> OptionsQuery {
        OptionsQuery {
            from_place_id: self.from_place_id.clone(),
            to: self.to,
            to_place_id: self.to_place_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            radius_meter: self.radius,
            sharing_allowed: self.sharing_allowed,
            modes_allowed: self.modes.iter().copied().collect(),
            mobility_types_allowed: self.mobility_types.iter().copied().collect(),
            limit_to: self.limit_to,
            ..OptionsQuery::new(self.from)
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct BookingsArgs {
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    #[arg(long)]
    pub state: Option<BookingState>,

    #[command(flatten)]
    pub tokens: TokenArgs,
}

impl BookingsArgs {
    pub fn service_ids(&self) -> BTreeSet<String> {
        self.ids.iter().cloned().collect()
    }
}
