// Adapters layer: HTTP access to the service directory and provider request shapes.

pub mod directory_client;
pub mod provider_requests;

pub use directory_client::HttpDirectoryClient;
pub use provider_requests::{OptionsQuery, PlacesQuery};
