pub mod aggregator;
pub mod registrator;

pub use aggregator::MobilityAggregator;
pub use registrator::{ProviderRegistrator, RegistrationOutcome, RegistrationSettings};
