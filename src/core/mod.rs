pub mod capability_index;
pub mod directory_cache;
pub mod fan_out;

pub use crate::domain::model::{DirectorySnapshot, Provider};
pub use crate::domain::ports::{ConfigProvider, DirectorySource};
pub use crate::utils::error::Result;
pub use capability_index::ProviderFilter;
pub use directory_cache::{ProviderDirectoryCache, RefreshHandle, RefreshSchedule};
pub use fan_out::{FanOutEngine, FanOutSettings, ProviderRequest, TokenSource};
