use thiserror::Error;

#[derive(Error, Debug)]
pub enum MiddlewareError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Service directory request failed: {message}")]
    DirectoryFetchError { message: String },

    #[error("Request to provider '{service_id}' failed: {message}")]
    ProviderRequestError { service_id: String, message: String },

    #[error("Booking cannot advance from {from} to {to}")]
    InvalidTransitionError { from: String, to: String },

    #[error("Registration at service directory failed: {message}")]
    RegistrationError { message: String },

    #[error("Invalid coordinates '{value}': {reason}")]
    InvalidCoordinatesError { value: String, reason: String },

    #[error("Invalid date-time '{value}'")]
    InvalidDateTimeError { value: String },

    #[error("Unknown {kind} '{value}'")]
    UnknownValueError { kind: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Domain,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MiddlewareError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_)
            | Self::DirectoryFetchError { .. }
            | Self::ProviderRequestError { .. }
            | Self::RegistrationError { .. } => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::SerializationError(_)
            | Self::InvalidCoordinatesError { .. }
            | Self::InvalidDateTimeError { .. }
            | Self::UnknownValueError { .. } => ErrorCategory::Data,
            Self::InvalidTransitionError { .. } => ErrorCategory::Domain,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Domain => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) | Self::ProviderRequestError { .. } => {
                "Check that the provider is reachable and answers with a JSON list"
            }
            Self::DirectoryFetchError { .. } => {
                "Check directory.url and that the service directory is running"
            }
            Self::RegistrationError { .. } => {
                "The registration is retried automatically; check the service directory logs"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file and start again"
            }
            Self::InvalidCoordinatesError { .. } => "Use the form <lat>,<lon>, e.g. 48.7758,9.1829",
            Self::InvalidDateTimeError { .. } => {
                "Use epoch milliseconds or an ISO date-time such as 2020-01-01T10:00:00+01:00"
            }
            Self::InvalidTransitionError { .. } => {
                "Reload the booking, its state may have changed in the meantime"
            }
            Self::UnknownValueError { .. } => "Use one of the literal names, e.g. OPTIONS_API or CAR",
            Self::SerializationError(_) => "Check the payload format of the remote service",
            Self::IoError(_) => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
            ErrorCategory::Domain => format!("Request rejected: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, MiddlewareError>;
