use crate::utils::error::{MiddlewareError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(MiddlewareError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(MiddlewareError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(MiddlewareError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(MiddlewareError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| MiddlewareError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MiddlewareError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(MiddlewareError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("directory.url", "https://directory.example.com").is_ok());
        assert!(validate_url("directory.url", "http://localhost:8080/api").is_ok());
        assert!(validate_url("directory.url", "").is_err());
        assert!(validate_url("directory.url", "invalid-url").is_err());
        assert!(validate_url("directory.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("fan_out.max_concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("fan_out.max_concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("http://directory".to_string());
        let missing: Option<String> = None;
        assert_eq!(
            validate_required_field("directory.url", &present).unwrap(),
            "http://directory"
        );
        assert!(matches!(
            validate_required_field("directory.url", &missing),
            Err(MiddlewareError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_range_and_strings() {
        assert!(validate_range("timeout", 30u64, 1, 600).is_ok());
        assert!(validate_range("timeout", 0u64, 1, 600).is_err());
        assert!(validate_non_empty_string("provider.id", "  ").is_err());
        assert!(validate_non_empty_string("provider.id", "demo").is_ok());
    }
}
