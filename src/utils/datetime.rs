//! Timestamps arrive either as epoch milliseconds or as ISO date-times.
//! Outbound query parameters always use epoch milliseconds.

use crate::utils::error::{MiddlewareError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// 解析 epoch 毫秒或 ISO 格式的時間
pub fn parse_flexible(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    // 先試 epoch 毫秒
    if let Ok(millis) = trimmed.parse::<i64>() {
        return from_epoch_millis(millis).ok_or_else(|| invalid(value));
    }

    // 帶時區的 ISO 格式
    if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(zoned.with_timezone(&Utc));
    }

    // 沒有時區資訊時視為 UTC
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid(value))
}

pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

pub fn to_epoch_millis(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

fn invalid(value: &str) -> MiddlewareError {
    MiddlewareError::InvalidDateTimeError {
        value: value.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDateTime {
    Millis(i64),
    Text(String),
}

impl RawDateTime {
    fn resolve(self) -> Result<DateTime<Utc>> {
        match self {
            RawDateTime::Millis(millis) => {
                from_epoch_millis(millis).ok_or_else(|| invalid(&millis.to_string()))
            }
            RawDateTime::Text(text) => parse_flexible(&text),
        }
    }
}

/// `#[serde(deserialize_with = "flexible::deserialize")]`
pub mod flexible {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawDateTime::deserialize(deserializer)?
            .resolve()
            .map_err(serde::de::Error::custom)
    }
}

pub mod flexible_option {
    use super::*;

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawDateTime>::deserialize(deserializer)?
            .map(RawDateTime::resolve)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
