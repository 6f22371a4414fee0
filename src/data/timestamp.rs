//! Timestamp derivation for out-of-time validation
//!
//! Extraction is deterministic and never mutates the instance. A timestamp
//! that cannot be derived is reported as an error; it is never silently
//! replaced by the current time, since that would corrupt the no-leakage
//! guarantee of the out-of-time split.

use crate::data::{AttributeValue, Instance};
use crate::error::{Result, TimefoldError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Derives the timestamp of an instance.
pub trait DateTimeExtractor: Send + Sync {
    fn extract(&self, instance: &Instance) -> Result<DateTime<Utc>>;
}

/// Uses the timestamp stored on the instance itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredTimestampExtractor;

impl DateTimeExtractor for StoredTimestampExtractor {
    fn extract(&self, instance: &Instance) -> Result<DateTime<Utc>> {
        instance.timestamp().ok_or_else(|| {
            TimefoldError::TimestampExtraction("instance has no stored timestamp".to_string())
        })
    }
}

/// Composes a timestamp from scattered attribute fields named
/// `<prefix>-year`, `<prefix>-monthOfYear`, `<prefix>-dayOfMonth`,
/// `<prefix>-hourOfDay` and `<prefix>-minuteOfHour`.
///
/// Missing components default to 1; a component that is present but not
/// numeric, or a combination that is not a valid calendar date, is an error.
#[derive(Debug, Clone)]
pub struct ComposedFieldExtractor {
    prefix: String,
}

impl ComposedFieldExtractor {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn component(&self, instance: &Instance, suffix: &str) -> Result<i64> {
        let name = format!("{}-{}", self.prefix, suffix);
        match instance.attribute(&name) {
            None => Ok(1),
            Some(value) => value.as_numeric().map(|v| v as i64).ok_or_else(|| {
                TimefoldError::TimestampExtraction(format!(
                    "attribute '{}' is not numeric: {:?}",
                    name, value
                ))
            }),
        }
    }
}

impl DateTimeExtractor for ComposedFieldExtractor {
    fn extract(&self, instance: &Instance) -> Result<DateTime<Utc>> {
        let year = self.component(instance, "year")?;
        let month = self.component(instance, "monthOfYear")?;
        let day = self.component(instance, "dayOfMonth")?;
        let hour = self.component(instance, "hourOfDay")?;
        let minute = self.component(instance, "minuteOfHour")?;

        let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .ok_or_else(|| {
                TimefoldError::TimestampExtraction(format!(
                    "invalid date {}-{}-{}",
                    year, month, day
                ))
            })?;
        let datetime = date
            .and_hms_opt(hour as u32, minute as u32, 0)
            .ok_or_else(|| {
                TimefoldError::TimestampExtraction(format!("invalid time {}:{}", hour, minute))
            })?;

        Ok(Utc.from_utc_datetime(&datetime))
    }
}

/// Parses a timestamp from a single string attribute using a chrono format
/// string, e.g. `%Y-%m-%d %H:%M:%S` against a `created_at` field.
#[derive(Debug, Clone)]
pub struct ParsedFieldExtractor {
    field: String,
    format: String,
}

impl ParsedFieldExtractor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }
}

impl DateTimeExtractor for ParsedFieldExtractor {
    fn extract(&self, instance: &Instance) -> Result<DateTime<Utc>> {
        let value = instance.attribute(&self.field).ok_or_else(|| {
            TimefoldError::TimestampExtraction(format!("attribute '{}' is missing", self.field))
        })?;

        let text = match value {
            AttributeValue::Categorical(s) => s.as_str(),
            other => {
                return Err(TimefoldError::TimestampExtraction(format!(
                    "attribute '{}' is not a string: {:?}",
                    self.field, other
                )))
            }
        };

        let parsed = NaiveDateTime::parse_from_str(text, &self.format).map_err(|e| {
            TimefoldError::TimestampExtraction(format!(
                "could not parse '{}' with format '{}': {}",
                text, self.format, e
            ))
        })?;

        Ok(Utc.from_utc_datetime(&parsed))
    }
}
