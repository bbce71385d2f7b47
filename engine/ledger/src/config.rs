//! Configuration for the event processor

use crate::{DEFAULT_COALESCING_WINDOW_SECS, DEFAULT_STORE_LABEL};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Largest coalescing window chrono can represent
const MAX_COALESCING_WINDOW_SECS: u64 = i64::MAX as u64 / 1000;

/// Label format used when the configured one cannot be rendered
const FALLBACK_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Ledger and event processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Same-user edits within this many seconds of a history entry merge into it
    pub coalescing_window_secs: u64,

    /// Label for the routine save after every mutation
    pub default_label: String,

    /// strftime format of the archive label written on reset (local time)
    pub archive_label_format: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            coalescing_window_secs: DEFAULT_COALESCING_WINDOW_SECS,
            default_label: DEFAULT_STORE_LABEL.to_string(),
            archive_label_format: "%-d %b, %Y %H:%M".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Get the coalescing window as a chrono duration
    pub fn coalescing_window(&self) -> chrono::Duration {
        let secs = self.coalescing_window_secs.min(MAX_COALESCING_WINDOW_SECS) as i64;
        chrono::Duration::seconds(secs)
    }

    /// Render the human-readable archive label for a reset at `at`
    pub fn archive_label(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&Local);
        let mut label = String::new();
        if write!(label, "{}", local.format(&self.archive_label_format)).is_err() {
            tracing::warn!("Cannot render archive label format '{}'", self.archive_label_format);
            label.clear();
            let _ = write!(label, "{}", local.format(FALLBACK_LABEL_FORMAT));
        }
        label
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.default_label.trim().is_empty() {
            return Err("default_label must not be empty".to_string());
        }

        if self.coalescing_window_secs > MAX_COALESCING_WINDOW_SECS {
            return Err(format!("coalescing_window_secs must be at most {MAX_COALESCING_WINDOW_SECS}"));
        }

        if self.archive_label_format.trim().is_empty() {
            return Err("archive_label_format must not be empty".to_string());
        }

        if StrftimeItems::new(&self.archive_label_format).any(|item| matches!(item, Item::Error)) {
            return Err(format!("Invalid archive_label_format '{}'", self.archive_label_format));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.coalescing_window(), chrono::Duration::minutes(2));
        assert_eq!(config.default_label, "history");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_archive_label_is_human_readable() {
        let config = LedgerConfig { archive_label_format: "%Y".to_string(), ..Default::default() };
        let at = DateTime::parse_from_rfc3339("2006-01-02T15:04:00Z").unwrap().with_timezone(&Utc);

        let label = config.archive_label(at);
        // Local offset can move the instant across a day but never across this year boundary
        assert_eq!(label, "2006");
    }

    #[test]
    fn test_empty_label_rejected() {
        let config = LedgerConfig { default_label: " ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unrenderable_label_format_rejected() {
        let config = LedgerConfig { archive_label_format: "%Q".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        // Rendering it anyway falls back instead of failing the reset
        let at = DateTime::parse_from_rfc3339("2006-01-02T15:04:00Z").unwrap().with_timezone(&Utc);
        assert!(config.archive_label(at).starts_with("200"));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let config = LedgerConfig { coalescing_window_secs: u64::MAX, ..Default::default() };
        assert!(config.validate().is_err());
        assert_eq!(
            config.coalescing_window(),
            chrono::Duration::seconds(MAX_COALESCING_WINDOW_SECS as i64)
        );

        let config = LedgerConfig {
            coalescing_window_secs: MAX_COALESCING_WINDOW_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
