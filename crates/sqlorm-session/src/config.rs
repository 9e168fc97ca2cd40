//! Datasource configuration.

use serde::{Deserialize, Serialize};

/// Threshold of the embedded-application variant of the PostgreSQL adapter.
pub const EMBEDDED_RECONNECT_THRESHOLD: u32 = 3;

/// How a result reads rows from its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// One `fetchone()` per object
    Incremental,
    /// A single `fetchall()` when the result is created
    Buffered,
}

/// Behavior of one datasource.
///
/// Unset options take the adapter's default: PostgreSQL reconnects after
/// 50 consecutive connectivity failures, the other adapters never do, and
/// Gadfly buffers results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// Consecutive connectivity failures tolerated before reconnecting
    pub reconnect_threshold: Option<u32>,
    /// Log statements at `info` instead of `debug`
    pub debug: bool,
    pub fetch_mode: Option<FetchMode>,
    /// Codec name used instead of asking the backend
    pub encoding: Option<String>,
}

impl DatasourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for datasources living inside an application server,
    /// which give up on a connection much sooner.
    pub fn embedded() -> Self {
        Self::default().reconnect_threshold(EMBEDDED_RECONNECT_THRESHOLD)
    }

    pub fn reconnect_threshold(mut self, failures: u32) -> Self {
        self.reconnect_threshold = Some(failures);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = Some(mode);
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_choices_to_the_adapter() {
        let config = DatasourceConfig::default();
        assert_eq!(config.reconnect_threshold, None);
        assert_eq!(config.fetch_mode, None);
        assert!(!config.debug);
    }

    #[test]
    fn test_embedded() {
        assert_eq!(DatasourceConfig::embedded().reconnect_threshold, Some(3));
    }

    #[test]
    fn test_deserialize() {
        let config: DatasourceConfig = serde_json::from_str(
            r#"{"reconnect_threshold":10,"debug":true,"fetch_mode":"buffered","encoding":null}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            DatasourceConfig::new()
                .reconnect_threshold(10)
                .debug(true)
                .fetch_mode(FetchMode::Buffered)
        );
    }
}
