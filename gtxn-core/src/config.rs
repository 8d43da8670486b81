//! The configuration surface enumerated in spec §6.

use serde::{Deserialize, Serialize};

use crate::retry::{
    DEFAULT_MAX_RETRIES_EMBEDDED, DEFAULT_MAX_RETRIES_INDEXED, DEFAULT_OPERATION_DEADLINE_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterMode {
    Embedded,
    Indexed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub writer_mode: WriterMode,
    pub max_retries: u32,
    pub operation_deadline_ms: u64,
    pub kv_connect_timeout_ms: u64,
    pub kv_op_timeout_ms: u64,
    pub concurrent_clients: u32,
    pub duration_seconds: u64,
    pub business_reject_on_negative_balance: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            writer_mode: WriterMode::Embedded,
            max_retries: DEFAULT_MAX_RETRIES_EMBEDDED,
            operation_deadline_ms: DEFAULT_OPERATION_DEADLINE_MS,
            kv_connect_timeout_ms: 10_000,
            kv_op_timeout_ms: 1_500,
            concurrent_clients: 10,
            duration_seconds: 60,
            business_reject_on_negative_balance: false,
        }
    }
}

impl EngineConfig {
    /// `maxRetries` default is writer-mode dependent (spec §4.2): 3 for
    /// embedded, 5 per document for indexed. Call this after setting
    /// `writer_mode` to pick up the right default, or set `max_retries`
    /// explicitly to override it.
    pub fn with_mode_defaults(mut self, mode: WriterMode) -> Self {
        self.writer_mode = mode;
        self.max_retries = match mode {
            WriterMode::Embedded => DEFAULT_MAX_RETRIES_EMBEDDED,
            WriterMode::Indexed => DEFAULT_MAX_RETRIES_INDEXED,
        };
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.concurrent_clients == 0 || self.concurrent_clients > 1000 {
            return Err(format!(
                "concurrent_clients must be in 1..=1000, got {}",
                self.concurrent_clients
            ));
        }
        if self.duration_seconds == 0 {
            return Err("duration_seconds must be >= 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.operation_deadline_ms, 50);
        assert_eq!(cfg.kv_connect_timeout_ms, 10_000);
        assert_eq!(cfg.kv_op_timeout_ms, 1_500);
    }

    #[test]
    fn indexed_mode_picks_five_retries() {
        let cfg = EngineConfig::default().with_mode_defaults(WriterMode::Indexed);
        assert_eq!(cfg.max_retries, 5);
    }

    #[test]
    fn validate_rejects_out_of_range_clients() {
        let mut cfg = EngineConfig::default();
        cfg.concurrent_clients = 0;
        assert!(cfg.validate().is_err());
        cfg.concurrent_clients = 1001;
        assert!(cfg.validate().is_err());
        cfg.concurrent_clients = 1000;
        assert!(cfg.validate().is_ok());
    }
}
