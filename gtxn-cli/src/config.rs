//! CLI-level configuration: a TOML file (loaded via `confy`) holding
//! defaults for the engine configuration surface (spec §6), overridable by
//! CLI flags at the call site.

use serde_derive::{Deserialize, Serialize};

use gtxn_core::config::{EngineConfig, WriterMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub writer_mode: WriterMode,
    pub max_retries: u32,
    pub operation_deadline_ms: u64,
    pub kv_connect_timeout_ms: u64,
    pub kv_op_timeout_ms: u64,
    pub concurrent_clients: u32,
    pub duration_seconds: u64,
    pub business_reject_on_negative_balance: bool,
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        CliConfig {
            writer_mode: engine.writer_mode,
            max_retries: engine.max_retries,
            operation_deadline_ms: engine.operation_deadline_ms,
            kv_connect_timeout_ms: engine.kv_connect_timeout_ms,
            kv_op_timeout_ms: engine.kv_op_timeout_ms,
            concurrent_clients: engine.concurrent_clients,
            duration_seconds: engine.duration_seconds,
            business_reject_on_negative_balance: engine.business_reject_on_negative_balance,
            log_level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Loads from `path`, falling back to defaults (with a warning to
    /// stderr) if the file is missing or malformed -- the CLI should still
    /// run off built-in defaults when no config file has been set up yet.
    pub fn load(path: &str) -> Self {
        confy::load_path(path).unwrap_or_else(|err| {
            eprintln!("failed to load config from {path}, using defaults: {err}");
            CliConfig::default()
        })
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            writer_mode: self.writer_mode,
            max_retries: self.max_retries,
            operation_deadline_ms: self.operation_deadline_ms,
            kv_connect_timeout_ms: self.kv_connect_timeout_ms,
            kv_op_timeout_ms: self.kv_op_timeout_ms,
            concurrent_clients: self.concurrent_clients,
            duration_seconds: self.duration_seconds,
            business_reject_on_negative_balance: self.business_reject_on_negative_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_into_engine_config() {
        let cli = CliConfig::default();
        let engine = cli.to_engine_config();
        assert_eq!(engine.max_retries, 3);
        assert_eq!(engine.writer_mode, WriterMode::Embedded);
    }
}
