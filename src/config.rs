//! Typed settings (A1), loaded from environment with an optional YAML
//! override file via `twelf`, then re-read from the store's `setting` table
//! at startup (spec §6 "override-read from the store").

use serde::Serialize;
use std::path::PathBuf;
use twelf::{Layer, config};

fn default_data_dir() -> String {
    "./data".into()
}
fn default_kosync_primary_port() -> u16 {
    3000
}
fn default_kosync_sync_port() -> u16 {
    3001
}
fn default_debounce_seconds() -> u64 {
    30
}
fn default_sync_period_minutes() -> u64 {
    5
}
fn default_sync_delta_abs_seconds() -> f64 {
    5.0
}
fn default_sync_delta_kosync_percent() -> f64 {
    0.005
}
fn default_sync_delta_kosync_words() -> u32 {
    75
}
fn default_sync_delta_between_clients_percent() -> f64 {
    0.005
}
fn default_suppression_ttl_seconds() -> u64 {
    60
}
fn default_fuzzy_window_fraction() -> f64 {
    0.15
}
fn default_fuzzy_threshold() -> u8 {
    80
}
fn default_cycle_timeout_seconds() -> u64 {
    120
}
fn default_client_call_timeout_seconds() -> u64 {
    20
}
fn default_job_max_retries() -> u32 {
    5
}
fn default_job_retry_delay_minutes() -> u64 {
    10
}
fn default_parsed_ebook_cache_capacity() -> usize {
    3
}
fn default_false() -> bool {
    false
}

#[config]
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(default)]
    pub abs_api_key: String,
    #[serde(default)]
    pub abs_base_url: String,

    #[serde(default)]
    pub kosync_base_url: String,
    #[serde(default)]
    pub kosync_username: String,
    #[serde(default)]
    pub kosync_userkey: String,

    #[serde(default)]
    pub storyteller_base_url: String,
    #[serde(default)]
    pub storyteller_username: String,
    #[serde(default)]
    pub storyteller_password: String,

    #[serde(default)]
    pub booklore_base_url: String,
    #[serde(default)]
    pub booklore_api_token: String,

    #[serde(default)]
    pub hardcover_base_url: String,
    #[serde(default)]
    pub hardcover_api_token: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_kosync_primary_port")]
    pub kosync_primary_port: u16,
    #[serde(default = "default_kosync_sync_port")]
    pub kosync_sync_port: u16,

    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: u64,
    #[serde(default = "default_sync_period_minutes")]
    pub sync_period_minutes: u64,

    #[serde(default = "default_sync_delta_abs_seconds")]
    pub sync_delta_abs_seconds: f64,
    #[serde(default = "default_sync_delta_kosync_percent")]
    pub sync_delta_kosync_percent: f64,
    #[serde(default = "default_sync_delta_kosync_words")]
    pub sync_delta_kosync_words: u32,
    #[serde(default = "default_sync_delta_between_clients_percent")]
    pub sync_delta_between_clients_percent: f64,

    #[serde(default = "default_suppression_ttl_seconds")]
    pub suppression_ttl_seconds: u64,

    #[serde(default = "default_fuzzy_window_fraction")]
    pub fuzzy_window_fraction: f64,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    #[serde(default = "default_cycle_timeout_seconds")]
    pub cycle_timeout_seconds: u64,
    #[serde(default = "default_client_call_timeout_seconds")]
    pub client_call_timeout_seconds: u64,

    #[serde(default = "default_job_max_retries")]
    pub job_max_retries: u32,
    #[serde(default = "default_job_retry_delay_minutes")]
    pub job_retry_delay_minutes: u64,

    #[serde(default = "default_parsed_ebook_cache_capacity")]
    pub parsed_ebook_cache_capacity: usize,

    #[serde(default = "default_false")]
    pub persist_suppression_history: bool,
}

impl Config {
    /// Load env vars, layered over an optional `config.yaml` in the working directory.
    pub fn load() -> Result<Self, twelf::Error> {
        let mut layers = Vec::new();
        let yaml_path = PathBuf::from("config.yaml");
        if yaml_path.exists() {
            layers.push(Layer::Yaml(yaml_path));
        }
        layers.push(Layer::Env(None));
        Config::with_layers(&layers)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.abs_api_key.is_empty() {
            return Err("ABS_API_KEY is missing".into());
        }
        if self.abs_base_url.is_empty() {
            return Err("ABS_BASE_URL is missing".into());
        }
        if self.kosync_primary_port == self.kosync_sync_port {
            return Err("KOSYNC_PRIMARY_PORT and KOSYNC_SYNC_PORT must differ".into());
        }
        Ok(())
    }

    pub fn db_connection_string(&self) -> String {
        format!("sqlite://{}/db.sqlite?mode=rwc", self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_api_key() {
        let mut cfg = Config::with_layers(&[]).unwrap();
        cfg.abs_api_key.clear();
        cfg.abs_base_url = "http://localhost:8080".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_identical_ports() {
        let mut cfg = Config::with_layers(&[]).unwrap();
        cfg.abs_api_key = "key".into();
        cfg.abs_base_url = "http://localhost:8080".into();
        cfg.kosync_sync_port = cfg.kosync_primary_port;
        assert!(cfg.validate().is_err());
    }
}
