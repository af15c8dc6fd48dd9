//! Command line and environment configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ecoearn_core::DeactivationPolicy;
use ecoearn_store_firestore::{DEFAULT_BASE_URL, FirestoreConfig};

/// Where bins, reports and the ledger are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendKind {
    /// Process-local store, optionally seeded from a JSON file.
    Memory,
    /// Cloud Firestore over its REST API.
    Firestore,
}

/// Who may release an active bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum PolicyArg {
    /// Only the user holding the bin.
    OccupantOnly,
    /// Anyone, recorded as a forced release.
    AdminOverride,
}

impl From<PolicyArg> for DeactivationPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::OccupantOnly => DeactivationPolicy::OccupantOnly,
            PolicyArg::AdminOverride => DeactivationPolicy::AdminOverride,
        }
    }
}

/// EcoEarn admin console configuration
#[derive(Debug, Parser)]
#[command(name = "ecoearn", version, about = "EcoEarn recycling admin console", long_about = None)]
pub(crate) struct Config {
    /// Storage backend
    #[arg(long, env = "ECOEARN_BACKEND", value_enum, default_value_t = BackendKind::Memory)]
    pub(crate) backend: BackendKind,

    /// JSON file with initial data for the memory backend
    #[arg(long, env = "ECOEARN_SEED")]
    pub(crate) seed: Option<PathBuf>,

    /// Firestore project id
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub(crate) project_id: Option<String>,

    /// Firestore database id
    #[arg(long, env = "FIRESTORE_DATABASE", default_value = "(default)")]
    pub(crate) database: String,

    /// Firestore web API key
    #[arg(long, env = "FIRESTORE_API_KEY", hide_env_values = true)]
    pub(crate) api_key: Option<String>,

    /// Bearer token for Firestore requests
    #[arg(long, env = "FIRESTORE_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,

    /// Firestore REST root (point at the emulator for local runs)
    #[arg(long, env = "FIRESTORE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub(crate) base_url: String,

    /// HTTP timeout in seconds
    #[arg(long, env = "ECOEARN_HTTP_TIMEOUT", default_value = "15")]
    pub(crate) http_timeout: u64,

    /// User id the scanner activates bins for
    #[arg(short, long, env = "ECOEARN_USER", default_value = "admin")]
    pub(crate) user: String,

    /// Who may release an active bin
    #[arg(long, env = "ECOEARN_DEACTIVATION_POLICY", value_enum, default_value_t = PolicyArg::OccupantOnly)]
    pub(crate) deactivation_policy: PolicyArg,

    /// Command printing one decoded QR payload per line
    #[arg(long, env = "ECOEARN_CAPTURE_COMMAND", default_value = "zbarcam --raw --nodisplay")]
    pub(crate) capture_command: String,

    /// Directory for exported QR payloads and yearly reports
    #[arg(long, env = "ECOEARN_EXPORT_DIR", default_value = "exports")]
    pub(crate) export_dir: PathBuf,

    /// Log filter (trace, debug, info, warn, error or a full directive)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub(crate) log_level: String,

    /// Directory for log files
    #[arg(long, env = "ECOEARN_LOG_DIR", default_value = "logs")]
    pub(crate) log_dir: PathBuf,
}

impl Config {
    /// Load configuration from `.env`, the environment and CLI arguments.
    pub(crate) fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Firestore settings, `None` when no project id is configured.
    pub(crate) fn firestore(&self) -> Option<FirestoreConfig> {
        let project_id = self.project_id.as_deref()?.trim();
        if project_id.is_empty() {
            return None;
        }
        let mut config = FirestoreConfig::new(project_id);
        config.database.clone_from(&self.database);
        config.api_key.clone_from(&self.api_key);
        config.bearer_token.clone_from(&self.token);
        config.base_url.clone_from(&self.base_url);
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_memory_backend_and_occupant_policy() {
        let config = Config::try_parse_from(["ecoearn"]).expect("defaults parse");

        assert_eq!(config.backend, BackendKind::Memory, "memory backend");
        assert_eq!(
            DeactivationPolicy::from(config.deactivation_policy),
            DeactivationPolicy::OccupantOnly,
            "occupant-only release"
        );
        assert!(config.firestore().is_none(), "no project configured");
    }

    #[test]
    fn firestore_settings_come_from_flags() {
        let config = Config::try_parse_from([
            "ecoearn",
            "--backend",
            "firestore",
            "--project-id",
            "ecoearn-prod",
            "--api-key",
            "k",
            "--deactivation-policy",
            "admin-override",
        ])
        .expect("flags parse");

        let firestore = config.firestore().expect("project configured");
        assert_eq!(firestore.project_id, "ecoearn-prod", "project");
        assert_eq!(firestore.api_key.as_deref(), Some("k"), "api key");
        assert_eq!(firestore.base_url, DEFAULT_BASE_URL, "public endpoint");
        assert_eq!(
            DeactivationPolicy::from(config.deactivation_policy),
            DeactivationPolicy::AdminOverride,
            "override policy"
        );
    }
}
