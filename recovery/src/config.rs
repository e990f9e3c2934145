//! Recovery core configuration with TOML file support.

use crate::RecoveryError;
use keyward_types::RequestType;
use keyward_utils::LogFormat;
use serde::{Deserialize, Serialize};

/// What a guardian's rejection does to a pending request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Rejections are recorded but never terminate the request.
    #[default]
    Informational,
    /// A rejection from a guardian holding the `guardian` role terminates it.
    GuardianRoleVeto,
    /// Any authorized guardian's rejection terminates it.
    AnyGuardianVeto,
}

/// Settings for the recovery core.
///
/// Can be loaded from a TOML file via [`RecoveryConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Fraction of active guardians that must approve, in `(0, 1]`.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    /// Requests an account may create per UTC calendar day.
    #[serde(default = "default_max_daily_attempts")]
    pub max_daily_attempts: u32,

    /// Lifetime of key-recovery and account-restoration requests.
    #[serde(default = "default_request_ttl_secs")]
    pub request_ttl_secs: u64,

    /// Lifetime of emergency-liquidity requests.
    #[serde(default = "default_emergency_ttl_secs")]
    pub emergency_ttl_secs: u64,

    /// Oldest acceptable `issued_at` on a guardian decision.
    #[serde(default = "default_max_signature_age_secs")]
    pub max_signature_age_secs: u64,

    /// How far in the future `issued_at` may be.
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Extra delivery attempts per guardian after a failed notification.
    #[serde(default = "default_notification_retries")]
    pub notification_retries: u32,

    #[serde(default = "default_notification_backoff_ms")]
    pub notification_backoff_ms: u64,

    #[serde(default)]
    pub rejection_policy: RejectionPolicy,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_consensus_threshold() -> f64 {
    0.75
}

fn default_max_daily_attempts() -> u32 {
    5
}

fn default_request_ttl_secs() -> u64 {
    72 * 3600
}

fn default_emergency_ttl_secs() -> u64 {
    24 * 3600
}

fn default_max_signature_age_secs() -> u64 {
    900
}

fn default_max_clock_skew_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_notification_retries() -> u32 {
    2
}

fn default_notification_backoff_ms() -> u64 {
    250
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl RecoveryConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, RecoveryError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RecoveryError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, RecoveryError> {
        let config: Self = toml::from_str(s).map_err(|e| RecoveryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, RecoveryError> {
        toml::to_string_pretty(self).map_err(|e| RecoveryError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), RecoveryError> {
        if !(self.consensus_threshold > 0.0 && self.consensus_threshold <= 1.0) {
            return Err(RecoveryError::Config(format!(
                "consensus_threshold {} outside (0, 1]",
                self.consensus_threshold
            )));
        }
        if self.max_daily_attempts == 0 {
            return Err(RecoveryError::Config("max_daily_attempts must be positive".into()));
        }
        if self.request_ttl_secs == 0 || self.emergency_ttl_secs == 0 {
            return Err(RecoveryError::Config("request TTLs must be positive".into()));
        }
        if self.max_signature_age_secs == 0 {
            return Err(RecoveryError::Config("max_signature_age_secs must be positive".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(RecoveryError::Config("sweep_interval_secs must be positive".into()));
        }
        Ok(())
    }

    /// How long a new request of `request_type` stays open.
    pub fn ttl_for(&self, request_type: RequestType) -> u64 {
        match request_type {
            RequestType::EmergencyLiquidity => self.emergency_ttl_secs,
            RequestType::KeyRecovery | RequestType::AccountRestoration => self.request_ttl_secs,
        }
    }

    /// Install the global subscriber described by `log_format` and `log_level`.
    pub fn init_logging(&self) -> Result<(), RecoveryError> {
        keyward_utils::init_logging(self.log_format, &self.log_level)
            .map_err(|e| RecoveryError::Config(e.to_string()))
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: default_consensus_threshold(),
            max_daily_attempts: default_max_daily_attempts(),
            request_ttl_secs: default_request_ttl_secs(),
            emergency_ttl_secs: default_emergency_ttl_secs(),
            max_signature_age_secs: default_max_signature_age_secs(),
            max_clock_skew_secs: default_max_clock_skew_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            notification_retries: default_notification_retries(),
            notification_backoff_ms: default_notification_backoff_ms(),
            rejection_policy: RejectionPolicy::default(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = RecoveryConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = RecoveryConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = RecoveryConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.consensus_threshold, 0.75);
        assert_eq!(config.max_daily_attempts, 5);
        assert_eq!(config.request_ttl_secs, 259_200);
        assert_eq!(config.rejection_policy, RejectionPolicy::Informational);
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let config = RecoveryConfig::from_toml_str(
            r#"
            consensus_threshold = 0.5
            rejection_policy = "guardian_role_veto"
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.consensus_threshold, 0.5);
        assert_eq!(config.rejection_policy, RejectionPolicy::GuardianRoleVeto);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.max_daily_attempts, 5);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for bad in [
            "consensus_threshold = 0.0",
            "consensus_threshold = 1.5",
            "max_daily_attempts = 0",
            "request_ttl_secs = 0",
        ] {
            assert!(
                matches!(RecoveryConfig::from_toml_str(bad), Err(RecoveryError::Config(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn emergency_requests_use_the_short_ttl() {
        let config = RecoveryConfig::default();
        assert_eq!(config.ttl_for(RequestType::EmergencyLiquidity), 86_400);
        assert_eq!(config.ttl_for(RequestType::KeyRecovery), 259_200);
    }
}
