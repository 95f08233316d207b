//! Environment-provided configuration for the checkout core.
//!
//! # Contract
//! - Every secret-bearing field is read from the environment exactly once,
//!   at `AppConfig::from_env()`, and passed down from there. Don't scatter
//!   `std::env::var` calls through the rest of the workspace.
//! - `Debug` redacts secret values; error messages name the env var, never
//!   its value.

use anyhow::{bail, Context, Result};
use std::time::Duration;

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn require_env(var_name: &str) -> Result<String> {
    resolve_env(var_name).with_context(|| format!("missing required env var {var_name}"))
}

fn parse_env_u64(var_name: &str, default: u64) -> Result<u64> {
    match resolve_env(var_name) {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .with_context(|| format!("env var {var_name} must be a positive integer, got {v:?}")),
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub pms_base_url: String,
    pub pms_api_key: String,
    pub psp_base_url: String,
    pub psp_secret_key: String,
    pub psp_webhook_secret: String,
    pub database_url: String,

    pub hold_ttl: Duration,
    pub quote_ttl: Duration,
    pub idempotency_ttl: Duration,
    pub webhook_dedup_ttl: Duration,

    pub job_auth_token: String,
    pub cors_allowed_origins: Vec<String>,
    pub log_level: String,
    pub bind_addr: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("pms_base_url", &self.pms_base_url)
            .field("pms_api_key", &"<REDACTED>")
            .field("psp_base_url", &self.psp_base_url)
            .field("psp_secret_key", &"<REDACTED>")
            .field("psp_webhook_secret", &"<REDACTED>")
            .field("database_url", &"<REDACTED>")
            .field("hold_ttl", &self.hold_ttl)
            .field("quote_ttl", &self.quote_ttl)
            .field("idempotency_ttl", &self.idempotency_ttl)
            .field("webhook_dedup_ttl", &self.webhook_dedup_ttl)
            .field("job_auth_token", &"<REDACTED>")
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("log_level", &self.log_level)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

pub const ENV_DATABASE_URL: &str = "CHECKOUT_DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "CHECKOUT_DAEMON_ADDR";

impl AppConfig {
    /// Resolve every setting from the environment once. Called at startup
    /// only; everything downstream receives an already-built `AppConfig`.
    pub fn from_env() -> Result<Self> {
        let hold_ttl_minutes = parse_env_u64("HOLD_TTL_MINUTES", 15)?;
        let quote_ttl_minutes = parse_env_u64("QUOTE_TTL_MINUTES", 30)?;
        let idempotency_ttl_hours = parse_env_u64("IDEMPOTENCY_TTL_HOURS", 24)?;
        let webhook_dedup_ttl_days = parse_env_u64("WEBHOOK_DEDUP_TTL_DAYS", 7)?;

        let cors_allowed_origins = resolve_env("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let cfg = AppConfig {
            pms_base_url: require_env("PMS_BASE_URL")?,
            pms_api_key: require_env("PMS_API_KEY")?,
            psp_base_url: require_env("PSP_BASE_URL")?,
            psp_secret_key: require_env("PSP_SECRET_KEY")?,
            psp_webhook_secret: require_env("PSP_WEBHOOK_SECRET")?,
            database_url: require_env(ENV_DATABASE_URL)?,

            hold_ttl: Duration::from_secs(hold_ttl_minutes * 60),
            quote_ttl: Duration::from_secs(quote_ttl_minutes * 60),
            idempotency_ttl: Duration::from_secs(idempotency_ttl_hours * 3600),
            webhook_dedup_ttl: Duration::from_secs(webhook_dedup_ttl_days * 86400),

            job_auth_token: require_env("JOB_AUTH_TOKEN")?,
            cors_allowed_origins,
            log_level: resolve_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            bind_addr: resolve_env(ENV_BIND_ADDR).unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        if cfg.hold_ttl.is_zero() || cfg.quote_ttl.is_zero() {
            bail!("HOLD_TTL_MINUTES and QUOTE_TTL_MINUTES must be positive");
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_u64_falls_back_to_default_when_absent() {
        // SAFETY: test-local env var, not read anywhere else concurrently in this crate's tests.
        std::env::remove_var("CHECKOUT_CONFIG_TEST_MISSING");
        assert_eq!(
            parse_env_u64("CHECKOUT_CONFIG_TEST_MISSING", 42).unwrap(),
            42
        );
    }

    #[test]
    fn parse_env_u64_rejects_non_numeric() {
        std::env::set_var("CHECKOUT_CONFIG_TEST_BAD", "not-a-number");
        assert!(parse_env_u64("CHECKOUT_CONFIG_TEST_BAD", 1).is_err());
        std::env::remove_var("CHECKOUT_CONFIG_TEST_BAD");
    }
}
