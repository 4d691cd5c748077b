//! Environment overrides loaded from `.env` or the process environment.
//!
//! Deployment-specific values (listen address, admin phones, CORS origins) live in
//! the environment so the same config.toml can be shared between machines.

use super::event::Config;
use tracing::info;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Address the HTTP server binds to, from `BIND_ADDRESS`.
#[must_use]
pub fn get_bind_address() -> String {
    std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
}

/// Parses a comma separated list, skipping blanks.
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Replaces the configured admin phones and CORS origins with
/// `ADMIN_PHONES` and `CORS_ORIGINS` when they are set.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(raw) = std::env::var("ADMIN_PHONES") {
        let phones = parse_list(&raw);
        info!("ADMIN_PHONES set, using {} admin phone(s)", phones.len());
        config.auth.admin_phones = phones;
    }
    if let Ok(raw) = std::env::var("CORS_ORIGINS") {
        let origins = parse_list(&raw);
        info!("CORS_ORIGINS set, allowing {} origin(s)", origins.len());
        config.http.cors_origins = origins;
    }
}
