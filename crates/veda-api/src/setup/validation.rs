//! Startup checks that go beyond parsing.
//!
//! `Config::validate` rejects values that cannot work at all; this module
//! rejects values that work but are unsafe for the current environment.

use anyhow::Result;
use veda_core::Config;

const PLACEHOLDER_SECRETS: [&str; 2] = ["change-me", "changeme"];

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() {
        if config.cors_origins().iter().any(|origin| origin == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS may not contain '*' in production; list the allowed origins"
            ));
        }

        if config.debug() {
            return Err(anyhow::anyhow!("DEBUG must be disabled in production"));
        }

        for (name, value) in [
            ("SECRET_KEY", config.secret_key()),
            ("SESSION_SECRET", config.session_secret()),
        ] {
            let lowered = value.to_lowercase();
            if PLACEHOLDER_SECRETS.iter().any(|p| lowered.contains(p)) {
                return Err(anyhow::anyhow!("{} still holds a placeholder value", name));
            }
        }

        if config.secret_key() == config.session_secret() {
            tracing::warn!("SECRET_KEY and SESSION_SECRET are identical");
        }
    }

    if config.trusted_proxy_count() > 10 {
        tracing::warn!(
            trusted_proxy_count = config.trusted_proxy_count(),
            "TRUSTED_PROXY_COUNT is very high - ensure this matches your actual proxy setup"
        );
    }

    if config.smtp_host().is_none() {
        tracing::warn!("SMTP_HOST not set; verification and password reset emails will not be sent");
    }

    if config.redis_url().is_some() {
        tracing::info!("REDIS_URL is set but not used; rate limits are kept in memory");
    }

    Ok(())
}
