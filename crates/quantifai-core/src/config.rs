use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so an empty environment yields a config
/// pointed at a service on `localhost:5000`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("QUANTIFAI_ENV", "development"));

    let service_url = or_default("QUANTIFAI_SERVICE_URL", "http://localhost:5000");
    if !(service_url.starts_with("http://") || service_url.starts_with("https://")) {
        return Err(ConfigError::InvalidEnvVar {
            var: "QUANTIFAI_SERVICE_URL".to_string(),
            reason: format!("expected an http(s) URL, got \"{service_url}\""),
        });
    }

    let log_level = or_default("QUANTIFAI_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("QUANTIFAI_REQUEST_TIMEOUT_SECS", "300")?;
    let connect_timeout_secs = parse_u64("QUANTIFAI_CONNECT_TIMEOUT_SECS", "10")?;
    let user_agent = or_default("QUANTIFAI_USER_AGENT", "quantifai/0.1 (analysis-client)");

    Ok(AppConfig {
        env,
        service_url,
        log_level,
        request_timeout_secs,
        connect_timeout_secs,
        user_agent,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
