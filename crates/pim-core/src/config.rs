use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
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
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(
                var,
                "expected one of true/false/1/0/yes/no".to_string(),
            )
        })
    };

    let shopify_base_url = require("SHOPIFY_BASE_URL")?
        .trim_end_matches('/')
        .to_string();
    if !shopify_base_url.starts_with("http://") && !shopify_base_url.starts_with("https://") {
        return Err(invalid(
            "SHOPIFY_BASE_URL",
            "must start with http:// or https://".to_string(),
        ));
    }
    let shopify_access_token = require("SHOPIFY_ACCESS_TOKEN")?;

    let workspace_dir = PathBuf::from(or_default("PIM_WORKSPACE_DIR", "workspace"));
    let log_level = or_default("PIM_LOG_LEVEL", "info");

    let request_timeout_secs = parse_u64("PIM_REQUEST_TIMEOUT_SECS", "30")?;
    let connect_timeout_secs = parse_u64("PIM_CONNECT_TIMEOUT_SECS", "10")?;
    let user_agent = or_default("PIM_USER_AGENT", "pim/0.1 (catalog-sync)");
    let max_concurrent_products = parse_usize("PIM_MAX_CONCURRENT_PRODUCTS", "1")?;

    let rate_limit_burst = parse_u32("PIM_RATE_LIMIT_BURST", "40")?;
    if rate_limit_burst == 0 {
        return Err(invalid("PIM_RATE_LIMIT_BURST", "must be at least 1".to_string()));
    }
    let rate_limit_per_sec = or_default("PIM_RATE_LIMIT_PER_SEC", "2")
        .parse::<f64>()
        .map_err(|e| invalid("PIM_RATE_LIMIT_PER_SEC", e.to_string()))?;
    if !rate_limit_per_sec.is_finite() || rate_limit_per_sec <= 0.0 {
        return Err(invalid(
            "PIM_RATE_LIMIT_PER_SEC",
            "must be a positive number".to_string(),
        ));
    }

    let vendor = or_default("PIM_VENDOR", "Dollareh");
    let product_tags = or_default("PIM_PRODUCT_TAGS", "auto-imported");
    let associate_category_collections =
        parse_bool("PIM_ASSOCIATE_CATEGORY_COLLECTIONS", "false")?;

    Ok(AppConfig {
        shopify_base_url,
        shopify_access_token,
        workspace_dir,
        log_level,
        request_timeout_secs,
        connect_timeout_secs,
        user_agent,
        max_concurrent_products,
        rate_limit_burst,
        rate_limit_per_sec,
        vendor,
        product_tags,
        associate_category_collections,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
