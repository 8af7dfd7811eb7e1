//! Config command handlers

use anyhow::{bail, Context, Result};

use blink_core::Config;

use crate::output::{print_json, Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str = "data_dir, gist_id, github_token, retention_days, debounce_ms, api_base, request_timeout_secs";

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let token = config.github_token.as_deref().map(mask_secret);

    match output.format {
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "data_dir": config.data_dir,
                "gist_id": config.gist_id,
                "github_token": token,
                "retention_days": config.retention_days,
                "debounce_ms": config.debounce_ms,
                "api_base": config.api_base,
                "request_timeout_secs": config.request_timeout_secs
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!(
                "  gist_id:              {}",
                config.gist_id.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  github_token:         {}",
                token.as_deref().unwrap_or("(not set)")
            );
            println!("  retention_days:       {}", config.retention_days);
            println!("  debounce_ms:          {}", config.debounce_ms);
            println!("  api_base:             {}", config.api_base);
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    let shown = if key == "github_token" {
        mask_secret(&value)
    } else {
        value
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "gist_id" => {
            config.gist_id = optional(value);
        }
        "github_token" => {
            config.github_token = optional(value);
        }
        "retention_days" => {
            config.retention_days = value
                .parse()
                .context("Invalid value for retention_days. Use a whole number of days.")?;
        }
        "debounce_ms" => {
            config.debounce_ms = value
                .parse()
                .context("Invalid value for debounce_ms. Use milliseconds.")?;
        }
        "api_base" => {
            config.api_base = value.to_string();
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use seconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Show only the last four characters of a secret
fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "gist_id", "abc").unwrap();
        apply(&mut config, "retention_days", "5").unwrap();
        apply(&mut config, "debounce_ms", "250").unwrap();
        assert_eq!(config.gist_id.as_deref(), Some("abc"));
        assert_eq!(config.retention_days, 5);
        assert_eq!(config.debounce_ms, 250);

        apply(&mut config, "gist_id", "none").unwrap();
        assert!(config.gist_id.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "retention_days", "two").is_err());
        assert!(apply(&mut config, "sync_url", "x").is_err());
        assert_eq!(config.retention_days, 2);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("ghp_abcdef1234"), "****1234");
        assert_eq!(mask_secret("abc"), "****");
    }
}
