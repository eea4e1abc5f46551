//! `civicbot config`: configuration management commands.

use civicbot_config::AppConfig;
use std::path::Path;

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    if write_default(&config_path, force).await? {
        println!("✅ Wrote default configuration to {}", config_path.display());
    } else {
        println!("   {} already exists (use --force to overwrite)", config_path.display());
    }
    Ok(())
}

/// Write the default config to `path`. Returns `false` if a file exists and
/// `force` is not set.
async fn write_default(path: &Path, force: bool) -> Result<bool, Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, AppConfig::default_toml()).await?;
    Ok(true)
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some("***".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
