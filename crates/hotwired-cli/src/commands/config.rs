use std::path::Path;

use anyhow::Result;

use hotwired_core::AppConfig;

pub fn show(config: &AppConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write defaults to `path`, or the standard location
pub fn init(path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(AppConfig::config_path);
    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default().to_toml()?)?;
    println!("Wrote default configuration to {}", path.display());

    Ok(())
}
