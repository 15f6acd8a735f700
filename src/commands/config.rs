use anyhow::Result;
use caltrack_core::SyncConfig;
use owo_colors::OwoColorize;

use super::mapping_file;

pub fn run(config: &SyncConfig) -> Result<()> {
    let config_path = SyncConfig::config_path()?;
    let mapping = mapping_file(config)?;

    println!("{}", "Paths".bold());
    println!("  Config:   {}", config_path.display());
    println!("  Mapping:  {}", mapping.path().display());
    println!();
    println!("{}", "Effective configuration".bold());
    print!("{}", config.to_toml()?);

    Ok(())
}
