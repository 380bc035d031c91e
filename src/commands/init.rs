use std::path::Path;

use anyhow::Result;
use epacta_core::config::EpactaConfig;
use owo_colors::OwoColorize;

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!(
            "{} {}",
            "Config already exists at".dimmed(),
            config_path.display()
        );
        return Ok(());
    }

    EpactaConfig::create_default_config(config_path)?;
    println!("{} {}", "Created".green(), config_path.display());
    Ok(())
}
