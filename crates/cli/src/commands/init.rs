//! `pmassist init`: write a starter config.

use pmassist_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run `pmassist init`.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set generation.api_key (or PMASSIST_API_KEY) to use a real model");
    println!("  2. Load some data: pmassist seed fixtures.json");
    println!("  3. Ask: pmassist ask --tenant <id> --user <id> \"What's at risk?\"");

    Ok(())
}
