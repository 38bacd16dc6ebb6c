//! `pmassist status`: show the effective configuration.

use pmassist_config::AppConfig;
use pmassist_providers::GeneratorKind;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let generator = match GeneratorKind::for_config(&config.generation) {
        GeneratorKind::Remote => format!("remote ({})", config.generation.base_url),
        GeneratorKind::Offline => "offline (no API key)".to_string(),
    };

    println!("pmassist status");
    println!("===============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Generator:    {generator}");
    println!("  Model:        {}", config.generation.model);
    println!("  Temperature:  {}", config.generation.temperature);
    println!("  Max tokens:   {}", config.generation.max_tokens);
    println!("  Timeout:      {}s", config.generation.timeout_secs);
    println!("  Storage:      {} ({})", config.storage.backend, config.storage.path);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Prompt:       {} projects, {} tasks, {} history sessions",
        config.prompt.max_projects, config.prompt.max_tasks, config.prompt.max_history_sessions
    );

    if AppConfig::config_path().exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults. Run `pmassist init` to create one.");
    }

    Ok(())
}
