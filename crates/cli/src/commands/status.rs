//! `nimbus status` — Show configuration and provider health.

use nimbus_config::AppConfig;
use nimbus_core::provider::Provider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("🌩️  Nimbus Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Workspace:    {}", config.workspace_dir().display());
    println!("  Provider:     {}", config.provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!(
        "  Memory:       {}",
        if config.memory.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Limits:       {} iterations, {}s turn timeout",
        config.agent.max_iterations, config.agent.turn_timeout_secs
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `nimbus onboard` first");
    }

    if !config.has_api_key() {
        println!("  ⚠️  No API key configured");
        return Ok(());
    }

    let provider = super::chat::build_provider(&config);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Provider reachable ({})", provider.name()),
        Ok(false) | Err(_) => println!("  ⚠️  Provider unreachable ({})", provider.name()),
    }

    Ok(())
}
