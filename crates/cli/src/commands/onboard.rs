//! `nimbus onboard` — First-time setup.

use nimbus_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🌩️  Nimbus — First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config = AppConfig::load()?;
    let workspace_dir = config.workspace_dir();
    if !workspace_dir.exists() {
        std::fs::create_dir_all(&workspace_dir)?;
        println!("✅ Created workspace directory: {}", workspace_dir.display());
    }
    let memory_dir = config.memory_dir();
    if !memory_dir.exists() {
        std::fs::create_dir_all(&memory_dir)?;
        println!("✅ Created memory directory: {}", memory_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    if config.has_api_key() {
        println!("\n🎉 API key found. Run `nimbus chat` to start chatting.\n");
    } else {
        println!("\n📝 Next steps:");
        println!("   1. Set an API key:");
        println!("        export OPENROUTER_API_KEY=sk-or-v1-...");
        println!("      (or NIMBUS_API_KEY / OPENAI_API_KEY, or api_key in config.toml)");
        println!("   2. Run: nimbus chat\n");
    }

    Ok(())
}
