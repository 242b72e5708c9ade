//! `nimbus usage` — Show lifetime usage statistics.

use nimbus_config::AppConfig;
use nimbus_telemetry::UsageLedger;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_dir().join("usage.json");
    if !path.exists() {
        println!("No usage recorded yet. Run `nimbus chat` first.");
        return Ok(());
    }

    let ledger = UsageLedger::new(Some(path));
    println!("📊 Usage");
    println!("────────────────────────────");
    println!("{}", ledger.report());
    Ok(())
}
