//! `nimbus chat` — Interactive or single-message chat mode.

use nimbus_agent::{
    delegation_tools, AgentService, CompletionHandler, ContextAssembler, DelegationConfig,
    RegistryCell, SubagentTracker,
};
use nimbus_config::AppConfig;
use nimbus_core::event::EventBus;
use nimbus_core::message::ConversationId;
use nimbus_core::provider::Provider;
use nimbus_core::tool::ToolRegistry;
use nimbus_memory::{FactStore, GoalStore};
use nimbus_providers::OpenAiCompatProvider;
use nimbus_telemetry::UsageLedger;
use nimbus_tools::{
    register_workspace_tools, HttpRequestTool, LearnFactTool, RecallFactsTool, SetGoalTool,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const INSTRUCTIONS: &str = "Be concise and direct. Use your tools proactively when they help \
    accomplish the task: run commands, read and write files, make HTTP requests, and remember \
    important facts. Delegate self-contained work to subagents. Ask for clarification only when \
    the request is genuinely ambiguous.";

/// Build the configured provider.
pub fn build_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let provider = match config.provider.as_str() {
        "openai" => match config.base_url.as_deref() {
            Some(url) => OpenAiCompatProvider::new("openai", url, api_key),
            None => OpenAiCompatProvider::openai(api_key),
        },
        "ollama" => OpenAiCompatProvider::ollama(config.base_url.as_deref()),
        _ => match config.base_url.as_deref() {
            Some(url) => OpenAiCompatProvider::new("openrouter", url, api_key),
            None => OpenAiCompatProvider::openrouter(api_key),
        },
    };
    Arc::new(provider)
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
        eprintln!("    NIMBUS_API_KEY=sk-...             (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = build_provider(&config);
    let event_bus = Arc::new(EventBus::default());
    let tracker = Arc::new(SubagentTracker::new());

    let workspace_root = config.workspace_dir();
    std::fs::create_dir_all(&workspace_root)?;

    let ledger = Arc::new(UsageLedger::new(Some(
        AppConfig::config_dir().join("usage.json"),
    )));

    // Context sources feed the system prompt; memory tools write the stores.
    let mut assembler =
        ContextAssembler::new("Nimbus", INSTRUCTIONS, config.agent.context_budget_chars);
    let stores = if config.memory.enabled {
        let memory_dir = config.memory_dir();
        std::fs::create_dir_all(&memory_dir)?;
        let facts = Arc::new(FactStore::new(memory_dir.join("facts.jsonl")));
        let goals = Arc::new(GoalStore::new(memory_dir.join("goals.jsonl")));
        assembler.add_source(facts.clone());
        assembler.add_source(goals.clone());
        Some((facts, goals))
    } else {
        None
    };
    assembler.add_source(ledger.clone());

    let registry_cell = RegistryCell::new(ToolRegistry::new());
    let service = Arc::new(
        AgentService::new(
            provider.clone(),
            &config.default_model,
            config.default_temperature,
            registry_cell.clone(),
            assembler,
            event_bus.clone(),
            config.agent.clone(),
        )
        .with_max_tokens(config.default_max_tokens)
        .with_ledger(ledger.clone()),
    );

    // Background results are printed and injected into the session.
    let notify_service = service.clone();
    let on_complete: CompletionHandler = Arc::new(move |conversation_id, text| {
        println!("\n  📣 {text}\n");
        let service = notify_service.clone();
        tokio::spawn(async move {
            service.notify(&conversation_id, &text).await;
        });
    });

    let mut registry = ToolRegistry::new();
    register_workspace_tools(&mut registry, &workspace_root);
    registry.register(Arc::new(HttpRequestTool::new()));
    if let Some((facts, goals)) = &stores {
        registry.register(Arc::new(LearnFactTool::new(facts.clone())));
        registry.register(Arc::new(RecallFactsTool::new(facts.clone())));
        registry.register(Arc::new(SetGoalTool::new(goals.clone())));
    }
    for tool in delegation_tools(DelegationConfig {
        provider,
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        max_tokens: Some(config.default_max_tokens),
        registry: registry_cell.clone(),
        workspace_root,
        max_iterations: config.agent.subagent_max_iterations,
        event_bus,
        tracker: tracker.clone(),
        on_complete,
    }) {
        registry.register(tool);
    }
    registry_cell.install(registry);

    let conversation_id = ConversationId::new();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = service.process_message(&conversation_id, &msg).await?;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    println!();
    println!("  Nimbus — Interactive Mode");
    println!("  Provider: {}  Model: {}", config.provider, config.default_model);
    println!("  Commands: /status /usage /model [name] /refresh /quit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt()?;
            continue;
        }

        match input {
            "/quit" | "/exit" | "exit" => break,
            "/status" => {
                let tasks = tracker.list(Some(&conversation_id));
                if tasks.is_empty() {
                    println!("  No delegated tasks.");
                }
                for t in tasks {
                    println!(
                        "  {} [{}] {} — started {}",
                        t.task_id,
                        t.status,
                        t.label,
                        t.started_at.format("%H:%M:%S"),
                    );
                }
            }
            "/usage" => println!("{}", ledger.report()),
            "/refresh" => {
                service.force_refresh_session(&conversation_id).await;
                println!("  System prompt refreshed.");
            }
            _ if input.starts_with("/model") => {
                let name = input.trim_start_matches("/model").trim();
                if name.is_empty() {
                    println!("  Model: {}", service.get_model(&conversation_id).await);
                } else {
                    service.set_model(&conversation_id, name).await;
                    println!("  Model set to {name} for this conversation.");
                }
            }
            _ => {
                eprint!("  ...");
                match service.process_message(&conversation_id, input).await {
                    Ok(response) => {
                        eprint!("\r      \r");
                        println!("{response}\n");
                    }
                    Err(e) => {
                        eprint!("\r      \r");
                        eprintln!("  Error: {e}\n");
                    }
                }
            }
        }
        prompt()?;
    }

    println!("  Bye!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
