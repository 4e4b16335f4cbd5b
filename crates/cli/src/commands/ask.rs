//! `ragent ask`: Run one agent turn from the terminal.

use std::sync::Arc;

use ragent_agent::AgentLoop;
use ragent_config::AppConfig;
use ragent_core::GatewayError;

pub async fn run(message: String, session: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let gateway = match ragent_providers::build_from_config(&config) {
        Ok(gateway) => gateway,
        Err(GatewayError::NotConfigured(reason)) => {
            eprintln!();
            eprintln!("  ERROR: {reason}");
            eprintln!();
            eprintln!("  Set one of these environment variables:");
            eprintln!("    GOOGLE_AI_API_KEY   (for Gemini, the default provider)");
            eprintln!("    OPENAI_API_KEY      (for OpenAI-compatible providers)");
            eprintln!("    RAGENT_API_KEY      (generic)");
            eprintln!();
            eprintln!("  Or add it to your config file:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err("No API key found. See above for setup instructions.".into());
        }
        Err(e) => return Err(e.into()),
    };
    let tools = Arc::new(ragent_tools::default_registry(&config.tools)?);
    let retriever = ragent_providers::build_retriever(&config.retrieval)?;
    let sessions = Arc::new(ragent_gateway::restore_sessions(&config.session));

    let agent = AgentLoop::from_config(gateway, tools, sessions.clone(), &config.agent)
        .with_retriever(retriever)
        .with_top_k(config.retrieval.top_k);

    let result = agent.process(&session, &message).await;

    if let Some(path) = &config.session.snapshot_path {
        ragent_gateway::export_sessions(&sessions, path);
    }

    let outcome = result?;
    println!("{}", outcome.content);
    Ok(())
}
