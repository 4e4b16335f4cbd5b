//! `ragent doctor`: Diagnose configuration health.

use ragent_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("ragent doctor: configuration diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ok   Config file found: {}", config_path.display());
    } else {
        println!("  --   No config file, using defaults (run `ragent onboard` to create one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok   Configuration valid");
            config
        }
        Err(e) => {
            println!("  FAIL Configuration invalid: {e}");
            println!("\n  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ok   API key configured for '{}'", config.default_provider);
    } else if matches!(config.default_provider.as_str(), "ollama" | "vllm" | "llamacpp") {
        println!("  ok   Provider '{}' needs no API key", config.default_provider);
    } else {
        println!(
            "  FAIL No API key for '{}' (set GOOGLE_AI_API_KEY or api_key in config.toml)",
            config.default_provider
        );
        issues += 1;
    }

    match ragent_tools::default_registry(&config.tools) {
        Ok(registry) => println!("  ok   Tools: {}", registry.names().join(", ")),
        Err(e) => {
            println!("  FAIL Tools unavailable: {e}");
            issues += 1;
        }
    }

    match ragent_providers::build_retriever(&config.retrieval) {
        Ok(retriever) => println!("  ok   Retrieval backend: {}", retriever.name()),
        Err(e) => {
            println!("  FAIL Retrieval backend: {e}");
            issues += 1;
        }
    }

    match &config.session.snapshot_path {
        Some(path) => println!("  ok   Sessions persisted to {}", path.display()),
        None => println!("  --   Sessions are in-memory only"),
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
