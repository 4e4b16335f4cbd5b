//! `ragent serve`: Start the HTTP service.

use ragent_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("ragent gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Model:     {} ({})",
        config.default_model, config.default_provider
    );
    println!("   Retrieval: {}", config.retrieval.backend);

    ragent_gateway::start(config).await?;

    Ok(())
}
