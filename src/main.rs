use clap::Parser;
use greenward::utils::error::{ErrorSeverity, GreenwardError};
use greenward::utils::{logger, validation::Validate};
use greenward::{AppState, CliConfig};
use std::sync::Arc;

async fn run(cli: &CliConfig) -> greenward::Result<()> {
    let config = cli.load()?;
    config.validate()?;
    tracing::debug!(
        host = %config.server.host,
        port = config.server.port,
        data_dir = %config.server.data_dir,
        gemini_model = %config.gemini.model,
        perplexity_model = %config.perplexity.model,
        maps_enabled = config.maps.api_key().is_some(),
        "Configuration loaded"
    );
    if config.maps.api_key().is_none() {
        tracing::warn!("GOOGLE_MAPS_API_KEY is not set; analyses without an upload will skip the satellite preview");
    }

    tokio::fs::create_dir_all(config.server.image_dir()).await?;

    let state = AppState::from_config(config)?;
    greenward::serve(Arc::new(state)).await
}

fn exit_code(e: &GreenwardError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting greenward");

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "greenward stopped: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let code = exit_code(&e);
        if code > 0 {
            std::process::exit(code);
        }
    }
}
