use std::sync::Arc;

use clap::Parser;
use knowit_core::{KnowItConfig, Language};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use knowit_server::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "knowit.toml")]
    config: String,

    /// Validate config and knowledge table, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match KnowItConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over service.log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let state = match AppState::from_config(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialise KnowIt: {}", e);
            std::process::exit(1);
        }
    };

    if args.check {
        println!("✅ Config loaded from {}", args.config);
        for lang in Language::ALL {
            println!(
                "✅ {:<24} {} entries, {} fallback replies",
                lang.display_name(),
                state.knowledge.entries(lang).len(),
                state.knowledge.fallback_pool(lang).len()
            );
        }
        println!("✅ KnowIt check passed");
        return Ok(());
    }

    if !config.http.enabled {
        tracing::warn!("HTTP API disabled in config; nothing to serve");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(state);

    if let Some(idle) = config.session_idle() {
        tokio::spawn(knowit_server::subsystems::chat::run_idle_sweep(
            state.sessions.clone(),
            idle,
            tx.subscribe(),
        ));
    }

    knowit_server::http::start_http_server(state.clone(), &config.http, tx.subscribe()).await?;

    // Pending replies must not land after shutdown.
    state.sessions.close_all().await;

    Ok(())
}
