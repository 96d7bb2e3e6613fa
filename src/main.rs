#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info};

use atlas_gateway::auth::KeyRegistry;
use atlas_gateway::guardrail::Guardrail;
use atlas_gateway::llm::groq::{GroqClient, GroqConfig};
use atlas_gateway::pipeline::RequestPipeline;
use atlas_gateway::schedule::ResetScheduler;
use atlas_gateway::storage::{CsvUsageLog, UsageStore};
use atlas_gateway::{
    init_env, utils::logger, AppContext, GUARDRAIL_TERMS_PATH, KEYS_PATH, LOG_DIR, PORT,
    USAGE_LOG_PATH,
};

#[derive(Parser, Debug)]
#[command(name = "atlas-gateway", about = "Atlas Auto Repairs front-desk gateway")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on (defaults to $PORT or 3000)
    #[arg(long)]
    port: Option<u16>,

    /// CSV usage log path
    #[arg(long)]
    usage_log: Option<String>,

    /// JSON file of API keys; the demo keys are used when omitted
    #[arg(long)]
    keys: Option<String>,

    /// File of guardrail terms, one per line
    #[arg(long)]
    guardrail_terms: Option<String>,

    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    init_env();
    let args = Args::parse();

    // Initialize logging system
    let _guard = logger::init(args.log_dir.clone().unwrap_or_else(|| LOG_DIR.to_string()))?;

    info!("Starting Atlas gateway...");

    // Missing credentials are fatal before we accept any connection
    let groq_config = GroqConfig::from_env()?;
    let model = GroqClient::new(groq_config)?;
    info!("Using Groq model {}", model.model());

    info!("Initializing key registry...");
    let registry = match args.keys.as_deref().or(KEYS_PATH.as_deref()) {
        Some(path) => KeyRegistry::from_json_file(path)?,
        None => KeyRegistry::demo(),
    };
    anyhow::ensure!(!registry.is_empty(), "No API keys configured");
    for key in registry.snapshot() {
        info!("Loaded {} key (limit {:?})", key.tier, key.limit);
    }
    let registry = Arc::new(registry);

    let guardrail = match args.guardrail_terms.as_deref().or(GUARDRAIL_TERMS_PATH.as_deref()) {
        Some(path) => Guardrail::from_file(path)?,
        None => Guardrail::default(),
    };
    info!("Guardrail loaded with {} terms", guardrail.terms().len());

    let usage_path = args.usage_log.clone().unwrap_or_else(|| USAGE_LOG_PATH.to_string());
    let usage: Arc<dyn UsageStore> = Arc::new(
        CsvUsageLog::open(&usage_path)
            .await
            .context("Failed to initialize usage log")?,
    );

    let pipeline = RequestPipeline::new(
        Arc::clone(&registry),
        Arc::new(guardrail),
        Arc::new(model),
        Arc::clone(&usage),
    );

    let ctx = Arc::new(AppContext {
        pipeline: Arc::new(pipeline),
        usage: Arc::clone(&usage),
    });

    let scheduler = ResetScheduler::daily(Arc::clone(&registry));
    scheduler.start().await;

    // Start HTTP server
    let addr = SocketAddr::new(args.host, args.port.unwrap_or(*PORT));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    };
    match atlas_gateway::web::start_server(ctx, addr, shutdown).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    // Graceful shutdown
    info!("Shutting down...");
    scheduler.stop().await;
    usage.flush().await;
    Ok(())
}
