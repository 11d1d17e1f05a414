use anyhow::Result;
use axum::Router;
use clap::Parser;
use helpdesk_core::{Capabilities, PipelineConfig, Store};
use server::build_app;
use server::local_ai::local_capabilities;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Store directory path
    #[arg(long, default_value = "./helpdesk-db")]
    db: String,
    /// Host to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Base URL of a local model runtime; without it only script detection is available
    #[arg(long)]
    generator_url: Option<String>,
    /// Model name passed to the runtime
    #[arg(long, default_value = "llama3.2")]
    model: String,
    /// Per-request timeout for the model runtime, in seconds
    #[arg(long, default_value_t = 120)]
    generator_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let caps = match &args.generator_url {
        Some(url) => local_capabilities(url, &args.model, Duration::from_secs(args.generator_timeout_secs))?,
        None => {
            tracing::warn!("no --generator-url given, generation is unavailable");
            Capabilities::offline()
        }
    };
    let store = Store::open(&args.db)?;
    let app: Router = build_app(store, caps, PipelineConfig::default())?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, db = %args.db, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
