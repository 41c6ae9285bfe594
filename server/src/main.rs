use anyhow::Result;
use clap::Parser;
use server::build_app;
use spimi_core::SearchConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Stop-words file used for queries
    #[arg(long)]
    stopwords: Option<PathBuf>,
    /// Hits returned when a request does not pass `k`
    #[arg(long, default_value_t = 10)]
    top_k: usize,
    /// Memory budget in MB shared by the segment caches
    #[arg(long, default_value_t = 256.0)]
    memory_mb: f64,
    #[arg(long, default_value_t = 0.6)]
    index_cache_fraction: f64,
    #[arg(long, default_value_t = 0.2)]
    registry_cache_fraction: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = SearchConfig {
        index: args.index,
        stopwords: args.stopwords,
        top_k: args.top_k,
        memory_budget_mb: args.memory_mb,
        index_cache_fraction: args.index_cache_fraction,
        registry_cache_fraction: args.registry_cache_fraction,
    };
    let app = build_app(&config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
