use anyhow::Result;
use axum::Router;
use clap::Parser;
use revdex_server::{build_app, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, env = "REVDEX_INDEX", default_value = "./index")]
    index: PathBuf,
    /// Positive opinion lexicon, one word per line
    #[arg(long, env = "REVDEX_POSITIVE_LEXICON")]
    positive_lexicon: Option<PathBuf>,
    /// Negative opinion lexicon, one word per line
    #[arg(long, env = "REVDEX_NEGATIVE_LEXICON")]
    negative_lexicon: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        index_dir: args.index,
        positive_lexicon: args.positive_lexicon,
        negative_lexicon: args.negative_lexicon,
    };
    let app: Router = build_app(&config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
