use clap::Parser;
use fusion_server::replicate::{ReplicateConfig, ReplicateNamer, DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Serve the Topic Fusion game and its naming proxy.
#[derive(Debug, Parser)]
#[command(name = "fusion-server", version)]
struct Args {
    #[arg(long, env = "FUSION_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(long, env = "FUSION_PORT", default_value_t = 39334)]
    port: u16,

    /// Replicate model used to invent names.
    #[arg(long, env = "REPLICATE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "REPLICATE_API_URL", default_value = DEFAULT_BASE_URL)]
    replicate_url: String,

    #[arg(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    replicate_token: Option<String>,

    /// Re-fetches allowed for a prediction that is still running.
    #[arg(long, default_value_t = 60)]
    poll_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.replicate_token.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN is not set; combinations will use fallback names");
    }

    let namer = ReplicateNamer::new(ReplicateConfig {
        token: args.replicate_token,
        model: args.model,
        base_url: args.replicate_url,
        poll_attempts: args.poll_attempts,
        ..ReplicateConfig::default()
    })?;

    let addr = SocketAddr::new(args.host, args.port);
    fusion_server::serve(addr, Arc::new(namer)).await
}
