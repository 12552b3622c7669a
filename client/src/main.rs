mod request;

use anyhow::Result;
use clap::Parser;
use gate_shared::Action;
use request::Credentials;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Send one command to a gate device
#[derive(Parser, Debug)]
#[command(name = "gate-client", version)]
struct Cli {
    /// full, pedestrian, right or left
    #[arg(long)]
    action: String,

    /// Device base URL
    #[arg(long, env = "GATE_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Shared HMAC secret
    #[arg(long, env = "GATE_API_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Static API key, used instead of signing when given
    #[arg(long, env = "GATE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let action: Action = cli.action.parse()?;
    let credentials = Credentials::from_options(cli.secret, cli.api_key)?;

    let client = reqwest::Client::new();
    let request =
        request::build_request(&client, &cli.url, action, &credentials, chrono::Utc::now())?;
    let ack = request::send(&client, request).await?;

    info!("{} -> {:?}", ack.action, ack.status);
    Ok(())
}
