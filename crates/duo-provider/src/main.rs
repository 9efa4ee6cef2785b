//! Duo provider plugin - Entry point.
//!
//! Reads one JSON request per line on stdin and writes one JSON response per
//! line on stdout. Logs go to stderr.

use anyhow::Context;
use duo_provider::config::DuoEnv;
use duo_provider::protocol::Session;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = DuoEnv::load().context("Failed to load configuration")?;

    init_logging(env.log_level.as_deref().unwrap_or("info"));

    info!("Starting Duo provider v{}", env!("CARGO_PKG_VERSION"));

    let mut session = Session::new(env);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = session.handle_line(&line).await;
        let mut encoded = serde_json::to_vec(&response).context("Failed to encode response")?;
        encoded.push(b'\n');

        stdout
            .write_all(&encoded)
            .await
            .context("Failed to write response")?;
        stdout.flush().await.context("Failed to flush response")?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
