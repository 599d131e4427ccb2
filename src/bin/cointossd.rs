use std::env;
use std::sync::Arc;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cointoss::error::logging;
use cointoss::{CdkTokenDecoder, CoinTossConfig, GameRegistry, RelayTransport};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env().map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let mut config = match env::var("COINTOSS_CONFIG") {
        Ok(path) => CoinTossConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        Err(_) => CoinTossConfig::default(),
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    // The operator identity is mandatory: no session starts without it
    let operator = config.require_operator().context("operator credentials")?;
    info!(operator = %operator.public_key(), "Operator identity loaded");

    let transport = RelayTransport::connect(&config.network)
        .await
        .context("connecting to relays")?;
    let registry = GameRegistry::new(
        config,
        Arc::new(transport.clone()),
        Arc::new(CdkTokenDecoder),
    )?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal.cancel();
    });

    let outcome = registry.run(shutdown).await;
    transport.disconnect().await;

    if let Err(e) = &outcome {
        error!(error = %e, "Create command listener failed");
    }
    outcome.map_err(Into::into)
}
