//! Mandate expiry sweeper
//!
//! Periodically asks the running service to expire mandate requests whose
//! signing window has closed. `--once` runs a single sweep and exits;
//! `--url <base>` overrides the service address from configuration.
//!
//! Each sweep carries a short-lived service token signed with the shared
//! authentication secret.

use std::time::Duration;

use anyhow::{bail, Context};
use mandate_core::domain::auth::Caller;
use mandate_core::infrastructure::adapters::TokenAuthenticator;
use mandate_core::shared::logging::LoggingUtils;
use mandate_core::AppConfig;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct SweepResponse {
    expired: usize,
}

struct SweeperArgs {
    once: bool,
    url: Option<String>,
}

impl SweeperArgs {
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self { once: false, url: None };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--once" => parsed.once = true,
                "--url" => parsed.url = Some(args.next().context("--url needs a value")?),
                other => bail!("unknown argument: {}", other),
            }
        }
        Ok(parsed)
    }
}

const SERVICE_NAME: &str = "mandate-sweeper";

async fn sweep(
    client: &reqwest::Client,
    endpoint: &str,
    authenticator: &TokenAuthenticator,
    token_ttl_seconds: u64,
) -> anyhow::Result<usize> {
    let token = authenticator
        .issue(&Caller::service(SERVICE_NAME), token_ttl_seconds)
        .context("failed to sign service token")?;
    let response = client
        .post(endpoint)
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("sweep request to {} failed", endpoint))?;
    if !response.status().is_success() {
        bail!("sweep returned HTTP {}", response.status());
    }
    let body: SweepResponse = response.json().await.context("invalid sweep response")?;
    Ok(body.expired)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = SweeperArgs::parse()?;
    let config = AppConfig::load().context("failed to load configuration")?;
    LoggingUtils::initialize(&config.logging.level, &config.logging.format)
        .context("failed to initialize logging")?;

    let base = args
        .url
        .unwrap_or_else(|| format!("http://{}", config.server_address()));
    let endpoint = format!("{}/mandates/sweep", base.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;
    let authenticator = TokenAuthenticator::new(&config.auth);
    let ttl = config.auth.service_token_ttl_seconds;

    if args.once {
        let expired = sweep(&client, &endpoint, &authenticator, ttl).await?;
        info!(expired, "Mandate sweep complete");
        return Ok(());
    }

    let period = Duration::from_secs(config.mandates.sweep_interval_seconds);
    info!(endpoint = %endpoint, interval_seconds = period.as_secs(), "Starting mandate sweeper");
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        match sweep(&client, &endpoint, &authenticator, ttl).await {
            Ok(expired) => info!(expired, "Mandate sweep complete"),
            Err(e) => error!(error = %e, "Mandate sweep failed"),
        }
    }
}
