mod config;
mod db;
mod error;
mod notifier;
mod parser;
mod pipeline;
mod schedule;

use std::path::Path;
use std::time::Duration;

use chrono::Local;
use clap::Parser;

use crate::notifier::Notifier;
use crate::pipeline::Pipeline;

/// Consecutive cycles with a failed fetch before the operator gets pinged.
const FETCH_ALERT_THRESHOLD: u32 = 5;

#[derive(Parser)]
#[command(
    name = "zastepstwa-bot",
    about = "Powiadomienia Discord o zastępstwach w planie lekcji"
)]
enum Cli {
    /// Ciągły monitoring planu (pętla odpytywania)
    Watch,
    /// Pojedynczy przebieg (cron / ręczne uruchomienie)
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli {
        Cli::Watch => run_watch().await,
        Cli::Check => run_check().await,
    }
}

fn setup() -> anyhow::Result<(config::Config, Pipeline, Option<Notifier>)> {
    let config_path = Path::new("config.toml");
    let cfg = config::Config::load(config_path)?;

    let client = reqwest::Client::builder()
        .user_agent("zastepstwa-bot/0.1")
        .timeout(Duration::from_secs(cfg.scrape.timeout_secs))
        .build()?;

    let database = db::Database::init(&cfg.database.path)?;

    // Webhook URL is a secret; env var wins over the config file.
    let webhook_url = std::env::var("WEBHOOK_URL")
        .ok()
        .or_else(|| cfg.webhook.url.clone())
        .filter(|s| !s.is_empty());
    let content = std::env::var("WEBHOOK_MESSAGE_CONTENT")
        .ok()
        .or_else(|| cfg.webhook.content.clone())
        .filter(|s| !s.is_empty());

    let notifier = match webhook_url {
        Some(url) => Some(Notifier::new(client.clone(), url, content)),
        None => {
            tracing::warn!(
                "No webhook URL set (WEBHOOK_URL or [webhook].url). Running in dry-run mode."
            );
            None
        }
    };

    let pipeline = Pipeline::new(
        client,
        database,
        notifier.clone(),
        cfg.scrape.url_template.clone(),
        cfg.scrape.class_name.clone(),
    );

    Ok((cfg, pipeline, notifier))
}

async fn run_watch() -> anyhow::Result<()> {
    let (cfg, pipeline, notifier) = setup()?;
    tracing::info!(
        class = %cfg.scrape.class_name,
        interval_secs = cfg.poll.interval_secs,
        "Starting watch loop"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.poll.interval_secs));
    let mut consecutive_fetch_failures = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let today = Local::now().date_naive();
                match pipeline.run_cycle(today).await {
                    Ok(stats) => {
                        tracing::info!(
                            scanned = stats.scanned,
                            new = stats.new,
                            fetch_failures = stats.fetch_failures,
                            delivery_failures = stats.delivery_failures,
                            "Cycle complete"
                        );

                        if stats.fetch_failures > 0 {
                            consecutive_fetch_failures += 1;
                            if consecutive_fetch_failures == FETCH_ALERT_THRESHOLD {
                                let alert = format!(
                                    "Nie udało się pobrać planu przez {} kolejnych cykli.",
                                    consecutive_fetch_failures
                                );
                                if let Some(ref notifier) = notifier {
                                    if let Err(e) = notifier.send_alert(&alert).await {
                                        tracing::error!(error = %e, "Failed to send fetch alert");
                                    }
                                }
                            }
                        } else {
                            consecutive_fetch_failures = 0;
                        }
                    }
                    // Malformed rows and store failures mean the page or the
                    // database can no longer be trusted; stop loudly.
                    Err(e) => {
                        tracing::error!(error = %e, "Unrecoverable pipeline error, shutting down");
                        if let Some(ref notifier) = notifier {
                            let _ = notifier.send_alert(&format!("Monitor zatrzymany: {e}")).await;
                        }
                        return Err(e.into());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping watch loop");
                break;
            }
        }
    }

    Ok(())
}

async fn run_check() -> anyhow::Result<()> {
    let (_cfg, pipeline, _notifier) = setup()?;
    let today = Local::now().date_naive();

    let stats = pipeline.run_cycle(today).await?;
    tracing::info!(
        scanned = stats.scanned,
        new = stats.new,
        delivery_failures = stats.delivery_failures,
        "Check complete"
    );

    if stats.fetch_failures > 0 {
        anyhow::bail!("{} of 2 page fetches failed", stats.fetch_failures);
    }
    Ok(())
}
