//! `leaderboard-cli` binary.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use leaderboard_cli::{Cli, Command, QueryClient, TopMode, output};
use leaderboard_consumer::NatsClient;
use leaderboard_core::LeaderboardConfig;
use leaderboard_types::{EntityId, ScoreEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so command output stays pipeable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let text = match cli.command {
        Command::Publish { entity_id, score } => {
            let config = load_config(cli.config.as_deref())?;
            let entity_id = EntityId::parse(&entity_id)
                .with_context(|| format!("invalid entity id {entity_id:?}"))?;
            publish(&config, &ScoreEvent::new(entity_id, score)).await?
        }
        Command::Rank { entity_id } => {
            let entity_id = EntityId::parse(&entity_id)
                .with_context(|| format!("invalid entity id {entity_id:?}"))?;
            output::rank(&QueryClient::new(&cli.url)?.rank(&entity_id).await?)
        }
        Command::Top { k, offset, mode } => {
            let client = QueryClient::new(&cli.url)?;
            match mode {
                TopMode::Exact => output::top(&client.top(k, offset).await?),
                TopMode::Approximate => output::activity(&client.activity_top(k).await?),
            }
        }
        Command::Stats => output::stats(&QueryClient::new(&cli.url)?.stats().await?),
        Command::DeadLetters { limit } => {
            output::dead_letters(&QueryClient::new(&cli.url)?.dead_letters(limit).await?)
        }
    };

    println!("{text}");
    Ok(())
}

/// `--config` (or `LEADERBOARD_CONFIG`) if given, else defaults plus
/// environment overrides.
fn load_config(path: Option<&Path>) -> Result<LeaderboardConfig> {
    let config = match path {
        Some(path) => LeaderboardConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => {
            let mut config = LeaderboardConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn publish(config: &LeaderboardConfig, event: &ScoreEvent) -> Result<String> {
    let nats = NatsClient::connect(&config.stream)
        .await
        .with_context(|| format!("failed to connect to {}", config.stream.url))?;
    nats.ensure_stream().await?;
    let offset = nats.publish_event(event).await?;
    let message_id = event
        .message_id
        .map_or_else(|| "-".to_owned(), |id| id.to_string());
    Ok(format!(
        "Published {} score {} to {} at offset {offset} (message id {message_id})",
        event.entity_id, event.score, config.stream.subject
    ))
}
