//! Leaderboard server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `LEADERBOARD_CONFIG` or `leaderboard.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open snapshot storage and recover the store (fatal on a bad snapshot)
//! 4. Bind the query listener
//! 5. Connect to NATS and open the `JetStream` consumer after the
//!    recovered offset
//! 6. Run until SIGINT/SIGTERM, then drain and write the final snapshot

use std::path::PathBuf;

use leaderboard_consumer::{JetStreamSource, NatsClient};
use leaderboard_core::LeaderboardConfig;
use leaderboard_server::{Pipeline, ServerError, logging, shutdown_signal};
use tracing::info;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "leaderboard.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1-2. Configuration, then logging in the configured format.
    let config = load_config()?;
    logging::init(&config.logging);
    info!(
        stream = config.stream.stream_name,
        subject = config.stream.subject,
        storage = config.storage.location,
        port = config.query.port,
        mode = %config.scoring.mode,
        "leaderboard-server starting"
    );

    // 3. Recover.
    let stream = config.stream.clone();
    let query = config.query.clone();
    let pipeline = Pipeline::open(config).await?;

    // 4. Query listener.
    let listener = leaderboard_query::bind(&query).await?;

    // 5. Event stream.
    let nats = NatsClient::connect(&stream).await?;
    let committed = pipeline.committed_offset(&stream.stream_name).await;
    let source = JetStreamSource::open(&nats, committed).await?;

    // 6. Run.
    let summary = pipeline
        .run(source, Some(listener), Some(nats), shutdown_signal())
        .await?;

    info!(
        snapshot_sequence = summary.cursor.sequence,
        received = summary.counters.events_received,
        applied = summary.counters.events_applied,
        dead_letters = summary.counters.dead_letters,
        "leaderboard-server shutdown complete"
    );
    Ok(())
}

/// Load and validate configuration.
///
/// A missing default file means defaults plus environment overrides; a
/// missing file named by `LEADERBOARD_CONFIG` is an error.
fn load_config() -> Result<LeaderboardConfig, ServerError> {
    let config = match std::env::var_os("LEADERBOARD_CONFIG") {
        Some(path) => LeaderboardConfig::from_file(&PathBuf::from(path))?,
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                LeaderboardConfig::from_file(&path)?
            } else {
                let mut config = LeaderboardConfig::default();
                config.apply_env_overrides();
                config
            }
        }
    };
    config.validate()?;
    Ok(config)
}
