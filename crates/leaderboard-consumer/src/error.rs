//! Error types for the event consumer.
//!
//! [`ConsumerError`] covers the stream plumbing (connect, pull, ack).
//! [`ProcessError`] covers a single record that could not be applied and
//! decides which dead letter class it lands in.

use leaderboard_core::CoreError;
use leaderboard_types::DeadLetterKind;

/// Errors from the stream connection.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Failed to connect to or communicate with the NATS server.
    #[error("NATS error: {0}")]
    Nats(String),

    /// Failed to set up or read from the `JetStream` stream.
    #[error("JetStream error: {0}")]
    Stream(String),

    /// Failed to acknowledge a record.
    #[error("ack failed for offset {offset}: {reason}")]
    Ack {
        /// Offset of the record.
        offset: u64,
        /// Server or client message.
        reason: String,
    },
}

/// Why one record was not applied.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The payload is not a valid score event.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The store rejected the update.
    #[error("rejected update: {0}")]
    Rejected(#[source] CoreError),

    /// The store stayed unavailable through every retry.
    #[error("store unavailable after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: CoreError,
    },
}

impl ProcessError {
    /// Dead letter class for this failure.
    pub const fn kind(&self) -> DeadLetterKind {
        match self {
            Self::Malformed(_) | Self::Rejected(_) => DeadLetterKind::Validation,
            Self::Exhausted { .. } => DeadLetterKind::RetriesExhausted,
        }
    }
}
