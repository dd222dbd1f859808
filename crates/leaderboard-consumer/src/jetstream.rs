//! `JetStream` pull consumer implementing [`EventSource`].
//!
//! The consumer is ephemeral: committed offsets live in the ranking store's
//! snapshots, so on start it asks the server to deliver from the first
//! uncommitted stream sequence.

use std::collections::HashMap;

use async_nats::jetstream;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, pull};
use async_trait::async_trait;
use futures::StreamExt;
use leaderboard_types::StreamPosition;
use tracing::{debug, info};

use crate::error::ConsumerError;
use crate::nats::NatsClient;
use crate::source::{EventSource, StreamRecord};

/// Pull-based source over the score stream.
pub struct JetStreamSource {
    partition: String,
    messages: pull::Stream,
    pending: HashMap<u64, jetstream::Message>,
}

impl JetStreamSource {
    /// Open the stream and start delivery after `committed`.
    ///
    /// `committed` is the last offset already reflected in the store, or
    /// `None` to read the stream from the beginning.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Stream`] if the stream or consumer cannot be
    /// created.
    pub async fn open(nats: &NatsClient, committed: Option<u64>) -> Result<Self, ConsumerError> {
        let config = nats.config();
        let stream = nats.ensure_stream().await?;

        let deliver_policy = committed.map_or(DeliverPolicy::All, |offset| {
            DeliverPolicy::ByStartSequence {
                start_sequence: offset.saturating_add(1),
            }
        });
        let consumer = stream
            .create_consumer(pull::Config {
                deliver_policy,
                ack_policy: AckPolicy::Explicit,
                filter_subject: config.subject.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| ConsumerError::Stream(format!("failed to create consumer: {e}")))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| ConsumerError::Stream(format!("failed to start message stream: {e}")))?;

        info!(
            stream = config.stream_name,
            subject = config.subject,
            resume_after = committed.unwrap_or(0),
            "JetStream consumer ready"
        );
        Ok(Self {
            partition: config.stream_name.clone(),
            messages,
            pending: HashMap::new(),
        })
    }
}

#[async_trait]
impl EventSource for JetStreamSource {
    async fn next(&mut self) -> Result<Option<StreamRecord>, ConsumerError> {
        let Some(message) = self.messages.next().await else {
            return Ok(None);
        };
        let message =
            message.map_err(|e| ConsumerError::Stream(format!("failed to pull message: {e}")))?;
        let offset = message
            .info()
            .map_err(|e| ConsumerError::Stream(format!("message without stream info: {e}")))?
            .stream_sequence;

        let record = StreamRecord {
            position: StreamPosition::new(self.partition.clone(), offset),
            payload: message.payload.to_vec(),
        };
        self.pending.insert(offset, message);
        Ok(Some(record))
    }

    async fn commit(&mut self, position: &StreamPosition) -> Result<(), ConsumerError> {
        let Some(message) = self.pending.remove(&position.offset) else {
            debug!(position = %position, "ack for unknown message ignored");
            return Ok(());
        };
        message.ack().await.map_err(|e| ConsumerError::Ack {
            offset: position.offset,
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for JetStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JetStreamSource")
            .field("partition", &self.partition)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
