//! NATS connection and publishing helpers.
//!
//! Producers publish [`ScoreEvent`]s to the `JetStream` stream configured in
//! [`StreamConfig`]. The consumer reads the same stream and optionally
//! republishes dead letters on `stream.dead_letter_subject`.

use async_nats::jetstream;
use async_nats::jetstream::context::Publish;
use leaderboard_core::config::StreamConfig;
use leaderboard_types::{DeadLetterRecord, ScoreEvent};
use tracing::{debug, info, warn};

use crate::error::ConsumerError;

/// NATS client wrapper shared by the consumer, the dead letter forwarder, and
/// the publishing CLI.
#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
    config: StreamConfig,
}

impl NatsClient {
    /// Connect using the URL and credentials in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Nats`] if the credentials file cannot be
    /// read or the connection cannot be established.
    pub async fn connect(config: &StreamConfig) -> Result<Self, ConsumerError> {
        let url = config.url.as_str();
        info!(url = url, "connecting to NATS server");

        let mut options = async_nats::ConnectOptions::new().name("leaderboard");
        if let Some(path) = &config.credentials_file {
            options = options.credentials_file(path).await.map_err(|e| {
                ConsumerError::Nats(format!("failed to read credentials file {path}: {e}"))
            })?;
        }
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options = options.user_and_password(user.clone(), password.clone());
        }
        if let Some(token) = &config.token {
            options = options.token(token.clone());
        }

        let client = options
            .connect(url)
            .await
            .map_err(|e| ConsumerError::Nats(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Underlying client.
    pub const fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Stream settings this client was created with.
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// `JetStream` context on this connection.
    pub fn jetstream(&self) -> jetstream::Context {
        jetstream::new(self.client.clone())
    }

    /// Look up the score stream, creating it over the update subject if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Stream`] if the server rejects the request.
    pub async fn ensure_stream(&self) -> Result<jetstream::stream::Stream, ConsumerError> {
        let name = self.config.stream_name.clone();
        self.jetstream()
            .get_or_create_stream(jetstream::stream::Config {
                name: name.clone(),
                subjects: vec![self.config.subject.clone()],
                ..Default::default()
            })
            .await
            .map_err(|e| ConsumerError::Stream(format!("failed to open stream {name}: {e}")))
    }

    /// Publish a score event and wait for the stream to store it.
    ///
    /// The event's `message_id` is sent as the `JetStream` message id so the
    /// server drops re-sends inside its duplicate window. Returns the stream
    /// offset assigned to the event.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Nats`] if serialization or publishing fails.
    pub async fn publish_event(&self, event: &ScoreEvent) -> Result<u64, ConsumerError> {
        let subject = self.config.subject.clone();
        let payload = serde_json::to_vec(event)
            .map_err(|e| ConsumerError::Nats(format!("failed to serialize event: {e}")))?;
        let mut publish = Publish::build().payload(payload.into());
        if let Some(id) = event.message_id {
            publish = publish.message_id(id.to_string());
        }
        debug!(
            subject = subject,
            entity_id = %event.entity_id,
            score = event.score,
            "publishing score event"
        );
        let ack = self
            .jetstream()
            .send_publish(subject.clone(), publish)
            .await
            .map_err(|e| ConsumerError::Nats(format!("failed to publish to {subject}: {e}")))?
            .await
            .map_err(|e| ConsumerError::Nats(format!("publish to {subject} not acked: {e}")))?;
        Ok(ack.sequence)
    }

    /// Republish a dead letter on `stream.dead_letter_subject`.
    ///
    /// Does nothing when no subject is configured. The message is queued on
    /// the connection without waiting for the server; call [`Self::flush`]
    /// before dropping the client. Failures are logged and never block the
    /// consumer.
    pub async fn publish_dead_letter(&self, record: &DeadLetterRecord) {
        let Some(subject) = self.config.dead_letter_subject.clone() else {
            return;
        };
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject = subject, error = %e, "failed to serialize dead letter");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            warn!(
                subject = subject,
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "failed to publish dead letter"
            );
        }
    }

    /// Wait until every queued publish has been written to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Nats`] if the connection cannot be flushed.
    pub async fn flush(&self) -> Result<(), ConsumerError> {
        self.client
            .flush()
            .await
            .map_err(|e| ConsumerError::Nats(format!("failed to flush: {e}")))
    }
}

impl std::fmt::Debug for NatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsClient")
            .field("url", &self.config.url)
            .field("stream", &self.config.stream_name)
            .finish_non_exhaustive()
    }
}
