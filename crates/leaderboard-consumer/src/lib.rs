//! Event consumer for the leaderboard service.
//!
//! Reads score updates from a NATS `JetStream` stream and applies them to
//! the shared ranking store in stream order.
//!
//! ```text
//! JetStream ──pull──▶ JetStreamSource ──▶ EventConsumer ──apply──▶ SharedStore
//!                                              │
//!                                              └──▶ DeadLetterLog (+ NATS)
//! ```
//!
//! # Modules
//!
//! - [`source`] -- The [`EventSource`] seam and an in-memory source
//! - [`jetstream`] -- `JetStream` pull consumer
//! - [`nats`] -- Connection, publishing, dead letter forwarding
//! - [`decode`] -- Strict payload decoding
//! - [`consumer`] -- The consume loop
//! - [`error`] -- Error types

pub mod consumer;
pub mod decode;
pub mod error;
pub mod jetstream;
pub mod nats;
pub mod source;

pub use consumer::EventConsumer;
pub use error::{ConsumerError, ProcessError};
pub use jetstream::JetStreamSource;
pub use nats::NatsClient;
pub use source::{EventSource, MemorySource, StreamRecord};
