//! Command-line client for the leaderboard service.
//!
//! - [`cli`] -- Argument parsing (`clap` derive)
//! - [`client`] -- Typed HTTP client for the query API
//! - [`output`] -- Plain-text rendering of responses
//!
//! Publishing goes straight to `JetStream` through the consumer crate's
//! [`leaderboard_consumer::NatsClient`], so published records are
//! byte-for-byte what the consumer decodes.

pub mod cli;
pub mod client;
pub mod output;

pub use cli::{Cli, Command, TopMode};
pub use client::QueryClient;
