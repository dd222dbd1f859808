//! Query API server for the leaderboard service.
//!
//! An Axum HTTP server answering rank, top-k, activity, and pipeline
//! status queries from the shared ranking store. Reads take the store's
//! read lock with a timeout, so a slow writer turns into a retryable
//! `503` instead of a hung request.
//!
//! Once the process starts draining, `/api` routes answer `503` and the
//! listener shuts down gracefully after in-flight requests finish.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::QueryError;
pub use router::build_router;
pub use server::{ServerError, bind, serve, start_server};
pub use state::AppState;
