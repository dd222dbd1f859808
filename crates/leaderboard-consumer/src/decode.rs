//! Payload decoding.

use leaderboard_core::ScoreUpdate;
use leaderboard_types::ScoreEvent;

use crate::error::ProcessError;

/// Bytes of a payload kept in a dead letter record.
pub const PAYLOAD_PREVIEW_BYTES: usize = 512;

/// Decode a raw payload into a store update.
///
/// Unknown fields, an invalid entity id, or a non-integer score are all
/// rejected.
///
/// # Errors
///
/// Returns [`ProcessError::Malformed`] if the payload is not a valid
/// [`ScoreEvent`].
pub fn decode(payload: &[u8]) -> Result<ScoreUpdate, ProcessError> {
    let event: ScoreEvent = serde_json::from_slice(payload)?;
    Ok(event.into())
}

/// Leading bytes of `payload` as lossy UTF-8.
pub fn preview(payload: &[u8]) -> String {
    let end = payload.len().min(PAYLOAD_PREVIEW_BYTES);
    String::from_utf8_lossy(payload.get(..end).unwrap_or(payload)).into_owned()
}
