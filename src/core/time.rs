//! Envelope for CLI JSON output.
//!
//! Every command prints one envelope on stdout: bookkeeping fields first, then the
//! command's own body flattened into the same object.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Milliseconds since the unix epoch with a `Z` suffix (e.g. `1771220592123Z`).
pub fn now_epoch_ms_z() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{}Z", millis)
}

#[derive(Debug, Serialize)]
pub struct CommandEnvelope<'a, T: Serialize> {
    pub envelope_version: &'static str,
    pub ts: String,
    /// ULID, unique per printed envelope
    pub event_id: String,
    pub cmd: &'a str,
    pub status: &'a str,
    #[serde(flatten)]
    pub body: T,
}

/// Wrap a command result. `body` must serialize as a map (a struct or JSON object).
pub fn command_envelope<'a, T: Serialize>(
    cmd: &'a str,
    status: &'a str,
    body: T,
) -> CommandEnvelope<'a, T> {
    CommandEnvelope {
        envelope_version: ENVELOPE_VERSION,
        ts: now_epoch_ms_z(),
        event_id: Ulid::new().to_string(),
        cmd,
        status,
        body,
    }
}
