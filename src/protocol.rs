//! Relay wire protocol
//!
//! JSON text messages exchanged between the capture client and the relay.
//! Audio travels the other direction as raw binary frames (see
//! [`crate::audio`]) and never appears here.
//!
//! The `type` tags are part of the wire contract and are intentionally
//! mixed-case: `status`, `ping` and `pong` originate at the relay itself,
//! while `Begin`, `Turn`, `Error` and `Termination` are upstream event
//! names forwarded verbatim.

use serde::{Deserialize, Serialize};

/// A single JSON message on the relay's text channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    /// Upstream connectivity state, synthesized by the relay on connect
    #[serde(rename = "status")]
    Status {
        ready: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Upstream session established
    Begin,
    /// Partial or finalized utterance
    Turn {
        transcript: String,
        end_of_turn: bool,
    },
    /// Upstream failure, advisory unless followed by a close
    Error { message: String },
    /// Upstream session ended
    Termination,
    /// Client-relay keepalive, never forwarded upstream
    #[serde(rename = "ping")]
    Ping,
    /// Relay reply to a ping
    #[serde(rename = "pong")]
    Pong,
}

impl RelayEvent {
    /// Synthesized readiness event sent once the upstream leg is open
    #[must_use]
    pub fn ready(message: impl Into<String>) -> Self {
        Self::Status {
            ready: true,
            message: Some(message.into()),
        }
    }

    /// True for `Turn` events that finalize an utterance
    #[must_use]
    pub const fn is_final_turn(&self) -> bool {
        matches!(
            self,
            Self::Turn {
                end_of_turn: true,
                ..
            }
        )
    }
}
