use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Envelope;

/// Event sent while a poll is open: the updated result set after a vote
pub const POLL_VOTE: &str = "poll:vote";

/// Event sent when a poll closes: the final result set
pub const POLL_CLOSED: &str = "poll:closed";

/// Per-option tally within a poll result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionResult {
    pub option_id: i64,
    pub text: String,
    pub votes: u64,
}

/// Result set for one poll, broadcast on every vote and on closure.
///
/// The UI compares `poll_id` against the poll currently displayed before
/// applying an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: i64,
    pub options: Vec<PollOptionResult>,
    pub total_votes: u64,
    /// Set only on `poll:closed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Typed view over an inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Updated result set for an open poll
    PollVote(PollResults),
    /// Final result set for a closed poll
    PollClosed(PollResults),
}

impl ServerEvent {
    /// Decode a typed event from an envelope.
    ///
    /// Returns `None` for unknown kinds (the caller ignores them) and an
    /// error only when a known kind carries a malformed payload.
    pub fn from_envelope(envelope: &Envelope) -> Option<Result<Self>> {
        match envelope.kind.as_str() {
            POLL_VOTE => Some(
                serde_json::from_value(envelope.data.clone())
                    .map(Self::PollVote)
                    .map_err(Error::Json),
            ),
            POLL_CLOSED => Some(
                serde_json::from_value(envelope.data.clone())
                    .map(Self::PollClosed)
                    .map_err(Error::Json),
            ),
            _ => None,
        }
    }

    pub fn poll_id(&self) -> i64 {
        self.results().poll_id
    }

    pub fn results(&self) -> &PollResults {
        match self {
            Self::PollVote(results) | Self::PollClosed(results) => results,
        }
    }
}
