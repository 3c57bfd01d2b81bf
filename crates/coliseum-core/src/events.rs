use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::{ChannelId, ParticipantId};
use crate::run::AttemptSummary;

/// Every externally visible state change produces an Event.
/// Delivery is fire-and-forget over an unbounded channel; a sink that has
/// gone away is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A new attempt started collecting stats.
    AttemptStarted {
        at: DateTime<Utc>,
    },
    /// Exactly two participants became the exclusive recent contributors
    /// in a channel.
    PairRunStarted {
        channel: ChannelId,
        pair: [ParticipantId; 2],
        at: DateTime<Utc>,
    },
    /// A pair run ended (inactivity, pair switch, or attempt finalize).
    PairRunEnded {
        channel: ChannelId,
        pair: [ParticipantId; 2],
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// One-shot warning that an active pair run is close to being ended
    /// for inactivity.
    InactivityWarning {
        channel: ChannelId,
        pair: [ParticipantId; 2],
        at: DateTime<Utc>,
    },
    /// The attempt was finalized (timeout or explicit stop).
    AttemptFinalized {
        summary: AttemptSummary,
        at: DateTime<Utc>,
    },
}
