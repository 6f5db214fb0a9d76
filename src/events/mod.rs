//! Wire events
//!
//! The boundary messages exchanged with transports, tagged by `type` and
//! named in camelCase to match the frontend's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broadcast::Role;
use crate::polls::{Poll, Tally, VoteRecord};

/// Messages a transport may send to the coordinator, one per logical action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Declare identity and role. Must precede every other event.
    Join { name: String, role: Role },
    /// Teacher-initiated poll creation.
    CreatePoll {
        question: String,
        options: Vec<String>,
        #[serde(default)]
        time_limit_seconds: Option<u64>,
    },
    /// Student answer, bound to the sending connection's participant.
    SubmitVote { option: String },
    /// Teacher-initiated manual close.
    EndPoll,
    /// Teacher-initiated removal of a participant.
    RemoveParticipant { participant_id: Uuid },
    /// Classroom chat relay.
    ChatMessage { message: String },
}

/// Messages the coordinator emits. Broadcast unless noted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Point-to-point reply to a successful `join`.
    Joined { participant_id: Uuid },
    /// A new poll is accepting votes. Also sent point-to-point as the
    /// snapshot for participants who join mid-poll.
    PollStarted {
        #[serde(flatten)]
        poll: Poll,
    },
    /// Interim tally after an accepted vote that did not close the poll.
    TallyUpdated {
        tally: Tally,
        answered_participants: Vec<VoteRecord>,
    },
    /// The poll closed; final results.
    PollEnded {
        poll: Poll,
        final_tally: Tally,
        answered_participants: Vec<VoteRecord>,
    },
    ParticipantCountChanged { count: usize },
    ParticipantJoined { id: Uuid, name: String },
    ParticipantLeft { id: Uuid },
    /// Point-to-point terminal signal to a kicked participant.
    RemovedByTeacher,
    /// Relayed chat message.
    ChatMessage {
        id: Uuid,
        sender: String,
        sender_role: Role,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Point-to-point rejection of a request.
    Error { message: String },
}
