//! Poll domain types
//!
//! The live poll, its tally, the per-participant vote records, and the
//! immutable history entries produced when a poll closes.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Per-option vote counts, kept in the poll's declared option order.
///
/// Every declared option is present from the start with a count of zero, and
/// no option outside the declared set can ever be counted. Serializes as a
/// JSON object (`{option: count}`) in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(String, u32)>,
}

impl Tally {
    /// Create a tally with every option initialized to zero.
    pub fn new(options: &[String]) -> Self {
        Self {
            counts: options.iter().map(|o| (o.clone(), 0)).collect(),
        }
    }

    /// Whether `option` is part of the declared option set.
    pub fn contains(&self, option: &str) -> bool {
        self.counts.iter().any(|(o, _)| o == option)
    }

    /// Increment the count for `option`. Returns false if the option is not
    /// part of the declared set (and counts nothing).
    pub fn increment(&mut self, option: &str) -> bool {
        match self.counts.iter_mut().find(|(o, _)| o == option) {
            Some((_, count)) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Count for a single option.
    pub fn count(&self, option: &str) -> Option<u32> {
        self.counts
            .iter()
            .find(|(o, _)| o == option)
            .map(|(_, c)| *c)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u32 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Options with their counts, in declaration order.
    pub fn entries(&self) -> &[(String, u32)] {
        &self.counts
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (option, count) in &self.counts {
            map.serialize_entry(option, count)?;
        }
        map.end()
    }
}

/// A single poll: one question, a fixed ordered option set, a time limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    /// Generated unique ID.
    pub id: Uuid,
    /// Question text.
    pub question: String,
    /// Ordered option labels. Order is significant and preserved in results.
    pub options: Vec<String>,
    /// Time limit for answering.
    pub time_limit_seconds: u64,
    /// When the poll was created.
    pub created_at: DateTime<Utc>,
    /// When the poll closed. Set exactly once, at close.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Per-option vote counts.
    pub tally: Tally,
    /// Whether the poll is still accepting votes.
    pub is_active: bool,
}

impl Poll {
    /// Create a new active poll with a zeroed tally.
    pub fn new(question: String, options: Vec<String>, time_limit_seconds: u64) -> Self {
        let tally = Tally::new(&options);
        Self {
            id: Uuid::new_v4(),
            question,
            options,
            time_limit_seconds,
            created_at: Utc::now(),
            ended_at: None,
            tally,
            is_active: true,
        }
    }
}

/// One participant's accepted answer for a poll.
///
/// At most one per participant per poll; a second submission is rejected,
/// never overwritten.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    /// Participant who answered.
    #[serde(rename = "id")]
    pub participant_id: Uuid,
    /// Display name at the time of answering.
    pub name: String,
    /// Chosen option label.
    pub option: String,
    /// When the answer was accepted.
    pub answered_at: DateTime<Utc>,
}

/// Immutable record of a concluded poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The closed poll, final tally included.
    pub poll: Poll,
    /// Number of registered participants at close time.
    pub participant_count: usize,
    /// Every accepted vote, in submission order.
    pub answered_participants: Vec<VoteRecord>,
}

/// A poll creation request, before validation.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub question: String,
    pub options: Vec<String>,
    /// Falls back to the configured default when omitted.
    pub time_limit_seconds: Option<u64>,
}

/// Snapshot returned by the status query surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub active_poll: Option<Poll>,
    pub participant_count: usize,
    pub can_create_new_poll: bool,
    pub answered_participants: Vec<VoteRecord>,
}
