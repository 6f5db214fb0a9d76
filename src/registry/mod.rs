//! Participant Registry
//!
//! Tracks connected participants and their answered status for the current
//! poll. The registry owns participant identity only; it never owns the
//! transport, and removing a participant never retracts votes they already
//! cast.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    /// Whether they have answered the current poll.
    pub has_answered: bool,
}

/// Registry of connected participants, in stable join order.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant with `has_answered = false`. Duplicate names are
    /// allowed; identity is the generated ID, never the name.
    pub fn register(&mut self, name: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.participants.push(Participant {
            id,
            name: name.into(),
            joined_at: Utc::now(),
            has_answered: false,
        });
        id
    }

    /// Remove a participant. Their presence goes away, but any vote they
    /// already cast in the current poll stays counted.
    pub fn unregister(&mut self, id: &Uuid) -> Option<Participant> {
        let index = self.participants.iter().position(|p| &p.id == id)?;
        Some(self.participants.remove(index))
    }

    pub fn get(&self, id: &Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Mark a participant as having answered. Returns false if the
    /// participant is unknown or already marked; callers check answered
    /// status before recording a vote, so false here is never silently
    /// treated as success.
    pub fn mark_answered(&mut self, id: &Uuid) -> bool {
        match self.participants.iter_mut().find(|p| &p.id == id) {
            Some(p) if !p.has_answered => {
                p.has_answered = true;
                true
            }
            _ => false,
        }
    }

    /// Clear every answered flag. Called exactly once per poll creation.
    pub fn reset_all_answered(&mut self) {
        for p in &mut self.participants {
            p.has_answered = false;
        }
    }

    /// True if every registered participant has answered. Vacuously true for
    /// an empty registry: an empty class must still be closeable by the
    /// deadline timer, and poll creation never treats this as an immediate
    /// close condition.
    pub fn all_answered(&self) -> bool {
        self.participants.iter().all(|p| p.has_answered)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants in stable join order.
    pub fn list(&self) -> &[Participant] {
        &self.participants
    }
}
