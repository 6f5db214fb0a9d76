//! Poll Session State Machine
//!
//! Owns the single active poll's lifecycle: creation, answer acceptance,
//! and the one close transition. All mutation paths run under a single
//! mutex so the close-condition check and the close action are atomic;
//! the close itself is idempotent-guarded by taking the active poll out of
//! the state exactly once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::broadcast::Dispatcher;
use crate::config::PollLimits;
use crate::events::ServerEvent;
use crate::history::HistoryLog;
use crate::polls::{HistoryEntry, Poll, PollRequest, StatusSnapshot, VoteRecord};
use crate::registry::ParticipantRegistry;
use crate::timer::{self, TimerHandle};

/// Rejection reasons for session operations. A failed operation leaves the
/// session state exactly as it was before the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid poll request: {0}")]
    Validation(String),
    #[error("a poll is already in progress")]
    PollInProgress,
    #[error("no active poll")]
    NoActivePoll,
    #[error("unknown participant")]
    UnknownParticipant,
    #[error("participant has already answered this poll")]
    AlreadyAnswered,
    #[error("option is not part of the active poll")]
    InvalidOption,
}

/// Which path closed a poll. Deadline fires against a stale poll are
/// ignored before this is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseTrigger {
    Quorum,
    Manual,
    Deadline,
}

struct ActivePoll {
    poll: Poll,
    answered: Vec<VoteRecord>,
    timer: Option<TimerHandle>,
}

struct SessionState {
    registry: ParticipantRegistry,
    active: Option<ActivePoll>,
    history: HistoryLog,
}

/// The session coordinator: one live poll, many participants, one lock.
pub struct SessionCoordinator {
    limits: PollLimits,
    dispatcher: Arc<Dispatcher>,
    inner: Mutex<SessionState>,
}

impl SessionCoordinator {
    pub fn new(
        limits: PollLimits,
        history_cap: Option<usize>,
        dispatcher: Arc<Dispatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            limits,
            dispatcher,
            inner: Mutex::new(SessionState {
                registry: ParticipantRegistry::new(),
                active: None,
                history: HistoryLog::new(history_cap),
            }),
        })
    }

    /// Register a participant. Returns their ID and, if a poll is currently
    /// active, a snapshot to deliver to them; the new participant counts
    /// toward the quorum of the poll already in flight.
    pub fn join(&self, name: &str) -> (Uuid, Option<Poll>) {
        let mut state = self.inner.lock();
        let id = state.registry.register(name);
        let count = state.registry.len();
        let snapshot = state.active.as_ref().map(|a| a.poll.clone());
        drop(state);

        info!(participant_id = %id, name, "participant joined");
        self.dispatcher.broadcast(ServerEvent::ParticipantJoined {
            id,
            name: name.to_string(),
        });
        self.dispatcher
            .broadcast(ServerEvent::ParticipantCountChanged { count });
        (id, snapshot)
    }

    /// Remove a participant on disconnect. Votes they already cast stay
    /// counted; only their live presence goes away. Deliberately does not
    /// run a close-condition check.
    pub fn leave(&self, participant_id: &Uuid) {
        let mut state = self.inner.lock();
        if state.registry.unregister(participant_id).is_none() {
            return;
        }
        let count = state.registry.len();
        drop(state);

        info!(participant_id = %participant_id, "participant left");
        self.dispatcher
            .broadcast(ServerEvent::ParticipantLeft { id: *participant_id });
        self.dispatcher
            .broadcast(ServerEvent::ParticipantCountChanged { count });
    }

    /// Create a poll. Legal only while no poll is active, regardless of how
    /// many participants answered the previous one.
    pub fn create_poll(self: &Arc<Self>, request: PollRequest) -> Result<Poll, SessionError> {
        let mut state = self.inner.lock();
        if state.active.is_some() {
            return Err(SessionError::PollInProgress);
        }

        let (question, options, time_limit) = self.validate_request(request)?;
        let poll = Poll::new(question, options, time_limit);

        // A fresh poll: everyone gets to answer again. An empty class is not
        // an immediate quorum; only the deadline can close a poll nobody can
        // answer.
        state.registry.reset_all_answered();

        let coordinator = Arc::downgrade(self);
        let handle = timer::arm(
            poll.id,
            Duration::from_secs(poll.time_limit_seconds),
            move |poll_id| {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.on_deadline(poll_id);
                }
            },
        );

        state.active = Some(ActivePoll {
            poll: poll.clone(),
            answered: Vec::new(),
            timer: Some(handle),
        });
        drop(state);

        info!(
            poll_id = %poll.id,
            question = %poll.question,
            time_limit_seconds = poll.time_limit_seconds,
            "poll created"
        );
        self.dispatcher
            .broadcast(ServerEvent::PollStarted { poll: poll.clone() });
        Ok(poll)
    }

    /// Record a participant's answer. Closes the poll if this vote completes
    /// the quorum; otherwise broadcasts the interim tally.
    pub fn submit_vote(&self, participant_id: &Uuid, option: &str) -> Result<(), SessionError> {
        let mut state = self.inner.lock();
        let SessionState {
            registry, active, ..
        } = &mut *state;
        let active = active.as_mut().ok_or(SessionError::NoActivePoll)?;

        let participant = registry
            .get(participant_id)
            .ok_or(SessionError::UnknownParticipant)?;
        if participant.has_answered {
            return Err(SessionError::AlreadyAnswered);
        }
        if !active.poll.tally.contains(option) {
            return Err(SessionError::InvalidOption);
        }
        let name = participant.name.clone();

        // All checks passed; from here the vote is final.
        active.poll.tally.increment(option);
        active.answered.push(VoteRecord {
            participant_id: *participant_id,
            name,
            option: option.to_string(),
            answered_at: Utc::now(),
        });
        registry.mark_answered(participant_id);

        debug!(participant_id = %participant_id, option, "vote recorded");

        let event = ServerEvent::TallyUpdated {
            tally: active.poll.tally.clone(),
            answered_participants: active.answered.clone(),
        };
        if registry.all_answered() {
            self.close_locked(&mut state, CloseTrigger::Quorum);
            return Ok(());
        }
        drop(state);
        self.dispatcher.broadcast(event);
        Ok(())
    }

    /// Close the active poll regardless of answer completeness.
    pub fn end_poll(&self) -> Result<(), SessionError> {
        let mut state = self.inner.lock();
        if state.active.is_none() {
            return Err(SessionError::NoActivePoll);
        }
        self.close_locked(&mut state, CloseTrigger::Manual);
        Ok(())
    }

    /// Deadline callback. A no-op when the poll already closed by another
    /// trigger or a newer poll replaced it; a stale fire is expected
    /// steady-state behavior, not a fault.
    pub fn on_deadline(&self, poll_id: Uuid) {
        let mut state = self.inner.lock();
        match &state.active {
            Some(active) if active.poll.id == poll_id => {
                self.close_locked(&mut state, CloseTrigger::Deadline);
            }
            _ => debug!(%poll_id, "stale deadline ignored"),
        }
    }

    /// Remove a participant at the teacher's request. The active poll's
    /// tally is untouched, and removal never runs a close-condition check
    /// even if it leaves everyone remaining answered.
    pub fn kick(&self, participant_id: &Uuid) -> Result<(), SessionError> {
        let mut state = self.inner.lock();
        state
            .registry
            .unregister(participant_id)
            .ok_or(SessionError::UnknownParticipant)?;
        let count = state.registry.len();
        drop(state);

        info!(participant_id = %participant_id, "participant removed by teacher");
        self.dispatcher
            .send_to_participant(participant_id, ServerEvent::RemovedByTeacher);
        self.dispatcher
            .broadcast(ServerEvent::ParticipantLeft { id: *participant_id });
        self.dispatcher
            .broadcast(ServerEvent::ParticipantCountChanged { count });
        Ok(())
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        let state = self.inner.lock();
        StatusSnapshot {
            active_poll: state.active.as_ref().map(|a| a.poll.clone()),
            participant_count: state.registry.len(),
            can_create_new_poll: state.active.is_none(),
            answered_participants: state
                .active
                .as_ref()
                .map(|a| a.answered.clone())
                .unwrap_or_default(),
        }
    }

    /// Concluded polls, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().history.list()
    }

    /// Display name of a registered participant.
    pub fn participant_name(&self, participant_id: &Uuid) -> Option<String> {
        self.inner
            .lock()
            .registry
            .get(participant_id)
            .map(|p| p.name.clone())
    }

    /// The one close path shared by quorum, manual end, and deadline.
    /// Taking `active` out of the state under the lock is the idempotency
    /// guard: whichever trigger gets here first closes the poll, every
    /// later one finds nothing to close.
    fn close_locked(&self, state: &mut SessionState, trigger: CloseTrigger) {
        let Some(mut active) = state.active.take() else {
            return;
        };
        if let Some(handle) = active.timer.take() {
            handle.cancel();
        }

        active.poll.is_active = false;
        active.poll.ended_at = Some(Utc::now());

        let entry = HistoryEntry {
            poll: active.poll.clone(),
            participant_count: state.registry.len(),
            answered_participants: active.answered.clone(),
        };
        state.history.append(entry);

        info!(
            poll_id = %active.poll.id,
            trigger = ?trigger,
            votes = active.answered.len(),
            participants = state.registry.len(),
            "poll ended"
        );
        self.dispatcher.broadcast(ServerEvent::PollEnded {
            final_tally: active.poll.tally.clone(),
            answered_participants: active.answered,
            poll: active.poll,
        });
    }

    fn validate_request(
        &self,
        request: PollRequest,
    ) -> Result<(String, Vec<String>, u64), SessionError> {
        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(SessionError::Validation("question must not be empty".into()));
        }

        let options: Vec<String> = request
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < 2 {
            return Err(SessionError::Validation(
                "poll needs at least 2 non-empty options".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for option in &options {
            if !seen.insert(option) {
                // Two identical labels would alias one tally bucket.
                return Err(SessionError::Validation(format!(
                    "duplicate option: {option}"
                )));
            }
        }

        let time_limit = request
            .time_limit_seconds
            .unwrap_or(self.limits.default_seconds);
        if time_limit < self.limits.min_seconds || time_limit > self.limits.max_seconds {
            return Err(SessionError::Validation(format!(
                "time limit must be between {} and {} seconds",
                self.limits.min_seconds, self.limits.max_seconds
            )));
        }

        Ok((question, options, time_limit))
    }
}
