//! Polling Module
//!
//! Domain types for the live poll and the session state machine that
//! arbitrates its lifecycle.

pub mod session;
pub mod types;

pub use session::{SessionCoordinator, SessionError};
pub use types::{HistoryEntry, Poll, PollRequest, StatusSnapshot, Tally, VoteRecord};
