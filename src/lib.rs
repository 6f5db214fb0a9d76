//! pollroom library
//!
//! Real-time classroom polling coordinator: one authoritative live poll
//! shared by a teacher and many students, answer submissions racing a
//! deadline timer, and a single correct close decision whether the poll
//! ends by quorum, by the teacher, or by timeout.

pub mod broadcast;
pub mod config;
pub mod events;
pub mod history;
pub mod polls;
pub mod registry;
pub mod server;
pub mod timer;
