//! Broadcast Dispatcher
//!
//! Fan-out of state-change events to every connected transport, plus
//! point-to-point delivery to a single participant. Delivery is
//! fire-and-forget through per-connection unbounded queues, so a slow or
//! dead socket never blocks the coordinator or the other recipients.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::ServerEvent;

/// Explicit role tag, declared by every connection when it joins. Roles are
/// never inferred by exclusion; any number of teachers may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

/// Outbound queue for one connection.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug)]
struct Connection {
    role: Role,
    participant_id: Option<Uuid>,
    sender: OutboundSender,
}

/// Registry of connected transports, keyed by connection ID.
#[derive(Debug, Default)]
pub struct Dispatcher {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection after it has declared its role.
    pub fn attach(&self, conn_id: Uuid, role: Role, sender: OutboundSender) {
        self.connections.write().insert(
            conn_id,
            Connection {
                role,
                participant_id: None,
                sender,
            },
        );
    }

    /// Bind a registered participant to a connection so point-to-point
    /// delivery can find it.
    pub fn bind_participant(&self, conn_id: &Uuid, participant_id: Uuid) {
        if let Some(conn) = self.connections.write().get_mut(conn_id) {
            conn.participant_id = Some(participant_id);
        }
    }

    /// Remove a connection; returns the bound participant, if any.
    pub fn detach(&self, conn_id: &Uuid) -> Option<Uuid> {
        self.connections
            .write()
            .remove(conn_id)
            .and_then(|c| c.participant_id)
    }

    pub fn role_of(&self, conn_id: &Uuid) -> Option<Role> {
        self.connections.read().get(conn_id).map(|c| c.role)
    }

    pub fn participant_of(&self, conn_id: &Uuid) -> Option<Uuid> {
        self.connections
            .read()
            .get(conn_id)
            .and_then(|c| c.participant_id)
    }

    pub fn is_attached(&self, conn_id: &Uuid) -> bool {
        self.connections.read().contains_key(conn_id)
    }

    /// Deliver to every connected transport. A failed individual delivery
    /// (receiver gone) is swallowed; the rest still receive.
    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.read();
        for conn in connections.values() {
            let _ = conn.sender.send(event.clone());
        }
    }

    /// Point-to-point delivery to the connection bound to `participant_id`.
    /// A silent no-op if that participant is not currently connected, e.g. a
    /// kick racing a disconnect.
    pub fn send_to_participant(&self, participant_id: &Uuid, event: ServerEvent) {
        let connections = self.connections.read();
        for conn in connections.values() {
            if conn.participant_id.as_ref() == Some(participant_id) {
                let _ = conn.sender.send(event.clone());
            }
        }
    }
}
