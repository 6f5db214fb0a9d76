//! WebSocket transport
//!
//! One connection per client. Inbound frames are `ClientEvent`s; outbound
//! delivery goes through a per-connection unbounded queue drained by a
//! dedicated send task, so a slow socket never backs up into the
//! coordinator.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::AppState;
use crate::broadcast::{OutboundSender, Role};
use crate::events::{ClientEvent, ServerEvent};
use crate::polls::PollRequest;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    debug!(%conn_id, "websocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Drain the outbound queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(%err, "failed to serialize outbound event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => handle_client_event(conn_id, event, &state, &tx),
                        Err(err) => {
                            debug!(%conn_id, %err, "unparseable client message");
                            let _ = tx.send(ServerEvent::Error {
                                message: format!("invalid message: {err}"),
                            });
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%conn_id, %err, "websocket error");
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    // Transport gone: drop presence. Votes already cast stay counted.
    if let Some(participant_id) = state.dispatcher.detach(&conn_id) {
        state.coordinator.leave(&participant_id);
    }
    send_task.abort();
    debug!(%conn_id, "websocket closed");
}

fn handle_client_event(
    conn_id: Uuid,
    event: ClientEvent,
    state: &AppState,
    tx: &OutboundSender,
) {
    match event {
        ClientEvent::Join { name, role } => handle_join(conn_id, name, role, state, tx),
        ClientEvent::CreatePoll {
            question,
            options,
            time_limit_seconds,
        } => {
            if !require_role(conn_id, Role::Teacher, state, tx) {
                return;
            }
            let request = PollRequest {
                question,
                options,
                time_limit_seconds,
            };
            if let Err(err) = state.coordinator.create_poll(request) {
                reject(tx, err);
            }
        }
        ClientEvent::SubmitVote { option } => {
            let Some(participant_id) = state.dispatcher.participant_of(&conn_id) else {
                let _ = tx.send(ServerEvent::Error {
                    message: "join as a student before voting".to_string(),
                });
                return;
            };
            if let Err(err) = state.coordinator.submit_vote(&participant_id, &option) {
                reject(tx, err);
            }
        }
        ClientEvent::EndPoll => {
            if !require_role(conn_id, Role::Teacher, state, tx) {
                return;
            }
            if let Err(err) = state.coordinator.end_poll() {
                reject(tx, err);
            }
        }
        ClientEvent::RemoveParticipant { participant_id } => {
            if !require_role(conn_id, Role::Teacher, state, tx) {
                return;
            }
            if let Err(err) = state.coordinator.kick(&participant_id) {
                reject(tx, err);
            }
        }
        ClientEvent::ChatMessage { message } => {
            let Some(role) = state.dispatcher.role_of(&conn_id) else {
                let _ = tx.send(ServerEvent::Error {
                    message: "join before chatting".to_string(),
                });
                return;
            };
            let sender = match role {
                Role::Teacher => "Teacher".to_string(),
                Role::Student => state
                    .dispatcher
                    .participant_of(&conn_id)
                    .and_then(|id| state.coordinator.participant_name(&id))
                    .unwrap_or_else(|| "Student".to_string()),
            };
            state.dispatcher.broadcast(ServerEvent::ChatMessage {
                id: Uuid::new_v4(),
                sender,
                sender_role: role,
                message,
                timestamp: Utc::now(),
            });
        }
    }
}

fn handle_join(conn_id: Uuid, name: String, role: Role, state: &AppState, tx: &OutboundSender) {
    if state.dispatcher.is_attached(&conn_id) {
        let _ = tx.send(ServerEvent::Error {
            message: "already joined".to_string(),
        });
        return;
    }
    // Attach first so this connection sees its own join broadcasts.
    state.dispatcher.attach(conn_id, role, tx.clone());

    match role {
        Role::Student => {
            let (participant_id, snapshot) = state.coordinator.join(&name);
            state.dispatcher.bind_participant(&conn_id, participant_id);
            let _ = tx.send(ServerEvent::Joined { participant_id });
            if let Some(poll) = snapshot {
                let _ = tx.send(ServerEvent::PollStarted { poll });
            }
        }
        Role::Teacher => {
            // Teachers observe; they are not counted in the registry.
            if let Some(poll) = state.coordinator.status().active_poll {
                let _ = tx.send(ServerEvent::PollStarted { poll });
            }
        }
    }
}

fn require_role(conn_id: Uuid, required: Role, state: &AppState, tx: &OutboundSender) -> bool {
    if state.dispatcher.role_of(&conn_id) == Some(required) {
        return true;
    }
    let _ = tx.send(ServerEvent::Error {
        message: "not allowed for this connection".to_string(),
    });
    false
}

fn reject(tx: &OutboundSender, err: crate::polls::SessionError) {
    let _ = tx.send(ServerEvent::Error {
        message: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn app_state() -> AppState {
        AppState::new(&Config::default())
    }

    fn connection() -> (Uuid, OutboundSender, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Uuid::new_v4(), tx, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn join(
        state: &AppState,
        role: Role,
        name: &str,
    ) -> (Uuid, OutboundSender, UnboundedReceiver<ServerEvent>) {
        let (conn_id, tx, rx) = connection();
        handle_client_event(
            conn_id,
            ClientEvent::Join {
                name: name.to_string(),
                role,
            },
            state,
            &tx,
        );
        (conn_id, tx, rx)
    }

    fn create_poll_event() -> ClientEvent {
        ClientEvent::CreatePoll {
            question: "Q?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            time_limit_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_commands_before_join_are_rejected() {
        let state = app_state();
        let (conn_id, tx, mut rx) = connection();

        let commands = vec![
            create_poll_event(),
            ClientEvent::SubmitVote {
                option: "A".to_string(),
            },
            ClientEvent::EndPoll,
            ClientEvent::RemoveParticipant {
                participant_id: Uuid::new_v4(),
            },
            ClientEvent::ChatMessage {
                message: "hi".to_string(),
            },
        ];
        for command in commands {
            handle_client_event(conn_id, command, &state, &tx);
            let events = drain(&mut rx);
            assert_eq!(events.len(), 1);
            assert!(matches!(events[0], ServerEvent::Error { .. }));
        }

        // Nothing changed behind the rejections.
        let status = state.coordinator.status();
        assert!(status.can_create_new_poll);
        assert_eq!(status.participant_count, 0);
        assert!(state.coordinator.history().is_empty());
    }

    #[tokio::test]
    async fn test_student_cannot_run_teacher_commands() {
        let state = app_state();
        let (student_conn, tx, mut rx) = join(&state, Role::Student, "Ada");
        let (_, _grace_tx, _grace_rx) = join(&state, Role::Student, "Grace");
        drain(&mut rx);

        for command in [
            create_poll_event(),
            ClientEvent::EndPoll,
            ClientEvent::RemoveParticipant {
                participant_id: Uuid::new_v4(),
            },
        ] {
            handle_client_event(student_conn, command, &state, &tx);
            let events = drain(&mut rx);
            assert_eq!(events.len(), 1);
            assert!(matches!(events[0], ServerEvent::Error { .. }));
        }

        let status = state.coordinator.status();
        assert!(status.can_create_new_poll);
        assert_eq!(status.participant_count, 2);
    }

    #[tokio::test]
    async fn test_teacher_drives_poll_over_events() {
        let state = app_state();
        let (teacher_conn, teacher_tx, mut teacher_rx) = join(&state, Role::Teacher, "Ms. H");
        let (student_conn, student_tx, mut student_rx) = join(&state, Role::Student, "Ada");
        drain(&mut teacher_rx);
        drain(&mut student_rx);

        handle_client_event(teacher_conn, create_poll_event(), &state, &teacher_tx);
        assert!(drain(&mut student_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::PollStarted { .. })));

        handle_client_event(
            student_conn,
            ClientEvent::SubmitVote {
                option: "A".to_string(),
            },
            &state,
            &student_tx,
        );

        // The lone student's vote completed the quorum.
        assert!(drain(&mut teacher_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::PollEnded { .. })));
        assert_eq!(state.coordinator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_vote_needs_a_bound_participant() {
        let state = app_state();
        let (teacher_conn, teacher_tx, mut teacher_rx) = join(&state, Role::Teacher, "Ms. H");
        let (_, _ada_tx, _ada_rx) = join(&state, Role::Student, "Ada");
        drain(&mut teacher_rx);

        handle_client_event(teacher_conn, create_poll_event(), &state, &teacher_tx);
        drain(&mut teacher_rx);

        // A teacher connection has no registry entry to vote as.
        handle_client_event(
            teacher_conn,
            ClientEvent::SubmitVote {
                option: "A".to_string(),
            },
            &state,
            &teacher_tx,
        );
        let events = drain(&mut teacher_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Error { .. }));
        assert!(!state.coordinator.status().can_create_new_poll);
    }

    #[tokio::test]
    async fn test_chat_relay_resolves_sender_names() {
        let state = app_state();
        let (student_conn, student_tx, mut student_rx) = join(&state, Role::Student, "Ada");
        let (teacher_conn, teacher_tx, mut teacher_rx) = join(&state, Role::Teacher, "Ms. H");
        drain(&mut student_rx);
        drain(&mut teacher_rx);

        handle_client_event(
            student_conn,
            ClientEvent::ChatMessage {
                message: "hello".to_string(),
            },
            &state,
            &student_tx,
        );
        let events = drain(&mut teacher_rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::ChatMessage {
                sender,
                sender_role,
                message,
                ..
            } => {
                assert_eq!(sender, "Ada");
                assert_eq!(*sender_role, Role::Student);
                assert_eq!(message, "hello");
            }
            other => panic!("expected chatMessage, got {other:?}"),
        }

        handle_client_event(
            teacher_conn,
            ClientEvent::ChatMessage {
                message: "settle down".to_string(),
            },
            &state,
            &teacher_tx,
        );
        let events = drain(&mut student_rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::ChatMessage { sender, .. } if sender == "Teacher"
        )));
    }

    #[tokio::test]
    async fn test_double_join_is_rejected() {
        let state = app_state();
        let (conn_id, tx, mut rx) = join(&state, Role::Student, "Ada");
        drain(&mut rx);

        handle_client_event(
            conn_id,
            ClientEvent::Join {
                name: "Ada again".to_string(),
                role: Role::Teacher,
            },
            &state,
            &tx,
        );
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::Error { .. }));
        assert_eq!(state.coordinator.status().participant_count, 1);
    }
}
