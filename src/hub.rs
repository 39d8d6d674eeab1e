use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// per-client outbound buffer; a client this far behind is dropped
pub const OUTBOUND_BUFFER: usize = 32;

pub const EVENT_REGISTER: &str = "register";
pub const EVENT_FILE_COMPLETED: &str = "file:completed";
pub const EVENT_FILE_ADDED: &str = "file:added";

/// wire format for live events: {"e": <name>, "p": <payload>}
#[derive(Serialize, Debug, Clone)]
pub struct Event {
    pub e: String,
    pub p: serde_json::Value,
}

impl Event {
    pub fn new(name: &str, payload: impl Serialize) -> Self {
        Self {
            e: name.to_string(),
            p: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("client {0} is not registered")]
    NotRegistered(Uuid),

    #[error("client {0} outbound buffer is full, client dropped")]
    BufferFull(Uuid),

    #[error("notification hub is not running")]
    Closed,
}

enum HubCommand {
    Register {
        id: Uuid,
        sender: mpsc::Sender<String>,
    },
    Unregister {
        id: Uuid,
    },
    Unicast {
        id: Uuid,
        event: Event,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Broadcast {
        event: Event,
    },
}

/// handle to the notification hub. the actual client registry lives inside a
/// single coordinator task and is only ever touched through these commands,
/// so no locking is needed anywhere in the hub.
#[derive(Clone)]
pub struct NotificationHub {
    tx: mpsc::Sender<HubCommand>,
}

impl NotificationHub {
    /// spawn the coordinator task and return a cloneable handle
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(coordinator(rx));
        Self { tx }
    }

    /// add a client and push its `register` event carrying the assigned id
    pub async fn register(&self, id: Uuid, sender: mpsc::Sender<String>) -> Result<(), HubError> {
        self.tx
            .send(HubCommand::Register { id, sender })
            .await
            .map_err(|_| HubError::Closed)
    }

    pub async fn unregister(&self, id: Uuid) -> Result<(), HubError> {
        self.tx
            .send(HubCommand::Unregister { id })
            .await
            .map_err(|_| HubError::Closed)
    }

    /// deliver an event to one client; reports whether it was enqueued
    pub async fn unicast(&self, id: Uuid, event: Event) -> Result<(), HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Unicast { id, event, reply })
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)?
    }

    /// deliver an event to every registered client, dropping the slow ones
    pub async fn broadcast(&self, event: Event) -> Result<(), HubError> {
        self.tx
            .send(HubCommand::Broadcast { event })
            .await
            .map_err(|_| HubError::Closed)
    }
}

async fn coordinator(mut rx: mpsc::Receiver<HubCommand>) {
    let mut clients: HashMap<Uuid, mpsc::Sender<String>> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            HubCommand::Register { id, sender } => {
                clients.insert(id, sender);
                tracing::debug!("Hub registered client {} ({} connected)", id, clients.len());

                // tell the client its own id right away
                let event = Event::new(EVENT_REGISTER, serde_json::json!({ "id": id }));
                if let Err(e) = deliver(&mut clients, id, event.to_frame()) {
                    tracing::warn!("Could not push register event to {}: {}", id, e);
                }
            }
            HubCommand::Unregister { id } => {
                if clients.remove(&id).is_some() {
                    tracing::debug!("Hub removed client {} ({} connected)", id, clients.len());
                }
            }
            HubCommand::Unicast { id, event, reply } => {
                let result = deliver(&mut clients, id, event.to_frame());
                let _ = reply.send(result);
            }
            HubCommand::Broadcast { event } => {
                let frame = event.to_frame();
                let ids: Vec<Uuid> = clients.keys().copied().collect();
                for id in ids {
                    if let Err(e) = deliver(&mut clients, id, frame.clone()) {
                        tracing::warn!("Broadcast to {} failed: {}", id, e);
                    }
                }
            }
        }
    }

    tracing::debug!("Notification hub coordinator stopped");
}

// enqueue one frame without ever blocking the coordinator. a full or closed
// outbound channel means the client is gone as far as the hub is concerned.
fn deliver(
    clients: &mut HashMap<Uuid, mpsc::Sender<String>>,
    id: Uuid,
    frame: String,
) -> Result<(), HubError> {
    let Some(sender) = clients.get(&id) else {
        return Err(HubError::NotRegistered(id));
    };

    match sender.try_send(frame) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            clients.remove(&id);
            tracing::warn!("📵 Dropping client {}: outbound buffer full", id);
            Err(HubError::BufferFull(id))
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            clients.remove(&id);
            Err(HubError::NotRegistered(id))
        }
    }
}
