//! Connection registry
//!
//! A single task owns the room -> participant mapping and serves register,
//! unregister and broadcast requests from its queues. Callers only ever hold a
//! [`HubHandle`], so membership is never touched from more than one task.

use std::collections::HashMap;

use helpdesk_shared::TicketId;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::events::ChatMessage;

/// Pending broadcasts the hub will queue before `broadcast` callers wait
const BROADCAST_QUEUE_CAPACITY: usize = 1024;

/// Identifies a participant within its room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub session_id: Uuid,
    pub room: TicketId,
}

/// A session as seen by the hub: its key plus the sending half of its mailbox.
///
/// The hub holds the only sender, so dropping it is what closes the mailbox.
#[derive(Debug)]
pub struct Participant {
    key: SessionKey,
    mailbox: mpsc::Sender<ChatMessage>,
}

impl Participant {
    /// Create a participant for `room` with a bounded mailbox of `capacity`
    pub fn new(room: TicketId, capacity: usize) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let participant = Self {
            key: SessionKey {
                session_id: Uuid::new_v4(),
                room,
            },
            mailbox: tx,
        };
        (participant, rx)
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }
}

/// Snapshot of hub membership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Rooms ever joined, including ones that are now empty
    pub rooms: usize,
    pub participants: usize,
}

/// Cloneable handle used to enqueue requests to the hub
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<Participant>,
    unregister_tx: mpsc::UnboundedSender<SessionKey>,
    broadcast_tx: mpsc::Sender<ChatMessage>,
    stats_tx: mpsc::UnboundedSender<oneshot::Sender<HubStats>>,
}

impl HubHandle {
    /// Add a participant to its room. Registering the same key twice is harmless.
    pub fn register(&self, participant: Participant) {
        if self.register_tx.send(participant).is_err() {
            tracing::warn!("Hub is not running, dropping register request");
        }
    }

    /// Remove a participant if present. Safe to call repeatedly.
    pub fn unregister(&self, key: SessionKey) {
        if self.unregister_tx.send(key).is_err() {
            tracing::debug!("Hub is not running, dropping unregister request");
        }
    }

    /// Fan a message out to everyone currently in `message.room`
    pub async fn broadcast(&self, message: ChatMessage) {
        if self.broadcast_tx.send(message).await.is_err() {
            tracing::warn!("Hub is not running, dropping broadcast");
        }
    }

    /// Membership counts, answered in queue order after earlier requests
    pub async fn stats(&self) -> Option<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.stats_tx.send(tx).ok()?;
        rx.await.ok()
    }
}

/// The registry event loop
pub struct Hub {
    rooms: HashMap<TicketId, HashMap<Uuid, mpsc::Sender<ChatMessage>>>,
    register_rx: mpsc::UnboundedReceiver<Participant>,
    unregister_rx: mpsc::UnboundedReceiver<SessionKey>,
    broadcast_rx: mpsc::Receiver<ChatMessage>,
    stats_rx: mpsc::UnboundedReceiver<oneshot::Sender<HubStats>>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_QUEUE_CAPACITY);
        let (stats_tx, stats_rx) = mpsc::unbounded_channel();

        let hub = Self {
            rooms: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            stats_rx,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            stats_tx,
        };
        (hub, handle)
    }

    /// Start the event loop on the current runtime
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Self::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Serve requests until every handle has been dropped
    pub async fn run(mut self) {
        tracing::info!("Chat hub started");
        loop {
            // Biased so a session's registration is always applied before
            // any broadcast it enqueued afterwards.
            tokio::select! {
                biased;

                Some(participant) = self.register_rx.recv() => self.handle_register(participant),
                Some(key) = self.unregister_rx.recv() => self.handle_unregister(key),
                Some(message) = self.broadcast_rx.recv() => self.handle_broadcast(message),
                Some(reply) = self.stats_rx.recv() => {
                    let _ = reply.send(self.stats());
                }
                else => break,
            }
        }
        tracing::info!("Chat hub stopped");
    }

    fn handle_register(&mut self, participant: Participant) {
        let key = participant.key;
        let room = self.rooms.entry(key.room).or_default();
        room.insert(key.session_id, participant.mailbox);

        tracing::debug!(
            ticket_id = %key.room,
            session_id = %key.session_id,
            room_size = room.len(),
            "Session joined ticket room"
        );
    }

    fn handle_unregister(&mut self, key: SessionKey) {
        let Some(room) = self.rooms.get_mut(&key.room) else {
            return;
        };
        // Removing the entry drops the only sender, closing the mailbox
        if room.remove(&key.session_id).is_some() {
            tracing::debug!(
                ticket_id = %key.room,
                session_id = %key.session_id,
                room_size = room.len(),
                "Session left ticket room"
            );
        }
    }

    fn handle_broadcast(&mut self, message: ChatMessage) {
        let Some(room) = self.rooms.get_mut(&message.room) else {
            tracing::debug!(ticket_id = %message.room, "No sessions in ticket room");
            return;
        };

        let mut delivered = 0usize;
        room.retain(|session_id, mailbox| match mailbox.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    ticket_id = %message.room,
                    session_id = %session_id,
                    "Mailbox full, evicting slow session"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    ticket_id = %message.room,
                    session_id = %session_id,
                    "Mailbox closed, evicting session"
                );
                false
            }
        });

        tracing::debug!(
            ticket_id = %message.room,
            recipients = delivered,
            room_size = room.len(),
            "Broadcast chat message"
        );
    }

    fn stats(&self) -> HubStats {
        HubStats {
            rooms: self.rooms.len(),
            participants: self.rooms.values().map(HashMap::len).sum(),
        }
    }
}
