use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use scrawl_types::events::{AckStatus, ClientEvent, LeaveAck, Outbound, ServerEvent};
use scrawl_types::store::{MessageRecord, RoomStore, StoreError};

use crate::registry::Registry;

/// What the connection loop should do after an event was handled.
/// `Close` is reserved for fatal protocol violations; per-event store
/// failures never escalate to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Close,
}

/// Routes one inbound event to the store and to the right set of peers.
///
/// Shared across every connection task; holds the registry (fan-out
/// targets) and the durable store. The registry is authoritative for who
/// receives an event, the store for what survives a restart; the two
/// converge through join/leave, they are never updated transactionally.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    store: Arc<dyn RoomStore>,
}

impl Dispatcher {
    pub fn new(registry: Registry, store: Arc<dyn RoomStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one event from `conn_id` (authenticated as `user_id`).
    /// Store failures are logged and contained here; the only non-local
    /// outcome is `Disposition::Close` for a join of a nonexistent room.
    pub async fn dispatch(
        &self,
        conn_id: Uuid,
        user_id: &str,
        event: ClientEvent,
    ) -> Disposition {
        match event {
            ClientEvent::JoinRoom { room_id } => {
                self.join_room(conn_id, user_id, &room_id).await
            }
            ClientEvent::LeaveRoom { room_id } => {
                self.leave_room(conn_id, user_id, &room_id).await;
                Disposition::Continue
            }
            ClientEvent::Chat { room_id, id, message } => {
                self.chat(user_id, room_id, id, message).await;
                Disposition::Continue
            }
            ClientEvent::Eraser { room_id, id } => {
                self.eraser(user_id, room_id, id).await;
                Disposition::Continue
            }
            ClientEvent::Update { room_id, id, message } => {
                self.update(user_id, room_id, id, message).await;
                Disposition::Continue
            }
            ClientEvent::Clean { room_id } => {
                // Pure fan-out: peers clear their live view, persisted
                // messages stay (documented asymmetry with eraser).
                let event = ServerEvent::Clean { room_id: room_id.clone() };
                self.fan_out(&room_id, user_id, event).await;
                Disposition::Continue
            }
        }
    }

    /// Join is silent to peers. A join of a room the store has never seen
    /// is a protocol violation: the connection is closed without an error
    /// payload.
    async fn join_room(&self, conn_id: Uuid, user_id: &str, room_id: &str) -> Disposition {
        if room_id.is_empty() {
            return Disposition::Continue;
        }

        match self.store.find_room(room_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("{user_id} tried to join nonexistent room {room_id}, closing");
                return Disposition::Close;
            }
            Err(e) => {
                warn!("join_room({room_id}) store lookup failed: {e}");
                return Disposition::Continue;
            }
        }

        self.registry.add_room(conn_id, room_id).await;

        if let Err(e) = self.store.add_member(room_id, user_id).await {
            // In-memory join stands; durable membership converges on the
            // next successful join or leave.
            warn!("join_room({room_id}) membership write failed: {e}");
        }

        Disposition::Continue
    }

    /// The in-memory room set is pruned before the store is touched, so
    /// the sender stops receiving the room's events even when the durable
    /// update fails. Last member out tears the room and its messages down.
    async fn leave_room(&self, conn_id: Uuid, user_id: &str, room_id: &str) {
        self.registry.remove_room(conn_id, room_id).await;

        let status = match self.leave_durable(user_id, room_id).await {
            Ok(()) => AckStatus::Ok,
            Err(e) => {
                warn!("leave_room({room_id}) for {user_id} failed: {e}");
                AckStatus::Error
            }
        };

        self.registry
            .send_to(conn_id, Outbound::Ack(LeaveAck { status }))
            .await;
    }

    async fn leave_durable(&self, user_id: &str, room_id: &str) -> Result<(), StoreError> {
        let members = self.store.members(room_id).await?;
        let remaining: Vec<String> = members.into_iter().filter(|m| m != user_id).collect();

        if remaining.is_empty() {
            self.store.delete_room_messages(room_id).await?;
            self.store.delete_room(room_id).await?;
        } else {
            self.store.set_members(room_id, &remaining).await?;
        }

        Ok(())
    }

    /// Persist first, fan out on success. The sender gets no error on a
    /// failed write; the event just never reaches anyone.
    async fn chat(&self, user_id: &str, room_id: String, id: String, message: String) {
        let record = MessageRecord {
            id: id.clone(),
            room_id: room_id.clone(),
            user_id: user_id.to_string(),
            message: message.clone(),
        };

        if let Err(e) = self.store.create_message(&record).await {
            warn!("chat persist failed in {room_id}: {e}");
            return;
        }

        let event = ServerEvent::Chat { id, message, room_id: room_id.clone() };
        self.fan_out(&room_id, user_id, event).await;
    }

    /// Idempotent: fanning out only when a row was actually removed means
    /// a repeated eraser for the same element is invisible to peers.
    async fn eraser(&self, user_id: &str, room_id: String, id: String) {
        match self.store.delete_message(&id, &room_id).await {
            Ok(0) => {}
            Ok(_) => {
                let event = ServerEvent::Eraser { id, room_id: room_id.clone() };
                self.fan_out(&room_id, user_id, event).await;
            }
            Err(e) => {
                warn!("eraser({id}) in {room_id} failed: {e}");
            }
        }
    }

    /// Fans out on the attempted write without checking the element still
    /// exists; only an outright store failure suppresses the fan-out.
    async fn update(&self, user_id: &str, room_id: String, id: String, message: String) {
        if let Err(e) = self.store.update_message(&id, &room_id, &message).await {
            warn!("update({id}) in {room_id} failed: {e}");
            return;
        }

        let event = ServerEvent::Update { id, message, room_id: room_id.clone() };
        self.fan_out(&room_id, user_id, event).await;
    }

    async fn fan_out(&self, room_id: &str, author: &str, event: ServerEvent) {
        for tx in self.registry.members_of(room_id, author).await {
            // A closed channel is a connection mid-teardown; skip it.
            let _ = tx.send(Outbound::Event(event.clone()));
        }
    }
}
