use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A room as the store sees it. Membership lives in its own table and is
/// fetched separately via [`RoomStore::members`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub created_at: String,
}

/// A persisted chat line or drawing element. `id` is caller-supplied and
/// unique within `room_id`, not globally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub message: String,
}

/// Generic repository failure. The dispatcher never inspects the backend
/// detail; it only needs to tell "target is gone" from "backend broke".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    Missing(&'static str),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable store for rooms, room membership, and messages.
///
/// The broadcaster core only talks to this trait; the SQLite
/// implementation lives in scrawl-db and tests substitute an in-memory
/// mock. Every method may fail with a [`StoreError`] and callers are
/// expected to recover locally.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Look up a room by id. `Ok(None)` when it does not exist.
    async fn find_room(&self, room_id: &str) -> Result<Option<Room>, StoreError>;

    /// Durable member list of a room. Erroring with
    /// [`StoreError::Missing`] when the room itself is gone is part of
    /// the contract: leaving an already-deleted room must surface as a
    /// store failure, not an empty list.
    async fn members(&self, room_id: &str) -> Result<Vec<String>, StoreError>;

    /// Replace a room's durable member list.
    async fn set_members(&self, room_id: &str, members: &[String]) -> Result<(), StoreError>;

    /// Add a single user to a room's durable member list. Idempotent.
    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StoreError>;

    /// Delete a room. Its messages must already be gone.
    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError>;

    /// Persist a new message.
    async fn create_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Rewrite a message's content in place. Writing to a missing row is
    /// not an error.
    async fn update_message(
        &self,
        id: &str,
        room_id: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Delete the message matching `id` within `room_id`. Returns the
    /// number of rows actually removed (0 when already gone).
    async fn delete_message(&self, id: &str, room_id: &str) -> Result<u64, StoreError>;

    /// Delete every message belonging to a room.
    async fn delete_room_messages(&self, room_id: &str) -> Result<(), StoreError>;
}
