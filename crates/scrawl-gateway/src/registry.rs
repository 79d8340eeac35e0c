use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use scrawl_types::events::Outbound;

/// One live, authenticated connection. The user id is set once at
/// registration; the room set mutates as join/leave events arrive.
struct ConnEntry {
    user_id: String,
    rooms: HashSet<String>,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// In-memory index of live connections and the rooms they have joined.
///
/// Authoritative for fan-out targeting; owns no durable data and is
/// rebuilt empty on process restart (clients re-handshake). Cloneable
/// handle over shared state so each connection task and the event
/// dispatcher see the same index.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<Uuid, ConnEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly authenticated connection with an empty room set.
    /// Returns the connection id and the receiving end of its outbound
    /// channel; the connection's send task drains it into the socket.
    pub async fn register(&self, user_id: String) -> (Uuid, mpsc::UnboundedReceiver<Outbound>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.insert(
            conn_id,
            ConnEntry {
                user_id,
                rooms: HashSet::new(),
                tx,
            },
        );
        (conn_id, rx)
    }

    /// Remove a connection unconditionally. Safe to call at any time,
    /// including while one of its events is still being dispatched; the
    /// connection simply stops being a fan-out target.
    pub async fn deregister(&self, conn_id: Uuid) {
        self.inner.write().await.remove(&conn_id);
    }

    pub async fn add_room(&self, conn_id: Uuid, room_id: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(&conn_id) {
            entry.rooms.insert(room_id.to_string());
        }
    }

    pub async fn remove_room(&self, conn_id: Uuid, room_id: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(&conn_id) {
            entry.rooms.remove(room_id);
        }
    }

    /// Fan-out target set for a room: every registered connection that
    /// joined `room_id`, excluding all of the author's connections.
    /// Linear scan over the index; an id-to-connections index would trade
    /// memory for lookup cost if registries grow large.
    pub async fn members_of(
        &self,
        room_id: &str,
        excluding_user_id: &str,
    ) -> Vec<mpsc::UnboundedSender<Outbound>> {
        self.inner
            .read()
            .await
            .values()
            .filter(|entry| {
                entry.user_id != excluding_user_id && entry.rooms.contains(room_id)
            })
            .map(|entry| entry.tx.clone())
            .collect()
    }

    /// Targeted delivery to a single connection (leave acks). A dropped
    /// receiver means the connection is going away; the send error is
    /// deliberately ignored.
    pub async fn send_to(&self, conn_id: Uuid, outbound: Outbound) {
        if let Some(entry) = self.inner.read().await.get(&conn_id) {
            let _ = entry.tx.send(outbound);
        }
    }

    pub async fn rooms_of(&self, conn_id: Uuid) -> HashSet<String> {
        self.inner
            .read()
            .await
            .get(&conn_id)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_deregister() {
        let registry = Registry::new();
        assert_eq!(registry.connection_count().await, 0);

        let (conn, _rx) = registry.register("u1".into()).await;
        assert_eq!(registry.connection_count().await, 1);

        registry.deregister(conn).await;
        assert_eq!(registry.connection_count().await, 0);
        // second deregister is a no-op
        registry.deregister(conn).await;
    }

    #[tokio::test]
    async fn members_of_filters_by_room_and_author() {
        let registry = Registry::new();
        let (a, _rx_a) = registry.register("author".into()).await;
        let (peer, _rx_p) = registry.register("peer".into()).await;
        let (outsider, _rx_o) = registry.register("outsider".into()).await;

        registry.add_room(a, "r1").await;
        registry.add_room(peer, "r1").await;
        registry.add_room(outsider, "r2").await;

        let targets = registry.members_of("r1", "author").await;
        assert_eq!(targets.len(), 1);
    }

    #[tokio::test]
    async fn author_excluded_across_all_their_connections() {
        let registry = Registry::new();
        let (first, _rx1) = registry.register("u1".into()).await;
        let (second, _rx2) = registry.register("u1".into()).await;
        registry.add_room(first, "r1").await;
        registry.add_room(second, "r1").await;

        assert!(registry.members_of("r1", "u1").await.is_empty());
    }

    #[tokio::test]
    async fn remove_room_stops_targeting() {
        let registry = Registry::new();
        let (conn, _rx) = registry.register("u2".into()).await;
        registry.add_room(conn, "r1").await;
        assert_eq!(registry.members_of("r1", "u1").await.len(), 1);

        registry.remove_room(conn, "r1").await;
        assert!(registry.members_of("r1", "u1").await.is_empty());
        assert!(registry.rooms_of(conn).await.is_empty());
    }

    #[tokio::test]
    async fn deregister_removes_from_all_fan_out_targets() {
        let registry = Registry::new();
        let (conn, _rx) = registry.register("u2".into()).await;
        registry.add_room(conn, "r1").await;
        registry.add_room(conn, "r2").await;

        registry.deregister(conn).await;
        assert!(registry.members_of("r1", "u1").await.is_empty());
        assert!(registry.members_of("r2", "u1").await.is_empty());
    }

    #[tokio::test]
    async fn room_ops_on_unknown_connection_are_no_ops() {
        let registry = Registry::new();
        let ghost = Uuid::new_v4();
        registry.add_room(ghost, "r1").await;
        registry.remove_room(ghost, "r1").await;
        registry
            .send_to(
                ghost,
                Outbound::Event(scrawl_types::events::ServerEvent::Clean {
                    room_id: "r1".into(),
                }),
            )
            .await;
        assert_eq!(registry.connection_count().await, 0);
    }
}
