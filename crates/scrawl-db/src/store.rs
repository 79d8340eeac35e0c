use async_trait::async_trait;

use scrawl_types::store::{MessageRecord, Room, RoomStore, StoreError};

use crate::Database;

fn backend(e: anyhow::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// SQLite-backed [`RoomStore`]. The queries are synchronous behind the
/// connection mutex; they are short enough that suspending the calling
/// event while they run is the intended behavior.
#[async_trait]
impl RoomStore for Database {
    async fn find_room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        Database::find_room(self, room_id).map_err(backend)
    }

    async fn members(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        self.room_member_list(room_id)
            .map_err(backend)?
            .ok_or(StoreError::Missing("room"))
    }

    async fn set_members(&self, room_id: &str, members: &[String]) -> Result<(), StoreError> {
        self.set_room_members(room_id, members).map_err(backend)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StoreError> {
        self.add_room_member(room_id, user_id).map_err(backend)
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError> {
        Database::delete_room(self, room_id).map_err(backend)
    }

    async fn create_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.insert_message(record).map_err(backend)
    }

    async fn update_message(
        &self,
        id: &str,
        room_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        Database::update_message(self, id, room_id, message)
            .map(|_| ())
            .map_err(backend)
    }

    async fn delete_message(&self, id: &str, room_id: &str) -> Result<u64, StoreError> {
        Database::delete_message(self, id, room_id)
            .map(|n| n as u64)
            .map_err(backend)
    }

    async fn delete_room_messages(&self, room_id: &str) -> Result<(), StoreError> {
        Database::delete_room_messages(self, room_id)
            .map(|_| ())
            .map_err(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_room(room_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_room(room_id).unwrap();
        db
    }

    /// Inherent query methods shadow the identically named trait methods,
    /// so the tests go through the trait object the dispatcher sees.
    fn store(db: &Database) -> &dyn RoomStore {
        db
    }

    fn record(id: &str, room_id: &str) -> MessageRecord {
        MessageRecord {
            id: id.into(),
            room_id: room_id.into(),
            user_id: "u1".into(),
            message: "hello".into(),
        }
    }

    #[tokio::test]
    async fn members_of_missing_room_is_a_missing_error() {
        let db = Database::open_in_memory().unwrap();
        let err = store(&db).members("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::Missing("room")));
    }

    #[tokio::test]
    async fn membership_add_and_set() {
        let db = db_with_room("r1");
        let store = store(&db);

        store.add_member("r1", "u1").await.unwrap();
        store.add_member("r1", "u2").await.unwrap();
        // idempotent
        store.add_member("r1", "u1").await.unwrap();

        let mut members = store.members("r1").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["u1".to_string(), "u2".to_string()]);

        store.set_members("r1", &["u2".to_string()]).await.unwrap();
        assert_eq!(store.members("r1").await.unwrap(), vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn delete_message_reports_row_count() {
        let db = db_with_room("r1");
        let store = store(&db);
        store.create_message(&record("m1", "r1")).await.unwrap();

        assert_eq!(store.delete_message("m1", "r1").await.unwrap(), 1);
        assert_eq!(store.delete_message("m1", "r1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn same_element_id_in_two_rooms() {
        let db = db_with_room("r1");
        db.create_room("r2").unwrap();
        let store = store(&db);

        store.create_message(&record("m1", "r1")).await.unwrap();
        store.create_message(&record("m1", "r2")).await.unwrap();

        assert_eq!(store.delete_message("m1", "r1").await.unwrap(), 1);
        assert_eq!(db.room_messages("r2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_message_is_not_an_error() {
        let db = db_with_room("r1");
        store(&db).update_message("ghost", "r1", "new").await.unwrap();
    }

    #[tokio::test]
    async fn room_teardown_removes_everything() {
        let db = db_with_room("r1");
        let store = store(&db);
        store.add_member("r1", "u1").await.unwrap();
        store.create_message(&record("m1", "r1")).await.unwrap();

        store.delete_room_messages("r1").await.unwrap();
        store.delete_room("r1").await.unwrap();

        assert!(store.find_room("r1").await.unwrap().is_none());
        assert!(matches!(
            store.members("r1").await.unwrap_err(),
            StoreError::Missing("room")
        ));
        assert!(db.room_messages("r1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_message_id_in_same_room_is_a_backend_error() {
        let db = db_with_room("r1");
        let store = store(&db);
        store.create_message(&record("m1", "r1")).await.unwrap();
        let err = store.create_message(&record("m1", "r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
