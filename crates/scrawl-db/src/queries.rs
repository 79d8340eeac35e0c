use crate::Database;
use anyhow::Result;
use rusqlite::Connection;
use scrawl_types::store::{MessageRecord, Room};

impl Database {
    // -- Rooms --

    /// Rooms are created outside the broadcaster core (seed scripts,
    /// admin tooling, tests); the gateway itself never creates one.
    pub fn create_room(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO rooms (id) VALUES (?1)", [id])?;
            Ok(())
        })
    }

    pub fn find_room(&self, id: &str) -> Result<Option<Room>> {
        self.with_conn(|conn| query_room(conn, id))
    }

    /// Deletes the room and its membership rows. The room's messages must
    /// already be gone (FK). Deleting a room that no longer exists is a
    /// no-op.
    pub fn delete_room(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM room_members WHERE room_id = ?1", [id])?;
            conn.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Membership --

    /// `Ok(None)` when the room itself does not exist, `Ok(Some(vec))`
    /// otherwise (possibly empty).
    pub fn room_member_list(&self, room_id: &str) -> Result<Option<Vec<String>>> {
        self.with_conn(|conn| {
            if query_room(conn, room_id)?.is_none() {
                return Ok(None);
            }
            let mut stmt =
                conn.prepare("SELECT user_id FROM room_members WHERE room_id = ?1")?;
            let members = stmt
                .query_map([room_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(Some(members))
        })
    }

    pub fn add_room_member(&self, room_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?1, ?2)",
                (room_id, user_id),
            )?;
            Ok(())
        })
    }

    pub fn set_room_members(&self, room_id: &str, members: &[String]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM room_members WHERE room_id = ?1", [room_id])?;
            let mut stmt = conn
                .prepare("INSERT INTO room_members (room_id, user_id) VALUES (?1, ?2)")?;
            for user_id in members {
                stmt.execute((room_id, user_id))?;
            }
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(&self, record: &MessageRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, user_id, message) VALUES (?1, ?2, ?3, ?4)",
                (
                    &record.id,
                    &record.room_id,
                    &record.user_id,
                    &record.message,
                ),
            )?;
            Ok(())
        })
    }

    /// Returns the number of rows rewritten (0 when the element is gone).
    pub fn update_message(&self, id: &str, room_id: &str, message: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET message = ?1 WHERE id = ?2 AND room_id = ?3",
                (message, id, room_id),
            )?;
            Ok(n)
        })
    }

    /// Returns the number of rows deleted.
    pub fn delete_message(&self, id: &str, room_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND room_id = ?2",
                (id, room_id),
            )?;
            Ok(n)
        })
    }

    pub fn delete_room_messages(&self, room_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE room_id = ?1", [room_id])?;
            Ok(n)
        })
    }

    pub fn room_messages(&self, room_id: &str) -> Result<Vec<MessageRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, user_id, message FROM messages
                 WHERE room_id = ?1
                 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([room_id], |row| {
                    Ok(MessageRecord {
                        id: row.get(0)?,
                        room_id: row.get(1)?,
                        user_id: row.get(2)?,
                        message: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_room(conn: &Connection, id: &str) -> Result<Option<Room>> {
    let mut stmt = conn.prepare("SELECT id, created_at FROM rooms WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(Room {
                id: row.get(0)?,
                created_at: row.get(1)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
