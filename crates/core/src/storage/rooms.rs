//! Room storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use super::parse::{format_datetime, map_constraint, parse_count, parse_datetime};
use super::traits::StoreResult;
use crate::models::{NewRoom, Room, RoomId};

const ROOM_COLUMNS: &str = "id, name, capacity, description, enabled, created_at";

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: RoomId(row.get(0)?),
        name: row.get(1)?,
        capacity: parse_count(row.get(2)?)?,
        description: row.get(3)?,
        enabled: row.get::<_, i32>(4)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(5)?)?,
    })
}

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new room
    #[instrument(skip(self, room), fields(room_name = %room.name))]
    pub fn create(&self, room: &NewRoom, created_at: DateTime<Utc>) -> StoreResult<Room> {
        self.conn
            .execute(
                "INSERT INTO rooms (name, capacity, description, enabled, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    room.name,
                    room.capacity,
                    room.description,
                    room.enabled as i32,
                    format_datetime(&created_at),
                ],
            )
            .map_err(map_constraint)?;

        let id = RoomId(self.conn.last_insert_rowid());
        Ok(room.clone().into_room(id, created_at))
    }

    /// Find room by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: RoomId) -> StoreResult<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                params![id.0],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// Find room by name
    #[instrument(skip(self))]
    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<Room>> {
        let room = self
            .conn
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE name = ?1"),
                params![name],
                room_from_row,
            )
            .optional()?;
        Ok(room)
    }

    /// Update room
    #[instrument(skip(self, room), fields(room_id = %room.id))]
    pub fn update(&self, room: &Room) -> StoreResult<()> {
        self.conn
            .execute(
                "UPDATE rooms SET name = ?1, capacity = ?2, description = ?3, enabled = ?4
                 WHERE id = ?5",
                params![
                    room.name,
                    room.capacity,
                    room.description,
                    room.enabled as i32,
                    room.id.0,
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    /// Delete room; reservations go with it through the foreign key cascade
    #[instrument(skip(self))]
    pub fn delete(&self, id: RoomId) -> StoreResult<u64> {
        let owned: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reservations WHERE room_id = ?1",
            params![id.0],
            |row| row.get(0),
        )?;
        self.conn
            .execute("DELETE FROM rooms WHERE id = ?1", params![id.0])?;
        Ok(owned.max(0) as u64)
    }

    /// List rooms ordered by name
    #[instrument(skip(self))]
    pub fn list(&self, enabled_only: bool) -> StoreResult<Vec<Room>> {
        let sql = if enabled_only {
            format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE enabled = 1 ORDER BY name")
        } else {
            format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY name")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rooms = stmt
            .query_map([], room_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::Database;

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let store = db.rooms();

        let created = store
            .create(&NewRoom::new("Sala A", 4).with_description("Silenciosa"), Utc::now())
            .unwrap();

        let by_id = store.find_by_id(created.id).unwrap().unwrap();
        let by_name = store.find_by_name("Sala A").unwrap().unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_name, created);
        assert!(store.find_by_name("Sala Z").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_name_is_constraint() {
        let db = Database::open_in_memory().unwrap();
        let store = db.rooms();
        store.create(&NewRoom::new("Sala A", 4), Utc::now()).unwrap();

        let err = store
            .create(&NewRoom::new("Sala A", 8), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[test]
    fn test_list_ordered_and_filtered() {
        let db = Database::open_in_memory().unwrap();
        let store = db.rooms();
        store.create(&NewRoom::new("Sala C", 6), Utc::now()).unwrap();
        store
            .create(&NewRoom::new("Sala B", 8).disabled(), Utc::now())
            .unwrap();
        store.create(&NewRoom::new("Sala A", 4), Utc::now()).unwrap();

        let all: Vec<_> = store.list(false).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(all, ["Sala A", "Sala B", "Sala C"]);

        let enabled: Vec<_> = store.list(true).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(enabled, ["Sala A", "Sala C"]);
    }

    #[test]
    fn test_update() {
        let db = Database::open_in_memory().unwrap();
        let store = db.rooms();
        let mut room = store.create(&NewRoom::new("Sala A", 4), Utc::now()).unwrap();

        room.capacity = 10;
        room.enabled = false;
        store.update(&room).unwrap();

        let stored = store.find_by_id(room.id).unwrap().unwrap();
        assert_eq!(stored.capacity, 10);
        assert!(!stored.enabled);
    }
}
