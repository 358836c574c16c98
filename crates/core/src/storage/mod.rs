//! Storage layer for Salas
//!
//! SQLite is the persistent backend; [`MemoryStore`] implements the same
//! traits without a database.

mod memory;
mod migrations;
mod parse;
mod reservations;
mod rooms;
mod traits;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use tracing::instrument;

use crate::error::StorageError;
use crate::models::{NewReservation, NewRoom, Reservation, ReservationId, Room, RoomId};

pub use memory::MemoryStore;
pub use parse::is_storable;
pub use reservations::ReservationStore;
pub use rooms::RoomStore;
pub use traits::{
    ReservationRepository, RoomRepository, Storage, StoreResult, Transactional,
};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    /// Enable foreign keys and bring the schema up to date
    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> StoreResult<u32> {
        migrations::get_current_version(&self.conn)
    }

    /// Get room store
    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    /// Get reservation store
    pub fn reservations(&self) -> ReservationStore<'_> {
        ReservationStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl RoomRepository for Database {
    fn create_room(&self, room: &NewRoom, created_at: DateTime<Utc>) -> StoreResult<Room> {
        self.rooms().create(room, created_at)
    }

    fn find_room_by_id(&self, id: RoomId) -> StoreResult<Option<Room>> {
        self.rooms().find_by_id(id)
    }

    fn find_room_by_name(&self, name: &str) -> StoreResult<Option<Room>> {
        self.rooms().find_by_name(name)
    }

    fn update_room(&self, room: &Room) -> StoreResult<()> {
        self.rooms().update(room)
    }

    fn delete_room(&self, id: RoomId) -> StoreResult<u64> {
        self.rooms().delete(id)
    }

    fn list_rooms(&self, enabled_only: bool) -> StoreResult<Vec<Room>> {
        self.rooms().list(enabled_only)
    }
}

impl ReservationRepository for Database {
    fn find_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        self.reservations().find_by_id(id)
    }

    fn find_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>> {
        self.reservations().find_active_by_identity(identity, now)
    }

    fn find_overlapping(
        &self,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.reservations().find_overlapping(room, start, end)
    }

    fn find_occupying(&self, room: RoomId, at: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        self.reservations().find_occupying(room, at)
    }

    fn insert_reservation(&self, reservation: &NewReservation) -> StoreResult<Reservation> {
        self.reservations().insert(reservation)
    }

    fn update_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        self.reservations().update(reservation)
    }

    fn finish_elapsed(&self, identity: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        self.reservations().finish_elapsed(identity, now)
    }

    fn list_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.reservations().list_active_by_identity(identity, now)
    }

    fn list_upcoming_for_room(
        &self,
        room: RoomId,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.reservations().list_upcoming_for_room(room, from)
    }

    fn count_reservations(&self, now: DateTime<Utc>) -> StoreResult<(u64, u64)> {
        self.reservations().count(now)
    }
}

impl Transactional for Database {
    /// Runs `f` inside `BEGIN IMMEDIATE`, so other connections to the same file
    /// cannot write between our reads and our insert.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;
        // Dropping `tx` on the error path rolls back
        let value = f(self)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }

    fn clear(&self) -> StoreResult<()> {
        self.conn
            .execute_batch("DELETE FROM reservations; DELETE FROM rooms;")?;
        Ok(())
    }
}
