//! Storage repository traits
//!
//! These traits define the storage interface the reservation engine runs
//! against, allowing for different implementations (SQLite, in-memory).

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{NewReservation, NewRoom, Reservation, ReservationId, Room, RoomId};

pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// Room repository operations
pub trait RoomRepository {
    /// Store a new room, assigning its id
    fn create_room(&self, room: &NewRoom, created_at: DateTime<Utc>) -> StoreResult<Room>;

    /// Find room by ID
    fn find_room_by_id(&self, id: RoomId) -> StoreResult<Option<Room>>;

    /// Find room by its unique name
    fn find_room_by_name(&self, name: &str) -> StoreResult<Option<Room>>;

    /// Update the editable fields of a room
    fn update_room(&self, room: &Room) -> StoreResult<()>;

    /// Delete a room and its reservations, returning how many reservations went with it
    fn delete_room(&self, id: RoomId) -> StoreResult<u64>;

    /// List rooms ordered by name
    fn list_rooms(&self, enabled_only: bool) -> StoreResult<Vec<Room>>;
}

/// Reservation repository operations
pub trait ReservationRepository {
    /// Find reservation by ID
    fn find_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// The identity's active reservation with `end >= now`, if any
    fn find_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>>;

    /// Active reservations on `room` intersecting `[start, end)`
    fn find_overlapping(
        &self,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>>;

    /// Active reservations on `room` whose closed window contains `at`
    fn find_occupying(&self, room: RoomId, at: DateTime<Utc>) -> StoreResult<Vec<Reservation>>;

    /// Store a new active reservation, assigning its id
    fn insert_reservation(&self, reservation: &NewReservation) -> StoreResult<Reservation>;

    /// Persist status and window changes
    fn update_reservation(&self, reservation: &Reservation) -> StoreResult<()>;

    /// Mark the identity's elapsed active reservations as finished
    fn finish_elapsed(&self, identity: &str, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Active reservations for an identity with `end >= now`, newest start first
    fn list_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>>;

    /// Active reservations on a room with `end >= from`, earliest start first
    fn list_upcoming_for_room(
        &self,
        room: RoomId,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>>;

    /// Total number of reservations and how many are active at `now`
    fn count_reservations(&self, now: DateTime<Utc>) -> StoreResult<(u64, u64)>;
}

/// Atomic units of work
pub trait Transactional {
    /// Run `f` so that either all of its writes are kept or none are
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>;

    /// Remove every room and reservation
    fn clear(&self) -> StoreResult<()>;
}

/// Combined storage interface
///
/// Implementations may be backed by SQLite or kept in memory.
pub trait Storage: RoomRepository + ReservationRepository + Transactional {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: RoomRepository + ReservationRepository + Transactional {}
