//! Reservation storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{instrument, warn};

use super::parse::{format_datetime, map_constraint, parse_datetime, parse_identity, parse_status};
use super::traits::StoreResult;
use crate::error::StorageError;
use crate::models::{NewReservation, Reservation, ReservationId, ReservationStatus, RoomId};

const RESERVATION_COLUMNS: &str =
    "id, room_id, identity, holder_name, start_at, end_at, created_at, status";

fn reservation_from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: ReservationId(row.get(0)?),
        room_id: RoomId(row.get(1)?),
        identity: parse_identity(row.get(2)?),
        holder_name: row.get(3)?,
        start: parse_datetime(&row.get::<_, String>(4)?)?,
        end: parse_datetime(&row.get::<_, String>(5)?)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        status: parse_status(&row.get::<_, String>(7)?)?,
    })
}

pub struct ReservationStore<'a> {
    conn: &'a Connection,
}

impl<'a> ReservationStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query(
        &self,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Reservation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RESERVATION_COLUMNS} FROM reservations {filter}"))?;

        let reservations = stmt
            .query_map(params, reservation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(reservations)
    }

    /// Find reservation by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let reservation = self
            .conn
            .query_row(
                &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
                params![id.0],
                reservation_from_row,
            )
            .optional()?;
        Ok(reservation)
    }

    /// Find the identity's active, not yet elapsed reservation
    #[instrument(skip(self))]
    pub fn find_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>> {
        let mut found = self.query(
            "WHERE identity = ?1 AND status = 'active' AND end_at >= ?2
             ORDER BY start_at LIMIT 1",
            params![identity, format_datetime(&now)],
        )?;
        Ok(found.pop())
    }

    /// Active reservations on a room intersecting `[start, end)`
    #[instrument(skip(self))]
    pub fn find_overlapping(
        &self,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.query(
            "WHERE room_id = ?1 AND status = 'active' AND start_at < ?3 AND ?2 < end_at
             ORDER BY start_at",
            params![room.0, format_datetime(&start), format_datetime(&end)],
        )
    }

    /// Active reservations on a room whose window contains `at`
    #[instrument(skip(self))]
    pub fn find_occupying(&self, room: RoomId, at: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        self.query(
            "WHERE room_id = ?1 AND status = 'active' AND start_at <= ?2 AND end_at >= ?2",
            params![room.0, format_datetime(&at)],
        )
    }

    /// Insert a new active reservation
    #[instrument(skip(self, reservation), fields(room_id = %reservation.room_id, identity = %reservation.identity))]
    pub fn insert(&self, reservation: &NewReservation) -> StoreResult<Reservation> {
        self.conn
            .execute(
                "INSERT INTO reservations (room_id, identity, holder_name, start_at, end_at, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    reservation.room_id.0,
                    reservation.identity.as_str(),
                    reservation.holder_name,
                    format_datetime(&reservation.start),
                    format_datetime(&reservation.end),
                    format_datetime(&reservation.created_at),
                    ReservationStatus::Active.as_str(),
                ],
            )
            .map_err(|e| {
                let err = map_constraint(e);
                if let StorageError::Constraint(ref message) = err {
                    warn!(%message, "Reservation insert rejected by the database");
                }
                err
            })?;

        let id = ReservationId(self.conn.last_insert_rowid());
        Ok(reservation.clone().into_reservation(id))
    }

    /// Persist status and window changes
    #[instrument(skip(self, reservation), fields(reservation_id = %reservation.id, status = %reservation.status))]
    pub fn update(&self, reservation: &Reservation) -> StoreResult<()> {
        self.conn
            .execute(
                "UPDATE reservations SET start_at = ?1, end_at = ?2, status = ?3 WHERE id = ?4",
                params![
                    format_datetime(&reservation.start),
                    format_datetime(&reservation.end),
                    reservation.status.as_str(),
                    reservation.id.0,
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    /// Mark elapsed active reservations of an identity as finished
    #[instrument(skip(self))]
    pub fn finish_elapsed(&self, identity: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let changed = self.conn.execute(
            "UPDATE reservations SET status = 'finished'
             WHERE identity = ?1 AND status = 'active' AND end_at < ?2",
            params![identity, format_datetime(&now)],
        )?;
        Ok(changed as u64)
    }

    /// Active reservations for an identity, newest start first
    #[instrument(skip(self))]
    pub fn list_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.query(
            "WHERE identity = ?1 AND status = 'active' AND end_at >= ?2
             ORDER BY start_at DESC",
            params![identity, format_datetime(&now)],
        )
    }

    /// Active reservations on a room that have not ended by `from`
    #[instrument(skip(self))]
    pub fn list_upcoming_for_room(
        &self,
        room: RoomId,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        self.query(
            "WHERE room_id = ?1 AND status = 'active' AND end_at >= ?2
             ORDER BY start_at",
            params![room.0, format_datetime(&from)],
        )
    }

    /// Count all reservations and the active ones that have not elapsed at `now`
    #[instrument(skip(self))]
    pub fn count(&self, now: DateTime<Utc>) -> StoreResult<(u64, u64)> {
        let (total, active): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'active' AND end_at >= ?1 THEN 1 ELSE 0 END), 0)
             FROM reservations",
            params![format_datetime(&now)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((total.max(0) as u64, active.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::models::NewRoom;
    use crate::storage::Database;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn setup() -> (Database, RoomId) {
        let db = Database::open_in_memory().unwrap();
        let room = db.rooms().create(&NewRoom::new("Sala A", 4), at(0)).unwrap();
        (db, room.id)
    }

    fn new_reservation(room: RoomId, rut: &str, start: u32, end: u32) -> NewReservation {
        NewReservation {
            room_id: room,
            identity: identity::validate(rut).unwrap(),
            holder_name: "Test User".to_string(),
            start: at(start),
            end: at(end),
            created_at: at(start),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let (db, room) = setup();
        let store = db.reservations();

        let inserted = store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();
        assert_eq!(inserted.status, ReservationStatus::Active);

        let found = store.find_by_id(inserted.id).unwrap().unwrap();
        assert_eq!(found, inserted);
        assert!(store.find_by_id(ReservationId(999)).unwrap().is_none());
    }

    #[test]
    fn test_find_active_by_identity_respects_now() {
        let (db, room) = setup();
        let store = db.reservations();
        store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();

        assert!(store.find_active_by_identity("11111111-1", at(11)).unwrap().is_some());
        assert!(store.find_active_by_identity("11111111-1", at(12)).unwrap().is_some());
        assert!(store.find_active_by_identity("11111111-1", at(13)).unwrap().is_none());
        assert!(store.find_active_by_identity("12345678-5", at(11)).unwrap().is_none());
    }

    #[test]
    fn test_overlap_and_occupancy_queries() {
        let (db, room) = setup();
        let store = db.reservations();
        store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();

        assert_eq!(store.find_overlapping(room, at(11), at(13)).unwrap().len(), 1);
        assert!(store.find_overlapping(room, at(12), at(14)).unwrap().is_empty());
        assert!(store.find_overlapping(room, at(8), at(10)).unwrap().is_empty());

        assert_eq!(store.find_occupying(room, at(10)).unwrap().len(), 1);
        assert_eq!(store.find_occupying(room, at(12)).unwrap().len(), 1);
        assert!(store
            .find_occupying(room, at(12) + Duration::nanoseconds(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unique_active_identity_index() {
        let (db, room) = setup();
        let store = db.reservations();
        store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();

        let err = store
            .insert(&new_reservation(room, "11111111-1", 14, 16))
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
    }

    #[test]
    fn test_finish_elapsed_frees_identity() {
        let (db, room) = setup();
        let store = db.reservations();
        let first = store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();

        assert_eq!(store.finish_elapsed("11111111-1", at(11)).unwrap(), 0);
        assert_eq!(store.finish_elapsed("11111111-1", at(13)).unwrap(), 1);

        let stored = store.find_by_id(first.id).unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Finished);
        store.insert(&new_reservation(room, "11111111-1", 14, 16)).unwrap();
    }

    #[test]
    fn test_update_status() {
        let (db, room) = setup();
        let store = db.reservations();
        let mut reservation = store.insert(&new_reservation(room, "11111111-1", 10, 12)).unwrap();

        reservation.cancel(at(9)).unwrap();
        store.update(&reservation).unwrap();

        let stored = store.find_by_id(reservation.id).unwrap().unwrap();
        assert_eq!(stored.status, ReservationStatus::Cancelled);
        assert!(store.find_active_by_identity("11111111-1", at(11)).unwrap().is_none());
    }

    #[test]
    fn test_listing_order() {
        let (db, room) = setup();
        let store = db.reservations();
        let mut early = store.insert(&new_reservation(room, "11111111-1", 8, 9)).unwrap();
        early.finish_early(at(9));
        store.update(&early).unwrap();
        store.insert(&new_reservation(room, "11111111-1", 14, 16)).unwrap();
        store.insert(&new_reservation(room, "12345678-5", 10, 12)).unwrap();

        let mine = store.list_active_by_identity("11111111-1", at(7)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].start, at(14));

        let schedule: Vec<_> = store
            .list_upcoming_for_room(room, at(7))
            .unwrap()
            .into_iter()
            .map(|r| r.start)
            .collect();
        assert_eq!(schedule, [at(10), at(14)]);

        assert_eq!(store.count(at(7)).unwrap(), (3, 2));
        assert_eq!(store.count(at(13)).unwrap(), (3, 1));
    }
}
