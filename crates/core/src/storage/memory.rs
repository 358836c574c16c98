//! In-memory implementation of the storage traits
//!
//! Mirrors the SQLite schema rules: unique room names, cascade deletes and at
//! most one active reservation per identity.

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::traits::{ReservationRepository, RoomRepository, StoreResult, Transactional};
use crate::error::StorageError;
use crate::models::{
    NewReservation, NewRoom, Reservation, ReservationId, ReservationStatus, Room, RoomId,
};

#[derive(Debug, Clone, Default)]
struct State {
    rooms: BTreeMap<RoomId, Room>,
    reservations: BTreeMap<ReservationId, Reservation>,
    last_room_id: i64,
    last_reservation_id: i64,
}

/// Store backed by ordered maps; not shared across threads on its own
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn reservations_where<P>(&self, predicate: P) -> Vec<Reservation>
    where
        P: Fn(&Reservation) -> bool,
    {
        self.state
            .borrow()
            .reservations
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    fn check_room_name(state: &State, name: &str, except: Option<RoomId>) -> StoreResult<()> {
        let taken = state
            .rooms
            .values()
            .any(|r| r.name == name && Some(r.id) != except);
        if taken {
            return Err(StorageError::Constraint(format!(
                "UNIQUE constraint failed: rooms.name ({name})"
            )));
        }
        Ok(())
    }
}

impl RoomRepository for MemoryStore {
    fn create_room(&self, room: &NewRoom, created_at: DateTime<Utc>) -> StoreResult<Room> {
        let mut state = self.state.borrow_mut();
        Self::check_room_name(&state, &room.name, None)?;

        state.last_room_id += 1;
        let stored = room.clone().into_room(RoomId(state.last_room_id), created_at);
        state.rooms.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn find_room_by_id(&self, id: RoomId) -> StoreResult<Option<Room>> {
        Ok(self.state.borrow().rooms.get(&id).cloned())
    }

    fn find_room_by_name(&self, name: &str) -> StoreResult<Option<Room>> {
        Ok(self
            .state
            .borrow()
            .rooms
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    fn update_room(&self, room: &Room) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        Self::check_room_name(&state, &room.name, Some(room.id))?;
        if let Some(stored) = state.rooms.get_mut(&room.id) {
            stored.name = room.name.clone();
            stored.capacity = room.capacity;
            stored.description = room.description.clone();
            stored.enabled = room.enabled;
        }
        Ok(())
    }

    fn delete_room(&self, id: RoomId) -> StoreResult<u64> {
        let mut state = self.state.borrow_mut();
        if state.rooms.remove(&id).is_none() {
            return Ok(0);
        }
        let before = state.reservations.len();
        state.reservations.retain(|_, r| r.room_id != id);
        Ok((before - state.reservations.len()) as u64)
    }

    fn list_rooms(&self, enabled_only: bool) -> StoreResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .state
            .borrow()
            .rooms
            .values()
            .filter(|r| !enabled_only || r.enabled)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }
}

impl ReservationRepository for MemoryStore {
    fn find_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.state.borrow().reservations.get(&id).cloned())
    }

    fn find_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>> {
        let mut found =
            self.reservations_where(|r| r.identity.as_str() == identity && r.is_active_at(now));
        found.sort_by_key(|r| r.start);
        Ok(found.into_iter().next())
    }

    fn find_overlapping(
        &self,
        room: RoomId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        let mut found = self.reservations_where(|r| r.room_id == room && r.overlaps(start, end));
        found.sort_by_key(|r| r.start);
        Ok(found)
    }

    fn find_occupying(&self, room: RoomId, at: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        Ok(self.reservations_where(|r| r.room_id == room && r.occupies(at)))
    }

    fn insert_reservation(&self, reservation: &NewReservation) -> StoreResult<Reservation> {
        let mut state = self.state.borrow_mut();

        if !state.rooms.contains_key(&reservation.room_id) {
            return Err(StorageError::Constraint(format!(
                "FOREIGN KEY constraint failed: room {}",
                reservation.room_id
            )));
        }
        if reservation.end <= reservation.start {
            return Err(StorageError::Constraint(
                "CHECK constraint failed: end_at > start_at".to_string(),
            ));
        }
        let identity_taken = state.reservations.values().any(|r| {
            r.status == ReservationStatus::Active && r.identity == reservation.identity
        });
        if identity_taken {
            return Err(StorageError::Constraint(format!(
                "UNIQUE constraint failed: reservations.identity ({})",
                reservation.identity
            )));
        }

        state.last_reservation_id += 1;
        let stored = reservation
            .clone()
            .into_reservation(ReservationId(state.last_reservation_id));
        state.reservations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        if reservation.end <= reservation.start {
            return Err(StorageError::Constraint(
                "CHECK constraint failed: end_at > start_at".to_string(),
            ));
        }
        if let Some(stored) = self.state.borrow_mut().reservations.get_mut(&reservation.id) {
            stored.start = reservation.start;
            stored.end = reservation.end;
            stored.status = reservation.status;
        }
        Ok(())
    }

    fn finish_elapsed(&self, identity: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut changed = 0;
        for r in self.state.borrow_mut().reservations.values_mut() {
            if r.identity.as_str() == identity
                && r.status == ReservationStatus::Active
                && r.end < now
            {
                r.status = ReservationStatus::Finished;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn list_active_by_identity(
        &self,
        identity: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        let mut found =
            self.reservations_where(|r| r.identity.as_str() == identity && r.is_active_at(now));
        found.sort_by(|a, b| b.start.cmp(&a.start));
        Ok(found)
    }

    fn list_upcoming_for_room(
        &self,
        room: RoomId,
        from: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        let mut found = self.reservations_where(|r| r.room_id == room && r.is_active_at(from));
        found.sort_by_key(|r| r.start);
        Ok(found)
    }

    fn count_reservations(&self, now: DateTime<Utc>) -> StoreResult<(u64, u64)> {
        let state = self.state.borrow();
        let active = state.reservations.values().filter(|r| r.is_active_at(now)).count();
        Ok((state.reservations.len() as u64, active as u64))
    }
}

impl Transactional for MemoryStore {
    /// Snapshot the maps and restore them if `f` fails
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StorageError>,
    {
        let snapshot = self.state.borrow().clone();
        let result = f(self);
        if result.is_err() {
            *self.state.borrow_mut() = snapshot;
        }
        result
    }

    fn clear(&self) -> StoreResult<()> {
        let mut state = self.state.borrow_mut();
        state.rooms.clear();
        state.reservations.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    fn new_reservation(room: RoomId, rut: &str, start: u32) -> NewReservation {
        NewReservation {
            room_id: room,
            identity: identity::validate(rut).unwrap(),
            holder_name: "Test User".to_string(),
            start: at(start),
            end: at(start) + Duration::hours(2),
            created_at: at(start),
        }
    }

    #[test]
    fn test_mirrors_schema_constraints() {
        let store = MemoryStore::new();
        let room = store.create_room(&NewRoom::new("Sala A", 4), at(0)).unwrap();

        assert!(matches!(
            store.create_room(&NewRoom::new("Sala A", 2), at(0)),
            Err(StorageError::Constraint(_))
        ));
        assert!(matches!(
            store.insert_reservation(&new_reservation(RoomId(42), "11111111-1", 10)),
            Err(StorageError::Constraint(_))
        ));

        store
            .insert_reservation(&new_reservation(room.id, "11111111-1", 10))
            .unwrap();
        assert!(matches!(
            store.insert_reservation(&new_reservation(room.id, "11111111-1", 14)),
            Err(StorageError::Constraint(_))
        ));
    }

    #[test]
    fn test_delete_room_cascades() {
        let store = MemoryStore::new();
        let a = store.create_room(&NewRoom::new("Sala A", 4), at(0)).unwrap();
        let b = store.create_room(&NewRoom::new("Sala B", 4), at(0)).unwrap();
        store.insert_reservation(&new_reservation(a.id, "11111111-1", 10)).unwrap();
        let kept = store.insert_reservation(&new_reservation(b.id, "12345678-5", 10)).unwrap();

        assert_eq!(store.delete_room(a.id).unwrap(), 1);
        assert_eq!(store.find_reservation(kept.id).unwrap(), Some(kept));
        assert_eq!(store.delete_room(a.id).unwrap(), 0);
    }

    #[test]
    fn test_transaction_restores_snapshot() {
        let store = MemoryStore::new();
        let result: Result<(), StorageError> = store.transaction(|s| {
            s.create_room(&NewRoom::new("Sala A", 4), at(0))?;
            Err(StorageError::Poisoned)
        });

        assert!(result.is_err());
        assert!(store.list_rooms(false).unwrap().is_empty());
    }
}
