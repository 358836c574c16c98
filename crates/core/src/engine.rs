//! Reservation admission and lifecycle engine
//!
//! The engine is the only component that creates reservations or changes
//! their status. Every store access happens behind one mutex, and admission
//! additionally runs inside a store transaction, so the duplicate-identity
//! and room-conflict checks cannot interleave with another insert.
//!
//! No operation reads the wall clock; callers pass `now`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::AdmissionPolicy;
use crate::error::{AdmissionError, CancellationError, Error, Result, RoomError, StorageError};
use crate::identity;
use crate::invariants;
use crate::models::{
    NewReservation, NewRoom, Reservation, ReservationId, Room, RoomAvailability, RoomId,
};
use crate::storage::{is_storable, Storage};

/// Longest holder name accepted at admission
pub const MAX_HOLDER_NAME: usize = 200;

/// A request to reserve a room
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    /// National ID as typed by the holder
    pub identity: String,
    pub holder_name: String,
    pub room: RoomId,
    /// Defaults to the admission instant
    pub start: Option<DateTime<Utc>>,
    /// Defaults to `start` plus the policy's default duration
    pub end: Option<DateTime<Utc>>,
}

impl AdmissionRequest {
    pub fn new(identity: impl Into<String>, holder_name: impl Into<String>, room: RoomId) -> Self {
        Self {
            identity: identity.into(),
            holder_name: holder_name.into(),
            room,
            start: None,
            end: None,
        }
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}

/// Counts shown on the administration summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub rooms_total: u64,
    pub rooms_enabled: u64,
    pub reservations_total: u64,
    pub reservations_active: u64,
}

impl Statistics {
    pub fn rooms_disabled(&self) -> u64 {
        self.rooms_total - self.rooms_enabled
    }

    pub fn reservations_ended(&self) -> u64 {
        self.reservations_total - self.reservations_active
    }
}

/// Gatekeeper for room availability and reservation state
pub struct ReservationEngine<S> {
    store: Mutex<S>,
    policy: AdmissionPolicy,
}

impl<S: Storage> ReservationEngine<S> {
    /// Create an engine with the default admission policy
    pub fn new(store: S) -> Self {
        Self::with_policy(store, AdmissionPolicy::default())
    }

    pub fn with_policy(store: S, policy: AdmissionPolicy) -> Self {
        Self {
            store: Mutex::new(store),
            policy,
        }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    fn store(&self) -> std::result::Result<MutexGuard<'_, S>, StorageError> {
        self.store.lock().map_err(|_| StorageError::Poisoned)
    }

    // ----- Rooms -----

    /// Register a new room
    #[instrument(skip(self, room), fields(room_name = %room.name))]
    pub fn create_room(
        &self,
        room: NewRoom,
        now: DateTime<Utc>,
    ) -> std::result::Result<Room, RoomError> {
        room.validate()?;
        let store = self.store()?;

        if store.find_room_by_name(&room.name)?.is_some() {
            return Err(RoomError::DuplicateName(room.name));
        }

        let created = store.create_room(&room, now).map_err(|e| match e {
            StorageError::Constraint(_) => RoomError::DuplicateName(room.name.clone()),
            other => RoomError::Storage(other),
        })?;
        info!(room_id = %created.id, capacity = created.capacity, "Room created");
        Ok(created)
    }

    /// Find a room by name
    pub fn find_room(&self, name: &str) -> std::result::Result<Option<Room>, StorageError> {
        self.store()?.find_room_by_name(name)
    }

    /// Find a room by name, failing when it does not exist
    pub fn room(&self, name: &str) -> std::result::Result<Room, RoomError> {
        self.find_room(name)?
            .ok_or_else(|| RoomError::NotFound(name.to_string()))
    }

    /// Save edits to a room's name, capacity, description or enabled flag
    #[instrument(skip(self, room), fields(room_id = %room.id))]
    pub fn update_room(&self, room: &Room) -> std::result::Result<(), RoomError> {
        room.validate()?;
        let store = self.store()?;

        if store.find_room_by_id(room.id)?.is_none() {
            return Err(RoomError::NotFound(room.id.to_string()));
        }
        if let Some(other) = store.find_room_by_name(&room.name)? {
            if other.id != room.id {
                return Err(RoomError::DuplicateName(room.name.clone()));
            }
        }

        store.update_room(room)?;
        info!(enabled = room.enabled, capacity = room.capacity, "Room updated");
        Ok(())
    }

    /// Enable or disable a room by name, leaving its other fields as stored
    #[instrument(skip(self))]
    pub fn set_room_enabled(
        &self,
        name: &str,
        enabled: bool,
    ) -> std::result::Result<Room, RoomError> {
        let store = self.store()?;
        let room = store.transaction(|store| {
            let mut room = store
                .find_room_by_name(name)?
                .ok_or_else(|| RoomError::NotFound(name.to_string()))?;
            room.enabled = enabled;
            store.update_room(&room)?;
            Ok::<_, RoomError>(room)
        })?;
        info!(room_id = %room.id, enabled, "Room availability changed");
        Ok(room)
    }

    /// Delete a room and every reservation it owns
    #[instrument(skip(self))]
    pub fn delete_room(&self, name: &str) -> std::result::Result<u64, RoomError> {
        let store = self.store()?;
        let room = store
            .find_room_by_name(name)?
            .ok_or_else(|| RoomError::NotFound(name.to_string()))?;

        let removed = store.delete_room(room.id)?;
        info!(room_id = %room.id, reservations_removed = removed, "Room deleted");
        Ok(removed)
    }

    /// List rooms ordered by name
    pub fn list_rooms(&self, enabled_only: bool) -> std::result::Result<Vec<Room>, StorageError> {
        self.store()?.list_rooms(enabled_only)
    }

    /// Every room with its availability at `now`
    pub fn room_overview(
        &self,
        enabled_only: bool,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<RoomAvailability>, StorageError> {
        let store = self.store()?;
        store
            .list_rooms(enabled_only)?
            .into_iter()
            .map(|room| {
                let occupying = store.find_occupying(room.id, now)?;
                let available = room.is_available(&occupying, now);
                Ok(RoomAvailability { room, available })
            })
            .collect()
    }

    /// A room's active reservations that have not ended by `now`, earliest first
    pub fn room_schedule(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<Reservation>, RoomError> {
        let store = self.store()?;
        let room = store
            .find_room_by_name(name)?
            .ok_or_else(|| RoomError::NotFound(name.to_string()))?;
        Ok(store.list_upcoming_for_room(room.id, now)?)
    }

    // ----- Availability -----

    /// Whether `room` is free at `at`.
    ///
    /// Disabled rooms are never available; otherwise the room is busy while an
    /// active reservation's closed window contains `at`.
    pub fn is_room_available(
        &self,
        room: &Room,
        at: DateTime<Utc>,
    ) -> std::result::Result<bool, StorageError> {
        if !room.enabled {
            return Ok(false);
        }
        let occupying = self.store()?.find_occupying(room.id, at)?;
        Ok(room.is_available(&occupying, at))
    }

    // ----- Admission -----

    /// Admit a reservation.
    ///
    /// Checks run in a fixed order and the first failure is returned: identity,
    /// holder name, interval, room enabled, duplicate identity, then (when the
    /// policy asks for it) same-room overlap. Nothing is written unless every
    /// check passes.
    #[instrument(skip(self, request), fields(room_id = %request.room))]
    pub fn admit(
        &self,
        request: AdmissionRequest,
        now: DateTime<Utc>,
    ) -> std::result::Result<Reservation, AdmissionError> {
        let result = self.try_admit(request, now);
        match &result {
            Ok(reservation) => info!(
                reservation_id = %reservation.id,
                identity = %reservation.identity,
                start = %reservation.start,
                end = %reservation.end,
                "Reservation admitted"
            ),
            Err(e) => debug!(error = %e, "Admission rejected"),
        }
        result
    }

    fn try_admit(
        &self,
        request: AdmissionRequest,
        now: DateTime<Utc>,
    ) -> std::result::Result<Reservation, AdmissionError> {
        let identity = identity::validate(&request.identity)?;

        let holder_name = request.holder_name.trim().to_string();
        if holder_name.is_empty() || holder_name.chars().count() > MAX_HOLDER_NAME {
            return Err(AdmissionError::InvalidHolderName {
                max: MAX_HOLDER_NAME,
            });
        }

        let start = request.start.unwrap_or(now);
        let end = match request.end {
            Some(end) => end,
            None => start
                .checked_add_signed(self.policy.default_duration())
                .ok_or(AdmissionError::WindowOutOfRange { start })?,
        };
        if end <= start {
            return Err(AdmissionError::InvalidInterval { start, end });
        }
        if !is_storable(&start) || !is_storable(&end) {
            return Err(AdmissionError::WindowOutOfRange { start });
        }

        let store = self.store()?;
        store.transaction(|store| {
            let room = store
                .find_room_by_id(request.room)?
                .ok_or(AdmissionError::UnknownRoom(request.room))?;

            if !room.enabled {
                return Err(AdmissionError::RoomDisabled { room: room.name });
            }

            let settled = store.finish_elapsed(identity.as_str(), now)?;
            if settled > 0 {
                debug!(settled, "Marked elapsed reservations as finished");
            }

            if let Some(existing) = store.find_active_by_identity(identity.as_str(), now)? {
                return Err(AdmissionError::DuplicateActiveIdentity {
                    identity: identity.to_string(),
                    existing: existing.id,
                });
            }

            if self.policy.enforce_room_exclusivity {
                if let Some(conflict) = store.find_overlapping(room.id, start, end)?.first() {
                    return Err(AdmissionError::RoomConflict {
                        room: room.name,
                        conflicting: conflict.id,
                    });
                }
            }

            let reservation = store.insert_reservation(&NewReservation {
                room_id: room.id,
                identity: identity.clone(),
                holder_name,
                start,
                end,
                created_at: now,
            })?;

            invariants::assert_reservation_invariants(&reservation);
            invariants::assert_admitted_into(&room, &reservation);
            Ok(reservation)
        })
    }

    // ----- Lifecycle -----

    /// Cancel a reservation on behalf of its holder
    #[instrument(skip(self))]
    pub fn cancel(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> std::result::Result<Reservation, CancellationError> {
        let store = self.store()?;
        let result = store.transaction(|store| {
            let mut reservation = store
                .find_reservation(id)?
                .ok_or(CancellationError::NotFound(id))?;

            let from = reservation.status;
            reservation.cancel(now)?;
            invariants::assert_transition_valid(&reservation, from, reservation.status);

            store.update_reservation(&reservation)?;
            Ok(reservation)
        });

        match &result {
            Ok(_) => info!("Reservation cancelled"),
            Err(e) => debug!(error = %e, "Cancellation refused"),
        }
        result
    }

    /// Administrative early termination.
    ///
    /// Marks an active reservation finished and moves its end to `now`.
    /// Reservations already finished or cancelled are returned unchanged.
    #[instrument(skip(self))]
    pub fn finish_early(&self, id: ReservationId, now: DateTime<Utc>) -> Result<Reservation> {
        let store = self.store()?;
        store.transaction(|store| {
            let mut reservation = store
                .find_reservation(id)?
                .ok_or_else(|| Error::NotFound(format!("reservation {id}")))?;

            let from = reservation.status;
            if reservation.finish_early(now) {
                invariants::assert_transition_valid(&reservation, from, reservation.status);
                invariants::assert_reservation_invariants(&reservation);
                store.update_reservation(&reservation)?;
                info!(end = %reservation.end, "Reservation finished early");
            } else {
                debug!(status = %reservation.status, "Reservation already terminal");
            }
            Ok(reservation)
        })
    }

    /// Find a reservation by id
    pub fn find_reservation(
        &self,
        id: ReservationId,
    ) -> std::result::Result<Option<Reservation>, StorageError> {
        self.store()?.find_reservation(id)
    }

    /// Active reservations held by an identity at `now`, newest start first.
    ///
    /// A valid identity is looked up in its canonical form. Anything else is
    /// only normalized, so a lookup with a mistyped check digit finds nothing.
    pub fn list_active_by_identity(
        &self,
        raw_identity: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<impl Iterator<Item = Reservation>, StorageError> {
        let key = identity::validate(raw_identity)
            .map(String::from)
            .unwrap_or_else(|_| identity::normalize(raw_identity));
        let reservations = self.store()?.list_active_by_identity(&key, now)?;
        invariants::assert_single_active_identity(&reservations, now);
        Ok(reservations.into_iter())
    }

    // ----- Administration -----

    /// Room and reservation counts at `now`
    pub fn statistics(&self, now: DateTime<Utc>) -> std::result::Result<Statistics, StorageError> {
        let store = self.store()?;
        let rooms = store.list_rooms(false)?;
        let (reservations_total, reservations_active) = store.count_reservations(now)?;

        Ok(Statistics {
            rooms_total: rooms.len() as u64,
            rooms_enabled: rooms.iter().filter(|r| r.enabled).count() as u64,
            reservations_total,
            reservations_active,
        })
    }

    /// Remove every room and reservation
    #[instrument(skip(self))]
    pub fn clear(&self) -> std::result::Result<(), StorageError> {
        self.store()?.clear()?;
        info!("All rooms and reservations removed");
        Ok(())
    }
}
