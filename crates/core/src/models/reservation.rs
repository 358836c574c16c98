//! Reservation model and its status state machine

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::RoomId;
use crate::error::CancellationError;
use crate::identity::NationalId;

/// Store-assigned reservation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reservation lifecycle status
///
/// `Active` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Holds the room for its window
    Active,
    /// Ended, either by elapsed time or by an administrator
    Finished,
    /// Withdrawn by the holder
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Finished => "finished",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationStatus::Active),
            "finished" => Some(ReservationStatus::Finished),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            ReservationStatus::Active => false,
            ReservationStatus::Finished | ReservationStatus::Cancelled => true,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Active, ReservationStatus::Finished)
                | (ReservationStatus::Active, ReservationStatus::Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room reservation held by one national ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub identity: NationalId,
    pub holder_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    /// Active and holding the room at `at` (both window ends included)
    pub fn occupies(&self, at: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.start <= at && at <= self.end
    }

    /// Active and not yet elapsed relative to `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.end >= now
    }

    /// Active and intersecting the half-open window `[start, end)`
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.start < end && start < self.end
    }

    /// Status as observed at `now`; elapsed active reservations read as finished
    pub fn effective_status(&self, now: DateTime<Utc>) -> ReservationStatus {
        match self.status {
            ReservationStatus::Active if self.end < now => ReservationStatus::Finished,
            status => status,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Withdraw the reservation on behalf of its holder
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), CancellationError> {
        if self.end < now {
            return Err(CancellationError::AlreadyFinished {
                id: self.id,
                ended_at: self.end,
            });
        }

        match self.status {
            ReservationStatus::Cancelled => Err(CancellationError::AlreadyCancelled(self.id)),
            ReservationStatus::Finished => Err(CancellationError::AlreadyFinished {
                id: self.id,
                ended_at: self.end,
            }),
            ReservationStatus::Active => {
                self.status = ReservationStatus::Cancelled;
                Ok(())
            }
        }
    }

    /// Administrative termination at `now`.
    ///
    /// Returns `false` when nothing changed because the reservation was already
    /// in a terminal state. The window is only ever shortened, and a window that
    /// has not started yet keeps its bounds so `end > start` still holds.
    pub fn finish_early(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            ReservationStatus::Finished | ReservationStatus::Cancelled => false,
            ReservationStatus::Active => {
                if now > self.start && now < self.end {
                    self.end = now;
                }
                self.status = ReservationStatus::Finished;
                true
            }
        }
    }
}

/// A validated reservation that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub room_id: RoomId,
    pub identity: NationalId,
    pub holder_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewReservation {
    /// Attach the identifier assigned by a store. New reservations are always active.
    pub fn into_reservation(self, id: ReservationId) -> Reservation {
        Reservation {
            id,
            room_id: self.room_id,
            identity: self.identity,
            holder_name: self.holder_name,
            start: self.start,
            end: self.end,
            created_at: self.created_at,
            status: ReservationStatus::Active,
        }
    }
}
