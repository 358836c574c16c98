//! Room model - a bookable study room

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Reservation;
use crate::error::RoomError;

/// Store-assigned room identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A study room that can be reserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Unique, human-facing identity of the room
    pub name: String,
    pub capacity: u32,
    pub description: Option<String>,
    /// Disabled rooms are never available and accept no reservations
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Whether the room can be used at `at`, given the room's reservations.
    ///
    /// Reservations belonging to other rooms are ignored. Both ends of a
    /// reservation window count as occupied.
    pub fn is_available(&self, reservations: &[Reservation], at: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }

        !reservations
            .iter()
            .any(|r| r.room_id == self.id && r.occupies(at))
    }

    /// Check the editable fields
    pub fn validate(&self) -> Result<(), RoomError> {
        check_fields(&self.name, self.capacity)
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (capacity {})", self.name, self.capacity)
    }
}

/// A room that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewRoom {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into().trim().to_string(),
            capacity,
            description: None,
            enabled: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), RoomError> {
        check_fields(&self.name, self.capacity)
    }

    /// Attach the identifier and creation time assigned by a store
    pub fn into_room(self, id: RoomId, created_at: DateTime<Utc>) -> Room {
        Room {
            id,
            name: self.name,
            capacity: self.capacity,
            description: self.description,
            enabled: self.enabled,
            created_at,
        }
    }
}

fn check_fields(name: &str, capacity: u32) -> Result<(), RoomError> {
    if name.trim().is_empty() {
        return Err(RoomError::EmptyName);
    }
    if capacity == 0 {
        return Err(RoomError::InvalidCapacity {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A room together with its availability at a given instant
#[derive(Debug, Clone, Serialize)]
pub struct RoomAvailability {
    pub room: Room,
    pub available: bool,
}
