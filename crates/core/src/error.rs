//! Error types for Salas Core

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ReservationId, RoomId};

/// National ID validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid national ID format '{value}': {reason}")]
    InvalidFormat { value: String, reason: &'static str },

    #[error("Invalid national ID '{value}': check digit should be {expected}")]
    InvalidChecksum { value: String, expected: char },
}

/// Room administration failures
#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Room name must not be empty")]
    EmptyName,

    #[error("Room '{name}' must have a positive capacity")]
    InvalidCapacity { name: String },

    #[error("A room named '{0}' already exists")]
    DuplicateName(String),

    #[error("Room not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reasons an admission request is turned down
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Holder name must be between 1 and {max} characters")]
    InvalidHolderName { max: usize },

    #[error("Room {0} does not exist")]
    UnknownRoom(RoomId),

    #[error("Reservation must end after it starts ({start} .. {end})")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Reservation starting {start} falls outside the years 0000-9999")]
    WindowOutOfRange { start: DateTime<Utc> },

    #[error("Room '{room}' is not enabled for reservations")]
    RoomDisabled { room: String },

    #[error("{identity} already holds active reservation {existing}")]
    DuplicateActiveIdentity {
        identity: String,
        existing: ReservationId,
    },

    #[error("Room '{room}' is already reserved in that window by reservation {conflicting}")]
    RoomConflict {
        room: String,
        conflicting: ReservationId,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reasons a cancellation is refused
#[derive(Error, Debug)]
pub enum CancellationError {
    #[error("Reservation {0} not found")]
    NotFound(ReservationId),

    #[error("Reservation {id} already finished at {ended_at}")]
    AlreadyFinished {
        id: ReservationId,
        ended_at: DateTime<Utc>,
    },

    #[error("Reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures raised by the backing store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Crate-level error for callers that do not care which operation failed
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Cancellation(#[from] CancellationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
