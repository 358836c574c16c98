//! Salas Core Library
//!
//! National ID validation, study room reservation admission, and storage for
//! the Salas reservation system.

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod invariants;
pub mod models;
pub mod seed;
pub mod storage;

pub use config::{AdmissionPolicy, Config};
pub use engine::{AdmissionRequest, ReservationEngine, Statistics};
pub use error::{
    AdmissionError, CancellationError, Error, IdentityError, Result, RoomError, StorageError,
};
pub use identity::NationalId;
pub use models::*;
pub use storage::{Database, MemoryStore, Storage};
