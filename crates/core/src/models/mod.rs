//! Data models for Salas

mod reservation;
mod room;

pub use reservation::*;
pub use room::*;
