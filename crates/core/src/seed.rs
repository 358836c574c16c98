//! Sample rooms and reservations for demos and manual testing

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::{AdmissionRequest, ReservationEngine};
use crate::error::{AdmissionError, Result, RoomError};
use crate::models::NewRoom;
use crate::storage::Storage;

/// Holders booked by [`load_sample_data`]
const SAMPLE_HOLDERS: [(&str, &str); 2] = [
    ("11111111-1", "Juan Pérez González"),
    ("22222222-2", "María López Silva"),
];

/// Outcome of a seeding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub rooms_created: usize,
    pub rooms_skipped: usize,
    pub reservations_created: usize,
    pub reservations_skipped: usize,
}

/// The five sample study rooms
pub fn sample_rooms() -> Vec<NewRoom> {
    vec![
        NewRoom::new("Sala A - Silenciosa", 4)
            .with_description("Sala tranquila ideal para estudio individual o en grupos pequeños."),
        NewRoom::new("Sala B - Grupal", 8)
            .with_description("Sala amplia equipada con pizarra para trabajo en equipo."),
        NewRoom::new("Sala C - Multimedia", 6)
            .with_description("Sala con proyector y computador para presentaciones."),
        NewRoom::new("Sala D - Conferencias", 12)
            .with_description("Sala grande ideal para reuniones y seminarios."),
        NewRoom::new("Sala E - Estudio", 2)
            .with_description("Sala pequeña para estudio individual o parejas."),
    ]
}

/// Create any sample room that does not exist yet
pub fn load_sample_rooms<S: Storage>(
    engine: &ReservationEngine<S>,
    now: DateTime<Utc>,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for room in sample_rooms() {
        match engine.create_room(room, now) {
            Ok(created) => {
                debug!(room = %created.name, "Sample room created");
                report.rooms_created += 1;
            }
            Err(RoomError::DuplicateName(name)) => {
                debug!(room = %name, "Sample room already exists");
                report.rooms_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        created = report.rooms_created,
        skipped = report.rooms_skipped,
        "Sample rooms loaded"
    );
    Ok(report)
}

/// Load the sample rooms, then book the sample holders starting at `now`.
///
/// Holders go into the first two enabled rooms by name. A holder who already
/// has an active reservation, or whose room is taken, is skipped.
pub fn load_sample_data<S: Storage>(
    engine: &ReservationEngine<S>,
    now: DateTime<Utc>,
) -> Result<SeedReport> {
    let mut report = load_sample_rooms(engine, now)?;
    let rooms = engine.list_rooms(true)?;

    for ((rut, name), room) in SAMPLE_HOLDERS.iter().zip(rooms.iter()) {
        match engine.admit(AdmissionRequest::new(*rut, *name, room.id), now) {
            Ok(_) => report.reservations_created += 1,
            Err(AdmissionError::DuplicateActiveIdentity { .. } | AdmissionError::RoomConflict { .. }) => {
                report.reservations_skipped += 1
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        created = report.reservations_created,
        skipped = report.reservations_skipped,
        "Sample reservations loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::storage::{Database, MemoryStore};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_sample_rooms_are_valid() {
        let rooms = sample_rooms();
        assert_eq!(rooms.len(), 5);
        for room in &rooms {
            room.validate().unwrap();
            assert!(room.enabled);
        }
        assert_eq!(rooms.iter().map(|r| r.capacity).sum::<u32>(), 32);
    }

    #[test]
    fn test_sample_holders_pass_validation() {
        for (rut, _) in SAMPLE_HOLDERS {
            identity::validate(rut).unwrap();
        }
    }

    #[test]
    fn test_load_sample_rooms_is_idempotent() {
        let engine = ReservationEngine::new(MemoryStore::new());
        engine
            .create_room(NewRoom::new("Sala B - Grupal", 3), now())
            .unwrap();

        let first = load_sample_rooms(&engine, now()).unwrap();
        assert_eq!(first.rooms_created, 4);
        assert_eq!(first.rooms_skipped, 1);
        // Existing rooms are left as they were
        assert_eq!(engine.room("Sala B - Grupal").unwrap().capacity, 3);

        let second = load_sample_rooms(&engine, now()).unwrap();
        assert_eq!(second.rooms_created, 0);
        assert_eq!(second.rooms_skipped, 5);
    }

    #[test]
    fn test_load_sample_data() {
        let engine = ReservationEngine::new(Database::open_in_memory().unwrap());

        let report = load_sample_data(&engine, now()).unwrap();
        assert_eq!(report.rooms_created, 5);
        assert_eq!(report.reservations_created, 2);

        let juan: Vec<_> = engine
            .list_active_by_identity("11111111-1", now())
            .unwrap()
            .collect();
        assert_eq!(juan.len(), 1);
        assert_eq!(juan[0].holder_name, "Juan Pérez González");
        let room_a = engine.room("Sala A - Silenciosa").unwrap();
        assert_eq!(juan[0].room_id, room_a.id);
        assert!(!engine.is_room_available(&room_a, now()).unwrap());

        let again = load_sample_data(&engine, now()).unwrap();
        assert_eq!(again.reservations_created, 0);
        assert_eq!(again.reservations_skipped, 2);
        assert_eq!(engine.statistics(now()).unwrap().reservations_total, 2);
    }
}
