//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use chrono::{DateTime, Utc};

use crate::models::{Reservation, ReservationStatus, Room};

/// Validate that a reservation's state is internally consistent
pub fn assert_reservation_invariants(reservation: &Reservation) {
    debug_assert!(
        reservation.end > reservation.start,
        "Reservation {} ends at {} which is not after its start {}",
        reservation.id,
        reservation.end,
        reservation.start
    );

    debug_assert!(
        !reservation.holder_name.trim().is_empty(),
        "Reservation {} has empty holder name",
        reservation.id
    );
}

/// Validate a status change against the state machine
pub fn assert_transition_valid(
    reservation: &Reservation,
    from: ReservationStatus,
    to: ReservationStatus,
) {
    debug_assert!(
        from == to || from.can_transition_to(to),
        "Reservation {} moved from {} to {}",
        reservation.id,
        from,
        to
    );
}

/// Validate that a freshly admitted reservation targets an enabled room
pub fn assert_admitted_into(room: &Room, reservation: &Reservation) {
    debug_assert!(
        room.enabled,
        "Reservation {} admitted into disabled room {}",
        reservation.id,
        room.name
    );

    debug_assert!(
        reservation.room_id == room.id,
        "Reservation {} belongs to {} but was admitted into {}",
        reservation.id,
        reservation.room_id,
        room.id
    );

    debug_assert!(
        reservation.status == ReservationStatus::Active,
        "Reservation {} admitted with status {}",
        reservation.id,
        reservation.status
    );
}

/// Validate that an identity holds at most one active reservation at `now`
pub fn assert_single_active_identity(reservations: &[Reservation], now: DateTime<Utc>) {
    let active = reservations.iter().filter(|r| r.is_active_at(now)).count();
    debug_assert!(
        active <= 1,
        "{} active reservations for one identity at {}",
        active,
        now
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use crate::models::{NewReservation, NewRoom, ReservationId, RoomId};
    use chrono::Duration;

    fn make_reservation(id: i64) -> Reservation {
        let now = Utc::now();
        NewReservation {
            room_id: RoomId(1),
            identity: identity::validate("11111111-1").unwrap(),
            holder_name: "Test User".to_string(),
            start: now,
            end: now + Duration::hours(2),
            created_at: now,
        }
        .into_reservation(ReservationId(id))
    }

    #[test]
    fn test_valid_reservation() {
        assert_reservation_invariants(&make_reservation(1));
    }

    #[test]
    fn test_valid_admission() {
        let room = NewRoom::new("Sala A", 4).into_room(RoomId(1), Utc::now());
        assert_admitted_into(&room, &make_reservation(1));
    }

    #[test]
    fn test_valid_transition() {
        let reservation = make_reservation(1);
        assert_transition_valid(
            &reservation,
            ReservationStatus::Active,
            ReservationStatus::Cancelled,
        );
    }

    #[test]
    #[should_panic(expected = "moved from cancelled to active")]
    fn test_reopening_cancelled_panics() {
        let reservation = make_reservation(1);
        assert_transition_valid(
            &reservation,
            ReservationStatus::Cancelled,
            ReservationStatus::Active,
        );
    }

    #[test]
    #[should_panic(expected = "active reservations for one identity")]
    fn test_two_active_panics() {
        let now = Utc::now();
        assert_single_active_identity(&[make_reservation(1), make_reservation(2)], now);
    }

    #[test]
    #[should_panic(expected = "is not after its start")]
    fn test_inverted_window_panics() {
        let mut reservation = make_reservation(1);
        reservation.end = reservation.start;
        assert_reservation_invariants(&reservation);
    }
}
