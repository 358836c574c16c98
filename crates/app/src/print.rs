//! Terminal output, either human-readable lines or JSON documents

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use salas_core::{Reservation, Room, RoomAvailability, RoomId, Statistics};
use salas_core::seed::SeedReport;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct Printer {
    json: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print `value` as JSON, or hand it to `human` for plain output
    pub fn emit<T, F>(&self, value: &T, human: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T),
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}

pub fn room_overview(rooms: &[RoomAvailability]) {
    if rooms.is_empty() {
        println!("No rooms registered.");
        return;
    }
    for entry in rooms {
        let state = match (entry.room.enabled, entry.available) {
            (false, _) => "disabled",
            (true, true) => "available",
            (true, false) => "occupied",
        };
        println!(
            "{:<28} capacity {:>3}  {}",
            entry.room.name, entry.room.capacity, state
        );
    }
}

pub fn room(room: &Room, schedule: &[Reservation], now: DateTime<Utc>) {
    println!("{room}");
    if let Some(description) = &room.description {
        println!("  {description}");
    }
    println!("  created {}", room.created_at.format(TIME_FORMAT));
    if schedule.is_empty() {
        println!("  no upcoming reservations");
    }
    for reservation in schedule {
        println!("  {}", reservation_line(reservation, None, now));
    }
}

pub fn reservation(reservation: &Reservation, room_name: Option<&str>, now: DateTime<Utc>) {
    println!("{}", reservation_line(reservation, room_name, now));
}

pub fn reservations(list: &[Reservation], rooms: &HashMap<RoomId, String>, now: DateTime<Utc>) {
    if list.is_empty() {
        println!("No active reservations.");
        return;
    }
    for r in list {
        reservation(r, rooms.get(&r.room_id).map(String::as_str), now);
    }
}

fn reservation_line(r: &Reservation, room_name: Option<&str>, now: DateTime<Utc>) -> String {
    let room = room_name.map_or_else(|| r.room_id.to_string(), str::to_string);
    format!(
        "{}  {}  {} {}  {} - {}  {}",
        r.id,
        room,
        r.identity,
        r.holder_name,
        r.start.format(TIME_FORMAT),
        r.end.format(TIME_FORMAT),
        r.effective_status(now),
    )
}

pub fn statistics(stats: &Statistics) {
    println!(
        "Rooms:        {} ({} enabled, {} disabled)",
        stats.rooms_total,
        stats.rooms_enabled,
        stats.rooms_disabled()
    );
    println!(
        "Reservations: {} ({} active, {} ended)",
        stats.reservations_total,
        stats.reservations_active,
        stats.reservations_ended()
    );
}

pub fn seed_report(report: &SeedReport) {
    println!(
        "Rooms: {} created, {} already present",
        report.rooms_created, report.rooms_skipped
    );
    println!(
        "Reservations: {} created, {} skipped",
        report.reservations_created, report.reservations_skipped
    );
}
