//! Salas - study room reservations
//!
//! Command-line front end over the reservation engine.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salas_core::engine::AdmissionRequest;
use salas_core::models::NewRoom;
use salas_core::{identity, seed, ReservationId, RoomId};

mod commands;
mod print;
mod state;

use commands::{CommandLine, Commands, ReserveArgs, RoomCommand};
use print::Printer;
use state::{AppState, Session};

fn main() -> Result<()> {
    let cli = CommandLine::parse_args();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let printer = Printer::new(cli.json);
    let session = Session::new(cli.config, cli.db);

    run(cli.command, &session, &printer, Utc::now())
}

/// Open the session's state; commands that need no database never call this
fn open(session: &Session) -> Result<&AppState> {
    session.state().context("failed to initialize application")
}

fn run(command: Commands, session: &Session, printer: &Printer, now: DateTime<Utc>) -> Result<()> {
    match command {
        Commands::CheckRut { rut } => {
            let id = identity::validate(&rut)?;
            printer.emit(&id, |id| println!("{id} is valid"))
        }
        Commands::Rooms { enabled_only } => {
            let rooms = open(session)?.engine.room_overview(enabled_only, now)?;
            printer.emit(&rooms, |rooms| print::room_overview(rooms))
        }
        Commands::Room(command) => run_room(command, open(session)?, printer, now),
        Commands::Reserve(args) => reserve(args, open(session)?, printer, now),
        Commands::Cancel { id } => {
            let reservation = open(session)?.engine.cancel(ReservationId(id), now)?;
            printer.emit(&reservation, |r| print::reservation(r, None, now))
        }
        Commands::Finish { id } => {
            let reservation = open(session)?.engine.finish_early(ReservationId(id), now)?;
            printer.emit(&reservation, |r| print::reservation(r, None, now))
        }
        Commands::Mine { rut } => {
            let state = open(session)?;
            let mine: Vec<_> = state.engine.list_active_by_identity(&rut, now)?.collect();
            let names = room_names(state)?;
            printer.emit(&mine, |list| print::reservations(list, &names, now))
        }
        Commands::Stats => {
            let stats = open(session)?.engine.statistics(now)?;
            printer.emit(&stats, print::statistics)
        }
        Commands::Seed { rooms_only } => {
            let engine = &open(session)?.engine;
            let report = if rooms_only {
                seed::load_sample_rooms(engine, now)?
            } else {
                seed::load_sample_data(engine, now)?
            };
            printer.emit(&report, print::seed_report)
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to delete all data without --yes");
            }
            open(session)?.engine.clear()?;
            printer.emit(&serde_json::json!({ "cleared": true }), |_| {
                println!("All rooms and reservations deleted.")
            })
        }
    }
}

fn run_room(
    command: RoomCommand,
    state: &AppState,
    printer: &Printer,
    now: DateTime<Utc>,
) -> Result<()> {
    let engine = &state.engine;

    match command {
        RoomCommand::Add {
            name,
            capacity,
            description,
            disabled,
        } => {
            let mut room = NewRoom::new(name, capacity);
            room.description = description;
            room.enabled = !disabled;
            let room = engine.create_room(room, now)?;
            printer.emit(&room, |room| println!("Created {room}"))
        }
        RoomCommand::Show { name } => {
            let room = engine.room(&name)?;
            let schedule = engine.room_schedule(&name, now)?;
            let available = engine.is_room_available(&room, now)?;
            printer.emit(
                &serde_json::json!({
                    "room": room,
                    "available": available,
                    "schedule": schedule,
                }),
                |_| print::room(&room, &schedule, now),
            )
        }
        RoomCommand::Enable { name } => {
            let room = engine.set_room_enabled(&name, true)?;
            printer.emit(&room, |room| println!("Enabled {room}"))
        }
        RoomCommand::Disable { name } => {
            let room = engine.set_room_enabled(&name, false)?;
            printer.emit(&room, |room| println!("Disabled {room}"))
        }
        RoomCommand::Remove { name } => {
            let removed = engine.delete_room(&name)?;
            printer.emit(
                &serde_json::json!({ "room": name, "reservations_removed": removed }),
                |_| println!("Deleted {name} and {removed} reservation(s)"),
            )
        }
    }
}

fn reserve(args: ReserveArgs, state: &AppState, printer: &Printer, now: DateTime<Utc>) -> Result<()> {
    let room = state.engine.room(&args.room)?;

    let mut request = AdmissionRequest::new(args.rut, args.name, room.id);
    request.start = args.start;
    request.end = args.end;

    let reservation = state.engine.admit(request, now)?;
    printer.emit(&reservation, |r| print::reservation(r, Some(&room.name), now))
}

fn room_names(state: &AppState) -> Result<HashMap<RoomId, String>> {
    Ok(state
        .engine
        .list_rooms(false)?
        .into_iter()
        .map(|room| (room.id, room.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    fn session(dir: &tempfile::TempDir) -> Session {
        let config = dir.path().join("salas.toml");
        std::fs::write(&config, "").unwrap();
        Session::new(Some(config), Some(dir.path().join("salas.db")))
    }

    #[test]
    fn test_reserve_then_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let printer = Printer::new(true);

        run(Commands::Seed { rooms_only: true }, &session, &printer, now()).unwrap();
        run(
            Commands::Reserve(ReserveArgs {
                rut: "13.180.096-7".to_string(),
                name: "María González".to_string(),
                room: "Sala A - Silenciosa".to_string(),
                start: None,
                end: None,
            }),
            &session,
            &printer,
            now(),
        )
        .unwrap();

        let mine: Vec<_> = session
            .state()
            .unwrap()
            .engine
            .list_active_by_identity("131800967", now())
            .unwrap()
            .collect();
        assert_eq!(mine.len(), 1);

        run(Commands::Cancel { id: mine[0].id.0 }, &session, &printer, now()).unwrap();
        assert!(run(Commands::Cancel { id: mine[0].id.0 }, &session, &printer, now()).is_err());
    }

    #[test]
    fn test_reserve_unknown_room_fails() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let printer = Printer::new(true);

        let result = run(
            Commands::Reserve(ReserveArgs {
                rut: "11111111-1".to_string(),
                name: "Juan".to_string(),
                room: "Sala Z".to_string(),
                start: None,
                end: None,
            }),
            &session,
            &printer,
            now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let printer = Printer::new(true);

        run(Commands::Seed { rooms_only: false }, &session, &printer, now()).unwrap();
        assert!(run(Commands::Clear { yes: false }, &session, &printer, now()).is_err());
        assert_eq!(session.state().unwrap().engine.statistics(now()).unwrap().rooms_total, 5);

        run(Commands::Clear { yes: true }, &session, &printer, now()).unwrap();
        assert_eq!(session.state().unwrap().engine.statistics(now()).unwrap().rooms_total, 0);
    }

    #[test]
    fn test_check_rut_needs_no_database() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(&dir);
        let printer = Printer::new(true);

        run(Commands::CheckRut { rut: "9.015.074-k".to_string() }, &session, &printer, now()).unwrap();
        assert!(run(Commands::CheckRut { rut: "9015074-1".to_string() }, &session, &printer, now()).is_err());
        assert!(!session.is_open());
        assert!(!dir.path().join("salas.db").exists());

        run(Commands::Stats, &session, &printer, now()).unwrap();
        assert!(session.is_open());
    }
}
