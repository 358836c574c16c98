use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "salas")]
#[command(about = "Study room reservations with RUT validation.")]
pub struct CommandLine {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List rooms with their current availability
    Rooms {
        /// Hide disabled rooms
        #[arg(long)]
        enabled_only: bool,
    },
    /// Manage a single room
    #[command(subcommand)]
    Room(RoomCommand),
    /// Reserve a room
    #[command(alias = "r")]
    Reserve(ReserveArgs),
    /// Cancel a reservation
    Cancel { id: i64 },
    /// End a reservation now
    Finish { id: i64 },
    /// Show the active reservations held by a RUT
    Mine { rut: String },
    /// Validate a RUT and print its canonical form
    CheckRut { rut: String },
    /// Show room and reservation counts
    Stats,
    /// Load the sample rooms and reservations
    Seed {
        /// Only create the rooms
        #[arg(long)]
        rooms_only: bool,
    },
    /// Delete every room and reservation
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoomCommand {
    /// Create a room
    Add {
        name: String,
        #[arg(long)]
        capacity: u32,
        #[arg(long)]
        description: Option<String>,
        /// Create the room disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Show a room and its upcoming reservations
    Show { name: String },
    /// Allow reservations on a room
    Enable { name: String },
    /// Stop accepting reservations on a room
    Disable { name: String },
    /// Delete a room and its reservations
    Remove { name: String },
}

#[derive(Args, Debug)]
pub struct ReserveArgs {
    pub rut: String,
    pub name: String,
    /// Room name
    #[arg(long)]
    pub room: String,
    /// Start time, RFC 3339 or `YYYY-MM-DD HH:MM` in UTC (defaults to now)
    #[arg(long, value_parser = parse_time)]
    pub start: Option<DateTime<Utc>>,
    /// End time (defaults to start plus the configured duration)
    #[arg(long, value_parser = parse_time)]
    pub end: Option<DateTime<Utc>>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid time '{value}', expected RFC 3339 or YYYY-MM-DD HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap();
        assert_eq!(parse_time("2026-03-02T14:30:00Z").unwrap(), expected);
        assert_eq!(parse_time("2026-03-02T11:30:00-03:00").unwrap(), expected);
        assert_eq!(parse_time("2026-03-02 14:30").unwrap(), expected);
        assert_eq!(parse_time("2026-03-02T14:30").unwrap(), expected);
        assert!(parse_time("tomorrow").is_err());
    }

    #[test]
    fn test_parse_reserve() {
        let cli = CommandLine::try_parse_from([
            "salas",
            "--json",
            "reserve",
            "11.111.111-1",
            "Juan Pérez",
            "--room",
            "Sala A",
            "--start",
            "2026-03-02 10:00",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Reserve(args) => {
                assert_eq!(args.rut, "11.111.111-1");
                assert_eq!(args.room, "Sala A");
                assert!(args.start.is_some());
                assert!(args.end.is_none());
            }
            other => panic!("expected reserve, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_room_add() {
        let cli = CommandLine::try_parse_from([
            "salas", "room", "add", "Sala F", "--capacity", "10", "--disabled",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Room(RoomCommand::Add { capacity: 10, disabled: true, .. })
        ));
    }
}
