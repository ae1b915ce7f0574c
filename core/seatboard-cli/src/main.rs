//! seatboard: command-line surface for the seatboard daemon.
//!
//! Supervisors use it to read the board and to apply the quick overrides
//! (away, return, absent, memo, register). All writes go through the daemon,
//! which is the single writer for student records.
//!
//! ## Subcommands
//!
//! - `board`, `seat`: evaluate now or at `--at "WED 13:00"`
//! - `away`, `return`, `absent`, `memo`, `register`: override commands
//! - `import`, `delete`, `students`: record maintenance

mod daemon_client;
mod import;
mod logging;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use import::ImportFormat;
use seatboard_core::BoardView;
use seatboard_daemon_protocol::{BoardQuery, CommandKind, Method};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seatboard")]
#[command(about = "Reading-room seat status board")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every seat's status
    Board {
        /// Evaluate at a weekday and time instead of now (e.g. "WED 13:00")
        #[arg(long, value_name = "DAY HH:MM")]
        at: Option<String>,

        /// Print the raw JSON board
        #[arg(long)]
        json: bool,
    },

    /// Show one seat's status and memo
    Seat {
        #[arg(value_name = "SEAT")]
        seat: String,

        /// Evaluate at a weekday and time instead of now (e.g. "WED 13:00")
        #[arg(long, value_name = "DAY HH:MM")]
        at: Option<String>,

        /// Print the raw JSON payload
        #[arg(long)]
        json: bool,
    },

    /// Mark a student as stepped out
    Away {
        #[arg(value_name = "SEAT")]
        seat: String,

        /// Record an outing rather than a short step-out
        #[arg(long)]
        out: bool,
    },

    /// Mark a student as back in the room
    Return {
        #[arg(value_name = "SEAT")]
        seat: String,
    },

    /// Mark a student as absent today
    Absent {
        #[arg(value_name = "SEAT")]
        seat: String,
    },

    /// Set or clear (with "") a student's memo
    Memo {
        #[arg(value_name = "SEAT")]
        seat: String,

        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Register a new student on an empty seat
    Register {
        #[arg(value_name = "SEAT")]
        seat: String,

        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Import student records from a JSON export or a CSV timetable
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Input format; defaults to csv for `.csv` files and json otherwise
        #[arg(long, value_enum)]
        format: Option<FileFormat>,
    },

    /// Delete a student record
    Delete {
        #[arg(value_name = "SEAT")]
        seat: String,
    },

    /// List stored student records
    Students {
        /// Print the raw JSON records
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FileFormat {
    Json,
    Csv,
}

impl From<FileFormat> for ImportFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Json => ImportFormat::Json,
            FileFormat::Csv => ImportFormat::Timetable,
        }
    }
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(output) => print!("{}", output),
        Err(err) => {
            tracing::error!(error = %err, "seatboard command failed");
            eprintln!("seatboard: {}", err);
            std::process::exit(1);
        }
    }
}

fn run(command: Commands) -> Result<String, String> {
    match command {
        Commands::Board { at, json } => {
            let data = daemon_client::get_board(parse_at(at.as_deref())?)?;
            if json {
                return pretty(&data);
            }
            let view: BoardView = serde_json::from_value(data)
                .map_err(|err| format!("Unexpected board payload: {}", err))?;
            Ok(render::board(&view))
        }
        Commands::Seat { seat, at, json } => {
            let data = daemon_client::get_seat(&seat, parse_at(at.as_deref())?)?;
            if json {
                pretty(&data)
            } else {
                Ok(render::seat_detail(&data))
            }
        }
        Commands::Away { seat, out } => {
            let kind = if out {
                CommandKind::MarkOut
            } else {
                CommandKind::MarkAway
            };
            send_override(&seat, kind, None, None)
        }
        Commands::Return { seat } => send_override(&seat, CommandKind::MarkReturned, None, None),
        Commands::Absent { seat } => send_override(&seat, CommandKind::MarkAbsent, None, None),
        Commands::Memo { seat, text } => {
            send_override(&seat, CommandKind::SetMemo, None, Some(text))
        }
        Commands::Register { seat, name } => {
            send_override(&seat, CommandKind::QuickRegister, Some(name), None)
        }
        Commands::Import { file, format } => {
            let format = format
                .map(ImportFormat::from)
                .unwrap_or_else(|| ImportFormat::for_path(&file));
            import_file(&file, format)
        }
        Commands::Delete { seat } => {
            let data = daemon_client::delete_student(&seat)?;
            if data.get("deleted").and_then(Value::as_bool) == Some(true) {
                Ok(format!("Deleted {}\n", seat))
            } else {
                Ok(format!("No student on {}\n", seat))
            }
        }
        Commands::Students { json } => {
            let data = daemon_client::call(Method::ListStudents, None)?;
            if json {
                pretty(&data)
            } else {
                Ok(render::students(&data))
            }
        }
    }
}

fn send_override(
    seat: &str,
    kind: CommandKind,
    name: Option<String>,
    memo: Option<String>,
) -> Result<String, String> {
    daemon_client::send_command(seat, kind, name, memo)?;
    tracing::info!(seat = %seat, command = ?kind, "Override command accepted");
    Ok(format!("{}: ok\n", seat.trim()))
}

fn import_file(file: &std::path::Path, format: ImportFormat) -> Result<String, String> {
    let batch = import::read_file(file, format).map_err(|err| err.to_string())?;
    let mut output = String::new();
    for (row, reason) in &batch.rejected {
        tracing::warn!(row = row, reason = %reason, "Skipping import row");
        output.push_str(&format!("row {}: skipped: {}\n", row, reason));
    }

    let mut imported = 0;
    let mut failed = 0;
    for student in batch.students {
        let seat = student.seat_id.clone();
        let params = serde_json::to_value(&student)
            .map_err(|err| format!("Failed to serialize {}: {}", seat, err))?;
        match daemon_client::call(Method::UpsertStudent, Some(params)) {
            Ok(_) => imported += 1,
            Err(err) => {
                failed += 1;
                output.push_str(&format!("{}: {}\n", seat, err));
            }
        }
    }

    output.push_str(&format!(
        "Imported {} students ({} skipped, {} failed)\n",
        imported,
        batch.rejected.len(),
        failed
    ));
    if failed > 0 {
        return Err(output.trim_end().to_string());
    }
    Ok(output)
}

/// `"WED 13:00"` → a board query; `None` means "now".
fn parse_at(at: Option<&str>) -> Result<Option<BoardQuery>, String> {
    let Some(at) = at else {
        return Ok(None);
    };
    let mut parts = at.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(weekday), Some(time), None) => {
            let query = BoardQuery::at(weekday, time);
            query
                .validate()
                .map_err(|err| format!("{}: {}", err.code, err.message))?;
            Ok(Some(query))
        }
        _ => Err(format!("--at expects \"<DAY> <HH:MM>\", got {:?}", at)),
    }
}

fn pretty(data: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(data)
        .map(|text| text + "\n")
        .map_err(|err| format!("Failed to format JSON: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn away_accepts_out_flag() {
        let cli = Cli::try_parse_from(["seatboard", "away", "독-001", "--out"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Away { ref seat, out: true } if seat == "독-001"
        ));
    }

    #[test]
    fn board_accepts_quoted_instant() {
        let cli = Cli::try_parse_from(["seatboard", "board", "--at", "WED 13:00"]).unwrap();
        let Commands::Board { at, json } = cli.command else {
            panic!("expected board command");
        };
        assert!(!json);
        assert_eq!(
            parse_at(at.as_deref()).unwrap(),
            Some(BoardQuery::at("WED", "13:00"))
        );
    }

    #[test]
    fn parse_at_rejects_malformed_instants() {
        assert_eq!(parse_at(None).unwrap(), None);
        assert!(parse_at(Some("WED")).is_err());
        assert!(parse_at(Some("WED 13:00 extra")).is_err());
        assert!(parse_at(Some("WED 25:00"))
            .unwrap_err()
            .starts_with("invalid_time"));
        assert!(parse_at(Some("HOLIDAY 10:00"))
            .unwrap_err()
            .starts_with("invalid_weekday"));
    }

    #[test]
    fn import_format_flag_overrides_extension() {
        let cli = Cli::try_parse_from(["seatboard", "import", "roster.txt", "--format", "csv"])
            .unwrap();
        let Commands::Import { file, format } = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(file, PathBuf::from("roster.txt"));
        assert_eq!(format.map(ImportFormat::from), Some(ImportFormat::Timetable));
        assert!(Cli::try_parse_from(["seatboard", "import", "a.csv", "--format", "xlsx"]).is_err());
    }

    #[test]
    fn register_requires_a_name() {
        assert!(Cli::try_parse_from(["seatboard", "register", "독-001"]).is_err());
    }
}
