//! Seatboard daemon entrypoint.
//!
//! A small, single-writer service that owns the student records for one
//! facility: a socket listener with strict request validation, a SQLite-backed
//! record store, and a board worker that re-evaluates every seat on each store
//! change and on every clock tick.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use seatboard_core::{EvalInstant, SeatboardError, Student, SystemClock};
use seatboard_daemon_protocol::{
    parse_board_query, parse_command, parse_seat_key, parse_seat_query, BoardQuery, ErrorInfo,
    Method, Request, Response, ERROR_EMPTY_REQUEST, ERROR_INVALID_INSTANT, ERROR_INVALID_JSON,
    ERROR_INVALID_PARAMS, ERROR_INVALID_RECORD, ERROR_PROTOCOL_MISMATCH, ERROR_READ_FAILED,
    ERROR_READ_TIMEOUT, ERROR_REQUEST_TOO_LARGE, ERROR_SEAT_OCCUPIED, ERROR_SERIALIZATION,
    ERROR_STORE_READ, ERROR_STORE_WRITE, ERROR_STUDENT_NOT_FOUND, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};
use serde::Serialize;

mod config;
mod db;
mod state;
mod store;

use db::Db;
use state::SharedState;
use store::SqliteStore;

const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let socket_path = match daemon_socket_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon socket path");
            std::process::exit(1);
        }
    };

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(path = %socket_path.display(), "Seatboard daemon started");

    let config = match config::load_config(None) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load daemon config; using defaults");
            config::DaemonConfig::default()
        }
    };

    let db_path = match config.store.db_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon database path");
            std::process::exit(1);
        }
    };

    let db = match Db::new(db_path.clone()) {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, "Failed to initialize daemon database");
            std::process::exit(1);
        }
    };

    let layout = config.seat_layout();
    info!(
        db = %db_path.display(),
        seats = layout.seat_count(),
        rows = layout.rows.len(),
        tick_interval_secs = config.clock.tick_interval().as_secs(),
        "Daemon config loaded"
    );

    let shared_state = match SharedState::start(
        SqliteStore::new(db),
        layout,
        Arc::new(SystemClock),
        config.clock.tick_interval(),
    ) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!(error = %err, "Failed to start board worker");
            std::process::exit(1);
        }
    };

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("SEATBOARD_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn daemon_socket_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".seatboard").join(SOCKET_NAME))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        ERROR_REQUEST_TOO_LARGE,
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new(ERROR_READ_TIMEOUT, "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    ERROR_READ_FAILED,
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new(ERROR_EMPTY_REQUEST, "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => {
            if buffer.len() > index + 1 {
                let trailing = &buffer[index + 1..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    warn!("Extra bytes detected after newline; ignoring trailing data");
                }
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new(ERROR_EMPTY_REQUEST, "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_JSON,
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            ERROR_PROTOCOL_MISMATCH,
            "unsupported protocol version",
        );
    }

    let id = request.id;
    let result = match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
            });
            data["board"] = state.health_snapshot();
            Ok(data)
        }
        Method::GetBoard => parse_board_query(request.params)
            .and_then(|query| instant(&query))
            .and_then(|at| state.board(at).map_err(error_info))
            .and_then(|view| {
                tracing::debug!(
                    occupied = view.summary.occupied,
                    present = view.summary.present,
                    "Board snapshot"
                );
                to_data(&view, "board")
            }),
        Method::GetSeat => parse_seat_query(request.params).and_then(|query| {
            let at = match &query.at {
                Some(at) => instant(at)?,
                None => None,
            };
            let detail = state.seat(query.seat_id.trim(), at).map_err(error_info)?;
            to_data(&detail, "seat")
        }),
        Method::ListStudents => state
            .students()
            .map_err(error_info)
            .and_then(|students| to_data(&students, "students")),
        Method::Command => match request.params {
            None => Err(ErrorInfo::new(ERROR_INVALID_PARAMS, "command is required")),
            Some(params) => parse_command(params).and_then(|envelope| {
                state.command(&envelope).map_err(error_info)?;
                Ok(serde_json::json!({
                    "accepted": true,
                    "command_id": envelope.command_id,
                }))
            }),
        },
        Method::UpsertStudent => parse_student(request.params).and_then(|student| {
            let saved = state.upsert_student(student).map_err(error_info)?;
            to_data(&saved, "student")
        }),
        Method::DeleteStudent => parse_seat_key(request.params).and_then(|key| {
            let deleted = state
                .delete_student(key.seat_id.trim())
                .map_err(error_info)?;
            Ok(serde_json::json!({ "deleted": deleted, "seat_id": key.seat_id }))
        }),
    };

    match result {
        Ok(data) => Response::ok(id, data),
        Err(err) => {
            tracing::debug!(code = %err.code, message = %err.message, "Request rejected");
            Response::error_with_info(id, err)
        }
    }
}

fn instant(query: &BoardQuery) -> Result<Option<EvalInstant>, ErrorInfo> {
    match query.validate()? {
        None => Ok(None),
        Some(value) => EvalInstant::parse(&value)
            .map(Some)
            .map_err(|err| ErrorInfo::new(ERROR_INVALID_INSTANT, err.to_string())),
    }
}

fn parse_student(params: Option<serde_json::Value>) -> Result<Student, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new(ERROR_INVALID_PARAMS, "student is required"))?;
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("student payload is invalid: {}", err),
        )
    })
}

fn to_data<T: Serialize>(value: &T, what: &str) -> Result<serde_json::Value, ErrorInfo> {
    serde_json::to_value(value).map_err(|err| {
        ErrorInfo::new(
            ERROR_SERIALIZATION,
            format!("Failed to serialize {}: {}", what, err),
        )
    })
}

fn error_info(err: SeatboardError) -> ErrorInfo {
    let code = match &err {
        SeatboardError::StudentNotFound(_) => ERROR_STUDENT_NOT_FOUND,
        SeatboardError::SeatOccupied(_) => ERROR_SEAT_OCCUPIED,
        SeatboardError::InvalidRecord { .. } => ERROR_INVALID_RECORD,
        SeatboardError::StoreWrite { .. } => ERROR_STORE_WRITE,
        SeatboardError::StoreRead { .. } => ERROR_STORE_READ,
        SeatboardError::InvalidInstant(_) => ERROR_INVALID_INSTANT,
        SeatboardError::Json { .. } => ERROR_SERIALIZATION,
    };
    ErrorInfo::new(code, err.to_string())
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
