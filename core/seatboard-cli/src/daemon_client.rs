//! Client helper for talking to the seatboard daemon.
//!
//! The daemon is the only writer. Every failure is surfaced to the caller as a
//! message; there is no offline fallback.

use chrono::Utc;
use rand::RngCore;
use seatboard_daemon_protocol::{
    BoardQuery, CommandEnvelope, CommandKind, Method, Request, Response, SeatKey, SeatQuery,
    MAX_REQUEST_BYTES,
};
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

pub const SOCKET_ENV: &str = "SEATBOARD_DAEMON_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 2000;
const WRITE_TIMEOUT_MS: u64 = 600;

pub fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".seatboard").join(SOCKET_NAME))
}

/// Sends one request and returns its `data`, or the daemon's error as
/// `"{code}: {message}"`.
pub fn call(method: Method, params: Option<Value>) -> Result<Value, String> {
    let mut request = Request::new(method, params);
    request.id = Some(make_request_id("req"));
    let response = send_request(request)?;
    into_data(response)
}

pub fn get_board(at: Option<BoardQuery>) -> Result<Value, String> {
    call(Method::GetBoard, at.map(to_params).transpose()?)
}

pub fn get_seat(seat_id: &str, at: Option<BoardQuery>) -> Result<Value, String> {
    let query = SeatQuery {
        seat_id: seat_id.to_string(),
        at,
    };
    call(Method::GetSeat, Some(to_params(query)?))
}

pub fn delete_student(seat_id: &str) -> Result<Value, String> {
    let key = SeatKey {
        seat_id: seat_id.to_string(),
    };
    call(Method::DeleteStudent, Some(to_params(key)?))
}

pub fn send_command(
    seat_id: &str,
    command: CommandKind,
    name: Option<String>,
    memo: Option<String>,
) -> Result<Value, String> {
    let envelope = command_envelope(seat_id, command, name, memo);
    envelope
        .validate()
        .map_err(|err| format!("{}: {}", err.code, err.message))?;
    call(Method::Command, Some(to_params(envelope)?))
}

fn command_envelope(
    seat_id: &str,
    command: CommandKind,
    name: Option<String>,
    memo: Option<String>,
) -> CommandEnvelope {
    CommandEnvelope {
        command_id: make_request_id("cmd"),
        issued_at: Utc::now().to_rfc3339(),
        seat_id: seat_id.to_string(),
        command,
        name,
        memo,
    }
}

fn to_params<T: serde::Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|err| format!("Failed to serialize params: {}", err))
}

fn into_data(response: Response) -> Result<Value, String> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string()))
    }
}

fn send_request(request: Request) -> Result<Response, String> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        format!(
            "Failed to connect to daemon socket {}: {}",
            socket.display(),
            err
        )
    })?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    tracing::debug!(method = ?request.method, id = ?request.id, "Sending daemon request");
    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
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
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id(prefix: &str) -> String {
    let mut random = rand::thread_rng();
    format!(
        "{}-{}-{}-{:x}",
        prefix,
        Utc::now().timestamp_millis(),
        std::process::id(),
        random.next_u64()
    )
}
