use seatboard_daemon_protocol::{
    BoardQuery, CommandEnvelope, CommandKind, Method, Request, Response, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn temp_home() -> TempDir {
    tempfile::Builder::new()
        .prefix("seatboard-smoke")
        .tempdir_in("/tmp")
        .expect("Failed to create temp HOME")
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_seatboard-daemon"))
        .env("HOME", home)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn seatboard-daemon")
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".seatboard").join("daemon.sock")
}

fn write_config(home: &Path, contents: &str) {
    let dir = home.join(".seatboard");
    std::fs::create_dir_all(&dir).expect("create config dir");
    std::fs::write(dir.join("daemon.toml"), contents).expect("write config");
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

fn call(socket: &Path, method: Method, params: Option<Value>) -> Response {
    send_request(
        socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some(format!("{:?}", method)),
            params,
        },
    )
}

fn command(seat: &str, kind: CommandKind) -> Value {
    serde_json::to_value(CommandEnvelope {
        command_id: format!("cmd-{}-{:?}", seat, kind),
        issued_at: "2026-10-20T15:00:00+09:00".to_string(),
        seat_id: seat.to_string(),
        command: kind,
        name: None,
        memo: None,
    })
    .expect("serialize command")
}

fn seat_category(board: &Value, seat: &str) -> Option<String> {
    let rows = board.get("rows")?.as_array()?;
    let waiting = board.get("waiting")?.as_array()?;
    let unplaced = board.get("unplaced")?.as_array()?;
    rows.iter()
        .filter_map(|row| row.as_array())
        .flatten()
        .chain(waiting.iter())
        .chain(unplaced.iter())
        .find(|cell| cell.get("seatId").and_then(Value::as_str) == Some(seat))
        .and_then(|cell| cell.pointer("/occupant/status/category"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn error_code(response: &Response) -> Option<&str> {
    response.error.as_ref().map(|err| err.code.as_str())
}

#[test]
fn daemon_ipc_board_and_commands_smoke() {
    let home = temp_home();
    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(5));

    let health = call(&socket, Method::GetHealth, None);
    assert!(health.ok, "health response was not ok");
    let data = health.data.expect("health payload");
    assert_eq!(data.get("status").and_then(Value::as_str), Some("ok"));
    assert_eq!(data.pointer("/board/seats").and_then(Value::as_u64), Some(113));

    let upsert = call(
        &socket,
        Method::UpsertStudent,
        Some(json!({
            "seatNumber": "독-001",
            "name": "Kim",
            "school": "Hanbit High",
            "grade": "2",
            "status": "재원",
            "schedules": [
                { "day": "TUE", "startTime": "14:00", "endTime": "16:00" },
                { "day": "WED", "startTime": "9:00", "endTime": "12:00" },
                { "day": "WED", "startTime": "14:00", "endTime": "18:00" }
            ]
        })),
    );
    assert!(upsert.ok, "upsert failed: {:?}", upsert.error);
    let saved = upsert.data.expect("saved student");
    assert_eq!(
        saved.pointer("/schedules/1/startTime").and_then(Value::as_str),
        Some("09:00")
    );

    let tuesday = serde_json::to_value(BoardQuery::at("TUE", "15:00")).expect("query");
    let board = call(&socket, Method::GetBoard, Some(tuesday.clone()));
    assert!(board.ok, "board failed: {:?}", board.error);
    assert_eq!(
        seat_category(&board.data.expect("board"), "독-001").as_deref(),
        Some("STUDYING")
    );

    let away = call(
        &socket,
        Method::Command,
        Some(command("독-001", CommandKind::MarkAway)),
    );
    assert!(away.ok, "mark_away failed: {:?}", away.error);
    let board = call(&socket, Method::GetBoard, Some(tuesday));
    assert_eq!(
        seat_category(&board.data.expect("board"), "독-001").as_deref(),
        Some("STEPPED_OUT_OVERRIDE")
    );

    let between = call(
        &socket,
        Method::GetSeat,
        Some(json!({
            "seat_id": "독-001",
            "at": { "weekday": "WED", "time": "13:00" }
        })),
    );
    assert!(between.ok, "get_seat failed: {:?}", between.error);
    let detail = between.data.expect("seat detail");
    assert_eq!(
        detail
            .pointer("/seat/occupant/status/category")
            .and_then(Value::as_str),
        Some("BETWEEN_WINDOWS")
    );
    assert!(detail
        .pointer("/seat/occupant/status/label")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("14:00"));
    assert_eq!(detail.get("in_layout").and_then(Value::as_bool), Some(true));

    let mut register = command("독-002", CommandKind::QuickRegister);
    register["name"] = json!("Lee");
    let registered = call(&socket, Method::Command, Some(register.clone()));
    assert!(registered.ok, "quick_register failed: {:?}", registered.error);
    let again = call(&socket, Method::Command, Some(register));
    assert!(!again.ok);
    assert_eq!(error_code(&again), Some("seat_occupied"));

    let missing = call(
        &socket,
        Method::Command,
        Some(command("독-099", CommandKind::MarkAbsent)),
    );
    assert!(!missing.ok);
    assert_eq!(error_code(&missing), Some("student_not_found"));

    let students = call(&socket, Method::ListStudents, None);
    assert_eq!(
        students
            .data
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(2)
    );

    let deleted = call(
        &socket,
        Method::DeleteStudent,
        Some(json!({ "seat_id": "독-002" })),
    );
    assert_eq!(
        deleted
            .data
            .as_ref()
            .and_then(|data| data.get("deleted"))
            .and_then(Value::as_bool),
        Some(true)
    );
    let students = call(&socket, Method::ListStudents, None);
    assert_eq!(
        students
            .data
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );
}

#[test]
fn daemon_rejects_invalid_requests() {
    let home = temp_home();
    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };
    wait_for_socket(&socket, Duration::from_secs(5));

    let half_query = call(&socket, Method::GetBoard, Some(json!({ "weekday": "MON" })));
    assert_eq!(error_code(&half_query), Some("invalid_params"));

    let bad_time = call(
        &socket,
        Method::GetBoard,
        Some(json!({ "weekday": "MON", "time": "25:00" })),
    );
    assert_eq!(error_code(&bad_time), Some("invalid_time"));

    let no_name = call(
        &socket,
        Method::UpsertStudent,
        Some(json!({ "seatNumber": "독-003", "name": " " })),
    );
    assert_eq!(error_code(&no_name), Some("invalid_record"));

    let mismatch = send_request(
        &socket,
        Request {
            protocol_version: PROTOCOL_VERSION + 1,
            method: Method::GetHealth,
            id: None,
            params: None,
        },
    );
    assert_eq!(error_code(&mismatch), Some("protocol_mismatch"));
}

#[test]
fn daemon_uses_configured_layout_and_keeps_records_across_restart() {
    let home = temp_home();
    write_config(
        home.path(),
        r#"
[clock]
tick_interval_secs = 5

[layout]
rows = [["A-1", "BIG_GAP", "A-2"]]
waiting = ["W-1"]
"#,
    );
    let socket = socket_path(home.path());

    {
        let _guard = DaemonGuard {
            child: spawn_daemon(home.path()),
        };
        wait_for_socket(&socket, Duration::from_secs(5));

        let health = call(&socket, Method::GetHealth, None);
        let data = health.data.expect("health payload");
        assert_eq!(data.pointer("/board/seats").and_then(Value::as_u64), Some(3));
        assert_eq!(
            data.pointer("/board/tick_interval_secs")
                .and_then(Value::as_u64),
            Some(5)
        );

        let upsert = call(
            &socket,
            Method::UpsertStudent,
            Some(json!({ "seatNumber": "A-2", "name": "Park" })),
        );
        assert!(upsert.ok, "upsert failed: {:?}", upsert.error);
    }

    let _ = std::fs::remove_file(&socket);
    let _guard = DaemonGuard {
        child: spawn_daemon(home.path()),
    };
    wait_for_socket(&socket, Duration::from_secs(5));

    let board = call(
        &socket,
        Method::GetBoard,
        Some(json!({ "weekday": "FRI", "time": "10:00" })),
    );
    let board = board.data.expect("board");
    assert_eq!(seat_category(&board, "A-2").as_deref(), Some("FREE"));
    assert_eq!(
        board.pointer("/rows/0/1/kind").and_then(Value::as_str),
        Some("large_gap")
    );
}
