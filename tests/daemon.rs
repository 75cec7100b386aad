#![cfg(unix)]

use hmwsm::config::{self, ServerConfig, ServerUpdate};
use hmwsm::daemon;
use hmwsm::paths::Paths;
use hmwsm::protocol::{self, Request, Response, ServerStatus};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tempfile::TempDir;

async fn start_test_daemon(paths: &Paths) -> tokio::task::JoinHandle<color_eyre::Result<()>> {
    let p = paths.clone();
    let handle = tokio::spawn(async move { daemon::run(p).await });

    let socket = paths.socket_file();
    for _ in 0..50 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(socket.exists(), "daemon socket was not created");

    handle
}

fn send_raw_request_sync(paths: &Paths, request: &Request) -> Response {
    let mut stream = UnixStream::connect(paths.socket_file()).unwrap();
    let encoded = protocol::encode_request(request).unwrap();
    stream.write_all(&encoded).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    protocol::decode_response(&line).unwrap()
}

fn send_streaming_request_sync(paths: &Paths, request: &Request) -> Vec<Response> {
    let mut stream = UnixStream::connect(paths.socket_file()).unwrap();
    let encoded = protocol::encode_request(request).unwrap();
    stream.write_all(&encoded).unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    BufReader::new(stream)
        .lines()
        .map(|line| line.unwrap())
        .filter(|line| !line.is_empty())
        .map(|line| protocol::decode_response(&line).unwrap())
        .collect()
}

async fn send_raw_request(paths: &Paths, request: &Request) -> Response {
    let p = paths.clone();
    let req = request.clone();
    tokio::task::spawn_blocking(move || send_raw_request_sync(&p, &req))
        .await
        .unwrap()
}

fn add_request(name: &str, port: &str) -> Request {
    let mut config = ServerConfig::new(name);
    config.port = port.to_string();
    Request::Add {
        name: None,
        config: Some(config),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_daemon_creates_pid_and_socket() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;

    assert!(paths.pid_file().exists(), "PID file should exist");
    assert!(paths.socket_file().exists(), "socket file should exist");

    let response = send_raw_request(&paths, &Request::Kill).await;
    assert!(matches!(response, Response::Success { .. }));
    let _ = handle.await;

    assert!(!paths.pid_file().exists(), "PID file should be cleaned up");
    assert!(
        !paths.socket_file().exists(),
        "socket file should be cleaned up"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_server_list() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;

    let response = send_raw_request(&paths, &Request::List).await;
    assert!(
        matches!(&response, Response::ServerList { servers } if servers.is_empty()),
        "expected empty server list, got: {response:?}"
    );

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_json_gets_error_response() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;

    let p = paths.clone();
    let line = tokio::task::spawn_blocking(move || {
        let mut stream = UnixStream::connect(p.socket_file()).unwrap();
        stream.write_all(b"{not json}\n").unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        line
    })
    .await
    .unwrap();
    let response = protocol::decode_response(&line).unwrap();
    assert!(
        matches!(&response, Response::Error { message } if message.starts_with("invalid request")),
        "got: {response:?}"
    );

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mutations_are_persisted() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;

    let response = send_raw_request(&paths, &add_request("", "27016")).await;
    assert_eq!(
        response,
        Response::Success {
            message: Some("added 'Server 1'".to_string())
        }
    );

    let response = send_raw_request(
        &paths,
        &Request::Set {
            name: "Server 1".to_string(),
            update: ServerUpdate {
                port: Some("27018".to_string()),
                auto_restart: Some(true),
                ..Default::default()
            },
        },
    )
    .await;
    assert!(matches!(response, Response::Success { .. }), "got: {response:?}");

    let saved = config::load_sessions(&paths.sessions_file()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "Server 1");
    assert_eq!(saved[0].port, "27018");
    assert!(saved[0].auto_restart);

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_reloaded_on_startup() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let mut tdm = ServerConfig::new("tdm");
    tdm.port = "27020".to_string();
    config::save_sessions(&paths.sessions_file(), &[tdm, ServerConfig::new("ffa")]).unwrap();

    let handle = start_test_daemon(&paths).await;

    let response = send_raw_request(&paths, &Request::List).await;
    let Response::ServerList { servers } = response else {
        panic!("expected ServerList, got: {response:?}");
    };
    let names: Vec<_> = servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["tdm", "ffa"]);
    assert_eq!(servers[0].port, "27020");
    assert!(servers.iter().all(|s| s.status == ServerStatus::Offline));

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_info_and_unknown_server() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;
    send_raw_request(&paths, &add_request("tdm", "27016")).await;

    let response = send_raw_request(
        &paths,
        &Request::Info {
            name: "tdm".to_string(),
        },
    )
    .await;
    let Response::ServerDetail { info } = response else {
        panic!("expected ServerDetail, got: {response:?}");
    };
    assert_eq!(info.info.name, "tdm");
    assert!(!info.rcon_password_set);
    assert_eq!(info.timeout_escalations, 0);

    let response = send_raw_request(
        &paths,
        &Request::Start {
            name: "missing".to_string(),
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Error {
            message: "server not found: missing".to_string()
        }
    );

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_log_request_streams_tail() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    let handle = start_test_daemon(&paths).await;
    send_raw_request(&paths, &add_request("tdm", "27016")).await;
    send_raw_request(
        &paths,
        &Request::Rename {
            name: "tdm".to_string(),
            new_name: "war".to_string(),
        },
    )
    .await;

    let p = paths.clone();
    let responses = tokio::task::spawn_blocking(move || {
        send_streaming_request_sync(
            &p,
            &Request::Log {
                name: "war".to_string(),
                lines: 15,
                follow: false,
            },
        )
    })
    .await
    .unwrap();

    assert_eq!(responses.len(), 1, "got: {responses:?}");
    assert!(matches!(
        &responses[0],
        Response::LogLine { line } if line.ends_with("[INFO] Renamed to 'war'.")
    ));

    send_raw_request(&paths, &Request::Kill).await;
    let _ = handle.await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_daemon_refuses_to_start() {
    let dir = TempDir::new().unwrap();
    let paths = Paths::with_base(dir.path().to_path_buf());

    // A live pid that is not ours.
    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    std::fs::write(paths.pid_file(), child.id().to_string()).unwrap();

    let result = daemon::run(paths.clone()).await;
    assert!(result.is_err());
    assert!(!paths.socket_file().exists());

    child.kill().unwrap();
    child.wait().unwrap();
}
