use crate::paths::Paths;
use crate::pid;
use crate::protocol::{self, Request, Response};
use crate::sys::{self, SyncIpcStream};
use color_eyre::eyre::{Context, bail};
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

const CONNECT_RETRIES: u32 = 10;
const CONNECT_DELAY: Duration = Duration::from_millis(200);

/// Send one request and read a single response.
pub fn send_request(paths: &Paths, request: &Request) -> color_eyre::Result<Response> {
    let mut reader = open_request(paths, request)?;
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.is_empty() {
        bail!("daemon closed the connection without a response");
    }
    Ok(protocol::decode_response(&line)?)
}

/// Send one request and hand every response line to `on_response` until the
/// daemon closes the stream.
pub fn stream_request(
    paths: &Paths,
    request: &Request,
    mut on_response: impl FnMut(Response),
) -> color_eyre::Result<()> {
    let reader = open_request(paths, request)?;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        on_response(protocol::decode_response(&line)?);
    }
    Ok(())
}

fn open_request(
    paths: &Paths,
    request: &Request,
) -> color_eyre::Result<BufReader<SyncIpcStream>> {
    ensure_daemon_running(paths)?;
    let mut stream = connect_with_retry(paths, CONNECT_RETRIES, CONNECT_DELAY)?;

    let encoded = protocol::encode_request(request)?;
    stream.write_all(&encoded)?;
    stream.flush()?;
    Ok(BufReader::new(stream))
}

pub fn ensure_daemon_running(paths: &Paths) -> color_eyre::Result<()> {
    if pid::is_daemon_running(paths) && sys::ipc_exists(paths) {
        return Ok(());
    }

    spawn_daemon(paths)?;

    for _ in 0..50 {
        if sys::ipc_exists(paths) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    bail!("timed out waiting for daemon to start");
}

fn spawn_daemon(paths: &Paths) -> color_eyre::Result<()> {
    let exe = std::env::current_exe().context("failed to get current executable path")?;
    std::fs::create_dir_all(paths.data_dir())?;

    let mut cmd = std::process::Command::new(exe);
    cmd.arg("--daemon")
        .env("HMWSM_DATA_DIR", paths.data_dir())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    sys::configure_daemon_cmd(&mut cmd);
    cmd.spawn().context("failed to spawn daemon")?;

    Ok(())
}

fn connect_with_retry(
    paths: &Paths,
    retries: u32,
    delay: Duration,
) -> color_eyre::Result<SyncIpcStream> {
    let mut attempt = 0;
    loop {
        match sys::ipc_connect(paths) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                attempt += 1;
                if attempt >= retries {
                    bail!("failed to connect to daemon after {retries} attempts: {e}");
                }
                std::thread::sleep(delay);
            }
        }
    }
}
