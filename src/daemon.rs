use crate::config::Settings;
use crate::paths::Paths;
use crate::pid;
use crate::protocol::{self, Request, Response};
use crate::supervisor::Supervisor;
use crate::sys::{self, IpcListener, IpcStream};
use color_eyre::eyre::{Context, bail};
use std::fs;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "HMWSM_LOG";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Send daemon diagnostics to `<data>/daemon.log`. Filtered by `HMWSM_LOG`,
/// `info` when unset.
pub fn init_tracing(paths: &Paths) {
    TRACING_INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

        let file = match fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths.daemon_log())
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("cannot open {}: {e}", paths.daemon_log().display());
                return;
            }
        };

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub async fn run(paths: Paths) -> color_eyre::Result<()> {
    fs::create_dir_all(paths.data_dir())?;
    init_tracing(&paths);

    if pid::is_daemon_running(&paths) && pid::read_pid_file(&paths) != Some(std::process::id()) {
        bail!("daemon is already running");
    }

    let settings = Settings::load(&paths.settings_file())
        .with_context(|| format!("loading {}", paths.settings_file().display()))?;

    pid::write_pid_file(&paths)?;
    let listener = sys::ipc_bind(&paths).await?;

    let supervisor = Supervisor::new(paths.clone(), settings);
    match supervisor.load_sessions().await {
        Ok(n) => tracing::info!(servers = n, "sessions loaded"),
        Err(e) => tracing::warn!("failed to load sessions: {e}"),
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    supervisor.spawn_tick(shutdown_tx.subscribe());
    tracing::info!(pid = std::process::id(), "daemon started");

    let result = run_accept_loop(&supervisor, &listener, &shutdown_tx, &mut shutdown_rx).await;
    let _ = shutdown_tx.send(true);

    // Servers keep running; only the session list is written.
    if let Err(e) = supervisor.save_sessions().await {
        tracing::warn!("failed to save sessions: {e}");
    }

    sys::ipc_cleanup(&paths).await;
    pid::remove_pid_file(&paths);
    tracing::info!("daemon stopped");

    result
}

async fn run_accept_loop(
    supervisor: &Supervisor,
    listener: &IpcListener,
    shutdown_tx: &watch::Sender<bool>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> color_eyre::Result<()> {
    loop {
        tokio::select! {
            accept_result = sys::ipc_accept(listener) => {
                let stream = accept_result?;
                let tx = shutdown_tx.clone();
                let supervisor = supervisor.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &tx, &supervisor).await {
                        tracing::warn!("connection error: {e}");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = sys::signal_shutdown() => {
                tracing::info!("received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: IpcStream,
    shutdown_tx: &watch::Sender<bool>,
    supervisor: &Supervisor,
) -> color_eyre::Result<()> {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();
    buf_reader.read_line(&mut line).await?;

    if line.trim().is_empty() {
        return Ok(());
    }

    let request = match protocol::decode_request(&line) {
        Ok(request) => request,
        Err(e) => {
            let resp = Response::Error {
                message: format!("invalid request: {e}"),
            };
            writer.write_all(&protocol::encode_response(&resp)?).await?;
            writer.shutdown().await?;
            return Ok(());
        }
    };
    tracing::debug!(?request, "request");

    match request {
        Request::Log {
            name,
            lines,
            follow,
        } => {
            supervisor
                .stream_logs(&name, lines, follow, &mut writer)
                .await?;
        }
        Request::Kill => {
            // Answer before the accept loop winds down.
            let resp = Response::Success {
                message: Some("daemon shutting down".to_string()),
            };
            writer.write_all(&protocol::encode_response(&resp)?).await?;
            writer.flush().await?;
            let _ = shutdown_tx.send(true);
        }
        request => {
            let response = supervisor.dispatch(request, shutdown_tx).await;
            writer.write_all(&protocol::encode_response(&response)?).await?;
        }
    }
    writer.shutdown().await?;

    Ok(())
}
