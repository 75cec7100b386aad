use crate::config::{self, ConfigError, ServerConfig, ServerUpdate, Settings};
use crate::health;
use crate::paths::Paths;
use crate::ports::PortRegistry;
use crate::process::{self, ExitOutcome, ManagedServer, ServerHandle};
use crate::protocol::{self, Request, Response, ServerDetail, ServerInfo, ServerStatus};
use crate::rcon::{LOOPBACK, RconClient, RconError};
use crate::resources::ResourceSampler;
use chrono::Local;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard, RwLock, broadcast, watch};

pub const NO_PASSWORD_REPLY: &str = "[ERROR] No RCON password set.";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("port {0} is already in use")]
    PortInUse(u16),
    #[error("server '{0}' is already running")]
    AlreadyRunning(String),
    #[error("failed to launch '{name}': {source}")]
    LaunchFailure {
        name: String,
        source: std::io::Error,
    },
    #[error("server not found: {0}")]
    NotFound(String),
    #[error("a server named '{0}' already exists")]
    DuplicateName(String),
    #[error("failed to export log to {path}: {source}")]
    Export {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Who asked for a start. Automatic starts count towards `restarts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCause {
    Operator,
    CrashRestart,
    Watchdog,
}

/// Who asked for a stop. Every stop turns auto-restart off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    Operator,
    Remove,
    Restart,
    Watchdog,
}

/// Result of a restart-all pass.
#[derive(Debug, Default)]
pub struct RestartSummary {
    pub started: Vec<String>,
    pub failed: Vec<(String, SupervisorError)>,
}

// ---------------------------------------------------------------------------
// Server table
// ---------------------------------------------------------------------------

/// Names are kept beside the handles so lookups never wait on an instance
/// that is busy stopping.
struct ServerEntry {
    name: String,
    handle: ServerHandle,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Owns every server instance, in operator order.
///
/// Lock order is table, then instance. Nothing that holds an instance lock
/// touches the table.
#[derive(Clone)]
pub struct Supervisor {
    paths: Paths,
    settings: Settings,
    ports: PortRegistry,
    rcon: RconClient,
    servers: Arc<RwLock<Vec<ServerEntry>>>,
    sampler: Arc<std::sync::Mutex<ResourceSampler>>,
}

impl Supervisor {
    pub fn new(paths: Paths, settings: Settings) -> Self {
        Self::with_ports(paths, settings, PortRegistry::new())
    }

    pub fn with_ports(paths: Paths, settings: Settings, ports: PortRegistry) -> Self {
        Self {
            paths,
            settings,
            ports,
            rcon: RconClient::new(settings.rcon_timeout()),
            servers: Arc::new(RwLock::new(Vec::new())),
            sampler: Arc::new(std::sync::Mutex::new(ResourceSampler::new())),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ports(&self) -> &PortRegistry {
        &self.ports
    }

    pub fn rcon_client(&self) -> RconClient {
        self.rcon
    }

    async fn handle(&self, name: &str) -> Result<ServerHandle, SupervisorError> {
        let table = self.servers.read().await;
        table
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.handle))
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    async fn handles(&self) -> Vec<ServerHandle> {
        let table = self.servers.read().await;
        table.iter().map(|e| Arc::clone(&e.handle)).collect()
    }

    pub async fn names(&self) -> Vec<String> {
        let table = self.servers.read().await;
        table.iter().map(|e| e.name.clone()).collect()
    }

    // -- Instance management --

    /// Add a server. Without a name it gets the first free `Server N`.
    pub async fn add(
        &self,
        name: Option<String>,
        config: Option<ServerConfig>,
    ) -> Result<String, SupervisorError> {
        let mut table = self.servers.write().await;

        let mut config = config.unwrap_or_else(|| ServerConfig::new(String::new()));
        if let Some(name) = name {
            config.name = name;
        }
        config.name = config.name.trim().to_string();

        if config.name.is_empty() {
            config.name = next_default_name(&table);
        } else if table.iter().any(|e| e.name == config.name) {
            return Err(SupervisorError::DuplicateName(config.name));
        }

        let name = config.name.clone();
        let server = ManagedServer::new(config, self.paths.clone());
        table.push(ServerEntry {
            name: name.clone(),
            handle: Arc::new(Mutex::new(server)),
        });
        tracing::info!(server = %name, "server added");
        Ok(name)
    }

    pub async fn rename(&self, name: &str, new_name: &str) -> Result<(), SupervisorError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(SupervisorError::InvalidConfig(
                "server name cannot be empty".to_string(),
            ));
        }

        let mut table = self.servers.write().await;
        if name != new_name && table.iter().any(|e| e.name == new_name) {
            return Err(SupervisorError::DuplicateName(new_name.to_string()));
        }
        let entry = table
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;

        let mut server = entry.handle.lock().await;
        server.log(format!("[INFO] Renamed to '{new_name}'."));
        server.rename(new_name);
        entry.name = new_name.to_string();
        tracing::info!(from = %name, to = %new_name, "server renamed");
        Ok(())
    }

    /// Stop the server if needed and drop it from the table.
    pub async fn remove(&self, name: &str) -> Result<(), SupervisorError> {
        let handle = self.handle(name).await?;
        self.stop_handle(&handle, StopCause::Remove).await;
        handle.lock().await.removed = true;

        let mut table = self.servers.write().await;
        table.retain(|e| !Arc::ptr_eq(&e.handle, &handle));
        tracing::info!(server = %name, "server removed");
        Ok(())
    }

    /// Edit the stored configuration. A running process keeps the values it
    /// was launched with.
    pub async fn update(&self, name: &str, update: ServerUpdate) -> Result<(), SupervisorError> {
        if update.is_empty() {
            return Err(SupervisorError::InvalidConfig("nothing to update".to_string()));
        }
        let handle = self.handle(name).await?;
        let mut server = handle.lock().await;

        if let Some(exe) = update.exe {
            server.config.exe = exe;
        }
        if let Some(port) = update.port {
            server.config.port = port;
        }
        if let Some(auto_restart) = update.auto_restart {
            server.config.auto_restart = auto_restart;
        }
        if let Some(cfg) = update.cfg {
            server.config.cfg = cfg;
            server.refresh_rcon_password();
        }
        server.log("[INFO] Configuration updated.");
        Ok(())
    }

    // -- Lifecycle --

    pub async fn start(&self, name: &str) -> Result<(), SupervisorError> {
        let handle = self.handle(name).await?;
        self.start_handle(&handle, StartCause::Operator).await
    }

    pub async fn start_handle(
        &self,
        handle: &ServerHandle,
        cause: StartCause,
    ) -> Result<(), SupervisorError> {
        let server = handle.lock().await;
        self.launch(handle, server, cause)
    }

    /// Validate and spawn a new incarnation. The caller's guard is held until
    /// the incarnation is recorded.
    fn launch(
        &self,
        handle: &ServerHandle,
        mut server: MutexGuard<'_, ManagedServer>,
        cause: StartCause,
    ) -> Result<(), SupervisorError> {
        let name = server.config.name.clone();

        if server.removed {
            return Err(SupervisorError::NotFound(name));
        }
        if server.is_running() {
            return Err(SupervisorError::AlreadyRunning(name));
        }

        let exe = PathBuf::from(&server.config.exe);
        let cfg = PathBuf::from(&server.config.cfg);
        if !exe.is_file() || !cfg.is_file() {
            server.log("[ERROR] Executable or config path invalid.");
            return Err(SupervisorError::InvalidConfig(
                "executable or config path does not exist".to_string(),
            ));
        }
        let Some(port) = server.config.port_number() else {
            let raw = server.config.port.clone();
            server.log(format!("[ERROR] Invalid port '{raw}'."));
            return Err(SupervisorError::InvalidConfig(format!("invalid port '{raw}'")));
        };

        if !self.ports.try_reserve(port) {
            server.log(format!("[ERROR] Port {port} is already in use."));
            return Err(SupervisorError::PortInUse(port));
        }

        server.refresh_rcon_password();
        if server.rcon_password.is_empty() {
            server.log("[WARN] No rcon_password found in config. Health checks will fail.");
        }

        let args = process::launch_args(&cfg, port);
        server.status = ServerStatus::Starting;
        server.log(format!("[INFO] Launching on port {port}..."));
        server.log(format!("[CMD] {} {}", exe.display(), args.join(" ")));

        let mut child = match process::build_command(&exe, &args).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.ports.release(port);
                server.status = ServerStatus::Crashed;
                server.log(format!("[ERROR] Failed to launch: {source}"));
                tracing::error!(server = %name, "launch failed: {source}");
                return Err(SupervisorError::LaunchFailure { name, source });
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (generation, shutdown_rx) = server.begin_incarnation(child, port);
        if cause != StartCause::Operator {
            server.restarts += 1;
        }
        let password = server.rcon_password.clone();
        tracing::info!(server = %name, pid = ?server.pid, port, ?cause, "server launched");
        drop(server);

        if let Some(stdout) = stdout {
            process::spawn_output_reader(Arc::clone(handle), generation, stdout);
        }
        if let Some(stderr) = stderr {
            process::spawn_output_reader(Arc::clone(handle), generation, stderr);
        }
        health::spawn_health_monitor(
            self.clone(),
            Arc::clone(handle),
            generation,
            port,
            password,
            shutdown_rx,
        );
        Ok(())
    }

    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        let handle = self.handle(name).await?;
        self.stop_handle(&handle, StopCause::Operator).await;
        Ok(())
    }

    /// Terminate the live process, if any, and wait for it. The exit is
    /// classified here so the liveness poll never sees it.
    pub async fn stop_handle(&self, handle: &ServerHandle, cause: StopCause) {
        let mut server = handle.lock().await;
        self.stop_locked(&mut server, cause).await;
    }

    async fn stop_locked(&self, server: &mut ManagedServer, cause: StopCause) {
        server.config.auto_restart = false;
        if cause != StopCause::Watchdog {
            server.manual_stops += 1;
        }

        if server.child.is_none() {
            if cause == StopCause::Operator {
                server.status = ServerStatus::Stopped;
            }
            return;
        }

        server.manual_stop = true;
        server.log("[INFO] Stopping server...");
        let status = server.terminate_child(self.settings.stop_timeout()).await;
        server.observe_exit(&self.ports);
        server.log("[INFO] Server stopped.");
        tracing::info!(server = %server.config.name, ?status, ?cause, "server stopped");
    }

    /// Stop the unresponsive incarnation `generation` and start a fresh one
    /// after a short pause. Does nothing if that incarnation is already gone,
    /// and skips the start if the server was stopped, started or removed by
    /// anyone else during the pause.
    pub async fn watchdog_restart(&self, handle: &ServerHandle, generation: u64) {
        let stops = {
            let mut server = handle.lock().await;
            if !server.is_current(generation) {
                return;
            }
            self.stop_locked(&mut server, StopCause::Watchdog).await;
            server.manual_stops
        };

        tokio::time::sleep(self.settings.watchdog_restart_delay()).await;

        let server = handle.lock().await;
        if server.removed
            || server.status != ServerStatus::Stopped
            || server.manual_stops != stops
        {
            tracing::info!(server = %server.config.name, "watchdog restart skipped");
            return;
        }
        if let Err(e) = self.launch(handle, server, StartCause::Watchdog) {
            let mut server = handle.lock().await;
            server.log(format!("[ERROR] Watchdog restart failed: {e}"));
            tracing::warn!(server = %server.config.name, "watchdog restart failed: {e}");
        }
    }

    /// Stop whatever is running, then start every server in order. Servers
    /// that had to be stopped lose auto-restart, as with any stop.
    pub async fn restart_all(&self) -> RestartSummary {
        let mut summary = RestartSummary::default();
        let table: Vec<(String, ServerHandle)> = {
            let table = self.servers.read().await;
            table
                .iter()
                .map(|e| (e.name.clone(), Arc::clone(&e.handle)))
                .collect()
        };

        for (name, handle) in table {
            let running = handle.lock().await.child.is_some();
            if running {
                self.stop_handle(&handle, StopCause::Restart).await;
            }
            match self.start_handle(&handle, StartCause::Operator).await {
                Ok(()) => summary.started.push(name),
                Err(e) => summary.failed.push((name, e)),
            }
        }
        summary
    }

    // -- Liveness tick --

    /// One pass of the shared tick: reap exited processes and sample the
    /// live ones.
    pub async fn poll_all(&self) {
        for handle in self.handles().await {
            // An instance busy stopping or starting is polled next tick.
            let Ok(mut server) = handle.try_lock() else {
                continue;
            };
            if server.child.is_none() {
                continue;
            }
            match server.try_wait() {
                Ok(Some(status)) => self.handle_exit(&handle, &mut server, status),
                Ok(None) => {
                    if let Some(pid) = server.pid {
                        let sample = {
                            let mut sampler =
                                self.sampler.lock().unwrap_or_else(|e| e.into_inner());
                            sampler.sample(pid)
                        };
                        match sample {
                            Ok(sample) => server.resources.push(sample),
                            Err(e) => tracing::debug!(server = %server.config.name, "{e}"),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(server = %server.config.name, "failed to poll process: {e}");
                }
            }
        }
    }

    fn handle_exit(&self, handle: &ServerHandle, server: &mut ManagedServer, status: ExitStatus) {
        match server.observe_exit(&self.ports) {
            ExitOutcome::Stopped => {
                server.log("[INFO] Server stopped.");
            }
            ExitOutcome::Crashed => {
                server.log(format!("[ERROR] Server exited unexpectedly ({status})."));
                tracing::error!(server = %server.config.name, "server crashed: {status}");
                match server.log.write_crash_log(Local::now()) {
                    Ok(path) => server.log(format!("[INFO] Crash log saved: {}", path.display())),
                    Err(e) => {
                        tracing::warn!(server = %server.config.name, "failed to write crash log: {e}")
                    }
                }
                if server.config.auto_restart {
                    let delay = self.settings.restart_delay();
                    server.log(format!(
                        "[INFO] Auto-restart enabled. Restarting in {}s...",
                        delay.as_secs_f64()
                    ));
                    self.schedule_restart(Arc::clone(handle));
                }
            }
        }
    }

    /// Start a crashed server once after the restart delay, unless it was
    /// started, stopped, removed or had auto-restart turned off meanwhile.
    fn schedule_restart(&self, handle: ServerHandle) {
        let supervisor = self.clone();
        let delay = self.settings.restart_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let server = handle.lock().await;
            if server.removed
                || server.status != ServerStatus::Crashed
                || !server.config.auto_restart
            {
                return;
            }
            if let Err(e) = supervisor.launch(&handle, server, StartCause::CrashRestart) {
                let mut server = handle.lock().await;
                server.log(format!("[ERROR] Auto-restart failed: {e}"));
                tracing::warn!(server = %server.config.name, "auto-restart failed: {e}");
            }
        });
    }

    /// Run `poll_all` every poll interval until shutdown.
    pub fn spawn_tick(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(supervisor.settings.poll_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => supervisor.poll_all().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }

    // -- Operator commands --

    pub async fn export_log(
        &self,
        name: &str,
        path: Option<PathBuf>,
    ) -> Result<PathBuf, SupervisorError> {
        let handle = self.handle(name).await?;
        let mut server = handle.lock().await;
        let path = path.unwrap_or_else(|| self.paths.export_log(&server.config.name));
        server
            .log
            .export_snapshot(&path)
            .map_err(|source| SupervisorError::Export {
                path: path.display().to_string(),
                source,
            })?;
        server.log(format!("[INFO] Log exported to {}", path.display()));
        Ok(path)
    }

    /// Send an operator command over RCON. Transport problems come back as
    /// an `[ERROR]` reply string, the same way they appear in the log.
    pub async fn rcon(&self, name: &str, command: &str) -> Result<String, SupervisorError> {
        let handle = self.handle(name).await?;
        let command = command.trim();

        let (port, password) = {
            let mut server = handle.lock().await;
            if command.is_empty() {
                server.log("[WARN] No RCON command entered.");
                return Err(SupervisorError::InvalidConfig(
                    "RCON command cannot be empty".to_string(),
                ));
            }
            let port = server.active_port.or_else(|| server.config.port_number());
            let Some(port) = port else {
                let raw = server.config.port.clone();
                return Err(SupervisorError::InvalidConfig(format!("invalid port '{raw}'")));
            };
            server.log(format!("[RCON] Sending: {command}"));
            (port, server.rcon_password.clone())
        };

        let reply = match self.rcon.send(LOOPBACK, port, &password, command).await {
            Ok(reply) => reply,
            Err(RconError::NoCredential) => NO_PASSWORD_REPLY.to_string(),
            Err(e) => format!("[ERROR] {e}"),
        };

        handle
            .lock()
            .await
            .log(format!("[RCON] Response:\n{}", reply.trim_end()));
        Ok(reply)
    }

    pub async fn list(&self) -> Vec<ServerInfo> {
        let mut infos = Vec::new();
        for handle in self.handles().await {
            infos.push(handle.lock().await.to_server_info());
        }
        infos
    }

    pub async fn info(&self, name: &str) -> Result<ServerDetail, SupervisorError> {
        let handle = self.handle(name).await?;
        let server = handle.lock().await;
        Ok(server.to_server_detail())
    }

    pub async fn status(&self, name: &str) -> Result<ServerStatus, SupervisorError> {
        let handle = self.handle(name).await?;
        let status = handle.lock().await.status;
        Ok(status)
    }

    pub async fn log_tail(&self, name: &str, lines: usize) -> Result<Vec<String>, SupervisorError> {
        let handle = self.handle(name).await?;
        let server = handle.lock().await;
        Ok(server.log.tail(lines))
    }

    pub async fn subscribe_log(
        &self,
        name: &str,
    ) -> Result<broadcast::Receiver<String>, SupervisorError> {
        let handle = self.handle(name).await?;
        let server = handle.lock().await;
        Ok(server.log.subscribe())
    }

    // -- Sessions --

    pub async fn save_sessions(&self) -> Result<usize, SupervisorError> {
        let mut configs = Vec::new();
        for handle in self.handles().await {
            configs.push(handle.lock().await.config.clone());
        }
        config::save_sessions(&self.paths.sessions_file(), &configs)?;
        Ok(configs.len())
    }

    /// Add every persisted server. Nothing is started.
    pub async fn load_sessions(&self) -> Result<usize, SupervisorError> {
        let sessions = config::load_sessions(&self.paths.sessions_file())?;
        let mut loaded = 0;
        for session in sessions {
            match self.add(None, Some(session)).await {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!("skipping saved server: {e}"),
            }
        }
        Ok(loaded)
    }

    // -- Request dispatch --

    pub async fn dispatch(&self, request: Request, shutdown_tx: &watch::Sender<bool>) -> Response {
        let persist = request.changes_sessions();
        let response = match request {
            Request::Add { name, config } => match self.add(name, config).await {
                Ok(name) => success(format!("added '{name}'")),
                Err(e) => error(e),
            },
            Request::Set { name, update } => match self.update(&name, update).await {
                Ok(()) => success(format!("updated '{name}'")),
                Err(e) => error(e),
            },
            Request::Rename { name, new_name } => match self.rename(&name, &new_name).await {
                Ok(()) => success(format!("renamed '{name}' to '{}'", new_name.trim())),
                Err(e) => error(e),
            },
            Request::Remove { name } => match self.remove(&name).await {
                Ok(()) => success(format!("removed '{name}'")),
                Err(e) => error(e),
            },
            Request::Start { name } => match self.start(&name).await {
                Ok(()) => success(format!("started '{name}'")),
                Err(e) => error(e),
            },
            Request::Stop { name } => match self.stop(&name).await {
                Ok(()) => success(format!("stopped '{name}'")),
                Err(e) => error(e),
            },
            Request::RestartAll => {
                let summary = self.restart_all().await;
                restart_all_response(&summary)
            }
            Request::ExportLog { name, path } => {
                match self.export_log(&name, path.map(PathBuf::from)).await {
                    Ok(path) => success(format!("log exported to {}", path.display())),
                    Err(e) => error(e),
                }
            }
            Request::Rcon { name, command } => match self.rcon(&name, &command).await {
                Ok(response) => Response::RconReply { response },
                Err(e) => error(e),
            },
            Request::List => Response::ServerList {
                servers: self.list().await,
            },
            Request::Info { name } => match self.info(&name).await {
                Ok(detail) => Response::ServerDetail {
                    info: Box::new(detail),
                },
                Err(e) => error(e),
            },
            Request::Save => match self.save_sessions().await {
                Ok(n) => success(format!("saved {n} server(s)")),
                Err(e) => error(e),
            },
            Request::Kill => {
                let _ = shutdown_tx.send(true);
                success("daemon shutting down".to_string())
            }
            Request::Log { .. } => Response::Error {
                message: "unexpected dispatch for log".to_string(),
            },
        };

        if persist
            && matches!(response, Response::Success { .. })
            && let Err(e) = self.save_sessions().await
        {
            tracing::warn!("failed to save sessions: {e}");
        }
        response
    }

    /// Write the last `lines` log lines, then keep forwarding new ones while
    /// `follow` is set and the reader is connected.
    pub async fn stream_logs(
        &self,
        name: &str,
        lines: usize,
        follow: bool,
        writer: &mut (impl AsyncWriteExt + Unpin),
    ) -> color_eyre::Result<()> {
        // Subscribe before reading the tail so no line falls in between.
        let (tail, mut rx) = match self.handle(name).await {
            Ok(handle) => {
                let server = handle.lock().await;
                (server.log.tail(lines), server.log.subscribe())
            }
            Err(e) => {
                let encoded = protocol::encode_response(&error(e))?;
                writer.write_all(&encoded).await?;
                return Ok(());
            }
        };

        for line in tail {
            let encoded = protocol::encode_response(&Response::LogLine { line })?;
            writer.write_all(&encoded).await?;
        }
        writer.flush().await?;

        if !follow {
            return Ok(());
        }

        loop {
            match rx.recv().await {
                Ok(line) => {
                    let encoded = protocol::encode_response(&Response::LogLine { line })?;
                    if writer.write_all(&encoded).await.is_err() || writer.flush().await.is_err() {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(server = %name, skipped, "log follower lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

fn next_default_name(table: &[ServerEntry]) -> String {
    let mut n = table.len() + 1;
    loop {
        let candidate = format!("Server {n}");
        if !table.iter().any(|e| e.name == candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn success(message: String) -> Response {
    Response::Success {
        message: Some(message),
    }
}

fn error(e: SupervisorError) -> Response {
    Response::Error {
        message: e.to_string(),
    }
}

fn restart_all_response(summary: &RestartSummary) -> Response {
    if summary.failed.is_empty() {
        return success(format!("restarted: {}", summary.started.join(", ")));
    }
    let failures: Vec<String> = summary
        .failed
        .iter()
        .map(|(name, e)| format!("{name}: {e}"))
        .collect();
    if summary.started.is_empty() {
        Response::Error {
            message: format!("restart failed for {}", failures.join("; ")),
        }
    } else {
        success(format!(
            "restarted: {}; failed: {}",
            summary.started.join(", "),
            failures.join("; ")
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
