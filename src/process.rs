use crate::config::{self, ServerConfig};
use crate::health::HealthTracker;
use crate::log::LogSink;
use crate::paths::Paths;
use crate::ports::PortRegistry;
use crate::protocol::{ServerDetail, ServerInfo, ServerStatus};
use crate::resources::ResourceHistory;
use crate::sys;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Printed by the game server once it accepts players.
pub const READY_MARKER: &str = "Server started!";

// ---------------------------------------------------------------------------
// Launch command
// ---------------------------------------------------------------------------

/// Arguments passed to the server executable. The config is referenced by
/// file name only because the server resolves it relative to its own
/// directory.
pub fn launch_args(cfg: &Path, port: u16) -> Vec<String> {
    let cfg_name = cfg
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    vec![
        "-dedicated".to_string(),
        "-memoryfix".to_string(),
        "+exec".to_string(),
        cfg_name,
        "+set".to_string(),
        "net_port".to_string(),
        port.to_string(),
        "+map_rotate".to_string(),
    ]
}

pub fn build_command(exe: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new(exe);
    cmd.args(args);
    if let Some(dir) = exe.parent()
        && !dir.as_os_str().is_empty()
    {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

// ---------------------------------------------------------------------------
// ManagedServer
// ---------------------------------------------------------------------------

pub type ServerHandle = Arc<Mutex<ManagedServer>>;

/// How a running incarnation ended, as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// An operator or the watchdog asked for it.
    Stopped,
    Crashed,
}

/// Runtime state of one configured server.
///
/// Every successful launch bumps `generation`. Background tasks capture the
/// generation they were started for and go quiet once it no longer matches
/// or the child is gone, so output and pings from an old process can never
/// touch a newer one.
pub struct ManagedServer {
    pub config: ServerConfig,
    pub status: ServerStatus,
    pub rcon_password: String,
    pub child: Option<Child>,
    pub pid: Option<u32>,
    /// Port reserved for the live process. May differ from `config.port`
    /// after an edit while running.
    pub active_port: Option<u16>,
    pub generation: u64,
    pub manual_stop: bool,
    /// Bumped by every stop not issued by the watchdog itself.
    pub manual_stops: u64,
    pub removed: bool,
    pub monitor_shutdown: Option<watch::Sender<bool>>,
    pub health: HealthTracker,
    pub restarts: u32,
    pub started_at: Option<Instant>,
    pub log: LogSink,
    pub resources: ResourceHistory,
}

impl ManagedServer {
    pub fn new(config: ServerConfig, paths: Paths) -> Self {
        let log = LogSink::new(config.name.clone(), paths);
        let mut server = Self {
            config,
            status: ServerStatus::Offline,
            rcon_password: String::new(),
            child: None,
            pid: None,
            active_port: None,
            generation: 0,
            manual_stop: false,
            manual_stops: 0,
            removed: false,
            monitor_shutdown: None,
            health: HealthTracker::default(),
            restarts: 0,
            started_at: None,
            log,
            resources: ResourceHistory::default(),
        };
        server.refresh_rcon_password();
        server
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// True while `generation` is the live incarnation.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.child.is_some()
    }

    pub fn log(&mut self, message: impl AsRef<str>) {
        self.log.append(message.as_ref());
    }

    pub fn refresh_rcon_password(&mut self) {
        self.rcon_password =
            config::read_rcon_password(Path::new(&self.config.cfg)).unwrap_or_default();
    }

    pub fn rename(&mut self, new_name: &str) {
        self.config.name = new_name.to_string();
        self.log.rename(new_name);
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Record a freshly spawned child as the live incarnation and return the
    /// generation and shutdown receiver its background tasks should carry.
    pub fn begin_incarnation(
        &mut self,
        child: Child,
        port: u16,
    ) -> (u64, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        self.generation += 1;
        self.pid = child.id();
        self.child = Some(child);
        self.active_port = Some(port);
        self.monitor_shutdown = Some(tx);
        self.manual_stop = false;
        self.health = HealthTracker::default();
        self.started_at = Some(Instant::now());
        self.resources = ResourceHistory::default();
        self.status = ServerStatus::Starting;
        (self.generation, rx)
    }

    /// Non-blocking exit check of the live child.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }

    /// Ask the child to exit and wait up to `timeout`, then kill it.
    /// Returns the exit status when one could be collected.
    pub async fn terminate_child(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;

        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }

        if let Some(pid) = child.id()
            && let Err(e) = sys::terminate(pid)
        {
            tracing::debug!(server = %self.config.name, pid, "terminate failed: {e}");
        }

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!(server = %self.config.name, "wait failed: {e}");
                None
            }
            Err(_) => {
                self.log.append("[WARN] Graceful shutdown timed out, killing process.");
                if let Err(e) = child.kill().await {
                    tracing::warn!(server = %self.config.name, "kill failed: {e}");
                }
                child.try_wait().ok().flatten()
            }
        }
    }

    /// Tear down the live incarnation after its process has exited and
    /// classify the exit. A pending manual stop is consumed here, so it
    /// applies to exactly one exit.
    pub fn observe_exit(&mut self, ports: &PortRegistry) -> ExitOutcome {
        if let Some(tx) = self.monitor_shutdown.take() {
            let _ = tx.send(true);
        }
        self.child = None;
        self.pid = None;
        self.started_at = None;
        if let Some(port) = self.active_port.take() {
            ports.release(port);
        }

        if std::mem::take(&mut self.manual_stop) {
            self.status = ServerStatus::Stopped;
            ExitOutcome::Stopped
        } else {
            self.status = ServerStatus::Crashed;
            ExitOutcome::Crashed
        }
    }

    pub fn to_server_info(&self) -> ServerInfo {
        let latest = self.resources.latest();
        ServerInfo {
            name: self.config.name.clone(),
            status: self.status,
            port: self.config.port.clone(),
            pid: self.pid,
            uptime: self.uptime().map(|d| d.as_secs()),
            restarts: self.restarts,
            cpu_percent: latest.map(|s| s.cpu_percent),
            memory_mb: latest.map(|s| s.memory_mb),
            auto_restart: self.config.auto_restart,
        }
    }

    pub fn to_server_detail(&self) -> ServerDetail {
        ServerDetail {
            info: self.to_server_info(),
            exe: self.config.exe.clone(),
            cfg: self.config.cfg.clone(),
            rcon_password_set: !self.rcon_password.is_empty(),
            consecutive_failed_pings: self.health.consecutive_failed_pings(),
            timeout_escalations: self.health.timeout_escalations(),
            avg_cpu_percent: self.resources.average().map(|s| s.cpu_percent),
            peak_memory_mb: self.resources.peak_memory_mb(),
            log_file: self.log.current_file().to_string_lossy().into_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output readers
// ---------------------------------------------------------------------------

/// Forward each line of a child stream into the server's log. The first
/// ready marker while starting flips the server online.
pub fn spawn_output_reader<R>(handle: ServerHandle, generation: u64, stream: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => return,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("output reader stopped: {e}");
                    return;
                }
            }

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }

            let mut server = handle.lock().await;
            if !server.is_current(generation) {
                return;
            }
            server.log(line);
            if server.status == ServerStatus::Starting && line.contains(READY_MARKER) {
                server.status = ServerStatus::Online;
                tracing::info!(server = %server.config.name, "server online");
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn server(dir: &tempfile::TempDir) -> ManagedServer {
        ManagedServer::new(
            ServerConfig::new("Server 1"),
            Paths::with_base(dir.path().to_path_buf()),
        )
    }

    #[test]
    fn test_launch_args() {
        let args = launch_args(Path::new("/srv/hmw/configs/tdm.cfg"), 27017);
        assert_eq!(
            args,
            vec![
                "-dedicated",
                "-memoryfix",
                "+exec",
                "tdm.cfg",
                "+set",
                "net_port",
                "27017",
                "+map_rotate",
            ]
        );
    }

    #[test]
    fn test_build_command_uses_exe_dir() {
        let cmd = build_command(Path::new("/srv/hmw/hmw-mod.exe"), &[]);
        assert_eq!(
            cmd.as_std().get_current_dir(),
            Some(Path::new("/srv/hmw"))
        );
    }

    #[test]
    fn test_new_server_is_offline() {
        let dir = tempfile::tempdir().unwrap();
        let s = server(&dir);
        assert_eq!(s.status, ServerStatus::Offline);
        assert!(!s.is_running());
        assert!(s.rcon_password.is_empty());
        assert!(!s.is_current(0));
    }

    #[test]
    fn test_new_server_reads_password() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("server.cfg");
        std::fs::write(&cfg, "set rcon_password \"pw\"\n").unwrap();
        let mut config = ServerConfig::new("a");
        config.cfg = cfg.to_string_lossy().into_owned();
        let s = ManagedServer::new(config, Paths::with_base(dir.path().to_path_buf()));
        assert_eq!(s.rcon_password, "pw");
        assert!(s.to_server_detail().rcon_password_set);
    }

    #[test]
    fn test_observe_exit_without_manual_stop_is_crash() {
        let dir = tempfile::tempdir().unwrap();
        let ports = PortRegistry::new();
        assert!(ports.try_reserve(27016));
        let mut s = server(&dir);
        s.status = ServerStatus::Online;
        s.active_port = Some(27016);

        assert_eq!(s.observe_exit(&ports), ExitOutcome::Crashed);
        assert_eq!(s.status, ServerStatus::Crashed);
        assert!(!ports.is_reserved(27016));
        assert!(s.active_port.is_none());
    }

    #[test]
    fn test_manual_stop_applies_once() {
        let dir = tempfile::tempdir().unwrap();
        let ports = PortRegistry::new();
        let mut s = server(&dir);
        s.manual_stop = true;
        assert_eq!(s.observe_exit(&ports), ExitOutcome::Stopped);
        assert_eq!(s.status, ServerStatus::Stopped);
        assert!(!s.manual_stop);
        assert_eq!(s.observe_exit(&ports), ExitOutcome::Crashed);
    }

    #[test]
    fn test_rename_updates_config_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = server(&dir);
        s.rename("tdm");
        assert_eq!(s.name(), "tdm");
        assert_eq!(s.log.name(), "tdm");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_begin_incarnation_and_reader() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg("echo booting; echo 'Server started!'; sleep 5")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().unwrap();
        let stdout = child.stdout.take().unwrap();

        let handle: ServerHandle = Arc::new(Mutex::new(server(&dir)));
        let generation = {
            let mut s = handle.lock().await;
            let (generation, _rx) = s.begin_incarnation(child, 27016);
            assert_eq!(s.status, ServerStatus::Starting);
            assert!(s.pid.is_some());
            generation
        };
        spawn_output_reader(handle.clone(), generation, stdout);

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if handle.lock().await.status == ServerStatus::Online {
                break;
            }
            assert!(Instant::now() < deadline, "server never came online");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut s = handle.lock().await;
        assert!(s.log.lines().any(|l| l.ends_with("booting")));
        let status = s.terminate_child(Duration::from_secs(2)).await;
        assert!(status.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_child_kills_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("trap '' TERM; sleep 30");
        let child = cmd.spawn().unwrap();

        let mut s = server(&dir);
        s.begin_incarnation(child, 27016);
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        s.terminate_child(Duration::from_millis(300)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(s.log.lines().any(|l| l.contains("killing process")));
        assert!(s.try_wait().unwrap().is_some());
    }
}
