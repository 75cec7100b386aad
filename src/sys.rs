use crate::paths::Paths;
use std::io;

// =========================================================================
// Unix implementation
// =========================================================================

#[cfg(unix)]
mod platform {
    use super::*;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::os::unix::process::CommandExt;

    /// Ask a process to exit. Delivered as SIGTERM.
    pub fn terminate(pid: u32) -> io::Result<()> {
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::other)
    }

    pub fn is_pid_alive(pid: u32) -> bool {
        match signal::kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => true,
            Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    // -- IPC (async) --

    pub async fn ipc_bind(paths: &Paths) -> io::Result<tokio::net::UnixListener> {
        let socket_path = paths.socket_file();
        if socket_path.exists() {
            tokio::fs::remove_file(&socket_path).await?;
        }
        tokio::net::UnixListener::bind(&socket_path)
    }

    pub async fn ipc_cleanup(paths: &Paths) {
        let _ = tokio::fs::remove_file(paths.socket_file()).await;
    }

    pub fn ipc_exists(paths: &Paths) -> bool {
        paths.socket_file().exists()
    }

    // -- IPC (sync, client) --

    pub fn ipc_connect(paths: &Paths) -> io::Result<std::os::unix::net::UnixStream> {
        std::os::unix::net::UnixStream::connect(paths.socket_file())
    }

    // -- Daemon spawn helper --

    pub fn configure_daemon_cmd(cmd: &mut std::process::Command) {
        cmd.process_group(0);
    }

    // -- Signal shutdown (async) --

    pub async fn signal_shutdown() {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("cannot install signal handlers: {e}");
                    std::future::pending::<()>().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
}

// =========================================================================
// Windows implementation
// =========================================================================

#[cfg(windows)]
mod platform {
    use super::*;

    /// Windows has no graceful signal for console-less children, so this is
    /// TerminateProcess.
    pub fn terminate(pid: u32) -> io::Result<()> {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_TERMINATE, TerminateProcess,
        };

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(io::Error::last_os_error());
            }
            let result = TerminateProcess(handle, 1);
            CloseHandle(handle);
            if result == 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    pub fn is_pid_alive(pid: u32) -> bool {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION,
        };

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            let mut exit_code: u32 = 0;
            let result = GetExitCodeProcess(handle, &mut exit_code);
            CloseHandle(handle);
            // STILL_ACTIVE = 259
            result != 0 && exit_code == 259
        }
    }

    // -- IPC (async) --

    pub async fn ipc_bind(paths: &Paths) -> io::Result<tokio::net::TcpListener> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::fs::write(paths.port_file(), port.to_string()).await?;
        Ok(listener)
    }

    pub async fn ipc_cleanup(paths: &Paths) {
        let _ = tokio::fs::remove_file(paths.port_file()).await;
    }

    pub fn ipc_exists(paths: &Paths) -> bool {
        paths.port_file().exists()
    }

    // -- IPC (sync, client) --

    pub fn ipc_connect(paths: &Paths) -> io::Result<std::net::TcpStream> {
        let port_str = std::fs::read_to_string(paths.port_file())?;
        let port: u16 = port_str
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::net::TcpStream::connect(("127.0.0.1", port))
    }

    // -- Daemon spawn helper --

    pub fn configure_daemon_cmd(cmd: &mut std::process::Command) {
        use std::os::windows::process::CommandExt;
        // CREATE_NEW_PROCESS_GROUP = 0x00000200
        cmd.creation_flags(0x00000200);
    }

    // -- Signal shutdown (async) --

    pub async fn signal_shutdown() {
        tokio::signal::ctrl_c().await.ok();
    }
}

// =========================================================================
// Re-exports
// =========================================================================

pub use platform::*;

// =========================================================================
// Type aliases for IPC streams that differ by platform
// =========================================================================

#[cfg(unix)]
pub type IpcListener = tokio::net::UnixListener;

#[cfg(windows)]
pub type IpcListener = tokio::net::TcpListener;

#[cfg(unix)]
pub type IpcStream = tokio::net::UnixStream;

#[cfg(windows)]
pub type IpcStream = tokio::net::TcpStream;

#[cfg(unix)]
pub type SyncIpcStream = std::os::unix::net::UnixStream;

#[cfg(windows)]
pub type SyncIpcStream = std::net::TcpStream;

pub async fn ipc_accept(listener: &IpcListener) -> io::Result<IpcStream> {
    let (stream, _addr) = listener.accept().await?;
    Ok(stream)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_pid_alive(pid));
    }

    #[tokio::test]
    async fn test_terminate_stops_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        terminate(child.id().unwrap()).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
