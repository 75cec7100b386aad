use crate::paths::Paths;
use crate::sys;
use std::fs;
use std::io;

pub fn write_pid_file(paths: &Paths) -> io::Result<()> {
    let pid = std::process::id();
    fs::write(paths.pid_file(), pid.to_string())
}

pub fn read_pid_file(paths: &Paths) -> Option<u32> {
    fs::read_to_string(paths.pid_file())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

pub fn remove_pid_file(paths: &Paths) {
    let _ = fs::remove_file(paths.pid_file());
}

/// True when the pid file names a live process. A stale pid file is removed.
pub fn is_daemon_running(paths: &Paths) -> bool {
    let Some(pid) = read_pid_file(paths) else {
        return false;
    };
    if sys::is_pid_alive(pid) {
        return true;
    }
    remove_pid_file(paths);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());

        write_pid_file(&paths).unwrap();
        assert_eq!(read_pid_file(&paths), Some(std::process::id()));
    }

    #[test]
    fn test_read_nonexistent_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().join("missing"));
        assert_eq!(read_pid_file(&paths), None);
        assert!(!is_daemon_running(&paths));
    }

    #[test]
    fn test_is_daemon_running_with_self() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());

        write_pid_file(&paths).unwrap();
        assert!(is_daemon_running(&paths));
    }

    #[test]
    fn test_is_daemon_running_stale_pid() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());

        fs::write(paths.pid_file(), "4294967").unwrap();
        assert!(!is_daemon_running(&paths));
        assert!(!paths.pid_file().exists());
    }

    #[test]
    fn test_garbage_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());

        fs::write(paths.pid_file(), "not a pid").unwrap();
        assert_eq!(read_pid_file(&paths), None);
    }
}
