use chrono::{DateTime, Local, NaiveDate};
use color_eyre::eyre::bail;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    pub fn new() -> color_eyre::Result<Self> {
        if let Ok(path) = std::env::var("HMWSM_DATA_DIR") {
            return Ok(Self {
                data_dir: PathBuf::from(path),
            });
        }
        let Some(base) = dirs::data_dir() else {
            bail!("could not determine data directory");
        };
        Ok(Self {
            data_dir: base.join("hmwsm"),
        })
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { data_dir: base }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("hmwsm.pid")
    }

    pub fn socket_file(&self) -> PathBuf {
        self.data_dir.join("hmwsm.sock")
    }

    pub fn port_file(&self) -> PathBuf {
        self.data_dir.join("hmwsm.port")
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.data_dir.join("sessions.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("hmwsm.toml")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.data_dir.join("daemon.log")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn crash_dir(&self) -> PathBuf {
        self.log_dir().join("crashes")
    }

    /// `<logs>/<name_with_underscores>_<YYYY-MM-DD>.log`
    pub fn daily_log(&self, name: &str, date: NaiveDate) -> PathBuf {
        self.log_dir().join(format!(
            "{}_{}.log",
            file_stem(name),
            date.format("%Y-%m-%d")
        ))
    }

    pub fn crash_log(&self, name: &str, at: DateTime<Local>) -> PathBuf {
        self.crash_dir().join(format!(
            "{}_crash_{}.log",
            file_stem(name),
            at.format("%Y-%m-%d_%H-%M-%S")
        ))
    }

    pub fn export_log(&self, name: &str) -> PathBuf {
        self.log_dir()
            .join(format!("{}_manual_export.txt", file_stem(name)))
    }
}

/// Server names may contain spaces; log file names use underscores instead.
pub fn file_stem(name: &str) -> String {
    name.replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_data_dir_linux() {
        if std::env::var("HMWSM_DATA_DIR").is_ok() {
            return;
        }
        let paths = Paths::new().unwrap();
        let data_dir = paths.data_dir().to_str().unwrap();
        assert!(
            data_dir.ends_with(".local/share/hmwsm") || data_dir.contains("hmwsm"),
            "expected Linux data dir, got: {data_dir}"
        );
    }

    #[test]
    fn test_files_under_data_dir() {
        let paths = Paths::with_base(PathBuf::from("/tmp/hmwsm-test"));
        for file in [
            paths.pid_file(),
            paths.socket_file(),
            paths.sessions_file(),
            paths.settings_file(),
            paths.daemon_log(),
            paths.log_dir(),
        ] {
            assert!(file.starts_with(paths.data_dir()), "{file:?}");
        }
        assert!(paths.sessions_file().ends_with("sessions.json"));
    }

    #[test]
    fn test_daily_log_replaces_spaces() {
        let paths = Paths::with_base(PathBuf::from("/tmp/hmwsm-test"));
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let log = paths.daily_log("Server 1", date);
        assert!(log.ends_with("logs/Server_1_2024-03-09.log"));
    }

    #[test]
    fn test_crash_log_format() {
        let paths = Paths::with_base(PathBuf::from("/tmp/hmwsm-test"));
        let at = Local.with_ymd_and_hms(2024, 12, 31, 23, 5, 7).unwrap();
        let log = paths.crash_log("tdm", at);
        assert!(log.ends_with("logs/crashes/tdm_crash_2024-12-31_23-05-07.log"));
    }

    #[test]
    fn test_export_log_format() {
        let paths = Paths::with_base(PathBuf::from("/tmp/hmwsm-test"));
        assert!(
            paths
                .export_log("Search and Destroy")
                .ends_with("logs/Search_and_Destroy_manual_export.txt")
        );
    }
}
