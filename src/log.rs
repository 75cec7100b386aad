use crate::paths::Paths;
use chrono::{DateTime, Local, NaiveDate};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lines kept in memory per server.
pub const LOG_TAIL_CAP: usize = 500;

const FOLLOW_CHANNEL_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// LogSink
// ---------------------------------------------------------------------------

/// Per-server log: a daily file on disk plus a bounded in-memory tail.
///
/// Every line is stamped `[HH:MM:SS] ` and appended to
/// `<logs>/<name>_<YYYY-MM-DD>.log`. The file is chosen by comparing the wall
/// clock date on every append, so a new day starts a new file and earlier days
/// are never touched again.
#[derive(Debug)]
pub struct LogSink {
    name: String,
    paths: Paths,
    current_date: NaiveDate,
    tail: VecDeque<String>,
    cap: usize,
    followers: broadcast::Sender<String>,
}

impl LogSink {
    pub fn new(name: impl Into<String>, paths: Paths) -> Self {
        Self::with_cap(name, paths, LOG_TAIL_CAP)
    }

    pub fn with_cap(name: impl Into<String>, paths: Paths, cap: usize) -> Self {
        let (followers, _) = broadcast::channel(FOLLOW_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            paths,
            current_date: Local::now().date_naive(),
            tail: VecDeque::with_capacity(cap),
            cap,
            followers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Future appends go to the renamed server's daily file.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn current_file(&self) -> PathBuf {
        self.paths.daily_log(&self.name, self.current_date)
    }

    /// Stamp, persist and remember one line. Returns the stamped line.
    pub fn append(&mut self, message: &str) -> String {
        self.append_at(Local::now(), message)
    }

    pub(crate) fn append_at(&mut self, now: DateTime<Local>, message: &str) -> String {
        let line = format!("{} {message}", now.format("[%H:%M:%S]"));

        let today = now.date_naive();
        if today != self.current_date {
            self.current_date = today;
        }

        if let Err(e) = self.persist(&line) {
            tracing::warn!(
                server = %self.name,
                path = %self.current_file().display(),
                "failed to write log file: {e}"
            );
        }

        self.tail.push_back(line.clone());
        while self.tail.len() > self.cap {
            self.tail.pop_front();
        }

        // No receivers is the common case.
        let _ = self.followers.send(line.clone());
        line
    }

    fn persist(&self, line: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.paths.log_dir())?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_file())?;
        writeln!(file, "{line}")
    }

    pub fn lines(&self) -> impl Iterator<Item = &String> {
        self.tail.iter()
    }

    pub fn len(&self) -> usize {
        self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    /// The last `n` lines in order.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.tail.len().saturating_sub(n);
        self.tail.iter().skip(skip).cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.followers.subscribe()
    }

    /// Write the whole in-memory tail to `path`, replacing any existing file.
    pub fn export_snapshot(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut content = self.tail.iter().fold(String::new(), |mut acc, line| {
            acc.push_str(line);
            acc.push('\n');
            acc
        });
        if content.ends_with('\n') {
            content.pop();
        }
        std::fs::write(path, content)
    }

    /// Dump the tail into a timestamped file under `<logs>/crashes/`.
    pub fn write_crash_log(&self, at: DateTime<Local>) -> io::Result<PathBuf> {
        let path = self.paths.crash_log(&self.name, at);
        self.export_snapshot(&path)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
