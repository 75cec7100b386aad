use crate::config::{ServerConfig, ServerUpdate};
use serde::{Deserialize, Serialize};

fn default_log_lines() -> usize {
    15
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Add {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<ServerConfig>,
    },
    Set {
        name: String,
        update: ServerUpdate,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Remove {
        name: String,
    },
    Start {
        name: String,
    },
    Stop {
        name: String,
    },
    RestartAll,
    ExportLog {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Rcon {
        name: String,
        command: String,
    },
    List,
    Info {
        name: String,
    },
    Log {
        name: String,
        #[serde(default = "default_log_lines")]
        lines: usize,
        #[serde(default)]
        follow: bool,
    },
    Save,
    Kill,
}

impl Request {
    /// Requests after which the session file is rewritten.
    pub fn changes_sessions(&self) -> bool {
        matches!(
            self,
            Request::Add { .. }
                | Request::Set { .. }
                | Request::Rename { .. }
                | Request::Remove { .. }
                | Request::Stop { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
    ServerList {
        servers: Vec<ServerInfo>,
    },
    ServerDetail {
        info: Box<ServerDetail>,
    },
    RconReply {
        response: String,
    },
    LogLine {
        line: String,
    },
}

/// Lifecycle state of one server. Display labels for operators live in the
/// CLI; this is the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Offline,
    Starting,
    Online,
    Timeout,
    Crashed,
    Stopped,
}

impl ServerStatus {
    /// A process is expected to be alive in these states.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ServerStatus::Starting | ServerStatus::Online | ServerStatus::Timeout
        )
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Offline => write!(f, "offline"),
            ServerStatus::Starting => write!(f, "starting"),
            ServerStatus::Online => write!(f, "online"),
            ServerStatus::Timeout => write!(f, "timeout"),
            ServerStatus::Crashed => write!(f, "crashed"),
            ServerStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub status: ServerStatus,
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(default)]
    pub auto_restart: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDetail {
    #[serde(flatten)]
    pub info: ServerInfo,
    pub exe: String,
    pub cfg: String,
    pub rcon_password_set: bool,
    #[serde(default)]
    pub consecutive_failed_pings: u32,
    #[serde(default)]
    pub timeout_escalations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cpu_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory_mb: Option<f64>,
    pub log_file: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to serialize/deserialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn encode_request(req: &Request) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(req)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn decode_request(line: &str) -> Result<Request, ProtocolError> {
    let trimmed = line.trim_end();
    Ok(serde_json::from_str(trimmed)?)
}

pub fn encode_response(resp: &Response) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(resp)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn decode_response(line: &str) -> Result<Response, ProtocolError> {
    let trimmed = line.trim_end();
    Ok(serde_json::from_str(trimmed)?)
}
