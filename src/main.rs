use clap::{CommandFactory, Parser};
use color_eyre::eyre::Context;
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL_CONDENSED};
use hmwsm::cli::{Cli, Command};
use hmwsm::config::{ServerConfig, ServerUpdate};
use hmwsm::protocol::{Request, Response, ServerStatus};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if cli.daemon {
        let paths = hmwsm::paths::Paths::new()?;
        hmwsm::daemon::run(paths).await?;
    } else if let Some(command) = cli.command {
        let paths = hmwsm::paths::Paths::new()?;
        let request = command_to_request(command)?;

        if matches!(request, Request::Log { .. }) {
            if cli.json {
                hmwsm::client::stream_request(&paths, &request, |resp| {
                    print_response_json(&resp);
                })?;
            } else {
                hmwsm::client::stream_request(&paths, &request, |resp| {
                    print_response(&resp);
                })?;
            }
        } else {
            let response = hmwsm::client::send_request(&paths, &request)?;
            if cli.json {
                print_response_json(&response);
            } else {
                print_response(&response);
                if should_auto_list(&request) {
                    let list_resp = hmwsm::client::send_request(&paths, &Request::List)?;
                    print_response(&list_resp);
                }
            }
            if matches!(response, Response::Error { .. }) {
                std::process::exit(1);
            }
        }
    } else {
        Cli::command().print_help()?;
    }

    Ok(())
}

fn should_auto_list(request: &Request) -> bool {
    matches!(
        request,
        Request::Start { .. } | Request::Stop { .. } | Request::RestartAll
    )
}

/// The daemon runs elsewhere, so paths given on the command line are made
/// absolute here.
fn absolute(path: &Path) -> color_eyre::Result<String> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("invalid path {}", path.display()))?;
    Ok(abs.to_string_lossy().into_owned())
}

fn absolute_opt(path: Option<PathBuf>) -> color_eyre::Result<Option<String>> {
    path.as_deref().map(absolute).transpose()
}

fn command_to_request(command: Command) -> color_eyre::Result<Request> {
    match command {
        Command::Add {
            name,
            exe,
            cfg,
            port,
            auto_restart,
        } => {
            let mut config = ServerConfig::new(name.unwrap_or_default());
            if let Some(exe) = absolute_opt(exe)? {
                config.exe = exe;
            }
            if let Some(cfg) = absolute_opt(cfg)? {
                config.cfg = cfg;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.auto_restart = auto_restart;
            Ok(Request::Add {
                name: None,
                config: Some(config),
            })
        }
        Command::Set {
            name,
            exe,
            cfg,
            port,
            auto_restart,
        } => Ok(Request::Set {
            name,
            update: ServerUpdate {
                exe: absolute_opt(exe)?,
                cfg: absolute_opt(cfg)?,
                port,
                auto_restart,
            },
        }),
        Command::Rename { name, new_name } => Ok(Request::Rename { name, new_name }),
        Command::Remove { name } => Ok(Request::Remove { name }),
        Command::Start { name } => Ok(Request::Start { name }),
        Command::Stop { name } => Ok(Request::Stop { name }),
        Command::RestartAll => Ok(Request::RestartAll),
        Command::Export { name, output } => Ok(Request::ExportLog {
            name,
            path: absolute_opt(output)?,
        }),
        Command::Rcon { name, command } => Ok(Request::Rcon {
            name,
            command: command.join(" "),
        }),
        Command::List => Ok(Request::List),
        Command::Info { name } => Ok(Request::Info { name }),
        Command::Log {
            name,
            lines,
            follow,
        } => Ok(Request::Log {
            name,
            lines,
            follow,
        }),
        Command::Save => Ok(Request::Save),
        Command::Kill => Ok(Request::Kill),
    }
}

fn print_response_json(response: &Response) {
    match serde_json::to_string(response) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("{} {e}", "error:".red().bold()),
    }
}

/// Operator-facing label for a status.
fn status_label(status: ServerStatus) -> &'static str {
    match status {
        ServerStatus::Offline => "🔴 Offline",
        ServerStatus::Starting => "🔄 Starting...",
        ServerStatus::Online => "🟢 Online",
        ServerStatus::Timeout => "🟠 Timeout (No RCON)",
        ServerStatus::Crashed => "🟠 Crashed",
        ServerStatus::Stopped => "⏹ Stopped",
    }
}

fn status_color(status: ServerStatus) -> Color {
    match status {
        ServerStatus::Online => Color::Green,
        ServerStatus::Starting | ServerStatus::Stopped => Color::Grey,
        ServerStatus::Timeout | ServerStatus::Crashed => Color::DarkYellow,
        ServerStatus::Offline => Color::Red,
    }
}

fn print_response(response: &Response) {
    match response {
        Response::Success { message } => {
            if let Some(msg) = message {
                println!("{}", msg.green());
            } else {
                println!("{}", "ok".green());
            }
        }
        Response::Error { message } => {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        Response::ServerList { servers } => {
            if servers.is_empty() {
                println!("{}", "no servers configured".yellow());
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL_CONDENSED);
                table.set_header(vec![
                    Cell::new("name").add_attribute(Attribute::Bold),
                    Cell::new("status").add_attribute(Attribute::Bold),
                    Cell::new("port").add_attribute(Attribute::Bold),
                    Cell::new("pid").add_attribute(Attribute::Bold),
                    Cell::new("cpu").add_attribute(Attribute::Bold),
                    Cell::new("mem").add_attribute(Attribute::Bold),
                    Cell::new("uptime").add_attribute(Attribute::Bold),
                    Cell::new("restarts").add_attribute(Attribute::Bold),
                    Cell::new("auto").add_attribute(Attribute::Bold),
                ]);
                for s in servers {
                    let pid = s
                        .pid
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let restarts = s.restarts.to_string();
                    let restarts_cell = if s.restarts > 0 {
                        Cell::new(&restarts).fg(Color::Yellow)
                    } else {
                        Cell::new(&restarts)
                    };
                    table.add_row(vec![
                        Cell::new(&s.name).fg(Color::Cyan),
                        Cell::new(status_label(s.status)).fg(status_color(s.status)),
                        Cell::new(&s.port),
                        Cell::new(&pid),
                        Cell::new(format_cpu(s.cpu_percent)),
                        Cell::new(format_memory_mb(s.memory_mb)),
                        Cell::new(format_uptime(s.uptime)),
                        restarts_cell,
                        Cell::new(if s.auto_restart { "on" } else { "off" }),
                    ]);
                }
                println!("{table}");
            }
        }
        Response::ServerDetail { info } => {
            let label = status_label(info.info.status);
            let colored_status = match info.info.status {
                ServerStatus::Online => label.green().to_string(),
                ServerStatus::Timeout | ServerStatus::Crashed => label.yellow().to_string(),
                ServerStatus::Offline => label.red().to_string(),
                ServerStatus::Starting | ServerStatus::Stopped => label.dimmed().to_string(),
            };
            println!("{}: {}", info.info.name.cyan().bold(), colored_status);
            println!("  {} {}", "exe:".dimmed(), or_dash(&info.exe));
            println!("  {} {}", "cfg:".dimmed(), or_dash(&info.cfg));
            println!("  {} {}", "port:".dimmed(), info.info.port);
            if let Some(pid) = info.info.pid {
                println!("  {} {pid}", "pid:".dimmed());
            }
            println!(
                "  {} {}",
                "rcon password:".dimmed(),
                if info.rcon_password_set { "set" } else { "missing" }
            );
            println!(
                "  {} {}",
                "auto-restart:".dimmed(),
                if info.info.auto_restart { "on" } else { "off" }
            );
            println!("  {} {}", "cpu:".dimmed(), format_cpu(info.info.cpu_percent));
            println!(
                "  {} {}",
                "memory:".dimmed(),
                format_memory_mb(info.info.memory_mb)
            );
            if info.avg_cpu_percent.is_some() || info.peak_memory_mb.is_some() {
                println!(
                    "  {} avg cpu {}, peak mem {}",
                    "history:".dimmed(),
                    format_cpu(info.avg_cpu_percent),
                    format_memory_mb(info.peak_memory_mb)
                );
            }
            println!("  {} {}", "uptime:".dimmed(), format_uptime(info.info.uptime));
            println!("  {} {}", "restarts:".dimmed(), info.info.restarts);
            if info.consecutive_failed_pings > 0 || info.timeout_escalations > 0 {
                println!(
                    "  {} {} failed, {} escalation(s)",
                    "pings:".dimmed(),
                    info.consecutive_failed_pings,
                    info.timeout_escalations
                );
            }
            println!("  {} {}", "log:".dimmed(), info.log_file);
        }
        Response::RconReply { response } => {
            println!("{}", response.trim_end());
        }
        Response::LogLine { line } => {
            println!("{line}");
        }
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn format_cpu(cpu: Option<f64>) -> String {
    match cpu {
        Some(v) => format!("{v:.1}%"),
        None => "-".to_string(),
    }
}

fn format_memory_mb(mb: Option<f64>) -> String {
    match mb {
        None => "-".to_string(),
        Some(m) if m < 1024.0 => format!("{m:.1}M"),
        Some(m) => format!("{:.2}G", m / 1024.0),
    }
}

fn format_uptime(seconds: Option<u64>) -> String {
    match seconds {
        None => "-".to_string(),
        Some(s) if s < 60 => format!("{s}s"),
        Some(s) if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        Some(s) if s < 86400 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        Some(s) => format!("{}d {}h", s / 86400, (s % 86400) / 3600),
    }
}
