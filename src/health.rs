use crate::process::ServerHandle;
use crate::protocol::ServerStatus;
use crate::rcon::{LOOPBACK, RconError};
use crate::supervisor::Supervisor;
use tokio::sync::watch;

/// Consecutive failed pings that make up one timeout escalation.
pub const FAILURES_PER_ESCALATION: u32 = 3;
/// Escalations after which the server is restarted.
pub const ESCALATIONS_BEFORE_RESTART: u32 = 3;

// ---------------------------------------------------------------------------
// HealthTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Healthy,
    /// First success after at least one escalation.
    Recovered,
    Missed { consecutive: u32 },
    Timeout { escalation: u32 },
    Unresponsive,
}

/// Ping bookkeeping for one incarnation. Any successful ping clears both
/// counters.
#[derive(Debug, Clone, Default)]
pub struct HealthTracker {
    consecutive_failed_pings: u32,
    timeout_escalations: u32,
}

impl HealthTracker {
    pub fn record(&mut self, ok: bool) -> HealthEvent {
        if ok {
            let recovered = self.timeout_escalations > 0;
            self.consecutive_failed_pings = 0;
            self.timeout_escalations = 0;
            return if recovered {
                HealthEvent::Recovered
            } else {
                HealthEvent::Healthy
            };
        }

        self.consecutive_failed_pings += 1;
        if self.consecutive_failed_pings < FAILURES_PER_ESCALATION {
            return HealthEvent::Missed {
                consecutive: self.consecutive_failed_pings,
            };
        }

        self.consecutive_failed_pings = 0;
        self.timeout_escalations += 1;
        if self.timeout_escalations >= ESCALATIONS_BEFORE_RESTART {
            HealthEvent::Unresponsive
        } else {
            HealthEvent::Timeout {
                escalation: self.timeout_escalations,
            }
        }
    }

    pub fn consecutive_failed_pings(&self) -> u32 {
        self.consecutive_failed_pings
    }

    pub fn timeout_escalations(&self) -> u32 {
        self.timeout_escalations
    }
}

/// A ping only counts when something non-blank came back.
pub fn ping_succeeded(result: &Result<String, RconError>) -> bool {
    matches!(result, Ok(body) if !body.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Monitor task
// ---------------------------------------------------------------------------

/// Ping the server over RCON for as long as `generation` stays live. Stops on
/// shutdown, on a new incarnation, or after handing an unresponsive server to
/// the watchdog restart.
pub fn spawn_health_monitor(
    supervisor: Supervisor,
    handle: ServerHandle,
    generation: u64,
    port: u16,
    password: String,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let interval = supervisor.settings().ping_interval();
        let client = supervisor.rcon_client();

        loop {
            if *shutdown_rx.borrow() {
                return;
            }

            let result = client.ping(LOOPBACK, port, &password).await;
            let ok = ping_succeeded(&result);

            let event = {
                let mut server = handle.lock().await;
                if !server.is_current(generation) {
                    return;
                }
                let event = server.health.record(ok);
                match event {
                    HealthEvent::Healthy => {}
                    HealthEvent::Recovered => {
                        if server.status == ServerStatus::Timeout {
                            server.status = ServerStatus::Online;
                        }
                        server.log("[INFO] RCON responded again. Server recovered.");
                    }
                    HealthEvent::Missed { consecutive } => {
                        if let Err(e) = &result {
                            tracing::debug!(server = %server.config.name, consecutive, "ping failed: {e}");
                        }
                    }
                    HealthEvent::Timeout { escalation } => {
                        server.status = ServerStatus::Timeout;
                        server.log(format!(
                            "[WARN] RCON ping failed {FAILURES_PER_ESCALATION}x. Server may be frozen. ({escalation}/{ESCALATIONS_BEFORE_RESTART})"
                        ));
                        tracing::warn!(server = %server.config.name, escalation, "server not answering RCON");
                    }
                    HealthEvent::Unresponsive => {
                        server.status = ServerStatus::Timeout;
                        server.log(format!(
                            "[WARN] RCON ping failed {FAILURES_PER_ESCALATION}x. Server may be frozen. ({ESCALATIONS_BEFORE_RESTART}/{ESCALATIONS_BEFORE_RESTART})"
                        ));
                        server.log(format!(
                            "[ERROR] RCON frozen warning hit {ESCALATIONS_BEFORE_RESTART}x. Restarting server."
                        ));
                        tracing::warn!(server = %server.config.name, "server unresponsive, restarting");
                    }
                }
                event
            };

            if event == HealthEvent::Unresponsive {
                supervisor.watchdog_restart(&handle, generation).await;
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return;
                    }
                }
            }
        }
    });
}
