// Server Capability Adapter
// Lifecycle actions over the remote-shell transport

use crate::application::constants::{
    REBOOT_COMMAND, REBOOT_FALLBACK_COMMAND, SHUTDOWN_COMMAND, SHUTDOWN_FALLBACK_COMMAND,
};
use crate::domain::{Action, ActionResult, Server};
use crate::port::{RemoteShell, ShellError};
use std::sync::Arc;
use tracing::{info, warn};

/// Disruption classification for destructive actions.
///
/// A session that drops during or right after a shutdown/reboot command is
/// the expected signature of a host actually going down, so it is scored
/// as success. Connect and auth failures never qualify: they happen before
/// any command ran.
pub fn is_expected_disconnect(err: &ShellError) -> bool {
    matches!(err, ShellError::Disconnected(_))
}

/// Executes lifecycle actions against bare servers
#[derive(Clone)]
pub struct ServerAdapter {
    shell: Arc<dyn RemoteShell>,
}

impl ServerAdapter {
    pub fn new(shell: Arc<dyn RemoteShell>) -> Self {
        Self { shell }
    }

    /// Execute a lifecycle action against a server
    pub async fn execute(&self, server: &Server, action: Action) -> ActionResult {
        info!(
            server = %server.name,
            hostname = %server.hostname,
            action = %action,
            "Executing server action"
        );
        match action {
            Action::Stop => {
                self.run_destructive(
                    server,
                    SHUTDOWN_COMMAND,
                    SHUTDOWN_FALLBACK_COMMAND,
                    "Shutdown command executed successfully",
                    "Server is shutting down (connection terminated)",
                    "shutdown",
                )
                .await
            }
            Action::Restart => {
                self.run_destructive(
                    server,
                    REBOOT_COMMAND,
                    REBOOT_FALLBACK_COMMAND,
                    "Reboot command executed successfully",
                    "Server is rebooting (connection terminated)",
                    "reboot",
                )
                .await
            }
            // No out-of-band power-on path is available over SSH
            Action::Start => ActionResult::failed(
                "Server start not implemented yet. Requires Wake-on-LAN or IPMI.",
            ),
        }
    }

    /// Liveness probe: open and close a session, no command executed
    pub async fn test_connection(&self, server: &Server) -> bool {
        self.shell.probe(server).await
    }

    /// Run a destructive command with exactly one unprivileged fallback.
    /// Each attempt opens a fresh session.
    async fn run_destructive(
        &self,
        server: &Server,
        primary: &str,
        fallback: &str,
        ok_message: &str,
        disconnect_message: &str,
        verb: &str,
    ) -> ActionResult {
        match self.shell.exec(server, primary).await {
            Ok(out) if out.succeeded() => ActionResult::ok(ok_message),
            Ok(out) => {
                warn!(
                    server = %server.name,
                    exit_code = out.exit_code,
                    command = %primary,
                    "Privileged command failed, retrying unprivileged variant"
                );
                match self.shell.exec(server, fallback).await {
                    Ok(out) if out.succeeded() => ActionResult::ok(ok_message),
                    Ok(out) => ActionResult::failed(format!(
                        "Failed to {verb} server: {}",
                        out.stderr.trim()
                    )),
                    Err(err) if is_expected_disconnect(&err) => {
                        ActionResult::ok(disconnect_message)
                    }
                    Err(err) => ActionResult::failed(err.to_string()),
                }
            }
            Err(err) if is_expected_disconnect(&err) => ActionResult::ok(disconnect_message),
            Err(err) => ActionResult::failed(err.to_string()),
        }
    }
}
