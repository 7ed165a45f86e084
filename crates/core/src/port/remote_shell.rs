// Remote Shell Port
// Abstraction over the remote-command transport (SSH in production)

use crate::domain::Server;
use async_trait::async_trait;
use thiserror::Error;

/// Captured output of one remote command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Transport errors.
///
/// `Disconnected` is raised only for sessions that were already
/// established and authenticated; the server adapter's disruption
/// heuristic keys off that distinction.
#[derive(Error, Debug, Clone)]
pub enum ShellError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("command execution failed: {0}")]
    Exec(String),
}

/// Remote command executor.
///
/// Implementations:
/// - Ssh2Shell (infra-ssh): one libssh2 session per command
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a command over a fresh authenticated session
    async fn exec(&self, server: &Server, command: &str) -> Result<ExecOutput, ShellError>;

    /// Open and immediately close a session. No command is executed.
    async fn probe(&self, server: &Server) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted RemoteShell for tests.
    ///
    /// Responses are consumed in order; once exhausted, every exec
    /// succeeds with exit code 0. Executed commands are recorded.
    #[derive(Default)]
    pub struct MockRemoteShell {
        responses: Mutex<VecDeque<Result<ExecOutput, ShellError>>>,
        commands: Mutex<Vec<String>>,
        unreachable: bool,
    }

    impl MockRemoteShell {
        pub fn new() -> Self {
            Self::default()
        }

        /// A shell whose probe always reports the host as down
        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn with_responses(responses: Vec<Result<ExecOutput, ShellError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        pub fn push(&self, response: Result<ExecOutput, ShellError>) {
            self.responses.lock().unwrap().push_back(response);
        }

        /// Commands executed so far, in order
        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }

        /// Convenience output with the given exit code and empty streams
        pub fn exit(code: i32) -> ExecOutput {
            ExecOutput {
                exit_code: code,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    #[async_trait]
    impl RemoteShell for MockRemoteShell {
        async fn exec(&self, _server: &Server, command: &str) -> Result<ExecOutput, ShellError> {
            self.commands.lock().unwrap().push(command.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Self::exit(0)))
        }

        async fn probe(&self, _server: &Server) -> bool {
            !self.unreachable
        }
    }
}
