// SSH RemoteShell implementation
// One libssh2 session per command; blocking calls isolated with
// spawn_blocking so firing workers, not the scheduler loop, pay for them

use async_trait::async_trait;
use havoc_core::domain::{Server, ServerAuth};
use havoc_core::port::{ExecOutput, RemoteShell, ShellError};
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed connect timeout bounding worst-case blocking per attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// RemoteShell over libssh2.
///
/// Error classification carries the disruption heuristic's raw material:
/// failures before authentication completes map to `Connect`/`Auth`, while
/// failures on an established session (channel open, exec, read, close)
/// map to `Disconnected`.
pub struct Ssh2Shell {
    connect_timeout: Duration,
}

impl Ssh2Shell {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for Ssh2Shell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteShell for Ssh2Shell {
    async fn exec(&self, server: &Server, command: &str) -> Result<ExecOutput, ShellError> {
        let server = server.clone();
        let command = command.to_string();
        let timeout = self.connect_timeout;
        tokio::task::spawn_blocking(move || exec_blocking(&server, &command, timeout))
            .await
            .map_err(|e| ShellError::Exec(format!("exec task failed: {e}")))?
    }

    async fn probe(&self, server: &Server) -> bool {
        let owned = server.clone();
        let timeout = self.connect_timeout;
        let outcome = tokio::task::spawn_blocking(move || connect(&owned, timeout)).await;
        match outcome {
            Ok(Ok(_session)) => true,
            Ok(Err(err)) => {
                warn!(hostname = %server.hostname, error = %err, "SSH probe failed");
                false
            }
            Err(e) => {
                warn!(hostname = %server.hostname, error = %e, "SSH probe task failed");
                false
            }
        }
    }
}

fn connect(server: &Server, timeout: Duration) -> Result<Session, ShellError> {
    let addr = (server.hostname.as_str(), server.port)
        .to_socket_addrs()
        .map_err(|e| ShellError::Connect(format!("{}: {e}", server.hostname)))?
        .next()
        .ok_or_else(|| {
            ShellError::Connect(format!("{}: no address resolved", server.hostname))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| ShellError::Connect(format!("{}: {e}", server.hostname)))?;

    let mut session =
        Session::new().map_err(|e| ShellError::Connect(format!("session init: {e}")))?;
    session.set_timeout(timeout.as_millis() as u32);
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| ShellError::Connect(format!("{}: handshake: {e}", server.hostname)))?;

    match &server.auth {
        ServerAuth::Key { private_key } => session
            .userauth_pubkey_memory(&server.username, None, private_key, None)
            .map_err(|e| {
                ShellError::Auth(format!("{}@{}: {e}", server.username, server.hostname))
            })?,
        ServerAuth::Password { password } => session
            .userauth_password(&server.username, password)
            .map_err(|e| {
                ShellError::Auth(format!("{}@{}: {e}", server.username, server.hostname))
            })?,
    }

    debug!(hostname = %server.hostname, port = server.port, "SSH session established");
    Ok(session)
}

fn exec_blocking(
    server: &Server,
    command: &str,
    timeout: Duration,
) -> Result<ExecOutput, ShellError> {
    let session = connect(server, timeout)?;

    // Past this point the session was up: errors classify as Disconnected
    let disconnected =
        |e: ssh2::Error| ShellError::Disconnected(format!("{}: {e}", server.hostname));

    let mut channel = session.channel_session().map_err(disconnected)?;
    channel.exec(command).map_err(disconnected)?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| ShellError::Disconnected(format!("{}: {e}", server.hostname)))?;
    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| ShellError::Disconnected(format!("{}: {e}", server.hostname)))?;

    channel.wait_close().map_err(disconnected)?;
    let exit_code = channel.exit_status().map_err(disconnected)?;

    debug!(
        hostname = %server.hostname,
        command = %command,
        exit_code,
        "Remote command finished"
    );

    Ok(ExecOutput {
        exit_code,
        stdout,
        stderr,
    })
}
