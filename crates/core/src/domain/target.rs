// Target Domain Model

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Entity id, assigned by the store
pub type EntityId = i64;

/// Kind of disruptable target. Closed set: unknown kinds only exist at the
/// string boundary and are rejected there by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Server,
    Container,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Server => write!(f, "server"),
            TargetKind::Container => write!(f, "container"),
        }
    }
}

impl std::str::FromStr for TargetKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(TargetKind::Server),
            "container" => Ok(TargetKind::Container),
            other => Err(DomainError::UnknownTargetKind(other.to_string())),
        }
    }
}

/// SSH credentials for a server. Key auth is preferred when configured;
/// rotation happens through the admin surface, never in the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAuth {
    Key { private_key: String },
    Password { password: String },
}

/// Observed liveness of a server or docker host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Unknown,
    Online,
    Offline,
}

impl HostStatus {
    /// Lenient parse for values read back from the store
    pub fn parse(s: &str) -> HostStatus {
        match s {
            "online" => HostStatus::Online,
            "offline" => HostStatus::Offline,
            _ => HostStatus::Unknown,
        }
    }
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostStatus::Unknown => write!(f, "unknown"),
            HostStatus::Online => write!(f, "online"),
            HostStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Bare server reachable over the remote-shell transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: EntityId,
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub auth: ServerAuth,
    pub status: HostStatus,
    pub last_check: Option<i64>,
    pub created_at: i64,
}

/// Client certificate material for a mutual-TLS docker host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub ca_path: String,
    pub cert_path: String,
    pub key_path: String,
}

/// Container runtime endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerHost {
    pub id: EntityId,
    pub name: String,
    pub url: String,
    pub tls: Option<TlsMaterial>,
    pub status: HostStatus,
    pub last_check: Option<i64>,
    pub created_at: i64,
}

/// Container cached from a host inventory refresh.
/// `status` is whatever the runtime last reported ("running", "exited", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: EntityId,
    pub runtime_id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub host_id: EntityId,
    pub created_at: i64,
}

/// New-server payload (id and bookkeeping fields assigned by the store)
#[derive(Debug, Clone)]
pub struct NewServer {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub auth: ServerAuth,
}

/// New-docker-host payload
#[derive(Debug, Clone)]
pub struct NewDockerHost {
    pub name: String,
    pub url: String,
    pub tls: Option<TlsMaterial>,
}

impl Server {
    /// Fixture constructor for tests. Production servers come from the store.
    pub fn new_test(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hostname: "target.test.local".to_string(),
            port: 22,
            username: "root".to_string(),
            auth: ServerAuth::Password {
                password: "secret".to_string(),
            },
            status: HostStatus::Unknown,
            last_check: None,
            created_at: 0,
        }
    }
}

impl DockerHost {
    /// Fixture constructor for tests
    pub fn new_test(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: "tcp://docker.test.local:2375".to_string(),
            tls: None,
            status: HostStatus::Unknown,
            last_check: None,
            created_at: 0,
        }
    }
}

impl Container {
    /// Fixture constructor for tests
    pub fn new_test(id: EntityId, name: impl Into<String>, host_id: EntityId) -> Self {
        let name = name.into();
        Self {
            id,
            runtime_id: format!("{name}-runtime-id"),
            name,
            image: "nginx:latest".to_string(),
            status: "running".to_string(),
            host_id,
            created_at: 0,
        }
    }
}
