// Container Runtime Port
// Abstraction over the container-runtime API (Docker Engine in production)

use crate::domain::DockerHost;
use async_trait::async_trait;
use thiserror::Error;

/// One container as reported by a host listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContainer {
    pub runtime_id: String,
    pub name: String,
    pub image: String,
    pub status: String,
}

/// Runtime errors.
///
/// `NotFound` ("already gone") is kept separate from `Transport`
/// ("unreachable host") so operators can tell the two apart in logs.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("container {0} not found")]
    NotFound(String),

    #[error("container runtime unreachable: {0}")]
    Transport(String),

    #[error("TLS client material rejected: {0}")]
    Tls(String),
}

/// Container lifecycle controller.
///
/// Implementations:
/// - BollardRuntime (infra-docker): Docker Engine API client
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn stop(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError>;

    async fn start(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError>;

    async fn restart(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError>;

    /// List every container on the host, running or stopped
    async fn list_all(&self, host: &DockerHost) -> Result<Vec<DiscoveredContainer>, RuntimeError>;

    /// Liveness check against the runtime endpoint
    async fn ping(&self, host: &DockerHost) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Configurable ContainerRuntime for tests. Lifecycle calls are
    /// recorded; a single error can be armed to fail them all.
    #[derive(Default)]
    pub struct MockContainerRuntime {
        fail_with: Mutex<Option<RuntimeError>>,
        containers: Mutex<Vec<DiscoveredContainer>>,
        list_fails: Mutex<bool>,
        calls: Mutex<Vec<String>>,
        unreachable: bool,
    }

    impl MockContainerRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        /// Make every lifecycle call fail with the given error
        pub fn fail_with(&self, err: RuntimeError) {
            *self.fail_with.lock().unwrap() = Some(err);
        }

        /// Set the listing returned by `list_all`
        pub fn set_containers(&self, containers: Vec<DiscoveredContainer>) {
            *self.containers.lock().unwrap() = containers;
        }

        /// Make `list_all` fail with a transport error
        pub fn fail_listing(&self) {
            *self.list_fails.lock().unwrap() = true;
        }

        /// Lifecycle calls made so far, as "verb runtime_id"
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn lifecycle(&self, verb: &str, runtime_id: &str) -> Result<(), RuntimeError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{verb} {runtime_id}"));
            match self.fail_with.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockContainerRuntime {
        async fn stop(&self, _host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
            self.lifecycle("stop", runtime_id)
        }

        async fn start(&self, _host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
            self.lifecycle("start", runtime_id)
        }

        async fn restart(&self, _host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
            self.lifecycle("restart", runtime_id)
        }

        async fn list_all(
            &self,
            _host: &DockerHost,
        ) -> Result<Vec<DiscoveredContainer>, RuntimeError> {
            if *self.list_fails.lock().unwrap() {
                return Err(RuntimeError::Transport("connection refused".to_string()));
            }
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn ping(&self, _host: &DockerHost) -> bool {
            !self.unreachable
        }
    }
}
