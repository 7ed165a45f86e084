// Docker Engine ContainerRuntime implementation
// Clients are constructed per call, scoped to the container's host

use async_trait::async_trait;
use bollard::container::{
    ListContainersOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use havoc_core::domain::DockerHost;
use havoc_core::port::{ContainerRuntime, DiscoveredContainer, RuntimeError};
use std::path::Path;
use tracing::{debug, warn};

/// Request timeout for Docker Engine API calls, in seconds
const API_TIMEOUT_SECS: u64 = 10;

/// ContainerRuntime over the Docker Engine API
#[derive(Default)]
pub struct BollardRuntime;

impl BollardRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Build a client for the host. Mutual-TLS hosts get the configured
    /// CA and client cert/key material; construction failure is an error,
    /// not a silent fallback to plaintext.
    fn client_for(host: &DockerHost) -> Result<Docker, RuntimeError> {
        match &host.tls {
            Some(tls) => Docker::connect_with_ssl(
                &host.url,
                Path::new(&tls.key_path),
                Path::new(&tls.cert_path),
                Path::new(&tls.ca_path),
                API_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )
            .map_err(|e| RuntimeError::Tls(format!("{}: {e}", host.url))),
            None if host.url.starts_with("unix://") => {
                Docker::connect_with_unix(&host.url, API_TIMEOUT_SECS, API_DEFAULT_VERSION)
                    .map_err(|e| RuntimeError::Transport(format!("{}: {e}", host.url)))
            }
            None => Docker::connect_with_http(&host.url, API_TIMEOUT_SECS, API_DEFAULT_VERSION)
                .map_err(|e| RuntimeError::Transport(format!("{}: {e}", host.url))),
        }
    }
}

/// Map a Docker API error, classifying 404 as the distinct not-found case
fn map_api_error(runtime_id: &str, err: bollard::errors::Error) -> RuntimeError {
    match &err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(runtime_id.to_string()),
        _ => RuntimeError::Transport(err.to_string()),
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn stop(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
        let client = Self::client_for(host)?;
        client
            .stop_container(runtime_id, None::<StopContainerOptions>)
            .await
            .map_err(|e| map_api_error(runtime_id, e))?;
        debug!(host = %host.name, runtime_id = %runtime_id, "Container stopped");
        Ok(())
    }

    async fn start(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
        let client = Self::client_for(host)?;
        client
            .start_container(runtime_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_api_error(runtime_id, e))?;
        debug!(host = %host.name, runtime_id = %runtime_id, "Container started");
        Ok(())
    }

    async fn restart(&self, host: &DockerHost, runtime_id: &str) -> Result<(), RuntimeError> {
        let client = Self::client_for(host)?;
        client
            .restart_container(runtime_id, None::<RestartContainerOptions>)
            .await
            .map_err(|e| map_api_error(runtime_id, e))?;
        debug!(host = %host.name, runtime_id = %runtime_id, "Container restarted");
        Ok(())
    }

    async fn list_all(&self, host: &DockerHost) -> Result<Vec<DiscoveredContainer>, RuntimeError> {
        let client = Self::client_for(host)?;
        let summaries = client
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        Ok(summaries
            .into_iter()
            .map(|summary| DiscoveredContainer {
                runtime_id: summary.id.unwrap_or_default(),
                // The API reports names with a leading slash
                name: summary
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: summary.image.unwrap_or_default(),
                status: summary.state.unwrap_or_else(|| "unknown".to_string()),
            })
            .collect())
    }

    async fn ping(&self, host: &DockerHost) -> bool {
        let client = match Self::client_for(host) {
            Ok(client) => client,
            Err(err) => {
                warn!(host = %host.name, error = %err, "Docker client construction failed");
                return false;
            }
        };
        client.ping().await.is_ok()
    }
}
