// Container Capability Adapter
// Lifecycle actions over the container-runtime API

use crate::domain::{Action, ActionResult, Container, DockerHost};
use crate::port::{ContainerRuntime, RuntimeError};
use std::sync::Arc;
use tracing::info;

/// Executes lifecycle actions against containers
#[derive(Clone)]
pub struct ContainerAdapter {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerAdapter {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Execute a lifecycle action against a container on its host
    pub async fn execute(
        &self,
        host: &DockerHost,
        container: &Container,
        action: Action,
    ) -> ActionResult {
        info!(
            container = %container.name,
            runtime_id = %container.runtime_id,
            host = %host.name,
            action = %action,
            "Executing container action"
        );
        let outcome = match action {
            Action::Stop => self.runtime.stop(host, &container.runtime_id).await,
            Action::Start => self.runtime.start(host, &container.runtime_id).await,
            Action::Restart => self.runtime.restart(host, &container.runtime_id).await,
        };
        match outcome {
            Ok(()) => ActionResult::ok(format!(
                "Container {} {}",
                container.name,
                past_tense(action)
            )),
            // "already gone" reads differently from "unreachable host"
            Err(RuntimeError::NotFound(_)) => {
                ActionResult::failed(format!("Container {} not found", container.name))
            }
            Err(err) => ActionResult::failed(err.to_string()),
        }
    }

    /// Liveness check against the host's runtime endpoint
    pub async fn test_connection(&self, host: &DockerHost) -> bool {
        self.runtime.ping(host).await
    }
}

fn past_tense(action: Action) -> &'static str {
    match action {
        Action::Stop => "stopped",
        Action::Start => "started",
        Action::Restart => "restarted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::container_runtime::mocks::MockContainerRuntime;

    fn adapter(runtime: MockContainerRuntime) -> (ContainerAdapter, Arc<MockContainerRuntime>) {
        let runtime = Arc::new(runtime);
        (ContainerAdapter::new(runtime.clone()), runtime)
    }

    #[tokio::test]
    async fn actions_map_onto_runtime_lifecycle_calls() {
        let (adapter, runtime) = adapter(MockContainerRuntime::new());
        let host = DockerHost::new_test(1, "dock-1");
        let container = Container::new_test(10, "api-gateway", 1);

        for (action, verb) in [
            (Action::Stop, "stop"),
            (Action::Start, "start"),
            (Action::Restart, "restart"),
        ] {
            let result = adapter.execute(&host, &container, action).await;
            assert!(result.success);
            assert!(result.message.contains("api-gateway"));
            assert!(runtime.calls().last().unwrap().starts_with(verb));
        }
    }

    #[tokio::test]
    async fn missing_container_gets_a_distinct_message() {
        let (adapter, runtime) = adapter(MockContainerRuntime::new());
        runtime.fail_with(RuntimeError::NotFound("api-gateway-runtime-id".to_string()));

        let result = adapter
            .execute(
                &DockerHost::new_test(1, "dock-1"),
                &Container::new_test(10, "api-gateway", 1),
                Action::Stop,
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.message, "Container api-gateway not found");
    }

    #[tokio::test]
    async fn transport_failure_reads_as_unreachable() {
        let (adapter, runtime) = adapter(MockContainerRuntime::new());
        runtime.fail_with(RuntimeError::Transport("connection refused".to_string()));

        let result = adapter
            .execute(
                &DockerHost::new_test(1, "dock-1"),
                &Container::new_test(10, "api-gateway", 1),
                Action::Restart,
            )
            .await;

        assert!(!result.success);
        assert!(result.message.contains("unreachable"));
        assert!(result.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn ping_reports_endpoint_liveness() {
        let (up, _) = adapter(MockContainerRuntime::new());
        assert!(up.test_connection(&DockerHost::new_test(1, "dock-1")).await);

        let (down, _) = adapter(MockContainerRuntime::unreachable());
        assert!(
            !down
                .test_connection(&DockerHost::new_test(1, "dock-1"))
                .await
        );
    }
}
