// Container Inventory Reconciliation

use crate::domain::DockerHost;
use crate::error::Result;
use crate::port::{ContainerRuntime, EntityStore, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Refreshes a host's cached container set from the runtime.
///
/// The refresh is full reconciliation, not an incremental diff: a
/// successful listing replaces the host's entire cached set and marks the
/// host online in one transaction. A failed listing marks the host offline
/// and leaves the previous inventory in place; there is never a partial
/// mix of old and new containers.
pub struct InventoryService {
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn EntityStore>,
    time: Arc<dyn TimeProvider>,
}

impl InventoryService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn EntityStore>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            runtime,
            store,
            time,
        }
    }

    /// Refresh one host. Returns whether the listing succeeded.
    pub async fn refresh_host(&self, host: &DockerHost) -> Result<bool> {
        let now = self.time.now_millis();
        match self.runtime.list_all(host).await {
            Ok(containers) => {
                self.store
                    .replace_host_containers(host.id, &containers, now)
                    .await?;
                info!(
                    host = %host.name,
                    containers = containers.len(),
                    "Container inventory refreshed"
                );
                Ok(true)
            }
            Err(err) => {
                warn!(
                    host = %host.name,
                    error = %err,
                    "Inventory refresh failed, marking host offline"
                );
                self.store.mark_host_offline(host.id, now).await?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Container, HostStatus};
    use crate::port::container_runtime::mocks::MockContainerRuntime;
    use crate::port::entity_store::mocks::MemoryStore;
    use crate::port::time_provider::mocks::ManualClock;
    use crate::port::DiscoveredContainer;

    fn discovered(name: &str) -> DiscoveredContainer {
        DiscoveredContainer {
            runtime_id: format!("{name}-runtime-id"),
            name: name.to_string(),
            image: "nginx:latest".to_string(),
            status: "running".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_refresh_replaces_whole_inventory() {
        let store = Arc::new(MemoryStore::new());
        let runtime = Arc::new(MockContainerRuntime::new());
        let host = DockerHost::new_test(1, "dock-1");
        store.put_docker_host(host.clone());
        // Two stale cached containers
        store.put_container(Container::new_test(10, "old-a", 1));
        store.put_container(Container::new_test(11, "old-b", 1));

        runtime.set_containers(vec![discovered("fresh-a")]);
        let service =
            InventoryService::new(runtime, store.clone(), Arc::new(ManualClock::new(5_000)));

        assert!(service.refresh_host(&host).await.unwrap());

        let cached = store.containers_for_host(1).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].name, "fresh-a");
        let host = store.find_docker_host(1).await.unwrap().unwrap();
        assert_eq!(host.status, HostStatus::Online);
        assert_eq!(host.last_check, Some(5_000));
    }

    #[tokio::test]
    async fn failed_listing_marks_offline_and_keeps_previous_inventory() {
        let store = Arc::new(MemoryStore::new());
        let runtime = Arc::new(MockContainerRuntime::new());
        let host = DockerHost::new_test(1, "dock-1");
        store.put_docker_host(host.clone());
        store.put_container(Container::new_test(10, "old-a", 1));

        runtime.fail_listing();
        let service =
            InventoryService::new(runtime, store.clone(), Arc::new(ManualClock::new(5_000)));

        assert!(!service.refresh_host(&host).await.unwrap());

        let cached = store.containers_for_host(1).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].name, "old-a");
        let host = store.find_docker_host(1).await.unwrap().unwrap();
        assert_eq!(host.status, HostStatus::Offline);
    }
}
