// Orchestration Context
// Explicit composition object handed to the admin surface; replaces
// module-level singletons

use crate::application::dispatcher::Dispatcher;
use crate::application::inventory::InventoryService;
use crate::application::scheduler::{ExperimentScheduler, SchedulerConfig};
use crate::domain::{EntityId, HostStatus};
use crate::error::{AppError, Result};
use crate::port::{ContainerRuntime, EntityStore, IdProvider, JobStore, RemoteShell, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Everything the admin surface needs, wired once at process start and
/// passed by reference. Compound operations whose internal ordering
/// carries invariants live here.
pub struct ChaosContext {
    store: Arc<dyn EntityStore>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<ExperimentScheduler>,
    inventory: InventoryService,
    time: Arc<dyn TimeProvider>,
}

impl ChaosContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        job_store: Arc<dyn JobStore>,
        shell: Arc<dyn RemoteShell>,
        runtime: Arc<dyn ContainerRuntime>,
        time: Arc<dyn TimeProvider>,
        ids: Arc<dyn IdProvider>,
        config: SchedulerConfig,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            shell,
            Arc::clone(&runtime),
            Arc::clone(&time),
        ));
        let scheduler = Arc::new(ExperimentScheduler::new(
            Arc::clone(&store),
            job_store,
            Arc::clone(&dispatcher),
            Arc::clone(&time),
            ids,
            config,
        ));
        let inventory = InventoryService::new(runtime, Arc::clone(&store), Arc::clone(&time));
        Self {
            store,
            dispatcher,
            scheduler,
            inventory,
            time,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &Arc<ExperimentScheduler> {
        &self.scheduler
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }

    /// Delete an experiment. Its job is removed first, so no future firing
    /// can observe a half-deleted experiment; the store cascades the logs.
    /// Returns whether the experiment existed.
    pub async fn delete_experiment(&self, id: EntityId) -> Result<bool> {
        let Some(experiment) = self.store.find_experiment(id).await? else {
            return Ok(false);
        };
        if let Some(job_id) = &experiment.job_id {
            self.scheduler.remove_job(job_id).await?;
        }
        self.store.delete_experiment(id).await?;
        info!(experiment = %experiment.name, "Experiment deleted");
        Ok(true)
    }

    /// Probe a server and persist the observed status
    pub async fn check_server(&self, id: EntityId) -> Result<HostStatus> {
        let Some(server) = self.store.find_server(id).await? else {
            return Err(AppError::NotFound(format!("Server {id} not found")));
        };
        let online = self
            .dispatcher
            .server_adapter()
            .test_connection(&server)
            .await;
        let status = if online {
            HostStatus::Online
        } else {
            HostStatus::Offline
        };
        self.store
            .set_server_check(id, status, self.time.now_millis())
            .await?;
        Ok(status)
    }

    /// Refresh a docker host's container inventory. Returns whether the
    /// listing succeeded.
    pub async fn refresh_host(&self, id: EntityId) -> Result<bool> {
        let Some(host) = self.store.find_docker_host(id).await? else {
            return Err(AppError::NotFound(format!("Docker host {id} not found")));
        };
        self.inventory.refresh_host(&host).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, Experiment, Schedule, Server, TargetKind};
    use crate::port::container_runtime::mocks::MockContainerRuntime;
    use crate::port::entity_store::mocks::MemoryStore;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_store::mocks::MemoryJobStore;
    use crate::port::remote_shell::mocks::MockRemoteShell;
    use crate::port::time_provider::mocks::ManualClock;

    fn context() -> (ChaosContext, Arc<MemoryStore>, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryStore::new());
        let job_store = Arc::new(MemoryJobStore::new());
        let context = ChaosContext::new(
            store.clone(),
            job_store.clone(),
            Arc::new(MockRemoteShell::new()),
            Arc::new(MockContainerRuntime::new()),
            Arc::new(ManualClock::new(1_000)),
            Arc::new(SequentialIdProvider::default()),
            SchedulerConfig::default(),
        );
        (context, store, job_store)
    }

    #[tokio::test]
    async fn delete_removes_the_job_before_the_experiment() {
        let (context, store, job_store) = context();
        store.put_server(Server::new_test(1, "web-1"));
        let mut exp = Experiment {
            id: 5,
            name: "weekly stop".to_string(),
            description: None,
            target_kind: TargetKind::Server,
            target_id: 1,
            action: Action::Stop,
            schedule: Schedule::Recurring {
                pattern: "0 3 * * 0".to_string(),
            },
            active: true,
            job_id: None,
            created_at: 0,
        };
        store.put_experiment(exp.clone());
        let job_id = context
            .scheduler()
            .schedule_experiment(&exp)
            .await
            .unwrap()
            .unwrap();
        exp.job_id = Some(job_id);
        store.put_experiment(exp);

        assert!(context.delete_experiment(5).await.unwrap());

        assert!(context.scheduler().jobs().await.is_empty());
        assert_eq!(job_store.row_count(), 0);
        assert!(store.find_experiment(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_missing_experiment_is_a_no_op() {
        let (context, _, _) = context();
        assert!(!context.delete_experiment(42).await.unwrap());
    }

    #[tokio::test]
    async fn check_server_persists_the_observed_status() {
        let (context, store, _) = context();
        store.put_server(Server::new_test(1, "web-1"));

        let status = context.check_server(1).await.unwrap();

        assert_eq!(status, HostStatus::Online);
        let server = store.find_server(1).await.unwrap().unwrap();
        assert_eq!(server.status, HostStatus::Online);
        assert_eq!(server.last_check, Some(1_000));
    }

    #[tokio::test]
    async fn check_server_rejects_unknown_ids() {
        let (context, _, _) = context();
        assert!(matches!(
            context.check_server(9).await,
            Err(AppError::NotFound(_))
        ));
    }
}
