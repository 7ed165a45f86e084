// Entity Store Port (Interface)
// Single source of truth for target identity, status, and audit logs

use crate::domain::{
    Container, DockerHost, EntityId, Experiment, ExperimentLog, HostStatus, NewDockerHost,
    NewExperiment, NewExperimentLog, NewServer, Server, TargetKind,
};
use crate::error::Result;
use crate::port::container_runtime::DiscoveredContainer;
use async_trait::async_trait;

/// Cached-status change committed atomically with an audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Server { id: EntityId, status: HostStatus },
    Container { id: EntityId, status: String },
}

/// Repository interface over servers, docker hosts, containers,
/// experiments, and experiment logs
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Servers
    async fn insert_server(&self, server: NewServer) -> Result<Server>;

    async fn find_server(&self, id: EntityId) -> Result<Option<Server>>;

    /// Persist the outcome of a liveness probe
    async fn set_server_check(
        &self,
        id: EntityId,
        status: HostStatus,
        checked_at: i64,
    ) -> Result<()>;

    // Docker hosts & containers
    async fn insert_docker_host(&self, host: NewDockerHost) -> Result<DockerHost>;

    async fn find_docker_host(&self, id: EntityId) -> Result<Option<DockerHost>>;

    async fn find_container(&self, id: EntityId) -> Result<Option<Container>>;

    async fn containers_for_host(&self, host_id: EntityId) -> Result<Vec<Container>>;

    /// Replace the host's entire cached container set with a fresh listing
    /// and mark the host online. All-or-nothing: on error nothing changes.
    async fn replace_host_containers(
        &self,
        host_id: EntityId,
        containers: &[DiscoveredContainer],
        refreshed_at: i64,
    ) -> Result<()>;

    /// Mark a host offline after a failed refresh, leaving its cached
    /// containers untouched
    async fn mark_host_offline(&self, host_id: EntityId, checked_at: i64) -> Result<()>;

    // Experiments
    async fn insert_experiment(&self, experiment: NewExperiment) -> Result<Experiment>;

    async fn find_experiment(&self, id: EntityId) -> Result<Option<Experiment>>;

    /// Point the experiment at its current live job (None clears it)
    async fn set_experiment_job(&self, id: EntityId, job_id: Option<&str>) -> Result<()>;

    /// Delete an experiment, cascading to its logs
    async fn delete_experiment(&self, id: EntityId) -> Result<()>;

    // Audit log
    /// Durably record one dispatch outcome. The log insert and the
    /// optional cached-status update commit in the same transaction.
    async fn record_dispatch(
        &self,
        log: NewExperimentLog,
        status: Option<StatusUpdate>,
    ) -> Result<ExperimentLog>;

    async fn recent_logs(&self, limit: i64) -> Result<Vec<ExperimentLog>>;

    async fn logs_for_target(
        &self,
        kind: TargetKind,
        target_id: EntityId,
        limit: i64,
    ) -> Result<Vec<ExperimentLog>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tables {
        servers: HashMap<EntityId, Server>,
        hosts: HashMap<EntityId, DockerHost>,
        containers: HashMap<EntityId, Container>,
        experiments: HashMap<EntityId, Experiment>,
        logs: Vec<ExperimentLog>,
    }

    /// In-memory EntityStore for tests.
    ///
    /// All tables live behind one mutex, so `record_dispatch` is naturally
    /// atomic. Arming `fail_commits` makes it return a database error while
    /// applying neither the log nor the status update, which is how the
    /// commit-boundary fault-injection tests work.
    #[derive(Default)]
    pub struct MemoryStore {
        tables: Mutex<Tables>,
        next_id: AtomicI64,
        pub fail_commits: AtomicBool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn mint_id(&self) -> EntityId {
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        }

        /// Seed a prebuilt server (fixture shortcut)
        pub fn put_server(&self, server: Server) {
            self.tables.lock().unwrap().servers.insert(server.id, server);
        }

        pub fn put_docker_host(&self, host: DockerHost) {
            self.tables.lock().unwrap().hosts.insert(host.id, host);
        }

        pub fn put_container(&self, container: Container) {
            self.tables
                .lock()
                .unwrap()
                .containers
                .insert(container.id, container);
        }

        pub fn put_experiment(&self, experiment: Experiment) {
            self.tables
                .lock()
                .unwrap()
                .experiments
                .insert(experiment.id, experiment);
        }

        pub fn log_count(&self) -> usize {
            self.tables.lock().unwrap().logs.len()
        }
    }

    #[async_trait]
    impl EntityStore for MemoryStore {
        async fn insert_server(&self, server: NewServer) -> Result<Server> {
            let server = Server {
                id: self.mint_id(),
                name: server.name,
                hostname: server.hostname,
                port: server.port,
                username: server.username,
                auth: server.auth,
                status: HostStatus::Unknown,
                last_check: None,
                created_at: 0,
            };
            self.put_server(server.clone());
            Ok(server)
        }

        async fn find_server(&self, id: EntityId) -> Result<Option<Server>> {
            Ok(self.tables.lock().unwrap().servers.get(&id).cloned())
        }

        async fn set_server_check(
            &self,
            id: EntityId,
            status: HostStatus,
            checked_at: i64,
        ) -> Result<()> {
            let mut tables = self.tables.lock().unwrap();
            if let Some(server) = tables.servers.get_mut(&id) {
                server.status = status;
                server.last_check = Some(checked_at);
            }
            Ok(())
        }

        async fn insert_docker_host(&self, host: NewDockerHost) -> Result<DockerHost> {
            let host = DockerHost {
                id: self.mint_id(),
                name: host.name,
                url: host.url,
                tls: host.tls,
                status: HostStatus::Unknown,
                last_check: None,
                created_at: 0,
            };
            self.put_docker_host(host.clone());
            Ok(host)
        }

        async fn find_docker_host(&self, id: EntityId) -> Result<Option<DockerHost>> {
            Ok(self.tables.lock().unwrap().hosts.get(&id).cloned())
        }

        async fn find_container(&self, id: EntityId) -> Result<Option<Container>> {
            Ok(self.tables.lock().unwrap().containers.get(&id).cloned())
        }

        async fn containers_for_host(&self, host_id: EntityId) -> Result<Vec<Container>> {
            let tables = self.tables.lock().unwrap();
            let mut containers: Vec<Container> = tables
                .containers
                .values()
                .filter(|c| c.host_id == host_id)
                .cloned()
                .collect();
            containers.sort_by_key(|c| c.id);
            Ok(containers)
        }

        async fn replace_host_containers(
            &self,
            host_id: EntityId,
            containers: &[DiscoveredContainer],
            refreshed_at: i64,
        ) -> Result<()> {
            let mut tables = self.tables.lock().unwrap();
            tables.containers.retain(|_, c| c.host_id != host_id);
            for discovered in containers {
                let id = self.mint_id();
                tables.containers.insert(
                    id,
                    Container {
                        id,
                        runtime_id: discovered.runtime_id.clone(),
                        name: discovered.name.clone(),
                        image: discovered.image.clone(),
                        status: discovered.status.clone(),
                        host_id,
                        created_at: refreshed_at,
                    },
                );
            }
            if let Some(host) = tables.hosts.get_mut(&host_id) {
                host.status = HostStatus::Online;
                host.last_check = Some(refreshed_at);
            }
            Ok(())
        }

        async fn mark_host_offline(&self, host_id: EntityId, checked_at: i64) -> Result<()> {
            let mut tables = self.tables.lock().unwrap();
            if let Some(host) = tables.hosts.get_mut(&host_id) {
                host.status = HostStatus::Offline;
                host.last_check = Some(checked_at);
            }
            Ok(())
        }

        async fn insert_experiment(&self, experiment: NewExperiment) -> Result<Experiment> {
            let experiment = Experiment {
                id: self.mint_id(),
                name: experiment.name,
                description: experiment.description,
                target_kind: experiment.target_kind,
                target_id: experiment.target_id,
                action: experiment.action,
                schedule: experiment.schedule,
                active: experiment.active,
                job_id: None,
                created_at: 0,
            };
            self.put_experiment(experiment.clone());
            Ok(experiment)
        }

        async fn find_experiment(&self, id: EntityId) -> Result<Option<Experiment>> {
            Ok(self.tables.lock().unwrap().experiments.get(&id).cloned())
        }

        async fn set_experiment_job(&self, id: EntityId, job_id: Option<&str>) -> Result<()> {
            let mut tables = self.tables.lock().unwrap();
            if let Some(experiment) = tables.experiments.get_mut(&id) {
                experiment.job_id = job_id.map(str::to_string);
            }
            Ok(())
        }

        async fn delete_experiment(&self, id: EntityId) -> Result<()> {
            let mut tables = self.tables.lock().unwrap();
            tables.experiments.remove(&id);
            tables.logs.retain(|log| log.experiment_id != Some(id));
            Ok(())
        }

        async fn record_dispatch(
            &self,
            log: NewExperimentLog,
            status: Option<StatusUpdate>,
        ) -> Result<ExperimentLog> {
            if self.fail_commits.load(Ordering::SeqCst) {
                return Err(AppError::Database("injected commit failure".to_string()));
            }
            let id = self.mint_id();
            let mut tables = self.tables.lock().unwrap();
            match status {
                Some(StatusUpdate::Server { id, status }) => {
                    if let Some(server) = tables.servers.get_mut(&id) {
                        server.status = status;
                    }
                }
                Some(StatusUpdate::Container { id, status }) => {
                    if let Some(container) = tables.containers.get_mut(&id) {
                        container.status = status;
                    }
                }
                None => {}
            }
            let log = ExperimentLog {
                id,
                experiment_id: log.experiment_id,
                target_kind: log.target_kind,
                target_id: log.target_id,
                target_name: log.target_name,
                action: log.action,
                status: log.status,
                details: log.details,
                execution_time: log.execution_time,
            };
            tables.logs.push(log.clone());
            Ok(log)
        }

        async fn recent_logs(&self, limit: i64) -> Result<Vec<ExperimentLog>> {
            let tables = self.tables.lock().unwrap();
            let mut logs = tables.logs.clone();
            logs.sort_by_key(|log| std::cmp::Reverse((log.execution_time, log.id)));
            logs.truncate(limit.max(0) as usize);
            Ok(logs)
        }

        async fn logs_for_target(
            &self,
            kind: TargetKind,
            target_id: EntityId,
            limit: i64,
        ) -> Result<Vec<ExperimentLog>> {
            let tables = self.tables.lock().unwrap();
            let mut logs: Vec<ExperimentLog> = tables
                .logs
                .iter()
                .filter(|log| log.target_kind == kind && log.target_id == target_id)
                .cloned()
                .collect();
            logs.sort_by_key(|log| std::cmp::Reverse((log.execution_time, log.id)));
            logs.truncate(limit.max(0) as usize);
            Ok(logs)
        }
    }
}
