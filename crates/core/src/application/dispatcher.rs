// Action Dispatcher
// Resolves targets, delegates to capability adapters, classifies the
// outcome, and writes the audit record

use crate::application::adapters::{ContainerAdapter, ServerAdapter};
use crate::domain::{
    Action, ActionResult, EntityId, Experiment, ExperimentLog, HostStatus, LogStatus,
    NewExperimentLog, TargetKind,
};
use crate::error::Result;
use crate::port::{ContainerRuntime, EntityStore, RemoteShell, StatusUpdate, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Outcome of target resolution + adapter delegation, ready for logging
struct Resolved {
    target_name: String,
    result: ActionResult,
    status: Option<StatusUpdate>,
}

impl Resolved {
    fn not_found(message: &str) -> Self {
        Self {
            target_name: "Unknown".to_string(),
            result: ActionResult::failed(message),
            status: None,
        }
    }
}

/// Central dispatch point for chaos actions, scheduled or ad hoc.
///
/// Transport faults never escape: the typed port boundary folds them into
/// `ActionResult` and every dispatch terminates in exactly one audit log.
/// Only store errors propagate, since without the store the engine cannot
/// record outcomes at all.
pub struct Dispatcher {
    store: Arc<dyn EntityStore>,
    servers: ServerAdapter,
    containers: ContainerAdapter,
    time: Arc<dyn TimeProvider>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn EntityStore>,
        shell: Arc<dyn RemoteShell>,
        runtime: Arc<dyn ContainerRuntime>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            servers: ServerAdapter::new(shell),
            containers: ContainerAdapter::new(runtime),
            time,
        }
    }

    pub fn server_adapter(&self) -> &ServerAdapter {
        &self.servers
    }

    pub fn container_adapter(&self) -> &ContainerAdapter {
        &self.containers
    }

    /// Ad hoc dispatch invoked by the admin surface
    pub async fn dispatch(
        &self,
        kind: TargetKind,
        target_id: EntityId,
        action: Action,
    ) -> Result<ExperimentLog> {
        self.run(None, kind, target_id, action).await
    }

    /// Scheduled dispatch of one experiment firing
    pub async fn dispatch_experiment(&self, experiment: &Experiment) -> Result<ExperimentLog> {
        info!(experiment = %experiment.name, "Executing experiment");
        self.run(
            Some(experiment.id),
            experiment.target_kind,
            experiment.target_id,
            experiment.action,
        )
        .await
    }

    async fn run(
        &self,
        experiment_id: Option<EntityId>,
        kind: TargetKind,
        target_id: EntityId,
        action: Action,
    ) -> Result<ExperimentLog> {
        let resolved = match kind {
            TargetKind::Server => self.run_server(target_id, action).await?,
            TargetKind::Container => self.run_container(target_id, action).await?,
        };

        // Stale status beats an unverified guess: only successful actions
        // update the cached target status, atomically with the log.
        let status = if resolved.result.success {
            resolved.status
        } else {
            None
        };

        let log = NewExperimentLog {
            experiment_id,
            target_kind: kind,
            target_id,
            target_name: resolved.target_name,
            action,
            status: if resolved.result.success {
                LogStatus::Success
            } else {
                LogStatus::Failure
            },
            details: resolved.result.message,
            execution_time: self.time.now_millis(),
        };
        self.store.record_dispatch(log, status).await
    }

    async fn run_server(&self, id: EntityId, action: Action) -> Result<Resolved> {
        let Some(server) = self.store.find_server(id).await? else {
            return Ok(Resolved::not_found("Server not found"));
        };
        let result = self.servers.execute(&server, action).await;
        let status = match action {
            Action::Stop => Some(StatusUpdate::Server {
                id,
                status: HostStatus::Offline,
            }),
            // A rebooting server comes back on its own; start never succeeds
            Action::Restart | Action::Start => None,
        };
        Ok(Resolved {
            target_name: server.name,
            result,
            status,
        })
    }

    async fn run_container(&self, id: EntityId, action: Action) -> Result<Resolved> {
        let Some(container) = self.store.find_container(id).await? else {
            return Ok(Resolved::not_found("Container not found"));
        };
        let Some(host) = self.store.find_docker_host(container.host_id).await? else {
            return Ok(Resolved {
                target_name: container.name,
                result: ActionResult::failed("Docker host not found"),
                status: None,
            });
        };
        let result = self.containers.execute(&host, &container, action).await;
        let status = Some(StatusUpdate::Container {
            id,
            status: match action {
                Action::Stop => "stopped",
                Action::Start | Action::Restart => "running",
            }
            .to_string(),
        });
        Ok(Resolved {
            target_name: container.name,
            result,
            status,
        })
    }
}
