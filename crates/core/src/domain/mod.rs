// Domain Layer - chaos experiment entities

pub mod action;
pub mod error;
pub mod experiment;
pub mod target;

// Re-exports
pub use action::{Action, ActionResult};
pub use error::DomainError;
pub use experiment::{
    Experiment, ExperimentLog, JobRecord, LogStatus, NewExperiment, NewExperimentLog, Schedule,
};
pub use target::{
    Container, DockerHost, EntityId, HostStatus, NewDockerHost, NewServer, Server, ServerAuth,
    TargetKind, TlsMaterial,
};
