// Havoc Infrastructure - Docker Adapter
// Implements: ContainerRuntime over the Docker Engine API

mod docker_runtime;

pub use docker_runtime::BollardRuntime;
