// Target Capability Adapters
// Per-target-kind execution of lifecycle actions

pub mod container;
pub mod server;

pub use container::ContainerAdapter;
pub use server::{is_expected_disconnect, ServerAdapter};
