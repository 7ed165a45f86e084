// ID Provider Port (for deterministic testing)

/// ID provider interface (allows deterministic job ids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a fresh unique id suffix
    fn new_id(&self) -> String;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn new_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::IdProvider;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Sequential ids (seq-1, seq-2, ...) for deterministic tests
    #[derive(Default)]
    pub struct SequentialIdProvider {
        counter: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn new_id(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("seq-{n}")
        }
    }
}
