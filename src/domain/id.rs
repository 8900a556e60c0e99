// ==========================================
// Roofline Ops - id generation
// ==========================================
// Ids come from an injected generator so tests can use deterministic
// sequences instead of random UUIDs.
// ==========================================

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// Generate a new entity id. `prefix` names the entity kind
    /// (e.g. "TKT", "BIL", "ALR").
    fn next_id(&self, prefix: &str) -> String;
}

// ==========================================
// Production generator (UUID v4)
// ==========================================
#[derive(Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }
}

// ==========================================
// Deterministic generator for tests
// ==========================================
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{:06}", prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_generator_is_deterministic() {
        let gen = SequenceIdGenerator::new();
        assert_eq!(gen.next_id("TKT"), "TKT-000001");
        assert_eq!(gen.next_id("TKT"), "TKT-000002");
        assert_eq!(gen.next_id("BIL"), "BIL-000003");
    }

    #[test]
    fn test_uuid_generator_prefixes() {
        let gen = UuidIdGenerator;
        let id = gen.next_id("ALR");
        assert!(id.starts_with("ALR-"));
        assert_ne!(gen.next_id("ALR"), id);
    }
}
