//! IdGenerator port - task id allocation.
//!
//! テスト容易性のために trait として抽象化しています。

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::TaskId;

/// IdGenerator hands out task ids.
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn next_task_id(&self) -> TaskId;
}

/// Monotonic ids starting at 1 (`"1"`, `"2"`, ...).
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_task_id(&self) -> TaskId {
        TaskId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_start_at_one_and_increase() {
        let id_gen = SequentialIdGenerator::new();
        assert_eq!(id_gen.next_task_id().to_string(), "1");
        assert_eq!(id_gen.next_task_id().to_string(), "2");
        assert_eq!(id_gen.next_task_id().to_string(), "3");
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let id_gen = Arc::new(SequentialIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let id_gen = Arc::clone(&id_gen);
                std::thread::spawn(move || {
                    (0..100).map(|_| id_gen.next_task_id()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<TaskId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
