//! The task-generator external collaborator: wherever the next task to
//! solve comes from. Kept as a narrow trait plus a couple of stand-ins so
//! `main.rs` has something concrete to drive the loop with before a real
//! generator is wired up.

use async_trait::async_trait;

use crate::core::types::Task;

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Return the next task to attempt, or `None` when the source is
    /// exhausted (used by `run --once` / `benchmark` to bound a run).
    async fn next_task(&mut self) -> Option<Task>;
}

/// Cycles through a fixed list of tasks, repeating from the start once
/// `repeat` is true and the list is exhausted.
pub struct StaticTaskSource {
    tasks: Vec<Task>,
    cursor: usize,
    repeat: bool,
}

impl StaticTaskSource {
    #[must_use]
    pub fn new(tasks: Vec<Task>, repeat: bool) -> Self {
        Self { tasks, cursor: 0, repeat }
    }

    /// A handful of illustrative tasks spanning easy/medium/hard
    /// difficulty, used when no task file is supplied.
    #[must_use]
    pub fn sample() -> Self {
        let tasks = vec![
            Task::new("reverse a string", "Write a function that reverses a string.", "strings", 0.1),
            Task::new("two sum", "Given a list of integers and a target, return indices of the two numbers that add up to the target.", "arrays", 0.3),
            Task::new("longest common subsequence", "Given two strings, return the length of their longest common subsequence.", "dynamic_programming", 0.7),
            Task::new("0/1 knapsack", "Given item weights, values, and a capacity, return the maximum achievable value.", "knapsack", 0.8),
            Task::new("edit distance", "Given two strings, return the minimum number of single-character edits to turn one into the other.", "edit_distance", 0.75),
        ];
        Self::new(tasks, true)
    }
}

#[async_trait]
impl TaskSource for StaticTaskSource {
    async fn next_task(&mut self) -> Option<Task> {
        if self.tasks.is_empty() {
            return None;
        }
        if self.cursor >= self.tasks.len() {
            if !self.repeat {
                return None;
            }
            self.cursor = 0;
        }
        let task = self.tasks[self.cursor].clone();
        self.cursor += 1;
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_source_yields_at_least_one_hard_task() {
        let mut source = StaticTaskSource::sample();
        let mut saw_hard = false;
        for _ in 0..5 {
            if let Some(task) = source.next_task().await {
                saw_hard = saw_hard || task.difficulty >= 0.7;
            }
        }
        assert!(saw_hard);
    }

    #[tokio::test]
    async fn non_repeating_source_exhausts() {
        let mut source = StaticTaskSource::new(vec![Task::new("a", "a", "a", 0.1)], false);
        assert!(source.next_task().await.is_some());
        assert!(source.next_task().await.is_none());
    }

    #[tokio::test]
    async fn repeating_source_cycles_forever() {
        let mut source = StaticTaskSource::new(vec![Task::new("a", "a", "a", 0.1)], true);
        for _ in 0..10 {
            assert!(source.next_task().await.is_some());
        }
    }
}
