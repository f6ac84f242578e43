//! Cooperative task set for in-flight fetch futures.
//!
//! The engine runs on a single logical thread: fetch futures are pushed
//! here and driven to a stall once per tick. Wakes from channel senders
//! (service responses arriving) mark tasks ready; the next tick's poll
//! picks them up. There is no parallelism; "concurrency" is overlapping
//! I/O only.

use futures_util::future::LocalBoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::task::noop_waker;
use futures_util::FutureExt;
use std::future::Future;
use std::task::{Context, Poll};

/// Engine-owned set of spawned fetch tasks.
#[derive(Default)]
pub struct TaskSet {
    tasks: FuturesUnordered<LocalBoxFuture<'static, ()>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. It starts running at the next `run_until_stalled`.
    pub fn spawn(&mut self, future: impl Future<Output = ()> + 'static) {
        self.tasks.push(future.boxed_local());
    }

    /// Poll every ready task until all remaining ones are pending.
    pub fn run_until_stalled(&mut self) {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        while let Poll::Ready(Some(())) = self.tasks.poll_next_unpin(&mut cx) {}
    }

    /// Number of tasks still in flight.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every in-flight task. Engine teardown only.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_channel::oneshot;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_ready_tasks_complete_in_one_pass() {
        let mut tasks = TaskSet::new();
        let hits = Rc::new(Cell::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            tasks.spawn(async move {
                hits.set(hits.get() + 1);
            });
        }

        tasks.run_until_stalled();
        assert_eq!(hits.get(), 3);
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_pending_task_survives_and_resumes() {
        let mut tasks = TaskSet::new();
        let (sender, receiver) = oneshot::channel::<u32>();
        let seen = Rc::new(Cell::new(0));

        let seen_in_task = seen.clone();
        tasks.spawn(async move {
            if let Ok(value) = receiver.await {
                seen_in_task.set(value);
            }
        });

        tasks.run_until_stalled();
        assert_eq!(tasks.len(), 1);
        assert_eq!(seen.get(), 0);

        sender.send(7).unwrap();
        tasks.run_until_stalled();
        assert!(tasks.is_empty());
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_clear_cancels_in_flight_tasks() {
        let mut tasks = TaskSet::new();
        let (_sender, receiver) = oneshot::channel::<u32>();
        tasks.spawn(async move {
            let _ = receiver.await;
        });

        tasks.run_until_stalled();
        tasks.clear();
        assert!(tasks.is_empty());
    }
}
