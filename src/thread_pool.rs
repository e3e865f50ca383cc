use std::thread;

use flume::Sender;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs image fetch and decode work off the drawing thread.
pub trait ThreadPool: Send + Sync + 'static {
    fn spawn(&self, task: Task);
}

/// A fixed set of worker threads pulling tasks from a shared queue.
///
/// Workers exit once the pool is dropped and the queue drains.
pub struct BasicThreadPool {
    tasks: Sender<Task>,
}

impl BasicThreadPool {
    pub fn new(num_threads: usize) -> Self {
        let (sender, receiver) = flume::unbounded::<Task>();

        for i in 0..num_threads.max(1) {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("easel-loader-{}", i))
                .spawn(move || {
                    for task in receiver {
                        task();
                    }
                });
            if let Err(e) = spawned {
                log::warn!("Failed to spawn image loader thread: {}", e);
            }
        }

        Self { tasks: sender }
    }
}

impl ThreadPool for BasicThreadPool {
    fn spawn(&self, task: Task) {
        if self.tasks.send(task).is_err() {
            log::warn!("Image loader threads have shut down; dropping task");
        }
    }
}

/// Runs every task immediately on the calling thread.
///
/// Results still travel through the same channels as with a real pool,
/// so callers observe them at the same point.
#[derive(Default)]
pub struct InlineThreadPool;

impl ThreadPool for InlineThreadPool {
    fn spawn(&self, task: Task) {
        task();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn tasks_run_on_workers() {
        let pool = BasicThreadPool::new(2);
        let (tx, rx) = flume::unbounded();
        for i in 0..4 {
            let tx = tx.clone();
            pool.spawn(Box::new(move || {
                let _ = tx.send(i);
            }));
        }
        let mut results: Vec<i32> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }
}
