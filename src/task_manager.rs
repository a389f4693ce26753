//! Named background tasks that share one stop signal.

use futures::future::join_all;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type NamedHandle = (&'static str, JoinHandle<()>);

/// Registry of the poller, dispatcher and server tasks.
///
/// Tasks watch the receiver handed out by [`TaskManager::get_shutdown_rx`];
/// [`TaskManager::shutdown`] only joins them, so the stop flag must already
/// be raised by whoever owns the sender.
#[derive(Clone, Debug)]
pub struct TaskManager {
    tasks: Arc<Mutex<Vec<NamedHandle>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskManager {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            shutdown_rx,
        }
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "Starting task");
        let handle = tokio::spawn(task);
        self.lock_tasks().push((name, handle));
    }

    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Joins every task and returns how many of them panicked.
    pub async fn shutdown(self) -> usize {
        let tasks: Vec<NamedHandle> = self.lock_tasks().drain(..).collect();
        info!(count = tasks.len(), "Waiting for tasks to stop");

        let (names, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let mut panicked = 0;
        for (name, joined) in names.into_iter().zip(join_all(handles).await) {
            if let Err(e) = joined {
                error!(task = name, error = %e, "Task panicked");
                panicked += 1;
            } else {
                debug!(task = name, "Task stopped");
            }
        }

        if panicked == 0 {
            info!("All tasks stopped.");
        }
        panicked
    }

    // A task panicking while holding the lock leaves the list itself intact.
    fn lock_tasks(&self) -> MutexGuard<'_, Vec<NamedHandle>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
