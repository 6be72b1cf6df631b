//! Background worker for pipeline tasks that must not block the caller.
//!
//! Metadata pushes and deferred crash retrieval run here. Tasks drain on a
//! single tokio task in submission order, so a metadata push submitted after
//! a session-id update cannot overtake it.

use tokio::sync::mpsc;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A FIFO worker backed by a single draining task.
#[derive(Debug, Clone)]
pub struct BackgroundWorker {
    sender: mpsc::UnboundedSender<Task>,
}

impl BackgroundWorker {
    /// Spawn the worker. Requires a tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                task();
            }
        });
        Self { sender }
    }

    /// Submit a task. Tasks run in submission order. Submitting after the
    /// worker has shut down drops the task silently.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Box::new(task)).is_err() {
            tracing::debug!("background worker is gone, dropping task");
        }
    }
}
