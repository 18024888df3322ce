//! Post-mutation maintenance
//!
//! Index patching and trigger cascades run after a mutation has succeeded.
//! In [`MaintenanceMode::Inline`] they run before `execute` returns. In
//! [`MaintenanceMode::Background`] they are queued to a single consumer task
//! that runs them one at a time, in dispatch order, on the tokio blocking
//! pool; [`Maintenance::settle`] waits until the queue is drained.
//! Failures are logged and never reach the caller of `execute`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::config::MaintenanceMode;
use crate::error::Result;

type Task = Box<dyn FnOnce() -> Result<()> + Send>;

struct Job {
    name: &'static str,
    task: Task,
}

#[derive(Debug)]
pub struct Maintenance {
    /// Queue feeding the background consumer; `None` runs inline
    queue: Option<mpsc::UnboundedSender<Job>>,
    /// Jobs dispatched but not yet finished
    outstanding: Arc<AtomicUsize>,
    /// Signalled whenever `outstanding` drops to zero
    idle: Arc<Notify>,
}

impl Maintenance {
    pub fn new(mode: MaintenanceMode) -> Self {
        let outstanding = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let queue = match mode {
            MaintenanceMode::Inline => None,
            MaintenanceMode::Background(handle) => {
                let (sender, receiver) = mpsc::unbounded_channel();
                handle.spawn(drain(
                    receiver,
                    handle.clone(),
                    outstanding.clone(),
                    idle.clone(),
                ));
                Some(sender)
            }
        };

        Self {
            queue,
            outstanding,
            idle,
        }
    }

    /// Run `task` according to the maintenance mode
    pub fn dispatch<F>(&self, task_name: &'static str, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let Some(queue) = &self.queue else {
            run_logged(task_name, task);
            return;
        };

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            name: task_name,
            task: Box::new(task),
        };
        match queue.send(job) {
            Ok(()) => debug!(task = task_name, "maintenance queued"),
            Err(_) => {
                warn!(task = task_name, "maintenance queue closed, task dropped");
                finish(&self.outstanding, &self.idle);
            }
        }
    }

    /// Number of dispatched tasks that have not finished
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Wait for every dispatched task, including tasks dispatched by the
    /// tasks being waited for
    pub async fn settle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Consumer loop: one job at a time, in queue order
async fn drain(
    mut queue: mpsc::UnboundedReceiver<Job>,
    handle: Handle,
    outstanding: Arc<AtomicUsize>,
    idle: Arc<Notify>,
) {
    while let Some(Job { name, task }) = queue.recv().await {
        if let Err(e) = handle.spawn_blocking(move || run_logged(name, task)).await {
            warn!(task = name, error = %e, "maintenance task panicked");
        }
        finish(&outstanding, &idle);
    }
}

fn finish(outstanding: &AtomicUsize, idle: &Notify) {
    if outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
        idle.notify_waiters();
    }
}

fn run_logged<F>(task_name: &'static str, task: F)
where
    F: FnOnce() -> Result<()>,
{
    if let Err(e) = task() {
        warn!(task = task_name, error = %e, "maintenance task failed");
    }
}
