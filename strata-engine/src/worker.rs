//! Bounded worker pool for aggregation tasks.
//!
//! Named `std::thread` workers draining a bounded crossbeam channel.
//! Tasks are plain closures; callers that need the result submit through
//! [`WorkerPool::submit`] and wait on the returned receiver, which lets the
//! orchestrator apply a per-task timeout without holding any locks.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a submission failed.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitError {
    PoolShutDown,
}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize, channel_bound: usize) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<Job>(channel_bound.max(1));
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads.max(1) {
            let rx: Receiver<Job> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("strata-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })?;
            handles.push(handle);
        }
        debug!(threads = handles.len(), "worker pool started");
        Ok(Self {
            sender: Some(sender),
            handles,
        })
    }

    /// Run a job on the pool and hand back a receiver for its result.
    /// Blocks if the task channel is full.
    pub fn submit<T, F>(&self, job: F) -> Result<Receiver<T>, SubmitError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            // The caller may have stopped waiting (timeout); that's fine.
            let _ = tx.send(job());
        });
        match &self.sender {
            Some(sender) => sender.send(wrapped).map_err(|_| SubmitError::PoolShutDown)?,
            None => return Err(SubmitError::PoolShutDown),
        }
        Ok(rx)
    }

    /// Stop accepting work and wait for in-flight tasks to finish.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool drained");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
