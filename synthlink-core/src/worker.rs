//! Non-real-time worker thread.
//!
//! Jobs that may block (file writes, dialogs) are submitted here instead of
//! running on the caller's thread. Jobs run one at a time in submission order.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum WorkerMsg {
    Run(Job),
    Shutdown,
}

/// Cheap, cloneable submission handle.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: Sender<WorkerMsg>,
}

impl WorkerHandle {
    /// Queue a job. Returns false if the worker has shut down.
    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) -> bool {
        if self.tx.send(WorkerMsg::Run(Box::new(job))).is_err() {
            log::warn!(target: "worker", "worker stopped, dropping job");
            return false;
        }
        true
    }
}

/// Owns the worker thread. Dropping it finishes already-queued jobs and joins.
pub struct Worker {
    handle: WorkerHandle,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMsg>();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(rx))?;
        Ok(Self {
            handle: WorkerHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }
}

fn worker_loop(rx: Receiver<WorkerMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::Run(job) => job(),
            WorkerMsg::Shutdown => break,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(WorkerMsg::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_jobs_run_in_order_off_thread() {
        let caller = thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let worker = Worker::spawn("test-worker").unwrap();
            let handle = worker.handle();
            for i in 0..5 {
                let seen = Arc::clone(&seen);
                assert!(handle.submit(move || {
                    assert_ne!(thread::current().id(), caller);
                    seen.lock().unwrap().push(i);
                }));
            }
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let worker = Worker::spawn("test-worker").unwrap();
        let handle = worker.handle();
        drop(worker);
        assert!(!handle.submit(|| {}));
    }
}
