use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("privileged context has shut down")]
    Disconnected,
    #[error("job panicked on the privileged context: {0}")]
    Panicked(String),
}

/// A single thread that every mutating host call is marshalled onto.
///
/// [`PrivilegedContext::run`] blocks the caller until the job has finished.
/// Calls made from the context thread itself run inline instead of being
/// queued behind themselves.
pub struct PrivilegedContext {
    sender: Option<Sender<Job>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl PrivilegedContext {
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name("privileged-context".to_string())
            .spawn(move || worker_loop(receiver))?;
        let thread_id = handle.thread().id();
        Ok(Self {
            sender: Some(sender),
            thread_id,
            handle: Some(handle),
        })
    }

    /// True when called from the context thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn run<F, R>(&self, job: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| DispatchError::Panicked(panic_message(payload.as_ref())));
        }

        let sender = self.sender.as_ref().ok_or(DispatchError::Disconnected)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        sender
            .send(Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(job))
                    .map_err(|payload| DispatchError::Panicked(panic_message(payload.as_ref())));
                let _ = reply_tx.send(result);
            }))
            .map_err(|_| DispatchError::Disconnected)?;

        reply_rx.recv().map_err(|_| DispatchError::Disconnected)?
    }
}

impl Drop for PrivilegedContext {
    fn drop(&mut self) {
        // Closing the queue ends the worker loop once pending jobs drain.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Job>) {
    tracing::debug!("privileged context started");
    for job in receiver {
        job();
    }
    tracing::debug!("privileged context stopped");
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
