//! Execution contexts that result deliveries are marshalled onto.

use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// A unit of work for an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere to run consumer callbacks.
pub trait Executor: Send + Sync {
    /// Run `job`, now or later, on this executor's context.
    fn execute(&self, job: Job);
}

/// Runs jobs on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A dedicated thread that runs jobs one at a time, in submission order.
///
/// This is the "interaction" context: everything a user sees happens here,
/// never on the capture thread.
pub struct InteractionQueue {
    sender: Mutex<Option<Sender<Job>>>,
    handle: Option<JoinHandle<()>>,
}

impl InteractionQueue {
    /// Start the queue thread.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for job in receiver {
                    job();
                }
                debug!("Interaction queue drained");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Some(handle),
        })
    }
}

impl Executor for InteractionQueue {
    fn execute(&self, job: Job) {
        let guard = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    warn!("Interaction queue thread is gone, dropping job");
                }
            }
            None => warn!("Interaction queue shut down, dropping job"),
        }
    }
}

impl Drop for InteractionQueue {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish the queued jobs and exit
        self.sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("Interaction queue thread panicked");
            }
        }
    }
}
