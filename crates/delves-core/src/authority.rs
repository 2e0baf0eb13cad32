//! The authoritative thread.
//!
//! The host engine allows world mutations (loading and unloading worlds,
//! teleporting players, touching entities) from exactly one thread. This
//! module owns that thread: work is submitted through a cloneable
//! [`Authority`] handle, queued FIFO, and executed one task at a time.
//!
//! Every task receives a [`Tick`] token. `Tick` is neither `Send` nor
//! constructible outside this module, so any API that takes `&Tick` can only
//! be called from inside a task running on the authoritative thread.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::AuthorityError;

/// Proof that the current code runs on the authoritative thread.
#[derive(Debug)]
pub struct Tick {
    _not_send: PhantomData<*const ()>,
}

impl Tick {
    fn new() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

type Task = Box<dyn FnOnce(&Tick) + Send + 'static>;

enum Message {
    Run(Task),
    Stop,
}

/// Cloneable handle for submitting work to the authoritative thread.
#[derive(Clone)]
pub struct Authority {
    sender: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl Authority {
    /// Spawns the authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(name: &str) -> std::io::Result<AuthorityThread> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || drain(receiver))?;

        Ok(AuthorityThread {
            authority: Self { sender },
            handle,
        })
    }

    /// Queues `task` without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError::Stopped` if the thread has shut down.
    pub fn execute<F>(&self, task: F) -> Result<(), AuthorityError>
    where
        F: FnOnce(&Tick) + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(task)))
            .map_err(|_| AuthorityError::Stopped)
    }

    /// Queues `task` and resolves with its return value once it has run.
    ///
    /// Must not be awaited from inside a task already running on the
    /// authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `AuthorityError::Stopped` if the thread has shut down and
    /// `AuthorityError::TaskAborted` if the task panicked.
    pub async fn run<F, R>(&self, task: F) -> Result<R, AuthorityError>
    where
        F: FnOnce(&Tick) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.execute(move |tick| {
            // The receiver may have been dropped by a cancelled caller.
            let _ = reply.send(task(tick));
        })?;
        result.await.map_err(|_| AuthorityError::TaskAborted)
    }
}

/// Owner of the spawned authoritative thread.
#[derive(Debug)]
pub struct AuthorityThread {
    authority: Authority,
    handle: JoinHandle<()>,
}

impl AuthorityThread {
    /// Returns a handle for submitting work.
    #[must_use]
    pub fn authority(&self) -> Authority {
        self.authority.clone()
    }

    /// Lets every task queued so far run, then stops the thread and waits
    /// for it to exit. Submissions made afterwards fail with
    /// `AuthorityError::Stopped`.
    pub fn shutdown(self) {
        // Already stopped if the send fails.
        let _ = self.authority.sender.send(Message::Stop);
        if self.handle.join().is_err() {
            error!("authoritative thread terminated abnormally");
        }
    }
}

fn drain(mut receiver: mpsc::UnboundedReceiver<Message>) {
    let tick = Tick::new();
    while let Some(message) = receiver.blocking_recv() {
        match message {
            Message::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(&tick))) {
                    error!(reason = panic_message(&*payload), "authoritative task panicked");
                }
            }
            Message::Stop => break,
        }
    }
    debug!("authoritative thread stopped");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
