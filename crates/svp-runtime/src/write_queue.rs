//! # WriteQueue — one writer per identity
//!
//! The ledger rate-limits writes per account, so every write an identity
//! makes goes through a single FIFO queue drained by one worker task.
//!
//! ```text
//!  submit(A) ─┐
//!  submit(B) ─┼──▶ [ C | A | B ] ──▶ worker ──▶ ledger.publish
//!  submit(C, High) ┘    ▲                  │
//!                       └─ rate-limited ───┘  (retry at head)
//! ```
//!
//! - the worker is spawned lazily when work arrives and exits when the queue
//!   drains; at most one exists at a time
//! - the worker sleeps `cooldown` after every attempt
//! - a rate-limited write stays at the head and is retried; any other error
//!   rejects that request and the queue moves on
//! - the queue lock is never held across an `.await`

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use svp_ledger::LedgerRef;
use svp_types::{AccountName, Comment, Permlink, Result, SvpError, constants};
use tokio::sync::{broadcast, oneshot};

/// Queue position for a submitted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Appended behind everything pending.
    #[default]
    Normal,
    /// Placed ahead of everything not yet started.
    High,
}

/// Notification emitted by the worker for each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteQueueEvent {
    Written { permlink: Permlink },
    Delayed { permlink: Permlink, error: SvpError },
    Failed { permlink: Permlink, error: SvpError },
}

struct Job {
    comment: Comment,
    reply: oneshot::Sender<Result<Permlink>>,
}

#[derive(Default)]
struct Pending {
    jobs: VecDeque<Job>,
    worker_active: bool,
}

struct Shared {
    ledger: LedgerRef,
    author: AccountName,
    cooldown: Duration,
    pending: Mutex<Pending>,
    events: broadcast::Sender<WriteQueueEvent>,
}

/// Serialized, rate-limit aware writer for one identity.
#[derive(Clone)]
pub struct WriteQueue {
    shared: Arc<Shared>,
}

impl WriteQueue {
    #[must_use]
    pub fn new(ledger: LedgerRef, author: AccountName, cooldown: Duration) -> Self {
        let (events, _) = broadcast::channel(constants::EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                ledger,
                author,
                cooldown,
                pending: Mutex::new(Pending::default()),
                events,
            }),
        }
    }

    #[must_use]
    pub fn author(&self) -> &AccountName {
        &self.shared.author
    }

    /// Queue a write and return a handle that resolves when it lands.
    ///
    /// The request takes its queue position immediately, before the handle is
    /// first polled. Dropping the handle does not cancel the write.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, comment: Comment, priority: Priority) -> PendingWrite {
        let (reply, rx) = oneshot::channel();
        let permlink = comment.permlink.clone();
        let spawn_worker = {
            let mut pending = self.shared.pending.lock();
            let job = Job { comment, reply };
            match priority {
                Priority::Normal => pending.jobs.push_back(job),
                Priority::High => pending.jobs.push_front(job),
            }
            !std::mem::replace(&mut pending.worker_active, true)
        };

        tracing::debug!(
            author = %self.shared.author,
            permlink = %permlink,
            ?priority,
            "Write queued"
        );
        if spawn_worker {
            tokio::spawn(run_worker(Arc::clone(&self.shared)));
        }
        PendingWrite { permlink, rx }
    }

    /// Queue a write and wait for its outcome.
    ///
    /// # Errors
    /// - the non-retryable ledger error that rejected this write
    /// - `QueueClosed` if the worker went away without answering
    pub async fn enqueue(&self, comment: Comment, priority: Priority) -> Result<Permlink> {
        self.submit(comment, priority).await
    }

    /// Number of writes not yet completed, including a retrying head.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.pending.lock().jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no worker is currently running.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.shared.pending.lock().worker_active
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WriteQueueEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("author", &self.shared.author)
            .field("cooldown", &self.shared.cooldown)
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PendingWrite
// ---------------------------------------------------------------------------

/// Completion handle for a submitted write.
#[derive(Debug)]
pub struct PendingWrite {
    permlink: Permlink,
    rx: oneshot::Receiver<Result<Permlink>>,
}

impl PendingWrite {
    /// Permlink the write was submitted under.
    #[must_use]
    pub fn permlink(&self) -> &Permlink {
        &self.permlink
    }
}

impl Future for PendingWrite {
    type Output = Result<Permlink>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|answer| answer.unwrap_or(Err(SvpError::QueueClosed)))
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_worker(shared: Arc<Shared>) {
    tracing::debug!(author = %shared.author, "Write worker started");
    loop {
        let Some(job) = next_job(&shared) else {
            tracing::debug!(author = %shared.author, "Write worker drained");
            return;
        };
        let permlink = job.comment.permlink.clone();

        match shared.ledger.publish(&shared.author, job.comment.clone()).await {
            Ok(written) => {
                tracing::debug!(author = %shared.author, permlink = %written, "Write landed");
                emit(&shared, WriteQueueEvent::Written {
                    permlink: written.clone(),
                });
                let _ = job.reply.send(Ok(written));
            }
            Err(error) if error.is_rate_limited() => {
                tracing::warn!(author = %shared.author, permlink = %permlink, %error, "Write delayed");
                emit(&shared, WriteQueueEvent::Delayed {
                    permlink,
                    error,
                });
                shared.pending.lock().jobs.push_front(job);
            }
            Err(error) => {
                tracing::warn!(author = %shared.author, permlink = %permlink, %error, "Write rejected");
                emit(&shared, WriteQueueEvent::Failed {
                    permlink,
                    error: error.clone(),
                });
                let _ = job.reply.send(Err(error));
            }
        }

        tokio::time::sleep(shared.cooldown).await;
    }
}

/// Pop the head, or mark the worker inactive if there is none.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut pending = shared.pending.lock();
    let job = pending.jobs.pop_front();
    if job.is_none() {
        pending.worker_active = false;
    }
    job
}

fn emit(shared: &Shared, event: WriteQueueEvent) {
    let _ = shared.events.send(event);
}
