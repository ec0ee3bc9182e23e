//! # PollingLifecycle — restartable, observable background loop
//!
//! Wraps a one-shot [`UnitOfWork`] into a loop that can be started, stopped
//! and watched.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐ start ┌─────────┐ stop ┌──────────┐
//!   │ IDLE ├──────▶│ RUNNING ├─────▶│ STOPPING │
//!   └──▲───┘       └────┬────┘      └────┬─────┘
//!      │   fatal error  │   loop exits   │
//!      └────────────────┴────────────────┘
//! ```
//!
//! The state lives in a `watch` channel: it is both the single source of
//! truth and the wake-up signal, so a stop request interrupts the
//! inter-cycle wait instead of waiting the full cycle.
//!
//! ## Ordering
//!
//! - every `Processed` is emitted before `Stopped`
//! - `Stopped` is emitted before the state returns to `IDLE`
//! - `stop()` resolves only once the state is `IDLE` again
//! - `spawn()` enters `RUNNING` before it returns, so an immediate `stop()`
//!   still waits for the loop
//!
//! ## Errors
//!
//! Every error from the unit of work is emitted as `Error`. Transient errors
//! (see [`SvpError::is_transient`]) keep the loop running; any other error
//! halts it (fail-stop) and is returned from `start`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use svp_types::{Result, SvpError, constants};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// A repeatable unit of work driven by a [`PollingLifecycle`].
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    /// Result of one invocation, broadcast as `Processed`.
    type Output: Clone + Send + 'static;

    async fn process(&self) -> Result<Self::Output>;
}

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopping => write!(f, "STOPPING"),
        }
    }
}

/// Notification emitted by a lifecycle.
#[derive(Debug, Clone)]
pub enum LifecycleEvent<T> {
    Started,
    Processed(T),
    Error(SvpError),
    Stopped,
}

/// Start/stop state machine around a unit of work.
pub struct PollingLifecycle<W: UnitOfWork> {
    name: String,
    work: Arc<W>,
    state: watch::Sender<LifecycleState>,
    events: broadcast::Sender<LifecycleEvent<W::Output>>,
}

impl<W: UnitOfWork> PollingLifecycle<W> {
    /// Create an idle lifecycle. `name` only labels log lines.
    pub fn new(name: impl Into<String>, work: Arc<W>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        let (events, _) = broadcast::channel(constants::EVENT_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            work,
            state,
            events,
        }
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn work(&self) -> &Arc<W> {
        &self.work
    }

    /// Receive every notification emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent<W::Output>> {
        self.events.subscribe()
    }

    /// Run the loop until stopped or halted by a fatal error.
    ///
    /// Resolves `Ok(())` after a requested stop, or with the fatal error.
    ///
    /// # Errors
    /// - `AlreadyRunning` if the lifecycle is not idle
    /// - the first non-transient error raised by the unit of work
    pub async fn start(&self, cycle: Duration) -> Result<()> {
        self.acquire()?;
        self.run(cycle).await
    }

    /// Move to `RUNNING` now and drive the loop on a new task.
    ///
    /// A `stop()` issued right after this returns always waits for the
    /// spawned loop, even if the task has not been polled yet.
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if the lifecycle is not idle.
    pub fn spawn(self: &Arc<Self>, cycle: Duration) -> Result<JoinHandle<Result<()>>> {
        self.acquire()?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run(cycle).await }))
    }

    fn acquire(&self) -> Result<()> {
        let acquired = self.state.send_if_modified(|s| {
            if *s == LifecycleState::Idle {
                *s = LifecycleState::Running;
                true
            } else {
                false
            }
        });
        if acquired {
            Ok(())
        } else {
            Err(SvpError::AlreadyRunning)
        }
    }

    async fn run(&self, cycle: Duration) -> Result<()> {
        let mut state_rx = self.state.subscribe();
        tracing::info!(lifecycle = %self.name, ?cycle, "Lifecycle started");
        self.emit(LifecycleEvent::Started);

        let outcome = loop {
            match self.work.process().await {
                Ok(output) => self.emit(LifecycleEvent::Processed(output)),
                Err(err) if err.is_transient() => {
                    tracing::warn!(lifecycle = %self.name, error = %err, "Transient error, continuing");
                    self.emit(LifecycleEvent::Error(err));
                }
                Err(err) => {
                    tracing::error!(lifecycle = %self.name, error = %err, "Fatal error, halting");
                    self.emit(LifecycleEvent::Error(err.clone()));
                    break Err(err);
                }
            }

            if !Self::wait_while_running(&mut state_rx, cycle).await {
                break Ok(());
            }
        };

        if self.state() == LifecycleState::Stopping {
            tracing::info!(lifecycle = %self.name, "Lifecycle stopped");
            self.emit(LifecycleEvent::Stopped);
        }
        self.state.send_replace(LifecycleState::Idle);
        outcome
    }

    /// Request a stop and wait until the loop has exited.
    ///
    /// Re-checks at least every `cycle`. Returns immediately when idle.
    pub async fn stop(&self, cycle: Duration) {
        self.state.send_if_modified(|s| {
            if *s == LifecycleState::Running {
                *s = LifecycleState::Stopping;
                true
            } else {
                false
            }
        });

        let mut state_rx = self.state.subscribe();
        loop {
            if *state_rx.borrow_and_update() == LifecycleState::Idle {
                return;
            }
            // Timeout only bounds the re-check interval.
            let _ = tokio::time::timeout(cycle, state_rx.changed()).await;
        }
    }

    /// Wait up to `cycle`, waking early on a state change. Returns whether
    /// the lifecycle is still running afterwards.
    async fn wait_while_running(
        state_rx: &mut watch::Receiver<LifecycleState>,
        cycle: Duration,
    ) -> bool {
        let deadline = tokio::time::sleep(cycle);
        tokio::pin!(deadline);
        loop {
            if *state_rx.borrow_and_update() != LifecycleState::Running {
                return false;
            }
            tokio::select! {
                () = &mut deadline => return *state_rx.borrow() == LifecycleState::Running,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn emit(&self, event: LifecycleEvent<W::Output>) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
