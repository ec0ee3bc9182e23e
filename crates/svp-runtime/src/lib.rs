//! # svp-runtime
//!
//! Execution building blocks shared by every SVP actor:
//!
//! - [`PollingLifecycle`]: start/stop loop around a [`UnitOfWork`]
//! - [`WriteQueue`]: per-identity serialized writer with rate-limit retry

pub mod lifecycle;
pub mod write_queue;

pub use lifecycle::{LifecycleEvent, LifecycleState, PollingLifecycle, UnitOfWork};
pub use write_queue::{PendingWrite, Priority, WriteQueue, WriteQueueEvent};
