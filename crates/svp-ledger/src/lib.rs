//! # svp-ledger
//!
//! The boundary between SVP and the content ledger it runs on.
//!
//! - [`Ledger`]: async port with the six primitives SVP needs (publish, read
//!   one item, read replies, vote, read votes, tag discovery)
//! - [`InMemoryLedger`]: complete in-process backend, used by tests and
//!   local simulations

pub mod memory;
pub mod port;

pub use memory::{InMemoryLedger, WriteRecord};
pub use port::{Ledger, LedgerRef};
