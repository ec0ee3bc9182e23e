//! # svp-market
//!
//! The two roles of an SVP participant, built on the lower crates:
//!
//! - **Seller**: [`ServiceProtocol`] per service (sessions, votables, paid
//!   order scan, sealed delivery) driven by a polling loop
//! - **Buyer**: [`MarketplaceIdentity::place_order`],
//!   [`MarketplaceIdentity::receive_delivery`] and discovery
//!
//! ```text
//!   svp-market
//!     ├── identity  ── one account, owns the write queue and keys
//!     ├── service   ── one sellable service
//!     └── provider  ── what gets delivered
//! ```

pub mod identity;
pub mod provider;
pub mod service;

pub use identity::{Delivery, IdentityEvent, MarketplaceIdentity, OrderHandle};
pub use provider::{EchoProvider, FnProvider, Provider};
pub use service::{ServiceEvent, ServiceProtocol, SessionBinding};
