//! # svp-types
//!
//! Shared types, errors, and configuration for the **SVP** service
//! marketplace protocol.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountName`], [`Permlink`], [`ContentRef`]
//! - **Content model**: [`ContentItem`], [`Comment`], [`Vote`], [`ReplyFilter`], [`VoteFilter`]
//! - **Service model**: [`ServiceConfig`], [`ServiceTerms`], [`ServiceDescriptor`], [`ServiceListing`]
//! - **Configuration**: [`MarketConfig`], [`IdentityConfig`]
//! - **Errors**: [`SvpError`] with `SVP_ERR_` prefix codes
//! - **Constants**: well-known permlinks, rate-limit sentinels, defaults

pub mod config;
pub mod constants;
pub mod content;
pub mod error;
pub mod ids;
pub mod service;

pub use config::*;
pub use content::*;
pub use error::*;
pub use ids::*;
pub use service::*;

// Constants are accessed via `svp_types::constants::FOO`
// (not re-exported to avoid name collisions).
