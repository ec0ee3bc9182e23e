//! The ledger port.
//!
//! SVP never talks to a concrete chain. Everything it needs is expressed by
//! [`Ledger`]; adapters (an RPC client, the in-memory ledger) implement it.
//! Authentication is assumed to be satisfied by the adapter.

use std::sync::Arc;

use async_trait::async_trait;
use svp_types::{AccountName, Comment, ContentItem, Permlink, ReplyFilter, Result, Vote, VoteFilter};

/// Content, reply and vote primitives of the underlying ledger.
///
/// Write failures caused by the per-author minimum interval must surface as
/// [`svp_types::SvpError::RateLimited`], usually via
/// [`svp_types::SvpError::from_ledger_detail`].
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Publish `comment` as `author`. Re-publishing an existing permlink is
    /// an edit. Returns the permlink written.
    async fn publish(&self, author: &AccountName, comment: Comment) -> Result<Permlink>;

    /// Read one item; `None` if it does not exist.
    async fn get_content(
        &self,
        author: &AccountName,
        permlink: &Permlink,
    ) -> Result<Option<ContentItem>>;

    /// Direct replies to an item, oldest first, narrowed by `filter`.
    async fn get_replies(
        &self,
        author: &AccountName,
        permlink: &Permlink,
        filter: &ReplyFilter,
    ) -> Result<Vec<ContentItem>>;

    /// Cast (or with weight 0, withdraw) a vote.
    async fn vote(
        &self,
        voter: &AccountName,
        author: &AccountName,
        permlink: &Permlink,
        weight: u16,
    ) -> Result<()>;

    /// Active votes on an item, narrowed by `filter`.
    async fn get_active_votes(
        &self,
        author: &AccountName,
        permlink: &Permlink,
        filter: &VoteFilter,
    ) -> Result<Vec<Vote>>;

    /// Top-level posts tagged `tag`, most recently active first.
    async fn get_active_discussions_by_tag(&self, tag: &str) -> Result<Vec<ContentItem>>;
}

/// Shared, dynamically dispatched ledger handle.
pub type LedgerRef = Arc<dyn Ledger>;
