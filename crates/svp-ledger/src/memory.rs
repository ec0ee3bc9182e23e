//! In-memory ledger backend.
//!
//! Behaves like the real content ledger where SVP depends on it:
//! - re-publishing a permlink is an edit (parent and creation time kept)
//! - replies are listed oldest first
//! - an optional per-author minimum write interval rejects writes with the
//!   same sentinel details the real ledger uses
//! - a weight-0 vote withdraws the voter's vote
//!
//! Shared state lives behind `Arc<RwLock<..>>`, so clones are handles onto
//! the same ledger. Every participant of a test (seller, buyers) holds a
//! clone.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use svp_types::{
    AccountName, Comment, ContentItem, Permlink, ReplyFilter, Result, SvpError, Vote, VoteFilter,
    constants,
};
use tokio::sync::RwLock;

use crate::port::Ledger;

/// Maximum number of discussions returned by a tag query.
const DISCUSSIONS_LIMIT: usize = 100;

type Key = (AccountName, Permlink);

/// One accepted write, in acceptance order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub author: AccountName,
    pub permlink: Permlink,
    pub title: String,
}

#[derive(Default)]
struct LedgerState {
    items: HashMap<Key, ContentItem>,
    /// Children of each item in publish order.
    children: HashMap<Key, Vec<Key>>,
    votes: HashMap<Key, Vec<Vote>>,
    last_write: HashMap<AccountName, Instant>,
    /// Details of failures to return from the next `publish` calls.
    injected_failures: VecDeque<String>,
    write_log: Vec<WriteRecord>,
}

/// A thread-safe in-memory content ledger.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    min_write_interval: Option<Duration>,
}

impl InMemoryLedger {
    /// Creates an empty ledger without rate limiting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ledger that rejects writes by the same author closer
    /// together than `interval`.
    #[must_use]
    pub fn with_min_write_interval(interval: Duration) -> Self {
        Self {
            state: Arc::default(),
            min_write_interval: Some(interval),
        }
    }

    /// Make the next `publish` call fail with `detail` (classified like a
    /// real ledger failure). Calls queue up in order.
    pub async fn inject_write_failure(&self, detail: impl Into<String>) {
        self.state.write().await.injected_failures.push_back(detail.into());
    }

    /// Every accepted write, oldest first.
    pub async fn write_log(&self) -> Vec<WriteRecord> {
        self.state.read().await.write_log.clone()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn publish(&self, author: &AccountName, comment: Comment) -> Result<Permlink> {
        let mut state = self.state.write().await;

        if let Some(detail) = state.injected_failures.pop_front() {
            return Err(SvpError::from_ledger_detail(detail));
        }

        if let (Some(interval), Some(last)) = (self.min_write_interval, state.last_write.get(author))
        {
            let elapsed = last.elapsed();
            if elapsed < interval {
                let sentinel = if comment.parent.is_some() {
                    constants::RATE_LIMIT_REPLY_SENTINEL
                } else {
                    constants::RATE_LIMIT_ROOT_SENTINEL
                };
                tracing::debug!(author = %author, ?elapsed, "Write rejected by rate limit");
                return Err(SvpError::from_ledger_detail(format!(
                    "{sentinel}: wait {:?} between writes",
                    interval.saturating_sub(elapsed)
                )));
            }
        }

        let parent_key = match &comment.parent {
            Some(parent) => {
                let key = (parent.author.clone(), parent.permlink.clone());
                if !state.items.contains_key(&key) {
                    return Err(SvpError::from_ledger_detail(format!(
                        "parent {parent} does not exist"
                    )));
                }
                Some(key)
            }
            None => None,
        };

        let now = Utc::now();
        let key = (author.clone(), comment.permlink.clone());
        if let Some(existing) = state.items.get_mut(&key) {
            existing.title = comment.title.clone();
            existing.body = comment.body;
            existing.metadata = comment.metadata;
            existing.last_activity = now;
        } else {
            state.items.insert(
                key.clone(),
                ContentItem {
                    author: author.clone(),
                    permlink: comment.permlink.clone(),
                    parent: comment.parent.clone(),
                    title: comment.title.clone(),
                    body: comment.body,
                    metadata: comment.metadata,
                    created_at: now,
                    last_activity: now,
                },
            );
            if let Some(parent_key) = parent_key {
                if let Some(parent) = state.items.get_mut(&parent_key) {
                    parent.last_activity = now;
                }
                state.children.entry(parent_key).or_default().push(key);
            }
        }

        state.last_write.insert(author.clone(), Instant::now());
        state.write_log.push(WriteRecord {
            author: author.clone(),
            permlink: comment.permlink.clone(),
            title: comment.title,
        });
        Ok(comment.permlink)
    }

    async fn get_content(
        &self,
        author: &AccountName,
        permlink: &Permlink,
    ) -> Result<Option<ContentItem>> {
        let state = self.state.read().await;
        Ok(state.items.get(&(author.clone(), permlink.clone())).cloned())
    }

    async fn get_replies(
        &self,
        author: &AccountName,
        permlink: &Permlink,
        filter: &ReplyFilter,
    ) -> Result<Vec<ContentItem>> {
        let state = self.state.read().await;
        let Some(children) = state.children.get(&(author.clone(), permlink.clone())) else {
            return Ok(Vec::new());
        };
        Ok(children
            .iter()
            .filter_map(|key| state.items.get(key))
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn vote(
        &self,
        voter: &AccountName,
        author: &AccountName,
        permlink: &Permlink,
        weight: u16,
    ) -> Result<()> {
        if weight > constants::MAX_VOTE_WEIGHT {
            return Err(SvpError::from_ledger_detail(format!(
                "vote weight {weight} exceeds {}",
                constants::MAX_VOTE_WEIGHT
            )));
        }

        let mut state = self.state.write().await;
        let key = (author.clone(), permlink.clone());
        if !state.items.contains_key(&key) {
            return Err(SvpError::from_ledger_detail(format!(
                "cannot vote on missing content @{author}/{permlink}"
            )));
        }

        let votes = state.votes.entry(key).or_default();
        votes.retain(|v| v.voter != *voter);
        if weight > 0 {
            votes.push(Vote {
                voter: voter.clone(),
                weight,
                time: Utc::now(),
            });
        }
        Ok(())
    }

    async fn get_active_votes(
        &self,
        author: &AccountName,
        permlink: &Permlink,
        filter: &VoteFilter,
    ) -> Result<Vec<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .get(&(author.clone(), permlink.clone()))
            .map(|votes| votes.iter().filter(|v| filter.matches(v)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_active_discussions_by_tag(&self, tag: &str) -> Result<Vec<ContentItem>> {
        let state = self.state.read().await;
        let mut posts: Vec<ContentItem> = state
            .items
            .values()
            .filter(|item| !item.is_reply() && item.tags().contains(&tag))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        posts.truncate(DISCUSSIONS_LIMIT);
        Ok(posts)
    }
}
