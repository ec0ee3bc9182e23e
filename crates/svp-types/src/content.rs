//! Ledger content model: posts, replies, votes and the write request.
//!
//! A post is a [`ContentItem`] without a parent; a reply has one. Items are
//! immutable once published except that re-publishing the same permlink is
//! treated by the ledger as an edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AccountName, ContentRef, Permlink};

/// A published content item as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub author: AccountName,
    pub permlink: Permlink,
    /// Present for replies.
    pub parent: Option<ContentRef>,
    pub title: String,
    pub body: String,
    /// Structured JSON metadata (`json_metadata` on the ledger).
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    /// Updated on edits and on new replies to this item.
    pub last_activity: DateTime<Utc>,
}

impl ContentItem {
    #[must_use]
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            author: self.author.clone(),
            permlink: self.permlink.clone(),
        }
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.parent.is_some()
    }

    /// String value stored under `key` in the metadata object, if any.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Tags listed in the metadata (`{"tags": [...]}`).
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// A write request: publish a post, or a reply when `parent` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub parent: Option<ContentRef>,
    pub permlink: Permlink,
    pub title: String,
    pub body: String,
    pub metadata: Option<Value>,
}

impl Comment {
    /// A top-level post with a caller-chosen permlink.
    #[must_use]
    pub fn post(permlink: Permlink, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            parent: None,
            permlink,
            title: title.into(),
            body: body.into(),
            metadata: None,
        }
    }

    /// A reply to `parent` under a freshly generated permlink.
    #[must_use]
    pub fn reply(parent: ContentRef, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            parent: Some(parent),
            permlink: Permlink::generate(),
            title: title.into(),
            body: body.into(),
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_permlink(mut self, permlink: Permlink) -> Self {
        self.permlink = permlink;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// An active vote on a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: AccountName,
    /// Basis points, `1..=MAX_VOTE_WEIGHT`.
    pub weight: u16,
    pub time: DateTime<Utc>,
}

/// Filter applied to the replies of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyFilter {
    /// Only replies written by this account.
    pub commentor: Option<AccountName>,
    /// Only replies with exactly this title.
    pub title: Option<String>,
}

impl ReplyFilter {
    #[must_use]
    pub fn by(commentor: AccountName) -> Self {
        Self {
            commentor: Some(commentor),
            title: None,
        }
    }

    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn matches(&self, item: &ContentItem) -> bool {
        self.commentor.as_ref().is_none_or(|c| *c == item.author)
            && self.title.as_ref().is_none_or(|t| *t == item.title)
    }
}

/// Filter applied to the active votes of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteFilter {
    pub voter: Option<AccountName>,
}

impl VoteFilter {
    #[must_use]
    pub fn voter(voter: AccountName) -> Self {
        Self { voter: Some(voter) }
    }

    #[must_use]
    pub fn matches(&self, vote: &Vote) -> bool {
        self.voter.as_ref().is_none_or(|v| *v == vote.voter)
    }
}
