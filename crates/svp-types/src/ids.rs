//! Identifiers used throughout SVP.
//!
//! Every content item on the ledger is addressed by `(author, permlink)`.
//! Generated permlinks use UUIDv7 in simple (32 hex char) form so that items
//! written by one identity sort by creation time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;

// ---------------------------------------------------------------------------
// AccountName
// ---------------------------------------------------------------------------

/// A ledger account name. Identities, sellers and buyers are all accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(pub String);

impl AccountName {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ---------------------------------------------------------------------------
// Permlink
// ---------------------------------------------------------------------------

/// The per-author identifier of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permlink(pub String);

impl Permlink {
    #[must_use]
    pub fn new(permlink: impl Into<String>) -> Self {
        Self(permlink.into())
    }

    /// A fresh, unpredictable, time-ordered permlink.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Deterministic permlink binding one session generation to one service.
    ///
    /// Format: `<session>-<service>`. Buyers derive it from the seller's root
    /// post without any other coordination.
    #[must_use]
    pub fn pairing(session: &Permlink, service: &Permlink) -> Self {
        Self(format!("{}-{}", session.0, service.0))
    }

    /// Title carried by the delivery reply for an order on this pairing.
    #[must_use]
    pub fn delivery_title(&self) -> String {
        format!("{}{}", constants::DELIVERY_TITLE_PREFIX, self.0)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permlink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permlink {
    fn from(permlink: &str) -> Self {
        Self::new(permlink)
    }
}

// ---------------------------------------------------------------------------
// ContentRef
// ---------------------------------------------------------------------------

/// Full address of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub author: AccountName,
    pub permlink: Permlink,
}

impl ContentRef {
    #[must_use]
    pub fn new(author: impl Into<AccountName>, permlink: impl Into<Permlink>) -> Self {
        Self {
            author: author.into(),
            permlink: permlink.into(),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.author, self.permlink)
    }
}
