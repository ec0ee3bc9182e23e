//! Protocol-wide constants for SVP.

/// Root post of every SVP identity. Its body is the current session permlink.
pub const SVP_ROOT_PERMLINK: &str = "svp-root";

/// Parent of every session post.
pub const SVP_SESSIONS_PERMLINK: &str = "svp-sessions";

/// Delivery mailbox. Its body is the owner's public key (hex); encrypted
/// deliveries are replies to it.
pub const SVP_DELIVERIES_PERMLINK: &str = "svp-deliveries";

/// Parent of every service definition.
pub const SVP_SERVICES_PERMLINK: &str = "svp-services";

/// Discovery tag carried by every SVP root post and service definition.
pub const SVP_TAG: &str = "svp-tag";

/// Title of the root post.
pub const ROOT_TITLE: &str = "SVP ROOT";

/// Body of a freshly created root post, before the first session exists.
pub const ROOT_INIT_BODY: &str = "init";

/// Title prefix of a delivery reply; followed by the pairing permlink.
pub const DELIVERY_TITLE_PREFIX: &str = "DELIVERY-";

/// Ledger error sentinel: root post published too soon after the last one.
pub const RATE_LIMIT_ROOT_SENTINEL: &str = "STEEM_MIN_ROOT_COMMENT_INTERVAL";

/// Ledger error sentinel: reply published too soon after the last one.
pub const RATE_LIMIT_REPLY_SENTINEL: &str = "STEEM_MIN_REPLY_INTERVAL";

/// Vote weight meaning "full vote" (100.00%).
pub const MAX_VOTE_WEIGHT: u16 = 10_000;

/// Default lifecycle cycle interval in milliseconds.
pub const DEFAULT_CYCLE_MS: u64 = 500;

/// Default cooldown between two ledger writes in milliseconds.
pub const DEFAULT_WRITE_COOLDOWN_MS: u64 = 1000;

/// Default buyer-side delivery poll interval in milliseconds.
pub const DEFAULT_DELIVERY_POLL_MS: u64 = 1000;

/// Capacity of every notification broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
