//! # MarketplaceIdentity — one account acting as seller and buyer
//!
//! ## Ledger layout owned by an identity
//!
//! ```text
//!   @me/svp-root                 body = current session (tag svp-tag)
//!     ├── @me/svp-deliveries     body = public key hex; deliveries reply here
//!     ├── @me/svp-services       service definitions reply here
//!     └── @me/svp-sessions       one reply per session
//! ```
//!
//! ## Seller flow
//!
//! `init()` makes sure the layout exists, publishes every service
//! definition and opens the first session. `start()` then runs one
//! [`PollingLifecycle`] per service in the background.
//!
//! ## Buyer flow
//!
//! ```text
//!   place_order ──▶ vote every votable, then the pairing
//!   receive_delivery ──▶ poll own svp-deliveries, decrypt the first match
//! ```
//!
//! All writes of an identity go through its single [`WriteQueue`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use svp_channel::{Keypair, Nonce, PublicKey, SecureChannel, resolve_public_key};
use svp_ledger::LedgerRef;
use svp_runtime::{PollingLifecycle, Priority, WriteQueue};
use svp_types::{
    AccountName, Comment, ContentItem, ContentRef, IdentityConfig, MarketConfig, Permlink,
    ReplyFilter, Result, ServiceConfig, ServiceListing, SvpError, constants,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::provider::{EchoProvider, Provider};
use crate::service::ServiceProtocol;

/// Notification emitted by an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// Human-readable progress of `init` and discovery.
    Status(String),
    /// A new session is active.
    Session(Permlink),
}

/// A paid order, as seen by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub seller: AccountName,
    pub service_permlink: Permlink,
    pub session: Permlink,
    pub pairing: Permlink,
    /// Number of votables voted on.
    pub votables: usize,
}

/// A decrypted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub seller: AccountName,
    pub permlink: Permlink,
    pub title: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

type ServiceLoop = Arc<PollingLifecycle<ServiceProtocol>>;

/// An SVP participant.
pub struct MarketplaceIdentity {
    account: AccountName,
    config: MarketConfig,
    ledger: LedgerRef,
    queue: WriteQueue,
    channel: Arc<SecureChannel>,
    services: Vec<ServiceLoop>,
    running: Mutex<Vec<JoinHandle<Result<()>>>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl MarketplaceIdentity {
    #[must_use]
    pub fn new(ledger: LedgerRef, account: AccountName, keypair: Keypair, config: MarketConfig) -> Self {
        let queue = WriteQueue::new(Arc::clone(&ledger), account.clone(), config.write_cooldown);
        let (events, _) = broadcast::channel(constants::EVENT_CHANNEL_CAPACITY);
        Self {
            account,
            config,
            ledger,
            queue,
            channel: Arc::new(SecureChannel::new(keypair)),
            services: Vec::new(),
            running: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Build an identity from a loaded config. Configured services are served
    /// by [`EchoProvider`]; use [`Self::add_service`] for other providers.
    ///
    /// # Errors
    /// Returns the first validation error of `config`.
    pub fn from_config(ledger: LedgerRef, config: IdentityConfig, keypair: Keypair) -> Result<Self> {
        config.market.validate()?;
        let mut identity = Self::new(ledger, config.account, keypair, config.market);
        for service in config.services {
            identity.add_service(service, Arc::new(EchoProvider))?;
        }
        Ok(identity)
    }

    #[must_use]
    pub fn account(&self) -> &AccountName {
        &self.account
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.channel.public_key()
    }

    #[must_use]
    pub fn market_config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub fn write_queue(&self) -> &WriteQueue {
        &self.queue
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }

    /// Services registered so far, in registration order.
    pub fn services(&self) -> impl Iterator<Item = &Arc<ServiceProtocol>> {
        self.services.iter().map(|l| l.work())
    }

    /// Register a service to be initialized and run by this identity.
    ///
    /// # Errors
    /// Returns `InvalidTerms` or `Configuration` for an invalid `config`.
    pub fn add_service(
        &mut self,
        config: ServiceConfig,
        provider: Arc<dyn Provider>,
    ) -> Result<Arc<ServiceProtocol>> {
        let name = format!("{}/{}", self.account, config.permlink);
        let service = Arc::new(ServiceProtocol::new(
            config,
            provider,
            Arc::clone(&self.ledger),
            self.queue.clone(),
            Arc::clone(&self.channel),
        )?);
        tracing::debug!(service = %name, "Service registered");
        self.services
            .push(Arc::new(PollingLifecycle::new(name, Arc::clone(&service))));
        Ok(service)
    }

    // -----------------------------------------------------------------------
    // Seller: setup
    // -----------------------------------------------------------------------

    /// Ensure the ledger layout, announce the key, publish the services and
    /// open a session.
    pub async fn init(&self) -> Result<Permlink> {
        self.ensure_root().await?;
        self.announce_key().await?;
        self.ensure_child(constants::SVP_SERVICES_PERMLINK, "Services", "Service Definitions")
            .await?;
        for service in self.services() {
            self.status(format!("checking service definition for {}", service.config().title));
            service.init().await?;
        }
        self.new_session().await
    }

    async fn ensure_root(&self) -> Result<()> {
        self.status("fetching root post");
        let root = Permlink::new(constants::SVP_ROOT_PERMLINK);
        if self.ledger.get_content(&self.account, &root).await?.is_some() {
            return Ok(());
        }
        self.status("initializing root post");
        self.write(Self::root_post(constants::ROOT_INIT_BODY)).await?;
        Ok(())
    }

    /// Publish the public key, or republish it if the ledger holds another.
    async fn announce_key(&self) -> Result<()> {
        let key = self.public_key().to_hex();
        let current = self
            .ledger
            .get_content(&self.account, &Permlink::new(constants::SVP_DELIVERIES_PERMLINK))
            .await?;
        if current.is_some_and(|item| item.body == key) {
            return Ok(());
        }
        self.status("setting delivery address");
        self.write(self.root_child(constants::SVP_DELIVERIES_PERMLINK, "Deliveries", key))
            .await?;
        tracing::info!(account = %self.account, key = %self.public_key().short(), "Delivery key announced");
        Ok(())
    }

    async fn ensure_child(&self, permlink: &str, title: &str, body: &str) -> Result<()> {
        if self
            .ledger
            .get_content(&self.account, &Permlink::new(permlink))
            .await?
            .is_some()
        {
            return Ok(());
        }
        self.status(format!("posting {permlink}"));
        self.write(self.root_child(permlink, title, body)).await?;
        Ok(())
    }

    /// Rotate to a fresh session: new votables for every service, root body
    /// points at the new session, then every service switches over.
    pub async fn new_session(&self) -> Result<Permlink> {
        self.ensure_child(constants::SVP_SESSIONS_PERMLINK, "Sessions", "sessions")
            .await?;

        self.status("posting new session");
        let session = self
            .write(Comment::reply(
                ContentRef::new(self.account.clone(), constants::SVP_SESSIONS_PERMLINK),
                "Session",
                "session",
            ))
            .await?;

        let mut bindings = Vec::with_capacity(self.services.len());
        for service in self.services() {
            self.status(format!("preparing session for {}", service.permlink()));
            bindings.push(service.prepare_session(&session).await?);
        }

        self.write(Self::root_post(session.as_str())).await?;

        for (service, binding) in self.services().zip(bindings) {
            service.update_session(binding);
        }

        tracing::info!(account = %self.account, session = %session, "Session opened");
        self.emit(IdentityEvent::Session(session.clone()));
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Seller: run loop
    // -----------------------------------------------------------------------

    /// Spawn one polling loop per service.
    ///
    /// Every loop is `RUNNING` when this returns, so `stop()` may follow
    /// immediately.
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if any loop is still active.
    pub fn start(&self, cycle: Duration) -> Result<()> {
        let mut running = self.running.lock();
        if running.iter().any(|h| !h.is_finished()) {
            return Err(SvpError::AlreadyRunning);
        }
        running.clear();
        for lifecycle in &self.services {
            running.push(lifecycle.spawn(cycle)?);
        }
        tracing::info!(account = %self.account, services = running.len(), "Service loops started");
        Ok(())
    }

    /// Stop every loop and wait for all of them to exit.
    ///
    /// # Errors
    /// Returns the first fatal error a loop halted with.
    pub async fn stop(&self, cycle: Duration) -> Result<()> {
        join_all(self.services.iter().map(|l| l.stop(cycle))).await;

        let handles = std::mem::take(&mut *self.running.lock());
        let mut first_error = None;
        for outcome in join_all(handles).await {
            let outcome = outcome.map_err(|e| SvpError::Internal(format!("service loop: {e}")));
            if let Err(err) = outcome.and_then(|r| r) {
                first_error.get_or_insert(err);
            }
        }
        tracing::info!(account = %self.account, "Service loops stopped");
        first_error.map_or(Ok(()), Err)
    }

    // -----------------------------------------------------------------------
    // Buyer
    // -----------------------------------------------------------------------

    /// Pay for `service_permlink` in `seller`'s current session.
    ///
    /// Votes on every votable concurrently, then on the pairing.
    ///
    /// # Errors
    /// - `NoActiveSession` if the seller has no root or no session yet
    /// - `ContentNotFound` if the service has no pairing in that session, or
    ///   the pairing has no votables yet
    /// - ledger failures of any vote
    pub async fn place_order(&self, seller: &AccountName, service_permlink: &Permlink) -> Result<OrderHandle> {
        let root = self
            .ledger
            .get_content(seller, &Permlink::new(constants::SVP_ROOT_PERMLINK))
            .await?
            .filter(|root| !root.body.is_empty() && root.body != constants::ROOT_INIT_BODY)
            .ok_or_else(|| SvpError::NoActiveSession(seller.clone()))?;
        let session = Permlink::new(root.body.trim());
        let pairing = Permlink::pairing(&session, service_permlink);

        if self.ledger.get_content(seller, &pairing).await?.is_none() {
            return Err(SvpError::ContentNotFound {
                author: seller.to_string(),
                permlink: pairing.to_string(),
            });
        }
        let votables: Vec<Permlink> = self
            .ledger
            .get_replies(seller, &pairing, &ReplyFilter::by(seller.clone()))
            .await?
            .into_iter()
            .map(|item| item.permlink)
            .collect();
        if votables.is_empty() {
            return Err(SvpError::ContentNotFound {
                author: seller.to_string(),
                permlink: format!("{pairing}/votables"),
            });
        }

        let weight = self.config.vote_weight;
        try_join_all(
            votables
                .iter()
                .map(|votable| self.ledger.vote(&self.account, seller, votable, weight)),
        )
        .await?;
        self.ledger.vote(&self.account, seller, &pairing, weight).await?;

        tracing::info!(
            buyer = %self.account,
            seller = %seller,
            pairing = %pairing,
            votables = votables.len(),
            "Order placed"
        );
        Ok(OrderHandle {
            seller: seller.clone(),
            service_permlink: service_permlink.clone(),
            session,
            pairing,
            votables: votables.len(),
        })
    }

    /// Wait for the delivery of `order`, polling every
    /// `delivery_poll_interval`. Never gives up; wrap in a timeout.
    pub async fn receive_delivery(&self, order: &OrderHandle) -> Result<Delivery> {
        let title = order.pairing.delivery_title();
        loop {
            let found = self.encrypted_replies(&order.seller, Some(&title)).await?;
            if let Some(delivery) = found.into_iter().next() {
                tracing::info!(buyer = %self.account, seller = %order.seller, "Delivery received");
                return Ok(delivery);
            }
            tokio::time::sleep(self.config.delivery_poll_interval).await;
        }
    }

    /// Place an order and wait for its delivery, parsed as JSON.
    pub async fn purchase(&self, seller: &AccountName, service_permlink: &Permlink) -> Result<Value> {
        let order = self.place_order(seller, service_permlink).await?;
        let delivery = self.receive_delivery(&order).await?;
        Ok(serde_json::from_str(&delivery.payload)?)
    }

    /// Decrypt the deliveries `commentor` left in this identity's mailbox,
    /// optionally only those titled `title`.
    ///
    /// Replies addressed to another key are skipped. Replies that fail to
    /// open are discarded with a warning.
    pub async fn encrypted_replies(
        &self,
        commentor: &AccountName,
        title: Option<&str>,
    ) -> Result<Vec<Delivery>> {
        let filter = ReplyFilter {
            commentor: Some(commentor.clone()),
            title: title.map(str::to_string),
        };
        let own_key = self.public_key().to_hex();
        let replies = self
            .ledger
            .get_replies(
                &self.account,
                &Permlink::new(constants::SVP_DELIVERIES_PERMLINK),
                &filter,
            )
            .await?;

        let mut sender_keys: HashMap<AccountName, PublicKey> = HashMap::new();
        let mut deliveries = Vec::new();
        for reply in replies {
            if reply.metadata_str("encrypted") != Some(own_key.as_str()) {
                continue;
            }
            let sender = match sender_keys.get(&reply.author) {
                Some(key) => *key,
                None => {
                    let key = resolve_public_key(self.ledger.as_ref(), &reply.author).await?;
                    sender_keys.insert(reply.author.clone(), key);
                    key
                }
            };
            match self.open(&sender, &reply) {
                Ok(payload) => deliveries.push(Delivery {
                    seller: reply.author,
                    permlink: reply.permlink,
                    title: reply.title,
                    payload,
                    created_at: reply.created_at,
                }),
                Err(err) => {
                    tracing::warn!(
                        buyer = %self.account,
                        delivery = %reply.content_ref(),
                        error = %err,
                        "Discarding undecryptable delivery"
                    );
                }
            }
        }
        Ok(deliveries)
    }

    fn open(&self, sender: &PublicKey, reply: &ContentItem) -> Result<String> {
        let nonce = Nonce::from_hex(reply.permlink.as_str())?;
        let ciphertext = hex::decode(&reply.body).map_err(|_| SvpError::AuthenticationFailure)?;
        let plaintext = self.channel.decrypt(sender, &nonce, &ciphertext)?;
        String::from_utf8(plaintext).map_err(|e| SvpError::Serialization(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    /// Authors of active `svp-tag` discussions, other than this identity.
    pub async fn find_svp_users(&self) -> Result<Vec<AccountName>> {
        let discussions = self
            .ledger
            .get_active_discussions_by_tag(constants::SVP_TAG)
            .await?;
        let mut seen = HashSet::new();
        Ok(discussions
            .into_iter()
            .map(|d| d.author)
            .filter(|author| *author != self.account && seen.insert(author.clone()))
            .collect())
    }

    /// Services offered by every discovered user, optionally only those
    /// titled `name`.
    pub async fn find_services(&self, name: Option<&str>) -> Result<Vec<ServiceListing>> {
        let users = self.find_svp_users().await?;
        self.status(format!(
            "found SVP users {}",
            users.iter().map(AccountName::as_str).collect::<Vec<_>>().join(", ")
        ));

        let services = Permlink::new(constants::SVP_SERVICES_PERMLINK);
        let per_user = try_join_all(users.iter().map(|user| {
            let mut filter = ReplyFilter::by(user.clone());
            if let Some(name) = name {
                filter = filter.titled(name);
            }
            let services = &services;
            async move { self.ledger.get_replies(user, services, &filter).await }
        }))
        .await?;

        Ok(per_user
            .iter()
            .flatten()
            .map(ServiceListing::from_definition)
            .collect())
    }

    /// Public key announced by `user`.
    pub async fn public_key_of(&self, user: &AccountName) -> Result<PublicKey> {
        resolve_public_key(self.ledger.as_ref(), user).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn root_post(body: &str) -> Comment {
        Comment::post(
            Permlink::new(constants::SVP_ROOT_PERMLINK),
            constants::ROOT_TITLE,
            body,
        )
        .with_metadata(json!({ "tags": [constants::SVP_TAG] }))
    }

    fn root_child(&self, permlink: &str, title: &str, body: impl Into<String>) -> Comment {
        Comment::reply(
            ContentRef::new(self.account.clone(), constants::SVP_ROOT_PERMLINK),
            title,
            body,
        )
        .with_permlink(Permlink::new(permlink))
    }

    async fn write(&self, comment: Comment) -> Result<Permlink> {
        self.queue.enqueue(comment, Priority::Normal).await
    }

    fn status(&self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(account = %self.account, %detail, "Status");
        let _ = self.events.send(IdentityEvent::Status(detail));
    }

    fn emit(&self, event: IdentityEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for MarketplaceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceIdentity")
            .field("account", &self.account)
            .field("public_key", &self.public_key())
            .field("services", &self.services.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svp_ledger::{InMemoryLedger, Ledger};

    fn fast_config() -> MarketConfig {
        MarketConfig {
            cycle_interval: Duration::from_millis(5),
            write_cooldown: Duration::from_millis(1),
            delivery_poll_interval: Duration::from_millis(5),
            ..MarketConfig::default()
        }
    }

    fn identity(ledger: &InMemoryLedger, name: &str) -> MarketplaceIdentity {
        MarketplaceIdentity::new(
            Arc::new(ledger.clone()),
            AccountName::new(name),
            Keypair::generate(),
            fast_config(),
        )
    }

    #[tokio::test]
    async fn init_builds_layout_and_first_session() {
        let ledger = InMemoryLedger::new();
        let mut alice = identity(&ledger, "alice");
        alice
            .add_service(ServiceConfig::default(), Arc::new(EchoProvider))
            .unwrap();
        let mut events = alice.subscribe();

        let session = alice.init().await.unwrap();

        let me = AccountName::new("alice");
        let root = ledger
            .get_content(&me, &Permlink::new(constants::SVP_ROOT_PERMLINK))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.body, session.as_str());
        assert_eq!(root.tags(), vec![constants::SVP_TAG]);

        let mailbox = ledger
            .get_content(&me, &Permlink::new(constants::SVP_DELIVERIES_PERMLINK))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mailbox.body, alice.public_key().to_hex());

        for permlink in [constants::SVP_SERVICES_PERMLINK, constants::SVP_SESSIONS_PERMLINK] {
            assert!(ledger.get_content(&me, &Permlink::new(permlink)).await.unwrap().is_some());
        }
        let service = alice.services().next().unwrap();
        assert_eq!(service.binding().unwrap().session, session);

        let mut saw_session = false;
        while let Ok(ev) = events.try_recv() {
            if ev == IdentityEvent::Session(session.clone()) {
                saw_session = true;
            }
        }
        assert!(saw_session);
    }

    #[tokio::test]
    async fn reinit_with_new_key_reannounces() {
        let ledger = InMemoryLedger::new();
        identity(&ledger, "alice").init().await.unwrap();

        let again = identity(&ledger, "alice");
        again.init().await.unwrap();
        assert_eq!(
            again.public_key_of(&AccountName::new("alice")).await.unwrap(),
            again.public_key()
        );
    }

    #[tokio::test]
    async fn order_without_session_fails() {
        let ledger = InMemoryLedger::new();
        let bob = identity(&ledger, "bob");
        let err = bob
            .place_order(&AccountName::new("alice"), &Permlink::new("echo-service"))
            .await
            .unwrap_err();
        assert_eq!(err, SvpError::NoActiveSession(AccountName::new("alice")));
    }

    #[tokio::test]
    async fn order_for_unknown_service_fails() {
        let ledger = InMemoryLedger::new();
        let mut alice = identity(&ledger, "alice");
        alice
            .add_service(ServiceConfig::default(), Arc::new(EchoProvider))
            .unwrap();
        alice.init().await.unwrap();

        let bob = identity(&ledger, "bob");
        let err = bob
            .place_order(&AccountName::new("alice"), &Permlink::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SvpError::ContentNotFound { .. }));
    }

    #[tokio::test]
    async fn deliveries_for_other_keys_are_ignored() {
        let ledger = InMemoryLedger::new();
        let alice = identity(&ledger, "alice");
        alice.init().await.unwrap();
        let bob = identity(&ledger, "bob");
        bob.init().await.unwrap();

        // Sealed for a different key than bob's announced one.
        let stranger = SecureChannel::new(Keypair::generate());
        let sealed = SecureChannel::new(Keypair::generate())
            .encrypt_for(&stranger.public_key(), b"{}")
            .unwrap();
        let reply = Comment::reply(
            ContentRef::new("bob", constants::SVP_DELIVERIES_PERMLINK),
            "DELIVERY-x",
            hex::encode(&sealed.ciphertext),
        )
        .with_permlink(Permlink::new(sealed.nonce.to_hex()))
        .with_metadata(json!({ "encrypted": stranger.public_key().to_hex() }));
        ledger.publish(&AccountName::new("alice"), reply).await.unwrap();

        let found = bob
            .encrypted_replies(&AccountName::new("alice"), None)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn undecryptable_delivery_is_discarded() {
        let ledger = InMemoryLedger::new();
        let alice = identity(&ledger, "alice");
        alice.init().await.unwrap();
        let bob = identity(&ledger, "bob");
        bob.init().await.unwrap();

        let forged = Comment::reply(
            ContentRef::new("bob", constants::SVP_DELIVERIES_PERMLINK),
            "DELIVERY-x",
            "00ff00ff",
        )
        .with_permlink(Permlink::new(Nonce::generate().to_hex()))
        .with_metadata(json!({ "encrypted": bob.public_key().to_hex() }));
        ledger.publish(&AccountName::new("alice"), forged).await.unwrap();

        let found = bob
            .encrypted_replies(&AccountName::new("alice"), Some("DELIVERY-x"))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn from_config_registers_services() {
        let ledger = InMemoryLedger::new();
        let config = IdentityConfig::from_json_str(
            r#"{"account": "alice", "services": [{"title": "Echo", "description": "Echo Service", "permlink": "echo-service"}]}"#,
        )
        .unwrap();
        let alice =
            MarketplaceIdentity::from_config(Arc::new(ledger), config, Keypair::generate()).unwrap();
        assert_eq!(alice.account().as_str(), "alice");
        assert_eq!(alice.services().count(), 1);
    }

    #[tokio::test]
    async fn order_on_pairing_without_votables_casts_no_vote() {
        let ledger = InMemoryLedger::new();
        let alice = AccountName::new("alice");
        let root = Comment::post(Permlink::new(constants::SVP_ROOT_PERMLINK), "root", "s1");
        ledger.publish(&alice, root).await.unwrap();
        let pairing = Permlink::pairing(&Permlink::new("s1"), &Permlink::new("echo-service"));
        // Pairing is readable, its votables are not yet.
        let bare = Comment::reply(
            ContentRef::new("alice", constants::SVP_ROOT_PERMLINK),
            "pairing",
            "",
        )
        .with_permlink(pairing.clone());
        ledger.publish(&alice, bare).await.unwrap();

        let bob = identity(&ledger, "bob");
        let err = bob
            .place_order(&alice, &Permlink::new("echo-service"))
            .await
            .unwrap_err();
        assert!(matches!(err, SvpError::ContentNotFound { .. }));

        let votes = ledger
            .get_active_votes(&alice, &pairing, &svp_types::VoteFilter::default())
            .await
            .unwrap();
        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn stop_right_after_start_returns() {
        let ledger = InMemoryLedger::new();
        let mut alice = identity(&ledger, "alice");
        alice
            .add_service(ServiceConfig::default(), Arc::new(EchoProvider))
            .unwrap();
        alice.init().await.unwrap();

        let cycle = Duration::from_millis(5);
        alice.start(cycle).unwrap();
        tokio::time::timeout(Duration::from_secs(3), alice.stop(cycle))
            .await
            .expect("stop right after start must return")
            .unwrap();
    }

    #[tokio::test]
    async fn start_twice_is_rejected_until_stopped() {
        let ledger = InMemoryLedger::new();
        let mut alice = identity(&ledger, "alice");
        alice
            .add_service(ServiceConfig::default(), Arc::new(EchoProvider))
            .unwrap();
        alice.init().await.unwrap();

        let cycle = Duration::from_millis(5);
        alice.start(cycle).unwrap();
        assert_eq!(alice.start(cycle).unwrap_err(), SvpError::AlreadyRunning);
        alice.stop(cycle).await.unwrap();
        alice.start(cycle).unwrap();
        alice.stop(cycle).await.unwrap();
    }
}
