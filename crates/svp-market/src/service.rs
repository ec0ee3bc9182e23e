//! # ServiceProtocol — one sellable service of an identity
//!
//! A service is paid for with votes. Each session the seller publishes a
//! pairing marker plus `cost` votables under it; a buyer pays by voting on
//! every votable and then on the pairing itself.
//!
//! ```text
//!   @seller/<session>
//!     └── @seller/<session>-<service>        pairing (voters = candidates)
//!           ├── @seller/<votable 1>          buyer must vote on ALL of these
//!           ├── ...
//!           └── @seller/<votable cost>
//! ```
//!
//! ## Order bookkeeping
//!
//! Per session generation the service keeps two sets:
//!
//! - `claimed`: returned by a scan, fulfillment in flight
//! - `fulfilled`: delivery written
//!
//! A scan never returns a buyer from either set, so a buyer is handed out at
//! most once per generation. A claim is released when the provider is not
//! ready or the delivery write fails, making the buyer eligible again.
//! `update_session` starts a new generation; completions from an older
//! generation are ignored.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use parking_lot::Mutex;
use serde_json::json;
use svp_channel::{SecureChannel, resolve_public_key};
use svp_ledger::LedgerRef;
use svp_runtime::{Priority, UnitOfWork, WriteQueue};
use svp_types::{
    AccountName, Comment, ContentRef, Permlink, Result, ServiceConfig, ServiceDescriptor,
    SvpError, VoteFilter, constants,
};
use tokio::sync::broadcast;

use crate::provider::Provider;

/// Ledger items backing one service in one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub session: Permlink,
    pub pairing: Permlink,
    pub votables: Vec<Permlink>,
}

/// Notification emitted by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// Delivery written for `buyer`.
    OrderCompleted { buyer: AccountName, delivery: Permlink },
    /// Provider had nothing yet; the buyer will be retried.
    ProviderNotReady { buyer: AccountName },
    /// Provider, key lookup, encryption or the write failed.
    DeliveryFailed { buyer: AccountName, error: SvpError },
}

#[derive(Debug, Default)]
struct OrderBook {
    binding: Option<SessionBinding>,
    generation: u64,
    claimed: HashSet<AccountName>,
    fulfilled: HashSet<AccountName>,
}

impl OrderBook {
    fn is_known(&self, buyer: &AccountName) -> bool {
        self.claimed.contains(buyer) || self.fulfilled.contains(buyer)
    }
}

/// Seller-side protocol for one service.
pub struct ServiceProtocol {
    seller: AccountName,
    config: ServiceConfig,
    ledger: LedgerRef,
    queue: WriteQueue,
    channel: Arc<SecureChannel>,
    provider: Arc<dyn Provider>,
    book: Mutex<OrderBook>,
    events: broadcast::Sender<ServiceEvent>,
}

impl ServiceProtocol {
    /// # Errors
    /// Returns `InvalidTerms` or `Configuration` if `config` is invalid.
    pub fn new(
        config: ServiceConfig,
        provider: Arc<dyn Provider>,
        ledger: LedgerRef,
        queue: WriteQueue,
        channel: Arc<SecureChannel>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(constants::EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            seller: queue.author().clone(),
            config,
            ledger,
            queue,
            channel,
            provider,
            book: Mutex::new(OrderBook::default()),
            events,
        })
    }

    #[must_use]
    pub fn permlink(&self) -> &Permlink {
        &self.config.permlink
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Public view handed to the provider.
    #[must_use]
    pub fn descriptor(&self) -> ServiceDescriptor {
        self.config.descriptor()
    }

    #[must_use]
    pub fn binding(&self) -> Option<SessionBinding> {
        self.book.lock().binding.clone()
    }

    /// Number of `update_session` calls so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.book.lock().generation
    }

    #[must_use]
    pub fn is_fulfilled(&self, buyer: &AccountName) -> bool {
        self.book.lock().fulfilled.contains(buyer)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Session setup
    // -----------------------------------------------------------------------

    /// Publish the service definition under `svp-services` unless it exists.
    pub async fn init(&self) -> Result<()> {
        if self
            .ledger
            .get_content(&self.seller, self.permlink())
            .await?
            .is_some()
        {
            tracing::debug!(service = %self.permlink(), "Service definition present");
            return Ok(());
        }

        let definition = Comment::reply(
            ContentRef::new(self.seller.clone(), constants::SVP_SERVICES_PERMLINK),
            self.config.title.clone(),
            self.config.description.clone(),
        )
        .with_permlink(self.permlink().clone())
        .with_metadata(self.config.definition_metadata());
        self.queue.enqueue(definition, Priority::Normal).await?;

        tracing::info!(service = %self.permlink(), title = %self.config.title, "Service definition published");
        Ok(())
    }

    /// Publish the pairing marker and `cost` votables for `session`.
    ///
    /// Does not touch the active binding; see [`Self::update_session`].
    pub async fn prepare_session(&self, session: &Permlink) -> Result<SessionBinding> {
        let pairing = Permlink::pairing(session, self.permlink());
        let marker = Comment::reply(
            ContentRef::new(self.seller.clone(), session.clone()),
            self.permlink().as_str(),
            self.permlink().as_str(),
        )
        .with_permlink(pairing.clone());
        self.queue.enqueue(marker, Priority::Normal).await?;

        let cost = self.config.terms.cost;
        let mut votables = Vec::with_capacity(cost as usize);
        for _ in 0..cost {
            let votable = Comment::reply(
                ContentRef::new(self.seller.clone(), pairing.clone()),
                self.permlink().as_str(),
                self.permlink().as_str(),
            );
            votables.push(self.queue.enqueue(votable, Priority::Normal).await?);
        }

        tracing::info!(
            service = %self.permlink(),
            pairing = %pairing,
            votables = votables.len(),
            "Session prepared"
        );
        Ok(SessionBinding {
            session: session.clone(),
            pairing,
            votables,
        })
    }

    /// Activate `binding` and forget every buyer of the previous session.
    pub fn update_session(&self, binding: SessionBinding) {
        let mut book = self.book.lock();
        book.generation += 1;
        book.claimed.clear();
        book.fulfilled.clear();
        tracing::debug!(
            service = %self.permlink(),
            pairing = %binding.pairing,
            generation = book.generation,
            "Session activated"
        );
        book.binding = Some(binding);
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Buyers who have paid in full and were not handed out before.
    ///
    /// Returned buyers are claimed.
    pub async fn scan_paid_orders(&self) -> Result<Vec<AccountName>> {
        let (binding, generation) = {
            let book = self.book.lock();
            match &book.binding {
                Some(binding) => (binding.clone(), book.generation),
                None => return Ok(Vec::new()),
            }
        };

        let votes = self
            .ledger
            .get_active_votes(&self.seller, &binding.pairing, &VoteFilter::default())
            .await?;
        let candidates: Vec<AccountName> = {
            let book = self.book.lock();
            let mut seen = HashSet::new();
            votes
                .into_iter()
                .map(|v| v.voter)
                .filter(|voter| !book.is_known(voter) && seen.insert(voter.clone()))
                .collect()
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let checks = candidates
            .iter()
            .map(|buyer| self.has_paid(&binding, buyer));
        let paid = try_join_all(checks).await?;

        let mut book = self.book.lock();
        if book.generation != generation {
            tracing::debug!(service = %self.permlink(), "Session rotated during scan");
            return Ok(Vec::new());
        }
        let orders: Vec<AccountName> = candidates
            .into_iter()
            .zip(paid)
            .filter_map(|(buyer, paid)| paid.then_some(buyer))
            .filter(|buyer| book.claimed.insert(buyer.clone()))
            .collect();
        drop(book);

        if !orders.is_empty() {
            tracing::info!(service = %self.permlink(), orders = orders.len(), "Paid orders found");
        }
        Ok(orders)
    }

    /// Whether `buyer` has a vote on every votable.
    async fn has_paid(&self, binding: &SessionBinding, buyer: &AccountName) -> Result<bool> {
        let filter = VoteFilter::voter(buyer.clone());
        let per_votable = binding
            .votables
            .iter()
            .map(|votable| self.ledger.get_active_votes(&self.seller, votable, &filter));
        let votes = try_join_all(per_votable).await?;
        Ok(votes.iter().all(|v| !v.is_empty()))
    }

    /// Produce, seal and deliver the payload for a claimed `buyer`.
    ///
    /// The delivery is enqueued with priority. On success the buyer is marked
    /// fulfilled; otherwise the claim is released.
    ///
    /// # Errors
    /// - `ProviderNotReady` if the provider had nothing to deliver
    /// - key lookup, encryption, provider or write failures
    pub async fn fulfill_order(&self, buyer: &AccountName) -> Result<Permlink> {
        let (binding, generation) = {
            let book = self.book.lock();
            match &book.binding {
                Some(binding) => (binding.clone(), book.generation),
                None => return Err(SvpError::NoActiveSession(self.seller.clone())),
            }
        };

        match self.deliver(buyer, &binding).await {
            Ok(delivery) => {
                {
                    let mut book = self.book.lock();
                    if book.generation == generation {
                        book.claimed.remove(buyer);
                        book.fulfilled.insert(buyer.clone());
                    }
                }
                tracing::info!(service = %self.permlink(), buyer = %buyer, delivery = %delivery, "Order completed");
                self.emit(ServiceEvent::OrderCompleted {
                    buyer: buyer.clone(),
                    delivery: delivery.clone(),
                });
                Ok(delivery)
            }
            Err(err) => {
                self.release(buyer, generation);
                if matches!(err, SvpError::ProviderNotReady(_)) {
                    tracing::debug!(service = %self.permlink(), buyer = %buyer, "Provider not ready");
                    self.emit(ServiceEvent::ProviderNotReady { buyer: buyer.clone() });
                } else {
                    tracing::warn!(service = %self.permlink(), buyer = %buyer, error = %err, "Delivery failed");
                    self.emit(ServiceEvent::DeliveryFailed {
                        buyer: buyer.clone(),
                        error: err.clone(),
                    });
                }
                Err(err)
            }
        }
    }

    async fn deliver(&self, buyer: &AccountName, binding: &SessionBinding) -> Result<Permlink> {
        let payload = self
            .provider
            .provide(buyer, &self.descriptor())
            .await?
            .ok_or_else(|| SvpError::ProviderNotReady(buyer.clone()))?;

        let recipient = resolve_public_key(self.ledger.as_ref(), buyer).await?;
        let sealed = self.channel.encrypt_for(&recipient, payload.as_bytes())?;
        let nonce = sealed.nonce.to_hex();

        let delivery = Comment::reply(
            ContentRef::new(buyer.clone(), constants::SVP_DELIVERIES_PERMLINK),
            binding.pairing.delivery_title(),
            hex::encode(&sealed.ciphertext),
        )
        .with_permlink(Permlink::new(nonce.clone()))
        .with_metadata(json!({
            "encrypted": recipient.to_hex(),
            "nonce": nonce,
        }));

        self.queue.enqueue(delivery, Priority::High).await
    }

    fn release(&self, buyer: &AccountName, generation: u64) {
        let mut book = self.book.lock();
        if book.generation == generation {
            book.claimed.remove(buyer);
        }
    }

    fn emit(&self, event: ServiceEvent) {
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for ServiceProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProtocol")
            .field("seller", &self.seller)
            .field("permlink", self.permlink())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UnitOfWork for ServiceProtocol {
    type Output = Vec<AccountName>;

    /// Scan once, then fulfill every new order.
    ///
    /// Per-order failures are reported as [`ServiceEvent`]s, not returned.
    async fn process(&self) -> Result<Vec<AccountName>> {
        let orders = self.scan_paid_orders().await?;
        join_all(orders.iter().map(|buyer| self.fulfill_order(buyer))).await;
        Ok(orders)
    }
}
