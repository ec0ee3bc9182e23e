//! End-to-end tests: sellers and buyers trading over one shared ledger.
//!
//! Every scenario runs the real protocol (sessions, votes, sealed
//! deliveries) against `InMemoryLedger` with millisecond timings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use svp_channel::Keypair;
use svp_ledger::{InMemoryLedger, Ledger, WriteRecord};
use svp_market::{
    EchoProvider, FnProvider, MarketplaceIdentity, Provider, ServiceEvent, ServiceProtocol,
};
use svp_runtime::{Priority, UnitOfWork};
use svp_types::{
    AccountName, Comment, MarketConfig, Permlink, ServiceConfig, ServiceDescriptor, constants,
};

const CYCLE: Duration = Duration::from_millis(5);
const DEADLINE: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(write_cooldown: Duration) -> MarketConfig {
    MarketConfig {
        cycle_interval: CYCLE,
        write_cooldown,
        delivery_poll_interval: CYCLE,
        ..MarketConfig::default()
    }
}

/// One shared ledger plus helpers to spin up identities on it.
struct Market {
    ledger: InMemoryLedger,
}

impl Market {
    fn new() -> Self {
        init_tracing();
        Self {
            ledger: InMemoryLedger::new(),
        }
    }

    fn identity(&self, name: &str, write_cooldown: Duration) -> MarketplaceIdentity {
        MarketplaceIdentity::new(
            Arc::new(self.ledger.clone()),
            AccountName::new(name),
            Keypair::generate(),
            config(write_cooldown),
        )
    }

    async fn seller(
        &self,
        name: &str,
        service: ServiceConfig,
        provider: Arc<dyn Provider>,
    ) -> (MarketplaceIdentity, Arc<ServiceProtocol>) {
        self.seller_with_cooldown(name, service, provider, Duration::from_millis(1))
            .await
    }

    async fn seller_with_cooldown(
        &self,
        name: &str,
        service: ServiceConfig,
        provider: Arc<dyn Provider>,
        write_cooldown: Duration,
    ) -> (MarketplaceIdentity, Arc<ServiceProtocol>) {
        let mut seller = self.identity(name, write_cooldown);
        let service = seller.add_service(service, provider).unwrap();
        seller.init().await.unwrap();
        (seller, service)
    }

    async fn buyer(&self, name: &str) -> MarketplaceIdentity {
        let buyer = self.identity(name, Duration::from_millis(1));
        buyer.init().await.unwrap();
        buyer
    }

    /// Vote as `buyer` on the first `paid` votables and on the pairing.
    async fn pay_partially(&self, buyer: &str, service: &ServiceProtocol, seller: &str, paid: usize) {
        let binding = service.binding().unwrap();
        let buyer = AccountName::new(buyer);
        let seller = AccountName::new(seller);
        for votable in binding.votables.iter().take(paid) {
            self.ledger
                .vote(&buyer, &seller, votable, constants::MAX_VOTE_WEIGHT)
                .await
                .unwrap();
        }
        self.ledger
            .vote(&buyer, &seller, &binding.pairing, constants::MAX_VOTE_WEIGHT)
            .await
            .unwrap();
    }
}

fn recording_provider(log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Provider> {
    Arc::new(FnProvider::new(move |buyer: &AccountName, svc: &ServiceDescriptor| {
        log.lock().unwrap().push(buyer.to_string());
        Some(json!({ "for": buyer, "service": svc.permlink }).to_string())
    }))
}

// =============================================================================
// Payment
// =============================================================================

#[tokio::test]
async fn cost_two_needs_both_votables() {
    let market = Market::new();
    let served = Arc::new(Mutex::new(Vec::new()));
    let (_alice, service) = market
        .seller("alice", ServiceConfig::dummy("svc", 2), recording_provider(Arc::clone(&served)))
        .await;
    let _bob = market.buyer("bob").await;

    market.pay_partially("bob", &service, "alice", 1).await;
    assert!(service.process().await.unwrap().is_empty());
    assert!(served.lock().unwrap().is_empty());

    market.pay_partially("bob", &service, "alice", 2).await;
    assert_eq!(service.process().await.unwrap(), vec![AccountName::new("bob")]);
    assert_eq!(*served.lock().unwrap(), vec!["bob".to_string()]);

    // Exactly once per session.
    assert!(service.process().await.unwrap().is_empty());
    assert_eq!(served.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn new_session_requires_new_payment() {
    let market = Market::new();
    let (alice, service) = market
        .seller("alice", ServiceConfig::default(), Arc::new(EchoProvider))
        .await;
    let bob = market.buyer("bob").await;

    let first = bob
        .place_order(alice.account(), &Permlink::new("echo-service"))
        .await
        .unwrap();
    assert_eq!(service.process().await.unwrap().len(), 1);

    let session = alice.new_session().await.unwrap();
    assert_ne!(session, first.session);
    assert!(service.process().await.unwrap().is_empty());

    let second = bob
        .place_order(alice.account(), &Permlink::new("echo-service"))
        .await
        .unwrap();
    assert_eq!(second.session, session);
    assert_eq!(service.process().await.unwrap(), vec![AccountName::new("bob")]);
}

// =============================================================================
// Purchase
// =============================================================================

#[tokio::test]
async fn full_purchase_over_running_seller() {
    let market = Market::new();
    let (alice, service) = market
        .seller("alice", ServiceConfig::default(), Arc::new(EchoProvider))
        .await;
    let mut completed = service.subscribe();
    let bob = market.buyer("bob").await;

    alice.start(CYCLE).unwrap();

    let listings = bob.find_services(Some("Echo")).await.unwrap();
    assert_eq!(listings.len(), 1);
    let listing = &listings[0];
    assert_eq!(listing.seller, *alice.account());
    assert_eq!(listing.terms.map(|t| t.cost), Some(1));

    let payload = tokio::time::timeout(
        DEADLINE,
        bob.purchase(&listing.seller, &listing.service_permlink),
    )
    .await
    .expect("delivery within deadline")
    .unwrap();
    assert_eq!(payload, json!({ "username": "bob" }));

    assert!(matches!(
        completed.recv().await.unwrap(),
        ServiceEvent::OrderCompleted { ref buyer, .. } if buyer.as_str() == "bob"
    ));

    alice.stop(CYCLE).await.unwrap();
}

#[tokio::test]
async fn delivery_only_opens_for_its_buyer() {
    let market = Market::new();
    let (alice, service) = market
        .seller("alice", ServiceConfig::default(), Arc::new(EchoProvider))
        .await;
    let bob = market.buyer("bob").await;
    let carol = market.buyer("carol").await;

    let order = bob
        .place_order(alice.account(), &Permlink::new("echo-service"))
        .await
        .unwrap();
    service.process().await.unwrap();

    let delivery = tokio::time::timeout(DEADLINE, bob.receive_delivery(&order))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.seller, *alice.account());
    assert_eq!(delivery.title, order.pairing.delivery_title());

    // The ciphertext sits in bob's mailbox, addressed to bob's key only.
    assert!(carol
        .encrypted_replies(alice.account(), None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn provider_not_ready_is_retried_next_cycle() {
    let market = Market::new();
    let ready = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ready);
    let provider = Arc::new(FnProvider::new(move |buyer: &AccountName, _: &ServiceDescriptor| {
        flag.load(Ordering::SeqCst)
            .then(|| json!({ "late": buyer }).to_string())
    }));
    let (alice, service) = market
        .seller("alice", ServiceConfig::default(), provider)
        .await;
    let mut events = service.subscribe();
    let bob = market.buyer("bob").await;

    let order = bob
        .place_order(alice.account(), &Permlink::new("echo-service"))
        .await
        .unwrap();
    alice.start(CYCLE).unwrap();

    let first = tokio::time::timeout(DEADLINE, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        first,
        ServiceEvent::ProviderNotReady {
            buyer: AccountName::new("bob")
        }
    );

    ready.store(true, Ordering::SeqCst);
    let delivery = tokio::time::timeout(DEADLINE, bob.receive_delivery(&order))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.payload, json!({ "late": "bob" }).to_string());

    alice.stop(CYCLE).await.unwrap();
    assert!(service.is_fulfilled(&AccountName::new("bob")));
}

// =============================================================================
// Write ordering
// =============================================================================

#[tokio::test]
async fn delivery_jumps_queued_seller_writes() {
    let market = Market::new();
    // Long cooldown: the second note cannot start before the delivery is queued.
    let (alice, service) = market
        .seller_with_cooldown(
            "alice",
            ServiceConfig::default(),
            Arc::new(EchoProvider),
            Duration::from_millis(50),
        )
        .await;
    let bob = market.buyer("bob").await;
    bob.place_order(alice.account(), &Permlink::new("echo-service"))
        .await
        .unwrap();

    let queue = alice.write_queue();
    let earlier = queue.submit(
        Comment::post(Permlink::new("note-1"), "note", "first"),
        Priority::Normal,
    );
    let later = queue.submit(
        Comment::post(Permlink::new("note-2"), "note", "second"),
        Priority::Normal,
    );
    let delivered = service.process().await.unwrap();
    assert_eq!(delivered.len(), 1);
    earlier.await.unwrap();
    later.await.unwrap();

    let log = market.ledger.write_log().await;
    let pos = |pred: fn(&WriteRecord) -> bool| log.iter().position(|w| pred(w)).unwrap();
    let delivery = pos(|w| w.title.starts_with(constants::DELIVERY_TITLE_PREFIX));
    let note2 = pos(|w| w.permlink.as_str() == "note-2");
    assert!(delivery < note2, "delivery must precede the pending normal write");
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn discovery_lists_other_sellers_services() {
    let market = Market::new();
    let (alice, _) = market
        .seller("alice", ServiceConfig::default(), Arc::new(EchoProvider))
        .await;
    let mut weather = ServiceConfig::dummy("weather", 3);
    weather.title = "Weather".to_string();
    let (_carol, _) = market.seller("carol", weather, Arc::new(EchoProvider)).await;
    let bob = market.buyer("bob").await;

    let mut users = bob.find_svp_users().await.unwrap();
    users.sort();
    assert_eq!(users, vec![AccountName::new("alice"), AccountName::new("carol")]);
    assert!(!alice.find_svp_users().await.unwrap().contains(alice.account()));

    let all = bob.find_services(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let only_weather = bob.find_services(Some("Weather")).await.unwrap();
    assert_eq!(only_weather.len(), 1);
    assert_eq!(only_weather[0].seller.as_str(), "carol");
    assert_eq!(only_weather[0].terms.map(|t| t.cost), Some(3));

    let key = bob.public_key_of(alice.account()).await.unwrap();
    assert_eq!(key, alice.public_key());
}
