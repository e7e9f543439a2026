//! Channel registry: consumer interest per topic and the intents it produces.
//!
//! Every mutation happens under one lock shared with the replay step, so
//! the connection never observes a half-applied change:
//!
//! ```text
//! add_interest      0 -> 1 consumers   register route, queue Subscribe
//! remove_interest   1 -> 0 consumers   unregister route, queue Unsubscribe
//! begin_resubscribe                    drop queue, snapshot desired keys
//! complete_resubscribe                 drain queue until empty, then Connected
//! ```

use crate::dispatcher::Dispatcher;
use crate::events::FeedEvent;
use crate::state::ConnectionState;
use ironfeed_channel::BroadcastSender;
use ironfeed_core::SubscriptionKey;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Notify, watch};

/// Opaque consumer identifier (e.g. one UI panel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(pub u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Subscription change the connection must send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Send a subscribe frame.
    Subscribe(SubscriptionKey),
    /// Send an unsubscribe frame.
    Unsubscribe(SubscriptionKey),
}

#[derive(Debug)]
struct RegistryState {
    interests: BTreeMap<SubscriptionKey, HashSet<ConsumerId>>,
    pending: VecDeque<Intent>,
    link: ConnectionState,
}

/// Reference-counted subscription registry.
#[derive(Debug)]
pub struct ChannelRegistry {
    inner: Mutex<RegistryState>,
    dispatcher: Arc<Dispatcher>,
    notify: Notify,
    state_tx: watch::Sender<ConnectionState>,
    events: BroadcastSender<FeedEvent>,
}

impl ChannelRegistry {
    /// Creates an empty registry in the `Disconnected` state.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, events: BroadcastSender<FeedEvent>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Mutex::new(RegistryState {
                interests: BTreeMap::new(),
                pending: VecDeque::new(),
                link: ConnectionState::Disconnected,
            }),
            dispatcher,
            notify: Notify::new(),
            state_tx,
            events,
        }
    }

    /// Adds a consumer's interest in a topic. Idempotent.
    ///
    /// # Returns
    /// `true` if this was the first consumer and a subscribe was queued.
    pub fn add_interest(&self, consumer: ConsumerId, key: SubscriptionKey) -> bool {
        let mut inner = self.inner.lock();
        let consumers = inner.interests.entry(key.clone()).or_default();
        if !consumers.insert(consumer) || consumers.len() > 1 {
            return false;
        }

        self.dispatcher.register(&key);
        tracing::debug!(key = %key, consumer = %consumer, "first interest, subscribe queued");
        inner.pending.push_back(Intent::Subscribe(key));
        drop(inner);

        self.notify.notify_one();
        true
    }

    /// Withdraws a consumer's interest in a topic. Idempotent.
    ///
    /// # Returns
    /// `true` if this was the last consumer and an unsubscribe was queued.
    pub fn remove_interest(&self, consumer: ConsumerId, key: &SubscriptionKey) -> bool {
        let mut inner = self.inner.lock();
        let released = self.release(&mut inner, consumer, key);
        drop(inner);

        if released {
            self.notify.notify_one();
        }
        released
    }

    /// Withdraws every interest held by a consumer.
    ///
    /// # Returns
    /// The topics that lost their last consumer.
    pub fn remove_consumer(&self, consumer: ConsumerId) -> Vec<SubscriptionKey> {
        let mut inner = self.inner.lock();
        let held: Vec<SubscriptionKey> = inner
            .interests
            .iter()
            .filter(|(_, consumers)| consumers.contains(&consumer))
            .map(|(key, _)| key.clone())
            .collect();

        let released: Vec<SubscriptionKey> = held
            .into_iter()
            .filter(|key| self.release(&mut inner, consumer, key))
            .collect();
        drop(inner);

        if !released.is_empty() {
            self.notify.notify_one();
        }
        released
    }

    fn release(
        &self,
        inner: &mut RegistryState,
        consumer: ConsumerId,
        key: &SubscriptionKey,
    ) -> bool {
        let Some(consumers) = inner.interests.get_mut(key) else {
            return false;
        };
        if !consumers.remove(&consumer) || !consumers.is_empty() {
            return false;
        }

        inner.interests.remove(key);
        self.dispatcher.unregister(key);
        tracing::debug!(key = %key, consumer = %consumer, "last interest, unsubscribe queued");
        inner.pending.push_back(Intent::Unsubscribe(key.clone()));
        true
    }

    /// Number of consumers interested in a topic.
    #[must_use]
    pub fn interest_count(&self, key: &SubscriptionKey) -> usize {
        self.inner.lock().interests.get(key).map_or(0, HashSet::len)
    }

    /// Returns true if at least one consumer wants the topic.
    #[must_use]
    pub fn is_desired(&self, key: &SubscriptionKey) -> bool {
        self.inner.lock().interests.contains_key(key)
    }

    /// Topics with at least one consumer, in replay order.
    #[must_use]
    pub fn desired(&self) -> Vec<SubscriptionKey> {
        self.inner.lock().interests.keys().cloned().collect()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().link
    }

    /// Receiver that observes every connection state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Waits until intents may be pending.
    pub(crate) async fn intents_ready(&self) {
        self.notify.notified().await;
    }

    /// Takes the queued intents in order.
    pub(crate) fn take_pending(&self) -> Vec<Intent> {
        self.inner.lock().pending.drain(..).collect()
    }

    /// Moves to a state that does not involve replay.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut inner = self.inner.lock();
        self.publish(&mut inner, state);
    }

    /// Enters `Resubscribing` and returns every desired topic.
    ///
    /// Queued intents are dropped: the desired set already reflects them.
    pub(crate) fn begin_resubscribe(&self) -> Vec<SubscriptionKey> {
        let mut inner = self.inner.lock();
        inner.pending.clear();
        self.publish(&mut inner, ConnectionState::Resubscribing);
        inner.interests.keys().cloned().collect()
    }

    /// Returns intents queued during the replay, or moves to `Connected`
    /// once none are left. Call until it returns `None`.
    pub(crate) fn complete_resubscribe(&self) -> Option<Vec<Intent>> {
        let mut inner = self.inner.lock();
        if inner.pending.is_empty() {
            self.publish(&mut inner, ConnectionState::Connected);
            return None;
        }
        Some(inner.pending.drain(..).collect())
    }

    fn publish(&self, inner: &mut RegistryState, state: ConnectionState) {
        if inner.link == state {
            return;
        }
        tracing::info!(from = %inner.link, to = %state, "connection state changed");
        inner.link = state;
        self.state_tx.send_replace(state);
        self.events.send(FeedEvent::ConnectionChanged(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironfeed_channel::broadcast;
    use ironfeed_core::{Channel, ProductId};
    use ironfeed_marketdata::{BookConfig, BookState};

    fn registry() -> (ChannelRegistry, Arc<Dispatcher>) {
        let events = broadcast::channel(64);
        let dispatcher = Arc::new(Dispatcher::new(BookConfig::default(), 10, events.clone()));
        (
            ChannelRegistry::new(Arc::clone(&dispatcher), events),
            dispatcher,
        )
    }

    fn level2(product: &str) -> SubscriptionKey {
        SubscriptionKey::new(Channel::Level2, product)
    }

    #[test]
    fn test_reference_counting() {
        let (registry, dispatcher) = registry();
        let key = level2("BTC-USD");

        assert!(registry.add_interest(ConsumerId(1), key.clone()));
        assert!(!registry.add_interest(ConsumerId(1), key.clone()));
        assert!(!registry.add_interest(ConsumerId(2), key.clone()));
        assert_eq!(registry.interest_count(&key), 2);
        assert!(dispatcher.is_registered(&key));

        assert!(!registry.remove_interest(ConsumerId(1), &key));
        assert!(!registry.remove_interest(ConsumerId(1), &key));
        assert!(dispatcher.is_registered(&key));

        assert!(registry.remove_interest(ConsumerId(2), &key));
        assert!(!dispatcher.is_registered(&key));
        assert_eq!(registry.interest_count(&key), 0);

        assert_eq!(
            registry.take_pending(),
            vec![Intent::Subscribe(key.clone()), Intent::Unsubscribe(key)]
        );
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (registry, _) = registry();
        assert!(!registry.remove_interest(ConsumerId(9), &level2("BTC-USD")));
        assert!(registry.take_pending().is_empty());
    }

    #[test]
    fn test_remove_consumer_releases_only_last() {
        let (registry, _) = registry();
        registry.add_interest(ConsumerId(1), level2("BTC-USD"));
        registry.add_interest(ConsumerId(1), level2("ETH-USD"));
        registry.add_interest(ConsumerId(2), level2("ETH-USD"));
        registry.take_pending();

        let released = registry.remove_consumer(ConsumerId(1));
        assert_eq!(released, vec![level2("BTC-USD")]);
        assert_eq!(registry.desired(), vec![level2("ETH-USD")]);
        assert_eq!(
            registry.take_pending(),
            vec![Intent::Unsubscribe(level2("BTC-USD"))]
        );
    }

    #[test]
    fn test_replay_supersedes_queue() {
        let (registry, _) = registry();
        registry.add_interest(ConsumerId(1), level2("BTC-USD"));
        registry.add_interest(ConsumerId(1), level2("ETH-USD"));
        registry.remove_interest(ConsumerId(1), &level2("ETH-USD"));

        registry.set_state(ConnectionState::Connecting);
        let keys = registry.begin_resubscribe();
        assert_eq!(keys, vec![level2("BTC-USD")]);
        assert_eq!(registry.state(), ConnectionState::Resubscribing);

        // Changes during the replay are flushed before Connected.
        registry.add_interest(ConsumerId(2), level2("SOL-USD"));
        assert_eq!(
            registry.complete_resubscribe(),
            Some(vec![Intent::Subscribe(level2("SOL-USD"))])
        );
        assert_eq!(registry.state(), ConnectionState::Resubscribing);
        assert_eq!(registry.complete_resubscribe(), None);
        assert_eq!(registry.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_resubscribe_starts_fresh_store() {
        let (registry, dispatcher) = registry();
        let key = level2("BTC-USD");
        let btc = ProductId::new("BTC-USD");

        registry.add_interest(ConsumerId(1), key.clone());
        dispatcher.mark_subscribed(&key);
        registry.remove_interest(ConsumerId(1), &key);
        assert!(dispatcher.order_book(&btc).is_none());

        registry.add_interest(ConsumerId(1), key.clone());
        let store = dispatcher.order_book(&btc).unwrap();
        assert_eq!(store.state(), BookState::Uninitialized);
        dispatcher.mark_subscribed(&key);
        assert_eq!(store.state(), BookState::AwaitingSnapshot);
    }

    #[test]
    fn test_state_published() {
        let events = broadcast::channel(64);
        let mut rx = events.subscribe();
        let dispatcher = Arc::new(Dispatcher::new(BookConfig::default(), 10, events.clone()));
        let registry = ChannelRegistry::new(dispatcher, events);
        let watch = registry.watch();

        registry.set_state(ConnectionState::Connecting);
        registry.set_state(ConnectionState::Connecting);

        assert_eq!(*watch.borrow(), ConnectionState::Connecting);
        assert_eq!(
            rx.drain(),
            vec![FeedEvent::ConnectionChanged(ConnectionState::Connecting)]
        );
    }
}
