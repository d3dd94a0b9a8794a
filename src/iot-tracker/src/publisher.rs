use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, trace};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use libs::feed::PositionHandler;
use libs::registry::{RegistryError, TaskRegistry};
use libs::telemetry::PositionGenerator;

pub type SubscriberId = u64;

// Cleared on unsubscribe while holding the lock, so an in-flight delivery
// finishes first and none can start afterwards.
type HandlerSlot = Arc<Mutex<Option<PositionHandler>>>;

/// Point-to-point position feed: every subscriber gets its own timer and
/// its own stream of positions.
#[derive(Clone)]
pub struct Publisher {
    period: Duration,
    timers: TaskRegistry<SubscriberId>,
    slots: Arc<Mutex<HashMap<SubscriberId, HandlerSlot>>>,
    next_id: Arc<AtomicU64>,
}

impl Publisher {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            timers: TaskRegistry::new(),
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Registers `handler` and arms its timer. The first position comes one
    /// period after this call.
    pub fn subscribe(&self, handler: PositionHandler) -> Result<Subscription, RegistryError> {
        self.subscribe_with(handler, PositionGenerator::new())
    }

    pub fn subscribe_with(
        &self,
        handler: PositionHandler,
        mut generator: PositionGenerator,
    ) -> Result<Subscription, RegistryError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot: HandlerSlot = Arc::new(Mutex::new(Some(handler)));
        let period = self.period;
        let start = Instant::now() + period;

        let cloned_slot = slot.clone();
        self.timers.spawn(id, move |_| async move {
            let mut timer = interval_at(start, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let position = generator.next_position();
                let delivered = {
                    let guard = cloned_slot.lock().unwrap_or_else(PoisonError::into_inner);
                    match guard.as_ref() {
                        Some(handler) => {
                            handler(position);
                            true
                        }
                        None => false,
                    }
                };
                if !delivered {
                    break;
                }
            }
            trace!("subscriber {} timer stopped", id);
        })?;

        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slot);
        info!("Client {} connected", id);

        Ok(Subscription {
            id,
            publisher: self.clone(),
            closed: false,
        })
    }

    /// Stops the subscriber's timer and drops its handler. Once this returns
    /// the handler is never called again. Returns false if `id` was not
    /// subscribed (or already gone).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        let Some(slot) = slot else {
            return false;
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.timers.cancel(&id);
        info!("Client {} disconnected", id);
        true
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn subscribers(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn shutdown(&self) -> usize {
        let ids: Vec<SubscriberId> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
    }
}

/// Live registration with a [`Publisher`]. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    publisher: Publisher,
    closed: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Safe to call more than once; only the first call reaches the publisher.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.publisher.unsubscribe(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libs::feed::Aggregator;
    use libs::models::Position;
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(5);

    fn in_bounds(p: &Position) -> bool {
        (51.505..51.515).contains(&p.latitude) && (-0.09..-0.08).contains(&p.longitude)
    }

    #[tokio::test(start_paused = true)]
    async fn three_ticks_three_positions() {
        let publisher = Publisher::new(PERIOD);
        let aggregator = Aggregator::default();

        // Same seed on both sides: the subscriber must see exactly this sequence.
        let mut expected = PositionGenerator::with_seed(21);
        let _subscription = publisher
            .subscribe_with(aggregator.handler(), PositionGenerator::with_seed(21))
            .unwrap();

        sleep(Duration::from_secs(16)).await;

        let history = aggregator.positions();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(in_bounds));
        let emitted: Vec<Position> = (0..3).map(|_| expected.next_position()).collect();
        assert_eq!(history, emitted);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_before_the_first_period() {
        let publisher = Publisher::new(PERIOD);
        let aggregator = Aggregator::default();
        let _subscription = publisher.subscribe(aggregator.handler()).unwrap();

        sleep(Duration::from_millis(4_900)).await;
        assert!(aggregator.is_empty());
        sleep(Duration::from_millis(200)).await;
        assert_eq!(aggregator.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn feed_is_point_to_point() {
        let publisher = Publisher::new(PERIOD);
        let first = Aggregator::default();
        let second = Aggregator::default();
        let _a = publisher.subscribe(first.handler()).unwrap();
        sleep(Duration::from_secs(11)).await;
        let _b = publisher.subscribe(second.handler()).unwrap();
        sleep(Duration::from_secs(6)).await;

        // 5, 10, 15 for the first; 16 for the second
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_delivery_and_is_idempotent() {
        let publisher = Publisher::new(PERIOD);
        let aggregator = Aggregator::default();
        let mut subscription = publisher.subscribe(aggregator.handler()).unwrap();

        sleep(Duration::from_secs(11)).await;
        assert_eq!(aggregator.len(), 2);

        subscription.close();
        subscription.close();
        assert!(!publisher.unsubscribe(subscription.id()));
        assert_eq!(publisher.active_timers(), 0);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(aggregator.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_subscribers_no_timers() {
        let publisher = Publisher::new(PERIOD);
        assert_eq!(publisher.active_timers(), 0);
        {
            let a = Aggregator::default();
            let _s1 = publisher.subscribe(a.handler()).unwrap();
            let _s2 = publisher.subscribe(a.handler()).unwrap();
            assert_eq!(publisher.active_timers(), 2);
            assert_eq!(publisher.subscribers(), 2);
        }
        assert_eq!(publisher.active_timers(), 0);
        assert_eq!(publisher.subscribers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_everyone() {
        let publisher = Publisher::new(PERIOD);
        let a = Aggregator::default();
        let mut s1 = publisher.subscribe(a.handler()).unwrap();
        let _s2 = publisher.subscribe(a.handler()).unwrap();

        assert_eq!(publisher.shutdown(), 2);
        assert_eq!(publisher.active_timers(), 0);
        s1.close();
        sleep(Duration::from_secs(30)).await;
        assert!(a.is_empty());
    }
}
