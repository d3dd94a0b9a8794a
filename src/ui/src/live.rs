use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, trace};
use tokio::sync::{broadcast, RwLock, RwLockReadGuard};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use libs::models::BatchRecord;
use libs::registry::{RegistryError, TaskRegistry};
use libs::simulator::BatchSimulator;

pub type ViewId = u64;

const SIMULATOR_TASK: &str = "batch-simulator";
const UPDATES_CAPACITY: usize = 16;

/// Batch state shown by the dashboard. The simulator timer runs while at
/// least one dashboard view is active and is the only writer of the state.
#[derive(Clone)]
pub struct LiveDashboard {
    simulator: Arc<RwLock<BatchSimulator>>,
    views: Arc<Mutex<HashSet<ViewId>>>,
    timers: TaskRegistry<&'static str>,
    updates: broadcast::Sender<Vec<BatchRecord>>,
    next_view: Arc<AtomicU64>,
    period: Duration,
}

impl LiveDashboard {
    pub fn new(simulator: BatchSimulator, period: Duration) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self {
            simulator: Arc::new(RwLock::new(simulator)),
            views: Arc::new(Mutex::new(HashSet::new())),
            timers: TaskRegistry::new(),
            updates,
            next_view: Arc::new(AtomicU64::new(1)),
            period,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, BatchSimulator> {
        self.simulator.read().await
    }

    /// Snapshots published after every tick.
    pub fn updates(&self) -> broadcast::Receiver<Vec<BatchRecord>> {
        self.updates.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.timers.contains(&SIMULATOR_TASK)
    }

    pub fn active_views(&self) -> usize {
        self.views.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// A view became visible. The first one arms the simulator timer.
    pub fn activate(&self) -> Result<ViewId, RegistryError> {
        let id = self.next_view.fetch_add(1, Ordering::Relaxed);
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        if views.is_empty() {
            self.arm()?;
            info!("dashboard simulator started");
        }
        views.insert(id);
        debug!("view {} active, {} in total", id, views.len());
        Ok(id)
    }

    /// A view went away. The last one disarms the timer; when this returns
    /// no further tick will touch the batches. Unknown ids are ignored.
    pub async fn deactivate(&self, id: ViewId) -> bool {
        let stopped = {
            let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
            if !views.remove(&id) {
                return false;
            }
            debug!("view {} inactive, {} left", id, views.len());
            views.is_empty() && self.timers.cancel(&SIMULATOR_TASK)
        };
        if stopped {
            // Waits out a tick that already holds the write lock
            drop(self.simulator.write().await);
            info!("dashboard simulator stopped");
        }
        true
    }

    /// Stops the timer regardless of active views.
    pub fn shutdown(&self) -> usize {
        self.timers.cancel_all()
    }

    fn arm(&self) -> Result<(), RegistryError> {
        let simulator = self.simulator.clone();
        let updates = self.updates.clone();
        let period = self.period;
        let start = Instant::now() + period;
        self.timers.spawn(SIMULATOR_TASK, move |token| async move {
            let mut timer = interval_at(start, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let snapshot = {
                    let mut simulator = simulator.write().await;
                    if token.is_cancelled() {
                        break;
                    }
                    simulator.tick();
                    simulator.snapshot()
                };
                // No receiver just means nobody is watching the socket feed
                if updates.send(snapshot).is_err() {
                    trace!("no live view listening");
                }
            }
        })?;
        Ok(())
    }
}
