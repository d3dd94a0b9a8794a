//! Explicit registry of periodic tasks.
//!
//! Every timer in the workspace is a tokio task owned by a `TaskRegistry`
//! under a key (connection id, view name). Cancelling a key stops the task
//! and forgets it, so an empty registry means no timer is left running.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};
use thiserror::Error as ThisError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(ThisError, Debug, PartialEq)]
pub enum RegistryError {
    #[error("a task is already registered under {0}")]
    AlreadyRegistered(String),
}

struct RegisteredTask {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner<K> {
    tasks: HashMap<K, RegisteredTask>,
    next_generation: u64,
}

#[derive(Clone)]
pub struct TaskRegistry<K> {
    inner: Arc<Mutex<Inner<K>>>,
}

impl<K> TaskRegistry<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tasks: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns `task` under `key`. The task receives a clone of the returned
    /// token, which [`TaskRegistry::cancel`] cancels; it is also raced
    /// against that token so a task that never checks it still stops.
    pub fn spawn<F, Fut>(&self, key: K, task: F) -> Result<CancellationToken, RegistryError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.lock();
        if inner.tasks.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(format!("{:?}", key)));
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let token = CancellationToken::new();
        let fut = task(token.clone());
        let cloned_token = token.clone();
        let registry = self.clone();
        let cloned_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cloned_token.cancelled() => {
                    trace!("task {:?} cancelled", cloned_key);
                }
                _ = fut => {
                    debug!("task {:?} finished", cloned_key);
                }
            }
            registry.forget(&cloned_key, generation);
        });

        inner.tasks.insert(
            key,
            RegisteredTask {
                generation,
                token: token.clone(),
                handle,
            },
        );
        Ok(token)
    }

    /// Cancels and forgets the task under `key`. Returns false when there was
    /// nothing to cancel, so calling it twice is harmless.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = self.lock().tasks.remove(key);
        match removed {
            Some(task) => {
                task.token.cancel();
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<RegisteredTask> = self.lock().tasks.drain().map(|(_, t)| t).collect();
        let count = drained.len();
        for task in drained {
            task.token.cancel();
            task.handle.abort();
        }
        count
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    // A finished task removes its own entry, unless the key was re-used since.
    fn forget(&self, key: &K, generation: u64) {
        let mut inner = self.lock();
        if inner
            .tasks
            .get(key)
            .is_some_and(|t| t.generation == generation)
        {
            inner.tasks.remove(key);
        }
    }
}

impl<K> Default for TaskRegistry<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_task() {
        let registry = TaskRegistry::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let cloned_ticks = ticks.clone();
        registry
            .spawn(1u64, move |_| async move {
                loop {
                    sleep(Duration::from_secs(1)).await;
                    cloned_ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(registry.cancel(&1));
        assert!(registry.is_empty());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_twice_is_harmless() {
        let registry = TaskRegistry::new();
        registry
            .spawn("view", |token| async move { token.cancelled().await })
            .unwrap();
        assert!(registry.cancel(&"view"));
        assert!(!registry.cancel(&"view"));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let registry = TaskRegistry::new();
        registry
            .spawn("view", |token| async move { token.cancelled().await })
            .unwrap();
        let err = registry
            .spawn("view", |token| async move { token.cancelled().await })
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered("\"view\"".to_string()));
        assert_eq!(registry.cancel_all(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_task_forgets_itself() {
        let registry = TaskRegistry::new();
        registry
            .spawn(9u64, |_| async move {
                sleep(Duration::from_secs(1)).await;
            })
            .unwrap();
        assert!(registry.contains(&9));
        sleep(Duration::from_secs(2)).await;
        assert!(!registry.contains(&9));
    }

    #[tokio::test]
    async fn task_token_is_the_registered_one() {
        let registry = TaskRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let cloned_seen = seen.clone();
        let token = registry
            .spawn("view", move |token| {
                *cloned_seen.lock().unwrap() = Some(token.clone());
                async move { token.cancelled().await }
            })
            .unwrap();
        registry
            .spawn("other", |token| async move { token.cancelled().await })
            .unwrap();

        let task_token = seen.lock().unwrap().take().unwrap();
        assert!(registry.cancel(&"other"));
        assert!(!task_token.is_cancelled());

        assert!(registry.cancel(&"view"));
        assert!(task_token.is_cancelled());
        assert!(token.is_cancelled());
    }
}
