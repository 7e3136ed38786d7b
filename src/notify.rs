//! Per-source change notification with one-shot callbacks.
//!
//! A callback registered for a source fires on the next [`ChangeNotifier::notify`]
//! for that source and is then discarded; interested parties register again
//! when they want to hear about the following change. Every notification
//! advances the source's generation, which lets a caller register only if
//! nothing changed since it started reading.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    generations: HashMap<String, u64>,
    callbacks: HashMap<String, Vec<(u64, Callback)>>,
    next_token: u64,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ChangeNotifier")
            .field("generations", &state.generations)
            .field("pending", &state.callbacks.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications `source` has seen.
    pub fn generation(&self, source: &str) -> u64 {
        lock(&self.state).generations.get(source).copied().unwrap_or(0)
    }

    pub fn register_change_callback<F>(&self, source: &str, callback: F) -> Subscription
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        self.register_locked(&mut state, source, Box::new(callback))
    }

    /// Register only if `source` is still at generation `expected`. Returns
    /// `None` when a notification happened in between; the callback is dropped
    /// unfired.
    pub fn register_change_callback_at<F>(
        &self,
        source: &str,
        expected: u64,
        callback: F,
    ) -> Option<Subscription>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.state);
        let current = state.generations.get(source).copied().unwrap_or(0);
        if current != expected {
            return None;
        }
        Some(self.register_locked(&mut state, source, Box::new(callback)))
    }

    fn register_locked(&self, state: &mut State, source: &str, callback: Callback) -> Subscription {
        state.next_token += 1;
        let token = state.next_token;
        state
            .callbacks
            .entry(source.to_string())
            .or_default()
            .push((token, callback));
        Subscription {
            state: Arc::downgrade(&self.state),
            source: source.to_string(),
            token,
        }
    }

    /// Advance `source`'s generation and fire its pending callbacks. Returns how
    /// many fired.
    pub fn notify(&self, source: &str) -> usize {
        let pending = {
            let mut state = lock(&self.state);
            *state.generations.entry(source.to_string()).or_insert(0) += 1;
            state.callbacks.remove(source).unwrap_or_default()
        };
        // Callbacks may register again or drop subscriptions, so they run
        // with the lock released.
        let fired = pending.len();
        for (_, callback) in pending {
            callback();
        }
        tracing::debug!(source, fired, "change notified");
        fired
    }
}

/// Handle to a pending callback. Dropping it unregisters the callback if it
/// has not fired yet.
pub struct Subscription {
    state: Weak<Mutex<State>>,
    source: String,
    token: u64,
}

impl Subscription {
    /// Whether the callback is still waiting for a notification.
    pub fn is_pending(&self) -> bool {
        self.state.upgrade().is_some_and(|state| {
            lock(&state)
                .callbacks
                .get(&self.source)
                .is_some_and(|cbs| cbs.iter().any(|(t, _)| *t == self.token))
        })
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .field("token", &self.token)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        // Take the callback out before dropping it, outside the lock.
        let removed = {
            let mut state = lock(&state);
            state.callbacks.get_mut(&self.source).and_then(|cbs| {
                cbs.iter()
                    .position(|(t, _)| *t == self.token)
                    .map(|i| cbs.swap_remove(i))
            })
        };
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn callback_fires_once() {
        let notifier = ChangeNotifier::new();
        let (count, cb) = counter();
        let sub = notifier.register_change_callback("db", cb);
        assert!(sub.is_pending());

        assert_eq!(notifier.notify("db"), 1);
        assert_eq!(notifier.notify("db"), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_pending());
    }

    #[test]
    fn sources_are_independent() {
        let notifier = ChangeNotifier::new();
        let (count, cb) = counter();
        let _sub = notifier.register_change_callback("a", cb);
        notifier.notify("b");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.generation("b"), 1);
        assert_eq!(notifier.generation("a"), 0);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let notifier = ChangeNotifier::new();
        let (count, cb) = counter();
        drop(notifier.register_change_callback("db", cb));
        assert_eq!(notifier.notify("db"), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stale_generation_refuses_registration() {
        let notifier = ChangeNotifier::new();
        let seen = notifier.generation("db");
        notifier.notify("db");
        let (_, cb) = counter();
        assert!(notifier.register_change_callback_at("db", seen, cb).is_none());

        let (count, cb) = counter();
        let current = notifier.generation("db");
        let _sub = notifier.register_change_callback_at("db", current, cb).unwrap();
        notifier.notify("db");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_reregister() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));
        let held: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let (n, c, h) = (notifier.clone(), Arc::clone(&count), Arc::clone(&held));
        let sub = notifier.register_change_callback("db", move || {
            c.fetch_add(1, Ordering::SeqCst);
            let c2 = Arc::clone(&c);
            let next = n.register_change_callback("db", move || {
                c2.fetch_add(1, Ordering::SeqCst);
            });
            *h.lock().unwrap() = Some(next);
        });

        notifier.notify("db");
        notifier.notify("db");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(sub);
    }
}
