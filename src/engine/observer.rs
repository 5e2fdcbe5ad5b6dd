//! State subscription
//!
//! Listeners registered here receive every published `SessionState`, in
//! subscription order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::state::SessionState;

pub type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct StatePublisher {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Listeners run outside the lock, so they may subscribe or unsubscribe
    pub fn publish(&self, state: &SessionState) {
        let listeners: Vec<Listener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener(state);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_listeners_in_order() {
        let publisher = StatePublisher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            publisher.subscribe(move |state: &SessionState| {
                seen.lock().unwrap().push((tag, state.steps));
            });
        }

        publisher.publish(&SessionState {
            steps: 42,
            ..Default::default()
        });
        assert_eq!(*seen.lock().unwrap(), vec![("first", 42), ("second", 42)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let publisher = StatePublisher::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = publisher.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.publish(&SessionState::default());
        assert!(publisher.unsubscribe(id));
        assert!(!publisher.unsubscribe(id));
        publisher.publish(&SessionState::default());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let publisher = Arc::new(StatePublisher::new());
        let calls = Arc::new(AtomicU64::new(0));
        let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let handle = Arc::clone(&publisher);
        let counter = Arc::clone(&calls);
        let slot = Arc::clone(&own_id);
        let id = publisher.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = slot.lock().unwrap().take() {
                handle.unsubscribe(id);
            }
        });
        *own_id.lock().unwrap() = Some(id);

        publisher.publish(&SessionState::default());
        publisher.publish(&SessionState::default());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.listener_count(), 0);
    }
}
