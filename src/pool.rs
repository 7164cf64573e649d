use std::fmt;

use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HeldCall {
    CurrentCall { client_id: String },
    QueueItem { id: String },
}

impl HeldCall {
    pub fn id(&self) -> &str {
        match self {
            HeldCall::CurrentCall { client_id } => client_id,
            HeldCall::QueueItem { id } => id,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatcherState {
    Idle,
    Busy { held: HeldCall, release_at_ms: u64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherStatus {
    Idle,
    Busy,
}

impl fmt::Display for DispatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherStatus::Idle => f.write_str("idle"),
            DispatcherStatus::Busy => f.write_str("busy"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    pub id: usize,
    pub state: DispatcherState,
    pub current_calls_handled: u32,
    pub queue_items_handled: u32,
    pub busy_ms: u64,
}

impl Dispatcher {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: DispatcherState::Idle,
            current_calls_handled: 0,
            queue_items_handled: 0,
            busy_ms: 0,
        }
    }

    pub fn status(&self) -> DispatcherStatus {
        match self.state {
            DispatcherState::Idle => DispatcherStatus::Idle,
            DispatcherState::Busy { .. } => DispatcherStatus::Busy,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DispatcherState::Idle)
    }

    pub fn held(&self) -> Option<&HeldCall> {
        match &self.state {
            DispatcherState::Busy { held, .. } => Some(held),
            DispatcherState::Idle => None,
        }
    }

    pub fn held_item_id(&self) -> Option<&str> {
        self.held().map(HeldCall::id)
    }

    pub fn release_at_ms(&self) -> Option<u64> {
        match self.state {
            DispatcherState::Busy { release_at_ms, .. } => Some(release_at_ms),
            DispatcherState::Idle => None,
        }
    }

    pub fn is_current_call(&self) -> bool {
        matches!(self.held(), Some(HeldCall::CurrentCall { .. }))
    }

    pub fn queue_item_id(&self) -> Option<&str> {
        match self.held() {
            Some(HeldCall::QueueItem { id }) => Some(id),
            _ => None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.release_at_ms()
            .map(|release_at| now_ms >= release_at)
            .unwrap_or(false)
    }

    pub fn assign(&mut self, held: HeldCall, now_ms: u64, duration_ms: u64) {
        self.busy_ms += duration_ms;
        self.state = DispatcherState::Busy {
            held,
            release_at_ms: now_ms + duration_ms,
        };
    }

    pub fn release(&mut self) -> Option<HeldCall> {
        match std::mem::replace(&mut self.state, DispatcherState::Idle) {
            DispatcherState::Busy { held, .. } => {
                match held {
                    HeldCall::CurrentCall { .. } => self.current_calls_handled += 1,
                    HeldCall::QueueItem { .. } => self.queue_items_handled += 1,
                }
                Some(held)
            }
            DispatcherState::Idle => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PoolCounts {
    pub idle: usize,
    pub busy_current: usize,
    pub busy_queue: usize,
}

impl PoolCounts {
    pub fn total(&self) -> usize {
        self.idle + self.busy_current + self.busy_queue
    }
}

/// Fixed-size set of dispatchers with ids `1..=N`, kept in id order.
#[derive(Clone, Debug, Default)]
pub struct DispatcherPool {
    dispatchers: Vec<Dispatcher>,
}

impl DispatcherPool {
    pub fn new(count: usize) -> Self {
        Self {
            dispatchers: (1..=count).map(Dispatcher::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dispatcher> {
        self.dispatchers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Dispatcher> {
        self.dispatchers.iter_mut()
    }

    pub fn get(&self, id: usize) -> Option<&Dispatcher> {
        id.checked_sub(1).and_then(|idx| self.dispatchers.get(idx))
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Dispatcher> {
        let idx = id.checked_sub(1)?;
        self.dispatchers.get_mut(idx)
    }

    pub fn counts(&self) -> PoolCounts {
        let mut counts = PoolCounts::default();
        for dispatcher in &self.dispatchers {
            match dispatcher.held() {
                None => counts.idle += 1,
                Some(HeldCall::CurrentCall { .. }) => counts.busy_current += 1,
                Some(HeldCall::QueueItem { .. }) => counts.busy_queue += 1,
            }
        }
        counts
    }

    pub fn has_busy_current_call(&self) -> bool {
        self.dispatchers.iter().any(Dispatcher::is_current_call)
    }

    pub fn holder_of(&self, item_id: &str) -> Option<usize> {
        self.dispatchers
            .iter()
            .find(|dispatcher| dispatcher.queue_item_id() == Some(item_id))
            .map(|dispatcher| dispatcher.id)
    }

    pub fn next_release_ms(&self) -> Option<u64> {
        self.dispatchers
            .iter()
            .filter_map(Dispatcher::release_at_ms)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_is_idle_with_sequential_ids() {
        let pool = DispatcherPool::new(3);
        let ids: Vec<usize> = pool.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            pool.counts(),
            PoolCounts {
                idle: 3,
                busy_current: 0,
                busy_queue: 0
            }
        );
        assert!(pool.get(0).is_none());
        assert_eq!(pool.get(3).map(|d| d.id), Some(3));
    }

    #[test]
    fn busy_state_carries_release_instant_and_held_id() {
        let mut dispatcher = Dispatcher::new(1);
        assert_eq!(dispatcher.release_at_ms(), None);
        assert_eq!(dispatcher.held_item_id(), None);

        dispatcher.assign(
            HeldCall::QueueItem {
                id: "q1".to_string(),
            },
            1_000,
            60_000,
        );
        assert_eq!(dispatcher.status(), DispatcherStatus::Busy);
        assert_eq!(dispatcher.release_at_ms(), Some(61_000));
        assert_eq!(dispatcher.held_item_id(), Some("q1"));
        assert!(!dispatcher.is_current_call());
        assert!(!dispatcher.is_due(60_999));
        assert!(dispatcher.is_due(61_000));

        let held = dispatcher.release();
        assert_eq!(held.as_ref().map(HeldCall::id), Some("q1"));
        assert!(dispatcher.is_idle());
        assert_eq!(dispatcher.release_at_ms(), None);
        assert_eq!(dispatcher.queue_items_handled, 1);
        assert!(dispatcher.release().is_none());
    }

    #[test]
    fn counts_split_busy_by_kind() {
        let mut pool = DispatcherPool::new(3);
        pool.get_mut(1).unwrap().assign(
            HeldCall::CurrentCall {
                client_id: "cc-1".to_string(),
            },
            0,
            10,
        );
        pool.get_mut(3).unwrap().assign(
            HeldCall::QueueItem {
                id: "q".to_string(),
            },
            0,
            20,
        );
        let counts = pool.counts();
        assert_eq!(counts.idle, 1);
        assert_eq!(counts.busy_current, 1);
        assert_eq!(counts.busy_queue, 1);
        assert_eq!(counts.total(), 3);
        assert!(pool.has_busy_current_call());
        assert_eq!(pool.holder_of("q"), Some(3));
        assert_eq!(pool.next_release_ms(), Some(10));
    }
}
