use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::ledger::RemovalTicket;
use crate::mirror::FetchTicket;
use crate::models::{OperatorCommand, QueueItem};
use crate::remote::RemoteError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// A background delete reaches the queue service and its reply arrives.
    DeleteComplete { ticket: RemovalTicket },
    /// A list call issued earlier returns. The result reflects the service
    /// at issue time.
    FetchComplete {
        ticket: FetchTicket,
        result: Result<Vec<QueueItem>, RemoteError>,
    },
    Operator(OperatorCommand),
    MirrorPoll,
    Tick,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScheduledEvent {
    pub time_ms: u64,
    pub seq: u64,
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time_ms: u64, seq: u64, event: Event) -> Self {
        Self {
            time_ms,
            seq,
            event,
        }
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time_ms
            .cmp(&other.time_ms)
            .then_with(|| self.event.priority().cmp(&other.event.priority()))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Event {
    /// Replies land before anything that reads state at the same instant,
    /// and the tick runs last.
    fn priority(&self) -> u8 {
        match self {
            Event::DeleteComplete { .. } => 0,
            Event::FetchComplete { .. } => 1,
            Event::Operator(_) => 2,
            Event::MirrorPoll => 3,
            Event::Tick => 4,
        }
    }
}

/// Min-heap of pending events; equal keys pop in insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time_ms: u64, event: Event) {
        self.next_seq += 1;
        self.heap
            .push(Reverse(ScheduledEvent::new(time_ms, self.next_seq, event)));
    }

    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop().map(|Reverse(scheduled)| scheduled)
    }

    pub fn peek_time_ms(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(scheduled)| scheduled.time_ms)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn count_matching(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(scheduled)| predicate(&scheduled.event))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RemovalOrigin;

    fn delete(id: &str) -> Event {
        Event::DeleteComplete {
            ticket: RemovalTicket {
                generation: 1,
                item_id: id.to_string(),
                origin: RemovalOrigin::Completion,
                dispatcher_id: Some(1),
            },
        }
    }

    #[test]
    fn orders_by_time_then_priority_then_insertion() {
        let mut queue = EventQueue::new();
        queue.push(1000, Event::Tick);
        queue.push(1000, Event::MirrorPoll);
        queue.push(500, Event::Tick);
        queue.push(1000, delete("b"));
        queue.push(1000, delete("a"));

        let popped: Vec<(u64, Event)> = std::iter::from_fn(|| queue.pop())
            .map(|scheduled| (scheduled.time_ms, scheduled.event))
            .collect();
        assert_eq!(
            popped,
            vec![
                (500, Event::Tick),
                (1000, delete("b")),
                (1000, delete("a")),
                (1000, Event::MirrorPoll),
                (1000, Event::Tick),
            ]
        );
    }

    #[test]
    fn counts_pending_events() {
        let mut queue = EventQueue::new();
        queue.push(10, delete("a"));
        queue.push(20, Event::Tick);
        assert_eq!(queue.count_matching(|e| matches!(e, Event::DeleteComplete { .. })), 1);
        assert_eq!(queue.peek_time_ms(), Some(10));
        assert_eq!(queue.len(), 2);
    }
}
