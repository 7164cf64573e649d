use std::collections::VecDeque;

use crate::models::CurrentCallSeed;

/// FIFO of current calls that did not fit on a dispatcher at load time.
///
/// Filled once on construction; there is no way to push afterwards.
#[derive(Clone, Debug, Default)]
pub struct CurrentCallBacklog {
    pending: VecDeque<CurrentCallSeed>,
}

impl CurrentCallBacklog {
    pub fn new(seeds: impl IntoIterator<Item = CurrentCallSeed>) -> Self {
        Self {
            pending: seeds.into_iter().collect(),
        }
    }

    pub fn pop_front(&mut self) -> Option<CurrentCallSeed> {
        self.pending.pop_front()
    }

    pub fn peek(&self) -> Option<&CurrentCallSeed> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
