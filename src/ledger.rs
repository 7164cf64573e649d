use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalOrigin {
    Completion,
    Operator,
}

impl fmt::Display for RemovalOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalOrigin::Completion => f.write_str("completion"),
            RemovalOrigin::Operator => f.write_str("operator"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ItemState {
    Claimed,
    InFlight(RemovalOrigin),
    Removed,
}

/// A delete request that has been recorded as in flight and still has to be
/// sent to the remote queue. The outcome must be reported back with
/// [`ClaimLedger::finish_removal`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemovalTicket {
    pub generation: u64,
    pub item_id: String,
    pub origin: RemovalOrigin,
    pub dispatcher_id: Option<usize>,
}

/// Mutual-exclusion ledger for remote queue item ids.
///
/// Every id is in at most one of claimed, in flight or removed; an id that is
/// absent is unclaimed. Removed is terminal for the lifetime of a generation.
/// Both the completion sweep and the operator resolve path go through the
/// same ledger, so an id can never have two deletes outstanding.
#[derive(Clone, Debug, Default)]
pub struct ClaimLedger {
    generation: u64,
    items: HashMap<String, ItemState>,
}

impl ClaimLedger {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            items: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reset(&mut self, generation: u64) {
        self.generation = generation;
        self.items.clear();
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        matches!(self.items.get(id), Some(ItemState::Claimed))
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        matches!(self.items.get(id), Some(ItemState::InFlight(_)))
    }

    pub fn is_removed(&self, id: &str) -> bool {
        matches!(self.items.get(id), Some(ItemState::Removed))
    }

    pub fn is_available(&self, id: &str) -> bool {
        !self.items.contains_key(id)
    }

    pub fn claim(&mut self, id: &str) -> bool {
        if self.items.contains_key(id) {
            return false;
        }
        self.items.insert(id.to_string(), ItemState::Claimed);
        true
    }

    pub fn begin_removal(
        &mut self,
        id: &str,
        origin: RemovalOrigin,
        dispatcher_id: Option<usize>,
    ) -> Option<RemovalTicket> {
        match self.items.get(id) {
            Some(ItemState::Removed) | Some(ItemState::InFlight(_)) => None,
            Some(ItemState::Claimed) | None => {
                self.items.insert(id.to_string(), ItemState::InFlight(origin));
                Some(RemovalTicket {
                    generation: self.generation,
                    item_id: id.to_string(),
                    origin,
                    dispatcher_id,
                })
            }
        }
    }

    /// Applies a delete outcome. Success makes the id removed; failure drops
    /// the in-flight mark and leaves the id unclaimed. Returns false, changing
    /// nothing, when the ticket belongs to another generation or does not
    /// match the outstanding removal.
    pub fn finish_removal(&mut self, ticket: &RemovalTicket, succeeded: bool) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match self.items.get(&ticket.item_id) {
            Some(ItemState::InFlight(origin)) if *origin == ticket.origin => {}
            _ => return false,
        }

        if succeeded {
            self.items.insert(ticket.item_id.clone(), ItemState::Removed);
        } else {
            self.items.remove(&ticket.item_id);
        }
        true
    }

    pub fn claimed_count(&self) -> usize {
        self.count(|state| matches!(state, ItemState::Claimed))
    }

    pub fn in_flight_count(&self) -> usize {
        self.count(|state| matches!(state, ItemState::InFlight(_)))
    }

    pub fn removed_count(&self) -> usize {
        self.count(|state| matches!(state, ItemState::Removed))
    }

    pub fn claimed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .items
            .iter()
            .filter(|(_, state)| matches!(state, ItemState::Claimed))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn count(&self, pred: impl Fn(&ItemState) -> bool) -> usize {
        self.items.values().filter(|state| pred(state)).count()
    }
}
