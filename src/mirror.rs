use crate::ledger::ClaimLedger;
use crate::models::{MirrorProfile, QueueItem};
use crate::remote::RemoteError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FetchTicket {
    pub seq: u64,
    pub issued_at_ms: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Applied { items: usize },
    Failed { consecutive_failures: u32, retry_at_ms: u64 },
    /// A newer snapshot was already applied; the result was dropped.
    Stale,
}

/// Read-only local copy of the remote queue.
///
/// The snapshot is `None` until the first successful fetch. A failed fetch
/// never clears it, and results from fetches older than the applied
/// snapshot are discarded.
#[derive(Clone, Debug)]
pub struct QueueMirror {
    snapshot: Option<Vec<QueueItem>>,
    visible: bool,
    refresh_requested: bool,
    poll_interval_ms: u64,
    max_backoff_ms: u64,
    next_poll_ms: u64,
    consecutive_failures: u32,
    next_seq: u64,
    applied_seq: Option<u64>,
}

impl QueueMirror {
    pub fn new(profile: &MirrorProfile) -> Self {
        Self {
            snapshot: None,
            visible: true,
            refresh_requested: false,
            poll_interval_ms: profile.poll_interval_ms,
            max_backoff_ms: profile.max_backoff_ms.max(profile.poll_interval_ms),
            next_poll_ms: 0,
            consecutive_failures: 0,
            next_seq: 0,
            applied_seq: None,
        }
    }

    pub fn snapshot(&self) -> Option<&[QueueItem]> {
        self.snapshot.as_deref()
    }

    pub fn items(&self) -> &[QueueItem] {
        self.snapshot.as_deref().unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_poll_ms(&self) -> u64 {
        self.next_poll_ms
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Polling pauses while hidden; becoming visible again refreshes.
    pub fn set_visible(&mut self, visible: bool) {
        if visible && !self.visible {
            self.refresh_requested = true;
        }
        self.visible = visible;
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.visible && (self.refresh_requested || now_ms >= self.next_poll_ms)
    }

    pub fn begin_fetch(&mut self, now_ms: u64) -> FetchTicket {
        self.next_seq += 1;
        self.refresh_requested = false;
        self.next_poll_ms = now_ms + self.poll_interval_ms;
        FetchTicket {
            seq: self.next_seq,
            issued_at_ms: now_ms,
        }
    }

    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        now_ms: u64,
        result: Result<Vec<QueueItem>, RemoteError>,
    ) -> FetchOutcome {
        if self.applied_seq.is_some_and(|applied| ticket.seq <= applied) {
            return FetchOutcome::Stale;
        }

        match result {
            Ok(items) => {
                let count = items.len();
                self.snapshot = Some(items);
                self.applied_seq = Some(ticket.seq);
                self.consecutive_failures = 0;
                FetchOutcome::Applied { items: count }
            }
            Err(_) => {
                self.consecutive_failures += 1;
                let retry_at_ms = now_ms + self.backoff_ms();
                self.next_poll_ms = self.next_poll_ms.max(retry_at_ms);
                FetchOutcome::Failed {
                    consecutive_failures: self.consecutive_failures,
                    retry_at_ms: self.next_poll_ms,
                }
            }
        }
    }

    /// Items an operator may pick: not held, not being removed, not removed.
    pub fn unclaimed_items<'a>(&'a self, ledger: &ClaimLedger) -> Vec<&'a QueueItem> {
        self.items()
            .iter()
            .filter(|item| ledger.is_available(&item.id))
            .collect()
    }

    fn backoff_ms(&self) -> u64 {
        let shift = self.consecutive_failures.min(16);
        self.poll_interval_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms)
    }
}
