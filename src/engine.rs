use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backlog::CurrentCallBacklog;
use crate::error::Result;
use crate::ledger::{ClaimLedger, RemovalOrigin, RemovalTicket};
use crate::models::{QueueItem, SimConfig};
use crate::pool::{DispatcherPool, HeldCall, PoolCounts};
use crate::remote::RemoteError;
use crate::seeds;
use crate::tick::{run_tick, TickContext, TickReport};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub current_calls_assigned: u64,
    pub queue_items_claimed: u64,
    pub removals_issued: u64,
    pub removals_succeeded: u64,
    pub removals_failed: u64,
    pub stale_completions: u64,
    pub operator_resolves: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolveStart {
    Issued(RemovalTicket),
    AlreadyHandled,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemovalOutcome {
    Removed {
        item_id: String,
        origin: RemovalOrigin,
    },
    Failed {
        item_id: String,
        origin: RemovalOrigin,
        error: RemoteError,
    },
    /// The ticket predates the current configuration or was already settled.
    Stale,
}

/// The dispatcher scheduling engine for one configuration at a time.
///
/// Owns the pool, the current-call backlog and the claim ledger. Remote
/// collaborators stay outside: the engine emits removal tickets and is told
/// their outcome later, after any number of ticks.
pub struct DispatchEngine {
    config: SimConfig,
    generation: u64,
    initialized: bool,
    pool: DispatcherPool,
    backlog: CurrentCallBacklog,
    ledger: ClaimLedger,
    rng: StdRng,
    stats: EngineStats,
}

impl DispatchEngine {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self::with_rng(config, rng))
    }

    pub fn with_rng(config: SimConfig, rng: StdRng) -> Self {
        let generation = 1;
        Self {
            pool: DispatcherPool::new(config.dispatchers),
            config,
            generation,
            initialized: false,
            backlog: CurrentCallBacklog::default(),
            ledger: ClaimLedger::new(generation),
            rng,
            stats: EngineStats::default(),
        }
    }

    /// Puts the first seeded current calls on dispatchers and queues the
    /// rest. Only the first call per configuration does anything.
    pub fn initialize(&mut self, now_ms: u64) -> bool {
        if self.initialized {
            debug!(generation = self.generation, "engine already initialized");
            return false;
        }
        self.initialized = true;

        let mut seeds =
            seeds::current_call_seeds(&self.config, self.generation, &mut self.rng).into_iter();
        for dispatcher in self.pool.iter_mut() {
            let Some(seed) = seeds.next() else {
                break;
            };
            let duration_ms = self.config.initial_busy_handle_time.duration_ms(&mut self.rng);
            dispatcher.assign(
                HeldCall::CurrentCall {
                    client_id: seed.client_id,
                },
                now_ms,
                duration_ms,
            );
            self.stats.current_calls_assigned += 1;
        }
        self.backlog = CurrentCallBacklog::new(seeds);

        info!(
            generation = self.generation,
            dispatchers = self.pool.len(),
            backlog = self.backlog.len(),
            "engine initialized"
        );
        true
    }

    /// Replaces the configuration. Outstanding removal tickets from before
    /// become stale.
    pub fn reconfigure(&mut self, config: SimConfig, now_ms: u64) -> Result<()> {
        config.validate()?;
        self.generation += 1;
        self.config = config;
        self.pool = DispatcherPool::new(self.config.dispatchers);
        self.backlog.clear();
        self.ledger.reset(self.generation);
        self.initialized = false;
        info!(generation = self.generation, "engine reconfigured");
        self.initialize(now_ms);
        Ok(())
    }

    pub fn tick(
        &mut self,
        now_ms: u64,
        queue: &[QueueItem],
        selected_id: Option<&str>,
    ) -> TickReport {
        let mut ctx = TickContext {
            now_ms,
            pool: &mut self.pool,
            backlog: &mut self.backlog,
            ledger: &mut self.ledger,
            queue,
            selected_id,
            handle_time: self.config.handle_time,
            current_call_handle_time: self.config.initial_busy_handle_time,
            rng: &mut self.rng,
        };
        let report = run_tick(&mut ctx);

        self.stats.ticks += 1;
        self.stats.current_calls_assigned += report.backlog_assignments.len() as u64;
        self.stats.queue_items_claimed += report.queue_assignments.len() as u64;
        self.stats.removals_issued += report.removals.len() as u64;
        report
    }

    pub fn begin_resolve(&mut self, item_id: &str) -> ResolveStart {
        match self
            .ledger
            .begin_removal(item_id, RemovalOrigin::Operator, None)
        {
            Some(ticket) => {
                self.stats.removals_issued += 1;
                ResolveStart::Issued(ticket)
            }
            None => {
                debug!(item = %item_id, "resolve skipped, removal already handled");
                ResolveStart::AlreadyHandled
            }
        }
    }

    /// `NotFound` counts as removed: the item is gone remotely either way.
    pub fn complete_removal(
        &mut self,
        ticket: &RemovalTicket,
        result: std::result::Result<(), RemoteError>,
    ) -> RemovalOutcome {
        let result = match result {
            Err(RemoteError::NotFound(_)) => Ok(()),
            other => other,
        };
        if ticket.generation != self.generation
            || !self.ledger.finish_removal(ticket, result.is_ok())
        {
            self.stats.stale_completions += 1;
            debug!(
                item = %ticket.item_id,
                generation = ticket.generation,
                "ignoring stale removal"
            );
            return RemovalOutcome::Stale;
        }

        match result {
            Ok(()) => {
                self.stats.removals_succeeded += 1;
                if ticket.origin == RemovalOrigin::Operator {
                    self.stats.operator_resolves += 1;
                }
                info!(item = %ticket.item_id, origin = %ticket.origin, "queue item removed");
                RemovalOutcome::Removed {
                    item_id: ticket.item_id.clone(),
                    origin: ticket.origin,
                }
            }
            Err(error) => {
                self.stats.removals_failed += 1;
                // A dispatcher may still be working the item (operator path).
                if self.pool.holder_of(&ticket.item_id).is_some() {
                    self.ledger.claim(&ticket.item_id);
                }
                warn!(
                    item = %ticket.item_id,
                    origin = %ticket.origin,
                    %error,
                    "queue item removal failed"
                );
                RemovalOutcome::Failed {
                    item_id: ticket.item_id.clone(),
                    origin: ticket.origin,
                    error,
                }
            }
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pool(&self) -> &DispatcherPool {
        &self.pool
    }

    pub fn backlog(&self) -> &CurrentCallBacklog {
        &self.backlog
    }

    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    pub fn counts(&self) -> PoolCounts {
        self.pool.counts()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}
