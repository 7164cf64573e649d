use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info};

use crate::backlog::CurrentCallBacklog;
use crate::duration::HandleTime;
use crate::ledger::{ClaimLedger, RemovalOrigin, RemovalTicket};
use crate::models::QueueItem;
use crate::pool::{DispatcherPool, HeldCall};

pub struct TickContext<'a> {
    pub now_ms: u64,
    pub pool: &'a mut DispatcherPool,
    pub backlog: &'a mut CurrentCallBacklog,
    pub ledger: &'a mut ClaimLedger,
    pub queue: &'a [QueueItem],
    pub selected_id: Option<&'a str>,
    pub handle_time: HandleTime,
    pub current_call_handle_time: HandleTime,
    pub rng: &'a mut dyn RngCore,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Release {
    pub dispatcher_id: usize,
    pub held: HeldCall,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Assignment {
    pub dispatcher_id: usize,
    pub held: HeldCall,
    pub release_at_ms: u64,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    pub released: Vec<Release>,
    pub backlog_assignments: Vec<Assignment>,
    pub queue_assignments: Vec<Assignment>,
    /// Deletes to send in the background, already marked in flight.
    pub removals: Vec<RemovalTicket>,
    pub gate_open: bool,
}

/// Runs the three phases in order: completion sweep, backlog assignment,
/// then remote queue assignment.
pub fn run_tick(ctx: &mut TickContext) -> TickReport {
    let mut report = TickReport::default();
    sweep_completions(ctx, &mut report);
    assign_backlog(ctx, &mut report);
    assign_queue(ctx, &mut report);
    report
}

fn sweep_completions(ctx: &mut TickContext, report: &mut TickReport) {
    for dispatcher in ctx.pool.iter_mut() {
        if !dispatcher.is_due(ctx.now_ms) {
            continue;
        }
        let Some(held) = dispatcher.release() else {
            continue;
        };
        info!(dispatcher = dispatcher.id, call = held.id(), "dispatcher finished call");

        if let HeldCall::QueueItem { id } = &held {
            match ctx
                .ledger
                .begin_removal(id, RemovalOrigin::Completion, Some(dispatcher.id))
            {
                Some(ticket) => report.removals.push(ticket),
                None => debug!(item = %id, "removal already handled, skipping delete"),
            }
        }

        report.released.push(Release {
            dispatcher_id: dispatcher.id,
            held,
        });
    }
}

fn assign_backlog(ctx: &mut TickContext, report: &mut TickReport) {
    for dispatcher in ctx.pool.iter_mut() {
        if ctx.backlog.is_empty() {
            break;
        }
        if !dispatcher.is_idle() {
            continue;
        }
        let Some(seed) = ctx.backlog.pop_front() else {
            break;
        };
        let duration_ms = ctx.current_call_handle_time.duration_ms(ctx.rng);
        let held = HeldCall::CurrentCall {
            client_id: seed.client_id,
        };
        dispatcher.assign(held.clone(), ctx.now_ms, duration_ms);
        info!(dispatcher = dispatcher.id, call = held.id(), "dispatcher took backlog call");
        report.backlog_assignments.push(Assignment {
            dispatcher_id: dispatcher.id,
            held,
            release_at_ms: ctx.now_ms + duration_ms,
        });
    }
}

fn assign_queue(ctx: &mut TickContext, report: &mut TickReport) {
    report.gate_open = !ctx.pool.has_busy_current_call();
    let queue = ctx.queue;
    let selected_id = ctx.selected_id;
    if !report.gate_open || queue.is_empty() {
        return;
    }

    for dispatcher in ctx.pool.iter_mut() {
        if !dispatcher.is_idle() {
            continue;
        }
        let ledger = &*ctx.ledger;
        let candidate = queue
            .iter()
            .find(|item| Some(item.id.as_str()) != selected_id && ledger.is_available(&item.id));
        let Some(item) = candidate else {
            break;
        };

        // The claim must land before the next dispatcher looks.
        ctx.ledger.claim(&item.id);
        let duration_ms = ctx.handle_time.duration_ms(ctx.rng);
        let held = HeldCall::QueueItem {
            id: item.id.clone(),
        };
        dispatcher.assign(held.clone(), ctx.now_ms, duration_ms);
        info!(dispatcher = dispatcher.id, item = %item.id, "dispatcher claimed queue item");
        report.queue_assignments.push(Assignment {
            dispatcher_id: dispatcher.id,
            held,
            release_at_ms: ctx.now_ms + duration_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{LONG_HANDLE_MS, SHORT_HANDLE_MS};
    use crate::models::{CurrentCallSeed, Transcript};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn item(id: &str) -> QueueItem {
        QueueItem {
            id: id.to_string(),
            incident_type: "Theft".to_string(),
            location: "K1P1J1".to_string(),
            time: "20:00".to_string(),
            severity_level: "3".to_string(),
            suggested_actions: "dispatch officer".to_string(),
        }
    }

    fn seed(id: &str) -> CurrentCallSeed {
        CurrentCallSeed {
            client_id: id.to_string(),
            transcript: Transcript {
                text: "someone took my bike".to_string(),
                time: "10:00".to_string(),
                location: "K1P1J1".to_string(),
                duration: "00:20".to_string(),
            },
        }
    }

    struct Fixture {
        pool: DispatcherPool,
        backlog: CurrentCallBacklog,
        ledger: ClaimLedger,
        rng: StdRng,
    }

    impl Fixture {
        fn new(dispatchers: usize, seeds: Vec<CurrentCallSeed>) -> Self {
            Self {
                pool: DispatcherPool::new(dispatchers),
                backlog: CurrentCallBacklog::new(seeds),
                ledger: ClaimLedger::new(1),
                rng: StdRng::seed_from_u64(5),
            }
        }

        fn tick(&mut self, now_ms: u64, queue: &[QueueItem], selected: Option<&str>) -> TickReport {
            let mut ctx = TickContext {
                now_ms,
                pool: &mut self.pool,
                backlog: &mut self.backlog,
                ledger: &mut self.ledger,
                queue,
                selected_id: selected,
                handle_time: HandleTime::OneMinute,
                current_call_handle_time: HandleTime::FiveMinutes,
                rng: &mut self.rng,
            };
            run_tick(&mut ctx)
        }
    }

    #[test]
    fn idle_dispatchers_claim_distinct_items_in_id_order() {
        let mut fx = Fixture::new(3, Vec::new());
        let queue = vec![item("a"), item("b"), item("c"), item("d")];
        let report = fx.tick(0, &queue, None);

        let claimed: Vec<(usize, &str)> = report
            .queue_assignments
            .iter()
            .map(|a| (a.dispatcher_id, a.held.id()))
            .collect();
        assert_eq!(claimed, vec![(1, "a"), (2, "b"), (3, "c")]);
        assert_eq!(fx.ledger.claimed_count(), 3);
        assert!(report
            .queue_assignments
            .iter()
            .all(|a| a.release_at_ms == SHORT_HANDLE_MS));
    }

    #[test]
    fn selected_item_is_never_auto_claimed() {
        let mut fx = Fixture::new(2, Vec::new());
        let queue = vec![item("a"), item("b")];
        let report = fx.tick(0, &queue, Some("a"));
        assert_eq!(report.queue_assignments.len(), 1);
        assert_eq!(report.queue_assignments[0].held.id(), "b");
        assert!(fx.pool.get(2).unwrap().is_idle());
    }

    #[test]
    fn backlog_blocks_queue_work_pool_wide() {
        let mut fx = Fixture::new(2, vec![seed("cc-1")]);
        let queue = vec![item("a")];
        let report = fx.tick(0, &queue, None);

        assert_eq!(report.backlog_assignments.len(), 1);
        assert_eq!(report.backlog_assignments[0].dispatcher_id, 1);
        assert_eq!(
            report.backlog_assignments[0].release_at_ms,
            LONG_HANDLE_MS
        );
        assert!(!report.gate_open);
        assert!(report.queue_assignments.is_empty());
        assert!(fx.pool.get(2).unwrap().is_idle());
    }

    #[test]
    fn completion_releases_and_issues_one_removal() {
        let mut fx = Fixture::new(1, Vec::new());
        let queue = vec![item("a")];
        fx.tick(0, &queue, None);

        let report = fx.tick(SHORT_HANDLE_MS, &queue, None);
        assert_eq!(report.released.len(), 1);
        assert_eq!(report.removals.len(), 1);
        assert_eq!(report.removals[0].item_id, "a");
        assert_eq!(report.removals[0].dispatcher_id, Some(1));
        assert!(fx.ledger.is_in_flight("a"));
        // "a" is still in the stale mirror but mid-removal, so nothing to take.
        assert!(report.queue_assignments.is_empty());
        assert!(fx.pool.get(1).unwrap().is_idle());
    }

    #[test]
    fn completion_skips_delete_when_removal_already_in_flight() {
        let mut fx = Fixture::new(1, Vec::new());
        let queue = vec![item("a")];
        fx.tick(0, &queue, None);
        fx.ledger
            .begin_removal("a", RemovalOrigin::Operator, None)
            .expect("operator removal should be issued");

        let report = fx.tick(SHORT_HANDLE_MS, &queue, None);
        assert_eq!(report.released.len(), 1);
        assert!(report.removals.is_empty());
    }

    #[test]
    fn current_call_completion_has_no_remote_side_effect() {
        let mut fx = Fixture::new(1, vec![seed("cc-1")]);
        fx.tick(0, &[], None);
        let report = fx.tick(LONG_HANDLE_MS, &[], None);
        assert_eq!(report.released.len(), 1);
        assert!(report.removals.is_empty());
        assert_eq!(fx.ledger.in_flight_count(), 0);
    }
}
