use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{IncidentDetail, QueueItem, RemoteProfile, TimestampedLine, Transcript};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("queue item '{0}' not found")]
    NotFound(String),
    #[error("queue service unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Reply to a create call. `enqueued == false` means the service suppressed
/// the submission as a near-duplicate; that is not an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub created_id: String,
    pub enqueued: bool,
    pub duplicate_of: Option<String>,
    pub notice: Option<String>,
}

/// The remote queue and incident store, as seen by the engine.
pub trait QueueService {
    /// May lag behind recent deletes.
    fn list_queue(&mut self) -> Result<Vec<QueueItem>, RemoteError>;
    fn delete_queue_item(&mut self, id: &str) -> Result<(), RemoteError>;
    fn create_queue_item(
        &mut self,
        transcript: &Transcript,
        lines: &[TimestampedLine],
    ) -> Result<CreateOutcome, RemoteError>;
    fn fetch_incident_detail(&mut self, id: &str) -> Result<IncidentDetail, RemoteError>;
}

/// In-process queue service used by the simulator and tests.
pub struct InMemoryQueue {
    live: Vec<IncidentDetail>,
    archived: HashMap<String, IncidentDetail>,
    next_id: u64,
    rng: StdRng,
    delete_failure_rate: f64,
    fetch_failure_rate: f64,
    forced_delete_failures: HashSet<String>,
    delete_calls: HashMap<String, u32>,
}

impl InMemoryQueue {
    pub fn new(profile: &RemoteProfile, seed: u64) -> Self {
        Self {
            live: Vec::new(),
            archived: HashMap::new(),
            next_id: 0,
            rng: StdRng::seed_from_u64(seed),
            delete_failure_rate: profile.delete_failure_rate,
            fetch_failure_rate: profile.fetch_failure_rate,
            forced_delete_failures: HashSet::new(),
            delete_calls: HashMap::new(),
        }
    }

    pub fn reliable() -> Self {
        Self::new(
            &RemoteProfile {
                delete_failure_rate: 0.0,
                fetch_failure_rate: 0.0,
                ..RemoteProfile::default()
            },
            0,
        )
    }

    /// Makes the next delete of `id` fail once.
    pub fn fail_next_delete(&mut self, id: &str) {
        self.forced_delete_failures.insert(id.to_string());
    }

    pub fn delete_calls(&self, id: &str) -> u32 {
        self.delete_calls.get(id).copied().unwrap_or(0)
    }

    pub fn total_delete_calls(&self) -> u32 {
        self.delete_calls.values().sum()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.live.iter().any(|record| record.id == id)
    }

    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen::<f64>() < rate
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("INC-{:06}", self.next_id)
    }
}

impl QueueService for InMemoryQueue {
    fn list_queue(&mut self) -> Result<Vec<QueueItem>, RemoteError> {
        if self.roll(self.fetch_failure_rate) {
            return Err(RemoteError::Unavailable("list timed out".to_string()));
        }
        Ok(self.live.iter().map(queue_item).collect())
    }

    fn delete_queue_item(&mut self, id: &str) -> Result<(), RemoteError> {
        *self.delete_calls.entry(id.to_string()).or_insert(0) += 1;

        if self.forced_delete_failures.remove(id) || self.roll(self.delete_failure_rate) {
            return Err(RemoteError::Unavailable(format!("delete of '{}' timed out", id)));
        }

        let Some(idx) = self.live.iter().position(|record| record.id == id) else {
            return Err(RemoteError::NotFound(id.to_string()));
        };
        let mut record = self.live.remove(idx);
        record.status = "resolved".to_string();
        debug!(item = %id, "queue item deleted");
        self.archived.insert(record.id.clone(), record);
        Ok(())
    }

    fn create_queue_item(
        &mut self,
        transcript: &Transcript,
        lines: &[TimestampedLine],
    ) -> Result<CreateOutcome, RemoteError> {
        let text = normalize(&transcript.text);
        if text.is_empty() {
            return Err(RemoteError::Rejected("transcript text is empty".to_string()));
        }

        let created_id = self.allocate_id();
        let duplicate = self
            .live
            .iter()
            .find(|record| normalize(&record.message) == text)
            .map(|record| record.id.clone());

        if let Some(existing) = duplicate {
            return Ok(CreateOutcome {
                notice: Some(format!(
                    "call {} matches {} already in the queue; not enqueued",
                    created_id, existing
                )),
                created_id,
                enqueued: false,
                duplicate_of: Some(existing),
            });
        }

        let triage = classify(&text);
        let (date, time) = split_timestamp(&transcript.time);
        self.live.push(IncidentDetail {
            id: created_id.clone(),
            incident_type: triage.incident_type.to_string(),
            location: transcript.location.replace(' ', "").to_uppercase(),
            date,
            time,
            duration: transcript.duration.clone(),
            message: transcript.text.clone(),
            desc: format!("{} reported", triage.incident_type),
            suggested_actions: triage.suggested_action.to_string(),
            status: "in progress".to_string(),
            severity_level: triage.severity.to_string(),
            transcript: lines.to_vec(),
        });

        Ok(CreateOutcome {
            created_id,
            enqueued: true,
            duplicate_of: None,
            notice: None,
        })
    }

    fn fetch_incident_detail(&mut self, id: &str) -> Result<IncidentDetail, RemoteError> {
        self.live
            .iter()
            .find(|record| record.id == id)
            .or_else(|| self.archived.get(id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }
}

fn queue_item(record: &IncidentDetail) -> QueueItem {
    QueueItem {
        id: record.id.clone(),
        incident_type: record.incident_type.clone(),
        location: record.location.clone(),
        time: record.time.clone(),
        severity_level: record.severity_level.clone(),
        suggested_actions: record.suggested_actions.clone(),
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct Triage {
    incident_type: &'static str,
    severity: &'static str,
    suggested_action: &'static str,
}

fn classify(text: &str) -> Triage {
    let has = |word: &str| text.contains(word);
    let (incident_type, severity, suggested_action) = if has("fire") || has("smoke") {
        ("Fire", "1", "dispatch firefighters")
    } else if has("gun") || has("robb") {
        ("Armed Robbery", "1", "dispatch officer")
    } else if has("broke") || has("break") {
        ("Break In", "2", "dispatch officer")
    } else if has("car") && has("stolen") {
        ("Car Theft", "3", "dispatch officer")
    } else if has("wallet") || has("stolen") {
        ("Theft", "3", "ask for more details")
    } else if has("loud") || has("noise") || has("music") {
        ("Public Nuisance", "3", "console")
    } else {
        ("Other", "2", "ask for more details")
    };
    Triage {
        incident_type,
        severity,
        suggested_action,
    }
}

/// `2026-01-10T09:15:00Z` becomes (`01/10/2026`, `09:15`). Anything else is
/// kept as the time with an empty date.
fn split_timestamp(raw: &str) -> (String, String) {
    let Some((date, time)) = raw.split_once('T') else {
        return (String::new(), raw.to_string());
    };
    let parts: Vec<&str> = date.split('-').collect();
    let date = match parts.as_slice() {
        [year, month, day] => format!("{}/{}/{}", month, day, year),
        _ => date.to_string(),
    };
    let time = time.get(..5).unwrap_or(time).to_string();
    (date, time)
}
