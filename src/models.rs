use serde::{Deserialize, Serialize};

use crate::duration::HandleTime;
use crate::error::{Error, Result};

/// One simulation run. A new value fully resets the engine.
///
/// Field aliases accept the camelCase keys the dashboard persisted.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub dispatchers: usize,
    #[serde(alias = "incomingCalls")]
    pub incoming_calls: usize,
    #[serde(alias = "handleTime")]
    pub handle_time: HandleTime,
    #[serde(alias = "initialBusyDispatchers")]
    pub initial_busy_dispatchers: usize,
    #[serde(alias = "initialBusyHandleTime")]
    pub initial_busy_handle_time: HandleTime,
    #[serde(alias = "customIncomingCalls")]
    pub custom_incoming_calls: Vec<CustomCall>,
    #[serde(alias = "customCurrentCalls")]
    pub custom_current_calls: Vec<CustomCall>,
    pub seed: Option<u64>,
    pub tick_ms: u64,
    pub duration_ms: u64,
    pub stop_when_idle: bool,
    pub remote: RemoteProfile,
    pub mirror: MirrorProfile,
    pub operator: Vec<OperatorAction>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dispatchers: 5,
            incoming_calls: 10,
            handle_time: HandleTime::ThreeMinutes,
            initial_busy_dispatchers: 0,
            initial_busy_handle_time: HandleTime::OneMinute,
            custom_incoming_calls: Vec::new(),
            custom_current_calls: Vec::new(),
            seed: None,
            tick_ms: 1000,
            duration_ms: 15 * 60 * 1000,
            stop_when_idle: true,
            remote: RemoteProfile::default(),
            mirror: MirrorProfile::default(),
            operator: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dispatchers == 0 {
            return Err(Error::DispatchersZero);
        }
        if self.tick_ms == 0 {
            return Err(Error::InvalidTickPeriod(self.tick_ms));
        }
        if self.duration_ms == 0 {
            return Err(Error::InvalidRunDuration(self.duration_ms));
        }
        if self.mirror.poll_interval_ms == 0 {
            return Err(Error::InvalidPollInterval(self.mirror.poll_interval_ms));
        }
        check_rate("delete_failure_rate", self.remote.delete_failure_rate)?;
        check_rate("fetch_failure_rate", self.remote.fetch_failure_rate)?;

        let custom = self
            .custom_incoming_calls
            .iter()
            .chain(self.custom_current_calls.iter());
        for (idx, call) in custom.enumerate() {
            if call.transcript.text.trim().is_empty() {
                return Err(Error::EmptyCustomCall(idx + 1));
            }
        }

        Ok(())
    }

    pub fn current_call_count(&self) -> usize {
        if self.custom_current_calls.is_empty() {
            self.initial_busy_dispatchers
        } else {
            self.custom_current_calls.len()
        }
    }

    pub fn incoming_call_count(&self) -> usize {
        if self.custom_incoming_calls.is_empty() {
            self.incoming_calls
        } else {
            self.custom_incoming_calls.len()
        }
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidFailureRate { name, value });
    }
    Ok(())
}

/// Latency and failure behavior of the simulated remote queue service.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RemoteProfile {
    pub delete_latency_ms: u64,
    pub fetch_latency_ms: u64,
    pub delete_failure_rate: f64,
    pub fetch_failure_rate: f64,
}

impl Default for RemoteProfile {
    fn default() -> Self {
        Self {
            delete_latency_ms: 250,
            fetch_latency_ms: 100,
            delete_failure_rate: 0.0,
            fetch_failure_rate: 0.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct MirrorProfile {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for MirrorProfile {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

/// A scripted operator action applied at a simulated instant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OperatorAction {
    pub at_ms: u64,
    pub action: OperatorCommand,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorCommand {
    /// Selects the item at this position of the operator-visible queue.
    Select(usize),
    Resolve,
    ClearSelection,
    DismissError,
    /// The dashboard went to the background; mirror polling pauses.
    Hide,
    Show,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub time: String,
    pub location: String,
    pub duration: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CustomCall {
    pub transcript: Transcript,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TimestampedLine {
    pub text: String,
    pub time: String,
}

/// Remote-owned queue record, field names as the queue service emits them.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct QueueItem {
    pub id: String,
    #[serde(rename = "incidentType")]
    pub incident_type: String,
    pub location: String,
    pub time: String,
    pub severity_level: String,
    pub suggested_actions: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IncidentDetail {
    pub id: String,
    #[serde(rename = "incidentType")]
    pub incident_type: String,
    pub location: String,
    pub date: String,
    pub time: String,
    pub duration: String,
    pub message: String,
    pub desc: String,
    pub suggested_actions: String,
    pub status: String,
    pub severity_level: String,
    #[serde(default)]
    pub transcript: Vec<TimestampedLine>,
}

/// A locally seeded call that is already in progress. Never sent to the
/// remote store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentCallSeed {
    pub client_id: String,
    pub transcript: Transcript,
}
