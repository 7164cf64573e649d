use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::models::IncidentDetail;
use crate::remote::{QueueService, RemoteError};

pub const MAX_SUPPRESSED_NOTICES: usize = 50;

/// A create call the queue service declined as a near-duplicate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SuppressedNotice {
    pub id: String,
    pub duplicate_of: Option<String>,
    pub message: String,
    pub at_ms: u64,
}

/// What the human operator sees and does next to the automatic pool:
/// the selected queue item, a dismissible error banner, the list of
/// suppressed duplicate notices and cached incident details.
#[derive(Clone, Debug, Default)]
pub struct OperatorConsole {
    selected: Option<String>,
    error: Option<String>,
    resolving: bool,
    notices: VecDeque<SuppressedNotice>,
    details: HashMap<String, IncidentDetail>,
}

impl OperatorConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn select(&mut self, id: &str) {
        self.selected = Some(id.to_string());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn set_resolving(&mut self, resolving: bool) {
        self.resolving = resolving;
    }

    /// Newest first, capped, one entry per id. Returns false for an id that
    /// is already listed.
    pub fn record_suppressed(&mut self, notice: SuppressedNotice) -> bool {
        if self.notices.iter().any(|existing| existing.id == notice.id) {
            return false;
        }
        self.notices.push_front(notice);
        self.notices.truncate(MAX_SUPPRESSED_NOTICES);
        true
    }

    pub fn suppressed(&self) -> impl Iterator<Item = &SuppressedNotice> {
        self.notices.iter()
    }

    pub fn suppressed_count(&self) -> usize {
        self.notices.len()
    }

    pub fn cached_detail(&self, id: &str) -> Option<&IncidentDetail> {
        self.details.get(id)
    }

    pub fn load_detail(
        &mut self,
        id: &str,
        service: &mut dyn QueueService,
    ) -> Result<&IncidentDetail, RemoteError> {
        if !self.details.contains_key(id) {
            let detail = service.fetch_incident_detail(id)?;
            debug!(item = %id, "incident detail cached");
            self.details.insert(id.to_string(), detail);
        }
        self.details
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    pub fn invalidate_detail(&mut self, id: &str) {
        self.details.remove(id);
    }
}
