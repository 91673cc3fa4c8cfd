//! Typed onboarding state, persisted under `metadata.onboarding` of a user
//! (individual dialog) or a chat (group dialog).
//!
//! Everything the state machines need lives in this struct, so a restart in
//! the middle of a dialog resumes from whatever was last persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key the state is stored under.
pub const ONBOARDING_KEY: &str = "onboarding";

/// Current schema version written by this build.
pub const ONBOARDING_SCHEMA_VERSION: u32 = 1;

/// Chat metadata key holding the details collected by group onboarding.
pub const GROUP_INFO_KEY: &str = "group_info";

/// One configured onboarding field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Literal question text (group dialogs). Generated from the description
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

fn default_required() -> bool {
    true
}

impl FieldDefinition {
    /// The question to ask for this field when no generated prompt is available.
    pub fn fallback_question(&self) -> String {
        match &self.question {
            Some(q) if !q.trim().is_empty() => q.clone(),
            _ => format!("Could you tell me your {}?", self.description.trim_end_matches('.')),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingState {
    pub version: u32,
    pub in_progress: bool,
    pub completed: bool,
    /// Ordered queue of field ids still to collect.
    pub fields_pending: Vec<String>,
    pub fields_collected: BTreeMap<String, String>,
    /// Snapshot of the configured fields at start.
    pub field_definitions: BTreeMap<String, FieldDefinition>,
    /// Configured field order at start (maps have no order).
    pub field_order: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self {
            version: ONBOARDING_SCHEMA_VERSION,
            in_progress: false,
            completed: false,
            fields_pending: Vec::new(),
            fields_collected: BTreeMap::new(),
            field_definitions: BTreeMap::new(),
            field_order: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }
}

impl OnboardingState {
    /// Begin a dialog, snapshotting the configured fields.
    pub fn start(fields: &[FieldDefinition], now: DateTime<Utc>) -> Self {
        let field_order: Vec<String> = fields.iter().map(|f| f.id.clone()).collect();
        Self {
            version: ONBOARDING_SCHEMA_VERSION,
            in_progress: true,
            completed: false,
            fields_pending: field_order.clone(),
            fields_collected: BTreeMap::new(),
            field_definitions: fields.iter().map(|f| (f.id.clone(), f.clone())).collect(),
            field_order,
            started_at: Some(now),
            completed_at: None,
        }
    }

    /// Fill in a missing snapshot from the current configuration. Only
    /// records written before snapshots existed need this.
    pub fn ensure_definitions(&mut self, fields: &[FieldDefinition]) {
        if !self.field_definitions.is_empty() {
            return;
        }
        self.field_definitions = fields.iter().map(|f| (f.id.clone(), f.clone())).collect();
        self.field_order = fields.iter().map(|f| f.id.clone()).collect();
    }

    /// In progress and not yet completed.
    pub fn is_active(&self) -> bool {
        self.in_progress && !self.completed
    }

    /// Definition of the field at the head of the pending queue.
    pub fn head(&self) -> Option<&FieldDefinition> {
        self.fields_pending
            .first()
            .and_then(|id| self.field_definitions.get(id))
    }

    /// Accept `answer` verbatim for the head pending field and pop it.
    /// Returns the field id that was answered.
    pub fn accept_answer(&mut self, answer: &str) -> Option<String> {
        if self.fields_pending.is_empty() {
            return None;
        }
        let id = self.fields_pending.remove(0);
        self.fields_collected
            .insert(id.clone(), answer.trim().to_string());
        Some(id)
    }

    /// Fold freshly extracted values in. Empty values are ignored and values
    /// collected earlier survive when the new extraction omits them. The
    /// pending queue is rebuilt from the snapshot order.
    pub fn absorb_extracted(&mut self, values: &BTreeMap<String, String>) {
        for (id, value) in values {
            let value = value.trim();
            if value.is_empty() || !self.field_definitions.contains_key(id) {
                continue;
            }
            self.fields_collected.insert(id.clone(), value.to_string());
        }
        self.fields_pending = self
            .ordered_ids()
            .into_iter()
            .filter(|id| !self.has_value(id))
            .collect();
    }

    /// Required fields with no non-empty value, in configured order.
    pub fn missing_required(&self) -> Vec<&FieldDefinition> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|id| self.field_definitions.get(&id))
            .filter(|def| def.required && !self.has_value(&def.id))
            .collect()
    }

    /// Every field (required or not) with no value, in configured order.
    pub fn missing_fields(&self) -> Vec<&FieldDefinition> {
        self.fields_pending
            .iter()
            .filter_map(|id| self.field_definitions.get(id))
            .collect()
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.completed = true;
        self.in_progress = false;
        self.completed_at = Some(now);
    }

    fn has_value(&self, id: &str) -> bool {
        self.fields_collected
            .get(id)
            .is_some_and(|v| !v.trim().is_empty())
    }

    fn ordered_ids(&self) -> Vec<String> {
        if self.field_order.is_empty() {
            self.field_definitions.keys().cloned().collect()
        } else {
            self.field_order.clone()
        }
    }
}
