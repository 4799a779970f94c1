use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Category of controls hidden from unprivileged viewers.
pub const ADMIN_CONTROL: &str = "admin";
pub const READ_ONLY_CONTROL: &str = "read-only";

/// A remote action a probe can run against one of its nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub human: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(default)]
    pub rank: i32,
}

impl Control {
    pub fn is_admin(&self) -> bool {
        self.category == ADMIN_CONTROL
    }
}

/// Registry of the controls a topology offers, keyed by control ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Controls(BTreeMap<String, Control>);

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Control> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.0.values()
    }

    pub fn add_control(&mut self, control: Control) {
        self.0.insert(control.id.clone(), control);
    }

    pub fn add_controls(&mut self, controls: impl IntoIterator<Item = Control>) {
        for control in controls {
            self.add_control(control);
        }
    }

    /// Copy to mutate without touching a registry shared with a report.
    pub fn copy(&self) -> Controls {
        self.clone()
    }

    /// The registry with more entries is the base and the other one is laid
    /// over it, so on an ID collision the smaller side's definition is kept.
    /// With equal sizes `self` is the base.
    pub fn merge(&self, other: &Controls) -> Controls {
        let (base, overlay) = if other.len() > self.len() {
            (other, self)
        } else {
            (self, other)
        };
        if overlay.is_empty() {
            return base.clone();
        }
        let mut result = base.copy();
        for (id, control) in &overlay.0 {
            result.0.insert(id.clone(), control.clone());
        }
        result
    }

    pub fn disable_admin_controls(&self) -> Controls {
        Controls(
            self.0
                .iter()
                .filter(|(_, c)| !c.is_admin())
                .map(|(id, c)| (id.clone(), c.clone()))
                .collect(),
        )
    }
}

impl FromIterator<Control> for Controls {
    fn from_iter<I: IntoIterator<Item = Control>>(iter: I) -> Self {
        let mut controls = Controls::new();
        controls.add_controls(iter);
        controls
    }
}

/// Per-node control state; `dead` once the target can no longer be acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeControlData {
    pub dead: bool,
}

/// Aggregator to probe: run `control` against `node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub request_id: String,
    pub node_id: String,
    pub control: String,
}

/// Probe to aggregator: outcome of a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlReply {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    NotFound {
        reason: String,
    },
    Denied {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

/// Successful control execution as seen by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum ControlError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("control {0} requires confirmation")]
    ConfirmationRequired(String),
    #[error("probe {0} is not connected")]
    ProbeUnavailable(String),
    #[error("control timed out after {0} ms")]
    Timeout(u64),
    #[error("control failed: {0}")]
    Failed(String),
}

impl ControlError {
    /// Whether the failure means the target resource is gone.
    pub fn is_target_gone(&self) -> bool {
        matches!(self, ControlError::NotFound(_))
    }
}

impl ControlReply {
    pub fn into_result(self) -> Result<ControlOutput, ControlError> {
        match self {
            ControlReply::Ok { output } => Ok(ControlOutput { output }),
            ControlReply::NotFound { reason } => Err(ControlError::NotFound(reason)),
            ControlReply::Denied { reason } => Err(ControlError::Denied(reason)),
            ControlReply::Failed { reason } => Err(ControlError::Failed(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(id: &str, category: &str) -> Control {
        Control {
            id: id.to_string(),
            human: id.to_string(),
            category: category.to_string(),
            icon: "fa fa-cog".to_string(),
            confirmation: None,
            rank: 0,
        }
    }

    #[test]
    fn disable_admin_controls_returns_filtered_copy() {
        let controls: Controls = [control("delete", ADMIN_CONTROL), control("logs", "")]
            .into_iter()
            .collect();

        let mut filtered = controls.disable_admin_controls();

        assert!(filtered.get("logs").is_some());
        assert!(filtered.get("delete").is_none());
        assert_eq!(controls.len(), 2);

        filtered.add_control(control("describe", ""));
        assert!(controls.get("describe").is_none());
        assert!(controls.get("delete").is_some());
    }

    #[test]
    fn merge_overlays_smaller_registry() {
        let mut renamed = control("logs", "");
        renamed.human = "Tail logs".to_string();
        let large: Controls = [control("logs", ""), control("delete", ADMIN_CONTROL)]
            .into_iter()
            .collect();
        let small: Controls = [renamed.clone()].into_iter().collect();

        let merged = large.merge(&small);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("logs"), Some(&renamed));
        assert_eq!(small.merge(&large), merged);
    }

    #[test]
    fn merge_with_empty_side_keeps_entries() {
        let controls: Controls = [control("logs", "")].into_iter().collect();
        assert_eq!(controls.merge(&Controls::new()), controls);
        assert_eq!(Controls::new().merge(&controls), controls);
    }

    #[test]
    fn copy_is_independent() {
        let original: Controls = [control("logs", "")].into_iter().collect();
        let mut copy = original.copy();
        copy.add_control(control("delete", ADMIN_CONTROL));
        assert_eq!(original.len(), 1);
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn reply_converts_to_result() {
        let ok = ControlReply::Ok {
            output: Some("done".to_string()),
        }
        .into_result();
        assert_eq!(ok.unwrap().output.as_deref(), Some("done"));

        let gone = ControlReply::NotFound {
            reason: "pod gone".to_string(),
        }
        .into_result();
        assert!(gone.unwrap_err().is_target_gone());
    }
}
