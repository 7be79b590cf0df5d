//! Replay a recorded list of actions against a manager.
//!
//! Failed steps are reported and skipped; the rest of the list still runs.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::HiddenRange;
use crate::manager::{Action, Applied, ColumnCount, ColumnManager, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied: Option<Applied>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a replay produced, plus the final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub steps: Vec<ReplayStep>,
    pub failed: usize,
    pub count: ColumnCount,
    pub details: Vec<HiddenRange>,
    pub layout: String,
    pub snapshot: Snapshot,
}

/// Decode a JSON array of actions.
///
/// # Errors
/// Returns an error if the text is not a JSON array of actions.
pub fn parse_actions(text: &str) -> Result<Vec<Action>> {
    Ok(serde_json::from_str(text)?)
}

pub fn replay(manager: &mut ColumnManager, actions: Vec<Action>) -> ReplayReport {
    let mut steps = Vec::with_capacity(actions.len());
    let mut failed = 0;
    for action in actions {
        let step = match manager.apply(action.clone()) {
            Ok(applied) => ReplayStep {
                action,
                applied: Some(applied),
                error: None,
            },
            Err(e) => {
                failed += 1;
                tracing::warn!(step = steps.len(), error = %e, "action rejected");
                ReplayStep {
                    action,
                    applied: None,
                    error: Some(e.to_string()),
                }
            }
        };
        steps.push(step);
    }
    ReplayReport {
        steps,
        failed,
        count: manager.count(),
        details: manager.details().to_vec(),
        layout: manager.describe(),
        snapshot: manager.snapshot(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;
    use crate::schema::SchemaRecord;

    #[test]
    fn test_replay_reports_failures_and_continues() {
        let actions = parse_actions(
            r#"[
                {"type": "touch", "args": {"view_index": 4}},
                {"type": "untouch", "args": {"count": 50}},
                {"type": "hide", "args": {"view_index": 0, "count": 2}}
            ]"#,
        )
        .unwrap();
        let mut m = ColumnManager::new(|_, _| SchemaRecord::new(), ColumnConfig::default());
        let report = replay(&mut m, actions);
        assert_eq!(report.failed, 1);
        assert!(report.steps[1].error.is_some());
        assert!(report.steps[2].applied.is_some());
        assert_eq!(report.count.hidden, 2);
        assert_eq!(report.layout, "[-1 hide[0, 1], 2+]");
    }

    #[test]
    fn test_parse_actions_rejects_unknown_type() {
        assert!(parse_actions(r#"[{"type": "explode", "args": {}}]"#).is_err());
    }
}
