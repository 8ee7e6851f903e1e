//! Sub-operation extraction
//!
//! One logical operation may decompose into several broker sub-actions whose
//! outcomes are nested under action-specific keys of the `details` map. This
//! module digs out the one outcome a tracked step cares about.

use harbor_core::domain::action::ActionKey;
use harbor_core::domain::broker::RawOperationResult;
use harbor_core::domain::operation::OperationOutcome;
use serde_json::Value;

/// Result of looking for a sub-action's outcome in a broker result
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The outcome is not there (yet)
    ///
    /// `broker_finished` is set when the broker already reports a terminal
    /// state, i.e. the key may never appear. Deciding how long to keep
    /// waiting in that case is left to the poller.
    NotYetAvailable { broker_finished: bool },
    /// The sub-action's outcome
    Available(OperationOutcome),
}

/// Extracts the outcome reported under `key`
///
/// While the broker still reports the operation as running, nothing is
/// extracted even if some details are already present. A value that is
/// present but not shaped like `{code, body}` counts as absent.
pub fn extract(raw: &RawOperationResult, key: &ActionKey) -> Extraction {
    let broker_finished = raw.is_finished();
    if !broker_finished {
        return Extraction::NotYetAvailable {
            broker_finished: false,
        };
    }

    let outcome = raw
        .details
        .get(&key.detail)
        .and_then(|detail| match &key.entry {
            Some(entry) => detail.get(entry).and_then(parse_outcome),
            None => parse_outcome(detail).or_else(|| first_outcome(detail)),
        });

    match outcome {
        Some(outcome) => Extraction::Available(outcome),
        None => Extraction::NotYetAvailable { broker_finished },
    }
}

/// Reads a `{code, body}` pair; codes may be numbers or numeric strings
fn parse_outcome(value: &Value) -> Option<OperationOutcome> {
    let code = match value.get("code")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    // Informational codes are never a final outcome
    if !(200..=599).contains(&code) {
        return None;
    }

    let body = value.get("body").cloned().unwrap_or(Value::Null);
    Some(OperationOutcome::new(code as u16, body))
}

/// First nested `{code, body}` pair of a grouped detail
fn first_outcome(detail: &Value) -> Option<OperationOutcome> {
    detail.as_object()?.values().find_map(parse_outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawOperationResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_running_operation_is_not_available() {
        let result = raw(json!({
            "operation": { "state": "running" },
            "details": { "post_project_clusterA": { "code": 201, "body": {} } }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("post_project_clusterA")),
            Extraction::NotYetAvailable {
                broker_finished: false
            }
        );
    }

    #[test]
    fn test_missing_operation_block_is_not_available() {
        let result = raw(json!({ "details": {} }));
        assert_eq!(
            extract(&result, &ActionKey::new("post_project_clusterA")),
            Extraction::NotYetAvailable {
                broker_finished: false
            }
        );
    }

    #[test]
    fn test_terminal_without_key_reports_broker_finished() {
        let result = raw(json!({ "operation": { "state": "success" }, "details": {} }));
        assert_eq!(
            extract(&result, &ActionKey::new("post_project_clusterA")),
            Extraction::NotYetAvailable {
                broker_finished: true
            }
        );
    }

    #[test]
    fn test_direct_outcome() {
        let result = raw(json!({
            "operation": { "state": "success" },
            "details": {
                "post_project_clusterA": { "code": 201, "body": { "metadata": { "name": "demo" } } }
            }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("post_project_clusterA")),
            Extraction::Available(OperationOutcome::new(
                201,
                json!({ "metadata": { "name": "demo" } })
            ))
        );
    }

    #[test]
    fn test_named_nested_outcome() {
        let result = raw(json!({
            "operation": { "state": "success" },
            "details": {
                "post_rolebinding_clusterA": {
                    "User-bob-view": { "code": 500, "body": {} },
                    "User-alice-edit": { "code": 200, "body": { "kind": "RoleBinding" } }
                }
            }
        }));
        let key = ActionKey::new("post_rolebinding_clusterA").with_entry("User-alice-edit");
        assert_eq!(
            extract(&result, &key),
            Extraction::Available(OperationOutcome::new(200, json!({ "kind": "RoleBinding" })))
        );

        let missing = ActionKey::new("post_rolebinding_clusterA").with_entry("User-carol-edit");
        assert_eq!(
            extract(&result, &missing),
            Extraction::NotYetAvailable {
                broker_finished: true
            }
        );
    }

    #[test]
    fn test_unnamed_nested_outcome_takes_first_value() {
        let result = raw(json!({
            "operation": { "state": "failure" },
            "details": {
                "delete_project_clusterA": { "demo": { "code": "404", "body": { "reason": "NotFound" } } }
            }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("delete_project_clusterA")),
            Extraction::Available(OperationOutcome::new(404, json!({ "reason": "NotFound" })))
        );
    }

    #[test]
    fn test_malformed_detail_counts_as_absent() {
        let result = raw(json!({
            "operation": { "state": "success" },
            "details": { "post_project_clusterA": { "code": "created" } }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("post_project_clusterA")),
            Extraction::NotYetAvailable {
                broker_finished: true
            }
        );
    }

    #[test]
    fn test_informational_code_counts_as_absent() {
        let result = raw(json!({
            "operation": { "state": "success" },
            "details": { "delete_project_clusterA": { "code": 102, "body": {} } }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("delete_project_clusterA")),
            Extraction::NotYetAvailable {
                broker_finished: true
            }
        );
    }

    #[test]
    fn test_missing_body_is_null() {
        let result = raw(json!({
            "operation": { "state": "success" },
            "details": { "delete_project_clusterA": { "code": 200 } }
        }));
        assert_eq!(
            extract(&result, &ActionKey::new("delete_project_clusterA")),
            Extraction::Available(OperationOutcome::new(200, Value::Null))
        );
    }
}
