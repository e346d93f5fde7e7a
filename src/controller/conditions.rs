//! Condition management helpers following Kubernetes API conventions

use crate::crd::Condition;

/// Condition owned by this operator on SeldonDeployment status
pub const CONDITION_TYPE_INGRESS_READY: &str = "IngressReady";

pub const REASON_INGRESS_RECONCILED: &str = "IngressReconciled";
pub const REASON_INGRESS_DISABLED: &str = "IngressDisabled";
pub const REASON_NO_PREDICTORS: &str = "NoPredictors";
pub const REASON_INGRESS_FAILED: &str = "IngressFailed";

/// Update or add a condition to the conditions list.
///
/// The transition time of an existing condition is only bumped when its status
/// changes. Returns whether anything other than the timestamp changed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            let changed = existing.status != condition.status
                || existing.reason != condition.reason
                || existing.message != condition.message
                || existing.observed_generation != condition.observed_generation;
            if existing.status != condition.status {
                existing.last_transition_time = condition.last_transition_time;
            }
            existing.status = condition.status;
            existing.reason = condition.reason;
            existing.message = condition.message;
            existing.observed_generation = condition.observed_generation;
            changed
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

/// Create an IngressReady=True condition
pub fn ingress_ready_condition(reason: &str, message: &str) -> Condition {
    Condition::new(CONDITION_TYPE_INGRESS_READY, true, reason, message)
}

/// Create an IngressReady=False condition
pub fn ingress_not_ready_condition(reason: &str, message: &str) -> Condition {
    Condition::new(CONDITION_TYPE_INGRESS_READY, false, reason, message)
}
