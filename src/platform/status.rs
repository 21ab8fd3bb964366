//! platform::status
//!
//! Aggregation of per-check states into one branch status.

use super::types::{BranchStatus, CheckState, StatusCheck};

/// Combine individual checks into one [`BranchStatus`].
///
/// Checks whose context starts with `internal_prefix` were created by the
/// bot itself. With `internal_checks_as_success` they count as passing
/// whatever their state, so the bot's own pending check cannot block it.
/// Without it, a branch carrying only internal checks is never green.
///
/// - No checks at all: yellow
/// - Any failure or error: red
/// - Any pending: yellow
/// - Otherwise: green
///
/// # Example
///
/// ```
/// use depbot::platform::{aggregate_branch_status, BranchStatus, CheckState, StatusCheck};
///
/// let checks = vec![
///     StatusCheck::new("ci/test", CheckState::Success),
///     StatusCheck::new("depbot/stability-days", CheckState::Pending),
/// ];
/// assert_eq!(aggregate_branch_status(&checks, true, "depbot/"), BranchStatus::Green);
/// assert_eq!(aggregate_branch_status(&checks, false, "depbot/"), BranchStatus::Yellow);
/// ```
pub fn aggregate_branch_status(
    checks: &[StatusCheck],
    internal_checks_as_success: bool,
    internal_prefix: &str,
) -> BranchStatus {
    if checks.is_empty() {
        return BranchStatus::Yellow;
    }

    let is_internal = |c: &StatusCheck| c.context.starts_with(internal_prefix);

    let effective: Vec<CheckState> = checks
        .iter()
        .map(|c| {
            if internal_checks_as_success && is_internal(c) {
                CheckState::Success
            } else {
                c.state
            }
        })
        .collect();

    if effective
        .iter()
        .any(|s| matches!(s, CheckState::Failure | CheckState::Error))
    {
        return BranchStatus::Red;
    }

    if !internal_checks_as_success && checks.iter().all(is_internal) {
        return BranchStatus::Yellow;
    }

    if effective.iter().any(|s| *s == CheckState::Pending) {
        return BranchStatus::Yellow;
    }

    BranchStatus::Green
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(context: &str, state: CheckState) -> StatusCheck {
        StatusCheck::new(context, state)
    }

    #[test]
    fn empty_is_yellow() {
        assert_eq!(aggregate_branch_status(&[], true, "depbot/"), BranchStatus::Yellow);
    }

    #[test]
    fn any_failure_is_red() {
        let checks = [
            check("ci/lint", CheckState::Success),
            check("ci/test", CheckState::Error),
        ];
        assert_eq!(aggregate_branch_status(&checks, true, "depbot/"), BranchStatus::Red);
    }

    #[test]
    fn internal_failure_ignored_when_treated_as_success() {
        let checks = [
            check("ci/test", CheckState::Success),
            check("depbot/merge-confidence", CheckState::Failure),
        ];
        assert_eq!(aggregate_branch_status(&checks, true, "depbot/"), BranchStatus::Green);
        assert_eq!(aggregate_branch_status(&checks, false, "depbot/"), BranchStatus::Red);
    }

    #[test]
    fn only_internal_checks_never_green_without_flag() {
        let checks = [check("depbot/stability-days", CheckState::Success)];
        assert_eq!(aggregate_branch_status(&checks, false, "depbot/"), BranchStatus::Yellow);
        assert_eq!(aggregate_branch_status(&checks, true, "depbot/"), BranchStatus::Green);
    }

    #[test]
    fn skipped_counts_as_passing() {
        let checks = [
            check("ci/test", CheckState::Success),
            check("ci/optional", CheckState::Skipped),
        ];
        assert_eq!(aggregate_branch_status(&checks, false, "depbot/"), BranchStatus::Green);
    }
}
