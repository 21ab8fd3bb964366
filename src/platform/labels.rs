//! platform::labels
//!
//! Label reconciliation for PR updates.
//!
//! Callers either hand over the full desired label set or incremental
//! add/remove lists. Adapters turn whichever arrives into the primitive
//! their provider exposes: a full replacement or individual add/remove calls.

use std::collections::BTreeSet;

/// Requested label change for a PR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelUpdate {
    /// The PR should carry exactly these labels.
    Replace(Vec<String>),
    /// Add and remove individual labels, leaving others alone.
    Incremental { add: Vec<String>, remove: Vec<String> },
}

/// Concrete label operations derived from a [`LabelUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    /// Labels to add, sorted.
    pub add: Vec<String>,
    /// Labels to remove, sorted.
    pub remove: Vec<String>,
    /// Final label set, sorted.
    pub desired: Vec<String>,
}

impl LabelPlan {
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Work out the label operations that turn `current` into what `update` asks for.
///
/// A label listed in both `add` and `remove` is added.
///
/// # Example
///
/// ```
/// use depbot::platform::{reconcile_labels, LabelUpdate};
///
/// let current = vec!["deps".to_string(), "stale".to_string()];
/// let plan = reconcile_labels(
///     &current,
///     &LabelUpdate::Replace(vec!["deps".into(), "major".into()]),
/// );
/// assert_eq!(plan.add, vec!["major"]);
/// assert_eq!(plan.remove, vec!["stale"]);
/// assert_eq!(plan.desired, vec!["deps", "major"]);
/// ```
pub fn reconcile_labels(current: &[String], update: &LabelUpdate) -> LabelPlan {
    let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();

    let desired: BTreeSet<&str> = match update {
        LabelUpdate::Replace(labels) => labels.iter().map(String::as_str).collect(),
        LabelUpdate::Incremental { add, remove } => {
            let add: BTreeSet<&str> = add.iter().map(String::as_str).collect();
            current
                .iter()
                .copied()
                .filter(|l| !remove.iter().any(|r| r == l))
                .chain(add)
                .collect()
        }
    };

    LabelPlan {
        add: desired.difference(&current).map(|s| s.to_string()).collect(),
        remove: current.difference(&desired).map(|s| s.to_string()).collect(),
        desired: desired.iter().map(|s| s.to_string()).collect(),
    }
}
