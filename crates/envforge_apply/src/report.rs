//! Per-resource outcomes and the apply report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use envforge_manifest::{ResourceId, Tier};

/// Lifecycle of one resource during an apply run.
///
/// `Pending -> Applying -> {Applied | Failed}`, with `Applying -> Applying`
/// once per retry. A resource whose dependency did not apply goes straight
/// from `Pending` to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Pending,
    Applying,
    Applied,
    Failed,
    Skipped,
}

impl ResourceState {
    pub fn can_transition_to(&self, next: ResourceState) -> bool {
        use ResourceState::*;
        matches!(
            (self, next),
            (Pending, Applying)
                | (Pending, Skipped)
                | (Applying, Applying)
                | (Applying, Applied)
                | (Applying, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResourceState::Applied | ResourceState::Failed | ResourceState::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Pending => "pending",
            ResourceState::Applying => "applying",
            ResourceState::Applied => "applied",
            ResourceState::Failed => "failed",
            ResourceState::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks and logs the state of one resource.
#[derive(Debug)]
pub(crate) struct StateTracker<'a> {
    id: &'a ResourceId,
    state: ResourceState,
}

impl<'a> StateTracker<'a> {
    pub(crate) fn new(id: &'a ResourceId) -> Self {
        Self {
            id,
            state: ResourceState::Pending,
        }
    }

    pub(crate) fn transition(&mut self, next: ResourceState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {} for {}",
            self.state,
            next,
            self.id
        );
        debug!("{}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

/// Final outcome for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ApplyOutcome {
    Applied,
    Skipped(String),
    Failed(String),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }

    pub fn state(&self) -> ResourceState {
        match self {
            ApplyOutcome::Applied => ResourceState::Applied,
            ApplyOutcome::Skipped(_) => ResourceState::Skipped,
            ApplyOutcome::Failed(_) => ResourceState::Failed,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ApplyOutcome::Applied => None,
            ApplyOutcome::Skipped(reason) | ApplyOutcome::Failed(reason) => Some(reason),
        }
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Applied => write!(f, "applied"),
            ApplyOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            ApplyOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Outcome of applying one resource. Never modified once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyResult {
    pub id: ResourceId,
    pub tier: Tier,
    pub outcome: ApplyOutcome,
    /// Cluster calls made; zero for skipped resources.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// Results of one apply run, in graph order.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub environment: String,
    pub results: Vec<ApplyResult>,
    /// Set when the run was cancelled before every resource was dispatched.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyReport {
    /// Every resource applied and the run was not cancelled.
    pub fn success(&self) -> bool {
        !self.cancelled && self.results.iter().all(|r| r.outcome.is_applied())
    }

    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ApplyOutcome::Failed(_)))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, ApplyOutcome::Skipped(_)))
            .count()
    }

    pub fn result_for(&self, id: &ResourceId) -> Option<&ApplyResult> {
        self.results.iter().find(|r| &r.id == id)
    }

    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.results.iter().position(|r| &r.id == id)
    }

    /// Results that did not apply.
    pub fn failures(&self) -> impl Iterator<Item = &ApplyResult> {
        self.results.iter().filter(|r| !r.outcome.is_applied())
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}: {} applied, {} failed, {} skipped",
            self.environment,
            self.applied_count(),
            self.failed_count(),
            self.skipped_count()
        );
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envforge_manifest::ResourceKind;

    fn result(name: &str, outcome: ApplyOutcome) -> ApplyResult {
        ApplyResult {
            id: ResourceId::namespaced(ResourceKind::Deployment, "dev", name),
            tier: Tier::Workloads,
            outcome,
            attempts: 1,
            duration_ms: 0,
        }
    }

    fn report(results: Vec<ApplyResult>, cancelled: bool) -> ApplyReport {
        ApplyReport {
            environment: "dev".to_string(),
            results,
            cancelled,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_transitions() {
        use ResourceState::*;
        assert!(Pending.can_transition_to(Applying));
        assert!(Applying.can_transition_to(Applying));
        assert!(Applying.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Skipped));
        assert!(!Pending.can_transition_to(Applied));
        assert!(!Applied.can_transition_to(Applying));
        assert!(!Failed.can_transition_to(Applying));
        assert!(Skipped.is_terminal());
        assert!(!Applying.is_terminal());
    }

    #[test]
    fn test_report_success_and_summary() {
        let ok = report(vec![result("web", ApplyOutcome::Applied)], false);
        assert!(ok.success());

        let mixed = report(
            vec![
                result("web", ApplyOutcome::Applied),
                result("api", ApplyOutcome::Failed("forbidden".to_string())),
                result("worker", ApplyOutcome::Skipped("dependency".to_string())),
            ],
            false,
        );
        assert!(!mixed.success());
        assert_eq!(mixed.summary(), "dev: 1 applied, 1 failed, 1 skipped");
        assert_eq!(mixed.failures().count(), 2);

        let cancelled = report(vec![result("web", ApplyOutcome::Applied)], true);
        assert!(!cancelled.success());
        assert!(cancelled.summary().ends_with("(cancelled)"));
    }

    #[test]
    fn test_outcome_state_and_reason() {
        let failed = ApplyOutcome::Failed("forbidden".to_string());
        assert_eq!(failed.state(), ResourceState::Failed);
        assert_eq!(failed.reason(), Some("forbidden"));
        assert_eq!(ApplyOutcome::Applied.reason(), None);
    }
}
