//! # Liveness policy.
//!
//! The overall probe is an OR across reactors: the process is healthy as
//! long as *some* reactor succeeded within the freshness window, or no
//! reactor has executed anything yet (fresh start). One stuck pipeline
//! among healthy ones does not fail the probe — reactors that are idle by
//! design must not drain a whole fleet. Per-reactor health belongs to the
//! log stream, not this endpoint.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::reactors::Reactor;

/// Read-only snapshot handle over the registered reactors.
#[derive(Clone)]
pub struct HealthView {
    reactors: Arc<Vec<Arc<Reactor>>>,
}

impl HealthView {
    pub fn new(reactors: Vec<Arc<Reactor>>) -> Self {
        Self {
            reactors: Arc::new(reactors),
        }
    }

    /// True iff no reactor has recorded any execution, or some reactor's
    /// last success is fresher than `threshold`.
    pub fn healthy(&self, threshold: Duration) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut any_recorded = false;
        for r in self.reactors.iter() {
            if !r.has_executed() {
                continue;
            }
            any_recorded = true;
            let last = r.last_success_epoch();
            if last > 0 && now - last < threshold.as_secs() as i64 {
                return true;
            }
        }
        !any_recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReactorConfig;

    fn reactor(label: &str) -> Arc<Reactor> {
        Reactor::new(
            1,
            ReactorConfig {
                label: label.into(),
                command: "true".into(),
                args: Vec::new(),
                concurrent: 1,
                conditions: Vec::new(),
            },
        )
        .unwrap()
    }

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn fresh_start_is_healthy() {
        let view = HealthView::new(vec![reactor("a"), reactor("b")]);
        assert!(view.healthy(DAY));
    }

    #[test]
    fn no_reactors_is_healthy() {
        let view = HealthView::new(Vec::new());
        assert!(view.healthy(DAY));
    }

    #[test]
    fn recent_success_is_healthy() {
        let r = reactor("a");
        r.mark_success();
        let view = HealthView::new(vec![r]);
        assert!(view.healthy(DAY));
    }

    #[test]
    fn only_errors_is_unhealthy() {
        let r = reactor("a");
        r.mark_error();
        let view = HealthView::new(vec![r]);
        assert!(!view.healthy(DAY));
    }

    #[test]
    fn one_fresh_reactor_carries_the_probe() {
        let stuck = reactor("stuck");
        stuck.mark_error();
        let fresh = reactor("fresh");
        fresh.mark_success();
        let idle = reactor("idle"); // never executed, ignored

        let view = HealthView::new(vec![stuck, fresh, idle]);
        assert!(view.healthy(DAY));
    }

    #[test]
    fn stale_success_is_unhealthy_under_tight_threshold() {
        let r = reactor("a");
        r.mark_success();
        let view = HealthView::new(vec![r]);
        // A zero-width window excludes even a just-now success.
        assert!(!view.healthy(Duration::ZERO));
    }
}
