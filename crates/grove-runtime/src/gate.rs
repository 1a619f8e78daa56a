//! Visibility gate: defers engine work while the scene is not observable.

use crate::engine::{PopulationEngine, ReconcileOutcome};
use crate::scene::Scene;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
struct PendingTarget {
    target: u32,
    label: String,
}

/// Wraps the engine; requests made while hidden are coalesced to the latest.
#[derive(Debug)]
pub struct VisibilityGate {
    engine: PopulationEngine,
    visible: bool,
    pending: Option<PendingTarget>,
}

impl VisibilityGate {
    /// Starts visible.
    pub fn new(engine: PopulationEngine) -> Self {
        Self {
            engine,
            visible: true,
            pending: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Latest target held back while hidden.
    pub fn pending_target(&self) -> Option<u32> {
        self.pending.as_ref().map(|p| p.target)
    }

    pub fn engine(&self) -> &PopulationEngine {
        &self.engine
    }

    /// Reconcile now if visible; otherwise remember only this latest target.
    pub fn request<S: Scene + ?Sized>(
        &mut self,
        target: u32,
        label: &str,
        scene: &mut S,
    ) -> Option<ReconcileOutcome> {
        if self.visible {
            return Some(self.engine.reconcile(target, label, scene));
        }
        if let Some(prev) = &self.pending {
            debug!(superseded = prev.target, requested = target, "pending target coalesced");
        }
        self.pending = Some(PendingTarget {
            target,
            label: label.to_string(),
        });
        None
    }

    /// Flip observability. Becoming visible applies the pending target at once.
    pub fn set_visible<S: Scene + ?Sized>(
        &mut self,
        visible: bool,
        scene: &mut S,
    ) -> Option<ReconcileOutcome> {
        if visible == self.visible {
            return None;
        }
        self.visible = visible;
        if !visible {
            self.engine.suspend();
            debug!("scene hidden; engine suspended");
            return None;
        }
        self.engine.resume();
        debug!(pending = ?self.pending_target(), "scene visible; engine resumed");
        self.pending
            .take()
            .map(|p| self.engine.reconcile(p.target, &p.label, scene))
    }

    /// Drive the engine clock; frozen while hidden.
    pub fn advance<S: Scene + ?Sized>(&mut self, elapsed_ms: u64, scene: &mut S) -> usize {
        if !self.visible {
            return 0;
        }
        self.engine.advance(elapsed_ms, scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::PopulationPhase;
    use crate::scene::RecordingScene;

    fn gate() -> VisibilityGate {
        VisibilityGate::new(PopulationEngine::new(EngineConfig::default()).unwrap())
    }

    #[test]
    fn visible_gate_passes_through() {
        let mut g = gate();
        let mut scene = RecordingScene::new();
        assert!(g.request(4, "Jan", &mut scene).is_some());
        assert_eq!(scene.spawn_count(), 4);
    }

    #[test]
    fn hidden_requests_coalesce_to_latest() {
        let mut g = gate();
        let mut scene = RecordingScene::new();
        g.set_visible(false, &mut scene);
        assert_eq!(g.engine().phase(), PopulationPhase::Idle);
        assert!(g.request(3, "Jan", &mut scene).is_none());
        assert!(g.request(7, "Feb", &mut scene).is_none());
        assert!(g.request(5, "Mar", &mut scene).is_none());
        assert_eq!(scene.spawn_count(), 0);
        assert_eq!(g.pending_target(), Some(5));

        let out = g.set_visible(true, &mut scene);
        assert!(out.is_some());
        assert_eq!(g.pending_target(), None);
        assert_eq!(scene.spawn_count(), 5);
        assert!(scene.spawned().all(|(u, _)| u.label == "Mar"));
    }

    #[test]
    fn hidden_gate_freezes_animation() {
        let mut g = gate();
        let mut scene = RecordingScene::new();
        g.request(1, "Jan", &mut scene);
        g.set_visible(false, &mut scene);
        assert_eq!(g.advance(5_000, &mut scene), 0);
        assert!(g.set_visible(true, &mut scene).is_none());
        assert_eq!(g.advance(5_000, &mut scene), 20);
    }
}
