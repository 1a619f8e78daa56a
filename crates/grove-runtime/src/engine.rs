//! Population engine: reconciles the materialized trees against a target.
//!
//! A reconciliation only ever grows the field. Crossing the milestone clears
//! every tree, bumps the epoch and carries the remainder into a fresh cycle.
//! Rise animations are queued on a [`Timeline`]; frames scheduled before a
//! reset carry the old epoch and are dropped when they come due.

use crate::config::{ConfigError, EngineConfig};
use crate::placement::Placer;
use crate::scene::{Position, Scene, Unit, UnitId};
use crate::timeline::Timeline;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopulationPhase {
    /// Output is not observable; animation frames are held.
    Idle,
    /// Rise animations are still pending.
    Reconciling,
    /// Transient: the field is being cleared after a milestone.
    MilestoneReset,
    /// Nothing left to animate.
    Settled,
}

/// Everything the engine remembers besides the scene contents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationState {
    /// Target count of the current cycle, including placements that failed.
    pub materialized_count: u32,
    pub units: Vec<Unit>,
    /// Units absorbed by milestones already consumed.
    pub milestone_carry: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Target already matches the field.
    Unchanged,
    /// Target is below what has been materialized; shrinking is unsupported.
    Ignored { target: u32, floor: u32 },
    Applied {
        spawned: u32,
        /// Units skipped because no free position was found.
        exhausted: u32,
        /// Milestones consumed by this call (0 when no reset fired).
        milestones: u32,
    },
}

#[derive(Debug, Clone, Copy)]
struct LiftFrame {
    epoch: u64,
    unit: UnitId,
    step: u32,
}

#[derive(Debug)]
pub struct PopulationEngine {
    cfg: EngineConfig,
    state: PopulationState,
    placer: Placer,
    timeline: Timeline<LiftFrame>,
    epoch: u64,
    next_id: u64,
    live_frames: usize,
    phase: PopulationPhase,
    suspended: bool,
    milestones: u32,
    stale_dropped: u64,
}

impl PopulationEngine {
    /// Fails if `cfg` does not validate.
    pub fn new(cfg: EngineConfig) -> Result<Self, ConfigError> {
        let placer = Placer::new(&cfg)?;
        Ok(Self {
            cfg,
            state: PopulationState::default(),
            placer,
            timeline: Timeline::new(),
            epoch: 0,
            next_id: 0,
            live_frames: 0,
            phase: PopulationPhase::Settled,
            suspended: false,
            milestones: 0,
            stale_dropped: 0,
        })
    }

    /// Grow the field toward `target`, resetting on a milestone crossing.
    pub fn reconcile<S: Scene + ?Sized>(
        &mut self,
        target: u32,
        label: &str,
        scene: &mut S,
    ) -> ReconcileOutcome {
        let floor = self
            .state
            .milestone_carry
            .saturating_add(self.state.materialized_count);
        if target == floor {
            return ReconcileOutcome::Unchanged;
        }
        if target < floor {
            debug!(requested = target, floor, "shrinking target ignored");
            return ReconcileOutcome::Ignored { target, floor };
        }

        let mut effective = target - self.state.milestone_carry;
        let mut milestones = 0;
        if effective >= self.cfg.milestone {
            milestones = effective / self.cfg.milestone;
            let absorbed = milestones * self.cfg.milestone;
            effective -= absorbed;
            self.state.milestone_carry = self.state.milestone_carry.saturating_add(absorbed);
            self.milestone_reset(milestones, scene);
        }

        let delta = effective - self.state.materialized_count;
        let (spawned, exhausted) = self.spawn_batch(delta, label, scene);
        self.state.materialized_count = effective;
        self.refresh_phase();
        info!(
            requested = target,
            materialized = effective,
            spawned,
            exhausted,
            milestones,
            "population reconciled"
        );
        ReconcileOutcome::Applied {
            spawned,
            exhausted,
            milestones,
        }
    }

    /// Advance the animation clock and apply due lift frames.
    ///
    /// Returns the number of frames applied. Does nothing while suspended.
    pub fn advance<S: Scene + ?Sized>(&mut self, elapsed_ms: u64, scene: &mut S) -> usize {
        if self.suspended {
            return 0;
        }
        self.timeline.advance(elapsed_ms);
        let mut applied = 0;
        while let Some(frame) = self.timeline.pop_due() {
            if frame.epoch != self.epoch {
                self.stale_dropped += 1;
                debug!(unit = frame.unit.0, epoch = frame.epoch, "stale frame dropped");
                continue;
            }
            scene.lift_unit(frame.unit, self.height_at(frame.step));
            self.live_frames = self.live_frames.saturating_sub(1);
            applied += 1;
        }
        self.refresh_phase();
        applied
    }

    /// Hold animation frames until [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspended = true;
        self.phase = PopulationPhase::Idle;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.refresh_phase();
    }

    pub fn phase(&self) -> PopulationPhase {
        self.phase
    }

    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    pub fn materialized_count(&self) -> u32 {
        self.state.materialized_count
    }

    pub fn units(&self) -> &[Unit] {
        &self.state.units
    }

    /// Milestones consumed since creation.
    pub fn milestones(&self) -> u32 {
        self.milestones
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Frames dropped because their epoch was superseded by a reset.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    fn spawn_batch<S: Scene + ?Sized>(
        &mut self,
        count: u32,
        label: &str,
        scene: &mut S,
    ) -> (u32, u32) {
        let mut positions: Vec<Position> = self.state.units.iter().map(|u| u.position).collect();
        let mut spawned = 0u32;
        let mut exhausted = 0u32;
        for _ in 0..count {
            let Some(position) = self.placer.place(&positions) else {
                exhausted += 1;
                warn!(
                    placed = positions.len(),
                    max_attempts = self.cfg.max_attempts,
                    "placement exhausted; unit skipped"
                );
                continue;
            };
            let unit = Unit {
                id: UnitId(self.next_id),
                position,
                spawn_order: self.state.units.len() as u32,
                label: label.to_string(),
            };
            self.next_id += 1;
            let delay_ms = u64::from(spawned) * self.cfg.stagger_ms;
            scene.spawn_unit(&unit, delay_ms);
            self.schedule_rise(unit.id, delay_ms);
            debug!(unit = unit.id.0, x = position.x, z = position.z, delay_ms, "unit spawned");
            positions.push(position);
            self.state.units.push(unit);
            spawned += 1;
        }
        (spawned, exhausted)
    }

    fn schedule_rise(&mut self, unit: UnitId, delay_ms: u64) {
        for step in 1..=self.cfg.rise_steps {
            let at = delay_ms + u64::from(step) * self.cfg.rise_step_ms;
            self.timeline.schedule_in(
                at,
                LiftFrame {
                    epoch: self.epoch,
                    unit,
                    step,
                },
            );
            self.live_frames += 1;
        }
    }

    /// Linear rise from `-rise_depth` to 0 over `rise_steps` frames.
    fn height_at(&self, step: u32) -> f32 {
        let t = step as f32 / self.cfg.rise_steps as f32;
        -self.cfg.rise_depth * (1.0 - t)
    }

    fn milestone_reset<S: Scene + ?Sized>(&mut self, milestones: u32, scene: &mut S) {
        self.phase = PopulationPhase::MilestoneReset;
        self.epoch += 1;
        self.live_frames = 0;
        let cleared = self.state.units.len();
        self.state.units.clear();
        self.state.materialized_count = 0;
        self.milestones = self.milestones.saturating_add(milestones);
        scene.clear_all_units();
        scene.reseed_ground();
        scene.notify_milestone(milestones);
        info!(
            milestones,
            cleared,
            carry = self.state.milestone_carry,
            epoch = self.epoch,
            "milestone reached; field reset"
        );
    }

    fn refresh_phase(&mut self) {
        self.phase = if self.suspended {
            PopulationPhase::Idle
        } else if self.live_frames > 0 {
            PopulationPhase::Reconciling
        } else {
            PopulationPhase::Settled
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Placement;
    use crate::scene::{RecordingScene, SceneCommand};
    use proptest::prelude::*;

    fn engine() -> PopulationEngine {
        PopulationEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn spawns_delta_with_staggered_delays() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        let out = e.reconcile(3, "January", &mut scene);
        assert_eq!(
            out,
            ReconcileOutcome::Applied {
                spawned: 3,
                exhausted: 0,
                milestones: 0
            }
        );
        let delays: Vec<u64> = scene.spawned().map(|(_, d)| d).collect();
        assert_eq!(delays, vec![0, 300, 600]);
        assert!(scene.spawned().all(|(u, _)| u.label == "January"));
        assert_eq!(e.materialized_count(), 3);
        assert_eq!(e.phase(), PopulationPhase::Reconciling);

        scene.clear();
        e.reconcile(5, "February", &mut scene);
        let orders: Vec<u32> = scene.spawned().map(|(u, _)| u.spawn_order).collect();
        assert_eq!(orders, vec![3, 4]);
        let delays: Vec<u64> = scene.spawned().map(|(_, d)| d).collect();
        assert_eq!(delays, vec![0, 300]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        e.reconcile(12, "March", &mut scene);
        let after_first = scene.spawn_count();
        assert_eq!(e.reconcile(12, "March", &mut scene), ReconcileOutcome::Unchanged);
        assert_eq!(scene.spawn_count(), after_first);
    }

    #[test]
    fn shrinking_target_is_ignored() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        e.reconcile(10, "April", &mut scene);
        assert_eq!(
            e.reconcile(4, "April", &mut scene),
            ReconcileOutcome::Ignored {
                target: 4,
                floor: 10
            }
        );
        assert_eq!(e.units().len(), 10);
        assert!(!scene.commands.contains(&SceneCommand::Clear));
    }

    #[test]
    fn milestone_fires_once_and_carries_remainder() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        for target in [50, 99, 100, 100, 105] {
            e.reconcile(target, "May", &mut scene);
        }
        assert_eq!(scene.milestone_count(), 1);
        assert_eq!(e.milestones(), 1);
        assert_eq!(e.materialized_count(), 5);
        assert_eq!(e.state().milestone_carry, 100);
        let clears = scene
            .commands
            .iter()
            .filter(|c| **c == SceneCommand::Clear)
            .count();
        assert_eq!(clears, 1);
        // Reset order: clear, reseed, celebrate.
        let idx = scene
            .commands
            .iter()
            .position(|c| *c == SceneCommand::Clear)
            .unwrap();
        assert_eq!(scene.commands[idx + 1], SceneCommand::ReseedGround);
        assert_eq!(scene.commands[idx + 2], SceneCommand::Milestone(1));
    }

    #[test]
    fn large_jump_consumes_every_crossed_milestone() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        let out = e.reconcile(250, "June", &mut scene);
        assert!(matches!(
            out,
            ReconcileOutcome::Applied { milestones: 2, .. }
        ));
        assert_eq!(e.materialized_count(), 50);
        assert_eq!(e.state().milestone_carry, 200);
        assert_eq!(scene.milestone_count(), 1);
        assert_eq!(e.reconcile(150, "June", &mut scene), ReconcileOutcome::Ignored { target: 150, floor: 250 });
    }

    #[test]
    fn rise_animation_is_staggered_and_ends_at_rest() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        e.reconcile(2, "July", &mut scene);
        let first = UnitId(0);
        let second = UnitId(1);

        assert_eq!(e.advance(16, &mut scene), 1);
        assert_eq!(scene.lifts_for(first).len(), 1);
        assert!(scene.lifts_for(second).is_empty());

        e.advance(10_000, &mut scene);
        let lifts = scene.lifts_for(first);
        assert_eq!(lifts.len(), 20);
        assert!(lifts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*lifts.last().unwrap(), 0.0);
        assert!(lifts[0] > -0.6);
        assert_eq!(scene.lifts_for(second).len(), 20);
        assert_eq!(e.phase(), PopulationPhase::Settled);
    }

    #[test]
    fn frames_from_before_a_reset_are_dropped() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        e.reconcile(99, "August", &mut scene);
        e.advance(100, &mut scene);
        e.reconcile(101, "August", &mut scene);
        assert_eq!(e.epoch(), 1);
        scene.clear();
        e.advance(60_000, &mut scene);
        // Only the one post-reset unit animates.
        let lifted: std::collections::BTreeSet<UnitId> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                SceneCommand::Lift { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(lifted.len(), 1);
        assert!(e.stale_dropped() > 0);
        assert_eq!(e.phase(), PopulationPhase::Settled);
    }

    #[test]
    fn exhausted_placements_are_skipped_not_fatal() {
        let cfg = EngineConfig {
            placement: Placement::Grid,
            half_extent: 0.5,
            min_separation: 0.9,
            ..EngineConfig::default()
        };
        let mut e = PopulationEngine::new(cfg).unwrap();
        let mut scene = RecordingScene::new();
        let out = e.reconcile(5, "September", &mut scene);
        assert_eq!(
            out,
            ReconcileOutcome::Applied {
                spawned: 4,
                exhausted: 1,
                milestones: 0
            }
        );
        assert_eq!(e.materialized_count(), 5);
        assert_eq!(e.units().len(), 4);
        assert_eq!(e.reconcile(5, "September", &mut scene), ReconcileOutcome::Unchanged);
    }

    #[test]
    fn invalid_config_is_refused() {
        let cfg = EngineConfig {
            half_extent: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            PopulationEngine::new(cfg),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn suspended_engine_holds_frames() {
        let mut e = engine();
        let mut scene = RecordingScene::new();
        e.reconcile(1, "October", &mut scene);
        e.suspend();
        assert_eq!(e.phase(), PopulationPhase::Idle);
        assert_eq!(e.advance(10_000, &mut scene), 0);
        e.resume();
        assert_eq!(e.phase(), PopulationPhase::Reconciling);
        assert_eq!(e.advance(0, &mut scene), 0);
        assert_eq!(e.advance(16 * 20, &mut scene), 20);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn trees_never_overlap(steps in prop::collection::vec(1u32..15, 1..8), grid in any::<bool>()) {
            let cfg = EngineConfig {
                placement: if grid { Placement::Grid } else { Placement::Scatter },
                ..EngineConfig::default()
            };
            let r = cfg.min_separation;
            let mut e = PopulationEngine::new(cfg).unwrap();
            let mut scene = RecordingScene::new();
            let mut target = 0;
            for s in steps {
                target += s;
                e.reconcile(target, "November", &mut scene);
                e.advance(50, &mut scene);
            }
            let units = e.units();
            for (i, a) in units.iter().enumerate() {
                for b in &units[i + 1..] {
                    prop_assert!(a.position.distance(&b.position) > r);
                }
            }
        }
    }
}
