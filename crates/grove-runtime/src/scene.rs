//! Command surface between the population engine and the presentation shell.

use ledger_core::MonthKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a spawned tree, unique for the engine's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u64);

/// Planar ground coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// One materialized tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub position: Position,
    /// Order of appearance within the current milestone cycle.
    pub spawn_order: u32,
    pub label: String,
}

/// Rendering primitives the engine drives. Implementations own the meshes.
pub trait Scene {
    /// Add a tree below ground; it becomes visible after `delay_ms`.
    fn spawn_unit(&mut self, unit: &Unit, delay_ms: u64);
    /// Move a tree's vertical offset (0.0 is resting height).
    fn lift_unit(&mut self, id: UnitId, height: f32);
    fn clear_all_units(&mut self);
    fn reseed_ground(&mut self);
    /// Celebrate `milestones` crossed thresholds.
    fn notify_milestone(&mut self, milestones: u32);
}

/// Full shell surface: the scene plus the profit read-out.
pub trait Shell: Scene {
    fn render_monthly_profit(&mut self, month: MonthKey, profit: Decimal);
}

/// A command as observed by [`RecordingScene`].
#[derive(Clone, Debug, PartialEq)]
pub enum SceneCommand {
    Spawn { unit: Unit, delay_ms: u64 },
    Lift { id: UnitId, height: f32 },
    Clear,
    ReseedGround,
    Milestone(u32),
    MonthlyProfit { month: MonthKey, profit: Decimal },
}

/// In-memory shell that records every command it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingScene {
    pub commands: Vec<SceneCommand>,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> impl Iterator<Item = (&Unit, u64)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            SceneCommand::Spawn { unit, delay_ms } => Some((unit, *delay_ms)),
            _ => None,
        })
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned().count()
    }

    pub fn milestone_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, SceneCommand::Milestone(_)))
            .count()
    }

    pub fn lifts_for(&self, id: UnitId) -> Vec<f32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                SceneCommand::Lift { id: i, height } if *i == id => Some(*height),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Scene for RecordingScene {
    fn spawn_unit(&mut self, unit: &Unit, delay_ms: u64) {
        self.commands.push(SceneCommand::Spawn {
            unit: unit.clone(),
            delay_ms,
        });
    }

    fn lift_unit(&mut self, id: UnitId, height: f32) {
        self.commands.push(SceneCommand::Lift { id, height });
    }

    fn clear_all_units(&mut self) {
        self.commands.push(SceneCommand::Clear);
    }

    fn reseed_ground(&mut self) {
        self.commands.push(SceneCommand::ReseedGround);
    }

    fn notify_milestone(&mut self, milestones: u32) {
        self.commands.push(SceneCommand::Milestone(milestones));
    }
}

impl Shell for RecordingScene {
    fn render_monthly_profit(&mut self, month: MonthKey, profit: Decimal) {
        self.commands
            .push(SceneCommand::MonthlyProfit { month, profit });
    }
}
