#![deny(warnings)]

//! Grove runtime: turns ledger profit into a growing field of trees.
//!
//! The [`Tracker`] owns the ledger and recomputes the growth counter on every
//! write; the [`PopulationEngine`] reconciles the materialized trees against
//! that counter behind a [`VisibilityGate`], issuing commands to a [`Scene`].

pub mod config;
pub mod engine;
pub mod gate;
pub mod placement;
pub mod scene;
pub mod timeline;
pub mod tracker;

pub use config::{ConfigError, EngineConfig, GroveConfig, Placement};
pub use engine::{PopulationEngine, PopulationPhase, PopulationState, ReconcileOutcome};
pub use gate::VisibilityGate;
pub use placement::Placer;
pub use scene::{Position, RecordingScene, Scene, SceneCommand, Shell, Unit, UnitId};
pub use timeline::Timeline;
pub use tracker::{Tracker, TrackerError, TrackerSnapshot};
