#![deny(warnings)]

//! Headless ECS scene: every tree is an entity, the HUD is a resource.

use bevy_ecs::prelude::*;
use grove_runtime::{GroveConfig, Scene, Shell, Tracker, Unit, UnitId};
use ledger_core::MonthKey;
use ledger_econ::format_profit;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// Vertical offset of a freshly planted tree before its first lift frame.
const BURIED_Y: f32 = -1.0;

#[derive(Component, Debug)]
struct Tree {
    id: UnitId,
    label: String,
}

#[derive(Component, Debug, Clone, Copy)]
struct TreeTransform {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Component, Debug)]
struct AppearAfter(u64);

#[derive(Resource, Default, Debug)]
struct HudState {
    trees: usize,
    rising: usize,
    /// Largest |x| or |z| among planted trees.
    extent: f32,
    /// Delay of the last tree in the current batch.
    batch_span_ms: u64,
    newest: Option<(UnitId, String)>,
    celebrations: u32,
    ground_seed: u32,
    last_event: String,
}

fn hud_system(trees: Query<(&Tree, &TreeTransform, &AppearAfter)>, mut hud: ResMut<HudState>) {
    hud.trees = trees.iter().count();
    hud.rising = trees.iter().filter(|(_, t, _)| t.y < 0.0).count();
    hud.extent = trees
        .iter()
        .map(|(_, t, _)| t.x.abs().max(t.z.abs()))
        .fold(0.0, f32::max);
    hud.batch_span_ms = trees.iter().map(|(_, _, a)| a.0).max().unwrap_or(0);
    hud.newest = trees
        .iter()
        .max_by_key(|(tree, _, _)| tree.id)
        .map(|(tree, _, _)| (tree.id, tree.label.clone()));
}

struct EcsScene {
    world: World,
    schedule: Schedule,
    index: HashMap<UnitId, Entity>,
}

impl EcsScene {
    fn new() -> Self {
        let mut world = World::new();
        world.insert_resource(HudState::default());
        let mut schedule = Schedule::default();
        schedule.add_systems(hud_system);
        Self {
            world,
            schedule,
            index: HashMap::new(),
        }
    }

    fn run(&mut self) {
        self.schedule.run(&mut self.world);
    }

    fn hud(&self) -> &HudState {
        self.world.resource::<HudState>()
    }
}

impl Scene for EcsScene {
    fn spawn_unit(&mut self, unit: &Unit, delay_ms: u64) {
        let entity = self
            .world
            .spawn((
                Tree {
                    id: unit.id,
                    label: unit.label.clone(),
                },
                TreeTransform {
                    x: unit.position.x,
                    y: BURIED_Y,
                    z: unit.position.z,
                },
                AppearAfter(delay_ms),
            ))
            .id();
        self.index.insert(unit.id, entity);
    }

    fn lift_unit(&mut self, id: UnitId, height: f32) {
        let Some(&entity) = self.index.get(&id) else {
            return;
        };
        if let Some(mut t) = self.world.get_mut::<TreeTransform>(entity) {
            t.y = height;
        }
    }

    fn clear_all_units(&mut self) {
        let mut q = self.world.query_filtered::<Entity, With<Tree>>();
        let entities: Vec<Entity> = q.iter(&self.world).collect();
        for e in entities {
            self.world.despawn(e);
        }
        self.index.clear();
    }

    fn reseed_ground(&mut self) {
        self.world.resource_mut::<HudState>().ground_seed += 1;
    }

    fn notify_milestone(&mut self, milestones: u32) {
        let mut hud = self.world.resource_mut::<HudState>();
        hud.celebrations += milestones;
        hud.last_event = format!("milestone x{milestones}");
    }
}

impl Shell for EcsScene {
    fn render_monthly_profit(&mut self, month: MonthKey, profit: Decimal) {
        self.world.resource_mut::<HudState>().last_event =
            format!("{month}: {}", format_profit(profit));
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let today = chrono::Local::now().date_naive();
    let mut tracker = match Tracker::new(GroveConfig::default(), EcsScene::new(), today) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("grove-viewer: {e}");
            std::process::exit(1);
        }
    };
    for (date, income, expense) in [
        ("2024-06-03", "2400", "600"),
        ("2024-06-12", "900", "150"),
        ("2024-06-21", "0", "75"),
    ] {
        if let Err(e) = tracker.add_record(date, income, expense) {
            eprintln!("grove-viewer: rejected {date}: {e}");
        }
    }
    if let Err(e) = tracker.select_month("2024-06") {
        eprintln!("grove-viewer: {e}");
    }
    // Half-way through the batch, then to rest.
    tracker.advance(3_000);
    tracker.shell_mut().run();
    let mid = tracker.shell().hud().rising;
    tracker.advance(60_000);
    tracker.shell_mut().run();

    let hud = tracker.shell().hud();
    println!(
        "grove-viewer: trees={} rising(mid)={} rising={} extent={:.2} span={}ms newest={:?} celebrations={} ground={} | {}",
        hud.trees,
        mid,
        hud.rising,
        hud.extent,
        hud.batch_span_ms,
        hud.newest,
        hud.celebrations,
        hud.ground_seed,
        hud.last_event
    );
}
