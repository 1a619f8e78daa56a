//! Non-overlapping position search on the ground square.

use crate::config::{ConfigError, EngineConfig, Placement};
use crate::scene::Position;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Lattice pitch relative to the separation radius; must stay above 1.
const GRID_PITCH_FACTOR: f32 = 1.05;

/// Whether `candidate` is farther than `min_separation` from every position.
pub fn is_clear(candidate: Position, existing: &[Position], min_separation: f32) -> bool {
    existing
        .iter()
        .all(|p| p.distance(&candidate) > min_separation)
}

/// Searches for free positions under a minimum-separation radius.
#[derive(Debug, Clone)]
pub struct Placer {
    strategy: Placement,
    half_extent: f32,
    min_separation: f32,
    max_attempts: u32,
    rng: ChaCha8Rng,
}

impl Placer {
    pub fn new(cfg: &EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            strategy: cfg.placement,
            half_extent: cfg.half_extent,
            min_separation: cfg.min_separation,
            max_attempts: cfg.max_attempts,
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
        })
    }

    /// Find a free position, or `None` once the search budget is spent.
    pub fn place(&mut self, existing: &[Position]) -> Option<Position> {
        match self.strategy {
            Placement::Scatter => self.scatter(existing),
            Placement::Grid => self.grid_scan(existing),
        }
    }

    fn scatter(&mut self, existing: &[Position]) -> Option<Position> {
        let h = self.half_extent;
        for _ in 0..self.max_attempts {
            let candidate = Position::new(self.rng.gen_range(-h..=h), self.rng.gen_range(-h..=h));
            if is_clear(candidate, existing, self.min_separation) {
                return Some(candidate);
            }
        }
        None
    }

    fn grid_scan(&self, existing: &[Position]) -> Option<Position> {
        let pitch = self.min_separation * GRID_PITCH_FACTOR;
        let cells = ((2.0 * self.half_extent) / pitch).floor() as u32 + 1;
        for row in 0..cells {
            for col in 0..cells {
                let candidate = Position::new(
                    -self.half_extent + col as f32 * pitch,
                    -self.half_extent + row as f32 * pitch,
                );
                if is_clear(candidate, existing, self.min_separation) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(placement: Placement) -> EngineConfig {
        EngineConfig {
            placement,
            ..EngineConfig::default()
        }
    }

    fn fill(placer: &mut Placer, n: usize) -> Vec<Position> {
        let mut placed = Vec::new();
        for _ in 0..n {
            if let Some(p) = placer.place(&placed) {
                placed.push(p);
            }
        }
        placed
    }

    #[test]
    fn scatter_is_seeded() {
        let a = fill(&mut Placer::new(&cfg(Placement::Scatter)).unwrap(), 20);
        let b = fill(&mut Placer::new(&cfg(Placement::Scatter)).unwrap(), 20);
        assert_eq!(a, b);
    }

    #[test]
    fn positions_stay_on_the_ground() {
        for strategy in [Placement::Scatter, Placement::Grid] {
            let c = cfg(strategy);
            let placed = fill(&mut Placer::new(&c).unwrap(), 60);
            assert!(placed
                .iter()
                .all(|p| p.x.abs() <= c.half_extent + 1e-4 && p.z.abs() <= c.half_extent + 1e-4));
        }
    }

    #[test]
    fn grid_fills_every_lattice_cell_then_stops() {
        let c = EngineConfig {
            placement: Placement::Grid,
            half_extent: 0.5,
            min_separation: 0.9,
            ..EngineConfig::default()
        };
        let mut placer = Placer::new(&c).unwrap();
        let placed = fill(&mut placer, 4);
        assert_eq!(placed.len(), 4);
        assert_eq!(placer.place(&placed), None);
    }

    #[test]
    fn scatter_gives_up_when_crowded() {
        let c = EngineConfig {
            max_attempts: 50,
            ..EngineConfig::default()
        };
        // A 0.3-pitch lattice leaves no point farther than 0.22 from a tree.
        let crowd: Vec<Position> = (0..=28)
            .flat_map(|i| (0..=28).map(move |j| (i, j)))
            .map(|(i, j)| Position::new(-4.2 + i as f32 * 0.3, -4.2 + j as f32 * 0.3))
            .collect();
        let mut placer = Placer::new(&c).unwrap();
        assert!(placer.place(&[]).is_some());
        assert_eq!(placer.place(&crowd), None);
    }

    #[test]
    fn negative_extent_is_refused() {
        let c = EngineConfig {
            half_extent: -2.0,
            ..EngineConfig::default()
        };
        assert!(Placer::new(&c).is_err());
    }

    #[test]
    fn separation_is_exclusive() {
        let a = Position::new(0.0, 0.0);
        assert!(!is_clear(Position::new(0.5, 0.0), &[a], 0.5));
        assert!(is_clear(Position::new(0.51, 0.0), &[a], 0.5));
    }
}
