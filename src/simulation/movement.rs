// Phase 3 - movement. Every organism picks a target from the front buffer in
// parallel; moves are then applied in row-major order if the target is still free.

use rayon::prelude::*;

use super::{is_prey, Environment};
use crate::genome::MovementStrategy;
use crate::grid::{Cell, Grid};
use crate::species::{SpeciesId, SpeciesRegistry};
use crate::stats::StepTally;

/// How far organisms sense predators and prey
pub const SENSING_RADIUS: i32 = 2;

struct Sight<'a> {
    grid: &'a Grid,
    cells: &'a [Cell],
    env: &'a Environment<'a>,
    registry: &'a SpeciesRegistry,
    counts: &'a [u8],
    zone_scores: &'a [f32],
}

impl Sight<'_> {
    fn score(&self, idx: usize) -> f32 {
        self.zone_scores[self.env.membership.zone_of(idx)]
    }

    /// Empty enterable neighbors in scan order
    fn candidates(&self, idx: usize) -> Vec<usize> {
        self.grid
            .neighbors(idx)
            .into_iter()
            .flatten()
            .filter(|&n| {
                n != idx
                    && !self.cells[n].is_alive()
                    && self
                        .env
                        .zones
                        .zone(self.env.membership.zone_of(n))
                        .properties
                        .can_enter
            })
            .collect()
    }

    fn nearest(&self, from: usize, targets: &[usize]) -> u32 {
        targets
            .iter()
            .map(|&t| self.grid.distance(from, t))
            .min()
            .unwrap_or(u32::MAX)
    }

    fn sensed(&self, idx: usize, keep: impl Fn(&Cell) -> bool) -> Vec<usize> {
        self.grid
            .within_radius(idx, SENSING_RADIUS)
            .filter(|&n| keep(&self.cells[n]))
            .collect()
    }

    fn energy_seeking(&self, idx: usize, candidates: &[usize]) -> Option<usize> {
        // Richest zone first
        let mut best: Option<(usize, f32)> = None;
        for &c in candidates {
            let score = self.score(c);
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((c, score));
            }
        }
        if let Some((target, score)) = best {
            if score > self.score(idx) {
                return Some(target);
            }
        }

        // Then relief from crowding
        let own = self.counts[idx];
        if own > self.env.rules.survival.max {
            let mut best: Option<(usize, u8)> = None;
            for &c in candidates {
                // The mover itself is one of the candidate's neighbors
                let crowd = self.counts[c].saturating_sub(1);
                if best.map_or(true, |(_, b)| crowd < b) {
                    best = Some((c, crowd));
                }
            }
            if let Some((target, crowd)) = best {
                if crowd < own {
                    return Some(target);
                }
            }
        }
        None
    }

    fn flee(&self, idx: usize, species: SpeciesId, candidates: &[usize]) -> Option<usize> {
        let predators = self.sensed(idx, |cell| match cell.species_id {
            Some(id) => id != species && self.registry.genome(id).can_hunt(),
            None => false,
        });
        if predators.is_empty() {
            return self.energy_seeking(idx, candidates);
        }

        let current = self.nearest(idx, &predators);
        let mut best: Option<(usize, u32)> = None;
        for &c in candidates {
            let d = self.nearest(c, &predators);
            if best.map_or(true, |(_, b)| d > b) {
                best = Some((c, d));
            }
        }
        best.filter(|&(_, d)| d > current).map(|(c, _)| c)
    }

    fn hunt(&self, idx: usize, species: SpeciesId, candidates: &[usize]) -> Option<usize> {
        let prey_adjacent = self
            .grid
            .neighbors(idx)
            .into_iter()
            .flatten()
            .any(|n| is_prey(&self.cells[n], species, self.registry));
        if prey_adjacent {
            return None;
        }

        let prey = self.sensed(idx, |cell| is_prey(cell, species, self.registry));
        if prey.is_empty() {
            return self.energy_seeking(idx, candidates);
        }

        let current = self.nearest(idx, &prey);
        let mut best: Option<(usize, u32)> = None;
        for &c in candidates {
            let d = self.nearest(c, &prey);
            if best.map_or(true, |(_, b)| d < b) {
                best = Some((c, d));
            }
        }
        best.filter(|&(_, d)| d < current).map(|(c, _)| c)
    }

    fn intent(&self, idx: usize) -> Option<usize> {
        let cell = &self.cells[idx];
        let species = cell.species_id?;
        let genome = self.registry.genome(species);
        if cell.energy <= genome.movement_cost() {
            return None;
        }
        let candidates = self.candidates(idx);
        if candidates.is_empty() {
            return None;
        }
        match genome.movement_strategy() {
            MovementStrategy::EnergySeeking => self.energy_seeking(idx, &candidates),
            MovementStrategy::Flee => self.flee(idx, species, &candidates),
            MovementStrategy::Hunt => self.hunt(idx, species, &candidates),
        }
    }
}

pub(super) fn run(
    grid: &mut Grid,
    env: &Environment<'_>,
    registry: &SpeciesRegistry,
    tally: &mut StepTally,
) {
    let counts = grid.neighbor_counts();
    let zone_scores: Vec<f32> = env.zones.zones().iter().map(|z| z.energy_score()).collect();

    let intents: Vec<Option<usize>> = {
        let grid = &*grid;
        let sight = Sight {
            grid,
            cells: grid.cells(),
            env,
            registry,
            counts: &counts,
            zone_scores: &zone_scores,
        };
        (0..grid.len())
            .into_par_iter()
            .map(|idx| sight.intent(idx))
            .collect()
    };

    let (_, back) = grid.begin_phase();
    for (from, target) in intents.into_iter().enumerate() {
        let Some(to) = target else {
            continue;
        };
        if back[to].is_alive() || !back[from].is_alive() {
            continue;
        }
        let mut mover = back[from];
        mover.energy -= mover
            .species_id
            .map_or(0.0, |id| registry.genome(id).movement_cost());
        back[to] = mover;
        back[from].clear();
        tally.moves += 1;
    }
    grid.swap();
}

#[cfg(test)]
mod tests {
    use crate::config::{NeighborRange, RuleConfig, SimulationConfig};
    use crate::genome::Genome;
    use crate::grid::Topology;
    use crate::seeding::{Placement, SpeciesSeedSpec};
    use crate::simulation::Engine;
    use crate::zones::{ZoneKind, ZoneLayoutSpec, ZoneSpec};

    fn moving_rules() -> RuleConfig {
        RuleConfig {
            survival: NeighborRange::new(0, 8),
            birth: NeighborRange::new(8, 8),
            mutation_rate: 0.0,
            initial_density: 0.0,
            movement_enabled: true,
            reshape_interval: None,
        }
    }

    fn still_genome(complexity: u8) -> Genome {
        Genome {
            complexity,
            photosynthesis_rate: 0.0,
            energy_decay_rate: 0.0,
            ..Genome::default()
        }
    }

    #[test]
    fn seeker_moves_towards_richer_zone() {
        let spec = SpeciesSeedSpec::new("seeker", still_genome(1))
            .with_placement(Placement::Cells(vec![[4, 5]]));
        let mut engine = Engine::new(SimulationConfig {
            width: 12,
            height: 12,
            topology: Topology::Bounded,
            seed: 3,
            rules: moving_rules(),
            zones: ZoneLayoutSpec::Custom {
                zones: vec![ZoneSpec::new(ZoneKind::Paradise, 5, 0, 7, 12)],
            },
            species: vec![spec],
        })
        .unwrap();

        let stats = engine.step();
        assert_eq!(stats.moves, 1);
        // First paradise neighbor in scan order is (5, 4); cost is 2 + complexity
        let moved = engine.cell(5, 4).copied().unwrap_or_default();
        assert!(moved.is_alive());
        assert!((moved.energy - 97.0).abs() < 1e-4);
        assert!(!engine.cell(4, 5).map(|c| c.is_alive()).unwrap_or(true));

        // Already in the best zone, so it stays put
        assert_eq!(engine.step().moves, 0);
    }

    #[test]
    fn hunter_closes_in_on_prey() {
        let prey = SpeciesSeedSpec::new("prey", still_genome(1))
            .with_placement(Placement::Cells(vec![[8, 5]]))
            .with_initial_energy(1.0);
        let hunter = SpeciesSeedSpec::new("hunter", still_genome(3))
            .with_placement(Placement::Cells(vec![[6, 5]]));
        let mut engine = Engine::new(SimulationConfig {
            width: 16,
            height: 16,
            topology: Topology::Wrapped,
            seed: 3,
            rules: moving_rules(),
            zones: ZoneLayoutSpec::Neutral,
            species: vec![prey, hunter],
        })
        .unwrap();

        let stats = engine.step();
        // Hunter steps next to the prey and eats it in the same generation
        assert_eq!(stats.moves, 1);
        assert_eq!(stats.deaths.predation, 1);
        assert!(!engine.cell(8, 5).map(|c| c.is_alive()).unwrap_or(true));
        assert!(!engine.cell(6, 5).map(|c| c.is_alive()).unwrap_or(true));
    }

    #[test]
    fn prey_flees_from_hunter() {
        let grazer = SpeciesSeedSpec::new("grazer", still_genome(2))
            .with_placement(Placement::Cells(vec![[6, 6]]));
        let hunter = Genome {
            can_be_consumed: false,
            base_energy: 2.0,
            ..still_genome(3)
        };
        // Too little energy to pay for a move
        let hunter = SpeciesSeedSpec::new("hunter", hunter)
            .with_placement(Placement::Cells(vec![[4, 6]]))
            .with_initial_energy(3.0);
        let mut engine = Engine::new(SimulationConfig {
            width: 16,
            height: 16,
            topology: Topology::Wrapped,
            seed: 3,
            rules: moving_rules(),
            zones: ZoneLayoutSpec::Neutral,
            species: vec![grazer, hunter],
        })
        .unwrap();

        let stats = engine.step();
        assert_eq!(stats.moves, 1);
        // Furthest candidate from (4, 6) in scan order is (7, 5)
        assert!(engine.cell(7, 5).map(|c| c.is_alive()).unwrap_or(false));
        assert_eq!(stats.deaths.total(), 0);
    }
}
