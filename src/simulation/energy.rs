// Phase 2 - aging and metabolism. Energy budgets are computed in parallel from the
// front buffer; deaths and perturbation draws are applied afterwards in row-major order.

use ::rand as external_rand;
use external_rand::Rng;
use rayon::prelude::*;

use super::{is_prey, kill, native_relief, same_species_neighbors, Environment};
use crate::genome::{EnergySource, Genome};
use crate::grid::{Cell, Grid};
use crate::species::SpeciesRegistry;
use crate::stats::{DeathCause, StepTally};

/// Gain multiplier for organisms in a zone they are specialised for
const OPTIMAL_ZONE_BONUS: f32 = 1.5;
/// Cells older than this may die of random perturbation when crowded
const PERTURBATION_MIN_AGE: u32 = 50;
const PERTURBATION_CHANCE: f64 = 0.02;

enum Fate {
    Lives,
    Dies(DeathCause),
    /// Old and at the crowded edge; a perturbation draw decides
    AtRisk,
}

struct Update {
    energy: f32,
    age: u32,
    fate: Fate,
}

/// Extra decay once a cell has passed the declining part of its lifespan
fn aging_factor(genome: &Genome, age: u32) -> f32 {
    if genome.max_lifespan == 0 {
        return 1.0;
    }
    let lifespan = genome.max_lifespan as f32;
    let decline_start = genome.age_decline_start * lifespan;
    let age = age as f32;
    if age <= decline_start {
        return 1.0;
    }
    let span = lifespan - decline_start;
    let progress = if span > 0.0 {
        ((age - decline_start) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    1.0 + 0.5 * progress
}

pub(super) fn run<R: Rng>(
    grid: &mut Grid,
    env: &Environment<'_>,
    registry: &mut SpeciesRegistry,
    rng: &mut R,
    tally: &mut StepTally,
) {
    let counts = grid.neighbor_counts();
    let pressure = env
        .zones
        .pressure_table(env.membership, grid.cells().iter().map(Cell::is_alive));
    let survival_max = env.rules.survival.max;

    let updates: Vec<Option<Update>> = {
        let grid = &*grid;
        let registry = &*registry;
        let cells = grid.cells();
        cells
            .par_iter()
            .enumerate()
            .map(|(idx, cell)| {
                let species = cell.species_id?;
                let genome = registry.genome(species);
                let zone_idx = env.membership.zone_of(idx);
                let zone = env.zones.zone(zone_idx);
                let props = &zone.properties;
                let age = cell.age.saturating_add(1);

                // Energy source only matters when prey may be around
                let source_multiplier = match genome.energy_source {
                    EnergySource::Photosynthesis => 1.0,
                    source => {
                        let prey_adjacent = grid
                            .neighbors(idx)
                            .into_iter()
                            .flatten()
                            .any(|n| is_prey(&cells[n], species, registry));
                        source.gain_multiplier(prey_adjacent)
                    }
                };
                let optimal_bonus = if genome.is_optimal_zone(zone.kind) {
                    OPTIMAL_ZONE_BONUS
                } else {
                    1.0
                };
                let same = same_species_neighbors(grid, cells, idx, species) as f32;
                let colonial = 1.0 + (genome.colonial_affinity - 1.0) * same / 8.0;

                let gain = genome.photosynthesis_rate
                    * props.energy_multiplier
                    * pressure[zone_idx]
                    * source_multiplier
                    * optimal_bonus
                    * colonial;

                let hazard_factor = match zone.kind.hazard() {
                    Some(hazard) => 1.0 + 0.5 * (1.0 - genome.tolerance(hazard)),
                    None => 1.0,
                };
                let decay = genome.energy_decay_rate
                    * props.decay_multiplier
                    * hazard_factor
                    * aging_factor(genome, age)
                    / native_relief(genome, zone.kind);

                let energy = (cell.energy + gain - decay).clamp(0.0, genome.max_energy());

                let fate = if energy <= 0.0 {
                    Fate::Dies(DeathCause::Starvation)
                } else if genome.max_lifespan > 0 && age > genome.max_lifespan {
                    Fate::Dies(DeathCause::OldAge)
                } else if age > PERTURBATION_MIN_AGE && counts[idx] == survival_max {
                    Fate::AtRisk
                } else {
                    Fate::Lives
                };

                Some(Update { energy, age, fate })
            })
            .collect()
    };

    let (_, back) = grid.begin_phase();
    for (idx, update) in updates.into_iter().enumerate() {
        let Some(update) = update else {
            continue;
        };
        let cell = &mut back[idx];
        cell.energy = update.energy;
        cell.age = update.age;

        let cause = match update.fate {
            Fate::Lives => None,
            Fate::Dies(cause) => Some(cause),
            Fate::AtRisk => rng
                .gen_bool(PERTURBATION_CHANCE)
                .then_some(DeathCause::Perturbation),
        };
        if let Some(cause) = cause {
            kill(cell, cause, registry, tally);
        }
    }
    grid.swap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NeighborRange, RuleConfig, SimulationConfig};
    use crate::grid::Topology;
    use crate::seeding::{Placement, SpeciesSeedSpec};
    use crate::simulation::Engine;
    use crate::zones::{ZoneKind, ZoneLayoutSpec, ZoneSpec};

    fn still_rules() -> RuleConfig {
        RuleConfig {
            survival: NeighborRange::new(0, 8),
            birth: NeighborRange::new(8, 8),
            mutation_rate: 0.0,
            initial_density: 0.0,
            movement_enabled: false,
            reshape_interval: None,
        }
    }

    fn engine(rules: RuleConfig, zones: ZoneLayoutSpec, species: Vec<SpeciesSeedSpec>) -> Engine {
        Engine::new(SimulationConfig {
            width: 16,
            height: 16,
            topology: Topology::Wrapped,
            seed: 9,
            rules,
            zones,
            species,
        })
        .unwrap()
    }

    fn desert() -> ZoneLayoutSpec {
        ZoneLayoutSpec::Custom {
            zones: vec![ZoneSpec::new(ZoneKind::Desert, 0, 0, 16, 16)],
        }
    }

    fn energy_at(engine: &Engine, x: u32, y: u32) -> f32 {
        engine.cell(x, y).map(|c| c.energy).unwrap_or(-1.0)
    }

    fn lone(name: &str, genome: Genome, x: u32, y: u32) -> SpeciesSeedSpec {
        SpeciesSeedSpec::new(name, genome)
            .with_placement(Placement::Cells(vec![[x, y]]))
            .with_initial_energy(100.0)
    }

    #[test]
    fn aging_factor_ramps_after_decline_start() {
        let genome = Genome {
            max_lifespan: 100,
            age_decline_start: 0.5,
            ..Genome::default()
        };
        assert_eq!(aging_factor(&genome, 40), 1.0);
        assert_eq!(aging_factor(&genome, 50), 1.0);
        assert!((aging_factor(&genome, 75) - 1.25).abs() < 1e-6);
        assert!((aging_factor(&genome, 100) - 1.5).abs() < 1e-6);
        assert!((aging_factor(&genome, 140) - 1.5).abs() < 1e-6);
        assert_eq!(aging_factor(&Genome::default(), 10_000), 1.0);
    }

    #[test]
    fn hazard_decay_scales_with_missing_tolerance() {
        let fragile = Genome {
            photosynthesis_rate: 0.0,
            energy_decay_rate: 2.0,
            heat_tolerance: 0.2,
            ..Genome::default()
        };
        let hardy = Genome {
            heat_tolerance: 1.0,
            ..fragile.clone()
        };
        let mut engine = engine(
            still_rules(),
            desert(),
            vec![lone("fragile", fragile, 2, 2), lone("hardy", hardy, 10, 10)],
        );
        engine.step();
        // 2 * 1.5 desert decay * (1 + 0.5 * 0.8)
        assert!((energy_at(&engine, 2, 2) - 95.8).abs() < 1e-4);
        // Full tolerance leaves only the zone multiplier
        assert!((energy_at(&engine, 10, 10) - 97.0).abs() < 1e-4);
    }

    #[test]
    fn specialists_gain_more_in_their_optimal_zone() {
        let specialist = Genome {
            photosynthesis_rate: 10.0,
            energy_decay_rate: 0.0,
            heat_tolerance: 0.9,
            ..Genome::default()
        };
        let generalist = Genome {
            heat_tolerance: 0.5,
            ..specialist.clone()
        };
        let mut engine = engine(
            still_rules(),
            desert(),
            vec![lone("specialist", specialist, 2, 2), lone("generalist", generalist, 10, 10)],
        );
        engine.step();
        // 10 * 0.5 desert energy * 1.3 pressure * 1.5 bonus
        assert!((energy_at(&engine, 2, 2) - 109.75).abs() < 1e-4);
        assert!((energy_at(&engine, 10, 10) - 106.5).abs() < 1e-4);
    }

    #[test]
    fn colonial_species_gain_from_same_species_neighbors() {
        let genome = Genome {
            photosynthesis_rate: 8.0,
            energy_decay_rate: 0.0,
            colonial_affinity: 1.8,
            ..Genome::default()
        };
        let spec = SpeciesSeedSpec::new("colony", genome)
            .with_placement(Placement::Cells(vec![[2, 2], [3, 2], [2, 3], [3, 3], [10, 10]]))
            .with_initial_energy(100.0);
        let mut engine = engine(still_rules(), ZoneLayoutSpec::Neutral, vec![spec]);
        engine.step();
        // Three same-species neighbors: 8 * 1.3 pressure * (1 + 0.8 * 3 / 8)
        assert!((energy_at(&engine, 2, 2) - 113.52).abs() < 1e-3);
        // Alone: 8 * 1.3
        assert!((energy_at(&engine, 10, 10) - 110.4).abs() < 1e-3);
    }

    #[test]
    fn old_cells_at_the_crowded_edge_die_of_perturbation() {
        // Lines of three, so each middle cell sits at the survival maximum
        let rules = RuleConfig {
            survival: NeighborRange::new(0, 2),
            ..still_rules()
        };
        let cells: Vec<[u32; 2]> = (0..8u32)
            .flat_map(|row| {
                (0..4u32).flat_map(move |col| {
                    let (x, y) = (col * 4 + 1, row * 2);
                    [[x - 1, y], [x, y], [x + 1, y]]
                })
            })
            .collect();
        let genome = Genome {
            photosynthesis_rate: 0.0,
            energy_decay_rate: 0.0,
            ..Genome::default()
        };
        let spec = SpeciesSeedSpec::new("elder", genome)
            .with_placement(Placement::Cells(cells))
            .with_initial_energy(180.0);
        let mut engine = engine(rules, ZoneLayoutSpec::Neutral, vec![spec]);

        // Nobody is old enough for the first 50 generations
        for _ in 0..PERTURBATION_MIN_AGE {
            assert_eq!(engine.step().deaths.total(), 0);
        }
        let mut perturbed = 0;
        for _ in 0..30 {
            let deaths = engine.step().deaths;
            assert_eq!(deaths.total(), deaths.perturbation);
            perturbed += deaths.perturbation;
        }
        assert!(perturbed > 0);
        assert_eq!(engine.last_stats().population, 96 - perturbed);
        // Line ends have a single neighbor and are never at risk
        for row in 0..8u32 {
            for col in 0..4u32 {
                let (x, y) = (col * 4 + 1, row * 2);
                assert!(engine.cell(x - 1, y).map_or(false, |c| c.is_alive()));
                assert!(engine.cell(x + 1, y).map_or(false, |c| c.is_alive()));
            }
        }
    }
}
