// Phase 4 - predation. Hunters act in row-major order; each eats at most one
// neighbor per generation and a cell eaten earlier in the scan cannot act.

use super::kill;
use crate::grid::Grid;
use crate::species::SpeciesRegistry;
use crate::stats::{DeathCause, StepTally};

pub(super) fn run(grid: &mut Grid, registry: &mut SpeciesRegistry, tally: &mut StepTally) {
    let lattice = grid.lattice();
    let (_, back) = grid.begin_phase();
    for idx in 0..back.len() {
        let Some(hunter) = back[idx].species_id else {
            continue;
        };
        let genome = registry.genome(hunter);
        if !genome.can_hunt() {
            continue;
        }
        let efficiency = genome.hunting_efficiency();
        let max_energy = genome.max_energy();

        let meal = lattice.neighbors(idx).into_iter().flatten().find(|&n| {
            n != idx
                && back[n]
                    .species_id
                    .map_or(false, |prey| prey != hunter && registry.genome(prey).can_be_consumed)
        });
        let Some(prey_idx) = meal else {
            continue;
        };

        let gained = back[prey_idx].energy * efficiency;
        back[idx].energy = (back[idx].energy + gained).min(max_energy);
        kill(&mut back[prey_idx], DeathCause::Predation, registry, tally);
    }
    grid.swap();
}

#[cfg(test)]
mod tests {
    use crate::config::{NeighborRange, RuleConfig, SimulationConfig};
    use crate::genome::{EnergySource, Genome};
    use crate::grid::Topology;
    use crate::seeding::{Placement, SpeciesSeedSpec};
    use crate::simulation::Engine;
    use crate::zones::ZoneLayoutSpec;

    fn engine(species: Vec<SpeciesSeedSpec>) -> Engine {
        Engine::new(SimulationConfig {
            width: 10,
            height: 10,
            topology: Topology::Wrapped,
            seed: 8,
            rules: RuleConfig {
                survival: NeighborRange::new(0, 8),
                birth: NeighborRange::new(8, 8),
                mutation_rate: 0.0,
                initial_density: 0.0,
                movement_enabled: false,
                reshape_interval: None,
            },
            zones: ZoneLayoutSpec::Neutral,
            species,
        })
        .unwrap()
    }

    fn inert(complexity: u8) -> Genome {
        Genome {
            complexity,
            photosynthesis_rate: 0.0,
            energy_decay_rate: 0.0,
            ..Genome::default()
        }
    }

    #[test]
    fn one_meal_per_hunter() {
        let hunter = Genome {
            energy_source: EnergySource::Predation,
            can_be_consumed: false,
            ..inert(4)
        };
        let specs = vec![
            SpeciesSeedSpec::new("hunter", hunter)
                .with_placement(Placement::Cells(vec![[5, 5]]))
                .with_initial_energy(150.0),
            SpeciesSeedSpec::new("prey", inert(1))
                .with_placement(Placement::Cells(vec![[4, 4], [6, 6]]))
                .with_initial_energy(150.0),
        ];
        let mut engine = engine(specs);
        let stats = engine.step();

        assert_eq!(stats.deaths.predation, 1);
        // First prey in scan order is (4, 4)
        assert!(!engine.cell(4, 4).map(|c| c.is_alive()).unwrap_or(true));
        assert!(engine.cell(6, 6).map(|c| c.is_alive()).unwrap_or(false));
        // 150 + 150 * 0.8 is capped at 2 * base energy
        assert_eq!(engine.cell(5, 5).map(|c| c.energy), Some(200.0));
    }

    #[test]
    fn eaten_hunter_cannot_act() {
        // Two hunters next to each other; the first in scan order eats the second
        let big = Genome {
            can_be_consumed: false,
            ..inert(3)
        };
        let small = inert(3);
        let specs = vec![
            SpeciesSeedSpec::new("big", big)
                .with_placement(Placement::Cells(vec![[2, 2]]))
                .with_initial_energy(150.0),
            SpeciesSeedSpec::new("small", small)
                .with_placement(Placement::Cells(vec![[3, 2]]))
                .with_initial_energy(150.0),
            SpeciesSeedSpec::new("grass", inert(1))
                .with_placement(Placement::Cells(vec![[4, 2]]))
                .with_initial_energy(150.0),
        ];
        let mut engine = engine(specs);
        let stats = engine.step();

        assert_eq!(stats.deaths.predation, 1);
        assert!(!engine.cell(3, 2).map(|c| c.is_alive()).unwrap_or(true));
        assert!(engine.cell(4, 2).map(|c| c.is_alive()).unwrap_or(false));
    }
}
