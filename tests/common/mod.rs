// Shared world builders for the integration tests

#![allow(dead_code)]

use primordial_garden::{
    Engine, Genome, NeighborRange, Placement, RuleConfig, SimulationConfig, SpeciesSeedSpec,
    Topology, ZoneLayoutSpec,
};

/// A genome that always sits in the high energy tier and never pays for
/// offspring, so the world behaves like plain Conway B3/S23.
pub fn conway_genome() -> Genome {
    Genome {
        base_energy: 10.0,
        photosynthesis_rate: 20.0,
        energy_decay_rate: 0.0,
        reproduction_threshold: 0.0,
        reproduction_cost: 0.0,
        mutation_rate: 0.0,
        complexity: 1,
        max_lifespan: 0,
        ..Genome::default()
    }
}

pub fn conway_rules() -> RuleConfig {
    RuleConfig {
        survival: NeighborRange::new(2, 3),
        birth: NeighborRange::new(3, 3),
        mutation_rate: 0.0,
        initial_density: 0.0,
        movement_enabled: false,
        reshape_interval: None,
    }
}

/// Rules under which nothing dies of crowding and no births happen
pub fn still_rules() -> RuleConfig {
    RuleConfig {
        survival: NeighborRange::new(0, 8),
        birth: NeighborRange::new(8, 8),
        ..conway_rules()
    }
}

pub fn conway_world(width: u32, height: u32, cells: Vec<[u32; 2]>) -> Engine {
    let spec = SpeciesSeedSpec::new("life", conway_genome())
        .with_placement(Placement::Cells(cells))
        .with_initial_energy(20.0);
    world(width, height, conway_rules(), vec![spec])
}

pub fn world(
    width: u32,
    height: u32,
    rules: RuleConfig,
    species: Vec<SpeciesSeedSpec>,
) -> Engine {
    Engine::new(SimulationConfig {
        width,
        height,
        topology: Topology::Wrapped,
        seed: 7,
        rules,
        zones: ZoneLayoutSpec::Neutral,
        species,
    })
    .expect("valid test world")
}

/// Sorted coordinates of every live cell
pub fn live_coords(engine: &Engine) -> Vec<(u32, u32)> {
    let mut coords: Vec<(u32, u32)> = engine
        .snapshot()
        .cells
        .iter()
        .map(|c| (c.x, c.y))
        .collect();
    coords.sort_unstable();
    coords
}

/// A smaller, denser copy of the default demo world. Mutation, movement and
/// predation are all active and the population holds for hundreds of generations.
pub fn demo_config(seed: u64) -> SimulationConfig {
    let mut config = SimulationConfig {
        width: 64,
        height: 64,
        seed,
        ..SimulationConfig::default()
    };
    config.rules.initial_density = 0.3;
    config
}
