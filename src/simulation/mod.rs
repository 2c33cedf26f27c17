// Simulation engine - owns the world and advances it one generation at a time
// through six ordered phases.

use std::collections::HashMap;
use tracing::debug;

use crate::config::{ConfigError, RuleConfig, SimulationConfig};
use crate::genome::Genome;
use crate::grid::{Cell, Grid};
use crate::rng::RngContext;
use crate::seeding::seed_world;
use crate::species::{SpeciesId, SpeciesRecord, SpeciesRegistry};
use crate::stats::{DeathCause, StatsSnapshot, StepTally};
use crate::view::GridView;
use crate::zones::{ZoneKind, ZoneMap, ZoneMembership};

mod energy;
mod movement;
mod predation;
mod reproduction;

/// Immutable environment shared by the phases of one generation
pub(crate) struct Environment<'a> {
    pub zones: &'a ZoneMap,
    pub membership: &'a ZoneMembership,
    pub rules: &'a RuleConfig,
    pub generation: u64,
}

pub struct Engine {
    config: SimulationConfig,
    grid: Grid,
    zones: ZoneMap,
    membership: ZoneMembership,
    registry: SpeciesRegistry,
    rng: RngContext,
    generation: u64,
    last_stats: StatsSnapshot,
}

impl Engine {
    /// Validate `config`, lay out the zones and seed the founding species.
    /// The returned engine is at generation 0.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = RngContext::new(config.seed);
        let zones = ZoneMap::build(&config.zones, config.width, config.height, &mut rng)?;
        let membership = zones.membership();
        let mut grid = Grid::new(config.width, config.height, config.topology);
        let mut registry = SpeciesRegistry::new();

        seed_world(
            &mut grid,
            &zones,
            &membership,
            &mut registry,
            &config.species,
            config.rules.initial_density,
            &mut rng,
        );

        let mut engine = Self {
            config,
            grid,
            zones,
            membership,
            registry,
            rng,
            generation: 0,
            last_stats: StatsSnapshot::default(),
        };
        // Species that could not place a single cell are extinct from the start
        engine.last_stats = engine.update_registry(StepTally::default());
        Ok(engine)
    }

    /// Rebuild the world from its configuration and seed
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        *self = Self::new(self.config.clone())?;
        Ok(())
    }

    /// Advance exactly one generation
    pub fn step(&mut self) -> StatsSnapshot {
        self.generation += 1;
        let generation = self.generation;
        let mut tally = StepTally::default();

        // Phase 1: environmental drift, then refresh zone membership
        tally.zone_events =
            self.zones
                .maybe_reshape(generation, self.config.rules.reshape_interval, &mut self.rng);
        if !tally.zone_events.is_empty() {
            self.membership = self.zones.membership();
        }

        let env = Environment {
            zones: &self.zones,
            membership: &self.membership,
            rules: &self.config.rules,
            generation,
        };

        // Phase 2: aging and metabolism
        energy::run(&mut self.grid, &env, &mut self.registry, &mut self.rng, &mut tally);

        // Phase 3: movement
        if env.rules.movement_enabled {
            movement::run(&mut self.grid, &env, &self.registry, &mut tally);
        }

        // Phase 4: predation
        predation::run(&mut self.grid, &mut self.registry, &mut tally);

        // Phase 5: survival and births
        reproduction::run(&mut self.grid, &env, &mut self.registry, &mut self.rng, &mut tally);

        // Phase 6: bookkeeping
        let stats = self.update_registry(tally);
        debug!(
            generation,
            population = stats.population,
            births = stats.births,
            deaths = stats.deaths.total(),
            species = stats.species_count,
            "generation complete"
        );
        self.last_stats = stats.clone();
        stats
    }

    /// Step `generations` times, returning the final snapshot
    pub fn run(&mut self, generations: u64) -> StatsSnapshot {
        for _ in 0..generations {
            self.step();
        }
        self.last_stats.clone()
    }

    fn update_registry(&mut self, tally: StepTally) -> StatsSnapshot {
        let mut populations: HashMap<SpeciesId, u32> = HashMap::new();
        let mut total_energy = 0.0f64;
        for cell in self.grid.cells() {
            if let Some(id) = cell.species_id {
                *populations.entry(id).or_insert(0) += 1;
                total_energy += cell.energy as f64;
            }
        }
        let extinctions = self.registry.recount(&populations, self.generation);
        StatsSnapshot::collect(
            self.generation,
            &self.registry,
            total_energy,
            extinctions,
            tally,
        )
    }

    pub fn snapshot(&self) -> GridView {
        GridView::capture(
            self.generation,
            &self.grid,
            &self.zones,
            &self.membership,
            &self.registry,
        )
    }

    pub fn species_table(&self) -> Vec<SpeciesRecord> {
        self.registry.table()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_stats(&self) -> &StatsSnapshot {
        &self.last_stats
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<&Cell> {
        self.grid.get(x, y)
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

/// Clear a cell and book its death against its species
pub(crate) fn kill(
    cell: &mut Cell,
    cause: DeathCause,
    registry: &mut SpeciesRegistry,
    tally: &mut StepTally,
) {
    if let Some(id) = cell.species_id {
        registry.record_deaths(id, 1);
        tally.deaths.record(cause);
    }
    cell.clear();
}

/// Whether `cell` of `species` can be eaten by an organism of `hunter`
#[inline]
pub(crate) fn is_prey(cell: &Cell, hunter: SpeciesId, registry: &SpeciesRegistry) -> bool {
    match cell.species_id {
        Some(id) => id != hunter && registry.genome(id).can_be_consumed,
        None => false,
    }
}

/// Live neighbors belonging to the same species as the cell at `idx`
#[inline]
pub(crate) fn same_species_neighbors(grid: &Grid, cells: &[Cell], idx: usize, species: SpeciesId) -> u8 {
    grid.neighbors(idx)
        .into_iter()
        .flatten()
        .filter(|&n| cells[n].species_id == Some(species))
        .count() as u8
}

/// Native-zone relief: dividing decay and reproduction thresholds by the
/// affinity inside the species' home zone
#[inline]
pub(crate) fn native_relief(genome: &Genome, zone_kind: ZoneKind) -> f32 {
    if zone_kind == genome.native_zone {
        genome.native_zone_affinity
    } else {
        1.0
    }
}
