// Primordial Garden - an evolving cellular automaton. Conway-style survival and
// birth rules drive a population of species whose genomes mutate, compete for
// energy across environmental zones and hunt each other.

pub mod config;
pub mod genome;
pub mod grid;
pub mod mutation;
pub mod rng;
pub mod seeding;
pub mod simulation;
pub mod species;
pub mod stats;
pub mod view;
pub mod zones;

#[cfg(feature = "server")]
pub mod api;

pub use config::{ConfigError, NeighborRange, RuleConfig, SimulationConfig};
pub use genome::{EnergySource, Genome, MovementStrategy, TraitError};
pub use grid::{Cell, Topology};
pub use mutation::mutate;
pub use seeding::{Placement, SpeciesSeedSpec};
pub use simulation::Engine;
pub use species::{SpeciesId, SpeciesRecord, SpeciesRegistry};
pub use stats::{DeathCause, DeathCounts, StatsSnapshot};
pub use view::{CellView, GridView, ZoneView};
pub use zones::{ZoneKind, ZoneLayoutSpec, ZoneSpec};
