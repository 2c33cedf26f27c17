// Initial population placement for the founding species

use ::rand as external_rand;
use external_rand::seq::SliceRandom;
use external_rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::genome::Genome;
use crate::grid::{Cell, Grid};
use crate::species::SpeciesRegistry;
use crate::zones::{ZoneMap, ZoneMembership};

/// Where a founding species' cells are put
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Scattered over the whole grid
    #[default]
    Random,
    /// Packed into a disc around the grid center
    Center,
    /// Spread along the outer border
    Edge,
    /// Explicit `[x, y]` positions
    Cells(Vec<[u32; 2]>),
}

/// Description of a founding species
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSeedSpec {
    pub name: String,
    #[serde(default)]
    pub genome: Genome,
    #[serde(default)]
    pub placement: Placement,
    /// Cells to place; defaults to an equal share of the initial density
    #[serde(default)]
    pub population: Option<u32>,
    /// Starting energy; defaults to the genome's base energy
    #[serde(default)]
    pub initial_energy: Option<f32>,
}

impl SpeciesSeedSpec {
    pub fn new(name: impl Into<String>, genome: Genome) -> Self {
        Self {
            name: name.into(),
            genome,
            placement: Placement::Random,
            population: None,
            initial_energy: None,
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_population(mut self, population: u32) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_initial_energy(mut self, energy: f32) -> Self {
        self.initial_energy = Some(energy);
        self
    }
}

/// Register every founding species and place its cells on the grid.
/// Returns the number of cells placed per species, in the order given.
pub fn seed_world<R: Rng>(
    grid: &mut Grid,
    zones: &ZoneMap,
    membership: &ZoneMembership,
    registry: &mut SpeciesRegistry,
    specs: &[SpeciesSeedSpec],
    initial_density: f32,
    rng: &mut R,
) -> Vec<u32> {
    let area = grid.len() as f64;
    let share = if specs.is_empty() {
        0
    } else {
        (initial_density as f64 * area / specs.len() as f64).round() as u32
    };

    let mut placed_counts = Vec::with_capacity(specs.len());
    for spec in specs {
        let id = registry.register(spec.name.clone(), spec.genome.clone(), 0);
        let energy = spec
            .initial_energy
            .unwrap_or(spec.genome.base_energy)
            .min(spec.genome.max_energy());
        let wanted = spec.population.unwrap_or(share);

        let free = |grid: &Grid, idx: usize| {
            !grid.cell(idx).is_alive() && zones.zone(membership.zone_of(idx)).properties.can_enter
        };

        let mut placed = 0u32;
        let mut put = |grid: &mut Grid, idx: usize| {
            grid.place(idx, Cell::new(id, energy));
            placed += 1;
        };

        match &spec.placement {
            Placement::Random => {
                let len = grid.len();
                let mut attempts = 0u64;
                let max_attempts = wanted as u64 * 10;
                let mut count = 0;
                while count < wanted && attempts < max_attempts && len > 0 {
                    attempts += 1;
                    let idx = rng.gen_range(0..len);
                    if free(grid, idx) {
                        put(grid, idx);
                        count += 1;
                    }
                }
            }
            Placement::Center => {
                let cx = grid.width() as f64 / 2.0;
                let cy = grid.height() as f64 / 2.0;
                let mut order: Vec<(u64, usize)> = (0..grid.len())
                    .map(|idx| {
                        let (x, y) = grid.coords(idx);
                        let dx = x as f64 + 0.5 - cx;
                        let dy = y as f64 + 0.5 - cy;
                        // Quantised squared distance keeps the sort total and ties in scan order
                        (((dx * dx + dy * dy) * 1024.0) as u64, idx)
                    })
                    .collect();
                order.sort_unstable();
                let mut count = 0;
                for (_, idx) in order {
                    if count >= wanted {
                        break;
                    }
                    if free(grid, idx) {
                        put(grid, idx);
                        count += 1;
                    }
                }
            }
            Placement::Edge => {
                let mut perimeter = perimeter_indices(grid);
                perimeter.shuffle(rng);
                let mut count = 0;
                for idx in perimeter {
                    if count >= wanted {
                        break;
                    }
                    if free(grid, idx) {
                        put(grid, idx);
                        count += 1;
                    }
                }
            }
            Placement::Cells(cells) => {
                for &[x, y] in cells {
                    if x >= grid.width() || y >= grid.height() {
                        continue;
                    }
                    let idx = grid.idx(x, y);
                    if free(grid, idx) {
                        put(grid, idx);
                    }
                }
            }
        }

        if let Placement::Cells(cells) = &spec.placement {
            if (placed as usize) < cells.len() {
                warn!(species = %spec.name, skipped = cells.len() - placed as usize, "some seed cells were occupied or impassable");
            }
        }
        info!(species = %spec.name, %id, placed, "seeded species");
        placed_counts.push(placed);
    }
    placed_counts
}

fn perimeter_indices(grid: &Grid) -> Vec<usize> {
    let (w, h) = (grid.width(), grid.height());
    let mut out = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                out.push(grid.idx(x, y));
            }
        }
    }
    out
}
