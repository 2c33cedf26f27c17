// Per-generation statistics handed to collaborators after each step

use serde::Serialize;

use crate::species::{Species, SpeciesId, SpeciesRegistry};
use crate::zones::ZoneEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Starvation,
    OldAge,
    Perturbation,
    Predation,
    /// Too few neighbors for the cell's energy tier
    Isolation,
    /// Too many neighbors for the cell's energy tier
    Overcrowding,
    /// Crowding-stress draw of medium-energy cells
    Stress,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeathCounts {
    pub starvation: u32,
    pub old_age: u32,
    pub perturbation: u32,
    pub predation: u32,
    pub isolation: u32,
    pub overcrowding: u32,
    pub stress: u32,
}

impl DeathCounts {
    pub fn record(&mut self, cause: DeathCause) {
        let slot = match cause {
            DeathCause::Starvation => &mut self.starvation,
            DeathCause::OldAge => &mut self.old_age,
            DeathCause::Perturbation => &mut self.perturbation,
            DeathCause::Predation => &mut self.predation,
            DeathCause::Isolation => &mut self.isolation,
            DeathCause::Overcrowding => &mut self.overcrowding,
            DeathCause::Stress => &mut self.stress,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u32 {
        self.starvation
            + self.old_age
            + self.perturbation
            + self.predation
            + self.isolation
            + self.overcrowding
            + self.stress
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DominantSpecies {
    pub id: SpeciesId,
    pub name: String,
    pub population: u32,
    /// Fraction of all live cells
    pub share: f64,
}

/// Aggregate counters for one generation
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub generation: u64,
    pub population: u32,
    pub births: u32,
    pub deaths: DeathCounts,
    pub moves: u32,
    /// Births that founded a new species
    pub mutations: u32,
    pub species_count: u32,
    pub new_species: Vec<SpeciesId>,
    pub extinctions: Vec<SpeciesId>,
    /// Shannon index over species population shares
    pub diversity: f64,
    pub total_energy: f64,
    pub mean_energy: f64,
    pub dominant: Option<DominantSpecies>,
    pub zone_events: Vec<ZoneEvent>,
}

/// Event counters accumulated while the phases of one step run
#[derive(Clone, Debug, Default)]
pub(crate) struct StepTally {
    pub births: u32,
    pub deaths: DeathCounts,
    pub moves: u32,
    pub new_species: Vec<SpeciesId>,
    pub zone_events: Vec<ZoneEvent>,
}

/// Shannon diversity `H = -sum(p ln p)` over non-zero populations
pub fn shannon_diversity(populations: impl IntoIterator<Item = u32>) -> f64 {
    let populations: Vec<u32> = populations.into_iter().filter(|&p| p > 0).collect();
    let total: u64 = populations.iter().map(|&p| p as u64).sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let h: f64 = populations
        .iter()
        .map(|&p| {
            let share = p as f64 / total;
            -share * share.ln()
        })
        .sum();
    // Single species yields -0.0
    h.max(0.0)
}

impl StatsSnapshot {
    pub(crate) fn collect(
        generation: u64,
        registry: &SpeciesRegistry,
        total_energy: f64,
        extinctions: Vec<SpeciesId>,
        tally: StepTally,
    ) -> Self {
        let population: u32 = registry.living().map(|s| s.population).sum();
        let diversity = shannon_diversity(registry.living().map(|s| s.population));

        // First species with the highest population wins ties
        let dominant = registry
            .living()
            .fold(None, |best: Option<&Species>, s| match best {
                Some(b) if b.population >= s.population => Some(b),
                _ => Some(s),
            })
            .filter(|s| s.population > 0)
            .map(|s| DominantSpecies {
                id: s.id,
                name: s.name.clone(),
                population: s.population,
                share: s.population as f64 / population.max(1) as f64,
            });

        Self {
            generation,
            population,
            births: tally.births,
            deaths: tally.deaths,
            moves: tally.moves,
            mutations: tally.new_species.len() as u32,
            species_count: registry.living_count() as u32,
            new_species: tally.new_species,
            extinctions,
            diversity,
            total_energy,
            mean_energy: if population > 0 {
                total_energy / population as f64
            } else {
                0.0
            },
            dominant,
            zone_events: tally.zone_events,
        }
    }

    /// One-line human summary used by the batch runner
    pub fn summary(&self) -> String {
        let dominant = self
            .dominant
            .as_ref()
            .map(|d| format!("{} ({:.0}%)", d.name, d.share * 100.0))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "gen {:>6} | pop {:>6} | species {:>4} | births {:>5} | deaths {:>5} | H {:.3} | dominant {}",
            self.generation,
            self.population,
            self.species_count,
            self.births,
            self.deaths.total(),
            self.diversity,
            dominant
        )
    }
}
