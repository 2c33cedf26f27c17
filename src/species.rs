// Species registry - living species indexed by stable ids. Extinct species are
// dropped at the end of every step unless a living lineage still descends from them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::genome::{EnergySource, Genome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub u32);

impl std::fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub genome: Genome,
    pub color: [u8; 3],
    pub parent: Option<SpeciesId>,
    pub born_generation: u64,
    pub population: u32,
    pub peak_population: u32,
    pub total_births: u64,
    pub total_deaths: u64,
    /// Direct descendants still referenced by a living lineage
    descendants: u32,
}

/// What remains of an extinct species while some living species descends from it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AncestorRecord {
    pub id: SpeciesId,
    pub name: String,
    pub parent: Option<SpeciesId>,
    pub born_generation: u64,
    pub extinct_generation: u64,
    #[serde(skip)]
    descendants: u32,
}

/// Read-only view of a living species
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpeciesRecord {
    pub id: SpeciesId,
    pub name: String,
    pub parent: Option<SpeciesId>,
    pub born_generation: u64,
    pub population: u32,
    pub peak_population: u32,
    pub total_births: u64,
    pub total_deaths: u64,
    pub complexity: u8,
    pub energy_source: EnergySource,
    pub color: [u8; 3],
    pub genome: Genome,
}

/// Living species keyed by id, plus the extinct ancestors living lineages
/// still point at. Species with no population are dropped at every recount;
/// an ancestor is dropped as soon as its last descendant line dies out.
#[derive(Clone, Debug, Default)]
pub struct SpeciesRegistry {
    living: BTreeMap<SpeciesId, Species>,
    ancestors: BTreeMap<SpeciesId, AncestorRecord>,
    next_id: u32,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &mut self,
        name: String,
        genome: Genome,
        parent: Option<SpeciesId>,
        generation: u64,
    ) -> SpeciesId {
        let id = SpeciesId(self.next_id);
        self.next_id += 1;
        self.living.insert(
            id,
            Species {
                id,
                name,
                color: genome.color(),
                genome,
                parent,
                born_generation: generation,
                population: 0,
                peak_population: 0,
                total_births: 0,
                total_deaths: 0,
                descendants: 0,
            },
        );
        id
    }

    /// Register a founding species
    pub fn register(&mut self, name: impl Into<String>, genome: Genome, generation: u64) -> SpeciesId {
        self.insert(name.into(), genome, None, generation)
    }

    /// Register a species that branched off the living species `parent`
    pub fn register_mutant(&mut self, parent: SpeciesId, genome: Genome, generation: u64) -> SpeciesId {
        let name = match self.living.get_mut(&parent) {
            Some(species) => {
                species.descendants += 1;
                format!("{}_m{}", species.name, generation)
            }
            None => format!("species{}_m{}", parent.0, generation),
        };
        let id = self.insert(name, genome, Some(parent), generation);
        debug!(%id, %parent, generation, "new species emerged");
        id
    }

    /// A living species
    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.living.get(&id)
    }

    /// An extinct species that still has living descendants
    pub fn ancestor(&self, id: SpeciesId) -> Option<&AncestorRecord> {
        self.ancestors.get(&id)
    }

    /// Genome of a living species.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not living. Cells only ever carry ids of living
    /// species, since a species is retired only once no cell holds it.
    #[inline]
    pub fn genome(&self, id: SpeciesId) -> &Genome {
        &self.living[&id].genome
    }

    /// Number of species ever registered
    pub fn total_registered(&self) -> usize {
        self.next_id as usize
    }

    pub fn living(&self) -> impl Iterator<Item = &Species> {
        self.living.values()
    }

    pub fn living_count(&self) -> usize {
        self.living.len()
    }

    /// Extinct species kept only to trace living lineages
    pub fn ancestor_count(&self) -> usize {
        self.ancestors.len()
    }

    pub fn record_births(&mut self, id: SpeciesId, count: u64) {
        if let Some(species) = self.living.get_mut(&id) {
            species.total_births += count;
        }
    }

    pub fn record_deaths(&mut self, id: SpeciesId, count: u64) {
        if let Some(species) = self.living.get_mut(&id) {
            species.total_deaths += count;
        }
    }

    /// Replace population counts with `populations` and retire every living
    /// species that dropped to zero. Returns the retired ids in ascending order.
    pub fn recount(&mut self, populations: &HashMap<SpeciesId, u32>, generation: u64) -> Vec<SpeciesId> {
        let mut extinct = Vec::new();
        for species in self.living.values_mut() {
            let population = populations.get(&species.id).copied().unwrap_or(0);
            species.population = population;
            species.peak_population = species.peak_population.max(population);
            if population == 0 {
                extinct.push(species.id);
            }
        }
        for &id in &extinct {
            self.retire(id, generation);
        }
        extinct
    }

    fn retire(&mut self, id: SpeciesId, generation: u64) {
        let Some(species) = self.living.remove(&id) else {
            return;
        };
        debug!(id = %species.id, name = %species.name, generation, "species went extinct");
        if species.descendants > 0 {
            self.ancestors.insert(
                id,
                AncestorRecord {
                    id,
                    name: species.name,
                    parent: species.parent,
                    born_generation: species.born_generation,
                    extinct_generation: generation,
                    descendants: species.descendants,
                },
            );
        } else {
            self.release(species.parent);
        }
    }

    /// Drop one descendant reference from `parent`, pruning ancestors that are
    /// no longer on any living lineage
    fn release(&mut self, mut parent: Option<SpeciesId>) {
        while let Some(id) = parent {
            if let Some(species) = self.living.get_mut(&id) {
                species.descendants = species.descendants.saturating_sub(1);
                return;
            }
            let Some(ancestor) = self.ancestors.get_mut(&id) else {
                return;
            };
            ancestor.descendants = ancestor.descendants.saturating_sub(1);
            if ancestor.descendants > 0 {
                return;
            }
            parent = ancestor.parent;
            self.ancestors.remove(&id);
        }
    }

    /// Living species sorted by id
    pub fn table(&self) -> Vec<SpeciesRecord> {
        self.living
            .values()
            .map(|s| SpeciesRecord {
                id: s.id,
                name: s.name.clone(),
                parent: s.parent,
                born_generation: s.born_generation,
                population: s.population,
                peak_population: s.peak_population,
                total_births: s.total_births,
                total_deaths: s.total_deaths,
                complexity: s.genome.complexity,
                energy_source: s.genome.energy_source,
                color: s.color,
                genome: s.genome.clone(),
            })
            .collect()
    }

    /// Chain of ancestors from `id` back to its founder, `id` first
    pub fn lineage(&self, id: SpeciesId) -> Vec<SpeciesId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            current = match (self.living.get(&id), self.ancestors.get(&id)) {
                (Some(species), _) => species.parent,
                (None, Some(ancestor)) => ancestor.parent,
                (None, None) => break,
            };
            chain.push(id);
        }
        chain
    }
}
