// Phase 5 - adaptive Conway rule. Survival depends on the cell's energy tier,
// births need a parent that can afford the zone-adjusted threshold.

use ::rand as external_rand;
use external_rand::Rng;
use rayon::prelude::*;

use super::{kill, native_relief, Environment};
use crate::config::NeighborRange;
use crate::genome::Genome;
use crate::grid::{Cell, Grid};
use crate::mutation::mutate;
use crate::species::{SpeciesId, SpeciesRegistry};
use crate::stats::{DeathCause, StepTally};
use crate::zones::{Zone, ZoneProperties};

/// Energy ratios separating the high, medium and low tiers
const HIGH_TIER: f32 = 0.7;
const LOW_TIER: f32 = 0.4;
/// Chance a medium-energy cell at the crowded edge dies of stress
const STRESS_MORTALITY: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq)]
enum EnergyTier {
    High,
    Medium,
    Low,
}

impl EnergyTier {
    fn of(energy: f32, max_energy: f32) -> Self {
        let ratio = if max_energy > 0.0 { energy / max_energy } else { 0.0 };
        if ratio > HIGH_TIER {
            EnergyTier::High
        } else if ratio >= LOW_TIER {
            EnergyTier::Medium
        } else {
            EnergyTier::Low
        }
    }

    fn survival_range(self, base: NeighborRange) -> NeighborRange {
        match self {
            EnergyTier::High | EnergyTier::Medium => base,
            EnergyTier::Low => base.shifted_up(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BirthPlan {
    species: SpeciesId,
    parent: usize,
    /// Second-strongest neighbor of the same species, for sexual species
    partner: Option<usize>,
    same: u8,
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    Idle,
    Dies(DeathCause),
    Stressed,
    Birth(BirthPlan),
}

fn plan_survivor(cell: &Cell, max_energy: f32, count: u8, rules: NeighborRange) -> Plan {
    let tier = EnergyTier::of(cell.energy, max_energy);
    let range = tier.survival_range(rules);
    if count < range.min {
        Plan::Dies(DeathCause::Isolation)
    } else if count > range.max {
        Plan::Dies(DeathCause::Overcrowding)
    } else if tier == EnergyTier::Medium && count == rules.max {
        Plan::Stressed
    } else {
        Plan::Idle
    }
}

fn plan_birth(grid: &Grid, cells: &[Cell], idx: usize) -> Option<BirthPlan> {
    let neighbors = grid.neighbors(idx);

    // Most numerous neighbor species, lowest id on ties
    let mut tallies: Vec<(SpeciesId, u8)> = Vec::with_capacity(8);
    for n in neighbors.into_iter().flatten() {
        if let Some(id) = cells[n].species_id {
            match tallies.iter_mut().find(|(s, _)| *s == id) {
                Some((_, count)) => *count += 1,
                None => tallies.push((id, 1)),
            }
        }
    }
    let (species, same) = tallies
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;

    // Strongest and second-strongest neighbors of that species, scan order on ties
    let mut parent: Option<usize> = None;
    let mut partner: Option<usize> = None;
    for n in neighbors.into_iter().flatten() {
        if cells[n].species_id != Some(species) || Some(n) == parent || Some(n) == partner {
            continue;
        }
        let energy = cells[n].energy;
        match parent {
            Some(p) if cells[p].energy >= energy => {
                if partner.map_or(true, |q| energy > cells[q].energy) {
                    partner = Some(n);
                }
            }
            _ => {
                partner = parent;
                parent = Some(n);
            }
        }
    }

    Some(BirthPlan {
        species,
        parent: parent?,
        partner,
        same,
    })
}

/// Energy a parent must have available to give birth in `zone`. `None` when the
/// zone's population pressure leaves no room for births.
fn birth_threshold(genome: &Genome, zone: &Zone, pressure: f32, same: u8) -> Option<f32> {
    if pressure <= 0.0 {
        return None;
    }
    let cluster = if same >= 3 {
        1.0 + (genome.cluster_reproduction_bonus - 1.0) * (same as f32 - 2.0) / 6.0
    } else {
        1.0
    };
    Some(
        genome.reproduction_threshold * zone.properties.reproduction_difficulty
            / pressure
            / native_relief(genome, zone.kind)
            / cluster,
    )
}

/// Chance that a birth founds a new species. Recombination halves it for
/// sexual species.
fn mutation_chance(genome: &Genome, zone: &ZoneProperties, global_rate: f32) -> f32 {
    let chance = genome.mutation_rate * zone.mutation_multiplier * global_rate;
    if genome.sexual_reproduction {
        chance * 0.5
    } else {
        chance
    }
}

/// Register `mutant` as a species branching off `parent`. A mutation that left
/// the genome unchanged keeps the parent species.
fn branch_species(
    registry: &mut SpeciesRegistry,
    parent: SpeciesId,
    genome: &Genome,
    mutant: Genome,
    generation: u64,
) -> Option<SpeciesId> {
    if mutant == *genome {
        None
    } else {
        Some(registry.register_mutant(parent, mutant, generation))
    }
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
    let rules = env.rules;

    let plans: Vec<Plan> = {
        let grid = &*grid;
        let registry = &*registry;
        let cells = grid.cells();
        cells
            .par_iter()
            .enumerate()
            .map(|(idx, cell)| match cell.species_id {
                Some(species) => plan_survivor(
                    cell,
                    registry.genome(species).max_energy(),
                    counts[idx],
                    rules.survival,
                ),
                None => {
                    let enterable = env
                        .zones
                        .zone(env.membership.zone_of(idx))
                        .properties
                        .can_enter;
                    if enterable && rules.birth.contains(counts[idx]) {
                        plan_birth(grid, cells, idx).map_or(Plan::Idle, Plan::Birth)
                    } else {
                        Plan::Idle
                    }
                }
            })
            .collect()
    };

    // Energy already committed to offspring this phase, per parent
    let mut debits = vec![0.0f32; grid.len()];
    let (front, back) = grid.begin_phase();

    for (idx, plan) in plans.into_iter().enumerate() {
        match plan {
            Plan::Idle => {}
            Plan::Dies(cause) => kill(&mut back[idx], cause, registry, tally),
            Plan::Stressed => {
                if rng.gen_bool(STRESS_MORTALITY) {
                    kill(&mut back[idx], DeathCause::Stress, registry, tally);
                }
            }
            Plan::Birth(birth) => {
                let zone_idx = env.membership.zone_of(idx);
                let zone = env.zones.zone(zone_idx);
                let genome = registry.genome(birth.species).clone();
                let Some(threshold) = birth_threshold(&genome, zone, pressure[zone_idx], birth.same)
                else {
                    continue;
                };

                let available = |i: usize| front[i].energy - debits[i];
                if available(birth.parent) < threshold {
                    continue;
                }

                let cost = genome.reproduction_cost;
                if genome.sexual_reproduction {
                    let Some(partner) = birth.partner else {
                        continue;
                    };
                    if birth.same < 2 || available(partner) < cost / 2.0 {
                        continue;
                    }
                    for payer in [birth.parent, partner] {
                        debits[payer] += cost / 2.0;
                        back[payer].energy = (back[payer].energy - cost / 2.0).max(0.0);
                    }
                } else {
                    debits[birth.parent] += cost;
                    back[birth.parent].energy = (back[birth.parent].energy - cost).max(0.0);
                }

                let mut child_species = birth.species;
                let chance = mutation_chance(&genome, &zone.properties, rules.mutation_rate);
                if chance > 0.0 && rng.gen_bool(chance.min(1.0) as f64) {
                    let mutant = mutate(&genome, rng);
                    if let Some(id) =
                        branch_species(registry, birth.species, &genome, mutant, env.generation)
                    {
                        child_species = id;
                        tally.new_species.push(id);
                    }
                }

                let child_max = registry.genome(child_species).max_energy();
                let energy = (cost / 2.0).max(genome.base_energy / 3.0).min(child_max);
                back[idx] = Cell::new(child_species, energy);
                registry.record_births(child_species, 1);
                tally.births += 1;
            }
        }
    }
    grid.swap();
}
