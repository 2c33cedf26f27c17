// Genome mutation - one enumerated table of perturbation rules applied to a cloned genome

use ::rand as external_rand;
use external_rand::seq::SliceRandom;
use external_rand::Rng;

use crate::genome::{EnergySource, Genome};
use crate::zones::ZoneKind;

const COMPLEXITY_SHIFT_CHANCE: f64 = 0.10;
const ENERGY_SOURCE_SWITCH_CHANCE: f64 = 0.05;
const SEXUAL_FLIP_CHANCE: f64 = 0.02;
const NATIVE_ZONE_SHIFT_CHANCE: f64 = 0.02;
/// Share of native-zone shifts that move to an adjacent kind in the hazard ordering
const NATIVE_ZONE_ADJACENT_SHARE: f64 = 0.7;
const LIFESPAN_DELTA: i64 = 10;

/// Continuous traits and the half-width of their uniform perturbation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuousTrait {
    BaseEnergy,
    EnergyDecayRate,
    PhotosynthesisRate,
    ReproductionThreshold,
    ReproductionCost,
    MutationRate,
    HeatTolerance,
    ColdTolerance,
    ToxinTolerance,
    AgeDeclineStart,
    ColonialAffinity,
    ClusterReproductionBonus,
    NativeZoneAffinity,
}

impl ContinuousTrait {
    pub const ALL: [ContinuousTrait; 13] = [
        ContinuousTrait::BaseEnergy,
        ContinuousTrait::EnergyDecayRate,
        ContinuousTrait::PhotosynthesisRate,
        ContinuousTrait::ReproductionThreshold,
        ContinuousTrait::ReproductionCost,
        ContinuousTrait::MutationRate,
        ContinuousTrait::HeatTolerance,
        ContinuousTrait::ColdTolerance,
        ContinuousTrait::ToxinTolerance,
        ContinuousTrait::AgeDeclineStart,
        ContinuousTrait::ColonialAffinity,
        ContinuousTrait::ClusterReproductionBonus,
        ContinuousTrait::NativeZoneAffinity,
    ];

    pub fn delta(self) -> f32 {
        match self {
            ContinuousTrait::BaseEnergy
            | ContinuousTrait::ReproductionThreshold
            | ContinuousTrait::ReproductionCost => 5.0,
            ContinuousTrait::EnergyDecayRate | ContinuousTrait::PhotosynthesisRate => 0.5,
            ContinuousTrait::MutationRate => 0.005,
            ContinuousTrait::HeatTolerance
            | ContinuousTrait::ColdTolerance
            | ContinuousTrait::ToxinTolerance
            | ContinuousTrait::AgeDeclineStart
            | ContinuousTrait::ColonialAffinity
            | ContinuousTrait::ClusterReproductionBonus
            | ContinuousTrait::NativeZoneAffinity => 0.05,
        }
    }

    fn slot(self, genome: &mut Genome) -> &mut f32 {
        match self {
            ContinuousTrait::BaseEnergy => &mut genome.base_energy,
            ContinuousTrait::EnergyDecayRate => &mut genome.energy_decay_rate,
            ContinuousTrait::PhotosynthesisRate => &mut genome.photosynthesis_rate,
            ContinuousTrait::ReproductionThreshold => &mut genome.reproduction_threshold,
            ContinuousTrait::ReproductionCost => &mut genome.reproduction_cost,
            ContinuousTrait::MutationRate => &mut genome.mutation_rate,
            ContinuousTrait::HeatTolerance => &mut genome.heat_tolerance,
            ContinuousTrait::ColdTolerance => &mut genome.cold_tolerance,
            ContinuousTrait::ToxinTolerance => &mut genome.toxin_tolerance,
            ContinuousTrait::AgeDeclineStart => &mut genome.age_decline_start,
            ContinuousTrait::ColonialAffinity => &mut genome.colonial_affinity,
            ContinuousTrait::ClusterReproductionBonus => &mut genome.cluster_reproduction_bonus,
            ContinuousTrait::NativeZoneAffinity => &mut genome.native_zone_affinity,
        }
    }
}

/// Produce a perturbed copy of `parent`. The result always satisfies the
/// genome invariants.
pub fn mutate<R: Rng + ?Sized>(parent: &Genome, rng: &mut R) -> Genome {
    let mut genome = parent.clone();

    for rule in ContinuousTrait::ALL {
        let delta = rule.delta();
        *rule.slot(&mut genome) += rng.gen_range(-delta..=delta);
    }

    // Unbounded lifespans stay unbounded
    if genome.max_lifespan > 0 {
        let shift = rng.gen_range(-LIFESPAN_DELTA..=LIFESPAN_DELTA);
        genome.max_lifespan = (genome.max_lifespan as i64 + shift).max(1) as u32;
    }

    if rng.gen_bool(COMPLEXITY_SHIFT_CHANCE) {
        genome.complexity = if rng.gen_bool(0.5) {
            genome.complexity.saturating_add(1)
        } else {
            genome.complexity.saturating_sub(1)
        };
    }

    if rng.gen_bool(ENERGY_SOURCE_SWITCH_CHANCE) {
        let others: Vec<EnergySource> = EnergySource::ALL
            .into_iter()
            .filter(|s| *s != genome.energy_source)
            .collect();
        if let Some(source) = others.choose(rng) {
            genome.energy_source = *source;
        }
    }

    if rng.gen_bool(SEXUAL_FLIP_CHANCE) {
        genome.sexual_reproduction = !genome.sexual_reproduction;
    }

    if rng.gen_bool(NATIVE_ZONE_SHIFT_CHANCE) {
        let neighbors = genome.native_zone.hazard_neighbors();
        let adjacent = if rng.gen_bool(NATIVE_ZONE_ADJACENT_SHARE) {
            neighbors.choose(rng).copied()
        } else {
            None
        };
        genome.native_zone = match adjacent {
            Some(kind) => kind,
            None => *ZoneKind::HAZARD_ORDER
                .choose(rng)
                .unwrap_or(&genome.native_zone),
        };
    }

    genome.clamp();
    genome
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn mutation_stays_within_rule_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let parent = Genome {
            max_lifespan: 200,
            ..Genome::default()
        };
        for _ in 0..500 {
            let child = mutate(&parent, &mut rng);
            assert!((child.base_energy - parent.base_energy).abs() <= 5.0 + 1e-4);
            assert!((child.photosynthesis_rate - parent.photosynthesis_rate).abs() <= 0.5 + 1e-4);
            assert!((child.mutation_rate - parent.mutation_rate).abs() <= 0.005 + 1e-6);
            assert!(child.max_lifespan.abs_diff(parent.max_lifespan) <= 10);
            assert!(child.complexity.abs_diff(parent.complexity) <= 1);
            assert_eq!(child.validate(), Ok(()));
        }
    }

    #[test]
    fn unbounded_lifespan_is_preserved() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let parent = Genome::default();
        for _ in 0..200 {
            assert_eq!(mutate(&parent, &mut rng).max_lifespan, 0);
        }
    }

    #[test]
    fn clamps_at_domain_edges() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let parent = Genome {
            heat_tolerance: 1.0,
            cold_tolerance: 0.0,
            mutation_rate: 0.0,
            colonial_affinity: 2.0,
            ..Genome::default()
        };
        for _ in 0..200 {
            let child = mutate(&parent, &mut rng);
            assert!(child.heat_tolerance <= 1.0);
            assert!(child.cold_tolerance >= 0.0);
            assert!(child.mutation_rate >= 0.0);
            assert!(child.colonial_affinity <= 2.0);
        }
    }

    #[test]
    fn predators_never_lose_hunting_invariant() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let parent = Genome {
            complexity: 3,
            energy_source: EnergySource::Predation,
            ..Genome::default()
        };
        let mut demoted = 0;
        for _ in 0..2000 {
            let child = mutate(&parent, &mut rng);
            if child.complexity < 3 {
                demoted += 1;
                assert_ne!(child.energy_source, EnergySource::Predation);
            }
        }
        assert!(demoted > 0);
    }

    #[test]
    fn same_seed_same_mutant() {
        let parent = Genome::default();
        let a = mutate(&parent, &mut ChaCha8Rng::seed_from_u64(99));
        let b = mutate(&parent, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
        assert_ne!(a, parent);
    }
}
