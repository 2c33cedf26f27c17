// Species genome - typed trait values shared by a lineage of cells.
// Behaviour (movement strategy, hunting) is derived from complexity rather than stored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zones::{Hazard, ZoneKind};

/// Tolerance above which a zone counts as optimal for its hazard
pub const OPTIMAL_TOLERANCE: f32 = 0.7;
pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 5;
/// Complexity from which organisms can hunt
pub const HUNTING_COMPLEXITY: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergySource {
    Photosynthesis,
    Predation,
    Hybrid,
}

impl EnergySource {
    pub const ALL: [EnergySource; 3] = [
        EnergySource::Photosynthesis,
        EnergySource::Predation,
        EnergySource::Hybrid,
    ];

    /// Multiplier applied to energy gain depending on whether prey is adjacent
    pub fn gain_multiplier(self, prey_adjacent: bool) -> f32 {
        match (self, prey_adjacent) {
            (EnergySource::Photosynthesis, _) => 1.0,
            (EnergySource::Predation, true) => 2.0,
            (EnergySource::Predation, false) => 0.1,
            (EnergySource::Hybrid, true) => 1.5,
            (EnergySource::Hybrid, false) => 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStrategy {
    EnergySeeking,
    Flee,
    Hunt,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genome {
    pub base_energy: f32,
    pub energy_decay_rate: f32,
    pub photosynthesis_rate: f32,
    pub energy_source: EnergySource,
    pub complexity: u8,
    pub reproduction_threshold: f32,
    pub reproduction_cost: f32,
    pub mutation_rate: f32,
    pub sexual_reproduction: bool,
    pub can_be_consumed: bool,
    pub heat_tolerance: f32,
    pub cold_tolerance: f32,
    pub toxin_tolerance: f32,
    /// Generations a cell may live; 0 means no limit
    pub max_lifespan: u32,
    /// Fraction of the lifespan after which decay starts to rise
    pub age_decline_start: f32,
    pub colonial_affinity: f32,
    pub cluster_reproduction_bonus: f32,
    pub native_zone: ZoneKind,
    pub native_zone_affinity: f32,
}

impl Default for Genome {
    fn default() -> Self {
        Self {
            base_energy: 100.0,
            energy_decay_rate: 2.0,
            photosynthesis_rate: 3.0,
            energy_source: EnergySource::Photosynthesis,
            complexity: 1,
            reproduction_threshold: 60.0,
            reproduction_cost: 50.0,
            mutation_rate: 0.01,
            sexual_reproduction: false,
            can_be_consumed: true,
            heat_tolerance: 0.5,
            cold_tolerance: 0.5,
            toxin_tolerance: 0.5,
            max_lifespan: 0,
            age_decline_start: 0.7,
            colonial_affinity: 1.0,
            cluster_reproduction_bonus: 1.0,
            native_zone: ZoneKind::Fertile,
            native_zone_affinity: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraitError {
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfDomain {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("complexity {complexity} cannot hunt, so predation is not a valid energy source")]
    PredationWithoutHunting { complexity: u8 },
    #[error("the void cannot be a native zone")]
    VoidNativeZone,
}

// Trait domains: (name, min, max)
const BASE_ENERGY: (&str, f32, f32) = ("base_energy", 1.0, 200.0);
const ENERGY_DECAY: (&str, f32, f32) = ("energy_decay_rate", 0.0, 20.0);
const PHOTOSYNTHESIS: (&str, f32, f32) = ("photosynthesis_rate", 0.0, 50.0);
const REPRO_THRESHOLD: (&str, f32, f32) = ("reproduction_threshold", 0.0, 400.0);
const REPRO_COST: (&str, f32, f32) = ("reproduction_cost", 0.0, 400.0);
const MUTATION_RATE: (&str, f32, f32) = ("mutation_rate", 0.0, 1.0);
const TOLERANCE: (f32, f32) = (0.0, 1.0);
const AGE_DECLINE: (&str, f32, f32) = ("age_decline_start", 0.0, 1.0);
const COLONIAL: (&str, f32, f32) = ("colonial_affinity", 0.5, 2.0);
const CLUSTER: (&str, f32, f32) = ("cluster_reproduction_bonus", 1.0, 2.0);
const NATIVE_AFFINITY: (&str, f32, f32) = ("native_zone_affinity", 1.0, 2.0);
pub const MAX_LIFESPAN: u32 = 100_000;

fn check(domain: (&'static str, f32, f32), value: f32) -> Result<(), TraitError> {
    let (name, min, max) = domain;
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(TraitError::OutOfDomain {
            name,
            value: value as f64,
            min: min as f64,
            max: max as f64,
        })
    }
}

#[inline]
fn clamp_to(domain: (&'static str, f32, f32), value: f32) -> f32 {
    if value.is_nan() {
        return domain.1;
    }
    value.clamp(domain.1, domain.2)
}

impl Genome {
    pub fn movement_strategy(&self) -> MovementStrategy {
        match self.complexity {
            0 | 1 => MovementStrategy::EnergySeeking,
            2 => MovementStrategy::Flee,
            _ => MovementStrategy::Hunt,
        }
    }

    pub fn can_hunt(&self) -> bool {
        self.complexity >= HUNTING_COMPLEXITY
    }

    /// Fraction of a consumed prey's energy the hunter keeps
    pub fn hunting_efficiency(&self) -> f32 {
        if !self.can_hunt() {
            return 0.0;
        }
        (0.35 + 0.15 * self.complexity as f32).min(0.8)
    }

    /// Energy spent on a single move
    pub fn movement_cost(&self) -> f32 {
        2.0 + self.complexity as f32
    }

    /// Most energy a cell of this species can store
    pub fn max_energy(&self) -> f32 {
        self.base_energy * 2.0
    }

    pub fn tolerance(&self, hazard: Hazard) -> f32 {
        match hazard {
            Hazard::Heat => self.heat_tolerance,
            Hazard::Cold => self.cold_tolerance,
            Hazard::Toxin => self.toxin_tolerance,
        }
    }

    /// Zone whose hazard this genome is specialised for
    pub fn is_optimal_zone(&self, kind: ZoneKind) -> bool {
        kind.hazard()
            .map(|hazard| self.tolerance(hazard) > OPTIMAL_TOLERANCE)
            .unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), TraitError> {
        check(BASE_ENERGY, self.base_energy)?;
        check(ENERGY_DECAY, self.energy_decay_rate)?;
        check(PHOTOSYNTHESIS, self.photosynthesis_rate)?;
        check(REPRO_THRESHOLD, self.reproduction_threshold)?;
        check(REPRO_COST, self.reproduction_cost)?;
        check(MUTATION_RATE, self.mutation_rate)?;
        check(("heat_tolerance", TOLERANCE.0, TOLERANCE.1), self.heat_tolerance)?;
        check(("cold_tolerance", TOLERANCE.0, TOLERANCE.1), self.cold_tolerance)?;
        check(("toxin_tolerance", TOLERANCE.0, TOLERANCE.1), self.toxin_tolerance)?;
        check(AGE_DECLINE, self.age_decline_start)?;
        check(COLONIAL, self.colonial_affinity)?;
        check(CLUSTER, self.cluster_reproduction_bonus)?;
        check(NATIVE_AFFINITY, self.native_zone_affinity)?;
        if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&self.complexity) {
            return Err(TraitError::OutOfDomain {
                name: "complexity",
                value: self.complexity as f64,
                min: MIN_COMPLEXITY as f64,
                max: MAX_COMPLEXITY as f64,
            });
        }
        if self.max_lifespan > MAX_LIFESPAN {
            return Err(TraitError::OutOfDomain {
                name: "max_lifespan",
                value: self.max_lifespan as f64,
                min: 0.0,
                max: MAX_LIFESPAN as f64,
            });
        }
        if self.energy_source == EnergySource::Predation && !self.can_hunt() {
            return Err(TraitError::PredationWithoutHunting {
                complexity: self.complexity,
            });
        }
        if self.native_zone == ZoneKind::Void {
            return Err(TraitError::VoidNativeZone);
        }
        Ok(())
    }

    /// Pull every trait back into its domain and restore the complexity
    /// invariants. Genetic drift relies on this instead of failing.
    pub fn clamp(&mut self) {
        self.base_energy = clamp_to(BASE_ENERGY, self.base_energy);
        self.energy_decay_rate = clamp_to(ENERGY_DECAY, self.energy_decay_rate);
        self.photosynthesis_rate = clamp_to(PHOTOSYNTHESIS, self.photosynthesis_rate);
        self.reproduction_threshold = clamp_to(REPRO_THRESHOLD, self.reproduction_threshold);
        self.reproduction_cost = clamp_to(REPRO_COST, self.reproduction_cost);
        self.mutation_rate = clamp_to(MUTATION_RATE, self.mutation_rate);
        self.heat_tolerance = clamp_to(("", TOLERANCE.0, TOLERANCE.1), self.heat_tolerance);
        self.cold_tolerance = clamp_to(("", TOLERANCE.0, TOLERANCE.1), self.cold_tolerance);
        self.toxin_tolerance = clamp_to(("", TOLERANCE.0, TOLERANCE.1), self.toxin_tolerance);
        self.age_decline_start = clamp_to(AGE_DECLINE, self.age_decline_start);
        self.colonial_affinity = clamp_to(COLONIAL, self.colonial_affinity);
        self.cluster_reproduction_bonus = clamp_to(CLUSTER, self.cluster_reproduction_bonus);
        self.native_zone_affinity = clamp_to(NATIVE_AFFINITY, self.native_zone_affinity);
        self.complexity = self.complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
        self.max_lifespan = self.max_lifespan.min(MAX_LIFESPAN);

        // A pure predator that lost the ability to hunt falls back to a mixed diet
        if self.energy_source == EnergySource::Predation && !self.can_hunt() {
            self.energy_source = EnergySource::Hybrid;
        }
        if self.native_zone == ZoneKind::Void {
            self.native_zone = ZoneKind::Neutral;
        }
    }

    /// Display colour encoding complexity, native zone, specialisation and
    /// metabolic efficiency. Purely cosmetic.
    pub fn color(&self) -> [u8; 3] {
        let base_hue: f32 = match self.complexity {
            1 => 120.0,
            2 if self.photosynthesis_rate > 5.0 => 180.0,
            2 => 60.0,
            3 => 30.0,
            _ => 0.0,
        };
        let zone_shift: f32 = match self.native_zone {
            ZoneKind::Ocean => 15.0,
            ZoneKind::Desert => -15.0,
            ZoneKind::Arctic => 30.0,
            ZoneKind::Toxic => -30.0,
            ZoneKind::Volcanic => -45.0,
            _ => 0.0,
        };
        let hue = (base_hue + zone_shift).rem_euclid(360.0);

        let specialisation = self
            .heat_tolerance
            .max(self.cold_tolerance)
            .max(self.toxin_tolerance);
        let saturation = 0.4 + specialisation * 0.6;

        let efficiency = if self.energy_decay_rate > 0.0 {
            (self.photosynthesis_rate / (self.photosynthesis_rate + self.energy_decay_rate))
                .clamp(0.0, 1.0)
        } else {
            1.0
        };
        let value = (0.5 + efficiency * 0.3).clamp(0.5, 0.9);

        hsv_to_rgb(hue, saturation, value)
    }
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> [u8; 3] {
    let c = value * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaviour_is_derived_from_complexity() {
        let mut genome = Genome::default();
        assert_eq!(genome.movement_strategy(), MovementStrategy::EnergySeeking);
        assert!(!genome.can_hunt());
        assert_eq!(genome.hunting_efficiency(), 0.0);

        genome.complexity = 2;
        assert_eq!(genome.movement_strategy(), MovementStrategy::Flee);
        assert!(!genome.can_hunt());

        genome.complexity = 3;
        assert_eq!(genome.movement_strategy(), MovementStrategy::Hunt);
        assert!((genome.hunting_efficiency() - 0.8).abs() < 1e-6);
        assert_eq!(genome.movement_cost(), 5.0);

        genome.complexity = 5;
        assert_eq!(genome.hunting_efficiency(), 0.8);
    }

    #[test]
    fn energy_source_multipliers() {
        assert_eq!(EnergySource::Photosynthesis.gain_multiplier(false), 1.0);
        assert_eq!(EnergySource::Predation.gain_multiplier(false), 0.1);
        assert_eq!(EnergySource::Predation.gain_multiplier(true), 2.0);
        assert_eq!(EnergySource::Hybrid.gain_multiplier(true), 1.5);
        assert_eq!(EnergySource::Hybrid.gain_multiplier(false), 0.7);
    }

    #[test]
    fn default_genome_is_valid() {
        assert_eq!(Genome::default().validate(), Ok(()));
    }

    #[test]
    fn validate_reports_out_of_domain_traits() {
        let genome = Genome {
            heat_tolerance: 1.5,
            ..Genome::default()
        };
        assert!(matches!(
            genome.validate(),
            Err(TraitError::OutOfDomain {
                name: "heat_tolerance",
                ..
            })
        ));

        let predator = Genome {
            energy_source: EnergySource::Predation,
            complexity: 2,
            ..Genome::default()
        };
        assert_eq!(
            predator.validate(),
            Err(TraitError::PredationWithoutHunting { complexity: 2 })
        );
    }

    #[test]
    fn clamp_restores_invariants() {
        let mut genome = Genome {
            base_energy: -4.0,
            mutation_rate: 3.0,
            complexity: 9,
            native_zone_affinity: 0.2,
            colonial_affinity: f32::NAN,
            ..Genome::default()
        };
        genome.clamp();
        assert_eq!(genome.base_energy, 1.0);
        assert_eq!(genome.mutation_rate, 1.0);
        assert_eq!(genome.complexity, 5);
        assert_eq!(genome.native_zone_affinity, 1.0);
        assert_eq!(genome.colonial_affinity, 0.5);
        assert_eq!(genome.validate(), Ok(()));

        let mut fallen = Genome {
            energy_source: EnergySource::Predation,
            complexity: 1,
            ..Genome::default()
        };
        fallen.clamp();
        assert_eq!(fallen.energy_source, EnergySource::Hybrid);
    }

    #[test]
    fn optimal_zone_needs_matching_tolerance() {
        let desert_dweller = Genome {
            heat_tolerance: 0.9,
            cold_tolerance: 0.2,
            ..Genome::default()
        };
        assert!(desert_dweller.is_optimal_zone(ZoneKind::Desert));
        assert!(desert_dweller.is_optimal_zone(ZoneKind::Volcanic));
        assert!(!desert_dweller.is_optimal_zone(ZoneKind::Toxic));
        assert!(!desert_dweller.is_optimal_zone(ZoneKind::Fertile));
    }

    #[test]
    fn color_encodes_complexity_hue() {
        let simple = Genome::default().color();
        // Green dominates for simple photosynthesisers
        assert!(simple[1] > simple[0] && simple[1] > simple[2]);

        let apex = Genome {
            complexity: 5,
            energy_source: EnergySource::Predation,
            native_zone: ZoneKind::Neutral,
            ..Genome::default()
        }
        .color();
        assert!(apex[0] > apex[1] && apex[0] > apex[2]);
    }
}
