// Global configuration - world dimensions, rule parameters, zone layout and seed species.
// Loaded from YAML/JSON files or built from the demo defaults, validated before a run starts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::genome::{EnergySource, Genome, TraitError};
use crate::grid::Topology;
use crate::seeding::{Placement, SpeciesSeedSpec};
use crate::zones::{ZoneKind, ZoneLayoutSpec};

/// Largest width or height accepted for a world
pub const MAX_GRID_EXTENT: u32 = 4096;
/// Upper bound of the global mutation scale
pub const MAX_MUTATION_SCALE: f32 = 10.0;

/// Files probed, in order, when no config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.yaml", "config.yml", "config.json"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid dimensions must be within 1..={max}, got {width}x{height}", max = MAX_GRID_EXTENT)]
    InvalidDimensions { width: u32, height: u32 },
    #[error("{name} range [{min}, {max}] is invalid: bounds must satisfy min <= max <= 8")]
    InvalidRange { name: &'static str, min: u8, max: u8 },
    #[error("zone {index} is malformed: {reason}")]
    MalformedZone { index: usize, reason: String },
    #[error("species `{species}` has an invalid genome: {source}")]
    InvalidGenome {
        species: String,
        #[source]
        source: TraitError,
    },
    #[error("species `{species}` places a cell at ({x}, {y}), outside the {width}x{height} grid")]
    PlacementOutOfBounds {
        species: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("species `{species}` has an invalid initial energy {value}")]
    InvalidInitialEnergy { species: String, value: f32 },
    #[error("initial density must be within [0, 1], got {0}")]
    InvalidDensity(f32),
    #[error("mutation rate scale must be within [0, {max}], got {value}", max = MAX_MUTATION_SCALE)]
    InvalidMutationRate { value: f32 },
    #[error("reshape interval must be at least one generation")]
    ZeroReshapeInterval,
    #[error("failed to read simulation config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse YAML simulation config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON simulation config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inclusive range of live-neighbor counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRange {
    pub min: u8,
    pub max: u8,
}

impl NeighborRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, count: u8) -> bool {
        count >= self.min && count <= self.max
    }

    /// Same range shifted up by one; low-energy cells need a denser colony
    pub fn shifted_up(&self) -> Self {
        Self {
            min: self.min.saturating_add(1),
            max: self.max.saturating_add(1),
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max || self.max > 8 {
            return Err(ConfigError::InvalidRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Automaton rule parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub survival: NeighborRange,
    pub birth: NeighborRange,
    /// Global scale applied to every species' own mutation rate
    pub mutation_rate: f32,
    /// Fraction of the grid filled when species do not give a population
    pub initial_density: f32,
    pub movement_enabled: bool,
    /// Generations between zone reshapes; `None` keeps zones fixed
    pub reshape_interval: Option<u64>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            survival: NeighborRange::new(2, 3),
            birth: NeighborRange::new(3, 3),
            mutation_rate: 1.0,
            initial_density: 0.1,
            movement_enabled: true,
            reshape_interval: None,
        }
    }
}

// Configuration struct for a whole run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub width: u32,
    pub height: u32,
    pub topology: Topology,
    /// Seed for every stochastic decision of the run
    pub seed: u64,
    pub rules: RuleConfig,
    pub zones: ZoneLayoutSpec,
    pub species: Vec<SpeciesSeedSpec>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            topology: Topology::Wrapped,
            seed: 42,
            rules: RuleConfig::default(),
            zones: ZoneLayoutSpec::Quadrant,
            species: demo_species(),
        }
    }
}

// Three lineages covering each behaviour tier. Founders start in the high energy tier so
// their first generations keep the standard survival range.
fn demo_species() -> Vec<SpeciesSeedSpec> {
    let moss = Genome {
        base_energy: 40.0,
        photosynthesis_rate: 10.0,
        energy_decay_rate: 1.0,
        reproduction_threshold: 20.0,
        reproduction_cost: 16.0,
        ..Genome::default()
    };
    let grazer = Genome {
        complexity: 2,
        base_energy: 50.0,
        photosynthesis_rate: 12.0,
        energy_decay_rate: 1.5,
        reproduction_threshold: 25.0,
        reproduction_cost: 20.0,
        colonial_affinity: 1.3,
        native_zone: ZoneKind::Paradise,
        ..Genome::default()
    };
    let hunter = Genome {
        complexity: 3,
        base_energy: 40.0,
        energy_source: EnergySource::Hybrid,
        photosynthesis_rate: 12.0,
        energy_decay_rate: 2.5,
        reproduction_threshold: 30.0,
        reproduction_cost: 20.0,
        can_be_consumed: false,
        heat_tolerance: 0.8,
        native_zone: ZoneKind::Desert,
        max_lifespan: 400,
        ..Genome::default()
    };

    vec![
        SpeciesSeedSpec::new("moss", moss).with_initial_energy(70.0),
        SpeciesSeedSpec::new("grazer", grazer)
            .with_placement(Placement::Center)
            .with_initial_energy(90.0),
        SpeciesSeedSpec::new("hunter", hunter)
            .with_placement(Placement::Edge)
            .with_initial_energy(80.0),
    ]
}

impl SimulationConfig {
    /// Load configuration from a YAML (`.yaml`/`.yml`) or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Self::from_yaml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Try the default config files in the working directory, falling back to
    /// the built-in demo world
    pub fn from_default_paths() -> Self {
        for candidate in DEFAULT_CONFIG_PATHS {
            let path = Path::new(candidate);
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => {
                    info!(path = candidate, "loaded simulation config");
                    return config;
                }
                Err(err) => warn!(path = candidate, error = %err, "ignoring unusable config file"),
            }
        }
        Self::default()
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check every value the engine relies on. Zone rectangles are checked
    /// while the zone map is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0
            || self.height == 0
            || self.width > MAX_GRID_EXTENT
            || self.height > MAX_GRID_EXTENT
        {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        self.rules.survival.validate("survival")?;
        self.rules.birth.validate("birth")?;
        let density = self.rules.initial_density;
        if !density.is_finite() || !(0.0..=1.0).contains(&density) {
            return Err(ConfigError::InvalidDensity(density));
        }
        let scale = self.rules.mutation_rate;
        if !scale.is_finite() || !(0.0..=MAX_MUTATION_SCALE).contains(&scale) {
            return Err(ConfigError::InvalidMutationRate { value: scale });
        }
        if self.rules.reshape_interval == Some(0) {
            return Err(ConfigError::ZeroReshapeInterval);
        }

        for spec in &self.species {
            spec.genome
                .validate()
                .map_err(|source| ConfigError::InvalidGenome {
                    species: spec.name.clone(),
                    source,
                })?;
            if let Some(energy) = spec.initial_energy {
                if !energy.is_finite() || energy < 0.0 {
                    return Err(ConfigError::InvalidInitialEnergy {
                        species: spec.name.clone(),
                        value: energy,
                    });
                }
            }
            if let Placement::Cells(cells) = &spec.placement {
                if let Some(&[x, y]) = cells
                    .iter()
                    .find(|[x, y]| *x >= self.width || *y >= self.height)
                {
                    return Err(ConfigError::PlacementOutOfBounds {
                        species: spec.name.clone(),
                        x,
                        y,
                        width: self.width,
                        height: self.height,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.species.len(), 3);
        for spec in &config.species {
            let energy = spec.initial_energy.unwrap_or(spec.genome.base_energy);
            assert!(
                energy / spec.genome.max_energy() > 0.7,
                "{} founders would start below the high energy tier",
                spec.name
            );
        }
    }

    #[test]
    fn rejects_bad_dimensions_and_ranges() {
        let config = SimulationConfig {
            width: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions { width: 0, .. })
        ));

        let mut config = SimulationConfig::default();
        config.height = MAX_GRID_EXTENT + 1;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.rules.survival = NeighborRange::new(4, 2);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange {
                name: "survival",
                ..
            })
        ));

        let mut config = SimulationConfig::default();
        config.rules.birth = NeighborRange::new(3, 9);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { name: "birth", .. })
        ));
    }

    #[test]
    fn rejects_bad_rules() {
        let mut config = SimulationConfig::default();
        config.rules.initial_density = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDensity(_))));

        let mut config = SimulationConfig::default();
        config.rules.mutation_rate = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMutationRate { .. })
        ));

        let mut config = SimulationConfig::default();
        config.rules.reshape_interval = Some(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroReshapeInterval)
        ));
    }

    #[test]
    fn rejects_invalid_species() {
        let mut config = SimulationConfig::default();
        config.species[0].genome.complexity = 0;
        match config.validate() {
            Err(ConfigError::InvalidGenome { species, source }) => {
                assert_eq!(species, "moss");
                assert!(matches!(
                    source,
                    TraitError::OutOfDomain {
                        name: "complexity",
                        ..
                    }
                ));
            }
            other => panic!("expected genome error, got {other:?}"),
        }

        let mut config = SimulationConfig::default();
        config.width = 10;
        config.height = 10;
        config.species[1].placement = Placement::Cells(vec![[1, 1], [10, 3]]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PlacementOutOfBounds { x: 10, y: 3, .. })
        ));
    }

    #[test]
    fn neighbor_range_shift() {
        let range = NeighborRange::new(2, 3);
        assert!(range.contains(2) && range.contains(3) && !range.contains(4));
        assert_eq!(range.shifted_up(), NeighborRange::new(3, 4));
    }

    #[test]
    fn parses_yaml_with_defaults() {
        let yaml = r#"
width: 64
height: 32
topology: bounded
seed: 9
rules:
  survival: { min: 2, max: 3 }
  birth: { min: 3, max: 3 }
  reshape_interval: 25
zones:
  layout: ring
  radius: 6
species:
  - name: lichen
    genome:
      photosynthesis_rate: 5.0
      native_zone: paradise
    placement: center
    population: 40
"#;
        let config = SimulationConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.topology, Topology::Bounded);
        assert_eq!(config.rules.reshape_interval, Some(25));
        assert_eq!(config.rules.mutation_rate, 1.0);
        assert_eq!(config.zones, ZoneLayoutSpec::Ring { radius: Some(6) });
        assert_eq!(config.species.len(), 1);
        assert_eq!(config.species[0].genome.photosynthesis_rate, 5.0);
        assert_eq!(config.species[0].genome.base_energy, 100.0);
        assert_eq!(config.species[0].placement, Placement::Center);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_json_custom_zones() {
        let json = r#"{
            "width": 20,
            "height": 20,
            "zones": {
                "layout": "custom",
                "zones": [{ "kind": "toxic", "x": 0, "y": 0, "width": 5, "height": 5 }]
            },
            "species": []
        }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert!(matches!(config.zones, ZoneLayoutSpec::Custom { ref zones } if zones.len() == 1));
        assert!(config.species.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SimulationConfig::from_file("does/not/exist.yaml").unwrap_err();
        match err {
            ConfigError::ReadFailed { path, .. } => {
                assert_eq!(path, PathBuf::from("does/not/exist.yaml"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
