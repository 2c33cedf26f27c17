// Environmental zones - regions of the grid with their own energy, mutation and
// reproduction rules. Zones can drift over time when reshaping is enabled.

use ::rand as external_rand;
use external_rand::seq::SliceRandom;
use external_rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConfigError;

/// Smallest width/height a zone may shrink to while reshaping
pub const MIN_ZONE_EXTENT: u32 = 4;
/// Largest translation/resize step applied during a reshape event
pub const MAX_RESHAPE_STEP: i64 = 8;

const RETYPE_CHANCE: f64 = 0.3;
const MOVE_CHANCE: f64 = 0.7;
const RESIZE_CHANCE: f64 = 0.6;

/// Zone kinds with preset properties
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Paradise,
    Fertile,
    Ocean,
    Neutral,
    Arctic,
    Desert,
    Volcanic,
    Toxic,
    Void,
}

/// Environmental hazard a zone exposes organisms to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    Heat,
    Cold,
    Toxin,
}

impl ZoneKind {
    /// Zones ordered from most hospitable to most hostile. Native-zone mutations
    /// prefer moving one step along this ordering.
    pub const HAZARD_ORDER: [ZoneKind; 8] = [
        ZoneKind::Paradise,
        ZoneKind::Fertile,
        ZoneKind::Ocean,
        ZoneKind::Neutral,
        ZoneKind::Arctic,
        ZoneKind::Desert,
        ZoneKind::Volcanic,
        ZoneKind::Toxic,
    ];

    /// Kinds a zone may turn into while reshaping
    pub const RESHAPE_KINDS: [ZoneKind; 7] = [
        ZoneKind::Paradise,
        ZoneKind::Fertile,
        ZoneKind::Ocean,
        ZoneKind::Arctic,
        ZoneKind::Desert,
        ZoneKind::Volcanic,
        ZoneKind::Toxic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ZoneKind::Paradise => "paradise",
            ZoneKind::Fertile => "fertile",
            ZoneKind::Ocean => "ocean",
            ZoneKind::Neutral => "neutral",
            ZoneKind::Arctic => "arctic",
            ZoneKind::Desert => "desert",
            ZoneKind::Volcanic => "volcanic",
            ZoneKind::Toxic => "toxic",
            ZoneKind::Void => "void",
        }
    }

    pub fn hazard(self) -> Option<Hazard> {
        match self {
            ZoneKind::Ocean | ZoneKind::Arctic => Some(Hazard::Cold),
            ZoneKind::Desert | ZoneKind::Volcanic => Some(Hazard::Heat),
            ZoneKind::Toxic => Some(Hazard::Toxin),
            _ => None,
        }
    }

    /// Position in [`ZoneKind::HAZARD_ORDER`], `None` for the void
    pub fn hazard_rank(self) -> Option<usize> {
        Self::HAZARD_ORDER.iter().position(|k| *k == self)
    }

    /// Kinds directly next to this one in the hazard ordering
    pub fn hazard_neighbors(self) -> Vec<ZoneKind> {
        let Some(rank) = self.hazard_rank() else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(2);
        if rank > 0 {
            out.push(Self::HAZARD_ORDER[rank - 1]);
        }
        if rank + 1 < Self::HAZARD_ORDER.len() {
            out.push(Self::HAZARD_ORDER[rank + 1]);
        }
        out
    }

    pub fn preset(self) -> ZoneProperties {
        let (energy, decay, mutation, difficulty, density) = match self {
            ZoneKind::Paradise => (2.0, 0.5, 0.5, 0.7, 0.40),
            ZoneKind::Fertile => (1.5, 0.8, 1.0, 1.0, 0.35),
            ZoneKind::Ocean => (1.2, 1.0, 1.2, 1.1, 0.30),
            ZoneKind::Neutral => (1.0, 1.0, 1.0, 1.0, 0.25),
            ZoneKind::Arctic => (0.6, 1.3, 0.8, 1.3, 0.15),
            ZoneKind::Desert => (0.5, 1.5, 1.0, 1.2, 0.15),
            ZoneKind::Volcanic => (0.8, 1.8, 2.0, 1.4, 0.12),
            ZoneKind::Toxic => (1.0, 2.0, 3.0, 1.5, 0.10),
            ZoneKind::Void => (0.0, 1.0, 1.0, 1.0, 0.0),
        };
        ZoneProperties {
            energy_multiplier: energy,
            decay_multiplier: decay,
            mutation_multiplier: mutation,
            reproduction_difficulty: difficulty,
            capacity_density: density,
            can_enter: self != ZoneKind::Void,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneProperties {
    pub energy_multiplier: f32,
    pub decay_multiplier: f32,
    pub mutation_multiplier: f32,
    pub reproduction_difficulty: f32,
    /// Carrying capacity per grid cell covered by the zone
    pub capacity_density: f32,
    pub can_enter: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub rect: Rect,
    pub properties: ZoneProperties,
    /// Absolute capacity from the layout, replaces the density-derived one
    pub capacity_override: Option<u32>,
}

impl Zone {
    pub fn new(kind: ZoneKind, rect: Rect) -> Self {
        Self {
            kind,
            rect,
            properties: kind.preset(),
            capacity_override: None,
        }
    }

    /// Capacity of the zone when it owns `cells` grid cells. Overlapped parts
    /// of the rectangle belong to higher-priority zones and do not count.
    pub fn carrying_capacity(&self, cells: u64) -> u32 {
        match self.capacity_override {
            Some(capacity) => capacity,
            None => (self.properties.capacity_density as f64 * cells as f64).round() as u32,
        }
    }

    /// How attractive the zone is to energy-seeking organisms
    pub fn energy_score(&self) -> f32 {
        if !self.properties.can_enter {
            return 0.0;
        }
        self.properties.energy_multiplier / self.properties.decay_multiplier.max(0.01)
    }
}

/// Piecewise population-pressure curve: a bonus while a zone is sparsely
/// populated, a smooth decline to neutral at capacity, a moderate penalty up
/// to 150% and a harsh floor beyond.
pub fn population_pressure(live: usize, capacity: u32) -> f32 {
    if capacity == 0 {
        return 0.0;
    }
    let ratio = live as f32 / capacity as f32;
    if ratio < 0.5 {
        1.3
    } else if ratio < 1.0 {
        1.3 - 0.3 * (ratio - 0.5) / 0.5
    } else if ratio < 1.5 {
        1.0 - 0.2 * (ratio - 1.0) / 0.5
    } else {
        0.5
    }
}

/// One rectangle of a custom layout, with optional overrides of the kind preset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub kind: ZoneKind,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub energy_multiplier: Option<f32>,
    #[serde(default)]
    pub decay_multiplier: Option<f32>,
    #[serde(default)]
    pub mutation_multiplier: Option<f32>,
    #[serde(default)]
    pub reproduction_difficulty: Option<f32>,
    #[serde(default)]
    pub carrying_capacity: Option<u32>,
}

impl ZoneSpec {
    pub fn new(kind: ZoneKind, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            kind,
            x,
            y,
            width,
            height,
            energy_multiplier: None,
            decay_multiplier: None,
            mutation_multiplier: None,
            reproduction_difficulty: None,
            carrying_capacity: None,
        }
    }

    fn build(&self, index: usize, grid_width: u32, grid_height: u32) -> Result<Zone, ConfigError> {
        let malformed = |reason: String| ConfigError::MalformedZone { index, reason };
        if self.width == 0 || self.height == 0 {
            return Err(malformed(format!(
                "zone must have a positive size, got {}x{}",
                self.width, self.height
            )));
        }
        if self.x as u64 + self.width as u64 > grid_width as u64
            || self.y as u64 + self.height as u64 > grid_height as u64
        {
            return Err(malformed(format!(
                "rectangle ({}, {}) {}x{} exceeds the {}x{} grid",
                self.x, self.y, self.width, self.height, grid_width, grid_height
            )));
        }

        let mut zone = Zone::new(
            self.kind,
            Rect {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            },
        );
        let overrides = [
            ("energy_multiplier", self.energy_multiplier, &mut zone.properties.energy_multiplier),
            ("decay_multiplier", self.decay_multiplier, &mut zone.properties.decay_multiplier),
            (
                "mutation_multiplier",
                self.mutation_multiplier,
                &mut zone.properties.mutation_multiplier,
            ),
            (
                "reproduction_difficulty",
                self.reproduction_difficulty,
                &mut zone.properties.reproduction_difficulty,
            ),
        ];
        for (name, value, slot) in overrides {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(malformed(format!("{name} must be finite and >= 0, got {value}")));
                }
                *slot = value;
            }
        }
        if zone.properties.decay_multiplier <= 0.0 {
            return Err(malformed("decay_multiplier must be positive".to_string()));
        }
        if zone.properties.reproduction_difficulty <= 0.0 {
            return Err(malformed("reproduction_difficulty must be positive".to_string()));
        }
        zone.capacity_override = self.carrying_capacity;
        Ok(zone)
    }
}

/// How the zones of a world are laid out at construction
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ZoneLayoutSpec {
    /// Whole grid is neutral ground
    #[default]
    Neutral,
    /// Fertile, desert, toxic and paradise quadrants
    Quadrant,
    /// Central paradise surrounded by a toxic ring
    Ring {
        #[serde(default)]
        radius: Option<u32>,
    },
    /// Random rectangles drawn from the run's seed
    Random {
        #[serde(default)]
        count: Option<u32>,
    },
    Custom { zones: Vec<ZoneSpec> },
}

/// Kind of change applied to a zone during a reshape event
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ZoneChange {
    Retyped { from: ZoneKind, to: ZoneKind },
    Moved { dx: i64, dy: i64 },
    Resized { dw: i64, dh: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoneEvent {
    pub generation: u64,
    /// Index into the zone list (0 is the background zone)
    pub zone: usize,
    pub change: ZoneChange,
}

/// Per-generation lookup from cell index to owning zone index, with the
/// resulting cell count and carrying capacity of each zone
#[derive(Clone, Debug)]
pub struct ZoneMembership {
    ids: Vec<u16>,
    cells: Vec<u64>,
    capacities: Vec<u32>,
}

impl ZoneMembership {
    #[inline]
    pub fn zone_of(&self, idx: usize) -> usize {
        self.ids[idx] as usize
    }

    /// Grid cells owned by zone `zone`
    pub fn cell_count(&self, zone: usize) -> u64 {
        self.cells[zone]
    }

    pub fn capacity(&self, zone: usize) -> u32 {
        self.capacities[zone]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// All zones of a world. Index 0 is the neutral background covering the whole
/// grid; later zones take priority over earlier ones.
#[derive(Clone, Debug)]
pub struct ZoneMap {
    width: u32,
    height: u32,
    zones: Vec<Zone>,
}

impl ZoneMap {
    pub fn build<R: Rng>(
        spec: &ZoneLayoutSpec,
        width: u32,
        height: u32,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        let background = Zone::new(
            ZoneKind::Neutral,
            Rect {
                x: 0,
                y: 0,
                width,
                height,
            },
        );
        let mut map = Self {
            width,
            height,
            zones: vec![background],
        };

        match spec {
            ZoneLayoutSpec::Neutral => {}
            ZoneLayoutSpec::Quadrant => map.add_quadrants(),
            ZoneLayoutSpec::Ring { radius } => map.add_ring(*radius),
            ZoneLayoutSpec::Random { count } => {
                let count = match count {
                    Some(count) => *count,
                    None => rng.gen_range(3..=7),
                };
                map.add_random(count, rng);
            }
            ZoneLayoutSpec::Custom { zones } => {
                for (i, zone_spec) in zones.iter().enumerate() {
                    // Index 0 is the background, custom zones start at 1
                    let zone = zone_spec.build(i + 1, width, height)?;
                    map.zones.push(zone);
                }
            }
        }

        if map.zones.len() > u16::MAX as usize {
            return Err(ConfigError::MalformedZone {
                index: map.zones.len() - 1,
                reason: format!("at most {} zones are supported", u16::MAX),
            });
        }
        Ok(map)
    }

    fn push_clipped(&mut self, kind: ZoneKind, x: i64, y: i64, w: i64, h: i64) {
        let x0 = x.clamp(0, self.width as i64);
        let y0 = y.clamp(0, self.height as i64);
        let x1 = (x + w).clamp(0, self.width as i64);
        let y1 = (y + h).clamp(0, self.height as i64);
        if x1 > x0 && y1 > y0 {
            self.zones.push(Zone::new(
                kind,
                Rect {
                    x: x0 as u32,
                    y: y0 as u32,
                    width: (x1 - x0) as u32,
                    height: (y1 - y0) as u32,
                },
            ));
        }
    }

    fn add_quadrants(&mut self) {
        let hw = (self.width / 2) as i64;
        let hh = (self.height / 2) as i64;
        let (w, h) = (self.width as i64, self.height as i64);
        self.push_clipped(ZoneKind::Fertile, 0, 0, hw, hh);
        self.push_clipped(ZoneKind::Desert, hw, 0, w - hw, hh);
        self.push_clipped(ZoneKind::Toxic, 0, hh, hw, h - hh);
        self.push_clipped(ZoneKind::Paradise, hw, hh, w - hw, h - hh);
    }

    fn add_ring(&mut self, radius: Option<u32>) {
        let radius = radius
            .unwrap_or(self.width.min(self.height) / 4)
            .max(1) as i64;
        let ring = (radius * 4 / 5).max(1);
        let cx = (self.width / 2) as i64;
        let cy = (self.height / 2) as i64;

        self.push_clipped(ZoneKind::Paradise, cx - radius, cy - radius, radius * 2, radius * 2);
        // Toxic ring approximated with four bands
        let outer = radius * 2 + ring * 2;
        self.push_clipped(ZoneKind::Toxic, cx - radius - ring, cy - radius - ring, outer, ring);
        self.push_clipped(ZoneKind::Toxic, cx - radius - ring, cy + radius, outer, ring);
        self.push_clipped(ZoneKind::Toxic, cx - radius - ring, cy - radius, ring, radius * 2);
        self.push_clipped(ZoneKind::Toxic, cx + radius, cy - radius, ring, radius * 2);
    }

    fn add_random<R: Rng>(&mut self, count: u32, rng: &mut R) {
        let kinds: Vec<ZoneKind> = ZoneKind::HAZARD_ORDER
            .iter()
            .copied()
            .chain(std::iter::once(ZoneKind::Void))
            .filter(|k| *k != ZoneKind::Neutral)
            .collect();

        for _ in 0..count {
            let w = rng.gen_range(20.min(self.width)..=60.min(self.width));
            let h = rng.gen_range(20.min(self.height)..=60.min(self.height));
            let x = rng.gen_range(0..=self.width - w);
            let y = rng.gen_range(0..=self.height - h);
            let kind = *kinds.choose(rng).unwrap_or(&ZoneKind::Fertile);
            self.zones.push(Zone::new(
                kind,
                Rect {
                    x,
                    y,
                    width: w,
                    height: h,
                },
            ));
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: usize) -> &Zone {
        &self.zones[index]
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Index of the zone owning `(x, y)`
    pub fn zone_index_at(&self, x: u32, y: u32) -> usize {
        self.zones
            .iter()
            .enumerate()
            .rev()
            .find(|(_, zone)| zone.rect.contains(x, y))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn zone_at(&self, x: u32, y: u32) -> &Zone {
        &self.zones[self.zone_index_at(x, y)]
    }

    /// Resolve every cell's zone once. Membership cannot change mid-generation,
    /// so phases share this table instead of scanning rectangles per lookup.
    pub fn membership(&self) -> ZoneMembership {
        let mut ids = vec![0u16; self.width as usize * self.height as usize];
        // Paint in priority order so later zones overwrite earlier ones
        for (zone_idx, zone) in self.zones.iter().enumerate().skip(1) {
            let r = zone.rect;
            for y in r.y..(r.y + r.height).min(self.height) {
                let row = y as usize * self.width as usize;
                for x in r.x..(r.x + r.width).min(self.width) {
                    ids[row + x as usize] = zone_idx as u16;
                }
            }
        }
        let mut cells = vec![0u64; self.zones.len()];
        for &id in &ids {
            cells[id as usize] += 1;
        }
        let capacities = self
            .zones
            .iter()
            .zip(&cells)
            .map(|(zone, &count)| zone.carrying_capacity(count))
            .collect();
        ZoneMembership { ids, cells, capacities }
    }

    /// Population-pressure multiplier per zone for the given alive flags
    pub fn pressure_table(
        &self,
        membership: &ZoneMembership,
        alive: impl Iterator<Item = bool>,
    ) -> Vec<f32> {
        let mut counts = vec![0usize; self.zones.len()];
        for (idx, is_alive) in alive.enumerate() {
            if is_alive {
                counts[membership.zone_of(idx)] += 1;
            }
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(zone, live)| population_pressure(live, membership.capacity(zone)))
            .collect()
    }

    /// Apply scheduled environmental drift for `generation`, if any is due.
    pub fn maybe_reshape<R: Rng>(
        &mut self,
        generation: u64,
        interval: Option<u64>,
        rng: &mut R,
    ) -> Vec<ZoneEvent> {
        let Some(interval) = interval else {
            return Vec::new();
        };
        if interval == 0 || generation == 0 || generation % interval != 0 {
            return Vec::new();
        }

        let mut events = Vec::new();
        let (grid_w, grid_h) = (self.width as i64, self.height as i64);

        for (index, zone) in self.zones.iter_mut().enumerate().skip(1) {
            if rng.gen_bool(RETYPE_CHANCE) {
                let from = zone.kind;
                let to = *ZoneKind::RESHAPE_KINDS.choose(rng).unwrap_or(&from);
                if to != from {
                    zone.kind = to;
                    zone.properties = to.preset();
                    zone.capacity_override = None;
                    events.push(ZoneEvent {
                        generation,
                        zone: index,
                        change: ZoneChange::Retyped { from, to },
                    });
                }
            }

            if rng.gen_bool(MOVE_CHANCE) {
                let dx = rng.gen_range(-MAX_RESHAPE_STEP..=MAX_RESHAPE_STEP);
                let dy = rng.gen_range(-MAX_RESHAPE_STEP..=MAX_RESHAPE_STEP);
                let r = &mut zone.rect;
                let nx = (r.x as i64 + dx).clamp(0, grid_w - r.width as i64);
                let ny = (r.y as i64 + dy).clamp(0, grid_h - r.height as i64);
                let (applied_dx, applied_dy) = (nx - r.x as i64, ny - r.y as i64);
                if applied_dx != 0 || applied_dy != 0 {
                    r.x = nx as u32;
                    r.y = ny as u32;
                    events.push(ZoneEvent {
                        generation,
                        zone: index,
                        change: ZoneChange::Moved {
                            dx: applied_dx,
                            dy: applied_dy,
                        },
                    });
                }
            }

            if rng.gen_bool(RESIZE_CHANCE) {
                let dw = rng.gen_range(-MAX_RESHAPE_STEP..=MAX_RESHAPE_STEP);
                let dh = rng.gen_range(-MAX_RESHAPE_STEP..=MAX_RESHAPE_STEP);
                let r = &mut zone.rect;
                let min_w = (MIN_ZONE_EXTENT as i64).min(grid_w);
                let min_h = (MIN_ZONE_EXTENT as i64).min(grid_h);
                let nw = (r.width as i64 + dw).clamp(min_w, grid_w);
                let nh = (r.height as i64 + dh).clamp(min_h, grid_h);
                let (applied_dw, applied_dh) = (nw - r.width as i64, nh - r.height as i64);
                if applied_dw != 0 || applied_dh != 0 {
                    r.width = nw as u32;
                    r.height = nh as u32;
                    // Keep the rectangle inside the grid after growing
                    r.x = r.x.min(self.width - r.width);
                    r.y = r.y.min(self.height - r.height);
                    events.push(ZoneEvent {
                        generation,
                        zone: index,
                        change: ZoneChange::Resized {
                            dw: applied_dw,
                            dh: applied_dh,
                        },
                    });
                }
            }
        }

        if !events.is_empty() {
            info!(
                generation,
                changes = events.len(),
                "environment reshaped"
            );
        }
        events
    }
}
