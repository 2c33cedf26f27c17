// Read-only, serializable views of the world for renderers and the HTTP API

use serde::Serialize;

use crate::grid::{Grid, Topology};
use crate::species::{SpeciesId, SpeciesRegistry};
use crate::zones::{Rect, ZoneKind, ZoneMap, ZoneMembership, ZoneProperties};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellView {
    pub x: u32,
    pub y: u32,
    pub species_id: SpeciesId,
    pub energy: f32,
    pub age: u32,
    pub color: [u8; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoneView {
    pub kind: ZoneKind,
    pub rect: Rect,
    pub properties: ZoneProperties,
    pub carrying_capacity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridView {
    pub generation: u64,
    pub width: u32,
    pub height: u32,
    pub topology: Topology,
    /// Live cells only, in row-major order
    pub cells: Vec<CellView>,
    pub zones: Vec<ZoneView>,
}

impl GridView {
    pub(crate) fn capture(
        generation: u64,
        grid: &Grid,
        zones: &ZoneMap,
        membership: &ZoneMembership,
        registry: &SpeciesRegistry,
    ) -> Self {
        let cells = grid
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| {
                let species_id = cell.species_id?;
                let (x, y) = grid.coords(idx);
                Some(CellView {
                    x,
                    y,
                    species_id,
                    energy: cell.energy,
                    age: cell.age,
                    color: registry.get(species_id).map(|s| s.color).unwrap_or([255, 255, 255]),
                })
            })
            .collect();

        let zones = zones
            .zones()
            .iter()
            .enumerate()
            .map(|(index, zone)| ZoneView {
                kind: zone.kind,
                rect: zone.rect,
                properties: zone.properties,
                carrying_capacity: membership.capacity(index),
            })
            .collect();

        Self {
            generation,
            width: grid.width(),
            height: grid.height(),
            topology: grid.topology(),
            cells,
            zones,
        }
    }

    pub fn live_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_at(&self, x: u32, y: u32) -> Option<&CellView> {
        self.cells.iter().find(|c| c.x == x && c.y == y)
    }
}
