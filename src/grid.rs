// Grid state - dense cell storage with a front buffer that phases read and a back
// buffer they write, swapped once the phase is complete.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::species::SpeciesId;

/// Moore neighborhood offsets in scan order (dy, dx from -1 to 1)
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Edges wrap around (torus)
    #[default]
    Wrapped,
    /// Cells past the edge do not exist
    Bounded,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Cell {
    pub species_id: Option<SpeciesId>,
    pub energy: f32,
    pub age: u32,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        species_id: None,
        energy: 0.0,
        age: 0,
    };

    pub fn new(species_id: SpeciesId, energy: f32) -> Self {
        Self {
            species_id: Some(species_id),
            energy,
            age: 0,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.species_id.is_some()
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = Cell::EMPTY;
    }
}

/// Grid geometry without the cells. Being `Copy`, it can resolve neighbors
/// while a buffer of the grid is borrowed mutably.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lattice {
    pub width: u32,
    pub height: u32,
    pub topology: Topology,
}

impl Lattice {
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (u32, u32) {
        let w = self.width as usize;
        ((idx % w) as u32, (idx / w) as u32)
    }

    /// Index of the cell at offset `(dx, dy)` from `idx`, honoring the topology
    #[inline]
    pub fn offset(&self, idx: usize, dx: i32, dy: i32) -> Option<usize> {
        let (x, y) = self.coords(idx);
        let (w, h) = (self.width as i64, self.height as i64);
        let mut nx = x as i64 + dx as i64;
        let mut ny = y as i64 + dy as i64;
        match self.topology {
            Topology::Wrapped => {
                nx = nx.rem_euclid(w);
                ny = ny.rem_euclid(h);
            }
            Topology::Bounded => {
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    return None;
                }
            }
        }
        Some(ny as usize * self.width as usize + nx as usize)
    }

    /// Moore neighbors of `idx` in scan order. On tiny wrapped grids the same
    /// index can appear more than once, like in any torus automaton.
    #[inline]
    pub fn neighbors(&self, idx: usize) -> [Option<usize>; 8] {
        let mut out = [None; 8];
        for (slot, (dx, dy)) in out.iter_mut().zip(NEIGHBOR_OFFSETS) {
            *slot = self.offset(idx, dx, dy);
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct Grid {
    lattice: Lattice,
    front: Vec<Cell>,
    back: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u32, height: u32, topology: Topology) -> Self {
        let lattice = Lattice {
            width,
            height,
            topology,
        };
        Self {
            lattice,
            front: vec![Cell::EMPTY; lattice.len()],
            back: vec![Cell::EMPTY; lattice.len()],
        }
    }

    pub fn width(&self) -> u32 {
        self.lattice.width
    }

    pub fn height(&self) -> u32 {
        self.lattice.height
    }

    pub fn topology(&self) -> Topology {
        self.lattice.topology
    }

    pub fn lattice(&self) -> Lattice {
        self.lattice
    }

    pub fn len(&self) -> usize {
        self.front.len()
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    #[inline]
    pub fn idx(&self, x: u32, y: u32) -> usize {
        self.lattice.idx(x, y)
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> (u32, u32) {
        self.lattice.coords(idx)
    }

    /// Current generation's cells
    pub fn cells(&self) -> &[Cell] {
        &self.front
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Cell> {
        if x < self.lattice.width && y < self.lattice.height {
            Some(&self.front[self.idx(x, y)])
        } else {
            None
        }
    }

    #[inline]
    pub fn cell(&self, idx: usize) -> &Cell {
        &self.front[idx]
    }

    /// Direct write into the front buffer, used while seeding before the
    /// first generation runs
    pub fn place(&mut self, idx: usize, cell: Cell) {
        self.front[idx] = cell;
    }

    /// Start a phase: the back buffer becomes a copy of the front buffer and is
    /// returned alongside it for writing
    pub fn begin_phase(&mut self) -> (&[Cell], &mut [Cell]) {
        self.back.copy_from_slice(&self.front);
        (&self.front, &mut self.back)
    }

    /// Publish the back buffer as the new front buffer
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn live_count(&self) -> usize {
        self.front.iter().filter(|c| c.is_alive()).count()
    }

    #[inline]
    pub fn offset(&self, idx: usize, dx: i32, dy: i32) -> Option<usize> {
        self.lattice.offset(idx, dx, dy)
    }

    #[inline]
    pub fn neighbors(&self, idx: usize) -> [Option<usize>; 8] {
        self.lattice.neighbors(idx)
    }

    /// Live Moore-neighbor count of every cell in the front buffer, computed
    /// row-parallel
    pub fn neighbor_counts(&self) -> Vec<u8> {
        let width = self.lattice.width as usize;
        let mut counts = vec![0u8; self.front.len()];
        counts
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, count) in row.iter_mut().enumerate() {
                    let idx = y * width + x;
                    *count = self
                        .neighbors(idx)
                        .into_iter()
                        .flatten()
                        .filter(|&n| self.front[n].is_alive())
                        .count() as u8;
                }
            });
        counts
    }

    /// Manhattan distance between two cells, taking the short way round on a torus
    pub fn distance(&self, a: usize, b: usize) -> u32 {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        let mut dx = ax.abs_diff(bx);
        let mut dy = ay.abs_diff(by);
        if self.lattice.topology == Topology::Wrapped {
            dx = dx.min(self.lattice.width - dx);
            dy = dy.min(self.lattice.height - dy);
        }
        dx + dy
    }

    /// Every index within Chebyshev radius `radius` of `idx`, excluding itself
    pub fn within_radius(&self, idx: usize, radius: i32) -> impl Iterator<Item = usize> + '_ {
        (-radius..=radius).flat_map(move |dy| {
            (-radius..=radius).filter_map(move |dx| {
                if dx == 0 && dy == 0 {
                    None
                } else {
                    self.offset(idx, dx, dy).filter(|&n| n != idx)
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(width: u32, height: u32, topology: Topology, live: &[(u32, u32)]) -> Grid {
        let mut grid = Grid::new(width, height, topology);
        for &(x, y) in live {
            let idx = grid.idx(x, y);
            grid.place(idx, Cell::new(SpeciesId(0), 10.0));
        }
        grid
    }

    #[test]
    fn alive_is_derived_from_species() {
        let mut cell = Cell::new(SpeciesId(3), 5.0);
        assert!(cell.is_alive());
        cell.clear();
        assert!(!cell.is_alive());
        assert_eq!(cell, Cell::EMPTY);
    }

    #[test]
    fn neighbor_counts_wrap_on_torus() {
        let grid = seeded(5, 5, Topology::Wrapped, &[(0, 0), (4, 4), (4, 0)]);
        let counts = grid.neighbor_counts();
        // (0, 0) sees (4, 4) and (4, 0) across the edges
        assert_eq!(counts[grid.idx(0, 0)], 2);
        assert_eq!(counts[grid.idx(4, 4)], 2);
        assert_eq!(counts[grid.idx(2, 2)], 0);
    }

    #[test]
    fn neighbor_counts_stop_at_bounded_edges() {
        let grid = seeded(5, 5, Topology::Bounded, &[(0, 0), (4, 4), (4, 0)]);
        let counts = grid.neighbor_counts();
        assert_eq!(counts[grid.idx(0, 0)], 0);
        assert_eq!(counts[grid.idx(3, 0)], 1);
        assert!(grid.neighbors(0).iter().filter(|n| n.is_some()).count() == 3);
    }

    #[test]
    fn distance_takes_short_way_round() {
        let wrapped = Grid::new(10, 10, Topology::Wrapped);
        assert_eq!(wrapped.distance(wrapped.idx(0, 0), wrapped.idx(9, 9)), 2);
        let bounded = Grid::new(10, 10, Topology::Bounded);
        assert_eq!(bounded.distance(bounded.idx(0, 0), bounded.idx(9, 9)), 18);
    }

    #[test]
    fn phase_writes_land_after_swap() {
        let mut grid = seeded(3, 3, Topology::Wrapped, &[(1, 1)]);
        {
            let (front, back) = grid.begin_phase();
            assert!(front[4].is_alive());
            back[4].clear();
            back[0] = Cell::new(SpeciesId(1), 2.0);
            // Front is untouched until the swap
            assert!(front[4].is_alive());
        }
        grid.swap();
        assert!(!grid.cell(4).is_alive());
        assert_eq!(grid.cell(0).species_id, Some(SpeciesId(1)));
    }

    #[test]
    fn lattice_resolves_neighbors_while_back_buffer_is_borrowed() {
        let mut grid = seeded(4, 3, Topology::Bounded, &[(0, 0), (1, 1)]);
        let lattice = grid.lattice();
        let (_, back) = grid.begin_phase();
        let corner = lattice.idx(0, 0);
        let live: Vec<usize> = lattice
            .neighbors(corner)
            .into_iter()
            .flatten()
            .filter(|&n| back[n].is_alive())
            .collect();
        assert_eq!(live, vec![lattice.idx(1, 1)]);
        assert_eq!(lattice.coords(lattice.idx(3, 2)), (3, 2));
        assert_eq!(lattice.offset(corner, -1, 0), None);
        assert_eq!(lattice.len(), 12);
    }

    #[test]
    fn radius_scan_covers_square() {
        let grid = Grid::new(9, 9, Topology::Bounded);
        assert_eq!(grid.within_radius(grid.idx(4, 4), 2).count(), 24);
        assert_eq!(grid.within_radius(grid.idx(0, 0), 2).count(), 8);
    }
}
