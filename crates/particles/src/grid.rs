//! Uniform-grid spatial hash for neighbor search.
//!
//! Each step the grid is rebuilt from scratch in four phases:
//!
//! 1. **Hash**: linearized cell index for every particle
//! 2. **Sort**: `(hash, index)` pairs by hash ascending
//! 3. **Bounds**: scan sorted hashes for run boundaries, giving each
//!    occupied cell a half-open range `[cell_start, cell_end)` of sorted slots
//! 4. **Gather**: copy positions/velocities into sorted order
//!
//! After this, particles sharing a cell are contiguous, and a neighbor scan
//! over the 27 surrounding cells touches only nearby memory.

use std::fmt;
use std::ops::Range;

use glam::{DVec3, IVec3, UVec3};
use rayon::prelude::*;

use crate::constants::EMPTY_CELL;
use crate::error::{alloc_filled, SimError};
use crate::params::SimParams;

/// A broken partition or permutation invariant after the bounds phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionError {
    /// A sorted slot is claimed by no cell range
    Gap { slot: usize },
    /// A cell range starts before the previous range ended
    Overlap { cell: usize, start: u32, expected: u32 },
    /// Only one of a cell's two bounds is the empty sentinel
    HalfEmpty { cell: usize },
    /// A slot inside a cell's range carries another cell's hash
    ForeignHash { cell: usize, slot: usize, hash: u32 },
    /// `grid_particle_index` is not a permutation
    NotPermutation { index: u32 },
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PartitionError::Gap { slot } => write!(f, "sorted slot {slot} belongs to no cell"),
            PartitionError::Overlap { cell, start, expected } => write!(
                f,
                "cell {cell} starts at slot {start}, previous range ended at {expected}"
            ),
            PartitionError::HalfEmpty { cell } => {
                write!(f, "cell {cell} has exactly one empty bound")
            }
            PartitionError::ForeignHash { cell, slot, hash } => {
                write!(f, "slot {slot} in cell {cell} has hash {hash}")
            }
            PartitionError::NotPermutation { index } => {
                write!(f, "particle index {index} is missing or duplicated")
            }
        }
    }
}

pub struct SpatialHashGrid {
    grid_size: UVec3,
    world_origin: DVec3,
    cell_size: DVec3,

    /// Cell hash per sorted slot
    grid_particle_hash: Vec<u32>,
    /// Original particle index per sorted slot
    grid_particle_index: Vec<u32>,
    /// `(hash, index)` scratch for the sort
    sort_pairs: Vec<(u32, u32)>,

    /// First sorted slot of each cell, or `EMPTY_CELL`
    cell_start: Vec<u32>,
    /// One past the last sorted slot of each cell, or `EMPTY_CELL`
    cell_end: Vec<u32>,

    sorted_position: Vec<DVec3>,
    sorted_velocity: Vec<DVec3>,

    /// Permutation check marks
    seen: Vec<bool>,
}

impl SpatialHashGrid {
    /// Allocate every buffer for `num_particles` particles on `params.grid_size`.
    pub fn new(num_particles: usize, params: &SimParams) -> Result<Self, SimError> {
        let size = params.grid_size;
        if size.min_element() == 0 {
            return Err(SimError::InvalidGridSize {
                x: size.x,
                y: size.y,
                z: size.z,
            });
        }
        let num_cells = (size.x as usize)
            .checked_mul(size.y as usize)
            .and_then(|n| n.checked_mul(size.z as usize))
            .filter(|&n| n <= u32::MAX as usize)
            .ok_or(SimError::Allocation {
                what: "cell bounds",
                len: usize::MAX,
            })?;
        // Sorted slots are stored as u32 and EMPTY_CELL must stay out of range
        if num_particles >= EMPTY_CELL as usize {
            return Err(SimError::Allocation {
                what: "particle index",
                len: num_particles,
            });
        }

        Ok(Self {
            grid_size: size,
            world_origin: params.world_origin,
            cell_size: params.cell_size,
            grid_particle_hash: alloc_filled("particle hash", num_particles, 0)?,
            grid_particle_index: alloc_filled("particle index", num_particles, 0)?,
            sort_pairs: alloc_filled("sort pairs", num_particles, (0, 0))?,
            cell_start: alloc_filled("cell start", num_cells, EMPTY_CELL)?,
            cell_end: alloc_filled("cell end", num_cells, EMPTY_CELL)?,
            sorted_position: alloc_filled("sorted position", num_particles, DVec3::ZERO)?,
            sorted_velocity: alloc_filled("sorted velocity", num_particles, DVec3::ZERO)?,
            seen: alloc_filled("partition check", num_particles, false)?,
        })
    }

    /// Pick up grid placement changes from the parameter set.
    ///
    /// Grid dimensions are fixed at construction; only origin and cell
    /// size follow the parameters.
    pub fn sync_params(&mut self, params: &SimParams) {
        debug_assert_eq!(params.grid_size, self.grid_size);
        self.world_origin = params.world_origin;
        self.cell_size = params.cell_size;
    }

    pub fn grid_size(&self) -> UVec3 {
        self.grid_size
    }

    pub fn num_cells(&self) -> usize {
        self.cell_start.len()
    }

    pub fn num_particles(&self) -> usize {
        self.grid_particle_index.len()
    }

    // ========== Hashing ==========

    /// Unclamped integer cell coordinates of a position.
    #[inline]
    pub fn cell_coords(&self, position: DVec3) -> IVec3 {
        let rel = (position - self.world_origin) / self.cell_size;
        // NaN maps to 0 through the saturating cast
        rel.floor().as_ivec3()
    }

    /// Clamp cell coordinates into the grid.
    #[inline]
    pub fn clamp_cell(&self, cell: IVec3) -> IVec3 {
        cell.clamp(IVec3::ZERO, self.grid_size.as_ivec3() - IVec3::ONE)
    }

    /// Cell a particle is hashed into: its own cell, or the nearest one
    /// when it lies outside the domain.
    #[inline]
    pub fn home_cell(&self, position: DVec3) -> IVec3 {
        self.clamp_cell(self.cell_coords(position))
    }

    /// Linearized index of a cell, clamping coordinates into the grid.
    #[inline]
    pub fn cell_hash(&self, cell: IVec3) -> u32 {
        let c = self.clamp_cell(cell).as_uvec3();
        c.x + c.y * self.grid_size.x + c.z * self.grid_size.x * self.grid_size.y
    }

    /// Cell index containing `position`; out-of-domain positions map to the nearest cell.
    #[inline]
    pub fn compute_hash(&self, position: DVec3) -> u32 {
        self.cell_hash(self.home_cell(position))
    }

    #[inline]
    fn in_grid(&self, cell: IVec3) -> bool {
        cell.cmpge(IVec3::ZERO).all() && cell.cmplt(self.grid_size.as_ivec3()).all()
    }

    // ========== Phases ==========

    /// Hash every particle and sort the pairs by cell.
    pub fn build_and_sort(&mut self, positions: &[DVec3]) {
        debug_assert_eq!(positions.len(), self.num_particles());

        let mut pairs = std::mem::take(&mut self.sort_pairs);
        pairs
            .par_iter_mut()
            .zip(positions.par_iter())
            .enumerate()
            .for_each(|(i, (pair, &pos))| {
                *pair = (self.compute_hash(pos), i as u32);
            });

        pairs.par_sort_unstable_by_key(|&(hash, _)| hash);

        self.grid_particle_hash
            .par_iter_mut()
            .zip(self.grid_particle_index.par_iter_mut())
            .zip(pairs.par_iter())
            .for_each(|((hash, index), &(h, i))| {
                *hash = h;
                *index = i;
            });
        self.sort_pairs = pairs;
    }

    /// Record each occupied cell's range of sorted slots.
    pub fn find_cell_bounds(&mut self) {
        self.cell_start.par_iter_mut().for_each(|s| *s = EMPTY_CELL);
        self.cell_end.par_iter_mut().for_each(|e| *e = EMPTY_CELL);

        let n = self.grid_particle_hash.len();
        for k in 0..n {
            let hash = self.grid_particle_hash[k];
            if k == 0 || hash != self.grid_particle_hash[k - 1] {
                self.cell_start[hash as usize] = k as u32;
                if k > 0 {
                    let previous = self.grid_particle_hash[k - 1];
                    self.cell_end[previous as usize] = k as u32;
                }
            }
        }
        if let Some(&last) = self.grid_particle_hash.last() {
            self.cell_end[last as usize] = n as u32;
        }
    }

    /// Copy particle state into sorted order.
    pub fn gather_sorted(&mut self, positions: &[DVec3], velocities: &[DVec3]) {
        let index = &self.grid_particle_index;
        self.sorted_position
            .par_iter_mut()
            .zip(self.sorted_velocity.par_iter_mut())
            .zip(index.par_iter())
            .for_each(|((pos, vel), &i)| {
                *pos = positions[i as usize];
                *vel = velocities[i as usize];
            });
    }

    /// Verify that occupied cell ranges partition `[0, n)` and that the
    /// sort produced a permutation.
    pub fn check_partition(&mut self) -> Result<(), PartitionError> {
        self.seen.fill(false);
        for &i in &self.grid_particle_index {
            let slot = self
                .seen
                .get_mut(i as usize)
                .ok_or(PartitionError::NotPermutation { index: i })?;
            if *slot {
                return Err(PartitionError::NotPermutation { index: i });
            }
            *slot = true;
        }

        // Occupied ranges, visited in cell order, must tile the sorted slots
        // back to back because the sort is ascending by hash.
        let mut cursor = 0u32;
        for cell in 0..self.num_cells() {
            let (start, end) = (self.cell_start[cell], self.cell_end[cell]);
            match (start == EMPTY_CELL, end == EMPTY_CELL) {
                (true, true) => continue,
                (false, false) => {}
                _ => return Err(PartitionError::HalfEmpty { cell }),
            }
            if start != cursor {
                return if start > cursor {
                    Err(PartitionError::Gap { slot: cursor as usize })
                } else {
                    Err(PartitionError::Overlap {
                        cell,
                        start,
                        expected: cursor,
                    })
                };
            }
            if end <= start || end as usize > self.num_particles() {
                return Err(PartitionError::Overlap {
                    cell,
                    start: end,
                    expected: start,
                });
            }
            for slot in start as usize..end as usize {
                let hash = self.grid_particle_hash[slot];
                if hash as usize != cell {
                    return Err(PartitionError::ForeignHash { cell, slot, hash });
                }
            }
            cursor = end;
        }
        if cursor as usize != self.num_particles() {
            return Err(PartitionError::Gap { slot: cursor as usize });
        }
        Ok(())
    }

    // ========== Queries ==========

    /// Sorted slots belonging to `hash`, or `None` for an empty cell.
    #[inline]
    pub fn cell_range(&self, hash: u32) -> Option<Range<usize>> {
        let start = self.cell_start[hash as usize];
        if start == EMPTY_CELL {
            return None;
        }
        Some(start as usize..self.cell_end[hash as usize] as usize)
    }

    /// Visit every sorted slot in the 3x3x3 block of cells around `cell`.
    ///
    /// `cell` should be a home cell (see [`home_cell`](Self::home_cell)).
    /// Neighbor cells outside the grid are skipped rather than clamped so
    /// that no cell is visited twice.
    #[inline]
    pub fn for_each_neighbor_slot(&self, cell: IVec3, mut f: impl FnMut(usize)) {
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let neighbor = cell + IVec3::new(dx, dy, dz);
                    if !self.in_grid(neighbor) {
                        continue;
                    }
                    if let Some(range) = self.cell_range(self.cell_hash(neighbor)) {
                        range.for_each(&mut f);
                    }
                }
            }
        }
    }

    // ========== Field accessors ==========

    #[cfg(test)]
    pub(crate) fn cell_start_mut(&mut self) -> &mut [u32] {
        &mut self.cell_start
    }

    pub fn grid_particle_hash(&self) -> &[u32] {
        &self.grid_particle_hash
    }

    pub fn grid_particle_index(&self) -> &[u32] {
        &self.grid_particle_index
    }

    pub fn cell_start(&self) -> &[u32] {
        &self.cell_start
    }

    pub fn cell_end(&self) -> &[u32] {
        &self.cell_end
    }

    pub fn sorted_position(&self) -> &[DVec3] {
        &self.sorted_position
    }

    pub fn sorted_velocity(&self) -> &[DVec3] {
        &self.sorted_velocity
    }
}
