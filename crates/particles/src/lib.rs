//! Spatial-hash particle system
//!
//! A fixed population of point particles moving under gravity, pairwise
//! spring-damper contacts, one static collider sphere and an axis-aligned
//! box. Neighbor search uses a uniform grid rebuilt every step by hashing,
//! sorting and scanning, which keeps contact evaluation near-linear in the
//! particle count.
//!
//! # Example
//!
//! ```
//! use particles::{ParticleArray, ParticleConfig, ParticleSystem};
//! use glam::UVec3;
//!
//! let mut sim = ParticleSystem::new(512, UVec3::splat(32)).unwrap();
//! sim.reset(ParticleConfig::Grid).unwrap();
//! sim.set_gravity(-9.8);
//!
//! for _ in 0..10 {
//!     sim.update(0.01).unwrap();
//! }
//!
//! let positions = sim.get_array(ParticleArray::Position).unwrap();
//! assert_eq!(positions.len(), 512 * 3);
//! ```
//!
//! # Pipeline
//!
//! Each solver iteration of [`ParticleSystem::update`] runs, with a full
//! barrier between phases:
//!
//! 1. hash + sort ([`grid::SpatialHashGrid::build_and_sort`])
//! 2. cell bounds ([`grid::SpatialHashGrid::find_cell_bounds`])
//! 3. gather into sorted order ([`grid::SpatialHashGrid::gather_sorted`])
//! 4. contact forces ([`collide::evaluate_forces`])
//! 5. integration + containment ([`integrate::integrate_system`])

pub mod collide;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod init;
pub mod integrate;
pub mod params;
pub mod store;

pub use error::SimError;
pub use glam::{DVec3, UVec3};
pub use grid::{PartitionError, SpatialHashGrid};
pub use init::ParticleConfig;
pub use params::SimParams;
pub use store::{ParticleArray, ParticleStore};

use crate::error::alloc_filled;

/// Lifecycle state of a [`ParticleSystem`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SimState {
    /// Buffers allocated, no initial conditions yet
    Constructed,
    /// Initialized and between steps
    Ready,
}

/// Particle simulation owning its parameters, particle state and grid.
pub struct ParticleSystem {
    params: SimParams,
    store: ParticleStore,
    grid: SpatialHashGrid,

    /// Per-particle acceleration in original order
    accelerations: Vec<glam::DVec3>,
    /// Per-slot acceleration in sorted order
    sorted_accelerations: Vec<glam::DVec3>,
    /// Scratch for reset
    reset_positions: Vec<glam::DVec3>,

    state: SimState,
    /// Completed external ticks
    pub frame: u64,
}

impl ParticleSystem {
    /// Create a system of `num_particles` on a grid of `grid_size` cells,
    /// with default parameters for that grid.
    pub fn new(num_particles: usize, grid_size: UVec3) -> Result<Self, SimError> {
        Self::with_params(num_particles, SimParams::for_grid(grid_size))
    }

    /// Create a system with explicit parameters.
    ///
    /// Every buffer is allocated here and lives as long as the system.
    pub fn with_params(num_particles: usize, params: SimParams) -> Result<Self, SimError> {
        let grid = SpatialHashGrid::new(num_particles, &params)?;
        let store = ParticleStore::new(num_particles)?;

        log::info!(
            "particle system: {} particles, {}x{}x{} grid ({} cells)",
            num_particles,
            params.grid_size.x,
            params.grid_size.y,
            params.grid_size.z,
            grid.num_cells()
        );

        Ok(Self {
            params,
            store,
            grid,
            accelerations: alloc_filled("acceleration", num_particles, glam::DVec3::ZERO)?,
            sorted_accelerations: alloc_filled("sorted acceleration", num_particles, glam::DVec3::ZERO)?,
            reset_positions: alloc_filled("reset scratch", num_particles, glam::DVec3::ZERO)?,
            state: SimState::Constructed,
            frame: 0,
        })
    }

    /// Advance the simulation by one external tick.
    ///
    /// Runs the full pipeline `solver_iterations` times with the same `dt`,
    /// re-hashing each time. A non-positive `dt` moves nothing.
    pub fn update(&mut self, dt: f64) -> Result<(), SimError> {
        self.require_ready()?;

        // Caller writes become visible to this step
        self.store.push_all();

        if !(dt > 0.0) {
            log::warn!("skipping update with non-positive dt {}", dt);
            return Ok(());
        }

        let iterations = self.params.solver_iterations;
        log::debug!("update frame {}: dt={} iterations={}", self.frame, dt, iterations);

        self.grid.sync_params(&self.params);
        for _ in 0..iterations {
            self.step_once(dt);
        }
        self.frame += 1;
        Ok(())
    }

    /// One pass of hash, sort, bounds, gather, forces and integration.
    fn step_once(&mut self, dt: f64) {
        self.grid.build_and_sort(self.store.positions());
        self.grid.find_cell_bounds();
        self.verify_grid();
        self.grid
            .gather_sorted(self.store.positions(), self.store.velocities());

        collide::evaluate_forces(
            &self.grid,
            &self.params,
            &mut self.sorted_accelerations,
            &mut self.accelerations,
        );

        let (positions, velocities) = self.store.primary_mut();
        integrate::integrate_system(positions, velocities, &self.accelerations, &self.params, dt);
    }

    /// Panic if the cell bounds do not partition the sorted particles.
    fn verify_grid(&mut self) {
        if let Err(e) = self.grid.check_partition() {
            log::error!("spatial hash invariant broken: {}", e);
            panic!("spatial hash invariant broken: {e}");
        }
    }

    /// Reinitialize positions from `config` and zero every velocity.
    ///
    /// Resets are reproducible: the same parameters give the same layout.
    pub fn reset(&mut self, config: ParticleConfig) -> Result<(), SimError> {
        match config {
            ParticleConfig::Random => init::random_positions(&self.params, &mut self.reset_positions),
            ParticleConfig::Grid => {
                if let Err(e) = init::lattice_positions(&self.params, &mut self.reset_positions) {
                    log::warn!("reset rejected: {}", e);
                    return Err(e);
                }
            }
        }

        // Accelerations double as the zero-velocity source
        self.accelerations.fill(glam::DVec3::ZERO);
        self.store.overwrite(&self.reset_positions, &self.accelerations);
        self.state = SimState::Ready;
        self.frame = 0;
        log::info!("reset {} particles with {:?}", self.num_particles(), config);
        Ok(())
    }

    // ========== Array access ==========

    /// Snapshot of `which` as `num_particles * 3` values (x, y, z per particle).
    pub fn get_array(&mut self, which: ParticleArray) -> Result<&[f64], SimError> {
        self.require_ready()?;
        Ok(self.store.read(which))
    }

    /// Overwrite particles `[start, start + count)` of `which`.
    ///
    /// `data` must hold exactly `count * 3` values. Takes effect from the
    /// next [`update`](Self::update).
    pub fn set_array(
        &mut self,
        which: ParticleArray,
        data: &[f64],
        start: usize,
        count: usize,
    ) -> Result<(), SimError> {
        self.require_ready()?;
        self.store.write(which, data, start, count).map_err(|e| {
            log::warn!("set_array rejected: {}", e);
            e
        })
    }

    fn require_ready(&self) -> Result<(), SimError> {
        match self.state {
            SimState::Ready => Ok(()),
            SimState::Constructed => Err(SimError::NotReady),
        }
    }

    // ========== Parameter mutators ==========

    pub fn set_iterations(&mut self, iterations: u32) {
        self.params.solver_iterations = iterations;
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.params.global_damping = damping;
    }

    /// Set gravity along Y.
    pub fn set_gravity(&mut self, gravity: f64) {
        self.params.gravity = glam::DVec3::new(0.0, gravity, 0.0);
    }

    pub fn set_collide_spring(&mut self, spring: f64) {
        self.params.spring = spring;
    }

    pub fn set_collide_damping(&mut self, damping: f64) {
        self.params.damping = damping;
    }

    pub fn set_collide_shear(&mut self, shear: f64) {
        self.params.shear = shear;
    }

    pub fn set_collide_attraction(&mut self, attraction: f64) {
        self.params.attraction = attraction;
    }

    pub fn set_collider_pos(&mut self, pos: glam::DVec3) {
        self.params.collider_pos = pos;
    }

    /// Fraction of wall-normal speed kept on a box bounce.
    pub fn set_boundary_damping(&mut self, restitution: f64) {
        self.params.boundary_damping = restitution;
    }

    // ========== Accessors ==========

    pub fn num_particles(&self) -> usize {
        self.store.len()
    }

    pub fn particle_radius(&self) -> f64 {
        self.params.particle_radius
    }

    pub fn collider_pos(&self) -> glam::DVec3 {
        self.params.collider_pos
    }

    pub fn collider_radius(&self) -> f64 {
        self.params.collider_radius
    }

    pub fn grid_size(&self) -> UVec3 {
        self.params.grid_size
    }

    pub fn world_origin(&self) -> glam::DVec3 {
        self.params.world_origin
    }

    pub fn cell_size(&self) -> glam::DVec3 {
        self.params.cell_size
    }

    pub fn iterations(&self) -> u32 {
        self.params.solver_iterations
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Cell hash of each sorted slot from the last step.
    pub fn grid_particle_hash(&self) -> &[u32] {
        self.grid.grid_particle_hash()
    }

    /// Original particle index of each sorted slot from the last step.
    pub fn grid_particle_index(&self) -> &[u32] {
        self.grid.grid_particle_index()
    }

    pub fn cell_start(&self) -> &[u32] {
        self.grid.cell_start()
    }

    pub fn cell_end(&self) -> &[u32] {
        self.grid.cell_end()
    }

    pub fn grid(&self) -> &SpatialHashGrid {
        &self.grid
    }
}
