//! Default physical and grid constants.
//!
//! Lengths are in world units where the default domain spans
//! `[-1, 1]` on every axis for a 64^3 grid. The default gravity is scaled
//! for unit time steps; SI-like runs set it to `-9.8`.

/// Radius of every particle.
pub const PARTICLE_RADIUS: f64 = 1.0 / 64.0;

/// Lower corner of the simulation box.
pub const WORLD_ORIGIN: f64 = -1.0;

/// Gravity along Y (negative is down).
pub const GRAVITY: f64 = -0.0003;

/// Velocity multiplier applied every step (1.0 = no damping).
pub const GLOBAL_DAMPING: f64 = 1.0;

// =============================================================================
// CONTACT MODEL
// =============================================================================

/// Penetration stiffness.
pub const COLLIDE_SPRING: f64 = 0.5;

/// Normal relative-velocity damping.
pub const COLLIDE_DAMPING: f64 = 0.02;

/// Tangential relative-velocity coupling.
pub const COLLIDE_SHEAR: f64 = 0.1;

/// Pull toward overlapping neighbours (0 disables).
pub const COLLIDE_ATTRACTION: f64 = 0.0;

/// Fraction of wall-normal speed kept after a box bounce.
pub const BOUNDARY_DAMPING: f64 = 0.5;

// =============================================================================
// COLLIDER
// =============================================================================

pub const COLLIDER_POS: [f64; 3] = [-1.2, -0.8, 0.8];
pub const COLLIDER_RADIUS: f64 = 0.2;

// =============================================================================
// INITIAL CONDITIONS
// =============================================================================

/// Lattice jitter as a fraction of particle radius.
pub const LATTICE_JITTER_FACTOR: f64 = 0.01;

/// Seed for reproducible resets.
pub const RESET_SEED: u64 = 1973;

/// Sentinel stored in `cell_start`/`cell_end` for cells with no particles.
pub const EMPTY_CELL: u32 = u32::MAX;
