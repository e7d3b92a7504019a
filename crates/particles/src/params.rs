//! Simulation parameters shared by every phase of a step.
//!
//! The parameter set is plain data owned by [`crate::ParticleSystem`]. The
//! hash, force and integrate phases read it through a shared reference;
//! mutators only run between steps.

use std::path::Path;

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::SimError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    // --- Grid ---
    /// Number of cells on each axis
    pub grid_size: UVec3,
    /// Lower corner of the domain
    pub world_origin: DVec3,
    /// Edge lengths of one cell
    pub cell_size: DVec3,

    // --- Particles ---
    pub particle_radius: f64,
    pub gravity: DVec3,
    pub global_damping: f64,
    /// Restitution for box bounces, must stay below 1.0
    pub boundary_damping: f64,

    // --- Contact model ---
    pub spring: f64,
    pub damping: f64,
    pub shear: f64,
    pub attraction: f64,

    // --- Collider sphere ---
    pub collider_pos: DVec3,
    pub collider_radius: f64,

    // --- Initial conditions ---
    pub lattice_spacing: f64,
    pub lattice_jitter: f64,
    pub seed: u64,

    pub solver_iterations: u32,
}

impl SimParams {
    /// Defaults for a grid of the given size, with cells two radii wide.
    pub fn for_grid(grid_size: UVec3) -> Self {
        let radius = PARTICLE_RADIUS;
        Self {
            grid_size,
            world_origin: DVec3::splat(WORLD_ORIGIN),
            cell_size: DVec3::splat(radius * 2.0),
            particle_radius: radius,
            gravity: DVec3::new(0.0, GRAVITY, 0.0),
            global_damping: GLOBAL_DAMPING,
            boundary_damping: BOUNDARY_DAMPING,
            spring: COLLIDE_SPRING,
            damping: COLLIDE_DAMPING,
            shear: COLLIDE_SHEAR,
            attraction: COLLIDE_ATTRACTION,
            collider_pos: DVec3::from_array(COLLIDER_POS),
            collider_radius: COLLIDER_RADIUS,
            lattice_spacing: radius * 2.0,
            lattice_jitter: radius * LATTICE_JITTER_FACTOR,
            seed: RESET_SEED,
            solver_iterations: 1,
        }
    }

    /// Total number of grid cells.
    pub fn num_cells(&self) -> usize {
        self.grid_size.x as usize * self.grid_size.y as usize * self.grid_size.z as usize
    }

    /// Distance at which two particles start touching.
    #[inline]
    pub fn collide_distance(&self) -> f64 {
        self.particle_radius * 2.0
    }

    /// Upper corner of the domain.
    pub fn world_max(&self) -> DVec3 {
        self.world_origin + self.grid_size.as_dvec3() * self.cell_size
    }

    /// Box a particle centre must stay inside: the domain shrunk by one radius.
    pub fn containment_bounds(&self) -> (DVec3, DVec3) {
        let r = DVec3::splat(self.particle_radius);
        (self.world_origin + r, self.world_max() - r)
    }

    pub fn load_json(path: &Path) -> Result<Self, SimError> {
        let json = std::fs::read_to_string(path)?;
        let params = serde_json::from_str(&json)?;
        Ok(params)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self::for_grid(UVec3::splat(64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_domain_spans_unit_cube() {
        let params = SimParams::default();
        assert_eq!(params.num_cells(), 64 * 64 * 64);
        assert!((params.world_max() - DVec3::ONE).length() < 1e-12);
        assert_eq!(params.collide_distance(), params.cell_size.x);
    }

    #[test]
    fn test_containment_bounds_shrink_by_radius() {
        let params = SimParams::for_grid(UVec3::new(8, 4, 2));
        let (min, max) = params.containment_bounds();
        assert_eq!(min, params.world_origin + DVec3::splat(params.particle_radius));
        assert_eq!(max, params.world_max() - DVec3::splat(params.particle_radius));
        assert!(max.z > min.z);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut params = SimParams::for_grid(UVec3::new(16, 32, 8));
        params.spring = 0.75;
        params.collider_pos = DVec3::new(0.1, -0.2, 0.3);
        params.solver_iterations = 3;

        let json = serde_json::to_string(&params).unwrap();
        let back: SimParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }

    #[test]
    fn test_vectors_serialize_as_arrays() {
        let back: SimParams =
            serde_json::from_str(r#"{ "grid_size": [8, 4, 2], "gravity": [0.0, -9.8, 0.0] }"#).unwrap();
        assert_eq!(back.grid_size, UVec3::new(8, 4, 2));
        assert_eq!(back.gravity, DVec3::new(0.0, -9.8, 0.0));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let back: SimParams = serde_json::from_str(r#"{ "spring": 2.0 }"#).unwrap();
        assert_eq!(back.spring, 2.0);
        assert_eq!(back.particle_radius, PARTICLE_RADIUS);
        assert_eq!(back.grid_size, UVec3::splat(64));
    }
}
