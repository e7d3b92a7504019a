//! Spring-damper contact forces.
//!
//! Contacts are penalty based: overlapping spheres push apart in proportion
//! to their penetration, with extra terms for normal damping, tangential
//! shear and an optional attraction. Each particle accumulates its own
//! response independently; the pair symmetry falls out of the formula,
//! there is no action/reaction bookkeeping.
//!
//! Reference: Green, "Particle Simulation using CUDA" (NVIDIA, 2010)

use glam::DVec3;
use rayon::prelude::*;

use crate::grid::SpatialHashGrid;
use crate::params::SimParams;

/// Contact response of sphere A against sphere B.
///
/// Returns the acceleration on A. Separated pairs (`dist >= radius_a +
/// radius_b`) and coincident centres contribute exactly zero.
#[inline]
pub fn collide_spheres(
    pos_a: DVec3,
    pos_b: DVec3,
    vel_a: DVec3,
    vel_b: DVec3,
    radius_a: f64,
    radius_b: f64,
    params: &SimParams,
) -> DVec3 {
    let rel_pos = pos_b - pos_a;
    let dist = rel_pos.length();
    let collide_dist = radius_a + radius_b;

    if dist >= collide_dist || dist == 0.0 {
        return DVec3::ZERO;
    }

    let normal = rel_pos / dist;
    let rel_vel = vel_b - vel_a;
    let normal_vel = rel_vel.dot(normal);
    let tangent_vel = rel_vel - normal * normal_vel;

    // Shear drags A along with B's tangential motion, opposing slip
    -params.spring * (collide_dist - dist) * normal
        + params.damping * normal_vel * normal
        + params.shear * tangent_vel
        + params.attraction * rel_pos
}

/// Spring push-back from the six domain walls.
///
/// Zero for a particle whose surface is inside the box on every axis.
#[inline]
pub fn collide_walls(pos: DVec3, params: &SimParams) -> DVec3 {
    let (min, max) = params.containment_bounds();
    let below = (min - pos).max(DVec3::ZERO);
    let above = (pos - max).max(DVec3::ZERO);
    params.spring * (below - above)
}

/// Total acceleration on the particle in sorted slot `slot`.
fn slot_force(grid: &SpatialHashGrid, params: &SimParams, slot: usize) -> DVec3 {
    let positions = grid.sorted_position();
    let velocities = grid.sorted_velocity();
    let pos = positions[slot];
    let vel = velocities[slot];
    let radius = params.particle_radius;

    let mut force = DVec3::ZERO;
    grid.for_each_neighbor_slot(grid.home_cell(pos), |other| {
        if other != slot {
            force += collide_spheres(
                pos,
                positions[other],
                vel,
                velocities[other],
                radius,
                radius,
                params,
            );
        }
    });

    // The collider is an immovable particle
    force += collide_spheres(
        pos,
        params.collider_pos,
        vel,
        DVec3::ZERO,
        radius,
        params.collider_radius,
        params,
    );
    force += collide_walls(pos, params);
    force
}

/// Evaluate contact accelerations for every particle.
///
/// Reads the sorted copies and cell bounds of `grid`, which must be
/// current. `sorted_scratch` receives forces in sorted order; `out`
/// receives them in original particle order.
pub fn evaluate_forces(
    grid: &SpatialHashGrid,
    params: &SimParams,
    sorted_scratch: &mut Vec<DVec3>,
    out: &mut [DVec3],
) {
    let n = grid.num_particles();
    debug_assert_eq!(out.len(), n);

    (0..n)
        .into_par_iter()
        .map(|slot| slot_force(grid, params, slot))
        .collect_into_vec(sorted_scratch);

    // Scatter back through the sort permutation
    for (&index, &force) in grid.grid_particle_index().iter().zip(sorted_scratch.iter()) {
        out[index as usize] = force;
    }
}
