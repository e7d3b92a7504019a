//! Time integration and box containment.

use glam::DVec3;
use rayon::prelude::*;

use crate::params::SimParams;

/// Semi-implicit Euler step for one particle.
///
/// Velocity picks up acceleration and gravity first, then the position
/// moves with the updated velocity.
#[inline]
pub fn integrate_particle(
    position: &mut DVec3,
    velocity: &mut DVec3,
    acceleration: DVec3,
    params: &SimParams,
    dt: f64,
) {
    *velocity += (acceleration + params.gravity) * dt;
    *velocity *= params.global_damping;
    *position += *velocity * dt;
}

/// Clamp a particle into `[min, max]` and bounce it off any wall it crossed.
///
/// Each axis is handled on its own, so a particle leaving through a corner
/// is corrected on every axis. The wall-normal velocity is reversed and
/// scaled by `restitution`.
#[inline]
pub fn enforce_box(position: &mut DVec3, velocity: &mut DVec3, min: DVec3, max: DVec3, restitution: f64) {
    for axis in 0..3 {
        if position[axis] > max[axis] {
            position[axis] = max[axis];
            velocity[axis] *= -restitution;
        }
        if position[axis] < min[axis] {
            position[axis] = min[axis];
            velocity[axis] *= -restitution;
        }
    }
}

/// Advance every particle by `dt` in original order.
pub fn integrate_system(
    positions: &mut [DVec3],
    velocities: &mut [DVec3],
    accelerations: &[DVec3],
    params: &SimParams,
    dt: f64,
) {
    let (min, max) = params.containment_bounds();
    let restitution = params.boundary_damping;

    positions
        .par_iter_mut()
        .zip(velocities.par_iter_mut())
        .zip(accelerations.par_iter())
        .for_each(|((pos, vel), &accel)| {
            integrate_particle(pos, vel, accel, params, dt);
            enforce_box(pos, vel, min, max, restitution);
        });
}
