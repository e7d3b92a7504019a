//! Initial particle configurations.

use glam::{DVec3, UVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::params::SimParams;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ParticleConfig {
    /// Uniformly random inside the box, at rest
    Random,
    /// Jittered cubic lattice in the lower corner of the box, at rest
    Grid,
}

/// Uniform random positions, one radius away from every wall.
pub fn random_positions(params: &SimParams, out: &mut [DVec3]) {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let (min, max) = params.containment_bounds();
    for pos in out.iter_mut() {
        *pos = DVec3::new(
            sample(&mut rng, min.x, max.x),
            sample(&mut rng, min.y, max.y),
            sample(&mut rng, min.z, max.z),
        );
    }
}

fn sample(rng: &mut ChaCha8Rng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        // Box thinner than a particle: pin to the centre plane
        (lo + hi) * 0.5
    }
}

/// Lattice points that fit in the box on each axis at `lattice_spacing`.
pub fn lattice_fit(params: &SimParams) -> UVec3 {
    let (min, max) = params.containment_bounds();
    let extent = (max - min).max(DVec3::ZERO);
    let spacing = params.lattice_spacing.max(f64::MIN_POSITIVE);
    let fit = (extent / spacing).floor() + DVec3::ONE;
    fit.min(DVec3::splat(u32::MAX as f64)).as_uvec3()
}

/// Smallest `s` with `s^k >= target`.
fn ceil_root(target: f64, k: i32) -> u32 {
    let mut side = target.powf(1.0 / k as f64).ceil().min(u32::MAX as f64) as u32;
    // powf can land a hair either side of an exact root
    while side > 0 && ((side - 1) as f64).powi(k) >= target {
        side -= 1;
    }
    while side < u32::MAX && (side as f64).powi(k) < target {
        side += 1;
    }
    side
}

/// Lattice dimensions used for `count` particles.
///
/// The preferred shape is a cube of side `ceil(cbrt(count))`. Any axis
/// where that side would leave the box is cut to what fits, and the rows
/// it loses go to the remaining axes. The result holds at least `count`
/// points unless the whole box holds fewer (see [`lattice_fit`]).
pub fn lattice_dims(params: &SimParams, count: usize) -> UVec3 {
    let fit = lattice_fit(params);
    let mut clipped = [false; 3];
    loop {
        let fixed: f64 = (0..3)
            .filter(|&axis| clipped[axis])
            .map(|axis| fit[axis] as f64)
            .product();
        let free = clipped.iter().filter(|&&c| !c).count() as i32;
        if free == 0 {
            return fit;
        }

        let side = ceil_root(count as f64 / fixed, free);
        let mut newly_clipped = false;
        for axis in 0..3 {
            if !clipped[axis] && side >= fit[axis] {
                clipped[axis] = true;
                newly_clipped = true;
            }
        }
        if !newly_clipped {
            let mut dims = UVec3::splat(side);
            for axis in 0..3 {
                if clipped[axis] {
                    dims[axis] = fit[axis];
                }
            }
            return dims;
        }
    }
}

/// Jittered lattice positions, filled x fastest, then y, then z.
///
/// Fails without touching `out` when the lattice cannot hold every particle.
pub fn lattice_positions(params: &SimParams, out: &mut [DVec3]) -> Result<(), SimError> {
    let count = out.len();
    let fit = lattice_fit(params);
    let capacity = fit.x as usize * fit.y as usize * fit.z as usize;
    if capacity < count {
        return Err(SimError::LatticeCapacity {
            capacity,
            requested: count,
        });
    }

    let dims = lattice_dims(params, count);
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let (origin, max) = params.containment_bounds();
    let max = max.max(origin);
    let spacing = params.lattice_spacing;
    let jitter = params.lattice_jitter;

    let mut i = 0;
    'fill: for z in 0..dims.z {
        for y in 0..dims.y {
            for x in 0..dims.x {
                if i >= count {
                    break 'fill;
                }
                let offset = if jitter > 0.0 {
                    DVec3::new(
                        rng.gen_range(-jitter..=jitter),
                        rng.gen_range(-jitter..=jitter),
                        rng.gen_range(-jitter..=jitter),
                    )
                } else {
                    DVec3::ZERO
                };
                let lattice = origin + UVec3::new(x, y, z).as_dvec3() * spacing;
                out[i] = (lattice + offset).clamp(origin, max);
                i += 1;
            }
        }
    }
    Ok(())
}
