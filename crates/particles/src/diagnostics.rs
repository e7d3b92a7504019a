//! Text dumps of grid and particle state for debugging.

use std::io::Write;

use crate::constants::EMPTY_CELL;
use crate::error::SimError;
use crate::params::SimParams;
use crate::store::ParticleArray;
use crate::ParticleSystem;

/// Write one line per occupied cell: `cell start end count`.
///
/// Reflects the grid as of the last completed solver iteration.
pub fn dump_grid<W: Write>(system: &ParticleSystem, mut out: W) -> Result<(), SimError> {
    let starts = system.cell_start();
    let ends = system.cell_end();
    for (cell, (&start, &end)) in starts.iter().zip(ends).enumerate() {
        if start == EMPTY_CELL {
            continue;
        }
        writeln!(out, "{} {} {} {}", cell, start, end, end - start)?;
    }
    Ok(())
}

/// Write position and velocity of particles `[start, start + count)`,
/// one particle per line.
pub fn dump_particles<W: Write>(
    system: &mut ParticleSystem,
    start: usize,
    count: usize,
    mut out: W,
) -> Result<(), SimError> {
    let len = system.num_particles();
    let end = start
        .checked_add(count)
        .filter(|&end| end <= len)
        .ok_or(SimError::OutOfRange {
            which: ParticleArray::Position,
            start,
            count,
            len,
        })?;

    let positions = system.get_array(ParticleArray::Position)?[start * 3..end * 3].to_vec();
    let velocities = system.get_array(ParticleArray::Velocity)?;

    for (i, (p, v)) in positions
        .chunks_exact(3)
        .zip(velocities[start * 3..end * 3].chunks_exact(3))
        .enumerate()
    {
        writeln!(
            out,
            "{}: pos ({:.6}, {:.6}, {:.6}) vel ({:.6}, {:.6}, {:.6})",
            start + i,
            p[0],
            p[1],
            p[2],
            v[0],
            v[1],
            v[2]
        )?;
    }
    Ok(())
}

/// Log every parameter at info level.
pub fn dump_parameters(params: &SimParams) {
    let g = params.grid_size;
    log::info!("grid: {}x{}x{} cells of {:?}", g.x, g.y, g.z, params.cell_size);
    log::info!("world origin: {:?}", params.world_origin);
    log::info!("particle radius: {}", params.particle_radius);
    log::info!(
        "gravity: {:?}, global damping: {}, boundary damping: {}",
        params.gravity,
        params.global_damping,
        params.boundary_damping
    );
    log::info!(
        "contact: spring {} damping {} shear {} attraction {}",
        params.spring,
        params.damping,
        params.shear,
        params.attraction
    );
    log::info!(
        "collider: {:?} radius {}",
        params.collider_pos,
        params.collider_radius
    );
    log::info!(
        "solver iterations: {}, seed: {}",
        params.solver_iterations,
        params.seed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParticleConfig;
    use glam::UVec3;

    fn settled_system() -> ParticleSystem {
        let mut sim = ParticleSystem::new(27, UVec3::splat(8)).unwrap();
        sim.reset(ParticleConfig::Grid).unwrap();
        sim.update(0.01).unwrap();
        sim
    }

    #[test]
    fn test_dump_grid_counts_every_particle() {
        let sim = settled_system();
        let mut buf = Vec::new();
        dump_grid(&sim, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let total: u32 = text
            .lines()
            .map(|line| line.split_whitespace().last().unwrap().parse::<u32>().unwrap())
            .sum();
        assert_eq!(total, 27);
    }

    #[test]
    fn test_dump_particles_range() {
        let mut sim = settled_system();
        let mut buf = Vec::new();
        dump_particles(&mut sim, 5, 3, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("5: pos ("));
        assert!(lines[2].starts_with("7: pos ("));
    }

    #[test]
    fn test_dump_particles_rejects_out_of_range() {
        let mut sim = settled_system();
        let result = dump_particles(&mut sim, 20, 10, std::io::sink());
        assert!(matches!(result, Err(SimError::OutOfRange { len: 27, .. })));
    }
}
