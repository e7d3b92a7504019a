//! Headless settling run.
//!
//! Drops a lattice block under SI gravity and reports how it comes to rest.
//! Pass a JSON parameter file as the first argument to override defaults.
//!
//! Run with: RUST_LOG=info cargo run --example settle -p particles

use std::path::Path;

use particles::diagnostics::{dump_grid, dump_parameters, dump_particles};
use particles::{ParticleArray, ParticleConfig, ParticleSystem, SimParams, UVec3};

const NUM_PARTICLES: usize = 4096;
const DT: f64 = 0.016;
const STEPS: usize = 100;

fn main() {
    env_logger::init();

    let params = match std::env::args().nth(1) {
        Some(path) => match SimParams::load_json(Path::new(&path)) {
            Ok(params) => params,
            Err(e) => {
                log::error!("could not load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => {
            let mut params = SimParams::for_grid(UVec3::splat(64));
            params.gravity.y = -9.8;
            params
        }
    };
    dump_parameters(&params);

    let mut sim = match ParticleSystem::with_params(NUM_PARTICLES, params) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("failed to create particle system: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = sim.reset(ParticleConfig::Grid) {
        log::error!("reset failed: {}", e);
        std::process::exit(1);
    }

    println!("=== SETTLE ===\n");
    let floor = sim.world_origin().y + sim.particle_radius();

    for step in 0..STEPS {
        if let Err(e) = sim.update(DT) {
            log::error!("step {} failed: {}", step, e);
            std::process::exit(1);
        }

        if step % 10 == 9 {
            let Ok(pos) = sim.get_array(ParticleArray::Position) else {
                continue;
            };
            let (sum, max) = pos
                .chunks_exact(3)
                .fold((0.0, f64::MIN), |(sum, max), p| (sum + p[1], max.max(p[1])));
            println!(
                "step {:3}: mean height above floor {:.5}, highest {:.5}",
                step + 1,
                sum / NUM_PARTICLES as f64 - floor,
                max - floor
            );
        }
    }

    println!("\nOccupied cells (cell start end count):");
    let stdout = std::io::stdout();
    if let Err(e) = dump_grid(&sim, stdout.lock()) {
        log::error!("grid dump failed: {}", e);
    }

    println!("\nFirst particles:");
    if let Err(e) = dump_particles(&mut sim, 0, 8, stdout.lock()) {
        log::error!("particle dump failed: {}", e);
    }
}
