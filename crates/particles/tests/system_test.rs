//! Particle system integration tests
//!
//! Exercises the public API end to end: resets, array access, parameter
//! mutators and pairwise contacts.

use particles::{
    DVec3, ParticleArray, ParticleConfig, ParticleSystem, SimError, SimParams, UVec3,
};

fn ready_system(n: usize, grid: u32) -> ParticleSystem {
    let mut sim = ParticleSystem::new(n, UVec3::splat(grid)).unwrap();
    sim.reset(ParticleConfig::Grid).unwrap();
    sim
}

/// Writes are visible to reads before any step runs
#[test]
fn test_set_then_get_round_trip() {
    let mut sim = ready_system(10, 16);
    let data = [-0.9, -0.8, -0.7, -0.6, -0.65, -0.55];

    sim.set_array(ParticleArray::Position, &data, 3, 2).unwrap();

    let pos = sim.get_array(ParticleArray::Position).unwrap();
    assert_eq!(&pos[9..15], &data);
    assert_eq!(pos.len(), 30);
}

/// Writes outside the particle range are rejected and change nothing
#[test]
fn test_set_array_out_of_range() {
    let mut sim = ready_system(4, 16);
    let before = sim.get_array(ParticleArray::Velocity).unwrap().to_vec();

    let result = sim.set_array(ParticleArray::Velocity, &[0.0; 6], 3, 2);
    assert!(
        matches!(result, Err(SimError::OutOfRange { start: 3, count: 2, len: 4, .. })),
        "expected OutOfRange, got {:?}",
        result
    );

    let result = sim.set_array(ParticleArray::Velocity, &[0.0; 5], 0, 2);
    assert!(matches!(result, Err(SimError::DataLength { expected: 6, actual: 5, .. })));

    assert_eq!(sim.get_array(ParticleArray::Velocity).unwrap(), &before[..]);
}

/// Two resets with the same parameters produce the same state
#[test]
fn test_reset_is_idempotent() {
    for config in [ParticleConfig::Grid, ParticleConfig::Random] {
        let mut sim = ParticleSystem::new(200, UVec3::splat(32)).unwrap();
        sim.reset(config).unwrap();
        let first = sim.get_array(ParticleArray::Position).unwrap().to_vec();

        sim.set_gravity(-9.8);
        for _ in 0..3 {
            sim.update(0.01).unwrap();
        }
        sim.reset(config).unwrap();

        assert_eq!(sim.get_array(ParticleArray::Position).unwrap(), &first[..]);
        assert!(sim
            .get_array(ParticleArray::Velocity)
            .unwrap()
            .iter()
            .all(|&v| v == 0.0));
    }
}

/// A thin box takes a wide, flat lattice instead of rejecting it
#[test]
fn test_lattice_reset_fills_thin_box() {
    let mut sim = ParticleSystem::new(1000, UVec3::new(64, 4, 64)).unwrap();
    sim.reset(ParticleConfig::Grid).unwrap();

    let (min, max) = sim.params().containment_bounds();
    let pos = sim.get_array(ParticleArray::Position).unwrap();
    for p in pos.chunks_exact(3) {
        assert!(
            p[1] >= min.y && p[1] <= max.y,
            "lattice point outside thin box: y={}",
            p[1]
        );
    }
}

/// A lattice too big for the box is rejected and the old state survives
#[test]
fn test_lattice_reset_rejected_when_box_too_small() {
    let mut sim = ParticleSystem::new(1000, UVec3::new(4, 2, 4)).unwrap();
    sim.reset(ParticleConfig::Random).unwrap();
    let before = sim.get_array(ParticleArray::Position).unwrap().to_vec();

    let result = sim.reset(ParticleConfig::Grid);
    assert!(matches!(
        result,
        Err(SimError::LatticeCapacity { capacity: 32, requested: 1000 })
    ));
    assert_eq!(sim.get_array(ParticleArray::Position).unwrap(), &before[..]);
}

/// Gravity changes apply from the next update
#[test]
fn test_gravity_mutator_takes_effect() {
    let mut sim = ready_system(1, 16);
    sim.set_gravity(-2.0);
    sim.update(0.1).unwrap();

    let vy = sim.get_array(ParticleArray::Velocity).unwrap()[1];
    // Lattice start sits on the floor, so the first step bounces
    assert!((vy - 0.1).abs() < 1e-12, "expected bounce to +0.1, got {}", vy);

    sim.set_gravity(0.0);
    sim.update(0.1).unwrap();
    let vy_after = sim.get_array(ParticleArray::Velocity).unwrap()[1];
    assert!((vy_after - 0.1).abs() < 1e-12, "no gravity, no change: {}", vy_after);
}

/// Global damping scales velocity every step
#[test]
fn test_damping_mutator_takes_effect() {
    let mut sim = ready_system(1, 16);
    sim.set_gravity(0.0);
    sim.set_damping(0.5);
    sim.set_array(ParticleArray::Velocity, &[0.0, 0.0, 0.4], 0, 1).unwrap();

    sim.update(0.01).unwrap();

    let vz = sim.get_array(ParticleArray::Velocity).unwrap()[2];
    assert!((vz - 0.2).abs() < 1e-12);
}

/// Two overlapping particles at rest push apart symmetrically
#[test]
fn test_two_particle_contact() {
    let mut sim = ready_system(2, 16);
    sim.set_gravity(0.0);
    let r = sim.particle_radius();
    let c = -0.75;
    sim.set_array(
        ParticleArray::Position,
        &[c - 0.9 * r, c, c, c + 0.9 * r, c, c],
        0,
        2,
    )
    .unwrap();

    sim.update(1.0).unwrap();

    let vel = sim.get_array(ParticleArray::Velocity).unwrap();
    let va = DVec3::new(vel[0], vel[1], vel[2]);
    let vb = DVec3::new(vel[3], vel[4], vel[5]);

    let expected = sim.params().spring * 0.2 * r;
    assert!(va.x < 0.0 && vb.x > 0.0, "particles should separate: {:?} {:?}", va, vb);
    assert!((va.x + expected).abs() < 1e-12, "spring response: {}", va.x);
    assert!((va + vb).length() < 1e-15, "momentum: {:?}", va + vb);
}

/// Overlapping particles outside the domain still push apart
#[test]
fn test_contact_below_domain_floor() {
    let mut sim = ready_system(2, 16);
    sim.set_gravity(0.0);
    let r = sim.particle_radius();
    sim.set_array(
        ParticleArray::Position,
        &[-0.75, -1.5, -0.75, -0.75 + r, -1.5, -0.75],
        0,
        2,
    )
    .unwrap();

    sim.update(1.0).unwrap();

    let expected = sim.params().spring * r;
    let vel = sim.get_array(ParticleArray::Velocity).unwrap();
    assert!((vel[0] + expected).abs() < 1e-12, "A should be pushed -X, got {}", vel[0]);
    assert!((vel[3] - expected).abs() < 1e-12, "B should be pushed +X, got {}", vel[3]);
}

/// Particles pressed into the collider are pushed out of it
#[test]
fn test_collider_repels() {
    let mut sim = ready_system(1, 16);
    sim.set_gravity(0.0);
    sim.set_collider_pos(DVec3::splat(-0.75));
    let r = sim.particle_radius();
    let x = -0.75 + sim.collider_radius() + 0.5 * r;
    sim.set_array(ParticleArray::Position, &[x, -0.75, -0.75], 0, 1).unwrap();

    sim.update(1.0).unwrap();

    let vel = sim.get_array(ParticleArray::Velocity).unwrap();
    assert!(vel[0] > 0.0, "collider should push along +X, got {}", vel[0]);
    assert!(vel[1].abs() < 1e-15 && vel[2].abs() < 1e-15);
}

/// Contact parameters flow into the force evaluation
#[test]
fn test_spring_mutator_scales_contact() {
    let run = |spring: f64| {
        let mut sim = ready_system(2, 16);
        sim.set_gravity(0.0);
        sim.set_collide_spring(spring);
        sim.set_collide_damping(0.0);
        sim.set_collide_shear(0.0);
        sim.set_collide_attraction(0.0);
        let r = sim.particle_radius();
        sim.set_array(
            ParticleArray::Position,
            &[-0.75, -0.75, -0.75, -0.75 + r, -0.75, -0.75],
            0,
            2,
        )
        .unwrap();
        sim.update(1.0).unwrap();
        sim.get_array(ParticleArray::Velocity).unwrap()[0]
    };

    let weak = run(0.5);
    let strong = run(1.0);
    assert!((strong - 2.0 * weak).abs() < 1e-12);
}

/// Parameters can be stored as JSON and used to build a system
#[test]
fn test_params_from_json_file() {
    let mut params = SimParams::for_grid(UVec3::new(16, 8, 16));
    params.solver_iterations = 2;
    params.seed = 7;

    let path = std::env::temp_dir().join(format!("particles-params-{}.json", std::process::id()));
    params.save_json(&path).unwrap();
    let loaded = SimParams::load_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let sim = ParticleSystem::with_params(10, loaded).unwrap();
    assert_eq!(sim.iterations(), 2);
    assert_eq!(sim.params().seed, 7);
    assert_eq!(sim.grid_size(), UVec3::new(16, 8, 16));
}

/// Loading a missing file reports an I/O error
#[test]
fn test_params_missing_file() {
    let result = SimParams::load_json(std::path::Path::new("/nonexistent/params.json"));
    assert!(matches!(result, Err(SimError::Io(_))));
}
