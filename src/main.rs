use std::path::PathBuf;
use std::time::Instant;

use bhlib::{
    config::{IntegratorKind, SimulationConfig, SimulationSettings},
    shared::{EulerCromerIntegrator, Integrator, LeapFrogIntegrator, Particle, PointParticle, Simulation, Vector},
    simulation::{BarnesHutSimulation, BruteForceSimulation},
};
use clap::Parser;
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Runs a Barnes-Hut simulation of a random cube of bodies.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML file with [physics] and [run] tables; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    particles: Option<usize>,

    #[arg(long)]
    steps: Option<usize>,

    #[arg(long)]
    dt: Option<f64>,

    #[arg(long)]
    theta: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Side of the cube the initial positions are drawn from
    #[arg(long)]
    range: Option<f64>,

    #[arg(long, value_enum)]
    integrator: Option<IntegratorKind>,

    /// Report the force error against direct summation before running
    #[arg(long)]
    compare: bool,

    /// Write the effective configuration to FILE and continue
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn merged_config(args: &Args) -> SimulationConfig {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load_or_default(path),
        None => SimulationConfig::default(),
    };
    if let Some(particles) = args.particles {
        config.run.particles = particles;
    }
    if let Some(steps) = args.steps {
        config.run.steps = steps;
    }
    if let Some(dt) = args.dt {
        config.run.dt = dt;
    }
    if let Some(theta) = args.theta {
        config.physics.theta = theta;
    }
    if let Some(range) = args.range {
        config.run.range = range;
    }
    if let Some(integrator) = args.integrator {
        config.run.integrator = integrator;
    }
    if args.seed.is_some() {
        config.run.seed = args.seed;
    }
    config
}

fn random_cube(count: usize, range: f64, rng: &mut StdRng) -> Vec<PointParticle<f64>> {
    let half = range / 2.0;
    (0..count)
        .map(|id| {
            let position = Vector::new(
                rng.random_range(-half..half),
                rng.random_range(-half..half),
                rng.random_range(-half..half),
            );
            let velocity = Vector::new(
                rng.random_range(-0.1..0.1),
                rng.random_range(-0.1..0.1),
                rng.random_range(-0.1..0.1),
            );
            PointParticle::new(id, position, velocity, rng.random_range(1e10..1e12))
        })
        .collect()
}

/// Largest relative deviation of the tree forces from direct summation, with
/// the id of the particle it occurs at.
fn max_force_error<I>(
    sim: &mut BarnesHutSimulation<f64, PointParticle<f64>, I>,
    points: &[PointParticle<f64>],
    settings: &SimulationSettings<f64>,
) -> bhlib::Result<(f64, usize)>
where
    I: Integrator<f64, PointParticle<f64>>,
{
    let mut reference =
        BruteForceSimulation::new(points.to_vec(), EulerCromerIntegrator, settings.clone())?;
    reference.update_forces()?;
    sim.build_tree()?;
    sim.calculate_forces(settings.theta)?;

    let worst = sim
        .get_points()
        .iter()
        .zip(reference.get_points())
        .filter(|(_, exact)| exact.force.norm() > 0.0)
        .map(|(approx, exact)| ((approx.force - exact.force).norm() / exact.force.norm(), approx.id()))
        .fold((0.0, 0), |worst, candidate| if candidate.0 > worst.0 { candidate } else { worst });
    Ok(worst)
}

fn run<I>(
    points: Vec<PointParticle<f64>>,
    integrator: I,
    settings: SimulationSettings<f64>,
    steps: usize,
    compare: bool,
) -> bhlib::Result<()>
where
    I: Integrator<f64, PointParticle<f64>>,
{
    let mut sim = BarnesHutSimulation::new(points.clone(), integrator, settings.clone())?;

    if compare {
        let (error, id) = max_force_error(&mut sim, &points, &settings)?;
        info!(
            "max relative force error at theta {}: {:.3e} (particle {id})",
            settings.theta, error
        );
    }

    sim.init()?;
    let initial_energy = sim.total_energy()?;
    let start = Instant::now();

    for step in 1..=steps {
        sim.step_by(settings.dt)?;
        if step % 100 == 0 {
            info!("step {step}/{steps}, t = {:.3}", sim.elapsed());
        }
    }

    let elapsed = start.elapsed();
    let stats = sim.octree().stats();
    let final_energy = sim.total_energy()?;
    let drift = ((final_energy - initial_energy) / initial_energy).abs();

    info!("Elapsed: {elapsed:?}");
    info!(
        "tree: {} nodes, depth {}, {} bucket leaves, arena capacity {}",
        stats.nodes,
        stats.max_depth,
        stats.bucket_leaves,
        sim.octree().arena().capacity()
    );
    info!("energy {initial_energy:.6e} -> {final_energy:.6e} (relative drift {drift:.3e})");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();
    let config = merged_config(&args);
    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!("wrote configuration to {}", path.display());
    }

    let seed = config.run.seed.unwrap_or_else(rand::random);
    info!(
        "{} particles, {} steps, dt {}, theta {}, seed {seed}",
        config.run.particles, config.run.steps, config.run.dt, config.physics.theta
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let points = random_cube(config.run.particles, config.run.range, &mut rng);
    let settings = config.physics.settings::<f64>(config.run.dt);

    match config.run.integrator {
        IntegratorKind::Euler => run(points, EulerCromerIntegrator, settings, config.run.steps, args.compare)?,
        IntegratorKind::Leapfrog => run(points, LeapFrogIntegrator, settings, config.run.steps, args.compare)?,
    }
    Ok(())
}
