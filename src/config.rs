//! Runtime settings for the simulations and the TOML configuration the driver
//! loads them from.

use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernel::GravityKernel;
use crate::octree::SubdivisionLimits;
use crate::shared::Float;

/// Tunables read by the tree and the simulations on every step.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings<F: Float> {
    /// Gravitational constant.
    pub g: F,
    /// Barnes-Hut opening angle. `0` or below disables approximation entirely.
    pub theta: F,
    /// Default time step for `Simulation::step_by` callers.
    pub dt: F,
    /// Plummer softening length, `0` for the exact inverse-square law.
    pub softening: F,
    /// Squared separations below this contribute no force or potential.
    pub coincidence_epsilon: F,
    /// Relative padding added to the root cube so particles sit strictly inside.
    pub bounds_padding: F,
    /// Depth at which leaves stop splitting and start collecting particles.
    pub max_depth: usize,
    /// Side length at or below which leaves stop splitting.
    pub min_side_length: F,
    /// Nodes pre-allocated per particle when the arena is created.
    pub node_capacity_factor: usize,
    /// Hard ceiling on arena size; `None` grows until allocation fails.
    pub max_nodes: Option<usize>,
}

impl<F: Float> Default for SimulationSettings<F> {
    fn default() -> Self {
        Self {
            g: F::one(),
            theta: nalgebra::convert::<f64, F>(0.5),
            dt: nalgebra::convert::<f64, F>(1e-3),
            softening: F::zero(),
            coincidence_epsilon: nalgebra::convert::<f64, F>(f64::EPSILON),
            bounds_padding: nalgebra::convert::<f64, F>(0.01),
            max_depth: 64,
            min_side_length: F::zero(),
            node_capacity_factor: 2,
            max_nodes: None,
        }
    }
}

impl<F: Float> SimulationSettings<F> {
    pub fn kernel(&self) -> GravityKernel<F> {
        GravityKernel::new(self.g, self.softening)
    }

    pub fn subdivision_limits(&self) -> SubdivisionLimits<F> {
        SubdivisionLimits {
            max_depth: self.max_depth,
            min_side_length: self.min_side_length,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    #[default]
    Euler,
    Leapfrog,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub run: RunConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravitational_constant: f64,
    pub theta: f64,
    pub softening: f64,
    pub coincidence_epsilon: f64,
    pub bounds_padding: f64,
    pub max_depth: usize,
    pub min_side_length: f64,
    pub max_nodes: Option<usize>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: 6.67430e-11,
            theta: 0.5,
            softening: 0.0,
            coincidence_epsilon: f64::EPSILON,
            bounds_padding: 0.01,
            max_depth: 64,
            min_side_length: 0.0,
            max_nodes: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub particles: usize,
    pub steps: usize,
    pub dt: f64,
    pub range: f64,
    pub seed: Option<u64>,
    pub integrator: IntegratorKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            particles: 1000,
            steps: 1000,
            dt: 1.0,
            range: 1000.0,
            seed: None,
            integrator: IntegratorKind::Euler,
        }
    }
}

impl PhysicsConfig {
    pub fn settings<F: Float>(&self, dt: f64) -> SimulationSettings<F> {
        SimulationSettings {
            g: nalgebra::convert::<f64, F>(self.gravitational_constant),
            theta: nalgebra::convert::<f64, F>(self.theta),
            dt: nalgebra::convert::<f64, F>(dt),
            softening: nalgebra::convert::<f64, F>(self.softening),
            coincidence_epsilon: nalgebra::convert::<f64, F>(self.coincidence_epsilon),
            bounds_padding: nalgebra::convert::<f64, F>(self.bounds_padding),
            max_depth: self.max_depth,
            min_side_length: nalgebra::convert::<f64, F>(self.min_side_length),
            max_nodes: self.max_nodes,
            ..SimulationSettings::default()
        }
    }
}

impl SimulationConfig {
    /// Reads `path`, or the defaults when it is missing or malformed. Tables
    /// and keys absent from the file keep their default values.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err}, running with the default configuration");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::ConfigIo {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|err| Error::ConfigIo {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as TOML that [`SimulationConfig::load`] reads back.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|err| Error::ConfigFormat(err.to_string()))?;
        std::fs::write(path, content).map_err(|err| Error::ConfigIo {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: SimulationConfig = toml::from_str(
            r#"
            [physics]
            theta = 0.3

            [run]
            particles = 64
            integrator = "leapfrog"
            "#,
        )
        .unwrap();

        assert_eq!(config.physics.theta, 0.3);
        assert_eq!(config.physics.max_depth, 64);
        assert_eq!(config.run.particles, 64);
        assert_eq!(config.run.integrator, IntegratorKind::Leapfrog);
        assert_eq!(config.run.dt, RunConfig::default().dt);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SimulationConfig::load_or_default(Path::new("/nonexistent/bhtree.toml"));
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("bhtree-config-{}.toml", std::process::id()));
        let mut config = SimulationConfig::default();
        config.run.seed = Some(7);
        config.physics.softening = 0.25;
        config.save(&path).unwrap();

        let loaded = SimulationConfig::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_and_save_report_config_errors() {
        let missing = Path::new("/nonexistent/bhtree.toml");
        assert!(matches!(
            SimulationConfig::load(missing),
            Err(Error::ConfigIo { path, .. }) if path == "/nonexistent/bhtree.toml"
        ));
        assert!(matches!(
            SimulationConfig::default().save(Path::new("/nonexistent/dir/bhtree.toml")),
            Err(Error::ConfigIo { .. })
        ));

        let path = std::env::temp_dir().join(format!("bhtree-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[physics]\ntheta = \"wide\"\n").unwrap();
        let loaded = SimulationConfig::load(&path);
        let fallback = SimulationConfig::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(loaded, Err(Error::ConfigIo { .. })));
        assert_eq!(fallback, SimulationConfig::default());
    }

    #[test]
    fn test_physics_config_to_settings() {
        let physics = PhysicsConfig {
            gravitational_constant: 1.0,
            theta: 0.7,
            max_depth: 12,
            ..PhysicsConfig::default()
        };
        let settings: SimulationSettings<f64> = physics.settings(0.01);
        assert_eq!(settings.g, 1.0);
        assert_eq!(settings.theta, 0.7);
        assert_eq!(settings.dt, 0.01);
        assert_eq!(settings.subdivision_limits().max_depth, 12);
        assert_eq!(settings.node_capacity_factor, 2);
    }
}
