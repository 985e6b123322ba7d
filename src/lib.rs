//! Barnes-Hut N-body gravity on a pooled octree.
//!
//! [`simulation::BarnesHutSimulation`] owns a particle set and, every step,
//! fits a cube around it, rebuilds an [`octree::Octree`] out of nodes recycled
//! through an [`octree::NodeArena`], and accumulates the approximate force on
//! each particle. [`simulation::BruteForceSimulation`] does the same by direct
//! summation and serves as the exact reference.

pub mod config;
pub mod error;
pub mod kernel;
pub mod octree;
pub mod shared;
pub mod simulation;

pub use error::{Error, Result};
