//! Error type shared by the tree, the arena and the simulations.

use thiserror::Error;

/// Everything that can go wrong while building or evaluating a tree.
///
/// Near-coincident particles during force evaluation are not errors: those
/// interactions are skipped. Coincident particles during insertion are not
/// errors either; they end up sharing a bucket leaf once the subdivision
/// limit is reached and show up in [`crate::octree::BuildStats`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("a simulation needs at least one particle")]
    EmptyParticleSet,

    #[error("particle {index} (id {id}) is invalid: {reason}")]
    InvalidParticle {
        index: usize,
        id: usize,
        reason: &'static str,
    },

    #[error("particle {index} has a non-finite position, bounds are undefined")]
    NonFinitePosition { index: usize },

    #[error("particle extent cannot be enclosed in a finite cube")]
    BoundsOverflow,

    #[error("particle {index} lies outside the root bounds")]
    OutsideBounds { index: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("node arena cannot grow to {requested} nodes (limit {limit})")]
    ResourceExhaustion { requested: usize, limit: usize },

    #[error("forces requested before the tree was built for the current particle state")]
    TreeNotBuilt,

    #[error("config file {path}: {message}")]
    ConfigIo { path: String, message: String },

    #[error("cannot encode config: {0}")]
    ConfigFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
