//! Error types shared across the engine.

use crate::checkpoint::CheckpointError;

/// Result type for engine operations
pub type NeatResult<T> = Result<T, NeatError>;

/// Errors raised by the evolutionary core
#[derive(Debug, thiserror::Error)]
pub enum NeatError {
    /// Structurally broken setup: bad config values, unknown neuron kinds,
    /// missing hooks, malformed connection specs.
    #[error("invalid NEAT configuration: {0}")]
    InvalidConfig(String),

    #[error("neuron {neuron} missing from genotype {genotype}")]
    MissingNeuron { genotype: String, neuron: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("phenotype expression failed for critter {critter}: {reason}")]
    Expression { critter: String, reason: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Dependency graph failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The node's adjacency list was never initialized (not wired).
    #[error("graph failure: input is nil for node {0}")]
    Uninitialized(String),

    #[error("circular dependency detected: {0:?}")]
    Circular(Vec<String>),
}

/// Recoverable failure of a single activation step
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActivationError {
    #[error("expected {expected} inputs, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("neuron {neuron} produced non-finite value {value}")]
    NonFinite { neuron: String, value: f64 },
}
