//! Genetic encoding of networks.
//!
//! - Neuron kinds and the kind catalog
//! - Dependency resolution over neuron graphs
//! - Genes and genotypes
//! - Mutation operators
//! - Crossover and compatibility distance

pub mod crossover;
pub mod gene;
pub mod genotype;
pub mod graph;
pub mod mutations;
pub mod neuron;

pub use gene::Gene;
pub use genotype::Genotype;
pub use graph::{DependencyResolver, Graph, Resolution};
pub use mutations::MutationTally;
pub use neuron::{Activation, Neuron, NeuronCatalog, NeuronKind};
