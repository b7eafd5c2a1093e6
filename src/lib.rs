//! # TWEANN
//!
//! NeuroEvolution of Augmenting Topologies: evolves both the weights and the
//! structure of neural networks.
//!
//! ## Features
//!
//! - **Topology evolution**: innovation-numbered genes, add-neuron and
//!   add-gene mutations, aligned crossover
//! - **Speciation**: compatibility distance protects new structure
//! - **Modular critters**: several sub-networks wired by a connection list
//! - **Recurrence**: cycles compile to persisted state
//! - **Parallel**: optional expression on the rayon pool
//! - **Reproducible**: every random decision comes from a seeded generator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tweann::experiments::XorExperiment;
//! use tweann::{Config, Controller, NeatContext};
//!
//! let mut config = Config::default();
//! config.run.seed = Some(42);
//!
//! let ctx = NeatContext::new(config).unwrap();
//! let xor = XorExperiment::default();
//! let mut controller = Controller::new(ctx, xor.hooks()).unwrap();
//!
//! let outcome = controller.run().unwrap();
//! println!("{:?} after {} generations", outcome.reason, outcome.generations);
//! if let Some(best) = controller.best_critter() {
//!     println!("{}", best.report());
//! }
//! ```
//!
//! ## Checkpoints
//!
//! ```rust,no_run
//! use tweann::checkpoint::Checkpoint;
//! use tweann::experiments::XorExperiment;
//! use tweann::neural::NeuronCatalog;
//! # use tweann::{Config, Controller, NeatContext};
//! # let ctx = NeatContext::new(Config::default()).unwrap();
//! # let controller = Controller::new(ctx, XorExperiment::default().hooks()).unwrap();
//!
//! controller.create_checkpoint().save("checkpoint.bin").unwrap();
//!
//! let loaded = Checkpoint::load("checkpoint.bin").unwrap();
//! let resumed = Controller::from_checkpoint(
//!     loaded,
//!     NeuronCatalog::new(),
//!     XorExperiment::default().hooks(),
//! )
//! .unwrap();
//! ```

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod controller;
pub mod corpus;
pub mod critter;
pub mod error;
pub mod evaluator;
pub mod evolution;
pub mod experiments;
pub mod expressor;
pub mod hooks;
pub mod innovation;
pub mod neural;
pub mod phenotype;
pub mod population;
pub mod stats;

// Re-export main types
pub use config::Config;
pub use context::NeatContext;
pub use controller::{Controller, RunOutcome, StopReason};
pub use critter::Critter;
pub use error::{NeatError, NeatResult};
pub use hooks::{Hooks, StepOutcome};
pub use population::Population;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use experiments::XorExperiment;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_xor_run() {
        let mut config = Config::default();
        config.run.seed = Some(1);
        config.run.max_generations = 2;
        config.population.population_size = 20;

        let ctx = NeatContext::new(config).unwrap();
        let mut controller = Controller::new(ctx, XorExperiment::default().hooks()).unwrap();
        let outcome = controller.run().unwrap();

        assert!(outcome.generations >= 1);
        assert!(outcome.last_report.is_some());
    }
}
