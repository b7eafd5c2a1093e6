//! Explicit evolutionary context threaded through the engine.
//!
//! Holds what would otherwise be process-wide state: the innovation and
//! name counters, the seeded random generator, and the read-only
//! configuration, neuron catalog and corpus. Independent runs use
//! independent contexts.

use crate::config::Config;
use crate::corpus::Corpus;
use crate::error::NeatResult;
use crate::innovation::{CounterState, Innovation, InnovationCounter, NameGenerator};
use crate::neural::neuron::NeuronCatalog;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

pub struct NeatContext {
    pub config: Arc<Config>,
    pub catalog: Arc<NeuronCatalog>,
    pub corpus: Arc<Corpus>,
    innovations: InnovationCounter,
    names: NameGenerator,
    rng: ChaCha8Rng,
    seed: u64,
}

impl NeatContext {
    /// Context with the built-in neuron kinds. Uses `run.seed` when set.
    pub fn new(config: Config) -> NeatResult<Self> {
        Self::with_catalog(config, NeuronCatalog::new())
    }

    pub fn with_catalog(config: Config, catalog: NeuronCatalog) -> NeatResult<Self> {
        let seed = config.run.seed.unwrap_or_else(|| rand::thread_rng().gen());
        Self::build(config, catalog, seed, CounterState::default(), 0)
    }

    /// Rebuild a context from checkpointed counters. The generator is
    /// reseeded from `seed` and `generation` so a resumed run does not replay
    /// the random stream from its start.
    pub fn restore(
        config: Config,
        catalog: NeuronCatalog,
        seed: u64,
        counters: CounterState,
        generation: u64,
    ) -> NeatResult<Self> {
        Self::build(config, catalog, seed, counters, generation)
    }

    fn build(
        config: Config,
        catalog: NeuronCatalog,
        seed: u64,
        counters: CounterState,
        generation: u64,
    ) -> NeatResult<Self> {
        config.validate()?;
        let corpus = Corpus::from_config(&config.network, &catalog)?;
        log::debug!(
            "context: seed {} compositions {} innovation {}",
            seed,
            corpus.compositions().len(),
            counters.innovation
        );

        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            corpus: Arc::new(corpus),
            innovations: InnovationCounter::starting_after(counters.innovation),
            names: NameGenerator::starting_after(counters.names),
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(generation)),
            seed,
        })
    }

    #[inline]
    pub fn new_innovation(&self) -> Innovation {
        self.innovations.next()
    }

    pub fn random_name(&mut self) -> String {
        self.names.random_name(&mut self.rng)
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Bernoulli trial
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    /// Zero-mean Gaussian sample. A negative or non-finite deviation yields 0.
    pub fn gaussian(&mut self, sd: f64) -> f64 {
        match Normal::new(0.0, sd) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn counters(&self) -> CounterState {
        CounterState {
            innovation: self.innovations.last(),
            names: self.names.count(),
        }
    }
}
