//! Configuration system for evolutionary runs.
//!
//! Supports YAML configuration files with sensible defaults. The defaults
//! describe the classic XOR problem.

use crate::error::{NeatError, NeatResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    pub population: PopulationConfig,
    pub mutation: MutationConfig,
    pub speciation: SpeciationConfig,
    pub fitness_cost: FitnessCostConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Neuron layout of the critters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// One genotype per composition
    pub compositions: Vec<CompositionConfig>,
    /// Wiring between compositions; required when there is more than one
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionConfig {
    pub name: String,
    pub inputs: Vec<NeuronConfig>,
    pub outputs: Vec<NeuronConfig>,
    /// Kind names eligible for hidden neurons; empty means every non-input kind
    #[serde(default)]
    pub hidden: Vec<String>,
}

/// A named input or output neuron and its kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronConfig {
    pub name: String,
    pub kind: String,
}

/// `from: "node.port"`, `to: "node.port"`; `input` and `output` are the
/// critter's own external ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
}

/// Population sizing, elitism and survival
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub population_size: usize,
    /// Optional smaller initial population that mating grows to full size
    #[serde(default)]
    pub start_population_size: Option<usize>,
    /// Critters carried over unchanged each generation
    pub elite_count: usize,
    /// Percentage (0-100) of the population; wins over `elite_count` when larger
    #[serde(default)]
    pub elite_percentage: Option<f64>,
    /// Top fraction (0-1) of each species allowed to mate
    pub survival_threshold: f64,
    pub survival_minimum_per_species: usize,
}

/// Mutation probabilities and standard deviations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability of skipping every mutation operator for a generation
    pub mate_only_prob: f64,
    pub perturb_gene_weights_prob: f64,
    pub perturb_gene_weights_sd: f64,
    pub change_gene_weights_prob: f64,
    pub change_gene_weights_sd: f64,
    pub add_neuron_prob: f64,
    pub add_gene_prob: f64,
    pub gene_disable_prob: f64,
    pub gene_reenable_prob: f64,
    /// Standard deviation of weights for fresh genes
    pub initial_weight_sd: f64,
}

/// Compatibility distance d = c1*E + c2*D + c3*W
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciationConfig {
    pub compatibility_threshold: f64,
    pub excess_coefficient: f64,
    pub disjoint_coefficient: f64,
    pub weight_coefficient: f64,
    /// Species smaller than this are merged into one catch-all group
    pub smallest_species: usize,
}

/// Structural penalty added to fitness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessCostConfig {
    pub per_neuron: f64,
    pub per_gene: f64,
    pub per_neuron_free_until: usize,
    pub per_gene_free_until: usize,
}

/// Generation loop limits and evaluation window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_generations: u64,
    /// Populations retained by the controller for introspection
    pub max_population_history: usize,
    /// Inclusive evaluation window
    pub start_sequence_at: u64,
    pub end_sequence_at: u64,
    /// Upper bound on recurrence ticks per activation
    #[serde(default)]
    pub max_recurrence_ticks: Option<usize>,
    /// Random seed for reproducibility
    #[serde(default)]
    pub seed: Option<u64>,
    /// Express critters on the rayon pool
    #[serde(default)]
    pub parallel_expression: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Generations between summary lines
    pub report_interval: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            compositions: vec![CompositionConfig {
                name: "main".to_string(),
                inputs: vec![
                    NeuronConfig::new("i1", "input"),
                    NeuronConfig::new("i2", "input"),
                    NeuronConfig::new("bias", "bias"),
                ],
                outputs: vec![NeuronConfig::new("out", "sigmoid")],
                hidden: vec!["sigmoid".to_string()],
            }],
            connections: Vec::new(),
        }
    }
}

impl NeuronConfig {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            start_population_size: None,
            elite_count: 2,
            elite_percentage: None,
            survival_threshold: 0.2,
            survival_minimum_per_species: 1,
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            mate_only_prob: 0.1,
            perturb_gene_weights_prob: 0.2,
            perturb_gene_weights_sd: 0.3,
            change_gene_weights_prob: 0.002,
            change_gene_weights_sd: 1.0,
            add_neuron_prob: 0.03,
            add_gene_prob: 0.05,
            gene_disable_prob: 0.01,
            gene_reenable_prob: 0.01,
            initial_weight_sd: 1.0,
        }
    }
}

impl Default for SpeciationConfig {
    fn default() -> Self {
        Self {
            compatibility_threshold: 4.0,
            excess_coefficient: 0.6,
            disjoint_coefficient: 0.6,
            weight_coefficient: 0.2,
            smallest_species: 2,
        }
    }
}

impl Default for FitnessCostConfig {
    fn default() -> Self {
        Self {
            per_neuron: 0.00001,
            per_gene: 0.00001,
            per_neuron_free_until: 20,
            per_gene_free_until: 40,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_generations: 1000,
            max_population_history: 10,
            start_sequence_at: 0,
            end_sequence_at: 100,
            max_recurrence_ticks: None,
            seed: None,
            parallel_expression: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            report_interval: 1,
        }
    }
}

impl PopulationConfig {
    /// Size of the very first population
    pub fn initial_size(&self) -> usize {
        self.start_population_size.unwrap_or(self.population_size)
    }

    /// Elite count after applying `elite_percentage`
    pub fn effective_elite_count(&self) -> usize {
        match self.elite_percentage {
            Some(pct) => {
                let count = (self.population_size as f64 * pct / 100.0) as usize;
                count.max(self.elite_count)
            }
            None => self.elite_count,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> NeatResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NeatResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values. Neuron kinds and connections are
    /// checked later, when the corpus is built against a catalog.
    pub fn validate(&self) -> NeatResult<()> {
        let invalid = |msg: &str| Err(NeatError::InvalidConfig(msg.to_string()));

        if self.population.population_size == 0 {
            return invalid("population_size must be > 0");
        }
        if self.population.initial_size() == 0 {
            return invalid("start_population_size must be > 0");
        }
        if !(0.0..=1.0).contains(&self.population.survival_threshold) {
            return invalid("survival_threshold must be between 0 and 1");
        }
        if let Some(pct) = self.population.elite_percentage {
            if !(0.0..=100.0).contains(&pct) {
                return invalid("elite_percentage must be between 0 and 100");
            }
        }

        let m = &self.mutation;
        let probs = [
            m.mate_only_prob,
            m.perturb_gene_weights_prob,
            m.change_gene_weights_prob,
            m.add_neuron_prob,
            m.add_gene_prob,
            m.gene_disable_prob,
            m.gene_reenable_prob,
        ];
        if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return invalid("mutation probabilities must be between 0 and 1");
        }
        let sds = [
            m.perturb_gene_weights_sd,
            m.change_gene_weights_sd,
            m.initial_weight_sd,
        ];
        if sds.iter().any(|sd| !sd.is_finite() || *sd < 0.0) {
            return invalid("standard deviations must be finite and >= 0");
        }

        if self.speciation.compatibility_threshold <= 0.0 {
            return invalid("compatibility_threshold must be > 0");
        }
        if self.run.end_sequence_at < self.run.start_sequence_at {
            return invalid("end_sequence_at must not precede start_sequence_at");
        }
        if self.run.max_population_history == 0 {
            return invalid("max_population_history must be > 0");
        }
        if self.network.compositions.is_empty() {
            return invalid("at least one composition is required");
        }
        for composition in &self.network.compositions {
            if composition.inputs.is_empty() || composition.outputs.is_empty() {
                return Err(NeatError::InvalidConfig(format!(
                    "composition '{}' needs inputs and outputs",
                    composition.name
                )));
            }
        }
        Ok(())
    }
}
