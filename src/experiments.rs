//! Bundled fitness environments.
//!
//! [`XorExperiment`] evolves n-input parity (XOR for two inputs) and is what
//! the `tweann` binary runs. The boolean helpers are usable by any
//! environment whose outputs pass through a sigmoid or tanh neuron.

use crate::context::NeatContext;
use crate::critter::Critter;
use crate::hooks::{Hooks, StepOutcome};
use crate::neural::NeuronKind;

/// Output range of the squashing neuron
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Squash {
    /// Outputs in (0, 1), threshold 0.5
    Sigmoid,
    /// Outputs in (-1, 1), threshold 0
    Tanh,
}

impl Squash {
    fn low(self) -> f64 {
        match self {
            Squash::Sigmoid => 0.0,
            Squash::Tanh => -1.0,
        }
    }

    fn threshold(self) -> f64 {
        match self {
            Squash::Sigmoid => 0.5,
            Squash::Tanh => 0.0,
        }
    }
}

/// Booleans to neuron levels: true is 1, false is the low end of `squash`
pub fn condition_boolean_vector(bits: &[bool], squash: Squash) -> Vec<f64> {
    bits.iter()
        .map(|&b| if b { 1.0 } else { squash.low() })
        .collect()
}

/// Neuron levels to booleans, split at the midpoint of `squash`
pub fn uncondition_boolean_vector(values: &[f64], squash: Squash) -> Vec<bool> {
    values.iter().map(|&v| v > squash.threshold()).collect()
}

/// Euclidean distance between two vectors
pub fn simple_fitness_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Parity over `inputs` boolean inputs. Fitness is the per-step error, so
/// lower is fitter.
#[derive(Clone, Copy, Debug)]
pub struct XorExperiment {
    pub inputs: usize,
    pub squash: Squash,
    /// Stop once the best fitness falls below this
    pub stop_threshold: f64,
}

impl Default for XorExperiment {
    fn default() -> Self {
        Self {
            inputs: 2,
            squash: Squash::Sigmoid,
            stop_threshold: 0.05,
        }
    }
}

impl XorExperiment {
    /// Parity over every external input of the context's corpus. The
    /// squash follows the kind of the first declared output neuron.
    pub fn for_context(ctx: &NeatContext) -> Self {
        let squash = match ctx
            .corpus
            .compositions()
            .iter()
            .find_map(|c| c.outputs.first())
        {
            Some((_, NeuronKind::Tanh)) => Squash::Tanh,
            _ => Squash::Sigmoid,
        };
        Self {
            inputs: ctx.corpus.parameters().len(),
            squash,
            ..Self::default()
        }
    }

    /// Number of distinct input combinations, saturating at `u64::MAX`
    pub fn cases(&self) -> u64 {
        u32::try_from(self.inputs)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .unwrap_or(u64::MAX)
    }

    /// Inputs past the 64th are always false
    fn bits(&self, seq: u64) -> Vec<bool> {
        let case = seq % self.cases();
        (0..self.inputs)
            .map(|i| {
                u32::try_from(i)
                    .ok()
                    .and_then(|shift| case.checked_shr(shift))
                    .map_or(false, |v| v & 1 != 0)
            })
            .collect()
    }

    pub fn query(&self, seq: u64) -> Vec<f64> {
        condition_boolean_vector(&self.bits(seq), self.squash)
    }

    /// Expected output for conditioned inputs
    pub fn expected(&self, input: &[f64]) -> Vec<f64> {
        let parity = uncondition_boolean_vector(input, self.squash)
            .into_iter()
            .fold(false, |acc, b| acc ^ b);
        condition_boolean_vector(&[parity], self.squash)
    }

    /// Largest error a single step can have
    pub fn worst_error(&self) -> f64 {
        1.0 - self.squash.low()
    }

    pub fn step_error(&self, input: &[f64], outcome: &StepOutcome) -> f64 {
        match outcome.output() {
            Some(output) if !output.is_empty() => {
                let expected = self.expected(input);
                simple_fitness_error(&output[..1], &expected).min(self.worst_error())
            }
            _ => self.worst_error(),
        }
    }

    /// Query, fitness and stop hooks for this experiment
    pub fn hooks(&self) -> Hooks {
        let query = *self;
        let fitness = *self;
        let threshold = self.stop_threshold;

        let mut hooks = Hooks::new();
        hooks
            .on_query(move |seq| query.query(seq))
            .on_fitness(move |input, outcome, _| fitness.step_error(input, outcome))
            .on_stop(move |report| report.fitness.best < threshold);
        hooks
    }

    /// True when the critter's phenotype gets every case right
    pub fn solves(&self, critter: &mut Critter) -> bool {
        let Some(phenotype) = critter.phenotype.as_mut() else {
            return false;
        };
        (0..self.cases()).all(|seq| {
            let input = self.query(seq);
            phenotype.initialize_neurons();
            match phenotype.activate(&input) {
                Ok(output) if !output.is_empty() => {
                    uncondition_boolean_vector(&output[..1], self.squash)
                        == uncondition_boolean_vector(&self.expected(&input), self.squash)
                }
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_round_trip_tanh_and_sigmoid() {
        let bits = [true, false, true];
        assert_eq!(condition_boolean_vector(&bits, Squash::Tanh), vec![1.0, -1.0, 1.0]);
        assert_eq!(condition_boolean_vector(&bits, Squash::Sigmoid), vec![1.0, 0.0, 1.0]);
        assert_eq!(
            uncondition_boolean_vector(&[0.6, 0.4, -0.2], Squash::Sigmoid),
            vec![true, false, false]
        );
        assert_eq!(
            uncondition_boolean_vector(&[0.6, 0.4, -0.2], Squash::Tanh),
            vec![true, true, false]
        );
    }

    #[test]
    fn test_simple_fitness_error() {
        assert_eq!(simple_fitness_error(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(simple_fitness_error(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_xor_truth_table() {
        let xor = XorExperiment::default();
        assert_eq!(xor.cases(), 4);
        let table: Vec<(Vec<f64>, Vec<f64>)> = (0..4)
            .map(|seq| {
                let input = xor.query(seq);
                let expected = xor.expected(&input);
                (input, expected)
            })
            .collect();
        assert_eq!(table[0], (vec![0.0, 0.0], vec![0.0]));
        assert_eq!(table[1], (vec![1.0, 0.0], vec![1.0]));
        assert_eq!(table[2], (vec![0.0, 1.0], vec![1.0]));
        assert_eq!(table[3], (vec![1.0, 1.0], vec![0.0]));
        assert_eq!(xor.query(5), xor.query(1));
    }

    #[test]
    fn test_wide_inputs_do_not_overflow() {
        let xor = XorExperiment {
            inputs: 70,
            ..XorExperiment::default()
        };
        assert_eq!(xor.cases(), u64::MAX);
        let input = xor.query(5);
        assert_eq!(input.len(), 70);
        assert_eq!(&input[..4], &[1.0, 0.0, 1.0, 0.0]);
        assert!(input[4..].iter().all(|&v| v == 0.0));
        assert_eq!(xor.expected(&input), vec![0.0]);
    }

    #[test]
    fn test_for_context_follows_corpus() {
        use crate::config::{Config, NeuronConfig};

        let mut config = Config::default();
        config.network.compositions[0]
            .inputs
            .insert(0, NeuronConfig::new("i0", "input"));
        config.network.compositions[0].outputs = vec![NeuronConfig::new("out", "tanh")];
        let ctx = NeatContext::new(config).unwrap();

        let xor = XorExperiment::for_context(&ctx);
        assert_eq!(xor.inputs, 3);
        assert_eq!(xor.squash, Squash::Tanh);
        assert_eq!(xor.cases(), 8);
    }

    #[test]
    fn test_error_outcome_scores_worst() {
        let xor = XorExperiment {
            squash: Squash::Tanh,
            ..XorExperiment::default()
        };
        let input = xor.query(1);
        assert_eq!(xor.step_error(&input, &StepOutcome::Error("boom".into())), 2.0);
        assert_eq!(xor.step_error(&input, &StepOutcome::Output(vec![1.0])), 0.0);
        assert_eq!(xor.step_error(&input, &StepOutcome::Output(vec![-1.0])), 2.0);
    }
}
