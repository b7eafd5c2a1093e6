//! Executable form of a critter.
//!
//! Each genotype compiles to a [`NetworkProgram`]: a flat list of steps, one
//! per reachable non-input neuron, each reading weighted values out of a slot
//! vector. Slots keep their values between activations, which is what makes
//! recurrent connections work: a neuron read before it is computed in the
//! current tick yields its value from the previous tick.

use crate::corpus::{Source, Wiring};
use crate::error::ActivationError;
use crate::neural::neuron::{Activation, Combine};
use std::fmt::Write as _;
use std::sync::Arc;

/// One neuron evaluation
#[derive(Clone, Debug)]
pub struct Step {
    pub target: usize,
    pub activation: Activation,
    /// (weight, source slot)
    pub inputs: Vec<(f64, usize)>,
}

impl Step {
    #[inline]
    fn eval(&self, slots: &[f64]) -> f64 {
        let combined = match self.activation.combine() {
            Combine::Sum => self.inputs.iter().map(|(w, s)| w * slots[*s]).sum::<f64>(),
            Combine::Product => self.inputs.iter().map(|(w, s)| w * slots[*s]).product::<f64>(),
        };
        self.activation.apply(combined)
    }
}

/// Compiled genotype
#[derive(Clone, Debug)]
pub struct NetworkProgram {
    pub name: String,
    pub slot_names: Vec<String>,
    pub parameters: Vec<usize>,
    pub biases: Vec<usize>,
    pub outputs: Vec<usize>,
    pub steps: Vec<Step>,
    /// Neurons found on a cycle while resolving
    pub circular: Option<Vec<String>>,
}

impl NetworkProgram {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_recurrent(&self) -> bool {
        self.circular.is_some()
    }

    /// Zero every non-input slot, and set biases
    fn initialize(&self, slots: &mut [f64]) {
        slots.iter_mut().for_each(|v| *v = 0.0);
        for &bias in &self.biases {
            slots[bias] = 1.0;
        }
    }

    fn tick(&self, slots: &mut [f64], params: &[f64]) -> Result<Vec<f64>, ActivationError> {
        if params.len() != self.parameters.len() {
            return Err(ActivationError::ArityMismatch {
                expected: self.parameters.len(),
                got: params.len(),
            });
        }
        for (&slot, &value) in self.parameters.iter().zip(params) {
            slots[slot] = value;
        }
        for &bias in &self.biases {
            slots[bias] = 1.0;
        }

        for step in &self.steps {
            let value = step.eval(slots);
            if !value.is_finite() {
                return Err(ActivationError::NonFinite {
                    neuron: self.slot_names[step.target].clone(),
                    value,
                });
            }
            slots[step.target] = value;
        }

        Ok(self.outputs.iter().map(|&slot| slots[slot]).collect())
    }

    /// Readable listing of the program
    pub fn source(&self) -> String {
        let name = |slot: usize| self.slot_names[slot].as_str();
        let mut out = String::new();
        let params: Vec<&str> = self.parameters.iter().map(|&s| name(s)).collect();
        let _ = writeln!(out, "network {}({}) {{", self.name, params.join(", "));
        for step in &self.steps {
            let op = match step.activation.combine() {
                Combine::Sum => " + ",
                Combine::Product => " * ",
            };
            let terms: Vec<String> = step
                .inputs
                .iter()
                .map(|(w, s)| format!("{:.4}*{}", w, name(*s)))
                .collect();
            let _ = writeln!(
                out,
                "  {} = {}({})",
                name(step.target),
                step.activation.name(),
                terms.join(op)
            );
        }
        let outputs: Vec<&str> = self.outputs.iter().map(|&s| name(s)).collect();
        let _ = writeln!(out, "  return [{}]", outputs.join(", "));
        if let Some(circular) = &self.circular {
            let _ = writeln!(out, "  # recurrent through {}", circular.join(", "));
        }
        out.push('}');
        out
    }
}

/// All compiled networks of a critter plus the wrapper routing between them
#[derive(Clone, Debug)]
pub struct Phenotype {
    /// Indexed like the corpus compositions
    networks: Vec<NetworkProgram>,
    wiring: Arc<Wiring>,
    state: Vec<Vec<f64>>,
    max_ticks: Option<usize>,
}

impl Phenotype {
    pub fn new(networks: Vec<NetworkProgram>, wiring: Arc<Wiring>, max_ticks: Option<usize>) -> Self {
        let state = networks.iter().map(|n| vec![0.0; n.slot_names.len()]).collect();
        let mut phenotype = Self {
            networks,
            wiring,
            state,
            max_ticks,
        };
        phenotype.initialize_neurons();
        phenotype
    }

    pub fn networks(&self) -> &[NetworkProgram] {
        &self.networks
    }

    /// External input count
    pub fn arity(&self) -> usize {
        self.wiring.external_inputs.len()
    }

    pub fn is_recurrent(&self) -> bool {
        self.networks.iter().any(|n| n.is_recurrent())
    }

    /// Reset recurrent state
    pub fn initialize_neurons(&mut self) {
        for (network, slots) in self.networks.iter().zip(self.state.iter_mut()) {
            network.initialize(slots);
        }
    }

    /// One tick through every sub-network
    pub fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>, ActivationError> {
        if inputs.len() != self.arity() {
            return Err(ActivationError::ArityMismatch {
                expected: self.arity(),
                got: inputs.len(),
            });
        }

        let mut results: Vec<Vec<f64>> = vec![Vec::new(); self.networks.len()];
        for &index in &self.wiring.order {
            let params: Vec<f64> = self.wiring.inputs[index]
                .iter()
                .map(|source| fetch(*source, inputs, &results))
                .collect();
            results[index] = self.networks[index].tick(&mut self.state[index], &params)?;
        }

        Ok(self
            .wiring
            .outputs
            .iter()
            .map(|source| fetch(*source, inputs, &results))
            .collect())
    }

    /// Repeat ticks while `continue_with` returns true for the latest outputs,
    /// bounded by the configured tick limit.
    pub fn activate_with(
        &mut self,
        inputs: &[f64],
        continue_with: &mut dyn FnMut(&[f64]) -> bool,
    ) -> Result<Vec<f64>, ActivationError> {
        let mut ticks = 0usize;
        loop {
            let outputs = self.activate(inputs)?;
            ticks += 1;
            if self.max_ticks.map_or(false, |max| ticks >= max) || !continue_with(&outputs) {
                return Ok(outputs);
            }
        }
    }

    /// Listing of every network in call order
    pub fn source(&self) -> String {
        self.wiring
            .order
            .iter()
            .map(|&i| self.networks[i].source())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[inline]
fn fetch(source: Source, inputs: &[f64], results: &[Vec<f64>]) -> f64 {
    match source {
        Source::External(i) => inputs.get(i).copied().unwrap_or(0.0),
        Source::Network {
            composition,
            output,
        } => results
            .get(composition)
            .and_then(|r| r.get(output))
            .copied()
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::neuron::NeuronKind;

    fn single(network: NetworkProgram) -> Phenotype {
        let params = network.parameters.len();
        let outputs = network.outputs.len();
        let wiring = Wiring {
            order: vec![0],
            inputs: vec![(0..params).map(Source::External).collect()],
            outputs: (0..outputs)
                .map(|output| Source::Network {
                    composition: 0,
                    output,
                })
                .collect(),
            external_inputs: (0..params).map(|i| format!("x{}", i)).collect(),
            external_outputs: (0..outputs).map(|i| format!("y{}", i)).collect(),
        };
        Phenotype::new(vec![network], Arc::new(wiring), None)
    }

    /// slots: x, bias, acc. acc = linear(1*x + 1*bias + 1*acc)
    fn accumulator() -> NetworkProgram {
        NetworkProgram {
            name: "acc".to_string(),
            slot_names: vec!["x".into(), "bias".into(), "acc".into()],
            parameters: vec![0],
            biases: vec![1],
            outputs: vec![2],
            steps: vec![Step {
                target: 2,
                activation: Activation::Builtin(NeuronKind::Linear),
                inputs: vec![(1.0, 0), (1.0, 1), (1.0, 2)],
            }],
            circular: Some(vec!["acc".to_string()]),
        }
    }

    #[test]
    fn test_recurrent_state_persists_between_calls() {
        let mut phenotype = single(accumulator());
        assert_eq!(phenotype.activate(&[1.0]).unwrap(), vec![2.0]);
        assert_eq!(phenotype.activate(&[1.0]).unwrap(), vec![4.0]);

        phenotype.initialize_neurons();
        assert_eq!(phenotype.activate(&[0.0]).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_activate_with_loops_until_hook_declines() {
        let mut phenotype = single(accumulator());
        let mut calls = 0;
        let out = phenotype
            .activate_with(&[0.0], &mut |out| {
                calls += 1;
                out[0] < 3.0
            })
            .unwrap();
        assert_eq!(out, vec![3.0]);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_activate_with_respects_tick_limit() {
        let mut phenotype = single(accumulator());
        phenotype.max_ticks = Some(5);
        let out = phenotype.activate_with(&[0.0], &mut |_| true).unwrap();
        assert_eq!(out, vec![5.0]);
    }

    #[test]
    fn test_arity_mismatch() {
        let mut phenotype = single(accumulator());
        assert_eq!(
            phenotype.activate(&[1.0, 2.0]),
            Err(ActivationError::ArityMismatch {
                expected: 1,
                got: 2
            })
        );
    }

    #[test]
    fn test_non_finite_is_error() {
        let mut network = accumulator();
        network.steps[0].inputs = vec![(f64::MAX, 0), (f64::MAX, 1)];
        let mut phenotype = single(network);
        let err = phenotype.activate(&[f64::MAX]).unwrap_err();
        assert!(matches!(err, ActivationError::NonFinite { neuron, .. } if neuron == "acc"));
    }

    #[test]
    fn test_product_combine() {
        let network = NetworkProgram {
            name: "mul".to_string(),
            slot_names: vec!["a".into(), "b".into(), "m".into()],
            parameters: vec![0, 1],
            biases: vec![],
            outputs: vec![2],
            steps: vec![Step {
                target: 2,
                activation: Activation::Builtin(NeuronKind::Multiplier),
                inputs: vec![(2.0, 0), (0.5, 1)],
            }],
            circular: None,
        };
        let mut phenotype = single(network);
        assert_eq!(phenotype.activate(&[3.0, 4.0]).unwrap(), vec![6.0]);
    }

    #[test]
    fn test_source_listing() {
        let phenotype = single(accumulator());
        let source = phenotype.source();
        assert!(source.starts_with("network acc(x) {"));
        assert!(source.contains("acc = linear(1.0000*x + 1.0000*bias + 1.0000*acc)"));
        assert!(source.contains("recurrent through acc"));
    }
}
