//! Genotype to phenotype compiler.

use crate::context::NeatContext;
use crate::corpus::Corpus;
use crate::critter::Critter;
use crate::error::{NeatError, NeatResult};
use crate::neural::genotype::Genotype;
use crate::neural::graph::DependencyResolver;
use crate::neural::neuron::NeuronCatalog;
use crate::phenotype::{NetworkProgram, Phenotype, Step};
use std::collections::HashMap;
use std::sync::Arc;

/// Compiles critters. Holds only shared read-only state, so one expressor
/// can serve many threads.
#[derive(Clone, Debug)]
pub struct Expressor {
    catalog: Arc<NeuronCatalog>,
    corpus: Arc<Corpus>,
    max_ticks: Option<usize>,
}

impl Expressor {
    pub fn new(ctx: &NeatContext) -> Self {
        Self {
            catalog: Arc::clone(&ctx.catalog),
            corpus: Arc::clone(&ctx.corpus),
            max_ticks: ctx.config.run.max_recurrence_ticks,
        }
    }

    /// Wire and compile every genotype, then install the phenotype
    pub fn express(&self, critter: &mut Critter) -> NeatResult<()> {
        let mut networks = Vec::with_capacity(self.corpus.compositions().len());
        for composition in self.corpus.compositions() {
            let name = critter.name.clone();
            let genotype = critter
                .genotypes
                .get_mut(&composition.name)
                .ok_or_else(|| NeatError::Expression {
                    critter: name.clone(),
                    reason: format!("no genotype for composition '{}'", composition.name),
                })?;
            let program = self.compile(genotype).map_err(|err| NeatError::Expression {
                critter: name,
                reason: err.to_string(),
            })?;
            networks.push(program);
        }

        critter.phenotype = Some(Phenotype::new(
            networks,
            self.corpus.wiring(),
            self.max_ticks,
        ));
        Ok(())
    }

    /// Compile one genotype. Cycles are allowed and recorded on the program;
    /// neurons without incoming enabled genes set `dangling_neurons` and
    /// stay at zero.
    pub fn compile(&self, genotype: &mut Genotype) -> NeatResult<NetworkProgram> {
        genotype.wire()?;

        genotype.dangling_neurons = genotype
            .neurons
            .values()
            .filter(|n| !n.is_input())
            .any(|n| genotype.incoming(&n.name).next().is_none());
        if genotype.dangling_neurons {
            log::debug!("{}: dangling neurons", genotype.name);
        }

        let resolution =
            DependencyResolver::new(&*genotype, genotype.outputs().to_vec()).resolve()?;
        if let Some(circular) = &resolution.circular {
            log::debug!("{}: recurrent through {:?}", genotype.name, circular);
        }

        let slot_names: Vec<String> = genotype.neurons.keys().cloned().collect();
        let slots: HashMap<&str, usize> = slot_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let slot = |name: &str| {
            slots
                .get(name)
                .copied()
                .ok_or_else(|| NeatError::MissingNeuron {
                    genotype: genotype.name.clone(),
                    neuron: name.to_string(),
                })
        };

        let mut steps = Vec::new();
        for name in &resolution.order {
            let neuron = match genotype.neurons.get(name) {
                Some(neuron) if !neuron.is_input() => neuron,
                _ => continue,
            };
            let inputs = genotype
                .incoming(name)
                .map(|gene| -> NeatResult<(f64, usize)> {
                    Ok((gene.weight, slot(&gene.in_neuron)?))
                })
                .collect::<NeatResult<Vec<_>>>()?;
            if inputs.is_empty() {
                continue;
            }
            steps.push(Step {
                target: slot(name)?,
                activation: self.catalog.activation(&neuron.kind)?,
                inputs,
            });
        }

        let mut parameters = Vec::new();
        let mut biases = Vec::new();
        for name in genotype.inputs() {
            let is_bias = genotype.neurons.get(name).map_or(false, |n| n.is_bias());
            if is_bias {
                biases.push(slot(name)?);
            } else {
                parameters.push(slot(name)?);
            }
        }
        let outputs = genotype
            .outputs()
            .iter()
            .map(|name| slot(name))
            .collect::<NeatResult<Vec<_>>>()?;

        Ok(NetworkProgram {
            name: genotype.name.clone(),
            circular: resolution.circular,
            slot_names,
            parameters,
            biases,
            outputs,
            steps,
        })
    }
}
