//! Mutation operators (NEAT-style).
//!
//! Weight operators roll per gene; structural operators roll once per
//! critter. Every random decision draws from the context.

use super::gene::Gene;
use super::genotype::Genotype;
use super::neuron::{Neuron, NeuronKind};
use crate::config::MutationConfig;
use crate::context::NeatContext;
use crate::corpus::{Composition, Corpus};
use crate::critter::Critter;
use crate::error::NeatResult;
use rand::seq::SliceRandom;

/// What a round of mutation did to one critter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutationTally {
    pub perturbed: usize,
    pub changed: usize,
    pub neurons_added: usize,
    pub genes_added: usize,
    pub disabled: usize,
    pub reenabled: usize,
}

impl MutationTally {
    pub fn total(&self) -> usize {
        self.perturbed
            + self.changed
            + self.neurons_added
            + self.genes_added
            + self.disabled
            + self.reenabled
    }

    pub fn absorb(&mut self, other: MutationTally) {
        self.perturbed += other.perturbed;
        self.changed += other.changed;
        self.neurons_added += other.neurons_added;
        self.genes_added += other.genes_added;
        self.disabled += other.disabled;
        self.reenabled += other.reenabled;
    }
}

/// Fully connected input x output genes with Gaussian weights
pub fn initial_genes(genotype: &Genotype, ctx: &mut NeatContext) -> Vec<Gene> {
    let sd = ctx.config.mutation.initial_weight_sd;
    let mut genes = Vec::with_capacity(genotype.inputs().len() * genotype.outputs().len());
    for input in genotype.inputs() {
        for output in genotype.outputs() {
            let weight = ctx.gaussian(sd);
            genes.push(Gene::new(ctx.new_innovation(), input.clone(), output.clone(), weight));
        }
    }
    genes
}

/// Add N(0, sd) to each enabled gene with probability `prob`
pub fn perturb_gene_weights(
    genotype: &mut Genotype,
    prob: f64,
    sd: f64,
    ctx: &mut NeatContext,
) -> usize {
    let mut count = 0;
    for gene in genotype.genes.values_mut().filter(|g| g.is_enabled()) {
        if ctx.chance(prob) {
            gene.weight += ctx.gaussian(sd);
            count += 1;
        }
    }
    count
}

/// Replace each gene's weight with a fresh N(0, sd) sample with probability `prob`
pub fn change_gene_weights(
    genotype: &mut Genotype,
    prob: f64,
    sd: f64,
    ctx: &mut NeatContext,
) -> usize {
    let mut count = 0;
    for gene in genotype.genes.values_mut() {
        if ctx.chance(prob) {
            gene.weight = ctx.gaussian(sd);
            count += 1;
        }
    }
    count
}

/// Split a random gene with a new hidden neuron. Both new genes inherit the
/// old weight; the old gene is disabled.
pub fn add_neuron(
    genotype: &mut Genotype,
    hidden: &[NeuronKind],
    ctx: &mut NeatContext,
) -> NeatResult<bool> {
    let innovations: Vec<_> = genotype.genes.keys().copied().collect();
    let (innovation, kind) = match (
        innovations.choose(ctx.rng()).copied(),
        hidden.choose(ctx.rng()).cloned(),
    ) {
        (Some(innovation), Some(kind)) => (innovation, kind),
        _ => return Ok(false),
    };

    let name = ctx.random_name();
    let (in_neuron, out_neuron, weight) = match genotype.genes.get_mut(&innovation) {
        Some(gene) => {
            gene.enabled = false;
            (gene.in_neuron.clone(), gene.out_neuron.clone(), gene.weight)
        }
        None => return Ok(false),
    };

    log::debug!(
        "{}: neuron {} ({}) splits {} -> {}",
        genotype.name,
        name,
        kind,
        in_neuron,
        out_neuron
    );
    genotype.add_neurons(vec![Neuron::new(name.clone(), kind)]);
    genotype.add_genes(vec![
        Gene::new(ctx.new_innovation(), in_neuron, name.clone(), weight),
        Gene::new(ctx.new_innovation(), name, out_neuron, weight),
    ])?;
    Ok(true)
}

/// Connect two random neurons. Rejected when they are the same neuron, the
/// source is an output, the target is an input, or the path already exists.
pub fn add_gene(genotype: &mut Genotype, sd: f64, ctx: &mut NeatContext) -> NeatResult<bool> {
    let names: Vec<String> = genotype.neurons.keys().cloned().collect();
    let (from, to) = match (names.choose(ctx.rng()), names.choose(ctx.rng())) {
        (Some(from), Some(to)) => (from.clone(), to.clone()),
        _ => return Ok(false),
    };
    if from == to {
        return Ok(false);
    }
    let rejected = match (genotype.neurons.get(&from), genotype.neurons.get(&to)) {
        (Some(n1), Some(n2)) => n1.is_output() || n2.is_input(),
        _ => true,
    };
    if rejected
        || genotype
            .genes
            .values()
            .any(|g| g.in_neuron == from && g.out_neuron == to)
    {
        return Ok(false);
    }

    let weight = ctx.gaussian(sd);
    log::debug!("{}: gene {} -> {}", genotype.name, from, to);
    genotype.add_genes(vec![Gene::new(ctx.new_innovation(), from, to, weight)])?;
    Ok(true)
}

/// Disable a random enabled gene
pub fn disable_gene(genotype: &mut Genotype, ctx: &mut NeatContext) -> bool {
    flip_random(genotype, true, ctx)
}

/// Re-enable a random disabled gene
pub fn reenable_gene(genotype: &mut Genotype, ctx: &mut NeatContext) -> bool {
    flip_random(genotype, false, ctx)
}

fn flip_random(genotype: &mut Genotype, currently: bool, ctx: &mut NeatContext) -> bool {
    let eligible: Vec<_> = genotype
        .genes
        .values()
        .filter(|g| g.enabled == currently)
        .map(|g| g.innovation)
        .collect();
    match eligible.choose(ctx.rng()).and_then(|i| genotype.genes.get_mut(i)) {
        Some(gene) => {
            gene.enabled = !currently;
            true
        }
        None => false,
    }
}

/// Apply `op` to every genotype of `critter`, returning how many it changed
fn for_each_genotype<F>(critter: &mut Critter, corpus: &Corpus, mut op: F) -> NeatResult<usize>
where
    F: FnMut(&mut Genotype, &Composition) -> NeatResult<bool>,
{
    let mut hits = 0;
    for composition in corpus.compositions() {
        if let Some(genotype) = critter.genotypes.get_mut(&composition.name) {
            if op(genotype, composition)? {
                hits += 1;
            }
        }
    }
    Ok(hits)
}

/// Run every operator over `critter`. Weight operators roll per gene; each
/// structural operator rolls once for the critter and, on a hit, applies to
/// every genotype.
pub fn mutate_critter(
    critter: &mut Critter,
    config: &MutationConfig,
    ctx: &mut NeatContext,
) -> NeatResult<MutationTally> {
    let corpus = std::sync::Arc::clone(&ctx.corpus);
    let mut tally = MutationTally::default();

    for_each_genotype(critter, &corpus, |genotype, _| {
        tally.perturbed += perturb_gene_weights(
            genotype,
            config.perturb_gene_weights_prob,
            config.perturb_gene_weights_sd,
            ctx,
        );
        tally.changed += change_gene_weights(
            genotype,
            config.change_gene_weights_prob,
            config.change_gene_weights_sd,
            ctx,
        );
        Ok(false)
    })?;

    if ctx.chance(config.add_neuron_prob) {
        tally.neurons_added += for_each_genotype(critter, &corpus, |genotype, composition| {
            add_neuron(genotype, &composition.hidden, ctx)
        })?;
    }
    if ctx.chance(config.add_gene_prob) {
        tally.genes_added += for_each_genotype(critter, &corpus, |genotype, _| {
            add_gene(genotype, config.initial_weight_sd, ctx)
        })?;
    }
    if ctx.chance(config.gene_disable_prob) {
        tally.disabled +=
            for_each_genotype(critter, &corpus, |genotype, _| Ok(disable_gene(genotype, ctx)))?;
    }
    if ctx.chance(config.gene_reenable_prob) {
        tally.reenabled +=
            for_each_genotype(critter, &corpus, |genotype, _| Ok(reenable_gene(genotype, ctx)))?;
    }

    if tally.total() > 0 {
        critter.phenotype = None;
    }
    Ok(tally)
}
