//! Crossover between critters and the compatibility distance used for
//! speciation.

use super::gene::Gene;
use super::genotype::Genotype;
use crate::config::SpeciationConfig;
use crate::context::NeatContext;
use crate::critter::Critter;
use crate::error::NeatResult;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Raw terms of the compatibility distance between two genotypes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Distance {
    /// Absolute difference in gene counts
    pub excess: f64,
    /// Genes present in exactly one genotype, less the excess
    pub disjoint: f64,
    /// Mean absolute weight difference over matching genes
    pub weight: f64,
}

impl Distance {
    pub fn between(a: &Genotype, b: &Genotype) -> Self {
        let excess = (a.genes.len() as f64 - b.genes.len() as f64).abs();
        let only_a = a.genes.keys().filter(|i| !b.genes.contains_key(i)).count();
        let only_b = b.genes.keys().filter(|i| !a.genes.contains_key(i)).count();

        let diffs: Vec<f64> = a
            .genes
            .iter()
            .filter_map(|(i, ga)| b.genes.get(i).map(|gb| (ga.weight - gb.weight).abs()))
            .collect();
        let weight = if diffs.is_empty() {
            0.0
        } else {
            diffs.iter().sum::<f64>() / diffs.len() as f64
        };

        Self {
            excess,
            disjoint: (only_a + only_b) as f64 - excess,
            weight,
        }
    }

    pub fn add(&mut self, other: Distance) {
        self.excess += other.excess;
        self.disjoint += other.disjoint;
        self.weight += other.weight;
    }

    /// c1*E + c2*D + c3*W
    pub fn weighted(&self, config: &SpeciationConfig) -> f64 {
        config.excess_coefficient * self.excess
            + config.disjoint_coefficient * self.disjoint
            + config.weight_coefficient * self.weight
    }
}

/// Mate two critters. `compare` orders fitness values better-first; a tie
/// is settled by a coin flip. Matching genes come whole from either parent
/// at even odds, unmatched genes only from the fitter parent.
pub fn sex<C>(mom: &Critter, dad: &Critter, compare: C, ctx: &mut NeatContext) -> NeatResult<Critter>
where
    C: Fn(f64, f64) -> Ordering,
{
    let (fit, other) = match compare(mom.fitness, dad.fitness) {
        Ordering::Less => (mom, dad),
        Ordering::Greater => (dad, mom),
        Ordering::Equal => {
            if ctx.rng().gen_bool(0.5) {
                (mom, dad)
            } else {
                (dad, mom)
            }
        }
    };

    let corpus = std::sync::Arc::clone(&ctx.corpus);
    let mut genotypes = BTreeMap::new();
    for composition in corpus.compositions() {
        let fit_genotype = fit.genotype(&composition.name)?;
        let other_genotype = other.genotype(&composition.name)?;

        let mut genes: Vec<Gene> = Vec::with_capacity(fit_genotype.genes.len());
        for (innovation, gene) in &fit_genotype.genes {
            match other_genotype.genes.get(innovation) {
                Some(twin) if ctx.rng().gen_bool(0.5) => genes.push(twin.clone()),
                _ => genes.push(gene.clone()),
            }
        }

        let mut child = Genotype::new(composition);
        child.neucleate(true, genes);
        child.innervate(&[&fit_genotype.neurons, &other_genotype.neurons]);
        child.prune();
        child.wire()?;
        genotypes.insert(composition.name.clone(), child);
    }

    let name = ctx.random_name();
    log::trace!("{} x {} -> {}", fit.name, other.name, name);
    Ok(Critter::from_genotypes(name, genotypes))
}
