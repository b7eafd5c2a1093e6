//! Critters: one genotype per composition, plus scores and the compiled
//! phenotype.

use crate::config::{FitnessCostConfig, SpeciationConfig};
use crate::context::NeatContext;
use crate::error::{NeatError, NeatResult};
use crate::innovation::Innovation;
use crate::neural::crossover::Distance;
use crate::neural::genotype::Genotype;
use crate::neural::mutations;
use crate::phenotype::Phenotype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Critter {
    /// Unique within a population
    pub name: String,
    /// Keyed by composition name
    pub genotypes: BTreeMap<String, Genotype>,
    /// Lower is fitter unless a compare hook says otherwise
    pub fitness: f64,
    pub novelty: f64,
    /// Carried over by elitism; skipped by the next round of mutation
    #[serde(default)]
    pub elite: bool,
    /// Rebuilt by the expressor every generation
    #[serde(skip)]
    pub phenotype: Option<Phenotype>,
}

impl Critter {
    /// New critter with interface neurons for every composition. Unless
    /// `mating`, each genotype starts fully connected.
    pub fn new(ctx: &mut NeatContext, mating: bool) -> Self {
        let corpus = Arc::clone(&ctx.corpus);
        let mut genotypes = BTreeMap::new();
        for composition in corpus.compositions() {
            let mut genotype = Genotype::new(composition);
            if !mating {
                let genes = mutations::initial_genes(&genotype, ctx);
                genotype.neucleate(true, genes);
            }
            genotypes.insert(composition.name.clone(), genotype);
        }
        Self::from_genotypes(ctx.random_name(), genotypes)
    }

    pub fn from_genotypes(name: String, genotypes: BTreeMap<String, Genotype>) -> Self {
        Self {
            name,
            genotypes,
            fitness: 0.0,
            novelty: 0.0,
            elite: false,
            phenotype: None,
        }
    }

    pub fn genotype(&self, composition: &str) -> NeatResult<&Genotype> {
        self.genotypes
            .get(composition)
            .ok_or_else(|| NeatError::InvalidConfig(format!(
                "critter {} has no genotype '{}'",
                self.name, composition
            )))
    }

    /// Same genotypes under another name, without scores or phenotype
    pub fn duplicate(&self, name: String) -> Self {
        Self::from_genotypes(name, self.genotypes.clone())
    }

    /// Prune and wire every genotype
    pub fn ready_for_expression(&mut self) -> NeatResult<()> {
        for genotype in self.genotypes.values_mut() {
            genotype.prune();
            genotype.wire()?;
        }
        Ok(())
    }

    pub fn is_expressed(&self) -> bool {
        self.phenotype.is_some()
    }

    /// Reset recurrent state of the phenotype, if any
    pub fn initialize_neurons(&mut self) {
        if let Some(phenotype) = self.phenotype.as_mut() {
            phenotype.initialize_neurons();
        }
    }

    /// Compatibility distance summed over all genotypes
    pub fn compare(&self, other: &Critter, config: &SpeciationConfig) -> f64 {
        let mut distance = Distance::default();
        for (name, genotype) in &self.genotypes {
            if let Some(theirs) = other.genotypes.get(name) {
                distance.add(Distance::between(genotype, theirs));
            }
        }
        distance.weighted(config)
    }

    pub fn fitness_cost(&self, config: &FitnessCostConfig) -> f64 {
        self.genotypes.values().map(|g| g.fitness_cost(config)).sum()
    }

    pub fn report(&self) -> CritterReport {
        CritterReport {
            name: self.name.clone(),
            fitness: self.fitness,
            genotypes: self
                .genotypes
                .iter()
                .map(|(name, genotype)| {
                    let genes = genotype
                        .genes
                        .values()
                        .map(|g| GeneLine {
                            in_neuron: g.in_neuron.clone(),
                            out_neuron: g.out_neuron.clone(),
                            innovation: g.innovation,
                            weight: g.weight,
                            enabled: g.enabled,
                        })
                        .collect();
                    (name.clone(), genes)
                })
                .collect(),
            phenotype: self.phenotype.as_ref().map(|p| p.source()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneLine {
    pub in_neuron: String,
    pub out_neuron: String,
    pub innovation: Innovation,
    pub weight: f64,
    pub enabled: bool,
}

/// Gene listing per genotype plus the phenotype source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CritterReport {
    pub name: String,
    pub fitness: f64,
    pub genotypes: BTreeMap<String, Vec<GeneLine>>,
    pub phenotype: Option<String>,
}

impl std::fmt::Display for CritterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "critter {} (fitness {:.6})", self.name, self.fitness)?;
        for (name, genes) in &self.genotypes {
            writeln!(f, "  {}:", name)?;
            for g in genes {
                writeln!(
                    f,
                    "    {} -> {} [i{}] {:.4}{}",
                    g.in_neuron,
                    g.out_neuron,
                    g.innovation,
                    g.weight,
                    if g.enabled { "" } else { " (off)" }
                )?;
            }
        }
        if let Some(source) = &self.phenotype {
            writeln!(f, "{}", source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::expressor::Expressor;

    fn context() -> NeatContext {
        let mut config = Config::default();
        config.run.seed = Some(4);
        NeatContext::new(config).unwrap()
    }

    #[test]
    fn test_new_critter_is_fully_connected() {
        let mut ctx = context();
        let critter = Critter::new(&mut ctx, false);
        let genotype = critter.genotype("main").unwrap();
        assert_eq!(genotype.genes.len(), 3);
        assert!(critter.genotype("other").is_err());

        let mating = Critter::new(&mut ctx, true);
        assert!(mating.genotypes["main"].genes.is_empty());
        assert_ne!(critter.name, mating.name);
    }

    #[test]
    fn test_compare_is_symmetric_and_zero_on_self() {
        let mut ctx = context();
        let a = Critter::new(&mut ctx, false);
        let b = Critter::new(&mut ctx, false);
        let config = SpeciationConfig::default();

        assert_eq!(a.compare(&a, &config), 0.0);
        assert!((a.compare(&b, &config) - b.compare(&a, &config)).abs() < 1e-12);
        // disjoint innovations: 3 + 3, no excess, no matching weights
        assert!((a.compare(&b, &config) - 6.0 * config.disjoint_coefficient).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_drops_phenotype_and_scores() {
        let mut ctx = context();
        let expressor = Expressor::new(&ctx);
        let mut critter = Critter::new(&mut ctx, false);
        critter.fitness = 0.3;
        expressor.express(&mut critter).unwrap();

        let copy = critter.duplicate("copy".to_string());
        assert!(copy.phenotype.is_none());
        assert_eq!(copy.fitness, 0.0);
        assert_eq!(copy.genotypes["main"].genes, critter.genotypes["main"].genes);
    }

    #[test]
    fn test_report_lists_genes_and_source() {
        let mut ctx = context();
        let expressor = Expressor::new(&ctx);
        let mut critter = Critter::new(&mut ctx, false);
        critter.ready_for_expression().unwrap();
        expressor.express(&mut critter).unwrap();

        let report = critter.report();
        assert_eq!(report.genotypes["main"].len(), 3);
        assert!(report.phenotype.as_deref().unwrap().contains("network main"));
        assert!(report.to_string().contains("bias -> out"));
    }
}
