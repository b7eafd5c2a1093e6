//! One generation of critters.

use crate::config::FitnessCostConfig;
use crate::context::NeatContext;
use crate::critter::Critter;
use crate::error::NeatResult;
use crate::evaluator::Evaluator;
use crate::evolution::{Evolver, Species};
use crate::expressor::Expressor;
use crate::hooks::Hooks;
use crate::neural::mutations::MutationTally;
use crate::stats::{FitnessSummary, GenerationReport};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Population {
    pub generation: u64,
    pub critters: Vec<Critter>,
    /// Rebuilt by [`Population::speciate`] every generation
    #[serde(skip)]
    pub species: Vec<Species>,
}

impl Population {
    /// Random initial population of `start_population_size` (or
    /// `population_size`) fully connected critters
    pub fn new(ctx: &mut NeatContext) -> Self {
        let size = ctx.config.population.initial_size();
        let critters = (0..size).map(|_| Critter::new(ctx, false)).collect();
        Self::with_critters(0, critters)
    }

    pub fn with_critters(generation: u64, critters: Vec<Critter>) -> Self {
        Self {
            generation,
            critters,
            species: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.critters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.critters.is_empty()
    }

    /// Apply mutation operators in place; `None` for a mate-only generation
    pub fn mutate(
        &mut self,
        evolver: &Evolver,
        ctx: &mut NeatContext,
    ) -> NeatResult<Option<MutationTally>> {
        evolver.mutate(&mut self.critters, ctx)
    }

    /// Prune, wire and compile every critter, optionally on the rayon pool
    pub fn express(&mut self, expressor: &Expressor, parallel: bool) -> NeatResult<()> {
        let express = |critter: &mut Critter| -> NeatResult<()> {
            critter.ready_for_expression()?;
            expressor.express(critter)
        };
        if parallel {
            self.critters.par_iter_mut().try_for_each(express)
        } else {
            self.critters.iter_mut().try_for_each(express)
        }
    }

    /// Reset recurrent state of every critter
    pub fn initialize_neurons(&mut self) {
        for critter in self.critters.iter_mut() {
            critter.initialize_neurons();
        }
    }

    /// Run one sequence step for every critter
    pub fn evaluate(&mut self, evaluator: &mut Evaluator, seq: u64, hooks: &mut Hooks) -> NeatResult<()> {
        for (index, critter) in self.critters.iter_mut().enumerate() {
            evaluator.evaluate(index, critter, seq, hooks)?;
        }
        Ok(())
    }

    /// Reduce every critter's history to its fitness
    pub fn analyze(
        &mut self,
        evaluator: &Evaluator,
        hooks: &mut Hooks,
        cost: &FitnessCostConfig,
    ) -> NeatResult<()> {
        for (index, critter) in self.critters.iter_mut().enumerate() {
            evaluator.analyze_for_fitness(index, critter, hooks, cost)?;
        }
        Ok(())
    }

    pub fn speciate(&mut self, evolver: &Evolver) {
        self.species = evolver.speciate(&self.critters);
    }

    /// Next generation
    pub fn evolve(&self, evolver: &Evolver, hooks: &Hooks, ctx: &mut NeatContext) -> NeatResult<Population> {
        evolver.evolve(self, hooks, ctx)
    }

    pub fn best_critter(&self, hooks: &Hooks) -> Option<&Critter> {
        self.critters
            .iter()
            .min_by(|a, b| hooks.compare_fitness(a.fitness, b.fitness))
    }

    pub fn worst_critter(&self, hooks: &Hooks) -> Option<&Critter> {
        self.critters
            .iter()
            .max_by(|a, b| hooks.compare_fitness(a.fitness, b.fitness))
    }

    /// Critters with the given names, in the order asked
    pub fn find_critters(&self, names: &[&str]) -> Vec<&Critter> {
        names
            .iter()
            .filter_map(|name| self.critters.iter().find(|c| c.name == *name))
            .collect()
    }

    /// Summary of fitness and structural cost for reporting
    pub fn report(&self, hooks: &Hooks, cost: &FitnessCostConfig, mate_only: bool) -> GenerationReport {
        let fitness: Vec<f64> = self.critters.iter().map(|c| c.fitness).collect();
        let costs: Vec<f64> = self.critters.iter().map(|c| c.fitness_cost(cost)).collect();
        let best = self.best_critter(hooks);
        let worst = self.worst_critter(hooks);

        let cheapest = costs.iter().cloned().fold(f64::INFINITY, f64::min);
        let dearest = costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        GenerationReport {
            generation: self.generation,
            population: self.critters.len(),
            species: self.species.len(),
            mate_only,
            fitness: FitnessSummary::new(
                &fitness,
                best.map_or(0.0, |c| c.fitness),
                worst.map_or(0.0, |c| c.fitness),
            ),
            fitness_cost: FitnessSummary::new(&costs, cheapest, dearest),
            best_critter: best.map(|c| c.name.clone()).unwrap_or_default(),
            best_phenotype: phenotype_source(best),
            worst_critter: worst.map(|c| c.name.clone()).unwrap_or_default(),
            worst_phenotype: phenotype_source(worst),
            critter_fitness: self
                .critters
                .iter()
                .map(|c| (c.name.clone(), c.fitness))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Order critters better-first
    pub fn sort_by_fitness(&mut self, hooks: &Hooks) {
        self.critters
            .sort_by(|a, b| hooks.compare_fitness(a.fitness, b.fitness));
        self.species.clear();
    }
}

fn phenotype_source(critter: Option<&Critter>) -> String {
    critter
        .and_then(|c| c.phenotype.as_ref())
        .map(|p| p.source())
        .unwrap_or_default()
}
