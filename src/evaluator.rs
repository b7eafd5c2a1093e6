//! Stimulus/response driving and fitness reduction.

use crate::config::FitnessCostConfig;
use crate::critter::Critter;
use crate::error::{NeatError, NeatResult};
use crate::hooks::{Hooks, StepOutcome};
use std::collections::BTreeMap;

/// One recorded step
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub input: Vec<f64>,
    pub outcome: StepOutcome,
}

/// Per-critter step history for the current generation, keyed by the
/// critter's position in the population and then by sequence index
#[derive(Debug, Default)]
pub struct Evaluator {
    history: Vec<BTreeMap<u64, StepRecord>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear history and reset recurrent state
    pub fn ready_for_evaluation(&mut self, critters: &mut [Critter]) {
        self.history = vec![BTreeMap::new(); critters.len()];
        for critter in critters.iter_mut() {
            critter.initialize_neurons();
        }
    }

    pub fn history(&self, index: usize) -> Option<&BTreeMap<u64, StepRecord>> {
        self.history.get(index)
    }

    /// Query, activate and record one step. Activation failures are
    /// recorded, not returned.
    pub fn evaluate(
        &mut self,
        index: usize,
        critter: &mut Critter,
        seq: u64,
        hooks: &mut Hooks,
    ) -> NeatResult<()> {
        let query = hooks
            .query
            .as_mut()
            .ok_or_else(|| NeatError::InvalidConfig("no query hook registered".to_string()))?;
        let input = query(seq);

        let phenotype = critter.phenotype.as_mut().ok_or_else(|| NeatError::Expression {
            critter: critter.name.clone(),
            reason: "evaluated before expression".to_string(),
        })?;
        let result = match hooks.recurrence.as_mut() {
            Some(recurrence) => phenotype.activate_with(&input, &mut **recurrence),
            None => phenotype.activate(&input),
        };

        let outcome = match result {
            Ok(output) => StepOutcome::Output(output),
            Err(err) => {
                log::warn!("{} at step {}: {}", critter.name, seq, err);
                StepOutcome::Error(err.to_string())
            }
        };

        if self.history.len() <= index {
            self.history.resize_with(index + 1, BTreeMap::new);
        }
        self.history[index].insert(seq, StepRecord { input, outcome });
        Ok(())
    }

    /// Score every recorded step and reduce to one value: through the cost
    /// hook when present, else the mean plus the structural cost.
    pub fn analyze_for_fitness(
        &self,
        index: usize,
        critter: &mut Critter,
        hooks: &mut Hooks,
        cost: &FitnessCostConfig,
    ) -> NeatResult<f64> {
        let fitness_hook = hooks
            .fitness
            .as_mut()
            .ok_or_else(|| NeatError::InvalidConfig("no fitness hook registered".to_string()))?;

        let scores: Vec<f64> = self
            .history
            .get(index)
            .into_iter()
            .flatten()
            .map(|(seq, record)| fitness_hook(&record.input, &record.outcome, *seq))
            .collect();
        let structural = critter.fitness_cost(cost);

        let fitness = match hooks.cost.as_ref() {
            Some(reduce) => reduce(&scores, structural),
            None if scores.is_empty() => structural,
            None => scores.iter().sum::<f64>() / scores.len() as f64 + structural,
        };
        critter.fitness = fitness;
        Ok(fitness)
    }
}
