//! The generation loop.
//!
//! A [`Controller`] owns one independent evolutionary run: its context,
//! hooks, the current population, a bounded history of past populations and
//! every generation report.

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::context::NeatContext;
use crate::critter::Critter;
use crate::error::NeatResult;
use crate::evaluator::Evaluator;
use crate::evolution::Evolver;
use crate::expressor::Expressor;
use crate::hooks::{Hooks, RunProgress};
use crate::neural::neuron::NeuronCatalog;
use crate::population::Population;
use crate::stats::{GenerationReport, ReportHistory};
use std::collections::VecDeque;

/// Why [`Controller::run`] returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The stop-on-fitness hook fired
    Fitness,
    MaxGenerations,
}

#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub reason: StopReason,
    /// Generations run by this call
    pub generations: u64,
    /// Latest generation report, if any generation ran
    pub last_report: Option<GenerationReport>,
}

pub struct Controller {
    ctx: NeatContext,
    hooks: Hooks,
    evolver: Evolver,
    expressor: Expressor,
    evaluator: Evaluator,
    population: Population,
    population_history: VecDeque<Population>,
    reports: ReportHistory,
}

impl Controller {
    /// Fresh run with a random initial population. Fails when the query or
    /// fitness hook is missing.
    pub fn new(mut ctx: NeatContext, hooks: Hooks) -> NeatResult<Self> {
        hooks.validate()?;
        let population = Population::new(&mut ctx);
        log::info!(
            "controller: seed {} population {} compositions {}",
            ctx.seed(),
            population.len(),
            ctx.corpus.compositions().len()
        );
        Ok(Self::assemble(ctx, hooks, population, ReportHistory::new()))
    }

    /// Resume a checkpointed run. Custom neuron kinds used by the saved
    /// genotypes must be registered in `catalog`.
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        catalog: NeuronCatalog,
        hooks: Hooks,
    ) -> NeatResult<Self> {
        hooks.validate()?;
        let ctx = NeatContext::restore(
            checkpoint.config,
            catalog,
            checkpoint.random_seed,
            checkpoint.counters,
            checkpoint.generation,
        )?;
        log::info!(
            "controller: resuming at generation {} with {} critters",
            checkpoint.generation,
            checkpoint.population.len()
        );
        Ok(Self::assemble(ctx, hooks, checkpoint.population, checkpoint.history))
    }

    fn assemble(
        ctx: NeatContext,
        hooks: Hooks,
        population: Population,
        reports: ReportHistory,
    ) -> Self {
        Self {
            evolver: Evolver::from_config(&ctx.config),
            expressor: Expressor::new(&ctx),
            evaluator: Evaluator::new(),
            population,
            population_history: VecDeque::new(),
            reports,
            hooks,
            ctx,
        }
    }

    /// Snapshot of the run; phenotypes are not saved
    pub fn create_checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.config().clone(),
            self.population.clone(),
            self.ctx.counters(),
            self.ctx.seed(),
            self.reports.clone(),
        )
    }

    /// Mutate, express, evaluate, analyze, speciate, report and, unless the
    /// stop hook fires, evolve the next population. Returns true when the
    /// stop hook asked to end the run.
    pub fn run_generation(&mut self) -> NeatResult<bool> {
        let generation = self.population.generation;
        let config = std::sync::Arc::clone(&self.ctx.config);
        log::debug!("generation {} started", generation);

        let tally = self.population.mutate(&self.evolver, &mut self.ctx)?;
        let mate_only = tally.is_none();
        if let Some(tally) = tally {
            log::debug!("generation {}: {} mutations", generation, tally.total());
        }

        self.population
            .express(&self.expressor, config.run.parallel_expression)?;
        self.evaluator
            .ready_for_evaluation(&mut self.population.critters);
        for seq in config.run.start_sequence_at..=config.run.end_sequence_at {
            self.population
                .evaluate(&mut self.evaluator, seq, &mut self.hooks)?;
        }
        self.population
            .analyze(&self.evaluator, &mut self.hooks, &config.fitness_cost)?;
        self.population.speciate(&self.evolver);

        let report = self
            .population
            .report(&self.hooks, &config.fitness_cost, mate_only);
        let interval = config.logging.report_interval;
        if interval > 0 && generation % interval == 0 {
            log::info!("{}", report.summary());
        }
        self.hooks.run_reports(&report);
        let stop = self.hooks.should_stop(&report);
        self.reports.record(report);

        self.push_history(self.population.clone());
        self.hooks.run_end_of_generation(&RunProgress {
            generation,
            history_len: self.population_history.len(),
        });

        if stop {
            log::info!("generation {}: stop condition reached", generation);
        } else {
            self.population = self
                .population
                .evolve(&self.evolver, &self.hooks, &mut self.ctx)?;
        }
        Ok(stop)
    }

    /// Run until the stop hook fires or `max_generations` is reached
    pub fn run(&mut self) -> NeatResult<RunOutcome> {
        self.run_with_callback(|_| Ok(()))
    }

    /// Run with a callback after every generation
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> NeatResult<RunOutcome>
    where
        F: FnMut(&Controller) -> NeatResult<()>,
    {
        let max_generations = self.config().run.max_generations;
        let mut generations = 0;
        let mut reason = StopReason::MaxGenerations;

        while self.population.generation < max_generations {
            let stop = self.run_generation()?;
            generations += 1;
            callback(self)?;
            if stop {
                reason = StopReason::Fitness;
                break;
            }
        }

        Ok(RunOutcome {
            reason,
            generations,
            last_report: self.reports.latest().cloned(),
        })
    }

    fn push_history(&mut self, population: Population) {
        let limit = self.config().run.max_population_history;
        if limit == 0 {
            return;
        }
        while self.population_history.len() >= limit {
            self.population_history.pop_front();
        }
        self.population_history.push_back(population);
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn context(&self) -> &NeatContext {
        &self.ctx
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Population about to be run
    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn generation(&self) -> u64 {
        self.population.generation
    }

    /// Latest fully evaluated population
    pub fn population_complete(&self) -> Option<&Population> {
        self.population_history.back()
    }

    pub fn population_history(&self) -> impl Iterator<Item = &Population> {
        self.population_history.iter()
    }

    /// Best critter of the latest fully evaluated population
    pub fn best_critter(&self) -> Option<&Critter> {
        self.population_complete()?.best_critter(&self.hooks)
    }

    pub fn worst_critter(&self) -> Option<&Critter> {
        self.population_complete()?.worst_critter(&self.hooks)
    }

    pub fn find_critters(&self, names: &[&str]) -> Vec<&Critter> {
        self.population_complete()
            .map(|p| p.find_critters(names))
            .unwrap_or_default()
    }

    pub fn reports(&self) -> &ReportHistory {
        &self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::StepOutcome;
    use std::sync::{Arc, Mutex};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.run.seed = Some(21);
        config.run.max_generations = 3;
        config.run.max_population_history = 2;
        config.run.end_sequence_at = 3;
        config.population.population_size = 10;
        config
    }

    fn test_hooks() -> Hooks {
        let mut hooks = Hooks::new();
        hooks
            .on_query(|seq| vec![(seq & 1) as f64, ((seq >> 1) & 1) as f64])
            .on_fitness(|_, outcome, _| match outcome {
                StepOutcome::Output(out) => (out[0] - 0.5).abs(),
                StepOutcome::Error(_) => 1.0,
            });
        hooks
    }

    #[test]
    fn test_missing_hooks_rejected() {
        let ctx = NeatContext::new(test_config()).unwrap();
        assert!(Controller::new(ctx, Hooks::new()).is_err());
    }

    #[test]
    fn test_run_to_max_generations() {
        let ctx = NeatContext::new(test_config()).unwrap();
        let mut controller = Controller::new(ctx, test_hooks()).unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.reason, StopReason::MaxGenerations);
        assert_eq!(outcome.generations, 3);
        assert_eq!(controller.generation(), 3);
        assert_eq!(controller.reports().len(), 3);
        assert_eq!(controller.population_history().count(), 2);
        assert_eq!(controller.population_complete().unwrap().generation, 2);
        assert_eq!(controller.population().len(), 10);
    }

    #[test]
    fn test_stop_hook_ends_run() {
        let ctx = NeatContext::new(test_config()).unwrap();
        let mut hooks = test_hooks();
        hooks.on_stop(|report| report.generation == 1);
        let mut controller = Controller::new(ctx, hooks).unwrap();

        let outcome = controller.run().unwrap();
        assert_eq!(outcome.reason, StopReason::Fitness);
        assert_eq!(outcome.generations, 2);
        // the evaluated population is kept when stopping
        assert_eq!(controller.generation(), 1);
        assert!(controller.best_critter().unwrap().is_expressed());
    }

    #[test]
    fn test_report_and_end_of_generation_hooks_run() {
        let ctx = NeatContext::new(test_config()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = test_hooks();
        {
            let seen = Arc::clone(&seen);
            hooks.add_report(move |report| seen.lock().unwrap().push(report.generation));
        }
        {
            let progress = Arc::clone(&progress);
            hooks.add_end_of_generation(move |p| progress.lock().unwrap().push(p.history_len));
        }
        let mut controller = Controller::new(ctx, hooks).unwrap();
        controller.run().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(*progress.lock().unwrap(), vec![1, 2, 2]);
    }

    #[test]
    fn test_report_lists_every_critter() {
        let ctx = NeatContext::new(test_config()).unwrap();
        let mut controller = Controller::new(ctx, test_hooks()).unwrap();
        controller.run_generation().unwrap();

        let report = controller.reports().latest().unwrap();
        let complete = controller.population_complete().unwrap();
        assert_eq!(report.critter_fitness.len(), complete.len());
        let best = controller.best_critter().unwrap();
        assert_eq!(report.best_critter, best.name);
        assert_eq!(controller.find_critters(&[best.name.as_str()]).len(), 1);
    }

    #[test]
    fn test_checkpoint_resume_continues_counters() {
        let ctx = NeatContext::new(test_config()).unwrap();
        let mut controller = Controller::new(ctx, test_hooks()).unwrap();
        controller.run_generation().unwrap();
        let checkpoint = controller.create_checkpoint();
        let counters = checkpoint.counters;

        let mut resumed =
            Controller::from_checkpoint(checkpoint, NeuronCatalog::new(), test_hooks()).unwrap();
        assert_eq!(resumed.generation(), 1);
        assert_eq!(resumed.reports().len(), 1);
        assert!(resumed.context().new_innovation() > counters.innovation);

        let outcome = resumed.run().unwrap();
        assert_eq!(outcome.generations, 2);
        assert_eq!(resumed.reports().len(), 3);
    }
}
