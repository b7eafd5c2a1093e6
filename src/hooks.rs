//! Callbacks supplied by the embedding application.
//!
//! Single-consumer hooks are optional fields. Report and end-of-generation
//! hooks are lists; every registered callback runs, in registration order.

use crate::error::{NeatError, NeatResult};
use crate::stats::GenerationReport;
use std::cmp::Ordering;

/// Result of one stimulus/response step
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    Output(Vec<f64>),
    /// Activation failed; the fitness hook decides the penalty
    Error(String),
}

impl StepOutcome {
    pub fn output(&self) -> Option<&[f64]> {
        match self {
            StepOutcome::Output(values) => Some(values),
            StepOutcome::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepOutcome::Error(_))
    }
}

/// Passed to end-of-generation hooks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunProgress {
    pub generation: u64,
    /// Populations currently retained by the controller
    pub history_len: usize,
}

/// `(sequence index) -> input vector`
pub type QueryFn = Box<dyn FnMut(u64) -> Vec<f64> + Send>;
/// `(input, outcome, sequence index) -> fitness`
pub type FitnessFn = Box<dyn FnMut(&[f64], &StepOutcome, u64) -> f64 + Send>;
/// `Ordering::Less` when the first fitness is the better one
pub type CompareFn = Box<dyn Fn(f64, f64) -> Ordering + Send + Sync>;
/// `(fitness vector, structural cost) -> fitness`
pub type CostFn = Box<dyn Fn(&[f64], f64) -> f64 + Send + Sync>;
pub type StopFn = Box<dyn FnMut(&GenerationReport) -> bool + Send>;
/// Receives the latest outputs; activation repeats while it returns true
pub type RecurrenceFn = Box<dyn FnMut(&[f64]) -> bool + Send>;
pub type ReportFn = Box<dyn FnMut(&GenerationReport) + Send>;
pub type EndOfGenerationFn = Box<dyn FnMut(&RunProgress) + Send>;

#[derive(Default)]
pub struct Hooks {
    pub query: Option<QueryFn>,
    pub fitness: Option<FitnessFn>,
    pub compare: Option<CompareFn>,
    pub cost: Option<CostFn>,
    pub stop_on_fitness: Option<StopFn>,
    pub recurrence: Option<RecurrenceFn>,
    pub report: Vec<ReportFn>,
    pub end_of_generation: Vec<EndOfGenerationFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(u64) -> Vec<f64> + Send + 'static,
    {
        self.query = Some(Box::new(f));
        self
    }

    pub fn on_fitness<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&[f64], &StepOutcome, u64) -> f64 + Send + 'static,
    {
        self.fitness = Some(Box::new(f));
        self
    }

    pub fn on_compare<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(f64, f64) -> Ordering + Send + Sync + 'static,
    {
        self.compare = Some(Box::new(f));
        self
    }

    pub fn on_cost<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[f64], f64) -> f64 + Send + Sync + 'static,
    {
        self.cost = Some(Box::new(f));
        self
    }

    pub fn on_stop<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&GenerationReport) -> bool + Send + 'static,
    {
        self.stop_on_fitness = Some(Box::new(f));
        self
    }

    pub fn on_recurrence<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&[f64]) -> bool + Send + 'static,
    {
        self.recurrence = Some(Box::new(f));
        self
    }

    pub fn add_report<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&GenerationReport) + Send + 'static,
    {
        self.report.push(Box::new(f));
        self
    }

    pub fn add_end_of_generation<F>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&RunProgress) + Send + 'static,
    {
        self.end_of_generation.push(Box::new(f));
        self
    }

    /// Query and fitness are mandatory for a run
    pub fn validate(&self) -> NeatResult<()> {
        if self.query.is_none() {
            return Err(NeatError::InvalidConfig("no query hook registered".to_string()));
        }
        if self.fitness.is_none() {
            return Err(NeatError::InvalidConfig("no fitness hook registered".to_string()));
        }
        Ok(())
    }

    /// Order two fitness values, better first. Lower is better unless a
    /// compare hook says otherwise.
    #[inline]
    pub fn compare_fitness(&self, a: f64, b: f64) -> Ordering {
        match &self.compare {
            Some(compare) => compare(a, b),
            None => a.total_cmp(&b),
        }
    }

    pub fn run_reports(&mut self, report: &GenerationReport) {
        for hook in self.report.iter_mut() {
            hook(report);
        }
    }

    pub fn run_end_of_generation(&mut self, progress: &RunProgress) {
        for hook in self.end_of_generation.iter_mut() {
            hook(progress);
        }
    }

    /// True when the stop hook asks to end the run
    pub fn should_stop(&mut self, report: &GenerationReport) -> bool {
        match self.stop_on_fitness.as_mut() {
            Some(stop) => stop(report),
            None => false,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("query", &self.query.is_some())
            .field("fitness", &self.fitness.is_some())
            .field("compare", &self.compare.is_some())
            .field("cost", &self.cost.is_some())
            .field("stop_on_fitness", &self.stop_on_fitness.is_some())
            .field("recurrence", &self.recurrence.is_some())
            .field("report", &self.report.len())
            .field("end_of_generation", &self.end_of_generation.len())
            .finish()
    }
}
