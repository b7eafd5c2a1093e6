//! Per-generation reports and their history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Mean, best and worst of a set of values
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessSummary {
    pub mean: f64,
    pub best: f64,
    pub worst: f64,
    pub std_dev: f64,
}

impl FitnessSummary {
    /// `best` and `worst` are given by the caller, since which end is
    /// better depends on the compare hook.
    pub fn new(values: &[f64], best: f64, worst: f64) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            best,
            worst,
            std_dev: variance.sqrt(),
        }
    }
}

/// Everything known about one finished generation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u64,
    pub population: usize,
    pub species: usize,
    /// Mutation was skipped in favor of pure mating
    pub mate_only: bool,
    pub fitness: FitnessSummary,
    /// Structural cost of the whole population
    pub fitness_cost: FitnessSummary,
    pub best_critter: String,
    pub best_phenotype: String,
    pub worst_critter: String,
    pub worst_phenotype: String,
    /// Fitness of every critter by name
    pub critter_fitness: BTreeMap<String, f64>,
}

impl GenerationReport {
    /// Format as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Gen:{:5} | Pop:{:4} | Species:{:3} | Best:{:.6} | Mean:{:.6} | Worst:{:.6} | Cost:{:.6}{}",
            self.generation,
            self.population,
            self.species,
            self.fitness.best,
            self.fitness.mean,
            self.fitness.worst,
            self.fitness_cost.mean,
            if self.mate_only { " | mate-only" } else { "" }
        )
    }
}

/// Every report of a run, oldest first
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReportHistory {
    pub reports: Vec<GenerationReport>,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: GenerationReport) {
        self.reports.push(report);
    }

    pub fn latest(&self) -> Option<&GenerationReport> {
        self.reports.last()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Best fitness per generation
    pub fn best_series(&self) -> Vec<(u64, f64)> {
        self.reports
            .iter()
            .map(|r| (r.generation, r.fitness.best))
            .collect()
    }

    /// Mean fitness per generation
    pub fn mean_series(&self) -> Vec<(u64, f64)> {
        self.reports
            .iter()
            .map(|r| (r.generation, r.fitness.mean))
            .collect()
    }

    pub fn species_series(&self) -> Vec<(u64, usize)> {
        self.reports
            .iter()
            .map(|r| (r.generation, r.species))
            .collect()
    }

    /// Save history as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(generation: u64, best: f64) -> GenerationReport {
        GenerationReport {
            generation,
            population: 10,
            species: 2,
            fitness: FitnessSummary::new(&[best, best + 1.0], best, best + 1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_fitness_summary() {
        let summary = FitnessSummary::new(&[1.0, 3.0], 1.0, 3.0);
        assert_eq!(summary.mean, 2.0);
        assert_eq!(summary.std_dev, 1.0);
        assert_eq!(FitnessSummary::new(&[], 0.0, 0.0), FitnessSummary::default());
    }

    #[test]
    fn test_summary_line() {
        let mut r = report(3, 0.25);
        assert!(r.summary().starts_with("Gen:    3"));
        assert!(!r.summary().contains("mate-only"));
        r.mate_only = true;
        assert!(r.summary().ends_with("mate-only"));
    }

    #[test]
    fn test_history_series() {
        let mut history = ReportHistory::new();
        for g in 0..5 {
            history.record(report(g, 1.0 / (g + 1) as f64));
        }

        let series = history.best_series();
        assert_eq!(series.len(), 5);
        assert_eq!(series[0], (0, 1.0));
        assert_eq!(history.latest().unwrap().generation, 4);
        assert_eq!(history.species_series()[2], (2, 2));
    }

    #[test]
    fn test_history_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = ReportHistory::new();
        let mut r = report(1, 0.5);
        r.critter_fitness.insert("fern_onyx_gale_1".to_string(), 0.5);
        history.record(r);
        history.save(&path).unwrap();

        let loaded = ReportHistory::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.reports[0].critter_fitness["fern_onyx_gale_1"], 0.5);
    }
}
