//! Connection genes.

use crate::innovation::Innovation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A weighted directed edge between two named neurons of one genotype
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Preserved when the gene is inherited through crossover
    pub innovation: Innovation,
    /// Neuron whose value is read
    pub in_neuron: String,
    /// Neuron receiving the weighted value
    pub out_neuron: String,
    pub weight: f64,
    pub enabled: bool,
}

impl Gene {
    /// New enabled gene
    pub fn new(
        innovation: Innovation,
        in_neuron: impl Into<String>,
        out_neuron: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            innovation,
            in_neuron: in_neuron.into(),
            out_neuron: out_neuron.into(),
            weight,
            enabled: true,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        !self.enabled
    }

    /// True if both genes connect the same pair of neurons
    pub fn same_path(&self, other: &Gene) -> bool {
        self.in_neuron == other.in_neuron && self.out_neuron == other.out_neuron
    }
}

impl fmt::Display for Gene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [i{}, w{:.4}, {}]",
            self.in_neuron,
            self.out_neuron,
            self.innovation,
            self.weight,
            if self.enabled { "on" } else { "off" }
        )
    }
}
