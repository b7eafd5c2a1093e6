//! Genotype: the heritable neurons and genes of one composition.

use super::gene::Gene;
use super::graph::Graph;
use super::neuron::Neuron;
use crate::config::FitnessCostConfig;
use crate::corpus::Composition;
use crate::error::{GraphError, NeatError, NeatResult};
use crate::innovation::Innovation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genotype {
    /// Name of the composition this genotype expresses
    pub name: String,
    pub neurons: BTreeMap<String, Neuron>,
    pub genes: BTreeMap<Innovation, Gene>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    /// Out-neuron name to incoming enabled genes, rebuilt by [`Genotype::wire`]
    #[serde(skip)]
    neural_gene_map: HashMap<String, Vec<Innovation>>,
    /// Set by the expressor when some neuron has no incoming enabled gene
    #[serde(skip)]
    pub dangling_neurons: bool,
}

impl Genotype {
    /// Interface neurons only, no genes
    pub fn new(composition: &Composition) -> Self {
        let mut neurons = BTreeMap::new();
        let mut inputs = Vec::with_capacity(composition.inputs.len());
        let mut outputs = Vec::with_capacity(composition.outputs.len());

        for (name, kind) in &composition.inputs {
            neurons.insert(name.clone(), Neuron::new(name.clone(), kind.clone()));
            inputs.push(name.clone());
        }
        for (name, kind) in &composition.outputs {
            neurons.insert(name.clone(), Neuron::new_output(name.clone(), kind.clone()));
            outputs.push(name.clone());
        }

        Self {
            name: composition.name.clone(),
            neurons,
            genes: BTreeMap::new(),
            inputs,
            outputs,
            neural_gene_map: HashMap::new(),
            dangling_neurons: false,
        }
    }

    /// Input neuron names, bias included
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Input names that take a value from outside (bias excluded)
    pub fn parameters(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter(|name| self.neurons.get(*name).map_or(false, |n| !n.is_bias()))
            .map(String::as_str)
            .collect()
    }

    /// True for declared input and output neurons
    pub fn is_interface(&self, name: &str) -> bool {
        self.inputs.iter().any(|n| n == name) || self.outputs.iter().any(|n| n == name)
    }

    /// Neurons that are neither inputs nor outputs
    pub fn hidden_neurons(&self) -> impl Iterator<Item = &Neuron> {
        self.neurons.values().filter(|n| !n.is_input() && !n.is_output())
    }

    pub fn innovations(&self) -> BTreeSet<Innovation> {
        self.genes.keys().copied().collect()
    }

    /// Replace (`clean`) or merge the gene map, then drop genes duplicating
    /// an (in, out) pair. The lowest innovation wins.
    pub fn neucleate<I>(&mut self, clean: bool, genes: I)
    where
        I: IntoIterator<Item = Gene>,
    {
        if clean {
            self.genes.clear();
        }
        for gene in genes {
            self.genes.insert(gene.innovation, gene);
        }
        self.nuke_redundancies();
    }

    fn nuke_redundancies(&mut self) {
        let mut seen = HashSet::new();
        let redundant: Vec<Innovation> = self
            .genes
            .values()
            .filter(|g| !seen.insert((g.in_neuron.clone(), g.out_neuron.clone())))
            .map(|g| g.innovation)
            .collect();
        for innovation in redundant {
            log::trace!("{}: dropping redundant gene {}", self.name, innovation);
            self.genes.remove(&innovation);
        }
    }

    /// Clear all adjacency lists and the gene map
    pub fn forget(&mut self) {
        for neuron in self.neurons.values_mut() {
            neuron.clear_graph();
        }
        self.neural_gene_map.clear();
    }

    /// Rebuild adjacency from the enabled genes
    pub fn wire(&mut self) -> NeatResult<()> {
        self.forget();
        for gene in self.genes.values().filter(|g| g.is_enabled()) {
            if !self.neurons.contains_key(&gene.in_neuron) {
                return Err(self.missing(&gene.in_neuron));
            }
            let out = self
                .neurons
                .get_mut(&gene.out_neuron)
                .ok_or_else(|| NeatError::MissingNeuron {
                    genotype: self.name.clone(),
                    neuron: gene.out_neuron.clone(),
                })?;
            out.add_input(gene.in_neuron.clone());
            self.neural_gene_map
                .entry(gene.out_neuron.clone())
                .or_default()
                .push(gene.innovation);
        }
        Ok(())
    }

    fn missing(&self, neuron: &str) -> NeatError {
        NeatError::MissingNeuron {
            genotype: self.name.clone(),
            neuron: neuron.to_string(),
        }
    }

    /// Incoming enabled genes of `neuron` as of the last wiring
    pub fn incoming(&self, neuron: &str) -> impl Iterator<Item = &Gene> {
        self.neural_gene_map
            .get(neuron)
            .into_iter()
            .flatten()
            .filter_map(|innovation| self.genes.get(innovation))
    }

    pub fn add_neurons<I>(&mut self, neurons: I)
    where
        I: IntoIterator<Item = Neuron>,
    {
        for neuron in neurons {
            self.neurons.insert(neuron.name.clone(), neuron);
        }
    }

    /// Append genes whose endpoints already exist
    pub fn add_genes<I>(&mut self, genes: I) -> NeatResult<()>
    where
        I: IntoIterator<Item = Gene>,
    {
        for gene in genes {
            for endpoint in [&gene.in_neuron, &gene.out_neuron] {
                if !self.neurons.contains_key(endpoint) {
                    return Err(self.missing(endpoint));
                }
            }
            self.genes.insert(gene.innovation, gene);
        }
        Ok(())
    }

    /// Merge neurons from other genotypes as unwired copies. Neurons already
    /// present are kept.
    pub fn innervate(&mut self, neuron_maps: &[&BTreeMap<String, Neuron>]) {
        for map in neuron_maps {
            for (name, neuron) in map.iter() {
                self.neurons
                    .entry(name.clone())
                    .or_insert_with(|| neuron.detached());
            }
        }
    }

    /// Drop hidden neurons no gene references, then genes whose endpoints
    /// vanished. Interface neurons always survive.
    pub fn prune(&mut self) {
        let referenced: HashSet<&str> = self
            .genes
            .values()
            .flat_map(|g| [g.in_neuron.as_str(), g.out_neuron.as_str()])
            .collect();
        let doomed: Vec<String> = self
            .neurons
            .keys()
            .filter(|name| !referenced.contains(name.as_str()) && !self.is_interface(name))
            .cloned()
            .collect();
        for name in doomed {
            self.neurons.remove(&name);
        }

        let neurons = &self.neurons;
        self.genes.retain(|_, g| {
            neurons.contains_key(&g.in_neuron) && neurons.contains_key(&g.out_neuron)
        });

        let neurons = &self.neurons;
        self.inputs.retain(|name| neurons.contains_key(name));
        self.outputs.retain(|name| neurons.contains_key(name));
    }

    /// Structural penalty; a count below its free threshold costs nothing
    pub fn fitness_cost(&self, cost: &FitnessCostConfig) -> f64 {
        fn charge(count: usize, free_until: usize, per_unit: f64) -> f64 {
            if count < free_until {
                0.0
            } else {
                per_unit * count as f64
            }
        }
        charge(self.neurons.len(), cost.per_neuron_free_until, cost.per_neuron)
            + charge(self.genes.len(), cost.per_gene_free_until, cost.per_gene)
    }
}

impl Graph for Genotype {
    type Node = String;

    fn inputs(&self, node: &String) -> Result<&[String], GraphError> {
        self.neurons
            .get(node)
            .ok_or_else(|| GraphError::Uninitialized(node.clone()))?
            .inputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::corpus::Corpus;
    use crate::neural::neuron::{NeuronCatalog, NeuronKind};

    fn xor_composition() -> Composition {
        let corpus = Corpus::from_config(&NetworkConfig::default(), &NeuronCatalog::new()).unwrap();
        corpus.compositions()[0].clone()
    }

    /// i1, i2, bias fully connected to out
    fn xor_genotype() -> Genotype {
        let mut genotype = Genotype::new(&xor_composition());
        genotype.neucleate(
            true,
            vec![
                Gene::new(1, "i1", "out", 0.5),
                Gene::new(2, "i2", "out", -0.5),
                Gene::new(3, "bias", "out", 0.1),
            ],
        );
        genotype
    }

    #[test]
    fn test_new_has_interface_only() {
        let genotype = Genotype::new(&xor_composition());
        assert_eq!(genotype.neurons.len(), 4);
        assert!(genotype.genes.is_empty());
        assert_eq!(genotype.parameters(), vec!["i1", "i2"]);
        assert_eq!(genotype.outputs(), ["out"]);
        assert!(genotype.neurons["out"].is_output());
    }

    #[test]
    fn test_neucleate_keeps_lowest_redundant() {
        let mut genotype = xor_genotype();
        genotype.neucleate(false, vec![Gene::new(9, "i1", "out", 2.0)]);
        assert_eq!(genotype.genes.len(), 3);
        assert_eq!(genotype.genes[&1].weight, 0.5);
        assert!(!genotype.genes.contains_key(&9));
    }

    #[test]
    fn test_wire_uses_enabled_genes_only() {
        let mut genotype = xor_genotype();
        genotype.genes.get_mut(&2).unwrap().enabled = false;
        genotype.wire().unwrap();

        let inputs = Graph::inputs(&genotype, &"out".to_string()).unwrap();
        assert_eq!(inputs, ["i1".to_string(), "bias".to_string()]);
        assert_eq!(genotype.incoming("out").count(), 2);
        assert!(Graph::inputs(&genotype, &"i1".to_string()).unwrap().is_empty());
    }

    #[test]
    fn test_wire_fails_on_missing_neuron() {
        let mut genotype = xor_genotype();
        genotype.genes.insert(7, Gene::new(7, "ghost", "out", 1.0));
        let err = genotype.wire().unwrap_err();
        assert!(matches!(err, NeatError::MissingNeuron { neuron, .. } if neuron == "ghost"));
    }

    #[test]
    fn test_unwired_genotype_is_graph_error() {
        let genotype = xor_genotype();
        assert!(Graph::inputs(&genotype, &"out".to_string()).is_err());
    }

    #[test]
    fn test_add_genes_validates_endpoints() {
        let mut genotype = xor_genotype();
        assert!(genotype
            .add_genes(vec![Gene::new(4, "i1", "hidden", 1.0)])
            .is_err());

        genotype.add_neurons(vec![Neuron::new("hidden", NeuronKind::Tanh)]);
        genotype
            .add_genes(vec![Gene::new(4, "i1", "hidden", 1.0)])
            .unwrap();
        assert_eq!(genotype.genes.len(), 4);
    }

    #[test]
    fn test_innervate_copies_without_wiring() {
        let mut donor = xor_genotype();
        donor.add_neurons(vec![Neuron::new("h", NeuronKind::Sine)]);
        donor.genes.insert(4, Gene::new(4, "i1", "h", 1.0));
        donor.wire().unwrap();

        let mut child = Genotype::new(&xor_composition());
        child.innervate(&[&donor.neurons]);
        assert!(child.neurons.contains_key("h"));
        assert!(child.neurons["h"].inputs().is_err());
        assert!(donor.neurons["h"].inputs().is_ok());
    }

    #[test]
    fn test_prune_drops_dangling_and_is_idempotent() {
        let mut genotype = xor_genotype();
        genotype.add_neurons(vec![
            Neuron::new("orphan", NeuronKind::Sigmoid),
            Neuron::new("h", NeuronKind::Tanh),
        ]);
        genotype.genes.insert(5, Gene::new(5, "h", "out", 1.0));
        genotype.genes.insert(6, Gene::new(6, "gone", "out", 1.0));

        genotype.prune();
        let neurons: Vec<String> = genotype.neurons.keys().cloned().collect();
        let genes = genotype.innovations();
        assert!(!genotype.neurons.contains_key("orphan"));
        assert!(genotype.neurons.contains_key("h"));
        assert!(!genes.contains(&6));

        genotype.prune();
        assert_eq!(genotype.neurons.keys().cloned().collect::<Vec<_>>(), neurons);
        assert_eq!(genotype.innovations(), genes);
    }

    #[test]
    fn test_prune_keeps_interface_neurons() {
        let mut genotype = Genotype::new(&xor_composition());
        genotype.prune();
        assert_eq!(genotype.neurons.len(), 4);
        assert_eq!(genotype.inputs().len(), 3);
    }

    #[test]
    fn test_fitness_cost_monotonic() {
        let cost = FitnessCostConfig {
            per_neuron: 0.5,
            per_gene: 0.25,
            per_neuron_free_until: 5,
            per_gene_free_until: 4,
        };
        let mut genotype = xor_genotype();
        assert_eq!(genotype.fitness_cost(&cost), 0.0);

        let mut previous = genotype.fitness_cost(&cost);
        for i in 0..10 {
            let name = format!("h{}", i);
            genotype.add_neurons(vec![Neuron::new(name.clone(), NeuronKind::Linear)]);
            genotype
                .add_genes(vec![Gene::new(100 + i, "i1", name, 1.0)])
                .unwrap();
            let current = genotype.fitness_cost(&cost);
            assert!(current >= previous);
            previous = current;
        }
        // 14 neurons, 13 genes
        assert!((previous - (14.0 * 0.5 + 13.0 * 0.25)).abs() < 1e-12);
    }
}
