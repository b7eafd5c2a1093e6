//! Compositions and the wiring between them.
//!
//! A critter owns one genotype per composition. With several compositions,
//! connections route the critter's external inputs into sub-networks, chain
//! sub-network outputs into other sub-networks, and pick the critter's
//! outputs. Sub-networks run in dependency order.

use crate::config::{CompositionConfig, ConnectionConfig, NetworkConfig};
use crate::error::{GraphError, NeatError, NeatResult};
use crate::neural::graph::{AdjacencyGraph, DependencyResolver};
use crate::neural::neuron::{NeuronCatalog, NeuronKind};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Pseudo-node for the critter's external inputs
pub const INPUT_NODE: &str = "input";
/// Pseudo-node for the critter's external outputs
pub const OUTPUT_NODE: &str = "output";

/// Neuron layout of one genotype
#[derive(Clone, Debug)]
pub struct Composition {
    pub name: String,
    pub inputs: Vec<(String, NeuronKind)>,
    pub outputs: Vec<(String, NeuronKind)>,
    pub hidden: Vec<NeuronKind>,
}

impl Composition {
    fn from_config(config: &CompositionConfig, catalog: &NeuronCatalog) -> NeatResult<Self> {
        let invalid = |msg: String| NeatError::InvalidConfig(format!("{}: {}", config.name, msg));

        let mut seen = HashSet::new();
        let mut inputs = Vec::with_capacity(config.inputs.len());
        for neuron in &config.inputs {
            let kind = catalog.kind(&neuron.kind)?;
            if !kind.is_input() {
                return Err(invalid(format!(
                    "input '{}' has non-input kind '{}'",
                    neuron.name, kind
                )));
            }
            if !seen.insert(neuron.name.clone()) {
                return Err(invalid(format!("duplicate neuron '{}'", neuron.name)));
            }
            inputs.push((neuron.name.clone(), kind));
        }

        let mut outputs = Vec::with_capacity(config.outputs.len());
        for neuron in &config.outputs {
            let kind = catalog.kind(&neuron.kind)?;
            if kind.is_input() {
                return Err(invalid(format!(
                    "output '{}' cannot have kind '{}'",
                    neuron.name, kind
                )));
            }
            if !seen.insert(neuron.name.clone()) {
                return Err(invalid(format!("duplicate neuron '{}'", neuron.name)));
            }
            outputs.push((neuron.name.clone(), kind));
        }

        let hidden = if config.hidden.is_empty() {
            catalog.hidden_kinds()
        } else {
            let mut hidden = Vec::with_capacity(config.hidden.len());
            for name in &config.hidden {
                let kind = catalog.kind(name)?;
                if kind.is_input() {
                    return Err(invalid(format!("hidden kind '{}' is an input kind", kind)));
                }
                hidden.push(kind);
            }
            hidden
        };

        Ok(Self {
            name: config.name.clone(),
            inputs,
            outputs,
            hidden,
        })
    }

    /// Non-bias input names in declaration order; the activation arity
    pub fn parameters(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter(|(_, kind)| !kind.is_bias())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// `node.port` reference in a connection
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: String,
    pub port: String,
}

impl Endpoint {
    pub fn parse(spec: &str) -> NeatResult<Self> {
        match spec.split_once('.') {
            Some((node, port)) if !node.is_empty() && !port.is_empty() => Ok(Self {
                node: node.to_string(),
                port: port.to_string(),
            }),
            _ => Err(NeatError::InvalidConfig(format!(
                "connection endpoint '{}' is not of the form node.port",
                spec
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Where a value fed to a sub-network or to the outside world comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Index into the critter's external input vector
    External(usize),
    /// Output `output` of composition `composition`
    Network { composition: usize, output: usize },
}

/// Resolved routing between compositions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wiring {
    /// Composition indices in call order
    pub order: Vec<usize>,
    /// Per composition, one source per parameter
    pub inputs: Vec<Vec<Source>>,
    /// One source per external output
    pub outputs: Vec<Source>,
    pub external_inputs: Vec<String>,
    pub external_outputs: Vec<String>,
}

/// All compositions of a critter plus their wiring
#[derive(Clone, Debug)]
pub struct Corpus {
    compositions: Vec<Composition>,
    wiring: Arc<Wiring>,
}

impl Corpus {
    pub fn from_config(config: &NetworkConfig, catalog: &NeuronCatalog) -> NeatResult<Self> {
        let mut compositions = Vec::with_capacity(config.compositions.len());
        let mut names = HashSet::new();
        for composition in &config.compositions {
            if composition.name == INPUT_NODE || composition.name == OUTPUT_NODE {
                return Err(NeatError::InvalidConfig(format!(
                    "'{}' is reserved and cannot name a composition",
                    composition.name
                )));
            }
            if !names.insert(composition.name.clone()) {
                return Err(NeatError::InvalidConfig(format!(
                    "duplicate composition '{}'",
                    composition.name
                )));
            }
            compositions.push(Composition::from_config(composition, catalog)?);
        }

        let wiring = if config.connections.is_empty() {
            match compositions.as_slice() {
                [single] => direct_wiring(single),
                [] => return Err(NeatError::InvalidConfig("no compositions".to_string())),
                _ => {
                    return Err(NeatError::InvalidConfig(
                        "several compositions need connections".to_string(),
                    ))
                }
            }
        } else {
            connected_wiring(&compositions, &config.connections)?
        };

        Ok(Self {
            compositions,
            wiring: Arc::new(wiring),
        })
    }

    pub fn compositions(&self) -> &[Composition] {
        &self.compositions
    }

    pub fn composition(&self, name: &str) -> Option<&Composition> {
        self.compositions.iter().find(|c| c.name == name)
    }

    pub fn wiring(&self) -> Arc<Wiring> {
        Arc::clone(&self.wiring)
    }

    pub fn is_modular(&self) -> bool {
        self.compositions.len() > 1
    }

    /// Names of the critter's external inputs, in order
    pub fn parameters(&self) -> &[String] {
        &self.wiring.external_inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.wiring.external_outputs
    }
}

fn direct_wiring(composition: &Composition) -> Wiring {
    let parameters = composition.parameters();
    let outputs = composition.output_names();
    Wiring {
        order: vec![0],
        inputs: vec![(0..parameters.len()).map(Source::External).collect()],
        outputs: (0..outputs.len())
            .map(|output| Source::Network {
                composition: 0,
                output,
            })
            .collect(),
        external_inputs: parameters.into_iter().map(String::from).collect(),
        external_outputs: outputs.into_iter().map(String::from).collect(),
    }
}

fn connected_wiring(
    compositions: &[Composition],
    connections: &[ConnectionConfig],
) -> NeatResult<Wiring> {
    let index: HashMap<&str, usize> = compositions
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    let mut external_inputs: Vec<String> = Vec::new();
    let mut external_outputs: Vec<String> = Vec::new();
    let mut output_sources: Vec<Source> = Vec::new();
    let mut fed: Vec<Vec<Option<Source>>> = compositions
        .iter()
        .map(|c| vec![None; c.parameters().len()])
        .collect();

    let mut graph = AdjacencyGraph::new();
    for composition in compositions {
        graph.add_node(composition.name.clone());
    }

    for connection in connections {
        let from = Endpoint::parse(&connection.from)?;
        let to = Endpoint::parse(&connection.to)?;
        let unknown = |endpoint: &Endpoint| {
            NeatError::InvalidConfig(format!("connection references unknown port {}", endpoint))
        };

        let source = if from.node == INPUT_NODE {
            let position = match external_inputs.iter().position(|p| *p == from.port) {
                Some(position) => position,
                None => {
                    external_inputs.push(from.port.clone());
                    external_inputs.len() - 1
                }
            };
            Source::External(position)
        } else {
            let composition = *index.get(from.node.as_str()).ok_or_else(|| unknown(&from))?;
            let output = compositions[composition]
                .output_names()
                .iter()
                .position(|name| *name == from.port)
                .ok_or_else(|| unknown(&from))?;
            Source::Network {
                composition,
                output,
            }
        };

        if to.node == OUTPUT_NODE {
            if external_outputs.contains(&to.port) {
                return Err(NeatError::InvalidConfig(format!("{} is fed twice", to)));
            }
            external_outputs.push(to.port.clone());
            output_sources.push(source);
            continue;
        }

        let target = *index.get(to.node.as_str()).ok_or_else(|| unknown(&to))?;
        let parameter = compositions[target]
            .parameters()
            .iter()
            .position(|name| *name == to.port)
            .ok_or_else(|| unknown(&to))?;
        if fed[target][parameter].is_some() {
            return Err(NeatError::InvalidConfig(format!("{} is fed twice", to)));
        }
        fed[target][parameter] = Some(source);
        if let Source::Network { composition, .. } = source {
            graph.add_input(to.node.clone(), compositions[composition].name.clone());
        }
    }

    if external_outputs.is_empty() {
        return Err(NeatError::InvalidConfig(
            "connections never reach the output node".to_string(),
        ));
    }

    let mut inputs = Vec::with_capacity(compositions.len());
    for (composition, sources) in compositions.iter().zip(fed) {
        let parameters = composition.parameters();
        let mut resolved = Vec::with_capacity(sources.len());
        for (name, source) in parameters.iter().zip(sources) {
            match source {
                Some(source) => resolved.push(source),
                None => {
                    return Err(NeatError::InvalidConfig(format!(
                        "{}.{} is not connected",
                        composition.name, name
                    )))
                }
            }
        }
        inputs.push(resolved);
    }

    let roots = compositions.iter().map(|c| c.name.clone()).collect();
    let order = DependencyResolver::new(&graph, roots)
        .resolve_strict()
        .map_err(|err| match err {
            GraphError::Circular(nodes) => NeatError::InvalidConfig(format!(
                "compositions form a cycle through {}",
                nodes.join(", ")
            )),
            other => NeatError::Graph(other),
        })?;

    Ok(Wiring {
        order: order
            .iter()
            .filter_map(|name| index.get(name.as_str()).copied())
            .collect(),
        inputs,
        outputs: output_sources,
        external_inputs,
        external_outputs,
    })
}
