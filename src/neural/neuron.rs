//! Neuron kinds, the kind catalog, and per-genotype neuron instances.

use crate::error::{GraphError, NeatError, NeatResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a neuron folds its weighted inputs before the nonlinearity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combine {
    Sum,
    Product,
}

/// Activation-function class of a neuron
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronKind {
    /// Takes one value from the outside world
    Input,
    /// Constant 1.0 signal, takes no parameter
    Bias,
    Sigmoid,
    Tanh,
    Sine,
    Cosine,
    Linear,
    Multiplier,
    Heaviside,
    Sign,
    Gaussian,
    /// Registered at startup through [`NeuronCatalog::register`]
    Custom(String),
}

impl NeuronKind {
    /// All built-in kinds
    pub const BUILTIN: [NeuronKind; 11] = [
        NeuronKind::Input,
        NeuronKind::Bias,
        NeuronKind::Sigmoid,
        NeuronKind::Tanh,
        NeuronKind::Sine,
        NeuronKind::Cosine,
        NeuronKind::Linear,
        NeuronKind::Multiplier,
        NeuronKind::Heaviside,
        NeuronKind::Sign,
        NeuronKind::Gaussian,
    ];

    /// Unique kind name used in configuration files
    pub fn type_name(&self) -> &str {
        match self {
            NeuronKind::Input => "input",
            NeuronKind::Bias => "bias",
            NeuronKind::Sigmoid => "sigmoid",
            NeuronKind::Tanh => "tanh",
            NeuronKind::Sine => "sine",
            NeuronKind::Cosine => "cosine",
            NeuronKind::Linear => "linear",
            NeuronKind::Multiplier => "multiplier",
            NeuronKind::Heaviside => "heaviside",
            NeuronKind::Sign => "sign",
            NeuronKind::Gaussian => "gaussian",
            NeuronKind::Custom(name) => name,
        }
    }

    /// Input and bias neurons are fed from outside the network
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, NeuronKind::Input | NeuronKind::Bias)
    }

    #[inline]
    pub fn is_bias(&self) -> bool {
        matches!(self, NeuronKind::Bias)
    }

    fn builtin_combine(&self) -> Combine {
        match self {
            NeuronKind::Multiplier => Combine::Product,
            _ => Combine::Sum,
        }
    }

    /// Nonlinearity of a built-in kind applied to the combined input
    fn builtin_apply(&self, x: f64) -> f64 {
        match self {
            NeuronKind::Sigmoid => 1.0 / (1.0 + (-4.9 * x).exp()),
            NeuronKind::Tanh => (2.4 * x).tanh(),
            NeuronKind::Sine => (1.6 * x).sin(),
            NeuronKind::Cosine => (1.6 * x).cos(),
            NeuronKind::Heaviside => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            NeuronKind::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            NeuronKind::Gaussian => gaussian(x, 1.0, 0.0, 1.0, 0.0),
            _ => x,
        }
    }
}

impl fmt::Display for NeuronKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// a * e^(-(x - b)^2 / (2c^2)) + d
#[inline]
fn gaussian(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    a * (-(x - b).powi(2) / (2.0 * c * c)).exp() + d
}

pub type ActivationFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Application-defined neuron kind
#[derive(Clone)]
pub struct CustomNeuron {
    pub combine: Combine,
    pub function: ActivationFn,
}

impl fmt::Debug for CustomNeuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomNeuron")
            .field("combine", &self.combine)
            .finish_non_exhaustive()
    }
}

/// A kind resolved to something the phenotype can execute
#[derive(Clone, Debug)]
pub enum Activation {
    Builtin(NeuronKind),
    Custom { name: String, neuron: CustomNeuron },
}

impl Activation {
    #[inline]
    pub fn combine(&self) -> Combine {
        match self {
            Activation::Builtin(kind) => kind.builtin_combine(),
            Activation::Custom { neuron, .. } => neuron.combine,
        }
    }

    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Builtin(kind) => kind.builtin_apply(x),
            Activation::Custom { neuron, .. } => (neuron.function)(x),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Activation::Builtin(kind) => kind.type_name(),
            Activation::Custom { name, .. } => name,
        }
    }
}

/// Registry of neuron kinds: the built-ins plus kinds registered explicitly
/// at startup.
#[derive(Clone, Debug, Default)]
pub struct NeuronCatalog {
    custom: BTreeMap<String, CustomNeuron>,
}

impl NeuronCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an application-defined kind under `name`
    pub fn register<F>(&mut self, name: &str, combine: Combine, function: F) -> NeatResult<NeuronKind>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        if NeuronKind::BUILTIN.iter().any(|k| k.type_name() == name) {
            return Err(NeatError::InvalidConfig(format!(
                "neuron kind '{}' shadows a built-in kind",
                name
            )));
        }
        if self.custom.contains_key(name) {
            return Err(NeatError::InvalidConfig(format!(
                "neuron kind '{}' registered twice",
                name
            )));
        }

        self.custom.insert(
            name.to_string(),
            CustomNeuron {
                combine,
                function: Arc::new(function),
            },
        );
        Ok(NeuronKind::Custom(name.to_string()))
    }

    /// Look up a kind by its type name
    pub fn kind(&self, name: &str) -> NeatResult<NeuronKind> {
        if let Some(kind) = NeuronKind::BUILTIN.iter().find(|k| k.type_name() == name) {
            return Ok(kind.clone());
        }
        if self.custom.contains_key(name) {
            return Ok(NeuronKind::Custom(name.to_string()));
        }
        Err(NeatError::InvalidConfig(format!("unknown neuron kind '{}'", name)))
    }

    /// Every known kind, built-ins first
    pub fn kinds(&self) -> Vec<NeuronKind> {
        NeuronKind::BUILTIN
            .iter()
            .cloned()
            .chain(self.custom.keys().map(|name| NeuronKind::Custom(name.clone())))
            .collect()
    }

    /// Kinds usable for hidden neurons
    pub fn hidden_kinds(&self) -> Vec<NeuronKind> {
        self.kinds().into_iter().filter(|k| !k.is_input()).collect()
    }

    pub fn activation(&self, kind: &NeuronKind) -> NeatResult<Activation> {
        match kind {
            NeuronKind::Custom(name) => self
                .custom
                .get(name)
                .map(|neuron| Activation::Custom {
                    name: name.clone(),
                    neuron: neuron.clone(),
                })
                .ok_or_else(|| {
                    NeatError::InvalidConfig(format!("neuron kind '{}' is not registered", name))
                }),
            builtin => Ok(Activation::Builtin(builtin.clone())),
        }
    }
}

/// A neuron instance owned by one genotype.
///
/// The input list is adjacency for dependency resolution, not ownership:
/// every name refers to a neuron of the same genotype.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Neuron {
    pub name: String,
    pub kind: NeuronKind,
    pub output: bool,
    #[serde(skip)]
    inputs: Option<Vec<String>>,
}

impl Neuron {
    pub fn new(name: impl Into<String>, kind: NeuronKind) -> Self {
        Self {
            name: name.into(),
            kind,
            output: false,
            inputs: None,
        }
    }

    pub fn new_output(name: impl Into<String>, kind: NeuronKind) -> Self {
        Self {
            output: true,
            ..Self::new(name, kind)
        }
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.kind.is_input()
    }

    #[inline]
    pub fn is_bias(&self) -> bool {
        self.kind.is_bias()
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.output
    }

    /// Reset the adjacency list to empty
    pub fn clear_graph(&mut self) {
        self.inputs = Some(Vec::new());
    }

    pub fn add_input(&mut self, name: impl Into<String>) {
        self.inputs.get_or_insert_with(Vec::new).push(name.into());
    }

    /// Adjacency list; fails if the neuron was never wired
    pub fn inputs(&self) -> Result<&[String], GraphError> {
        self.inputs
            .as_deref()
            .ok_or_else(|| GraphError::Uninitialized(self.name.clone()))
    }

    /// Independent copy with no wiring, for grafting into another genotype
    pub fn detached(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind.clone(),
            output: self.output,
            inputs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(kind: NeuronKind, x: f64) -> f64 {
        Activation::Builtin(kind).apply(x)
    }

    #[test]
    fn test_builtin_formulas() {
        assert!((apply(NeuronKind::Sigmoid, 0.0) - 0.5).abs() < 1e-12);
        assert!((apply(NeuronKind::Sigmoid, 1.0) - 1.0 / (1.0 + (-4.9f64).exp())).abs() < 1e-12);
        assert!((apply(NeuronKind::Tanh, 0.5) - (1.2f64).tanh()).abs() < 1e-12);
        assert!((apply(NeuronKind::Sine, 1.0) - (1.6f64).sin()).abs() < 1e-12);
        assert!((apply(NeuronKind::Cosine, 0.0) - 1.0).abs() < 1e-12);
        assert_eq!(apply(NeuronKind::Linear, -3.25), -3.25);
        assert_eq!(apply(NeuronKind::Heaviside, 0.0), 1.0);
        assert_eq!(apply(NeuronKind::Heaviside, -0.1), 0.0);
        assert_eq!(apply(NeuronKind::Sign, 2.0), 1.0);
        assert_eq!(apply(NeuronKind::Sign, -2.0), -1.0);
        assert_eq!(apply(NeuronKind::Sign, 0.0), 0.0);
        assert!((apply(NeuronKind::Gaussian, 0.0) - 1.0).abs() < 1e-12);
        assert!((apply(NeuronKind::Gaussian, 1.0) - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_multiplier_combines_by_product() {
        assert_eq!(Activation::Builtin(NeuronKind::Multiplier).combine(), Combine::Product);
        assert_eq!(Activation::Builtin(NeuronKind::Linear).combine(), Combine::Sum);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = NeuronCatalog::new();
        assert_eq!(catalog.kind("tanh").unwrap(), NeuronKind::Tanh);
        assert!(catalog.kind("quantum").is_err());
        assert_eq!(catalog.hidden_kinds().len(), 9);
        assert!(catalog.hidden_kinds().iter().all(|k| !k.is_input()));
    }

    #[test]
    fn test_catalog_register_custom() {
        let mut catalog = NeuronCatalog::new();
        let kind = catalog.register("relu", Combine::Sum, |x| x.max(0.0)).unwrap();

        assert_eq!(kind, NeuronKind::Custom("relu".to_string()));
        assert_eq!(catalog.kind("relu").unwrap(), kind);
        let act = catalog.activation(&kind).unwrap();
        assert_eq!(act.apply(-2.0), 0.0);
        assert_eq!(act.apply(3.0), 3.0);
        assert_eq!(act.name(), "relu");

        assert!(catalog.register("relu", Combine::Sum, |x| x).is_err());
        assert!(catalog.register("sigmoid", Combine::Sum, |x| x).is_err());
    }

    #[test]
    fn test_unregistered_custom_kind_fails() {
        let catalog = NeuronCatalog::new();
        assert!(catalog
            .activation(&NeuronKind::Custom("ghost".to_string()))
            .is_err());
    }

    #[test]
    fn test_unwired_neuron_inputs_fail() {
        let mut neuron = Neuron::new("h", NeuronKind::Sigmoid);
        assert_eq!(
            neuron.inputs(),
            Err(GraphError::Uninitialized("h".to_string()))
        );

        neuron.clear_graph();
        assert!(neuron.inputs().unwrap().is_empty());
        neuron.add_input("a");
        assert_eq!(neuron.inputs().unwrap(), ["a".to_string()]);
        assert!(neuron.detached().inputs().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        let yaml = serde_yaml::to_string(&NeuronKind::Heaviside).unwrap();
        assert_eq!(yaml.trim(), "heaviside");
    }
}
