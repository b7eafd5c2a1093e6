//! Dependency resolution over neuron-style graphs.
//!
//! Depth-first post-order topological sort with cycle detection. Nodes that
//! are revisited while still on the DFS stack are reported as circular and
//! not descended into again.

use crate::error::GraphError;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

/// Anything whose nodes can list the nodes they depend on
pub trait Graph {
    type Node: Clone + Eq + Hash + Debug;

    /// Inputs of `node` in insertion order. Uninitialized or unknown nodes
    /// are an error.
    fn inputs(&self, node: &Self::Node) -> Result<&[Self::Node], GraphError>;
}

/// Output of [`DependencyResolver::resolve`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution<N> {
    /// Every reachable node, each after all of its non-circular inputs
    pub order: Vec<N>,
    /// Nodes found on the stack while revisiting, `None` when acyclic
    pub circular: Option<Vec<N>>,
}

pub struct DependencyResolver<'g, G: Graph> {
    graph: &'g G,
    roots: Vec<G::Node>,
    resolved: Vec<G::Node>,
    resolved_set: HashSet<G::Node>,
    unresolved: Vec<G::Node>,
    circular: Vec<G::Node>,
}

impl<'g, G: Graph> DependencyResolver<'g, G> {
    /// Resolve backwards from `roots` (typically the output neurons)
    pub fn new(graph: &'g G, roots: Vec<G::Node>) -> Self {
        Self {
            graph,
            roots,
            resolved: Vec::new(),
            resolved_set: HashSet::new(),
            unresolved: Vec::new(),
            circular: Vec::new(),
        }
    }

    /// Resolve allowing cycles. Only an unwired node is an error.
    pub fn resolve(mut self) -> Result<Resolution<G::Node>, GraphError> {
        let roots = std::mem::take(&mut self.roots);
        for root in &roots {
            if !self.resolved_set.contains(root) {
                self.visit(root)?;
            }
        }

        let circular = if self.circular.is_empty() {
            None
        } else {
            Some(self.circular)
        };
        Ok(Resolution {
            order: self.resolved,
            circular,
        })
    }

    /// Resolve, failing on any cycle
    pub fn resolve_strict(self) -> Result<Vec<G::Node>, GraphError> {
        let resolution = self.resolve()?;
        match resolution.circular {
            None => Ok(resolution.order),
            Some(nodes) => Err(GraphError::Circular(
                nodes.iter().map(|n| format!("{:?}", n)).collect(),
            )),
        }
    }

    fn visit(&mut self, node: &G::Node) -> Result<(), GraphError> {
        self.unresolved.push(node.clone());

        let graph = self.graph;
        for input in graph.inputs(node)? {
            if self.resolved_set.contains(input) {
                continue;
            }
            if self.unresolved.contains(input) {
                if !self.circular.contains(input) {
                    self.circular.push(input.clone());
                }
            } else {
                self.visit(input)?;
            }
        }

        self.unresolved.retain(|n| n != node);
        if self.resolved_set.insert(node.clone()) {
            self.resolved.push(node.clone());
        }
        Ok(())
    }
}

/// Plain adjacency-list graph keyed by name
#[derive(Clone, Debug, Default)]
pub struct AdjacencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl AdjacencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node with no inputs yet
    pub fn add_node(&mut self, node: impl Into<String>) {
        self.edges.entry(node.into()).or_default();
    }

    /// `node` depends on `input`
    pub fn add_input(&mut self, node: impl Into<String>, input: impl Into<String>) {
        let input = input.into();
        self.edges.entry(node.into()).or_default().push(input);
    }
}

impl Graph for AdjacencyGraph {
    type Node = String;

    fn inputs(&self, node: &String) -> Result<&[String], GraphError> {
        self.edges
            .get(node)
            .map(|v| v.as_slice())
            .ok_or_else(|| GraphError::Uninitialized(node.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// n nodes where node i depends on every node < i
    fn chain(n: usize) -> AdjacencyGraph {
        let mut graph = AdjacencyGraph::new();
        for i in 0..n {
            graph.add_node(format!("n{}", i));
            for j in 0..i {
                graph.add_input(format!("n{}", i), format!("n{}", j));
            }
        }
        graph
    }

    fn position(order: &[String], node: &str) -> usize {
        order.iter().position(|n| n == node).unwrap()
    }

    #[test]
    fn test_resolve_acyclic_chain() {
        let n = 12;
        let graph = chain(n);
        let resolution = DependencyResolver::new(&graph, vec![format!("n{}", n - 1)])
            .resolve()
            .unwrap();

        assert_eq!(resolution.order.len(), n);
        assert!(resolution.circular.is_none());
        for i in 0..n {
            for j in 0..i {
                assert!(
                    position(&resolution.order, &format!("n{}", j))
                        < position(&resolution.order, &format!("n{}", i))
                );
            }
        }
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let n = 8;
        let mut graph = chain(n);
        graph.add_input("n0", format!("n{}", n - 1));

        let resolution = DependencyResolver::new(&graph, vec![format!("n{}", n - 1)])
            .resolve()
            .unwrap();

        assert_eq!(resolution.order.len(), n);
        let circular = resolution.circular.expect("cycle should be reported");
        assert!(!circular.is_empty());
        assert!(circular.contains(&format!("n{}", n - 1)));
    }

    #[test]
    fn test_resolve_strict_rejects_cycle() {
        let mut graph = chain(4);
        graph.add_input("n0", "n3");

        let result = DependencyResolver::new(&graph, vec!["n3".to_string()]).resolve_strict();
        assert!(matches!(result, Err(GraphError::Circular(_))));

        let acyclic = chain(4);
        let order = DependencyResolver::new(&acyclic, vec!["n3".to_string()])
            .resolve_strict()
            .unwrap();
        assert_eq!(order.last().unwrap(), "n3");
    }

    #[test]
    fn test_self_loop_is_circular() {
        let mut graph = AdjacencyGraph::new();
        graph.add_input("a", "a");

        let resolution = DependencyResolver::new(&graph, vec!["a".to_string()])
            .resolve()
            .unwrap();
        assert_eq!(resolution.order, vec!["a".to_string()]);
        assert_eq!(resolution.circular, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_order_follows_input_insertion() {
        let mut graph = AdjacencyGraph::new();
        graph.add_input("out", "b");
        graph.add_input("out", "a");
        graph.add_node("a");
        graph.add_node("b");

        let order = DependencyResolver::new(&graph, vec!["out".to_string()])
            .resolve_strict()
            .unwrap();
        assert_eq!(order, vec!["b", "a", "out"]);
    }

    #[test]
    fn test_unknown_node_is_error() {
        let mut graph = AdjacencyGraph::new();
        graph.add_input("out", "ghost");

        let result = DependencyResolver::new(&graph, vec!["out".to_string()]).resolve();
        assert_eq!(result, Err(GraphError::Uninitialized("ghost".to_string())));
    }
}
