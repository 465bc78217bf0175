//! Flow graph model.
//!
//! A flow is a directed acyclic graph of typed `Node`s connected by `Edge`s.
//! Data edges carry a document from an output port to an input port;
//! conditional edges activate their target only when the source Condition
//! node selects the named branch. A `FlowGraph` is always valid: it can only
//! be built through `FlowGraph::new`, which runs every structural check.

pub mod edge;
pub mod node;
pub mod validate;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use advisor_core::error::GraphError;

pub use edge::{Edge, EdgeKind};
pub use node::{
    ConditionBranch, InferenceSettings, InputPort, Node, NodeKind, OutputPort, PortType,
    PromptTemplate, DEFAULT_BRANCH, WHOLE_DOCUMENT,
};
pub use validate::validate;

/// A validated flow graph.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

/// Serialized form of a graph: plain node and edge lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FlowGraph {
    /// Build a graph, rejecting it if any structural check fails.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, GraphError> {
        validate(&nodes, &edges)?;

        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
        let order = validate::topological_order(&nodes, &edges)?
            .into_iter()
            .filter_map(|n| index.get(&n.name).copied())
            .collect();

        Ok(Self {
            nodes,
            edges,
            index,
            order,
        })
    }

    /// Parse a graph definition from JSON and validate it.
    pub fn from_json(json: &str) -> advisor_core::Result<Self> {
        let def: GraphDefinition = serde_json::from_str(json)?;
        Ok(Self::try_from(def)?)
    }

    pub fn to_definition(&self) -> GraphDefinition {
        GraphDefinition {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The single Input node.
    pub fn input_node(&self) -> &Node {
        // Validation guarantees exactly one Input node, and it sorts first.
        self.topological_order()
            .find(|n| n.is_input())
            .unwrap_or(&self.nodes[0])
    }

    /// Output nodes in declaration order.
    pub fn output_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_output())
    }

    pub fn outgoing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == name)
    }

    pub fn incoming<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == name)
    }

    /// Nodes in dependency order; ties keep declaration order.
    pub fn topological_order(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().map(|&i| &self.nodes[i])
    }

    /// Targets activated when `condition_node` selects `branch`.
    pub fn branch_targets<'a>(
        &'a self,
        condition_node: &'a str,
        branch: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.outgoing(condition_node)
            .filter(move |e| e.condition() == Some(branch))
            .map(|e| e.target.as_str())
    }

    /// True if some conditional edge gates `name`.
    pub fn is_gated(&self, name: &str) -> bool {
        self.incoming(name).any(|e| !e.is_data())
    }

    pub fn into_parts(self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes, self.edges)
    }
}

impl TryFrom<GraphDefinition> for FlowGraph {
    type Error = GraphError;

    fn try_from(def: GraphDefinition) -> Result<Self, Self::Error> {
        Self::new(def.nodes, def.edges)
    }
}
