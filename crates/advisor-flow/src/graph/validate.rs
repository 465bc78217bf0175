//! Structural validation of flow graphs.
//!
//! Checks run in a fixed order and stop at the first defect, so the reported
//! kind is deterministic for a given graph.

use std::collections::{HashMap, HashSet, VecDeque};

use advisor_core::error::{GraphError, GraphErrorKind};

use super::edge::{Edge, EdgeKind};
use super::node::{Node, NodeKind};
use crate::router::ConditionExpr;

/// Validate a node/edge set.
pub fn validate(nodes: &[Node], edges: &[Edge]) -> Result<(), GraphError> {
    let index = check_nodes(nodes)?;
    check_single_input(nodes)?;
    check_edge_references(&index, edges)?;
    check_prompt_variables(nodes)?;
    check_dangling(nodes, edges)?;
    check_conditions(nodes, edges)?;
    topological_order(nodes, edges)?;
    check_terminals(nodes, edges)?;
    Ok(())
}

/// Unique names and the ports each kind requires.
fn check_nodes(nodes: &[Node]) -> Result<HashMap<&str, &Node>, GraphError> {
    let mut index = HashMap::new();
    for node in nodes {
        if index.insert(node.name.as_str(), node).is_some() {
            return Err(GraphError::new(
                GraphErrorKind::DuplicateNode,
                format!("node '{}' is declared more than once", node.name),
            ));
        }

        if !node.is_input() && node.inputs.is_empty() {
            return Err(GraphError::new(
                GraphErrorKind::MissingPort,
                format!("{} node '{}' declares no input port", node.kind.label(), node.name),
            ));
        }

        let has_outputs = match &node.kind {
            NodeKind::Output => true,
            NodeKind::Condition { branches } => !branches.is_empty(),
            _ => !node.outputs.is_empty(),
        };
        if !has_outputs {
            return Err(GraphError::new(
                GraphErrorKind::MissingPort,
                format!("{} node '{}' declares no output", node.kind.label(), node.name),
            ));
        }
    }
    Ok(index)
}

fn check_single_input(nodes: &[Node]) -> Result<(), GraphError> {
    let inputs: Vec<&str> = nodes
        .iter()
        .filter(|n| n.is_input())
        .map(|n| n.name.as_str())
        .collect();
    match inputs.len() {
        1 => Ok(()),
        0 => Err(GraphError::new(
            GraphErrorKind::MissingInput,
            "graph has no Input node",
        )),
        _ => Err(GraphError::new(
            GraphErrorKind::MissingInput,
            format!("graph has {} Input nodes: {}", inputs.len(), inputs.join(", ")),
        )),
    }
}

fn unknown(edge: &Edge, what: String) -> GraphError {
    GraphError::new(
        GraphErrorKind::UnknownPort,
        format!("connection '{}' references {}", edge.name, what),
    )
}

/// Every edge endpoint names an existing node and a declared port or branch.
fn check_edge_references(index: &HashMap<&str, &Node>, edges: &[Edge]) -> Result<(), GraphError> {
    for edge in edges {
        let source = index
            .get(edge.source.as_str())
            .ok_or_else(|| unknown(edge, format!("unknown source node '{}'", edge.source)))?;
        let target = index
            .get(edge.target.as_str())
            .ok_or_else(|| unknown(edge, format!("unknown target node '{}'", edge.target)))?;

        match &edge.kind {
            EdgeKind::Data {
                source_output,
                target_input,
            } => {
                let out = source.output_port(source_output).ok_or_else(|| {
                    unknown(edge, format!("undeclared output '{}.{}'", source.name, source_output))
                })?;
                let inp = target.input_port(target_input).ok_or_else(|| {
                    unknown(edge, format!("undeclared input '{}.{}'", target.name, target_input))
                })?;
                if out.port_type != inp.port_type {
                    return Err(unknown(
                        edge,
                        format!(
                            "ports of different types ({:?} -> {:?})",
                            out.port_type, inp.port_type
                        ),
                    ));
                }
            }
            EdgeKind::Conditional { condition } => {
                if !source.is_condition() {
                    return Err(unknown(
                        edge,
                        format!("'{}' as a condition, but it is a {} node", source.name, source.kind.label()),
                    ));
                }
                if source.branch(condition).is_none() {
                    return Err(unknown(
                        edge,
                        format!("undeclared condition '{}' on '{}'", condition, source.name),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Prompt template variables are all bound to input ports.
fn check_prompt_variables(nodes: &[Node]) -> Result<(), GraphError> {
    for node in nodes {
        if let NodeKind::Prompt { template } = &node.kind {
            if let Some(var) = template.variables.iter().find(|v| node.input_port(v).is_none()) {
                return Err(GraphError::new(
                    GraphErrorKind::UnknownPort,
                    format!(
                        "prompt '{}' on node '{}' expects variable '{}' but no such input is declared",
                        template.reference, node.name, var
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Every non-Input node is reached by some edge and every input port is fed by data.
fn check_dangling(nodes: &[Node], edges: &[Edge]) -> Result<(), GraphError> {
    let fed: HashSet<(&str, &str)> = edges
        .iter()
        .filter_map(|e| e.ports().map(|(_, input)| (e.target.as_str(), input)))
        .collect();

    for node in nodes.iter().filter(|n| !n.is_input()) {
        if !edges.iter().any(|e| e.target == node.name) {
            return Err(GraphError::new(
                GraphErrorKind::DanglingNode,
                format!("node '{}' has no incoming connection", node.name),
            ));
        }
        if let Some(port) = node
            .inputs
            .iter()
            .find(|p| !fed.contains(&(node.name.as_str(), p.name.as_str())))
        {
            return Err(GraphError::new(
                GraphErrorKind::DanglingNode,
                format!("input '{}.{}' is not fed by any data connection", node.name, port.name),
            ));
        }
    }
    Ok(())
}

/// Exactly one default per Condition node, parseable guards, every branch taken by some edge.
fn check_conditions(nodes: &[Node], edges: &[Edge]) -> Result<(), GraphError> {
    for node in nodes.iter().filter(|n| n.is_condition()) {
        let defaults = node.branches().iter().filter(|b| b.is_default()).count();
        if defaults != 1 {
            return Err(GraphError::new(
                GraphErrorKind::UncoveredCondition,
                format!("condition node '{}' declares {} default branches, expected 1", node.name, defaults),
            ));
        }

        for branch in node.branches() {
            if let Some(expression) = &branch.expression {
                let readable = ConditionExpr::parse(expression)
                    .is_some_and(|expr| node.input_port(expr.input()).is_some());
                if !readable {
                    return Err(GraphError::new(
                        GraphErrorKind::UncoveredCondition,
                        format!(
                            "condition '{}' on '{}' cannot be evaluated: {}",
                            branch.name, node.name, expression
                        ),
                    ));
                }
            }

            let covered = edges
                .iter()
                .any(|e| e.source == node.name && e.condition() == Some(branch.name.as_str()));
            if !covered {
                return Err(GraphError::new(
                    GraphErrorKind::UncoveredCondition,
                    format!("condition '{}' on '{}' has no outgoing connection", branch.name, node.name),
                ));
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm. Both branches of a Condition node count as successors;
/// the graph is acyclic only if no choice of branches can revisit a node.
/// Ties are broken by declaration order so the result is stable.
pub(crate) fn topological_order<'a>(
    nodes: &'a [Node],
    edges: &[Edge],
) -> Result<Vec<&'a Node>, GraphError> {
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.name.as_str(), 0)).collect();
    for edge in edges {
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&Node> = nodes
        .iter()
        .filter(|n| in_degree.get(n.name.as_str()) == Some(&0))
        .collect();
    let position: HashMap<&str, &Node> = nodes.iter().map(|n| (n.name.as_str(), n)).collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for edge in edges.iter().filter(|e| e.source == node.name) {
            if let Some(deg) = in_degree.get_mut(edge.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    if let Some(next) = position.get(edge.target.as_str()) {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let mut stuck: Vec<&str> = nodes
            .iter()
            .filter(|n| in_degree.get(n.name.as_str()).is_some_and(|d| *d > 0))
            .map(|n| n.name.as_str())
            .collect();
        stuck.sort_unstable();
        return Err(GraphError::new(
            GraphErrorKind::Cycle,
            format!("cycle through {}", stuck.join(", ")),
        ));
    }
    Ok(order)
}

/// Terminal nodes are Output nodes.
fn check_terminals(nodes: &[Node], edges: &[Edge]) -> Result<(), GraphError> {
    for node in nodes {
        let terminal = !edges.iter().any(|e| e.source == node.name);
        if terminal && !node.is_output() {
            return Err(GraphError::new(
                GraphErrorKind::DeadEnd,
                format!("{} node '{}' has no outgoing connection", node.kind.label(), node.name),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PortType, PromptTemplate};

    fn linear() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::input("start").with_output("document", PortType::String),
            Node::prompt("p", PromptTemplate::new("prompt").with_variables(&["user_input"]))
                .with_input("user_input", PortType::String)
                .with_output("modelCompletion", PortType::String),
            Node::output("end").with_input("document", PortType::String),
        ];
        let edges = vec![
            Edge::data("c1", "start", "document", "p", "user_input"),
            Edge::data("c2", "p", "modelCompletion", "end", "document"),
        ];
        (nodes, edges)
    }

    fn kind_of(nodes: &[Node], edges: &[Edge]) -> GraphErrorKind {
        validate(nodes, edges).unwrap_err().kind
    }

    #[test]
    fn test_linear_graph_is_valid() {
        let (nodes, edges) = linear();
        assert!(validate(&nodes, &edges).is_ok());
        let order: Vec<&str> = topological_order(&nodes, &edges)
            .unwrap()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(order, vec!["start", "p", "end"]);
    }

    #[test]
    fn test_duplicate_node() {
        let (mut nodes, edges) = linear();
        nodes.push(Node::output("end").with_input("document", PortType::String));
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::DuplicateNode);
    }

    #[test]
    fn test_prompt_without_output_port() {
        let (mut nodes, edges) = linear();
        nodes[1].outputs.clear();
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::MissingPort);
    }

    #[test]
    fn test_missing_input() {
        let (mut nodes, edges) = linear();
        nodes.remove(0);
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::MissingInput);
    }

    #[test]
    fn test_two_inputs() {
        let (mut nodes, edges) = linear();
        nodes.push(Node::input("start2").with_output("document", PortType::String));
        let err = validate(&nodes, &edges).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::MissingInput);
        assert!(err.detail.contains("2 Input nodes"));
    }

    #[test]
    fn test_unknown_port() {
        let (nodes, mut edges) = linear();
        edges[1] = Edge::data("c2", "p", "agentResponse", "end", "document");
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UnknownPort);
    }

    #[test]
    fn test_unknown_node() {
        let (nodes, mut edges) = linear();
        edges.push(Edge::data("c3", "p", "modelCompletion", "nowhere", "document"));
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UnknownPort);
    }

    #[test]
    fn test_port_type_mismatch() {
        let (mut nodes, edges) = linear();
        nodes[2] = Node::output("end").with_input("document", PortType::Object);
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UnknownPort);
    }

    #[test]
    fn test_prompt_variable_without_port() {
        let (mut nodes, edges) = linear();
        if let NodeKind::Prompt { template } = &mut nodes[1].kind {
            template.variables.push("finance_result".into());
        }
        let err = validate(&nodes, &edges).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownPort);
        assert!(err.detail.contains("finance_result"));
    }

    #[test]
    fn test_dangling_node() {
        let (nodes, mut edges) = linear();
        edges.remove(1);
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::DanglingNode);
    }

    #[test]
    fn test_unfed_input_port_is_dangling() {
        let (mut nodes, edges) = linear();
        nodes[1] = nodes[1].clone().with_input("extra", PortType::String);
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::DanglingNode);
    }

    #[test]
    fn test_conditional_edge_from_non_condition() {
        let (nodes, mut edges) = linear();
        edges.push(Edge::conditional("c3", "p", "end", "default"));
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UnknownPort);
    }

    fn branching() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::input("start").with_output("document", PortType::String),
            Node::condition("cond")
                .with_input("conditionInput", PortType::String)
                .with_branch("condition", r#"conditionInput == "yes""#)
                .with_default_branch(),
            Node::output("yes_end").with_input("document", PortType::String),
            Node::output("no_end").with_input("document", PortType::String),
        ];
        let edges = vec![
            Edge::data("c1", "start", "document", "cond", "conditionInput"),
            Edge::data("c2", "start", "document", "yes_end", "document"),
            Edge::data("c3", "start", "document", "no_end", "document"),
            Edge::conditional("t", "cond", "yes_end", "condition"),
            Edge::conditional("f", "cond", "no_end", "default"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_branching_graph_is_valid() {
        let (nodes, edges) = branching();
        assert!(validate(&nodes, &edges).is_ok());
    }

    #[test]
    fn test_uncovered_branch() {
        let (nodes, mut edges) = branching();
        edges.retain(|e| e.name != "f");
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UncoveredCondition);
    }

    #[test]
    fn test_missing_default() {
        let (mut nodes, edges) = branching();
        nodes[1] = Node::condition("cond")
            .with_input("conditionInput", PortType::String)
            .with_branch("condition", r#"conditionInput == "yes""#)
            .with_branch("default", r#"conditionInput == "no""#);
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UncoveredCondition);
    }

    #[test]
    fn test_unparseable_guard() {
        let (mut nodes, edges) = branching();
        nodes[1] = Node::condition("cond")
            .with_input("conditionInput", PortType::String)
            .with_branch("condition", "conditionInput is yes")
            .with_default_branch();
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::UncoveredCondition);
    }

    #[test]
    fn test_cycle() {
        let nodes = vec![
            Node::input("start").with_output("document", PortType::String),
            Node::agent("a", "alias-a")
                .with_input("agentInputText", PortType::String)
                .with_input("feedback", PortType::String)
                .with_output("agentResponse", PortType::String),
            Node::agent("b", "alias-b")
                .with_input("agentInputText", PortType::String)
                .with_output("agentResponse", PortType::String),
            Node::output("end").with_input("document", PortType::String),
        ];
        let edges = vec![
            Edge::data("c1", "start", "document", "a", "agentInputText"),
            Edge::data("c2", "a", "agentResponse", "b", "agentInputText"),
            Edge::data("c3", "b", "agentResponse", "a", "feedback"),
            Edge::data("c4", "b", "agentResponse", "end", "document"),
        ];
        let err = validate(&nodes, &edges).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::Cycle);
        assert!(err.detail.starts_with("cycle through a, b"));
    }

    #[test]
    fn test_dead_end() {
        let (mut nodes, mut edges) = linear();
        nodes.push(
            Node::agent("orphan", "alias")
                .with_input("agentInputText", PortType::String)
                .with_output("agentResponse", PortType::String),
        );
        edges.push(Edge::data("c3", "p", "modelCompletion", "orphan", "agentInputText"));
        assert_eq!(kind_of(&nodes, &edges), GraphErrorKind::DeadEnd);
    }
}
