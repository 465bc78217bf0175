//! Offline dry run of a flow graph.
//!
//! Walks a validated graph in dependency order and produces the event
//! sequence a flow runtime would stream, with node outputs supplied by the
//! caller. A node runs once every input port has received a document; a node
//! gated by conditional edges additionally needs one of those edges to have
//! been selected. Nodes off the live path emit nothing.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use advisor_core::types::{CompletionReason, FlowEvent, TraceEvent, TraceField};

use crate::graph::{FlowGraph, Node, NodeKind};
use crate::router;

/// Run `graph` with `document` injected at the Input node's first output port.
///
/// `respond` is called for every Prompt and Agent node on the live path with
/// the node and the documents it received, and returns the node's output.
pub fn simulate<F>(graph: &FlowGraph, document: &str, mut respond: F) -> Vec<FlowEvent>
where
    F: FnMut(&Node, &[TraceField]) -> String,
{
    // (node, output port) -> document
    let mut produced: HashMap<(&str, &str), String> = HashMap::new();
    // (condition node, branch) pairs that were selected
    let mut selected: HashSet<(&str, String)> = HashSet::new();
    let mut events = Vec::new();

    for node in graph.topological_order() {
        let Some(fields) = gather_inputs(graph, node, &produced) else {
            debug!(node = %node.name, "Skipping node with unfed inputs");
            continue;
        };
        if graph.is_gated(&node.name)
            && !graph.incoming(&node.name).any(|e| {
                e.condition()
                    .is_some_and(|c| selected.contains(&(e.source.as_str(), c.to_string())))
            })
        {
            debug!(node = %node.name, "Skipping node on an unselected branch");
            continue;
        }

        match &node.kind {
            NodeKind::Input => {
                let Some(port) = node.outputs.first() else {
                    continue;
                };
                produced.insert((node.name.as_str(), port.name.as_str()), document.to_string());
                events.push(FlowEvent::Trace(TraceEvent::node_output(
                    &node.name, &port.name, document,
                )));
            }
            NodeKind::Output => {
                let doc = fields
                    .first()
                    .map(|f| f.document.clone())
                    .unwrap_or_default();
                events.push(FlowEvent::Trace(TraceEvent::NodeInput {
                    node_name: node.name.clone(),
                    fields,
                    timestamp: None,
                }));
                events.push(FlowEvent::Output {
                    node_name: node.name.clone(),
                    document: doc,
                });
            }
            NodeKind::Condition { .. } => {
                let input = fields.first().map(|f| f.document.as_str());
                let decision = router::route(node, input);
                events.push(FlowEvent::Trace(TraceEvent::NodeInput {
                    node_name: node.name.clone(),
                    fields: fields.clone(),
                    timestamp: None,
                }));
                events.push(FlowEvent::Trace(TraceEvent::ConditionResult {
                    node_name: node.name.clone(),
                    satisfied_conditions: vec![decision.branch.clone()],
                    timestamp: None,
                }));
                selected.insert((node.name.as_str(), decision.branch));
            }
            NodeKind::Prompt { .. } | NodeKind::Agent { .. } => {
                events.push(FlowEvent::Trace(TraceEvent::NodeInput {
                    node_name: node.name.clone(),
                    fields: fields.clone(),
                    timestamp: None,
                }));
                let output = respond(node, &fields);
                for port in &node.outputs {
                    produced.insert((node.name.as_str(), port.name.as_str()), output.clone());
                }
                if let Some(port) = node.outputs.first() {
                    events.push(FlowEvent::Trace(TraceEvent::node_output(
                        &node.name, &port.name, output,
                    )));
                }
            }
        }
    }

    events.push(FlowEvent::Completion {
        reason: CompletionReason::Success,
    });
    events
}

/// Simulate with outputs looked up by node name. Missing entries produce an empty document.
pub fn simulate_with_outputs(
    graph: &FlowGraph,
    document: &str,
    outputs: &HashMap<String, String>,
) -> Vec<FlowEvent> {
    simulate(graph, document, |node, _| match outputs.get(&node.name) {
        Some(out) => out.clone(),
        None => {
            warn!(node = %node.name, "No scripted output for node, using empty document");
            String::new()
        }
    })
}

/// Collect one document per input port, or `None` if any port is still unfed.
fn gather_inputs(
    graph: &FlowGraph,
    node: &Node,
    produced: &HashMap<(&str, &str), String>,
) -> Option<Vec<TraceField>> {
    node.inputs
        .iter()
        .map(|port| {
            graph
                .incoming(&node.name)
                .filter_map(|e| {
                    e.ports()
                        .filter(|(_, input)| *input == port.name)
                        .and_then(|(output, _)| produced.get(&(e.source.as_str(), output)))
                })
                .next()
                .map(|doc| TraceField::new(&port.name, doc))
        })
        .collect()
}
