//! Trace event interpreter.
//!
//! Turns the ordered trace stream of one flow invocation into render
//! commands. Each call is a function of the event and the session's
//! `RenderState`; replaying the same events into a fresh state yields the same
//! commands.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use advisor_core::config::RenderConfig;
use advisor_core::error::PayloadParseError;
use advisor_core::types::{CompletionReason, FlowEvent, TraceEvent};
use advisor_flow::graph::{FlowGraph, DEFAULT_BRANCH};
use advisor_flow::router::{self, Decision};

use crate::command::RenderCommand;
use crate::payload::{self, FinancialAnalysis, PortfolioSuggestion, RiskAnalysis};
use crate::role::NodeRole;

/// Per-session accumulator. Created per invocation and dropped with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    outputs: HashMap<String, String>,
    decisions: Vec<Decision>,
    flow_outputs: Vec<(String, String)>,
    completion: Option<CompletionReason>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last output payload seen for `node`.
    pub fn last_output(&self, node: &str) -> Option<&str> {
        self.outputs.get(node).map(String::as_str)
    }

    /// Routing decisions in the order their Condition nodes resolved.
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn decision(&self, node: &str) -> Option<&Decision> {
        self.decisions.iter().find(|d| d.node == node)
    }

    /// Documents that reached Output nodes, in arrival order.
    pub fn flow_outputs(&self) -> &[(String, String)] {
        &self.flow_outputs
    }

    pub fn completion(&self) -> Option<&CompletionReason> {
        self.completion.as_ref()
    }

    fn record_decision(&mut self, decision: Decision) {
        match self.decisions.iter_mut().find(|d| d.node == decision.node) {
            Some(existing) => *existing = decision,
            None => self.decisions.push(decision),
        }
    }
}

/// Maps trace events to render commands.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: RenderConfig,
    graph: Option<Arc<FlowGraph>>,
}

impl Interpreter {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            graph: None,
        }
    }

    /// Evaluate Condition nodes of `graph` locally as their inputs arrive.
    ///
    /// A `ConditionResult` reported by the runtime still takes precedence.
    pub fn with_graph(mut self, graph: Arc<FlowGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Handle any item of the invocation stream.
    pub fn on_flow_event(&self, state: &mut RenderState, event: &FlowEvent) -> Vec<RenderCommand> {
        match event {
            FlowEvent::Trace(trace) => self.on_event(state, trace),
            FlowEvent::Output {
                node_name,
                document,
            } => {
                state
                    .flow_outputs
                    .push((node_name.clone(), document.clone()));
                vec![]
            }
            FlowEvent::Completion { reason } => {
                state.completion = Some(reason.clone());
                vec![RenderCommand::Completed {
                    reason: reason.clone(),
                }]
            }
        }
    }

    /// Handle one trace event.
    pub fn on_event(&self, state: &mut RenderState, event: &TraceEvent) -> Vec<RenderCommand> {
        match event {
            TraceEvent::NodeInput { node_name, .. } => {
                self.route_locally(state, node_name, event.payload());
                match NodeRole::from_node_name(node_name) {
                    Some(role) => self.input_commands(role),
                    None => {
                        debug!(node = %node_name, "No display role for node input");
                        vec![]
                    }
                }
            }
            TraceEvent::NodeOutput { node_name, .. } => {
                let document = event.payload();
                if let Some(doc) = document {
                    state.outputs.insert(node_name.clone(), doc.to_string());
                }
                match NodeRole::from_node_name(node_name) {
                    Some(role) => self.output_commands(role, node_name, document),
                    None => {
                        debug!(node = %node_name, "No display role for node output");
                        vec![]
                    }
                }
            }
            TraceEvent::ConditionResult {
                node_name,
                satisfied_conditions,
                ..
            } => {
                let branch = satisfied_conditions
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
                let is_default = self
                    .graph
                    .as_ref()
                    .and_then(|g| g.node(node_name))
                    .and_then(|n| n.branch(&branch))
                    .map_or(branch == DEFAULT_BRANCH, |b| b.is_default());
                debug!(node = %node_name, branch = %branch, "Runtime reported condition result");
                state.record_decision(Decision {
                    node: node_name.clone(),
                    branch,
                    is_default,
                });
                vec![]
            }
        }
    }

    /// Replay a whole event sequence into a fresh state.
    pub fn replay<'a, I>(&self, events: I) -> (RenderState, Vec<RenderCommand>)
    where
        I: IntoIterator<Item = &'a FlowEvent>,
    {
        let mut state = RenderState::new();
        let mut commands = Vec::new();
        for event in events {
            commands.extend(self.on_flow_event(&mut state, event));
        }
        (state, commands)
    }

    fn route_locally(&self, state: &mut RenderState, node_name: &str, input: Option<&str>) {
        let Some(node) = self.graph.as_ref().and_then(|g| g.node(node_name)) else {
            return;
        };
        if node.is_condition() {
            state.record_decision(router::route(node, input));
        }
    }

    fn shows(&self, role: NodeRole) -> bool {
        !role.is_prompt_output() || self.config.show_prompt_nodes
    }

    fn header(role: NodeRole) -> RenderCommand {
        RenderCommand::Header {
            label: role.label(),
            title: role.title(),
        }
    }

    fn input_commands(&self, role: NodeRole) -> Vec<RenderCommand> {
        // The reflection only gets a section when it rejects the analysis.
        if role == NodeRole::FinancialAnalystReflection || !self.shows(role) {
            return vec![];
        }
        vec![Self::header(role)]
    }

    fn output_commands(
        &self,
        role: NodeRole,
        node_name: &str,
        document: Option<&str>,
    ) -> Vec<RenderCommand> {
        if !self.shows(role) {
            return vec![];
        }
        let Some(raw) = document else {
            return vec![RenderCommand::NodeError(PayloadParseError {
                node: node_name.to_string(),
                raw: String::new(),
                message: "trace event carries no output fields".to_string(),
            })];
        };

        let command = match role {
            NodeRole::FinancialAnalyst => {
                payload::decode::<FinancialAnalysis>(node_name, raw).map(RenderCommand::FinancialAnalysis)
            }
            NodeRole::PortfolioArchitect => {
                payload::decode::<PortfolioSuggestion>(node_name, raw).map(|p| {
                    payload::check_allocation(node_name, "portfolio_allocation", &p.portfolio_allocation);
                    RenderCommand::Portfolio(p)
                })
            }
            NodeRole::RiskManager => payload::decode::<RiskAnalysis>(node_name, raw).and_then(|r| {
                if r.scenarios().is_empty() {
                    return Err(PayloadParseError {
                        node: node_name.to_string(),
                        raw: raw.to_string(),
                        message: "no risk scenarios".to_string(),
                    });
                }
                for (i, scenario) in r.scenarios() {
                    let context = format!("scenario{i}");
                    payload::check_allocation(node_name, &context, &scenario.allocation_management);
                }
                Ok(RenderCommand::RiskScenarios(r))
            }),
            NodeRole::ReportGenerator => {
                let highlights = if self.config.highlight_placeholders {
                    payload::placeholders(raw)
                } else {
                    vec![]
                };
                Ok(RenderCommand::Report {
                    markdown: raw.to_string(),
                    highlights,
                })
            }
            NodeRole::FinancialAnalystReflection => {
                return match payload::reflection_explanation(raw) {
                    None => vec![],
                    Some(explanation) => vec![
                        Self::header(role),
                        RenderCommand::ReviewFailed { explanation },
                    ],
                };
            }
            NodeRole::FinancialAnalystPrompt | NodeRole::FinancialAnalystReflectionPrompt => {
                Ok(RenderCommand::PromptText {
                    text: raw.to_string(),
                })
            }
        };

        match command {
            Ok(cmd) => vec![cmd],
            Err(e) => {
                debug!(node = %node_name, error = %e.message, "Payload could not be decoded");
                vec![RenderCommand::NodeError(e)]
            }
        }
    }
}
