//! Flow executor: drives one invocation from request to completion.
//!
//! A session is single-shot. The executor opens the stream, feeds every item
//! through the interpreter in arrival order and hands each render command to
//! the caller as soon as it exists. Any stream error ends the session; there
//! is no resumption or retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use advisor_core::config::{FlowConfig, RenderConfig};
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::FlowTransport;
use advisor_core::types::{FlowInput, FlowInvocation, InvestorProfile, SessionId};
use advisor_flow::graph::FlowGraph;
use advisor_render::{Interpreter, RenderCommand, RenderState};

/// What a completed session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub state: RenderState,
    pub commands: Vec<RenderCommand>,
    /// Stream items received, including ones with nothing to render.
    pub events: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionOutcome {
    /// True if the runtime reported completion before the stream closed.
    pub fn completed(&self) -> bool {
        self.state.completion().is_some()
    }
}

/// Runs invocations of a validated flow.
pub struct FlowExecutor {
    transport: Arc<dyn FlowTransport>,
    config: FlowConfig,
    graph: Arc<FlowGraph>,
    interpreter: Interpreter,
}

impl FlowExecutor {
    /// The graph is validated by construction, so an executor can never run an invalid flow.
    pub fn new(
        transport: Arc<dyn FlowTransport>,
        config: FlowConfig,
        graph: FlowGraph,
        render: RenderConfig,
    ) -> Self {
        let graph = Arc::new(graph);
        let interpreter = Interpreter::new(render).with_graph(graph.clone());
        Self {
            transport,
            config,
            graph,
            interpreter,
        }
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Build the invocation that injects `profile` at the Input node.
    pub fn invocation(&self, profile: &InvestorProfile) -> Result<FlowInvocation> {
        let start = self.graph.input_node();
        let port = start.outputs.first().ok_or_else(|| {
            AdvisorError::Config(format!("input node '{}' has no output port", start.name))
        })?;
        Ok(FlowInvocation {
            inputs: vec![FlowInput {
                node_name: start.name.clone(),
                node_output_name: port.name.clone(),
                document: profile.to_document()?,
            }],
            enable_trace: self.config.enable_trace,
        })
    }

    /// Run one session to completion.
    ///
    /// `on_command` sees every render command in order as it is produced.
    /// Returns `Cancelled` if `cancel` fires first; the stream is dropped,
    /// which closes the underlying connection.
    pub async fn run<F>(
        &self,
        profile: &InvestorProfile,
        cancel: CancellationToken,
        mut on_command: F,
    ) -> Result<SessionOutcome>
    where
        F: FnMut(&RenderCommand),
    {
        let session_id = SessionId::new();
        let started_at = Utc::now();
        let invocation = self.invocation(profile)?;

        info!(
            session = %session_id,
            flow_id = %self.config.flow_id,
            alias = %self.config.flow_alias_id,
            "Starting flow session"
        );

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(session = %session_id, "Session cancelled before the stream opened");
                return Err(AdvisorError::Cancelled);
            }
            opened = self.transport.invoke_flow(&self.config, invocation) => opened.map_err(|e| {
                error!(session = %session_id, error = %e, "Failed to open flow stream");
                e
            })?,
        };

        let mut state = RenderState::new();
        let mut commands = Vec::new();
        let mut events = 0usize;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session = %session_id, events, "Session cancelled");
                    return Err(AdvisorError::Cancelled);
                }
                item = stream.next() => item,
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    error!(session = %session_id, events, error = %e, "Flow stream failed");
                    return Err(e);
                }
                None => break,
            };
            events += 1;

            for command in self.interpreter.on_flow_event(&mut state, &event) {
                on_command(&command);
                commands.push(command);
            }
        }

        match state.completion() {
            Some(reason) => info!(session = %session_id, events, ?reason, "Flow session complete"),
            None => warn!(session = %session_id, events, "Flow stream closed without a completion event"),
        }

        Ok(SessionOutcome {
            session_id,
            state,
            commands,
            events,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
