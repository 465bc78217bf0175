//! Flow runtime wire format.
//!
//! The invocation request and the members of the response stream, as JSON.
//! Each stream item is an object with exactly one member naming its kind:
//! `flowTraceEvent`, `flowOutputEvent`, `flowCompletionEvent`, or one of the
//! service exceptions (`throttlingException`, `validationException`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use advisor_core::error::{AdvisorError, Result};
use advisor_core::types::{
    CompletionReason, FlowEvent, FlowInput, FlowInvocation, TraceEvent, TraceField,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeFlowRequest {
    inputs: Vec<WireInput>,
    enable_trace: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInput {
    content: WireContent,
    node_name: String,
    node_output_name: String,
}

#[derive(Serialize, Deserialize)]
struct WireContent {
    document: Value,
}

impl From<&FlowInvocation> for InvokeFlowRequest {
    fn from(inv: &FlowInvocation) -> Self {
        Self {
            inputs: inv.inputs.iter().map(WireInput::from).collect(),
            enable_trace: inv.enable_trace,
        }
    }
}

impl From<&FlowInput> for WireInput {
    fn from(input: &FlowInput) -> Self {
        Self {
            content: WireContent {
                document: Value::String(input.document.clone()),
            },
            node_name: input.node_name.clone(),
            node_output_name: input.node_output_name.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTraceEvent {
    trace: WireTrace,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTrace {
    node_input_trace: Option<WireNodeTrace>,
    node_output_trace: Option<WireNodeTrace>,
    condition_node_result_trace: Option<WireConditionTrace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNodeTrace {
    node_name: String,
    #[serde(default)]
    fields: Vec<WireField>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireField {
    #[serde(alias = "nodeOutputName")]
    node_input_name: String,
    content: WireContent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConditionTrace {
    node_name: String,
    #[serde(default)]
    satisfied_conditions: Vec<WireCondition>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCondition {
    condition_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOutputEvent {
    node_name: String,
    content: WireContent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCompletionEvent {
    completion_reason: CompletionReason,
}

/// Document content as text. Non-string documents are kept as compact JSON.
fn document_text(doc: Value) -> String {
    match doc {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn malformed(kind: &str, e: serde_json::Error) -> AdvisorError {
    AdvisorError::Stream(format!("malformed {}: {}", kind, e))
}

/// Decode one stream item.
///
/// Returns `Ok(None)` for members that carry nothing to render (other trace
/// kinds, unknown members), `Err(Service)` for a service exception and
/// `Err(Stream)` for undecodable JSON.
pub fn decode_event(value: Value) -> Result<Option<FlowEvent>> {
    let members = match value {
        Value::Object(members) => members,
        other => {
            return Err(AdvisorError::Stream(format!(
                "expected an event object, got {}",
                other
            )))
        }
    };

    for (name, body) in members {
        match name.as_str() {
            "flowTraceEvent" => {
                let ev: WireTraceEvent =
                    serde_json::from_value(body).map_err(|e| malformed("trace event", e))?;
                return Ok(decode_trace(ev.trace));
            }
            "flowOutputEvent" => {
                let ev: WireOutputEvent =
                    serde_json::from_value(body).map_err(|e| malformed("output event", e))?;
                return Ok(Some(FlowEvent::Output {
                    node_name: ev.node_name,
                    document: document_text(ev.content.document),
                }));
            }
            "flowCompletionEvent" => {
                let ev: WireCompletionEvent =
                    serde_json::from_value(body).map_err(|e| malformed("completion event", e))?;
                return Ok(Some(FlowEvent::Completion {
                    reason: ev.completion_reason,
                }));
            }
            kind if kind.ends_with("Exception") => {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("no message")
                    .to_string();
                return Err(AdvisorError::Service {
                    kind: kind.to_string(),
                    message,
                });
            }
            other => debug!(member = %other, "Ignoring stream member"),
        }
    }
    Ok(None)
}

/// True for the member names a stream item can carry.
fn is_member(name: &str) -> bool {
    matches!(
        name,
        "flowTraceEvent" | "flowOutputEvent" | "flowCompletionEvent"
    ) || name.ends_with("Exception")
}

/// Decode one stream item from JSON text.
///
/// When the SSE event name is itself a member name and the payload is not
/// already keyed by a member, the payload is wrapped under that name. Other
/// event names (such as the default `message`) leave the payload as is.
pub fn decode_text(event_type: Option<&str>, data: &str) -> Result<Option<FlowEvent>> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| malformed("stream item", e))?;
    let wrapped_already = value
        .as_object()
        .map_or(false, |members| members.keys().any(|k| is_member(k)));
    let value = match event_type {
        Some(kind) if is_member(kind) && !wrapped_already => {
            let mut wrapped = serde_json::Map::new();
            wrapped.insert(kind.to_string(), value);
            Value::Object(wrapped)
        }
        _ => value,
    };
    decode_event(value)
}

/// Decode one line of a recorded stream.
///
/// Accepts either a wire-format stream item or a serialized `FlowEvent`
/// (an object with an `event` tag). Blank lines decode to `None`.
pub fn decode_line(line: &str) -> Result<Option<FlowEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(line).map_err(|e| malformed("recorded line", e))?;
    if value.get("event").map_or(false, Value::is_string) {
        let event: FlowEvent =
            serde_json::from_value(value).map_err(|e| malformed("recorded event", e))?;
        return Ok(Some(event));
    }
    decode_event(value)
}

fn fields(wire: Vec<WireField>) -> Vec<TraceField> {
    wire.into_iter()
        .map(|f| TraceField::new(f.node_input_name, document_text(f.content.document)))
        .collect()
}

fn decode_trace(trace: WireTrace) -> Option<FlowEvent> {
    let event = if let Some(t) = trace.node_input_trace {
        TraceEvent::NodeInput {
            node_name: t.node_name,
            fields: fields(t.fields),
            timestamp: t.timestamp,
        }
    } else if let Some(t) = trace.node_output_trace {
        TraceEvent::NodeOutput {
            node_name: t.node_name,
            fields: fields(t.fields),
            timestamp: t.timestamp,
        }
    } else if let Some(t) = trace.condition_node_result_trace {
        TraceEvent::ConditionResult {
            node_name: t.node_name,
            satisfied_conditions: t
                .satisfied_conditions
                .into_iter()
                .map(|c| c.condition_name)
                .collect(),
            timestamp: t.timestamp,
        }
    } else {
        debug!("Ignoring trace of unhandled kind");
        return None;
    };
    Some(FlowEvent::Trace(event))
}
