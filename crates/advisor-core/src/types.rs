use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one flow invocation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Investor information submitted at the `start` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    /// Total investable amount in USD.
    pub total_investable_amount: f64,
    /// Age bracket, e.g. "30-34 years".
    pub age: String,
    /// Stock investment experience bracket, e.g. "5-10 years".
    pub stock_investment_experience_years: String,
    /// Target amount after one year in USD.
    pub target_amount: f64,
}

impl InvestorProfile {
    /// Serialize to the document text the flow's input node emits.
    pub fn to_document(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A document injected into the flow at a node's output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInput {
    pub node_name: String,
    pub node_output_name: String,
    pub document: String,
}

/// A single-shot flow invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInvocation {
    pub inputs: Vec<FlowInput>,
    pub enable_trace: bool,
}

/// One named port value carried by a trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceField {
    /// Input or output port name.
    pub name: String,
    /// Document content flowing through the port.
    pub document: String,
}

impl TraceField {
    pub fn new(name: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document: document.into(),
        }
    }
}

/// Per-node trace notification streamed by the flow runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A node consumed its inputs.
    NodeInput {
        node_name: String,
        fields: Vec<TraceField>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// A node produced its outputs.
    NodeOutput {
        node_name: String,
        fields: Vec<TraceField>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// A condition node resolved its branch.
    ConditionResult {
        node_name: String,
        satisfied_conditions: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl TraceEvent {
    pub fn node_input(node_name: impl Into<String>, port: &str, document: impl Into<String>) -> Self {
        Self::NodeInput {
            node_name: node_name.into(),
            fields: vec![TraceField::new(port, document)],
            timestamp: None,
        }
    }

    pub fn node_output(node_name: impl Into<String>, port: &str, document: impl Into<String>) -> Self {
        Self::NodeOutput {
            node_name: node_name.into(),
            fields: vec![TraceField::new(port, document)],
            timestamp: None,
        }
    }

    pub fn node_name(&self) -> &str {
        match self {
            Self::NodeInput { node_name, .. }
            | Self::NodeOutput { node_name, .. }
            | Self::ConditionResult { node_name, .. } => node_name,
        }
    }

    /// The first field's document, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::NodeInput { fields, .. } | Self::NodeOutput { fields, .. } => {
                fields.first().map(|f| f.document.as_str())
            }
            Self::ConditionResult { .. } => None,
        }
    }
}

/// Why the flow runtime ended the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionReason {
    Success,
    InputRequired,
    #[serde(other)]
    Unknown,
}

/// An item of the invocation response stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    Trace(TraceEvent),
    /// A document reached an Output node.
    Output {
        node_name: String,
        document: String,
    },
    Completion {
        reason: CompletionReason,
    },
}
