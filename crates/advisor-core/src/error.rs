use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    // Graph errors
    #[error("Invalid flow graph: {0}")]
    Graph(#[from] GraphError),

    // Transport errors
    #[error("Flow invocation failed: {0}")]
    Transport(String),

    #[error("Flow stream error: {0}")]
    Stream(String),

    #[error("Flow service exception: {kind}: {message}")]
    Service { kind: String, message: String },

    #[error("Flow session cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Whether this error ends the current session (as opposed to being
    /// structural and blocking execution before any session starts).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Stream(_) | Self::Service { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Category of a structural graph defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphErrorKind {
    /// Two nodes share a name.
    DuplicateNode,
    /// A node lacks the input or output ports its kind requires.
    MissingPort,
    /// Zero or more than one Input node.
    MissingInput,
    /// An edge or prompt variable references a port, node or condition that is not declared.
    UnknownPort,
    /// A non-Input node, or one of its input ports, is not fed by any edge.
    DanglingNode,
    /// A Condition node's branches are not all covered by outgoing edges.
    UncoveredCondition,
    /// The graph contains a cycle.
    Cycle,
    /// A terminal node is not an Output node.
    DeadEnd,
}

impl fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DuplicateNode => "duplicate node",
            Self::MissingPort => "missing port",
            Self::MissingInput => "missing input",
            Self::UnknownPort => "unknown port",
            Self::DanglingNode => "dangling node",
            Self::UncoveredCondition => "uncovered condition",
            Self::Cycle => "cycle",
            Self::DeadEnd => "dead end",
        };
        f.write_str(name)
    }
}

/// Structural error found while validating a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub detail: String,
}

impl GraphError {
    pub fn new(kind: GraphErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Condition input that could not be evaluated. Routed to the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("condition node '{node}' received no input")]
    MissingInput { node: String },

    #[error("condition node '{node}' is not a Condition node")]
    NotACondition { node: String },

    #[error("condition '{condition}' on node '{node}' has an unsupported expression: {expression}")]
    UnsupportedExpression {
        node: String,
        condition: String,
        expression: String,
    },
}

/// A node's output could not be decoded into the shape its role expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error processing {node}: {message}")]
pub struct PayloadParseError {
    pub node: String,
    pub raw: String,
    pub message: String,
}
