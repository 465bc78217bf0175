use serde::{Deserialize, Serialize};

/// A connection between two nodes in the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Connection name, unique within the graph.
    pub name: String,
    /// Source node name.
    pub source: String,
    /// Target node name.
    pub target: String,
    pub kind: EdgeKind,
}

/// What travels along an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeKind {
    /// Carries the source port's document into the target port.
    Data {
        source_output: String,
        target_input: String,
    },
    /// Activates the target when the source Condition node selects `condition`.
    Conditional { condition: String },
}

impl Edge {
    /// Create a data edge `source.source_output -> target.target_input`.
    pub fn data(
        name: impl Into<String>,
        source: impl Into<String>,
        source_output: impl Into<String>,
        target: impl Into<String>,
        target_input: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Data {
                source_output: source_output.into(),
                target_input: target_input.into(),
            },
        }
    }

    /// Create a conditional edge taken when `source` selects `condition`.
    pub fn conditional(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Conditional {
                condition: condition.into(),
            },
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, EdgeKind::Data { .. })
    }

    /// The branch label, for conditional edges.
    pub fn condition(&self) -> Option<&str> {
        match &self.kind {
            EdgeKind::Conditional { condition } => Some(condition),
            EdgeKind::Data { .. } => None,
        }
    }

    /// The `(source_output, target_input)` pair, for data edges.
    pub fn ports(&self) -> Option<(&str, &str)> {
        match &self.kind {
            EdgeKind::Data {
                source_output,
                target_input,
            } => Some((source_output, target_input)),
            EdgeKind::Conditional { .. } => None,
        }
    }
}
