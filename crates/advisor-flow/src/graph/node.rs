use serde::{Deserialize, Serialize};

/// Source expression used when an input port takes the whole incoming document.
pub const WHOLE_DOCUMENT: &str = "$.data";

/// Name of the implicit fallback branch on a Condition node.
pub const DEFAULT_BRANCH: &str = "default";

/// Data type carried by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// A named input a node consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    pub port_type: PortType,
    /// Selector applied to the incoming document.
    #[serde(default = "whole_document")]
    pub expression: String,
}

fn whole_document() -> String {
    WHOLE_DOCUMENT.to_string()
}

/// A named output a node produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPort {
    pub name: String,
    pub port_type: PortType,
}

/// Inference settings of a managed prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub model_id: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

/// Reference to a managed prompt template and the variables it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Prompt identifier or ARN.
    pub reference: String,
    /// Template variables; each must be fed by an input port of the same name.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub inference: Option<InferenceSettings>,
}

impl PromptTemplate {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            variables: vec![],
            inference: None,
        }
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_inference(mut self, inference: InferenceSettings) -> Self {
        self.inference = Some(inference);
        self
    }
}

/// One branch of a Condition node. `expression == None` marks the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionBranch {
    pub name: String,
    #[serde(default)]
    pub expression: Option<String>,
}

impl ConditionBranch {
    pub fn is_default(&self) -> bool {
        self.expression.is_none()
    }
}

/// What a node does when the runtime reaches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point; emits the invocation document.
    Input,
    /// Terminal; its input document becomes a flow output.
    Output,
    /// Invokes a managed prompt.
    Prompt { template: PromptTemplate },
    /// Invokes a managed agent through its alias.
    Agent { agent_alias: String },
    /// Selects one outgoing branch.
    Condition { branches: Vec<ConditionBranch> },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Prompt { .. } => "Prompt",
            Self::Agent { .. } => "Agent",
            Self::Condition { .. } => "Condition",
        }
    }
}

/// A node in the flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique name within the graph; trace events refer to nodes by it.
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
}

impl Node {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: vec![],
            outputs: vec![],
        }
    }

    pub fn input(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Input)
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Output)
    }

    pub fn prompt(name: impl Into<String>, template: PromptTemplate) -> Self {
        Self::with_kind(name, NodeKind::Prompt { template })
    }

    pub fn agent(name: impl Into<String>, agent_alias: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Agent {
                agent_alias: agent_alias.into(),
            },
        )
    }

    pub fn condition(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Condition { branches: vec![] })
    }

    /// Add an input port reading the whole incoming document.
    pub fn with_input(mut self, name: impl Into<String>, port_type: PortType) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            port_type,
            expression: whole_document(),
        });
        self
    }

    /// Add an output port.
    pub fn with_output(mut self, name: impl Into<String>, port_type: PortType) -> Self {
        self.outputs.push(OutputPort {
            name: name.into(),
            port_type,
        });
        self
    }

    /// Add a guarded branch. No-op on non-Condition nodes.
    pub fn with_branch(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        if let NodeKind::Condition { branches } = &mut self.kind {
            branches.push(ConditionBranch {
                name: name.into(),
                expression: Some(expression.into()),
            });
        }
        self
    }

    /// Add the fallback branch. No-op on non-Condition nodes.
    pub fn with_default_branch(mut self) -> Self {
        if let NodeKind::Condition { branches } = &mut self.kind {
            branches.push(ConditionBranch {
                name: DEFAULT_BRANCH.to_string(),
                expression: None,
            });
        }
        self
    }

    pub fn input_port(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_port(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Declared branches; empty for anything but a Condition node.
    pub fn branches(&self) -> &[ConditionBranch] {
        match &self.kind {
            NodeKind::Condition { branches } => branches,
            _ => &[],
        }
    }

    pub fn branch(&self, name: &str) -> Option<&ConditionBranch> {
        self.branches().iter().find(|b| b.name == name)
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, NodeKind::Output)
    }

    pub fn is_condition(&self) -> bool {
        matches!(self.kind, NodeKind::Condition { .. })
    }
}
