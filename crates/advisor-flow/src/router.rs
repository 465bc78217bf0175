//! Conditional routing: decides which branch of a Condition node is live.
//!
//! Branch expressions have the form `<input> == "<literal>"` or
//! `<input> != "<literal>"` and compare the node's text input exactly
//! (case-sensitive, no trimming). Branches are tried in declaration order and
//! the first match wins. Anything that cannot be evaluated routes to the
//! default branch, so a malformed reflection never lets the pipeline continue.

use tracing::{debug, warn};

use advisor_core::error::RouteError;

use crate::graph::{ConditionBranch, Node, DEFAULT_BRANCH};

/// A parsed branch expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    Equals { input: String, literal: String },
    NotEquals { input: String, literal: String },
}

impl ConditionExpr {
    /// Parse `key == "value"` or `key != "value"`. Returns `None` for anything else.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();

        // Whichever operator appears first splits the expression
        let not_equals_first = match (expr.find("!="), expr.find("==")) {
            (Some(ne), Some(eq)) => ne < eq,
            (Some(_), None) => true,
            _ => false,
        };

        if not_equals_first {
            let (input, literal) = parse_operator(expr, "!=")?;
            Some(Self::NotEquals {
                input: input.to_string(),
                literal: literal.to_string(),
            })
        } else {
            let (input, literal) = parse_operator(expr, "==")?;
            Some(Self::Equals {
                input: input.to_string(),
                literal: literal.to_string(),
            })
        }
    }

    /// Name of the input port the expression reads.
    pub fn input(&self) -> &str {
        match self {
            Self::Equals { input, .. } | Self::NotEquals { input, .. } => input,
        }
    }

    pub fn evaluate(&self, value: &str) -> bool {
        match self {
            Self::Equals { literal, .. } => value == literal,
            Self::NotEquals { literal, .. } => value != literal,
        }
    }
}

/// Parse `key OP "value"`, returning (key, value). The literal must be quoted.
fn parse_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let (key, val) = expr.split_once(op)?;
    let key = key.trim();
    let val = val.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let literal = val.strip_prefix('"')?.strip_suffix('"')?;
    Some((key, literal))
}

/// The branch a Condition node selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub node: String,
    pub branch: String,
    pub is_default: bool,
}

impl Decision {
    fn fallback(node: &Node) -> Self {
        let branch = node
            .branches()
            .iter()
            .find(|b| b.is_default())
            .map(|b| b.name.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        Self {
            node: node.name.clone(),
            branch,
            is_default: true,
        }
    }
}

/// Evaluate a Condition node's branches against its single text input.
///
/// Returns the first guarded branch whose expression holds, or the default
/// branch when none does. Errors when the input is missing, the node is not a
/// Condition node, or a guard cannot be parsed.
pub fn evaluate_branch<'n>(
    node: &'n Node,
    input: Option<&str>,
) -> Result<&'n ConditionBranch, RouteError> {
    if !node.is_condition() {
        return Err(RouteError::NotACondition {
            node: node.name.clone(),
        });
    }
    let value = input.ok_or_else(|| RouteError::MissingInput {
        node: node.name.clone(),
    })?;
    let port = node.inputs.first().map(|p| p.name.as_str());

    for branch in node.branches() {
        let Some(expression) = &branch.expression else {
            continue;
        };
        let expr = ConditionExpr::parse(expression)
            .filter(|e| port.map_or(true, |p| p == e.input()))
            .ok_or_else(|| RouteError::UnsupportedExpression {
                node: node.name.clone(),
                condition: branch.name.clone(),
                expression: expression.clone(),
            })?;
        if expr.evaluate(value) {
            return Ok(branch);
        }
    }

    node.branches()
        .iter()
        .find(|b| b.is_default())
        .ok_or_else(|| RouteError::MissingInput {
            node: node.name.clone(),
        })
}

/// Route a Condition node, failing closed: any error selects the default branch.
pub fn route(node: &Node, input: Option<&str>) -> Decision {
    match evaluate_branch(node, input) {
        Ok(branch) => {
            debug!(node = %node.name, branch = %branch.name, "Condition routed");
            Decision {
                node: node.name.clone(),
                branch: branch.name.clone(),
                is_default: branch.is_default(),
            }
        }
        Err(e) => {
            warn!(node = %node.name, error = %e, "Condition could not be evaluated, taking default branch");
            Decision::fallback(node)
        }
    }
}
