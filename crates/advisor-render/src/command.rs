use advisor_core::error::PayloadParseError;
use advisor_core::types::CompletionReason;

use crate::payload::{FinancialAnalysis, PortfolioSuggestion, RiskAnalysis};

/// A display instruction produced by the interpreter.
///
/// Commands are front-end agnostic: the terminal renderer in the binary is
/// one consumer, tests compare command sequences directly.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Start of a node's section.
    Header {
        label: &'static str,
        title: &'static str,
    },
    FinancialAnalysis(FinancialAnalysis),
    Portfolio(PortfolioSuggestion),
    RiskScenarios(RiskAnalysis),
    /// Final report; `highlights` lists its `{placeholder}` spans.
    Report {
        markdown: String,
        highlights: Vec<String>,
    },
    /// The reflection rejected the analysis.
    ReviewFailed { explanation: String },
    /// Raw prompt text of a prompt-output node.
    PromptText { text: String },
    /// A node's output could not be decoded; rendering continues.
    NodeError(PayloadParseError),
    /// The runtime ended the stream.
    Completed { reason: CompletionReason },
}

impl RenderCommand {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::NodeError(_))
    }
}
