use advisor_flow::topology::names;

/// Display role of a traced node.
///
/// Trace events name nodes by their flow name; only nodes with a role are
/// rendered. The two prompt-output roles are emitted by the runtime for the
/// raw prompt text sent to the analyst models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    FinancialAnalyst,
    PortfolioArchitect,
    RiskManager,
    ReportGenerator,
    FinancialAnalystReflection,
    FinancialAnalystPrompt,
    FinancialAnalystReflectionPrompt,
}

impl NodeRole {
    pub const ALL: [NodeRole; 7] = [
        Self::FinancialAnalyst,
        Self::PortfolioArchitect,
        Self::RiskManager,
        Self::ReportGenerator,
        Self::FinancialAnalystReflection,
        Self::FinancialAnalystPrompt,
        Self::FinancialAnalystReflectionPrompt,
    ];

    pub fn from_node_name(name: &str) -> Option<Self> {
        Some(match name {
            names::FINANCIAL_ANALYST => Self::FinancialAnalyst,
            names::PORTFOLIO_ARCHITECT => Self::PortfolioArchitect,
            names::RISK_MANAGER => Self::RiskManager,
            names::REPORT_GENERATOR => Self::ReportGenerator,
            names::FINANCIAL_ANALYST_REFLECTION => Self::FinancialAnalystReflection,
            "financialAnalystPrompt" => Self::FinancialAnalystPrompt,
            "financialAnalystReflectionPrompt" => Self::FinancialAnalystReflectionPrompt,
            _ => return None,
        })
    }

    /// Who produced the section.
    pub fn label(self) -> &'static str {
        match self {
            Self::FinancialAnalyst => "Financial Analyst",
            Self::PortfolioArchitect => "Portfolio Architect",
            Self::RiskManager => "Risk Manager",
            Self::ReportGenerator => "Report Generator",
            Self::FinancialAnalystReflection => "Financial Analyst Reflection",
            Self::FinancialAnalystPrompt => "Financial Analyst Prompt",
            Self::FinancialAnalystReflectionPrompt => "Financial Analyst Reflection Prompt",
        }
    }

    /// Section title.
    pub fn title(self) -> &'static str {
        match self {
            Self::FinancialAnalyst => "Financial Analysis",
            Self::PortfolioArchitect => "Portfolio Design",
            Self::RiskManager => "Risk Analysis",
            Self::ReportGenerator => "Comprehensive Report",
            Self::FinancialAnalystReflection => "Financial Analysis Review",
            Self::FinancialAnalystPrompt => "Prompt Output",
            Self::FinancialAnalystReflectionPrompt => "Reflection Prompt Output",
        }
    }

    pub fn is_prompt_output(self) -> bool {
        matches!(
            self,
            Self::FinancialAnalystPrompt | Self::FinancialAnalystReflectionPrompt
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_roundtrip() {
        for role in NodeRole::ALL {
            let name = match role {
                NodeRole::FinancialAnalyst => "FinancialAnalyst",
                NodeRole::PortfolioArchitect => "PortfolioArchitect",
                NodeRole::RiskManager => "RiskManager",
                NodeRole::ReportGenerator => "ReportGenerator",
                NodeRole::FinancialAnalystReflection => "FinancialAnalystReflection",
                NodeRole::FinancialAnalystPrompt => "financialAnalystPrompt",
                NodeRole::FinancialAnalystReflectionPrompt => "financialAnalystReflectionPrompt",
            };
            assert_eq!(NodeRole::from_node_name(name), Some(role));
        }
    }

    #[test]
    fn test_unrendered_nodes() {
        for name in ["start", "end", "end1", "ReflectionCondition", "financialanalyst"] {
            assert_eq!(NodeRole::from_node_name(name), None);
        }
    }

    #[test]
    fn test_titles() {
        assert_eq!(NodeRole::RiskManager.label(), "Risk Manager");
        assert_eq!(NodeRole::ReportGenerator.title(), "Comprehensive Report");
        assert!(NodeRole::FinancialAnalystPrompt.is_prompt_output());
        assert!(!NodeRole::FinancialAnalyst.is_prompt_output());
    }
}
