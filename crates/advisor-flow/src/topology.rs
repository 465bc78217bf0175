//! The investment-advisor flow.
//!
//! ```text
//! start ─> FinancialAnalyst ─> FinancialAnalystReflection ─> ReflectionCondition
//!   │            │                        │                    │ condition   │ default
//!   │            │                        └────────────────────┼──────────> end1
//!   │            ├───────────────────────────────────────> PortfolioArchitect
//!   │            │                                             │
//!   │            │                                         RiskManager
//!   └────────────┴───────────────> ReportGenerator <───────────┘ ─> end
//! ```
//!
//! Every analyst output is also fanned into `ReportGenerator` as a named input.

use advisor_core::config::FlowResources;
use advisor_core::error::GraphError;

use crate::graph::{
    Edge, FlowGraph, InferenceSettings, Node, PortType, PromptTemplate, DEFAULT_BRANCH,
};

/// Node, port and branch names of the investment-advisor flow.
pub mod names {
    pub const START: &str = "start";
    pub const FINANCIAL_ANALYST: &str = "FinancialAnalyst";
    pub const FINANCIAL_ANALYST_REFLECTION: &str = "FinancialAnalystReflection";
    pub const REFLECTION_CONDITION: &str = "ReflectionCondition";
    pub const PORTFOLIO_ARCHITECT: &str = "PortfolioArchitect";
    pub const RISK_MANAGER: &str = "RiskManager";
    pub const REPORT_GENERATOR: &str = "ReportGenerator";
    /// Early termination when the reflection rejects the analysis.
    pub const END_REJECTED: &str = "end1";
    pub const END: &str = "end";

    pub const DOCUMENT: &str = "document";
    pub const MODEL_COMPLETION: &str = "modelCompletion";
    pub const AGENT_INPUT: &str = "agentInputText";
    pub const AGENT_RESPONSE: &str = "agentResponse";
    pub const CONDITION_INPUT: &str = "conditionInput";

    pub const USER_INPUT: &str = "user_input";
    pub const FINANCE_RESULT: &str = "finance_result";
    pub const PORTFOLIO_RESULT: &str = "portfolio_result";
    pub const RISK_RESULT: &str = "risk_result";

    /// Branch taken when the reflection approves the analysis.
    pub const APPROVED: &str = "condition";
    /// Literal the reflection emits to approve.
    pub const APPROVAL: &str = "yes";
}

use names::*;

fn inference(model_id: &str, temperature: f32, top_p: f32) -> InferenceSettings {
    InferenceSettings {
        model_id: model_id.to_string(),
        temperature,
        top_p,
        max_tokens: 2000,
    }
}

/// Build and validate the investment-advisor flow from deployed resource identifiers.
pub fn investment_advisor(resources: &FlowResources) -> Result<FlowGraph, GraphError> {
    let nodes = vec![
        Node::input(START).with_output(DOCUMENT, PortType::String),
        Node::prompt(
            FINANCIAL_ANALYST,
            PromptTemplate::new(&resources.financial_analyst_prompt)
                .with_variables(&[USER_INPUT])
                .with_inference(inference("amazon.nova-pro-v1:0", 0.2, 0.9)),
        )
        .with_input(USER_INPUT, PortType::String)
        .with_output(MODEL_COMPLETION, PortType::String),
        Node::prompt(
            FINANCIAL_ANALYST_REFLECTION,
            PromptTemplate::new(&resources.financial_analyst_reflection_prompt)
                .with_variables(&[FINANCE_RESULT])
                .with_inference(inference(
                    "anthropic.claude-3-5-sonnet-20240620-v1:0",
                    0.2,
                    0.999,
                )),
        )
        .with_input(FINANCE_RESULT, PortType::String)
        .with_output(MODEL_COMPLETION, PortType::String),
        Node::output(END_REJECTED).with_input(DOCUMENT, PortType::String),
        Node::condition(REFLECTION_CONDITION)
            .with_input(CONDITION_INPUT, PortType::String)
            .with_branch(APPROVED, format!(r#"{CONDITION_INPUT} == "{APPROVAL}""#))
            .with_default_branch(),
        Node::agent(PORTFOLIO_ARCHITECT, &resources.portfolio_architect_agent_alias)
            .with_input(AGENT_INPUT, PortType::String)
            .with_output(AGENT_RESPONSE, PortType::String),
        Node::agent(RISK_MANAGER, &resources.risk_manager_agent_alias)
            .with_input(AGENT_INPUT, PortType::String)
            .with_output(AGENT_RESPONSE, PortType::String),
        Node::prompt(
            REPORT_GENERATOR,
            PromptTemplate::new(&resources.report_generator_prompt)
                .with_variables(&[USER_INPUT, FINANCE_RESULT, PORTFOLIO_RESULT, RISK_RESULT])
                .with_inference(inference(
                    "anthropic.claude-3-haiku-20240307-v1:0",
                    0.3,
                    0.999,
                )),
        )
        .with_input(USER_INPUT, PortType::String)
        .with_input(FINANCE_RESULT, PortType::String)
        .with_input(PORTFOLIO_RESULT, PortType::String)
        .with_input(RISK_RESULT, PortType::String)
        .with_output(MODEL_COMPLETION, PortType::String),
        Node::output(END).with_input(DOCUMENT, PortType::String),
    ];

    let edges = vec![
        Edge::data("cStart", START, DOCUMENT, FINANCIAL_ANALYST, USER_INPUT),
        Edge::data(
            "cFinancialAnalyst",
            FINANCIAL_ANALYST,
            MODEL_COMPLETION,
            FINANCIAL_ANALYST_REFLECTION,
            FINANCE_RESULT,
        ),
        Edge::data(
            "cFinancialAnalystReflection",
            FINANCIAL_ANALYST_REFLECTION,
            MODEL_COMPLETION,
            REFLECTION_CONDITION,
            CONDITION_INPUT,
        ),
        Edge::data(
            "cFinancialAnalystReflection2",
            FINANCIAL_ANALYST_REFLECTION,
            MODEL_COMPLETION,
            END_REJECTED,
            DOCUMENT,
        ),
        Edge::conditional(
            "cReflectionConditionTrue",
            REFLECTION_CONDITION,
            PORTFOLIO_ARCHITECT,
            APPROVED,
        ),
        Edge::conditional(
            "cReflectionConditionFalse",
            REFLECTION_CONDITION,
            END_REJECTED,
            DEFAULT_BRANCH,
        ),
        Edge::data(
            "cFinancialAnalystToPortfolio",
            FINANCIAL_ANALYST,
            MODEL_COMPLETION,
            PORTFOLIO_ARCHITECT,
            AGENT_INPUT,
        ),
        Edge::data(
            "cPortfolioToRisk",
            PORTFOLIO_ARCHITECT,
            AGENT_RESPONSE,
            RISK_MANAGER,
            AGENT_INPUT,
        ),
        Edge::data("cStartToReport", START, DOCUMENT, REPORT_GENERATOR, USER_INPUT),
        Edge::data(
            "cFinancialToReport",
            FINANCIAL_ANALYST,
            MODEL_COMPLETION,
            REPORT_GENERATOR,
            FINANCE_RESULT,
        ),
        Edge::data(
            "cPortfolioToReport",
            PORTFOLIO_ARCHITECT,
            AGENT_RESPONSE,
            REPORT_GENERATOR,
            PORTFOLIO_RESULT,
        ),
        Edge::data(
            "cRiskToReport",
            RISK_MANAGER,
            AGENT_RESPONSE,
            REPORT_GENERATOR,
            RISK_RESULT,
        ),
        Edge::data("cReportToEnd", REPORT_GENERATOR, MODEL_COMPLETION, END, DOCUMENT),
    ];

    FlowGraph::new(nodes, edges)
}
