//! Shared test utilities for advisor crates.

pub mod transport;

use std::path::PathBuf;

use tempfile::TempDir;

use advisor_core::config::{FlowConfig, FlowResources};
use advisor_core::types::{FlowEvent, InvestorProfile, TraceEvent};
use advisor_flow::simulate::simulate;
use advisor_flow::topology::{investment_advisor, names};

pub use transport::{ScriptItem, ScriptedTransport};

pub const FINANCIAL_ANALYSIS: &str = r#"{
  "risk_profile": "Aggressive",
  "risk_profile_reason": "Five to ten years of stock experience and a one year horizon.",
  "required_annual_return_rate": 40.0,
  "return_rate_reason": "(70000 - 50000) / 50000 * 100 = 40%"
}"#;

pub const PORTFOLIO: &str = r#"{
  "portfolio_allocation": {"QQQ": 50, "SPY": 30, "GLD": 20},
  "strategy": "Growth-oriented core with a gold hedge.",
  "reason": "Technology exposure drives the return target."
}"#;

pub const RISK: &str = r#"{
  "scenario1": {
    "name": "Rate hike",
    "description": "Persistent inflation forces further hikes.",
    "allocation_management": {"QQQ": 35, "SPY": 35, "GLD": 30},
    "reason": "Reduce duration-sensitive growth exposure."
  },
  "scenario2": {
    "name": "Soft landing",
    "description": "Inflation cools without recession.",
    "allocation_management": {"QQQ": 60, "SPY": 30, "GLD": 10},
    "reason": "Lean into growth."
  }
}"#;

pub const REPORT: &str = "# Investment Report\n\nTarget return {40%} through {QQQ}, {SPY} and {GLD}.";

/// The profile used across end-to-end tests: $50,000 aiming for $70,000.
pub fn sample_profile() -> InvestorProfile {
    InvestorProfile {
        total_investable_amount: 50000.0,
        age: "30-34 years".into(),
        stock_investment_experience_years: "5-10 years".into(),
        target_amount: 70000.0,
    }
}

pub fn sample_flow_config() -> FlowConfig {
    FlowConfig {
        endpoint: Some("http://127.0.0.1:9".into()),
        flow_id: "FLOWTEST01".into(),
        flow_alias_id: "ALIASTEST1".into(),
        api_key: None,
        region: "us-east-1".into(),
        enable_trace: true,
        timeout_secs: 5,
        resources: FlowResources::default(),
    }
}

/// The event stream the runtime would send for the sample profile, with the
/// reflection answering `reflection`.
pub fn advisor_events(reflection: &str) -> Vec<FlowEvent> {
    let graph = investment_advisor(&FlowResources::default()).expect("topology is valid");
    let document = sample_profile().to_document().expect("profile serializes");
    simulate(&graph, &document, |node, _| {
        match node.name.as_str() {
            names::FINANCIAL_ANALYST => FINANCIAL_ANALYSIS,
            names::FINANCIAL_ANALYST_REFLECTION => reflection,
            names::PORTFOLIO_ARCHITECT => PORTFOLIO,
            names::RISK_MANAGER => RISK,
            names::REPORT_GENERATOR => REPORT,
            _ => "",
        }
        .to_string()
    })
}

pub fn node_output(node: &str, document: &str) -> FlowEvent {
    FlowEvent::Trace(TraceEvent::node_output(node, names::MODEL_COMPLETION, document))
}

pub fn node_input(node: &str, document: &str) -> FlowEvent {
    FlowEvent::Trace(TraceEvent::node_input(node, names::DOCUMENT, document))
}

/// Names of the nodes that appear in `events`, deduplicated in order.
pub fn traced_nodes(events: &[FlowEvent]) -> Vec<String> {
    let mut names: Vec<String> = vec![];
    for event in events {
        if let FlowEvent::Trace(t) = event {
            if !names.iter().any(|n| n == t.node_name()) {
                names.push(t.node_name().to_string());
            }
        }
    }
    names
}

/// Write `content` to `advisor.toml` in a fresh temp dir.
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("advisor.toml");
    std::fs::write(&path, content).expect("write config");
    (dir, path)
}
