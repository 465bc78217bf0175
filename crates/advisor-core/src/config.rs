use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AdvisorError, Result};

/// Top-level advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub flow: FlowConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Where and how to invoke the deployed flow.
///
/// The identifiers are assigned when the flow is deployed and are passed
/// explicitly to the executor; nothing reads them from process globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Base URL of the flow runtime. Derived from `region` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub flow_id: String,
    pub flow_alias_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_enable_trace")]
    pub enable_trace: bool,
    /// Connect timeout for the invocation request. The stream itself has no deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub resources: FlowResources,
}

/// Identifiers of the managed prompts and agents the topology wires together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResources {
    #[serde(default = "default_financial_analyst_prompt")]
    pub financial_analyst_prompt: String,
    #[serde(default = "default_reflection_prompt")]
    pub financial_analyst_reflection_prompt: String,
    #[serde(default = "default_report_generator_prompt")]
    pub report_generator_prompt: String,
    #[serde(default = "default_portfolio_architect_agent")]
    pub portfolio_architect_agent_alias: String,
    #[serde(default = "default_risk_manager_agent")]
    pub risk_manager_agent_alias: String,
}

impl Default for FlowResources {
    fn default() -> Self {
        Self {
            financial_analyst_prompt: default_financial_analyst_prompt(),
            financial_analyst_reflection_prompt: default_reflection_prompt(),
            report_generator_prompt: default_report_generator_prompt(),
            portfolio_architect_agent_alias: default_portfolio_architect_agent(),
            risk_manager_agent_alias: default_risk_manager_agent(),
        }
    }
}

/// Terminal rendering preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Render raw prompt text for prompt-output trace nodes.
    #[serde(default)]
    pub show_prompt_nodes: bool,
    /// Extract `{placeholder}` spans from the final report for highlighting.
    #[serde(default = "default_highlight_placeholders")]
    pub highlight_placeholders: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            show_prompt_nodes: false,
            highlight_placeholders: default_highlight_placeholders(),
        }
    }
}

fn default_region() -> String { "us-east-1".to_string() }
fn default_enable_trace() -> bool { true }
fn default_timeout_secs() -> u64 { 30 }
fn default_highlight_placeholders() -> bool { true }
fn default_financial_analyst_prompt() -> String { "financial_analyst".to_string() }
fn default_reflection_prompt() -> String { "financial_analyst_reflection".to_string() }
fn default_report_generator_prompt() -> String { "report_generator".to_string() }
fn default_portfolio_architect_agent() -> String { "portfolio_architect".to_string() }
fn default_risk_manager_agent() -> String { "risk_manager".to_string() }

impl FlowConfig {
    /// The configured endpoint, or the regional runtime endpoint.
    pub fn endpoint_url(&self) -> String {
        match self.endpoint.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("https://bedrock-agent-runtime.{}.amazonaws.com", self.region),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AdvisorError::ConfigNotFound(path.display().to_string()),
            _ => AdvisorError::Io(e),
        })?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| AdvisorError::Config(e.to_string()))?;
        config.check()?;
        debug!(path = %path.display(), flow_id = %config.flow.flow_id, "Loaded config");
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.flow.flow_id.trim().is_empty() {
            return Err(AdvisorError::Config("flow.flow_id must not be empty".into()));
        }
        if self.flow.flow_alias_id.trim().is_empty() {
            return Err(AdvisorError::Config(
                "flow.flow_alias_id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_ADVISOR_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_ADVISOR_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_ADVISOR_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_ADVISOR_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_ADVISOR_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let toml_str = r#"
[flow]
flow_id = "FLOW123"
flow_alias_id = "ALIAS456"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.flow.region, "us-east-1");
        assert!(config.flow.enable_trace);
        assert_eq!(config.flow.timeout_secs, 30);
        assert!(config.flow.api_key.is_none());
        assert_eq!(config.flow.resources.report_generator_prompt, "report_generator");
        assert!(!config.render.show_prompt_nodes);
        assert!(config.render.highlight_placeholders);
        assert_eq!(
            config.flow.endpoint_url(),
            "https://bedrock-agent-runtime.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_endpoint_follows_region() {
        let toml_str = r#"
[flow]
flow_id = "F"
flow_alias_id = "A"
region = "us-west-2"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.flow.endpoint.is_none());
        assert_eq!(
            config.flow.endpoint_url(),
            "https://bedrock-agent-runtime.us-west-2.amazonaws.com"
        );

        config.flow.endpoint = Some("https://proxy.example.com".into());
        assert_eq!(config.flow.endpoint_url(), "https://proxy.example.com");

        config.flow.endpoint = Some("  ".into());
        assert!(config.flow.endpoint_url().contains("us-west-2"));
    }

    #[test]
    fn test_resources_override() {
        let toml_str = r#"
[flow]
flow_id = "F"
flow_alias_id = "A"

[flow.resources]
portfolio_architect_agent_alias = "arn:aws:bedrock:us-east-1:123:agent-alias/PA/1"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.flow.resources.portfolio_architect_agent_alias,
            "arn:aws:bedrock:us-east-1:123:agent-alias/PA/1"
        );
        assert_eq!(config.flow.resources.risk_manager_agent_alias, "risk_manager");
    }

    #[test]
    fn test_empty_flow_id_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
[flow]
flow_id = " "
flow_alias_id = "A"
"#,
        )
        .unwrap();
        assert!(matches!(config.check(), Err(AdvisorError::Config(_))));
    }
}
