//! Typed shapes of the analyst outputs and lenient decoding of model text.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use advisor_core::error::PayloadParseError;

/// Investor risk category assigned by the financial analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskProfile {
    #[serde(rename = "Very Conservative")]
    VeryConservative,
    Conservative,
    Neutral,
    Aggressive,
    #[serde(rename = "Very Aggressive")]
    VeryAggressive,
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VeryConservative => "Very Conservative",
            Self::Conservative => "Conservative",
            Self::Neutral => "Neutral",
            Self::Aggressive => "Aggressive",
            Self::VeryAggressive => "Very Aggressive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAnalysis {
    pub risk_profile: RiskProfile,
    pub risk_profile_reason: String,
    /// Percent per year.
    pub required_annual_return_rate: f64,
    pub return_rate_reason: String,
}

/// Ticker to integer percent.
pub type Allocation = BTreeMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSuggestion {
    pub portfolio_allocation: Allocation,
    pub strategy: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub allocation_management: Allocation,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario1: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario2: Option<Scenario>,
}

impl RiskAnalysis {
    /// The scenarios present, with their 1-based number.
    pub fn scenarios(&self) -> Vec<(usize, &Scenario)> {
        [&self.scenario1, &self.scenario2]
            .into_iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i + 1, s)))
            .collect()
    }
}

/// Decode a node's output into `T`, tolerating code fences and raw control
/// characters inside string literals.
pub fn decode<T: DeserializeOwned>(node: &str, raw: &str) -> Result<T, PayloadParseError> {
    serde_json::from_str(&clean_json(raw)).map_err(|e| PayloadParseError {
        node: node.to_string(),
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

/// Normalize model output into strict JSON text.
pub fn clean_json(raw: &str) -> String {
    escape_control_chars(&strip_code_fences(raw))
}

/// Strip markdown code fences from text.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip optional language tag on same line
        let content_start = after.find('\n').map_or(0, |p| p + 1);
        let after = &after[content_start..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    trimmed.to_string()
}

/// Escape control characters that appear inside string literals.
fn escape_control_chars(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }
        if in_string && ch == '\\' {
            escape_next = true;
            result.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            result.push(ch);
            continue;
        }
        if in_string && (ch as u32) < 0x20 {
            match ch {
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                other => result.push_str(&format!("\\u{:04x}", other as u32)),
            }
            continue;
        }
        result.push(ch);
    }
    result
}

pub fn allocation_total(allocation: &Allocation) -> u32 {
    allocation.values().sum()
}

/// Warn when an allocation does not add up to 100 percent. Returns whether it does.
pub fn check_allocation(node: &str, context: &str, allocation: &Allocation) -> bool {
    let total = allocation_total(allocation);
    if total != 100 {
        warn!(node, context, total, "Allocation does not sum to 100%");
        return false;
    }
    true
}

/// Verdict the reflection emits when it accepts the analysis.
pub const APPROVAL: &str = advisor_flow::topology::names::APPROVAL;

/// Explanation attached to a rejected analysis, or `None` if the reflection approved it.
///
/// The verdict token at the start of the first line is dropped together with
/// any separator that follows it; everything after is the explanation.
pub fn reflection_explanation(payload: &str) -> Option<String> {
    if payload == APPROVAL {
        return None;
    }

    let rest = payload.trim_start();
    let token_len = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let token = &rest[..token_len];
    let rest = if token.eq_ignore_ascii_case("no") || token.eq_ignore_ascii_case("yes") {
        &rest[token_len..]
    } else {
        rest
    };
    let explanation = rest.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | '-' | ',' | '.')
    });
    Some(explanation.trim_end().to_string())
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// `{placeholder}` spans in a report, in order of appearance.
pub fn placeholders(report: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(report)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = r#"{
        "risk_profile": "Very Aggressive",
        "risk_profile_reason": "Long horizon and experience",
        "required_annual_return_rate": 40.0,
        "return_rate_reason": "(70000 - 50000) / 50000"
    }"#;

    #[test]
    fn test_decode_financial_analysis() {
        let a: FinancialAnalysis = decode("FinancialAnalyst", ANALYSIS).unwrap();
        assert_eq!(a.risk_profile, RiskProfile::VeryAggressive);
        assert_eq!(a.risk_profile.to_string(), "Very Aggressive");
        assert_eq!(a.required_annual_return_rate, 40.0);
    }

    #[test]
    fn test_decode_fenced_output() {
        let raw = format!("```json\n{}\n```", ANALYSIS);
        let a: FinancialAnalysis = decode("FinancialAnalyst", &raw).unwrap();
        assert_eq!(a.risk_profile, RiskProfile::VeryAggressive);
    }

    #[test]
    fn test_decode_raw_newline_in_string() {
        let raw = "{\"portfolio_allocation\": {\"QQQ\": 60, \"SPY\": 40}, \"strategy\": \"Growth\", \"reason\": \"line one\nline two\"}";
        let p: PortfolioSuggestion = decode("PortfolioArchitect", raw).unwrap();
        assert_eq!(p.reason, "line one\nline two");
        assert_eq!(allocation_total(&p.portfolio_allocation), 100);
    }

    #[test]
    fn test_decode_error_is_node_scoped() {
        let err = decode::<PortfolioSuggestion>("PortfolioArchitect", "{not json").unwrap_err();
        assert_eq!(err.node, "PortfolioArchitect");
        assert_eq!(err.raw, "{not json");
        assert!(err.to_string().starts_with("Error processing PortfolioArchitect: "));
    }

    #[test]
    fn test_unknown_risk_profile_rejected() {
        let raw = ANALYSIS.replace("Very Aggressive", "Reckless");
        assert!(decode::<FinancialAnalysis>("FinancialAnalyst", &raw).is_err());
    }

    #[test]
    fn test_escaped_sequences_untouched() {
        let raw = r#"{"a": "quote \" and \\n stays"}"#;
        assert_eq!(clean_json(raw), raw);
    }

    #[test]
    fn test_allocation_check() {
        let mut alloc = Allocation::new();
        alloc.insert("QQQ".into(), 50);
        alloc.insert("GLD".into(), 30);
        assert!(!check_allocation("RiskManager", "scenario1", &alloc));
        alloc.insert("SPY".into(), 20);
        assert!(check_allocation("RiskManager", "scenario1", &alloc));
    }

    #[test]
    fn test_reflection_explanation() {
        assert_eq!(reflection_explanation("yes"), None);
        assert_eq!(
            reflection_explanation("no\nRate exceeds 50%").as_deref(),
            Some("Rate exceeds 50%")
        );
        assert_eq!(
            reflection_explanation("no: Calculation error").as_deref(),
            Some("Calculation error")
        );
        assert_eq!(reflection_explanation("no").as_deref(), Some(""));
        assert_eq!(reflection_explanation("Yes").as_deref(), Some(""));
        assert_eq!(
            reflection_explanation("Return rate is wrong").as_deref(),
            Some("Return rate is wrong")
        );
        assert_eq!(
            reflection_explanation("no\nFirst issue\nSecond issue").as_deref(),
            Some("First issue\nSecond issue")
        );
    }

    #[test]
    fn test_placeholders() {
        let report = "Target return is {40%} with {QQQ} as the core.";
        assert_eq!(placeholders(report), vec!["40%", "QQQ"]);
        assert!(placeholders("no braces {}").is_empty());
    }
}
