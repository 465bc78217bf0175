use advisor_core::config::AppConfig;
use advisor_flow::topology::investment_advisor;
use advisor_flow::FlowGraph;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Run all checks, print them, and return the number of issues found.
pub fn run_doctor(config: &AppConfig) -> usize {
    let checks = vec![
        check_flow_ids(config),
        check_api_key(config),
        check_endpoint(config),
        check_topology(config),
        check_trace(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count
}

fn check_flow_ids(config: &AppConfig) -> CheckResult {
    let unexpanded = [&config.flow.flow_id, &config.flow.flow_alias_id]
        .iter()
        .any(|id| id.contains("${"));
    CheckResult {
        label: "Flow".into(),
        ok: !unexpanded,
        detail: if unexpanded {
            "flow_id or flow_alias_id references an unset environment variable".into()
        } else {
            format!(
                "{} (alias {})",
                config.flow.flow_id, config.flow.flow_alias_id
            )
        },
    }
}

fn check_api_key(config: &AppConfig) -> CheckResult {
    let has_key = config
        .flow
        .api_key
        .as_ref()
        .map_or(false, |k| !k.is_empty() && !k.starts_with("${"));

    CheckResult {
        label: "API Key".into(),
        ok: has_key,
        detail: if has_key {
            "Configured".into()
        } else {
            "No API key set; requests go out unauthenticated".into()
        },
    }
}

fn check_endpoint(config: &AppConfig) -> CheckResult {
    let endpoint = config.flow.endpoint_url();
    let ok = endpoint.starts_with("https://");
    CheckResult {
        label: "Endpoint".into(),
        ok,
        detail: if ok {
            endpoint
        } else {
            format!("'{}' is not an https URL", endpoint)
        },
    }
}

fn check_topology(config: &AppConfig) -> CheckResult {
    match investment_advisor(&config.flow.resources) {
        Ok(graph) => CheckResult {
            label: "Topology".into(),
            ok: true,
            detail: summary(&graph),
        },
        Err(e) => CheckResult {
            label: "Topology".into(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

fn check_trace(config: &AppConfig) -> CheckResult {
    CheckResult {
        label: "Tracing".into(),
        ok: config.flow.enable_trace,
        detail: if config.flow.enable_trace {
            "Trace events enabled".into()
        } else {
            "enable_trace is off; only the final output will be shown".into()
        },
    }
}

fn summary(graph: &FlowGraph) -> String {
    format!(
        "{} nodes, {} connections, valid",
        graph.nodes().len(),
        graph.edges().len()
    )
}
