use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use advisor_client::{wire, FlowExecutor};
use advisor_core::config::{FlowResources, RenderConfig};
use advisor_core::types::{CompletionReason, FlowEvent, TraceEvent};
use advisor_flow::topology::{investment_advisor, names};
use advisor_render::{Interpreter, RenderCommand};
use advisor_test_utils::{
    advisor_events, node_output, sample_flow_config, sample_profile, traced_nodes, ScriptItem,
    ScriptedTransport,
};

fn executor(transport: Arc<ScriptedTransport>) -> FlowExecutor {
    let graph = investment_advisor(&FlowResources::default()).expect("topology validates");
    FlowExecutor::new(transport, sample_flow_config(), graph, RenderConfig::default())
}

#[tokio::test]
async fn test_approved_analysis_runs_the_full_pipeline() {
    let events = advisor_events("yes");
    let nodes = traced_nodes(&events);
    let reflection = nodes
        .iter()
        .position(|n| n == names::FINANCIAL_ANALYST_REFLECTION)
        .expect("reflection traced");
    let after: Vec<&str> = nodes[reflection + 1..]
        .iter()
        .map(String::as_str)
        .filter(|n| *n != names::REFLECTION_CONDITION)
        .collect();
    assert_eq!(after.first(), Some(&names::PORTFOLIO_ARCHITECT));
    assert!(!nodes.iter().any(|n| n == names::END_REJECTED));

    let transport = Arc::new(ScriptedTransport::with_events(events));
    let outcome = executor(transport.clone())
        .run(&sample_profile(), CancellationToken::new(), |_| {})
        .await
        .expect("session succeeds");

    let sent = transport.invocations();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].inputs[0].node_name, names::START);

    let titles: Vec<&str> = outcome
        .commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::Header { label, .. } => Some(*label),
            _ => None,
        })
        .collect();
    assert_eq!(
        titles,
        vec![
            "Financial Analyst",
            "Portfolio Architect",
            "Risk Manager",
            "Report Generator"
        ]
    );
    assert!(!outcome.commands.iter().any(RenderCommand::is_error));
    assert!(!outcome
        .commands
        .iter()
        .any(|c| matches!(c, RenderCommand::ReviewFailed { .. })));

    match outcome
        .commands
        .iter()
        .find(|c| matches!(c, RenderCommand::Report { .. }))
    {
        Some(RenderCommand::Report { highlights, .. }) => {
            assert_eq!(highlights, &vec!["40%", "QQQ", "SPY", "GLD"]);
        }
        other => panic!("expected a report, got {:?}", other),
    }

    assert_eq!(outcome.state.flow_outputs().len(), 1);
    assert_eq!(outcome.state.flow_outputs()[0].0, names::END);
    assert_eq!(outcome.state.completion(), Some(&CompletionReason::Success));
}

#[tokio::test]
async fn test_rejected_analysis_ends_early() {
    let events = advisor_events("no\nCalculation error");
    let nodes = traced_nodes(&events);
    assert!(nodes.iter().any(|n| n == names::END_REJECTED));
    for skipped in [
        names::PORTFOLIO_ARCHITECT,
        names::RISK_MANAGER,
        names::REPORT_GENERATOR,
        names::END,
    ] {
        assert!(!nodes.iter().any(|n| n == skipped), "{skipped} should not run");
    }

    let outcome = executor(Arc::new(ScriptedTransport::with_events(events)))
        .run(&sample_profile(), CancellationToken::new(), |_| {})
        .await
        .expect("session succeeds");

    assert!(outcome.commands.contains(&RenderCommand::ReviewFailed {
        explanation: "Calculation error".into()
    }));
    let decision = outcome
        .state
        .decision(names::REFLECTION_CONDITION)
        .expect("condition decided");
    assert!(decision.is_default);
    assert_eq!(outcome.state.flow_outputs()[0].0, names::END_REJECTED);
}

#[tokio::test]
async fn test_bad_portfolio_payload_does_not_stop_the_session() {
    let events: Vec<ScriptItem> = advisor_events("yes")
        .into_iter()
        .map(|event| {
            let portfolio_output = matches!(
                &event,
                FlowEvent::Trace(t @ TraceEvent::NodeOutput { .. })
                    if t.node_name() == names::PORTFOLIO_ARCHITECT
            );
            if portfolio_output {
                ScriptItem::Event(node_output(names::PORTFOLIO_ARCHITECT, "{not json"))
            } else {
                ScriptItem::Event(event)
            }
        })
        .collect();

    let outcome = executor(Arc::new(ScriptedTransport::new(events)))
        .run(&sample_profile(), CancellationToken::new(), |_| {})
        .await
        .expect("session succeeds");

    let errors: Vec<&RenderCommand> = outcome.commands.iter().filter(|c| c.is_error()).collect();
    assert_eq!(errors.len(), 1);
    match errors[0] {
        RenderCommand::NodeError(e) => assert_eq!(e.node, names::PORTFOLIO_ARCHITECT),
        other => panic!("unexpected {:?}", other),
    }
    assert!(outcome
        .commands
        .iter()
        .any(|c| matches!(c, RenderCommand::RiskScenarios(_))));
    assert!(outcome.completed());
}

#[tokio::test]
async fn test_recorded_session_replays_identically() {
    let events = advisor_events("yes");
    let outcome = executor(Arc::new(ScriptedTransport::with_events(events.clone())))
        .run(&sample_profile(), CancellationToken::new(), |_| {})
        .await
        .expect("session succeeds");

    // Record as JSON lines and read them back
    let recording: String = events
        .iter()
        .map(|e| serde_json::to_string(e).expect("event serializes") + "\n")
        .collect();
    let replayed: Vec<FlowEvent> = recording
        .lines()
        .filter_map(|line| wire::decode_line(line).expect("line decodes"))
        .collect();
    assert_eq!(replayed, events);

    let graph = Arc::new(investment_advisor(&FlowResources::default()).expect("topology"));
    let interpreter = Interpreter::new(RenderConfig::default()).with_graph(graph);
    let (first_state, first) = interpreter.replay(&replayed);
    let (second_state, second) = interpreter.replay(&replayed);

    assert_eq!(first, second);
    assert_eq!(first_state, second_state);
    assert_eq!(first, outcome.commands);
}
