use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use tracing::{debug, info};

use advisor_core::config::FlowConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::FlowTransport;
use advisor_core::types::{FlowEvent, FlowInvocation};

use crate::streaming::SseStream;
use crate::wire::{self, InvokeFlowRequest};

/// Flow transport over HTTPS.
///
/// Posts the invocation to `{endpoint}/flows/{flow_id}/aliases/{flow_alias_id}`
/// and reads the response as server-sent events whose data are wire-format
/// stream members. Authenticates with a bearer API key when one is configured;
/// SigV4 request signing is not supported, so deployments without API key
/// access need a signing proxy in front of the endpoint.
pub struct HttpFlowClient {
    http: Client,
}

impl HttpFlowClient {
    /// Create a client whose connection attempts give up after `connect_timeout`.
    /// The response stream itself has no deadline.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AdvisorError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        Self::new(Duration::from_secs(config.timeout_secs))
    }
}

/// Invocation URL for a deployed flow alias.
pub fn invoke_url(config: &FlowConfig) -> String {
    format!(
        "{}/flows/{}/aliases/{}",
        config.endpoint_url().trim_end_matches('/'),
        config.flow_id,
        config.flow_alias_id
    )
}

/// Decode a response body of server-sent events into flow events.
///
/// Items that carry nothing to render are skipped. The first error ends the
/// stream.
pub fn flow_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<FlowEvent>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut failed = false;
    SseStream::new(bytes)
        .map(|item| match item {
            Ok(event) => wire::decode_text(event.event_type.as_deref(), &event.data).transpose(),
            Err(e) => Some(Err(e)),
        })
        .take_while(move |item| {
            let open = !failed;
            failed |= matches!(item, Some(Err(_)));
            future::ready(open)
        })
        .filter_map(future::ready)
}

impl FlowTransport for HttpFlowClient {
    fn invoke_flow(
        &self,
        config: &FlowConfig,
        invocation: FlowInvocation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<FlowEvent>>>> {
        let url = invoke_url(config);
        let api_key = config.api_key.clone();

        Box::pin(async move {
            let body = InvokeFlowRequest::from(&invocation);

            let mut request = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .header("accept", "text/event-stream")
                .json(&body);
            if let Some(key) = api_key.as_deref() {
                request = request.bearer_auth(key);
            }

            debug!(url = %url, "Invoking flow");
            let response = request
                .send()
                .await
                .map_err(|e| AdvisorError::Transport(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(AdvisorError::Transport(format!(
                    "HTTP {}: {}",
                    status, body
                )));
            }
            info!(status = %response.status(), "Flow stream opened");

            let event_stream = flow_events(response.bytes_stream());
            Ok(Box::pin(event_stream) as BoxStream<'_, Result<FlowEvent>>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::config::FlowResources;

    fn config(endpoint: &str) -> FlowConfig {
        FlowConfig {
            endpoint: Some(endpoint.into()),
            flow_id: "FLOW123".into(),
            flow_alias_id: "ALIAS456".into(),
            api_key: None,
            region: "us-east-1".into(),
            enable_trace: true,
            timeout_secs: 5,
            resources: FlowResources::default(),
        }
    }

    #[test]
    fn test_invoke_url() {
        assert_eq!(
            invoke_url(&config("https://runtime.example.com/")),
            "https://runtime.example.com/flows/FLOW123/aliases/ALIAS456"
        );

        let mut regional = config("");
        regional.endpoint = None;
        regional.region = "eu-central-1".into();
        assert_eq!(
            invoke_url(&regional),
            "https://bedrock-agent-runtime.eu-central-1.amazonaws.com/flows/FLOW123/aliases/ALIAS456"
        );
    }

    fn body(
        parts: Vec<std::result::Result<String, &'static str>>,
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, String>> + Unpin {
        futures::stream::iter(
            parts
                .into_iter()
                .map(|p| p.map(bytes::Bytes::from).map_err(String::from))
                .collect::<Vec<_>>(),
        )
    }

    const TRACE: &str = r#"{"flowTraceEvent":{"trace":{"nodeOutputTrace":{"nodeName":"FinancialAnalystReflection","fields":[{"nodeOutputName":"modelCompletion","content":{"document":"yes"}}]}}}}"#;

    #[tokio::test]
    async fn test_flow_events_from_chunked_body() {
        // CRLF split across chunks, a generic event name, and two events in one chunk
        let events: Vec<Result<FlowEvent>> = flow_events(body(vec![
            Ok(format!("event: message\r\ndata: {}\r\n\r", TRACE)),
            Ok("\nevent: flowTraceEvent\ndata: {\"trace\":{\"nodeActionTrace\":{\"nodeName\":\"x\"}}}\n\n".into()),
            Ok(concat!(
                "event: flowOutputEvent\ndata: {\"nodeName\":\"end\",\"content\":{\"document\":\"report\"}}\n\n",
                "event: flowCompletionEvent\ndata: {\"completionReason\":\"SUCCESS\"}\n\n",
            ).into()),
        ]))
        .collect()
        .await;

        let events: Vec<FlowEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], FlowEvent::Trace(t) if t.payload() == Some("yes")));
        assert_eq!(
            events[1],
            FlowEvent::Output {
                node_name: "end".into(),
                document: "report".into()
            }
        );
        assert!(matches!(events[2], FlowEvent::Completion { .. }));
    }

    #[tokio::test]
    async fn test_flow_events_stop_at_first_error() {
        let events: Vec<Result<FlowEvent>> = flow_events(body(vec![
            Ok("data: {oops\n\n".into()),
            Ok("event: flowCompletionEvent\ndata: {\"completionReason\":\"SUCCESS\"}\n\n".into()),
        ]))
        .collect()
        .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(AdvisorError::Stream(_))));

        let events: Vec<Result<FlowEvent>> = flow_events(body(vec![
            Err("connection reset"),
            Ok("event: flowCompletionEvent\ndata: {\"completionReason\":\"SUCCESS\"}\n\n".into()),
        ]))
        .collect()
        .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].as_ref().unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = HttpFlowClient::new(Duration::from_millis(500)).unwrap();
        let invocation = FlowInvocation {
            inputs: vec![],
            enable_trace: true,
        };
        let result = client
            .invoke_flow(&config("http://127.0.0.1:1"), invocation)
            .await;
        match result {
            Err(e) => assert!(e.is_transport(), "unexpected error {e}"),
            Ok(_) => panic!("expected a transport error"),
        }
    }
}
