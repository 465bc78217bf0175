use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};

use advisor_core::config::FlowConfig;
use advisor_core::error::{AdvisorError, Result};
use advisor_core::traits::FlowTransport;
use advisor_core::types::{FlowEvent, FlowInvocation};

/// One step of a scripted response stream.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Event(FlowEvent),
    /// Yield a transport error.
    Fail(String),
    /// Stop yielding without closing the stream.
    Hang,
}

/// An in-memory `FlowTransport` that replays a fixed script on every invocation
/// and records the invocations it received.
pub struct ScriptedTransport {
    script: Vec<ScriptItem>,
    open_error: Option<String>,
    invocations: Mutex<Vec<FlowInvocation>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<ScriptItem>) -> Self {
        Self {
            script,
            open_error: None,
            invocations: Mutex::new(vec![]),
        }
    }

    /// Replay `events` and close the stream.
    pub fn with_events(events: Vec<FlowEvent>) -> Self {
        Self::new(events.into_iter().map(ScriptItem::Event).collect())
    }

    /// Fail every invocation before a stream is opened.
    pub fn failing(message: &str) -> Self {
        Self {
            script: vec![],
            open_error: Some(message.to_string()),
            invocations: Mutex::new(vec![]),
        }
    }

    pub fn invocations(&self) -> Vec<FlowInvocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl FlowTransport for ScriptedTransport {
    fn invoke_flow(
        &self,
        _config: &FlowConfig,
        invocation: FlowInvocation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<FlowEvent>>>> {
        self.invocations.lock().unwrap().push(invocation);
        let script = self.script.clone();
        let open_error = self.open_error.clone();

        Box::pin(async move {
            if let Some(message) = open_error {
                return Err(AdvisorError::Transport(message));
            }

            let hangs = script.iter().any(|i| matches!(i, ScriptItem::Hang));
            let items: Vec<Result<FlowEvent>> = script
                .into_iter()
                .take_while(|i| !matches!(i, ScriptItem::Hang))
                .map(|i| match i {
                    ScriptItem::Event(e) => Ok(e),
                    ScriptItem::Fail(m) => Err(AdvisorError::Transport(m)),
                    ScriptItem::Hang => unreachable!(),
                })
                .collect();

            let tail: BoxStream<'_, Result<FlowEvent>> = if hangs {
                stream::pending().boxed()
            } else {
                stream::empty().boxed()
            };
            Ok(stream::iter(items).chain(tail).boxed())
        })
    }
}
