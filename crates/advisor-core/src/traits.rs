use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::FlowConfig;
use crate::error::Result;
use crate::types::{FlowEvent, FlowInvocation};

/// Opens one streaming invocation of a deployed flow.
///
/// The returned stream yields events in the order the runtime emits them.
/// An `Err` item is terminal: the session must not continue past it.
pub trait FlowTransport: Send + Sync + 'static {
    fn invoke_flow(
        &self,
        config: &FlowConfig,
        invocation: FlowInvocation,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<FlowEvent>>>>;
}
