pub mod executor;
pub mod http;
pub mod streaming;
pub mod wire;

pub use executor::{FlowExecutor, SessionOutcome};
pub use http::HttpFlowClient;
