pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{AdvisorError, GraphError, GraphErrorKind, PayloadParseError, Result, RouteError};
pub use types::*;
