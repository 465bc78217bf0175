pub mod command;
pub mod interpreter;
pub mod payload;
pub mod role;

pub use command::RenderCommand;
pub use interpreter::{Interpreter, RenderState};
pub use role::NodeRole;
