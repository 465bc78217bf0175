pub mod graph;
pub mod router;
pub mod simulate;
pub mod topology;

pub use graph::{Edge, EdgeKind, FlowGraph, GraphDefinition, Node, NodeKind, PortType};
pub use router::{evaluate_branch, route, ConditionExpr, Decision};
pub use simulate::{simulate, simulate_with_outputs};
pub use topology::investment_advisor;
