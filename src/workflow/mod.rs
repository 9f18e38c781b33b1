pub mod engine;
pub mod registry;
pub mod types;

pub use engine::{read_record, write_record, WorkflowEngine};
pub use registry::WorkflowKind;
pub use types::*;
