pub mod executor;
pub mod notify;
pub mod registry;
pub mod search;

pub use executor::ToolExecutor;
pub use notify::NotifyTool;
pub use registry::{Tool, ToolRegistry};
pub use search::{parse_atom_entries, Paper, SearchTool};

/// 阶段依赖的工具名
pub const SEARCH_TOOL: &str = "search";
pub const NOTIFY_TOOL: &str = "notify";
