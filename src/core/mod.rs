//! 核心层：错误类型、服务装配、优雅关闭

pub mod builder;
pub mod error;
pub mod shutdown;

pub use builder::{Capabilities, ServiceBuilder, REQUIRED_TOOLS};
pub use error::{ConfigError, DegradedReason, JobError, StoreError, ToolError};
pub use shutdown::{ShutdownManager, ShutdownReason};
