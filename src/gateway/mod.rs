//! 任务网关
//!
//! - **service**: 提交 / 状态 / 结果三个操作
//! - **supervisor**: 后台执行与 panic 兜底
//! - **http**: axum 路由与错误映射

pub mod http;
pub mod service;
pub mod supervisor;

pub use http::{router, ApiError, SubmitRequest};
pub use service::{JobGateway, ResultResponse, StatusResponse, SubmitResponse, REPORT_NOT_FOUND};
pub use supervisor::JobSupervisor;
