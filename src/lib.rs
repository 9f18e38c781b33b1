//! HPC Assistant - 自托管的研究/分析异步任务编排服务
//!
//! 客户端提交命名工作流与参数，立即拿到任务 ID；任务在后台按阶段执行
//! （检索报告 → 结构化建议 → 执行与通知），每个阶段的产物与任务状态都持久化，可随时查询。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、服务装配（Capabilities / ServiceBuilder）、优雅关闭
//! - **gateway**: 任务网关、后台监管者、HTTP 接口
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **phases**: Report / Suggest / Execute 阶段
//! - **storage**: 按任务寻址的产物存储（文件系统 / 内存）
//! - **tools**: 工具注册表与执行器（search、notify）
//! - **workflow**: 工作流注册表、任务状态机与执行引擎

pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod phases;
pub mod storage;
pub mod tools;
pub mod workflow;
