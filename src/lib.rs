//! # Context Runner Library / Context Runner 库
//!
//! This library provides an embeddable test-execution engine: a tree of
//! named test groups with inheritable set-up/tear-down hooks is run to
//! completion — every test exactly once, in a deterministic order, with
//! failure isolation, cooperative async test bodies, per-test timeouts,
//! and a strictly ordered event stream describing what happened.
//!
//! 此库提供可嵌入的测试执行引擎：
//! 运行带有可继承 set-up/tear-down 钩子的命名测试组树——
//! 每个测试恰好执行一次、顺序确定、失败相互隔离、
//! 支持协作式异步测试主体与单测试超时，
//! 并发出描述执行过程的严格有序事件流。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, the awaitable primitive, the context model,
//!   the filter, and the execution engine
//! - `reporting` - The reporter contract and the console reporter
//! - `driver` - Thin orchestration: definitions in, statistics out
//!
//! - `core` - 数据模型、awaitable 原语、上下文模型、过滤器与执行引擎
//! - `reporting` - 报告器契约与控制台报告器
//! - `driver` - 轻薄编排：输入定义，输出统计

pub mod core;
pub mod driver;
pub mod reporting;

// Re-export commonly used items
pub use self::core::assertions::{AssertionCounter, AssertionFailure};
pub use self::core::awaitable::{Awaitable, Completion, Eventual};
pub use self::core::config::RunConfig;
pub use self::core::context::{Context, Entry, GroupBuilder, HookNames, TestBody, TestEnv};
pub use self::core::execution::{RunError, Runner};
pub use self::core::filter::Predicate;
pub use self::core::models::{Event, Fault, LogLevel, RunStats};
pub use self::driver::Suite;
pub use self::reporting::{ConsoleReporter, Reporter};
