//! # Core Module / 核心模块
//!
//! This module contains the core functionality of the engine: the shared
//! data models, the awaitable primitive, the context model, the filter,
//! and the test execution engine itself.
//!
//! 此模块包含引擎的核心功能：共享数据模型、awaitable 原语、
//! 上下文模型、过滤器以及测试执行引擎本身。

pub mod assertions;
pub mod awaitable;
pub mod config;
pub mod context;
pub mod execution;
pub mod filter;
pub mod models;

// Re-exports
pub use config::RunConfig;
pub use context::Context;
pub use execution::Runner;
pub use models::{Event, RunStats};
