//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures shared across the engine:
//! the fault payload carried by failure events, the strictly ordered event
//! stream emitted by the runner, and the suite-level statistics aggregate.
//!
//! 此模块定义了引擎共享的核心数据结构：
//! 失败事件携带的错误载荷、运行器发出的严格有序事件流，
//! 以及套件级别的统计聚合。

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use crate::core::assertions::AssertionFailure;

/// The name carried by faults of the distinguished assertion kind.
/// 断言类错误载荷所携带的名称。
pub const ASSERTION_FAULT_NAME: &str = "AssertionFailure";

/// A captured error, in the shape reporters receive: a kind name, a
/// human-readable message, and an optional backtrace rendering.
///
/// 捕获到的错误，采用报告器接收的形状：种类名称、
/// 可读消息以及可选的回溯文本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// The kind of the fault, e.g. `"AssertionFailure"` or `"Panic"`.
    /// 错误的种类，例如 `"AssertionFailure"` 或 `"Panic"`。
    pub name: String,
    /// The message describing what went wrong.
    /// 描述出错原因的消息。
    pub message: String,
    /// A rendered backtrace, when one was captured.
    /// 捕获到的回溯文本（如果有）。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Fault {
    /// Creates a fault with an arbitrary kind name.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Creates a fault of the distinguished assertion kind.
    /// 创建断言种类的错误。
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ASSERTION_FAULT_NAME, message)
    }

    /// Whether this fault classifies a test as a failure rather than an
    /// error.
    pub fn is_assertion_failure(&self) -> bool {
        self.name == ASSERTION_FAULT_NAME
    }

    /// Converts a payload recovered from `catch_unwind` into a fault.
    /// Assertion payloads keep their distinguished kind; everything else
    /// becomes a generic panic fault.
    ///
    /// 将 `catch_unwind` 恢复的载荷转换为错误。
    /// 断言载荷保留其特殊种类，其余一律视为普通 panic。
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<AssertionFailure>() {
            Ok(assertion) => return Self::assertion(assertion.message),
            Err(other) => other,
        };
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new("Panic", message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Severity attached to `log` events.
/// `log` 事件附带的严重级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// Suite-level aggregated counters, mutated only by the runner on its
/// single logical thread and published with `suite:end`.
///
/// 套件级别的聚合计数器，仅由运行器在其单一逻辑线程上修改，
/// 并随 `suite:end` 一起发布。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Contexts entered (unsupported contexts are not entered).
    /// 进入过的上下文数量（不受支持的上下文不计入）。
    pub contexts: u32,
    /// Tests that ran to a `success` or `failure` terminal.
    /// 以 `success` 或 `failure` 终态结束的测试数量。
    pub tests: u32,
    /// Assertions recorded across all executed tests.
    /// 所有已执行测试记录的断言总数。
    pub assertions: u32,
    /// Tests terminating with an unexpected error.
    /// 以意外错误终止的测试数量。
    pub errors: u32,
    /// Tests terminating with an assertion failure.
    /// 以断言失败终止的测试数量。
    pub failures: u32,
    /// Tests that exceeded their execution window.
    /// 超出执行时间窗口的测试数量。
    pub timeouts: u32,
    /// Tests declared without a body; their hooks never run.
    /// 未声明主体的测试；其钩子不会运行。
    pub deferred: u32,
}

impl RunStats {
    /// Whether any test ended in a failure, error, or timeout.
    pub fn has_problems(&self) -> bool {
        self.errors > 0 || self.failures > 0 || self.timeouts > 0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tests, {} assertions, {} failures, {} errors, {} timeouts, {} deferred",
            self.tests, self.assertions, self.failures, self.errors, self.timeouts, self.deferred
        )
    }
}

/// The event stream emitted by the runner, one variant per wire event.
/// Payload shapes are part of the external contract and must not grow
/// implicit fields.
///
/// 运行器发出的事件流，每个线上事件对应一个变体。
/// 载荷形状属于对外契约，不得隐式增加字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    #[serde(rename = "suite:start")]
    SuiteStart,
    #[serde(rename = "suite:end")]
    SuiteEnd(RunStats),
    #[serde(rename = "context:start")]
    ContextStart { name: String },
    #[serde(rename = "context:end")]
    ContextEnd { name: String },
    #[serde(rename = "context:unsupported")]
    ContextUnsupported {
        context: String,
        unsupported: Vec<String>,
    },
    #[serde(rename = "test:setUp")]
    TestSetUp { name: String, parent: String },
    #[serde(rename = "test:start")]
    TestStart { name: String, parent: String },
    #[serde(rename = "test:tearDown")]
    TestTearDown { name: String, parent: String },
    #[serde(rename = "test:success")]
    TestSuccess { name: String, assertions: u32 },
    #[serde(rename = "test:failure")]
    TestFailure { name: String, error: Fault },
    #[serde(rename = "test:error")]
    TestError { name: String, error: Fault },
    #[serde(rename = "test:timeout")]
    TestTimeout { name: String },
    #[serde(rename = "test:deferred")]
    TestDeferred { name: String },
    #[serde(rename = "log")]
    Log { level: LogLevel, message: String },
}

impl Event {
    /// The wire name of the event, as external consumers know it.
    /// 事件的线上名称，即外部消费者所认识的名称。
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SuiteStart => "suite:start",
            Event::SuiteEnd(_) => "suite:end",
            Event::ContextStart { .. } => "context:start",
            Event::ContextEnd { .. } => "context:end",
            Event::ContextUnsupported { .. } => "context:unsupported",
            Event::TestSetUp { .. } => "test:setUp",
            Event::TestStart { .. } => "test:start",
            Event::TestTearDown { .. } => "test:tearDown",
            Event::TestSuccess { .. } => "test:success",
            Event::TestFailure { .. } => "test:failure",
            Event::TestError { .. } => "test:error",
            Event::TestTimeout { .. } => "test:timeout",
            Event::TestDeferred { .. } => "test:deferred",
            Event::Log { .. } => "log",
        }
    }

    /// Whether this is one of the four per-test terminal events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::TestSuccess { .. }
                | Event::TestFailure { .. }
                | Event::TestError { .. }
                | Event::TestTimeout { .. }
        )
    }
}
