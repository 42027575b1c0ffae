//! # Reporting Module / 报告模块
//!
//! Reporters are pure consumers of the runner's event stream; the engine
//! itself never formats or prints. This module defines the consumer
//! contract and ships a console reporter.
//!
//! 报告器是运行器事件流的纯消费者；引擎本身从不格式化或打印。
//! 此模块定义消费者契约并提供一个控制台报告器。

pub mod console;

// Re-export common reporting types
pub use console::ConsoleReporter;

use crate::core::models::Event;

/// A consumer of the runner's event stream. Implementations receive every
/// event, in emission order, on the runner's single logical thread.
pub trait Reporter {
    fn on_event(&mut self, event: &Event);
}
