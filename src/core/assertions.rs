//! # Assertion Collaborator Module / 断言协作模块
//!
//! The engine does not implement comparison logic; it only consumes a
//! pass-counter owned by whatever assertion layer the embedder injects.
//! This module defines that boundary: the counter handle the runner resets
//! at `test:start` and reads at settlement, and the distinguished panic
//! payload that classifies a test as a failure rather than an error.
//!
//! 引擎不实现比较逻辑，只消费嵌入方注入的断言层所拥有的通过计数器。
//! 此模块定义该边界：运行器在 `test:start` 重置并在结束时读取的计数器句柄，
//! 以及将测试归类为失败（而非错误）的特殊 panic 载荷。

use std::cell::Cell;
use std::fmt;
use std::panic;
use std::rc::Rc;

/// The distinguished panic payload for expected assertion failures.
/// Unwinding with any other payload classifies the test as an error.
///
/// 预期断言失败所使用的特殊 panic 载荷。
/// 携带其他载荷的展开会将测试归类为错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub message: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assertion failed: {}", self.message)
    }
}

/// Aborts the current test with an assertion failure.
/// 以断言失败中止当前测试。
pub fn fail(message: impl Into<String>) -> ! {
    panic::panic_any(AssertionFailure {
        message: message.into(),
    })
}

/// A shared pass-counter. The runner resets it when emitting `test:start`
/// and reads it at settlement; assertion layers increment it on every
/// passing check.
///
/// 共享的通过计数器。运行器在发出 `test:start` 时将其重置，
/// 在测试结束时读取；断言层在每次检查通过时递增。
#[derive(Debug, Clone, Default)]
pub struct AssertionCounter(Rc<Cell<u32>>);

impl AssertionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one passing assertion.
    pub fn pass(&self) {
        self.0.set(self.0.get() + 1);
    }

    /// Records a pass if `condition` holds, otherwise aborts the test with
    /// an assertion failure carrying `message`.
    pub fn that(&self, condition: bool, message: &str) {
        if condition {
            self.pass();
        } else {
            fail(message);
        }
    }

    pub fn reset(&self) {
        self.0.set(0);
    }

    pub fn count(&self) -> u32 {
        self.0.get()
    }
}
