//! # Console Reporting Module / 控制台报告模块
//!
//! A console reporter: an indented tree of contexts and test outcomes
//! while the suite runs, and a colored summary once `suite:end` arrives.
//!
//! 控制台报告器：套件运行期间输出上下文与测试结果的缩进树，
//! `suite:end` 到达后输出彩色摘要。

use colored::*;
use std::time::Instant;

use crate::core::models::{Event, LogLevel};
use crate::reporting::Reporter;

/// Prints the event stream as an indented tree with one glyph per test
/// outcome, followed by a summary block.
///
/// ```text
/// calculator
///   ✓ adds two numbers
///   when negative
///     ✗ flips the sign
/// ```
pub struct ConsoleReporter {
    depth: usize,
    test_started: Option<Instant>,
    suite_started: Option<Instant>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            depth: 0,
            test_started: None,
            suite_started: None,
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    /// Elapsed time of the current test, shown only when it is slow
    /// enough to matter.
    fn timing(&self) -> String {
        match self.test_started {
            Some(started) => {
                let ms = started.elapsed().as_millis();
                if ms > 100 {
                    format!(" ({ms}ms)").dimmed().to_string()
                } else {
                    String::new()
                }
            }
            None => String::new(),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::SuiteStart => {
                self.suite_started = Some(Instant::now());
                println!();
            }
            Event::SuiteEnd(stats) => {
                let elapsed = self
                    .suite_started
                    .take()
                    .map(|started| format!(" ({:.3}s)", started.elapsed().as_secs_f64()))
                    .unwrap_or_default();
                println!();
                if stats.has_problems() {
                    println!("{}", "FAIL".red().bold());
                } else {
                    println!("{}", "PASS".green().bold());
                }
                println!("{}{}", stats, elapsed.dimmed());
            }
            Event::ContextStart { name } => {
                println!("{}{}", self.indent(), name.bold());
                self.depth += 1;
            }
            Event::ContextEnd { .. } => {
                self.depth = self.depth.saturating_sub(1);
            }
            Event::ContextUnsupported {
                context,
                unsupported,
            } => {
                println!(
                    "{}{} {} {}",
                    self.indent(),
                    "-".yellow(),
                    context.dimmed(),
                    format!("(unsupported: {})", unsupported.join(", ")).yellow()
                );
            }
            Event::TestStart { .. } => {
                self.test_started = Some(Instant::now());
            }
            Event::TestSetUp { .. } | Event::TestTearDown { .. } => {}
            Event::TestSuccess { name, .. } => {
                println!("{}{} {}{}", self.indent(), "✓".green(), name, self.timing());
            }
            Event::TestFailure { name, error } => {
                println!(
                    "{}{} {}{}",
                    self.indent(),
                    "✗".red(),
                    name.red(),
                    self.timing()
                );
                println!("{}  {}", self.indent(), error.to_string().red());
            }
            Event::TestError { name, error } => {
                println!(
                    "{}{} {}{}",
                    self.indent(),
                    "✗".red(),
                    name.red(),
                    self.timing()
                );
                println!("{}  {}", self.indent(), error.to_string().red());
            }
            Event::TestTimeout { name } => {
                println!(
                    "{}{} {}{}",
                    self.indent(),
                    "…".yellow(),
                    name.yellow(),
                    self.timing()
                );
            }
            Event::TestDeferred { name } => {
                println!("{}{} {}", self.indent(), "-".yellow(), name.dimmed());
            }
            Event::Log { level, message } => {
                let line = format!("[{level}] {message}");
                match level {
                    LogLevel::Error | LogLevel::Warn => {
                        println!("{}{}", self.indent(), line.yellow());
                    }
                    _ => println!("{}{}", self.indent(), line.dimmed()),
                }
            }
        }
    }
}
