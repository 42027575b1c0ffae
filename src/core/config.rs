//! # Runner Configuration Module / 运行器配置模块
//!
//! The configuration surface the runner accepts, with its TOML loading
//! helper. Every field has a default so partial files (and `Default`)
//! always produce a usable configuration.
//!
//! 运行器接受的配置项及其 TOML 加载辅助函数。
//! 每个字段都有默认值，部分文件（以及 `Default`）总能产生可用配置。

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// The default per-test execution window, in milliseconds.
/// 默认的单测试执行时间窗口（毫秒）。
pub const DEFAULT_TIMEOUT_MS: u64 = 750;

/// Runner configuration.
/// 运行器配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// The per-test window in milliseconds, spanning set-up through
    /// tear-down. A test that has not settled when it expires is marked as
    /// a timeout.
    /// 单个测试的时间窗口（毫秒），覆盖从 set-up 到 tear-down。
    /// 窗口到期仍未结束的测试记为超时。
    pub timeout_ms: u64,
    /// If `true`, a test that throws nothing but records zero assertions
    /// is classified as a failure.
    /// 若为 `true`，未抛出任何错误但断言数为零的测试归类为失败。
    pub fail_on_no_assertions: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fail_on_no_assertions: false,
        }
    }
}

impl RunConfig {
    /// The per-test window as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Loads a [`RunConfig`] from a TOML file.
/// 从 TOML 文件加载 [`RunConfig`]。
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read runner config from {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse runner config at {}", path.display()))?;
    Ok(config)
}
