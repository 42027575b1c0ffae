//! # Suite Driver Module / 套件驱动模块
//!
//! Thin orchestration around the engine: normalize heterogeneous
//! context-producing definitions into the root list the runner accepts,
//! apply the path filter, attach reporters, and run. Everything
//! substantive lives in `core`; this module only wires it together.
//!
//! 引擎外的轻薄编排：把不同风格的上下文定义归一为运行器接受的根列表，
//! 应用路径过滤，挂接报告器并运行。实质逻辑都在 `core` 中，
//! 此模块只负责拼装。

use std::rc::Rc;

use crate::core::config::RunConfig;
use crate::core::context::{Context, DefinitionError, Entry, GroupBuilder};
use crate::core::execution::{RunError, Runner};
use crate::core::filter::{Predicate, filter_context};
use crate::core::models::RunStats;
use crate::reporting::Reporter;

/// A collection of root contexts plus the configuration to run them with.
/// 一组根上下文及运行它们所需的配置。
pub struct Suite {
    config: RunConfig,
    predicate: Option<Predicate>,
    roots: Vec<Rc<Context>>,
    reporters: Vec<Box<dyn Reporter>>,
    error: Option<DefinitionError>,
}

impl Suite {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            predicate: None,
            roots: Vec::new(),
            reporters: Vec::new(),
            error: None,
        }
    }

    /// Adds an already-constructed root context.
    pub fn add_context(&mut self, context: Rc<Context>) -> &mut Self {
        self.roots.push(context);
        self
    }

    /// Adds a root context from an eager entry table. A definition error
    /// is remembered and surfaced by [`Suite::run`] before the suite
    /// starts.
    pub fn add_table(&mut self, name: impl Into<String>, entries: Vec<(String, Entry)>) -> &mut Self {
        match Context::from_entries(name, entries) {
            Ok(context) => self.roots.push(context),
            Err(error) => {
                if self.error.is_none() {
                    self.error = Some(error);
                }
            }
        }
        self
    }

    /// Adds a lazily built root context.
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        builder: impl FnOnce(&mut GroupBuilder) + 'static,
    ) -> &mut Self {
        match Context::lazy(name, builder) {
            Ok(context) => self.roots.push(context),
            Err(error) => {
                if self.error.is_none() {
                    self.error = Some(error);
                }
            }
        }
        self
    }

    /// Restricts the run to tests whose full path matches `predicate`.
    pub fn set_filter(&mut self, predicate: Predicate) -> &mut Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) -> &mut Self {
        self.reporters.push(reporter);
        self
    }

    /// Filters the roots, runs them to completion, and returns the final
    /// statistics.
    pub fn run(self) -> Result<RunStats, RunError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }

        let roots = match &self.predicate {
            None => self.roots,
            Some(predicate) => {
                let mut kept = Vec::new();
                for root in &self.roots {
                    if let Some(filtered) = filter_context(root, Some(predicate), "")? {
                        kept.push(filtered);
                    }
                }
                kept
            }
        };

        let mut runner = Runner::new(self.config);
        for reporter in self.reporters {
            runner.add_reporter(reporter);
        }
        runner.run(&roots)
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self::new(RunConfig::default())
    }
}
