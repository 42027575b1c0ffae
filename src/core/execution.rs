//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! The scheduler: traverses (optionally filtered) context trees, resolves
//! hook-inheritance chains, drives each test through its lifecycle,
//! enforces the per-test execution window, classifies outcomes, aggregates
//! statistics, and emits the strictly ordered event stream. Scheduling is
//! single-threaded and cooperative: exactly one test body executes at a
//! time, suspending only at declared async boundaries.
//!
//! 调度器：遍历（可能已过滤的）上下文树，解析钩子继承链，
//! 驱动每个测试走完其生命周期，实施单测试时间窗口，
//! 对结果分类，聚合统计，并发出严格有序的事件流。
//! 调度是单线程协作式的：任一时刻只有一个测试主体在执行，
//! 仅在声明的异步边界处挂起。

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use thiserror::Error;
use tokio::task::LocalSet;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::core::assertions::AssertionCounter;
use crate::core::awaitable::{Awaitable, Completion};
use crate::core::config::RunConfig;
use crate::core::context::{Context, DefinitionError, Hook, TestBody, TestEnv, TestFunction};
use crate::core::models::{Event, Fault, LogLevel, RunStats};
use crate::reporting::Reporter;

/// Why a run could not produce statistics.
#[derive(Debug, Error)]
pub enum RunError {
    /// A context definition was invalid; the suite did not start.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    /// The execution runtime could not be constructed.
    #[error("failed to start the execution runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// How one body invocation ended.
enum BodyOutcome {
    Completed,
    Faulted(Fault),
    TimedOut,
}

/// The test-execution engine. Reporters are pure event consumers; the
/// runner itself never formats or prints — its sole outputs are the event
/// stream and the final [`RunStats`].
///
/// 测试执行引擎。报告器是纯事件消费者；
/// 运行器本身从不格式化或打印——其唯一输出是事件流和最终统计。
pub struct Runner {
    config: RunConfig,
    reporters: Vec<Box<dyn Reporter>>,
    counter: AssertionCounter,
    abort: CancellationToken,
    stats: RunStats,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            reporters: Vec::new(),
            counter: AssertionCounter::new(),
            abort: CancellationToken::new(),
            stats: RunStats::default(),
        }
    }

    /// Attaches an event consumer.
    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    /// The externally-owned pass-counter: reset when `test:start` is
    /// emitted, read at settlement. Hand clones of this to the assertion
    /// layer.
    pub fn assertion_counter(&self) -> AssertionCounter {
        self.counter.clone()
    }

    /// Replaces the injected pass-counter.
    pub fn set_assertion_counter(&mut self, counter: AssertionCounter) {
        self.counter = counter;
    }

    /// A handle that stops the traversal: after `cancel()`, no further
    /// `context:start` or `test:start` is emitted, but the in-flight test
    /// reaches its terminal event before the suite concludes.
    ///
    /// 停止遍历的句柄：`cancel()` 之后不再发出 `context:start` 或
    /// `test:start`，但执行中的测试会先到达终态事件，套件才会收尾。
    pub fn abort_handle(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Runs the given root contexts to completion on a dedicated
    /// current-thread runtime and returns the final statistics.
    pub fn run(&mut self, roots: &[Rc<Context>]) -> Result<RunStats, RunError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let local = LocalSet::new();
        let stats = runtime.block_on(local.run_until(self.run_async(roots)))?;
        Ok(stats)
    }

    /// The composable form of [`Runner::run`]. Must execute inside a
    /// current-thread runtime with an active `LocalSet`.
    pub async fn run_async(&mut self, roots: &[Rc<Context>]) -> Result<RunStats, DefinitionError> {
        self.stats = RunStats::default();

        // Definition errors are fatal: surface them all before the first
        // event, so a broken suite never starts.
        for root in roots {
            deep_build(root)?;
        }

        self.emit(Event::SuiteStart);
        let mut chain: Vec<Rc<Context>> = Vec::new();
        for root in roots {
            self.run_context(root.clone(), &mut chain, None).await;
        }
        let stats = self.stats;
        self.emit(Event::SuiteEnd(stats));
        Ok(stats)
    }

    fn run_context<'a>(
        &'a mut self,
        context: Rc<Context>,
        chain: &'a mut Vec<Rc<Context>>,
        inherited_fault: Option<Fault>,
    ) -> LocalBoxFuture<'a, ()> {
        async move {
            if self.abort.is_cancelled() {
                return;
            }
            let unsupported = context.unsupported();
            if !unsupported.is_empty() {
                self.emit(Event::ContextUnsupported {
                    context: context.name().to_string(),
                    unsupported,
                });
                return;
            }

            self.emit(Event::ContextStart {
                name: context.name().to_string(),
            });
            self.stats.contexts += 1;
            chain.push(context.clone());

            // Group set-up runs once, before any of the context's own
            // tests or subcontexts; its fault poisons the whole subtree.
            let group_fault = match inherited_fault {
                Some(fault) => Some(fault),
                None => {
                    self.run_group_hook(context.get_group_set_up(), &context, chain)
                        .await
                }
            };

            // A context's own tests run before its subcontexts.
            for test in context.tests() {
                if self.abort.is_cancelled() {
                    break;
                }
                self.run_test(&test, chain, group_fault.clone()).await;
            }
            for child in context.contexts() {
                if self.abort.is_cancelled() {
                    break;
                }
                self.run_context(child, chain, group_fault.clone()).await;
            }

            // Group tear-down runs once, immediately before leaving. Its
            // fault is reported but reclassifies nothing.
            if let Some(fault) = self
                .run_group_hook(context.get_group_tear_down(), &context, chain)
                .await
            {
                self.emit(Event::Log {
                    level: LogLevel::Error,
                    message: format!("group tear-down of {:?} failed: {fault}", context.name()),
                });
            }

            chain.pop();
            self.emit(Event::ContextEnd {
                name: context.name().to_string(),
            });
        }
        .boxed_local()
    }

    /// Runs a group hook against its context's own record layer, with the
    /// ancestor layers visible beneath it. Mutations persist on the
    /// context and are therefore visible to every descendant test.
    async fn run_group_hook(
        &mut self,
        hook: Option<Rc<Hook>>,
        context: &Rc<Context>,
        chain: &[Rc<Context>],
    ) -> Option<Fault> {
        let hook = hook?;
        let ancestors = chain.len().saturating_sub(1);
        let layers: Vec<_> = chain[..ancestors].iter().map(|c| c.data()).collect();
        let own = context.data();
        let local = std::mem::take(&mut *own.borrow_mut());
        let mut env = TestEnv::with_local(layers, local);
        let deadline = Instant::now() + self.config.timeout();

        let outcome = invoke_body(&hook.body, &mut env, deadline).await;
        self.flush_log(&mut env);
        *own.borrow_mut() = env.into_local();

        match outcome {
            BodyOutcome::Completed => None,
            BodyOutcome::Faulted(fault) => Some(fault),
            BodyOutcome::TimedOut => Some(Fault::new(
                "TimeoutExceeded",
                format!(
                    "group hook of {:?} exceeded the execution window",
                    context.name()
                ),
            )),
        }
    }

    /// Drives one test through its lifecycle. The event sequence is always
    /// `test:setUp`, `test:start`, `test:tearDown`, then exactly one
    /// terminal event; a fault in one test never halts a sibling's
    /// machine.
    ///
    /// 驱动一个测试走完生命周期。事件序列恒为
    /// `test:setUp`、`test:start`、`test:tearDown`，然后恰好一个终态事件；
    /// 一个测试的错误绝不中止兄弟测试的状态机。
    async fn run_test(
        &mut self,
        test: &Rc<TestFunction>,
        chain: &[Rc<Context>],
        group_fault: Option<Fault>,
    ) {
        let name = test.name().to_string();
        let parent = test
            .parent()
            .map(|context| context.full_name())
            .unwrap_or_default();

        if test.is_deferred() {
            self.emit(Event::TestDeferred { name });
            self.stats.deferred += 1;
            return;
        }

        // A fresh overlay over the ancestor records, outermost first;
        // discarded at the end of the test, so nothing leaks sideways.
        let layers: Vec<_> = chain.iter().map(|c| c.data()).collect();
        let mut env = TestEnv::layered(layers);
        let deadline = Instant::now() + self.config.timeout();
        let mut fault: Option<Fault> = None;
        let mut timed_out = false;

        // Set-up chain: ancestor to leaf, halted by the first fault.
        self.emit(Event::TestSetUp {
            name: name.clone(),
            parent: parent.clone(),
        });
        if let Some(inherited) = group_fault {
            fault = Some(inherited);
        } else {
            for context in chain {
                if let Some(hook) = context.get_set_up() {
                    match invoke_body(&hook.body, &mut env, deadline).await {
                        BodyOutcome::Completed => {}
                        BodyOutcome::Faulted(hook_fault) => {
                            fault = Some(hook_fault);
                            break;
                        }
                        BodyOutcome::TimedOut => {
                            timed_out = true;
                            break;
                        }
                    }
                }
            }
        }
        self.flush_log(&mut env);

        // The body runs only if set-up fully succeeded.
        self.emit(Event::TestStart {
            name: name.clone(),
            parent: parent.clone(),
        });
        self.counter.reset();
        if fault.is_none() && !timed_out {
            if let Some(body) = test.body() {
                match invoke_body(&body, &mut env, deadline).await {
                    BodyOutcome::Completed => {}
                    BodyOutcome::Faulted(body_fault) => fault = Some(body_fault),
                    BodyOutcome::TimedOut => timed_out = true,
                }
            }
        }
        self.flush_log(&mut env);

        // Tear-down chain: leaf to root, unconditionally.
        self.emit(Event::TestTearDown {
            name: name.clone(),
            parent,
        });
        let mut tear_down_fault: Option<Fault> = None;
        for context in chain.iter().rev() {
            if let Some(hook) = context.get_tear_down() {
                match invoke_body(&hook.body, &mut env, deadline).await {
                    BodyOutcome::Completed => {}
                    BodyOutcome::Faulted(hook_fault) => {
                        if tear_down_fault.is_none() {
                            tear_down_fault = Some(hook_fault);
                        }
                    }
                    BodyOutcome::TimedOut => {
                        timed_out = true;
                        break;
                    }
                }
            }
        }
        self.flush_log(&mut env);
        drop(env);

        let assertions = self.counter.count();
        self.stats.assertions += assertions;

        // Exactly one terminal classification. A tear-down fault
        // classifies only when nothing settled the test earlier;
        // otherwise it surfaces as a log event.
        let mut secondary: Option<Fault> = None;
        let terminal = if timed_out {
            self.stats.timeouts += 1;
            secondary = tear_down_fault;
            Event::TestTimeout { name }
        } else if let Some(primary) = fault {
            secondary = tear_down_fault;
            self.classify_fault(name, primary)
        } else if let Some(late) = tear_down_fault {
            self.classify_fault(name, late)
        } else if self.config.fail_on_no_assertions && assertions == 0 {
            self.stats.failures += 1;
            self.stats.tests += 1;
            Event::TestFailure {
                name,
                error: Fault::assertion("expected at least one assertion"),
            }
        } else {
            self.stats.tests += 1;
            Event::TestSuccess { name, assertions }
        };
        self.emit(terminal);

        if let Some(fault) = secondary {
            self.emit(Event::Log {
                level: LogLevel::Error,
                message: format!("tear-down failed after settlement: {fault}"),
            });
        }
    }

    fn classify_fault(&mut self, name: String, fault: Fault) -> Event {
        if fault.is_assertion_failure() {
            self.stats.failures += 1;
            self.stats.tests += 1;
            Event::TestFailure { name, error: fault }
        } else {
            self.stats.errors += 1;
            Event::TestError { name, error: fault }
        }
    }

    fn flush_log(&mut self, env: &mut TestEnv) {
        for (level, message) in env.drain_log() {
            self.emit(Event::Log { level, message });
        }
    }

    fn emit(&mut self, event: Event) {
        for reporter in self.reporters.iter_mut() {
            reporter.on_event(&event);
        }
    }
}

/// Builds a context and all of its descendants, surfacing any definition
/// error before the suite starts.
fn deep_build(context: &Rc<Context>) -> Result<(), DefinitionError> {
    context.ensure_built()?;
    for child in context.contexts() {
        deep_build(&child)?;
    }
    Ok(())
}

/// Invokes one body according to its declared async style. Synchronous
/// bodies complete at return; callback and awaitable bodies suspend until
/// their token settles or the deadline expires. A completion signal
/// arriving after expiry lands on the abandoned per-test token and is a
/// no-op.
///
/// 按声明的异步风格调用一个主体。同步主体在返回时完成；
/// 回调与 awaitable 主体挂起直至令牌 settle 或截止时间到期。
/// 到期之后才到达的完成信号落在已被放弃的测试令牌上，是空操作。
async fn invoke_body(body: &TestBody, env: &mut TestEnv, deadline: Instant) -> BodyOutcome {
    match body {
        TestBody::Sync(f) => match catch_unwind(AssertUnwindSafe(|| f(env))) {
            Ok(()) => BodyOutcome::Completed,
            Err(payload) => BodyOutcome::Faulted(Fault::from_panic(payload)),
        },
        TestBody::Callback(f) => {
            let token: Awaitable<()> = Awaitable::unresolved();
            let completion = Completion::new(token.clone());
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(env, completion))) {
                return BodyOutcome::Faulted(Fault::from_panic(payload));
            }
            await_settlement(token, deadline).await
        }
        TestBody::Awaited(f) => match catch_unwind(AssertUnwindSafe(|| f(env))) {
            Ok(awaitable) => await_settlement(awaitable, deadline).await,
            Err(payload) => BodyOutcome::Faulted(Fault::from_panic(payload)),
        },
    }
}

async fn await_settlement(awaitable: Awaitable<()>, deadline: Instant) -> BodyOutcome {
    match timeout_at(deadline, awaitable).await {
        Ok(Ok(_)) => BodyOutcome::Completed,
        Ok(Err(fault)) => BodyOutcome::Faulted(fault),
        Err(_) => BodyOutcome::TimedOut,
    }
}
