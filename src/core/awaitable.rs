//! # Awaitable Primitive Module / Awaitable 原语模块
//!
//! A minimal deferred value used to coordinate asynchronous hooks and test
//! bodies on the engine's single logical thread: resolve/reject/then plus
//! the sequencing combinators the scheduler is built on. An `Awaitable`
//! also implements [`std::future::Future`], which is how settlement becomes
//! a suspension point inside the current-thread runtime.
//!
//! 一个最小化的延迟值，用于在引擎的单一逻辑线程上协调异步钩子和测试主体：
//! resolve/reject/then 以及调度器所依赖的顺序组合子。`Awaitable` 同时实现
//! [`std::future::Future`]，settlement 由此成为当前线程运行时内的挂起点。

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll, Waker};

use thiserror::Error;

use crate::core::models::Fault;

/// Raised when `resolve` or `reject` is called on an instance that has
/// already reached a terminal state. Double settlement is a programming
/// error, not a recoverable outcome.
///
/// 在已达到终态的实例上调用 `resolve` 或 `reject` 时抛出。
/// 重复 settle 属于编程错误，而非可恢复的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("awaitable already settled")]
pub struct AlreadySettledError;

/// The terminal outcome a listener receives: the resolution value behind a
/// shared pointer, or the rejection fault.
pub type Settlement<T> = Result<Rc<T>, Fault>;

enum State<T> {
    Unresolved,
    Resolved(Rc<T>),
    Rejected(Fault),
}

struct Inner<T> {
    state: State<T>,
    listeners: Vec<Box<dyn FnOnce(Settlement<T>)>>,
    wakers: Vec<Waker>,
    observed: bool,
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        // A rejection nobody ever looked at must still surface somewhere.
        if let State::Rejected(fault) = &self.state {
            if !self.observed {
                eprintln!("context-runner: unobserved awaitable rejection: {fault}");
            }
        }
    }
}

/// A deferred value with exactly three states: unresolved, resolved, and
/// rejected. Each terminal state is entered at most once; listener lists
/// are snapshotted before invocation so re-entrant settlement from within
/// a handler cannot corrupt iteration.
///
/// 具有三种状态（未决、已解决、已拒绝）的延迟值。
/// 终态最多进入一次；监听器列表在调用前做快照，
/// 因此处理器内部的重入 settle 不会破坏迭代。
pub struct Awaitable<T = ()> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Awaitable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Default for Awaitable<T> {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl<T: 'static> Awaitable<T> {
    /// Creates an unresolved instance.
    pub fn unresolved() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Unresolved,
                listeners: Vec::new(),
                wakers: Vec::new(),
                observed: false,
            })),
        }
    }

    /// Creates an instance that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let awaitable = Self::unresolved();
        awaitable
            .settle(Ok(Rc::new(value)))
            .expect("freshly created awaitable cannot be settled");
        awaitable
    }

    /// Creates an instance that is already rejected with `fault`.
    pub fn rejected(fault: Fault) -> Self {
        let awaitable = Self::unresolved();
        awaitable
            .settle(Err(fault))
            .expect("freshly created awaitable cannot be settled");
        awaitable
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.inner.borrow().state, State::Unresolved)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().state, State::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.inner.borrow().state, State::Rejected(_))
    }

    /// Transitions to the resolved state.
    ///
    /// # Panics
    /// Panics with [`AlreadySettledError`] if the instance has already
    /// settled. Use [`Awaitable::try_resolve`] for the fallible form.
    pub fn resolve(&self, value: T) {
        self.try_resolve(value)
            .expect("awaitable already settled");
    }

    /// Transitions to the resolved state, reporting double settlement
    /// instead of panicking.
    pub fn try_resolve(&self, value: T) -> Result<(), AlreadySettledError> {
        self.settle(Ok(Rc::new(value)))
    }

    /// Transitions to the rejected state.
    ///
    /// # Panics
    /// Panics with [`AlreadySettledError`] if the instance has already
    /// settled. Use [`Awaitable::try_reject`] for the fallible form.
    pub fn reject(&self, fault: Fault) {
        self.try_reject(fault).expect("awaitable already settled");
    }

    /// Transitions to the rejected state, reporting double settlement
    /// instead of panicking.
    pub fn try_reject(&self, fault: Fault) -> Result<(), AlreadySettledError> {
        self.settle(Err(fault))
    }

    fn settle(&self, settlement: Settlement<T>) -> Result<(), AlreadySettledError> {
        let (listeners, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Unresolved) {
                return Err(AlreadySettledError);
            }
            inner.state = match &settlement {
                Ok(value) => State::Resolved(value.clone()),
                Err(fault) => State::Rejected(fault.clone()),
            };
            if !inner.listeners.is_empty() {
                inner.observed = true;
            }
            // Snapshot before invocation; listeners registered from within
            // a handler see the settled state and fire immediately.
            (
                std::mem::take(&mut inner.listeners),
                std::mem::take(&mut inner.wakers),
            )
        };
        for listener in listeners {
            listener(clone_settlement(&settlement));
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Subscribes to settlement. If the instance has already settled, the
    /// listener fires synchronously with the original settlement.
    ///
    /// 订阅 settlement。若实例已经 settle，
    /// 监听器以原始结果同步触发。
    pub fn on_settled(&self, listener: impl FnOnce(Settlement<T>) + 'static) {
        let existing = {
            let mut inner = self.inner.borrow_mut();
            inner.observed = true;
            match &inner.state {
                State::Unresolved => None,
                State::Resolved(value) => Some(Ok(value.clone())),
                State::Rejected(fault) => Some(Err(fault.clone())),
            }
        };
        match existing {
            None => self.inner.borrow_mut().listeners.push(Box::new(listener)),
            Some(settlement) => listener(settlement),
        }
    }

    /// Chains a resolution handler, producing a new awaitable. A rejection
    /// passes through unchanged; a handler that panics rejects the chained
    /// awaitable with the captured fault rather than dropping it.
    ///
    /// 链接一个解决处理器，产生新的 awaitable。拒绝原样透传；
    /// 处理器 panic 时，链上的 awaitable 以捕获到的错误被拒绝，而非静默丢弃。
    pub fn then<U: 'static>(
        &self,
        on_resolved: impl FnOnce(&T) -> Result<U, Fault> + 'static,
    ) -> Awaitable<U> {
        let chained = Awaitable::unresolved();
        let link = chained.clone();
        self.on_settled(move |settlement| match settlement {
            Ok(value) => run_handler(&link, on_resolved, &*value),
            Err(fault) => {
                let _ = link.try_reject(fault);
            }
        });
        chained
    }

    /// Chains both a resolution and a rejection handler.
    pub fn then_or<U: 'static>(
        &self,
        on_resolved: impl FnOnce(&T) -> Result<U, Fault> + 'static,
        on_rejected: impl FnOnce(&Fault) -> Result<U, Fault> + 'static,
    ) -> Awaitable<U> {
        let chained = Awaitable::unresolved();
        let link = chained.clone();
        self.on_settled(move |settlement| match settlement {
            Ok(value) => run_handler(&link, on_resolved, &*value),
            Err(fault) => run_handler(&link, on_rejected, &fault),
        });
        chained
    }

    /// Chains a rejection handler; a resolution passes through unchanged.
    pub fn rescue(
        &self,
        on_rejected: impl FnOnce(&Fault) -> Result<T, Fault> + 'static,
    ) -> Awaitable<T> {
        let chained = Awaitable::unresolved();
        let link = chained.clone();
        self.on_settled(move |settlement| match settlement {
            Ok(value) => {
                let _ = link.settle(Ok(value));
            }
            Err(fault) => run_handler(&link, on_rejected, &fault),
        });
        chained
    }
}

fn run_handler<I: 'static, U: 'static>(
    link: &Awaitable<U>,
    handler: impl FnOnce(&I) -> Result<U, Fault>,
    input: &I,
) {
    match catch_unwind(AssertUnwindSafe(|| handler(input))) {
        Ok(Ok(value)) => {
            let _ = link.try_resolve(value);
        }
        Ok(Err(fault)) => {
            let _ = link.try_reject(fault);
        }
        Err(payload) => {
            let _ = link.try_reject(Fault::from_panic(payload));
        }
    }
}

fn clone_settlement<T>(settlement: &Settlement<T>) -> Settlement<T> {
    match settlement {
        Ok(value) => Ok(value.clone()),
        Err(fault) => Err(fault.clone()),
    }
}

impl<T: 'static> Future for Awaitable<T> {
    type Output = Settlement<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        inner.observed = true;
        match &inner.state {
            State::Unresolved => {
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
            State::Resolved(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(fault) => Poll::Ready(Err(fault.clone())),
        }
    }
}

/// The idempotent completion handle passed to callback-style hooks and
/// test bodies. Settling an already-settled token is a no-op, so a signal
/// arriving after a timeout has forced settlement cannot affect anything.
///
/// 传递给回调风格钩子和测试主体的幂等完成句柄。
/// 对已 settle 的令牌再次 settle 是空操作，
/// 因此超时强制结束后才到达的信号不会产生任何影响。
#[derive(Clone)]
pub struct Completion {
    token: Awaitable<()>,
}

impl Completion {
    pub(crate) fn new(token: Awaitable<()>) -> Self {
        Self { token }
    }

    /// Signals successful completion. Stale signals are ignored.
    pub fn done(&self) {
        let _ = self.token.try_resolve(());
    }

    /// Signals completion with a fault. Stale signals are ignored.
    pub fn fail(&self, fault: Fault) {
        let _ = self.token.try_reject(fault);
    }
}

/// A value that may or may not be asynchronous — what sequential tasks and
/// async-capable registration surfaces yield.
///
/// 可能同步也可能异步的值——顺序任务及支持异步的注册接口所产出的类型。
pub enum Eventual<T = ()> {
    Ready(T),
    Pending(Awaitable<T>),
}

impl<T> From<Awaitable<T>> for Eventual<T> {
    fn from(awaitable: Awaitable<T>) -> Self {
        Eventual::Pending(awaitable)
    }
}

/// Wraps a plain value in an already-resolved awaitable; passes an
/// existing awaitable through unchanged.
pub fn as_awaitable<T: 'static>(value: Eventual<T>) -> Awaitable<T> {
    match value {
        Eventual::Ready(value) => Awaitable::resolved(value),
        Eventual::Pending(awaitable) => awaitable,
    }
}

/// A unit of work driven by [`sequential`].
pub type SequentialTask = Box<dyn FnOnce() -> Eventual<()>>;

/// Options for [`sequential`]. With an `on_error` handler, task faults are
/// routed to it and the sequence continues; without one, the first fault
/// halts the remaining tasks and rejects the aggregate.
#[derive(Default)]
pub struct SequentialOptions {
    pub on_error: Option<Box<dyn FnMut(Fault)>>,
}

/// Invokes `tasks` one at a time. A task yielding an awaitable defers the
/// next task until that awaitable settles; a task yielding a ready value
/// schedules the next task on the next tick.
///
/// Must be called from within the engine's single-threaded scheduler (a
/// `tokio` current-thread runtime with an active `LocalSet`).
///
/// 逐一调用 `tasks`。产出 awaitable 的任务会让下一个任务等到其 settle；
/// 产出现成值的任务则把下一个任务安排到下一个 tick。
pub fn sequential(tasks: Vec<SequentialTask>, mut options: SequentialOptions) -> Awaitable<()> {
    let aggregate = Awaitable::unresolved();
    let link = aggregate.clone();
    tokio::task::spawn_local(async move {
        for task in tasks {
            let yielded = match catch_unwind(AssertUnwindSafe(|| task())) {
                Ok(value) => value,
                Err(payload) => {
                    let fault = Fault::from_panic(payload);
                    match options.on_error.as_mut() {
                        Some(handler) => {
                            handler(fault);
                            continue;
                        }
                        None => {
                            let _ = link.try_reject(fault);
                            return;
                        }
                    }
                }
            };
            match yielded {
                Eventual::Ready(()) => tokio::task::yield_now().await,
                Eventual::Pending(awaitable) => {
                    if let Err(fault) = awaitable.await {
                        match options.on_error.as_mut() {
                            Some(handler) => handler(fault),
                            None => {
                                let _ = link.try_reject(fault);
                                return;
                            }
                        }
                    }
                }
            }
        }
        let _ = link.try_resolve(());
    });
    aggregate
}

/// Resolves once every argument has resolved; rejects on the first
/// rejection of any constituent.
pub fn all<T: 'static>(awaitables: Vec<Awaitable<T>>) -> Awaitable<()> {
    let aggregate = Awaitable::unresolved();
    if awaitables.is_empty() {
        aggregate.resolve(());
        return aggregate;
    }
    let remaining = Rc::new(Cell::new(awaitables.len()));
    for awaitable in &awaitables {
        let link = aggregate.clone();
        let remaining = remaining.clone();
        awaitable.on_settled(move |settlement| match settlement {
            Ok(_) => {
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let _ = link.try_resolve(());
                }
            }
            Err(fault) => {
                let _ = link.try_reject(fault);
            }
        });
    }
    aggregate
}
