//! # Awaitable Module Unit Tests / Awaitable 模块单元测试
//!
//! Unit tests for the deferred primitive: settle-once semantics, listener
//! snapshotting, handler chaining, and the sequencing combinators.
//!
//! 延迟原语的单元测试：单次 settle 语义、监听器快照、
//! 处理器链接以及顺序组合子。

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use context_runner::core::awaitable::{
    AlreadySettledError, Awaitable, Eventual, SequentialOptions, SequentialTask, all, as_awaitable,
    sequential,
};
use context_runner::core::models::Fault;

use common::block_on_local;

/// Lets spawned local tasks make progress / 让已派生的本地任务推进
async fn ticks(n: usize) {
    for _ in 0..n {
        tokio::task::yield_now().await;
    }
}

mod settlement_tests {
    use super::*;

    #[test]
    fn settles_once_and_reports_double_settlement() {
        let awaitable: Awaitable<u32> = Awaitable::unresolved();
        assert!(!awaitable.is_settled());

        awaitable.resolve(7);
        assert!(awaitable.is_resolved());

        // Both forms of a second settlement are misuse.
        assert_eq!(awaitable.try_resolve(9), Err(AlreadySettledError));
        assert_eq!(
            awaitable.try_reject(Fault::new("Panic", "late")),
            Err(AlreadySettledError)
        );
    }

    #[test]
    #[should_panic(expected = "awaitable already settled")]
    fn second_resolve_panics() {
        let awaitable: Awaitable<u32> = Awaitable::unresolved();
        awaitable.resolve(1);
        awaitable.resolve(2);
    }

    #[test]
    fn listener_attached_before_settlement_fires_on_resolve() {
        let awaitable: Awaitable<u32> = Awaitable::unresolved();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        awaitable.on_settled(move |settlement| {
            sink.borrow_mut().push(*settlement.expect("expected resolution"));
        });
        assert!(seen.borrow().is_empty());

        awaitable.resolve(42);
        assert_eq!(*seen.borrow(), vec![42]);
    }

    #[test]
    fn listener_attached_after_settlement_fires_once_with_original_value() {
        let awaitable = Awaitable::resolved(42u32);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        awaitable.on_settled(move |settlement| {
            sink.borrow_mut().push(*settlement.expect("expected resolution"));
        });
        assert_eq!(*seen.borrow(), vec![42]);
    }

    #[test]
    fn rejection_reaches_listener() {
        let awaitable: Awaitable<u32> = Awaitable::unresolved();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        awaitable.on_settled(move |settlement| {
            sink.borrow_mut()
                .push(settlement.expect_err("expected rejection").name);
        });

        awaitable.reject(Fault::new("Panic", "boom"));
        assert_eq!(*seen.borrow(), vec!["Panic".to_string()]);
    }

    #[test]
    fn listener_registered_during_settlement_fires_immediately() {
        let awaitable: Awaitable<u32> = Awaitable::unresolved();
        let order = Rc::new(RefCell::new(Vec::new()));
        let outer = order.clone();
        let handle = awaitable.clone();
        awaitable.on_settled(move |_| {
            outer.borrow_mut().push("first");
            let inner = outer.clone();
            // Re-entrant registration sees the settled state.
            handle.on_settled(move |_| inner.borrow_mut().push("second"));
        });

        awaitable.resolve(1);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }
}

mod then_tests {
    use super::*;

    fn observed<T: 'static>(awaitable: &Awaitable<T>) -> Rc<RefCell<Option<Result<Rc<T>, Fault>>>> {
        let slot = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        awaitable.on_settled(move |settlement| {
            *sink.borrow_mut() = Some(settlement);
        });
        slot
    }

    #[test]
    fn then_maps_resolution() {
        let awaitable = Awaitable::resolved(2u32);
        let chained = awaitable.then(|value| Ok(value * 3));
        let seen = observed(&chained);
        assert_eq!(*seen.borrow(), Some(Ok(Rc::new(6))));
    }

    #[test]
    fn rejection_passes_through_then() {
        let awaitable: Awaitable<u32> = Awaitable::rejected(Fault::new("Panic", "boom"));
        let chained = awaitable.then(|value| Ok(value * 3));
        let seen = observed(&chained);
        assert_eq!(
            *seen.borrow(),
            Some(Err(Fault::new("Panic", "boom")))
        );
    }

    #[test]
    fn panicking_handler_rejects_chained_awaitable() {
        let awaitable = Awaitable::resolved(1u32);
        let chained = awaitable.then(|_| -> Result<u32, Fault> { panic!("handler exploded") });
        let seen = observed(&chained);
        let fault = seen
            .borrow()
            .clone()
            .expect("chained awaitable should have settled")
            .expect_err("chained awaitable should be rejected");
        assert_eq!(fault.name, "Panic");
        assert!(fault.message.contains("handler exploded"));
    }

    #[test]
    fn then_or_recovers_from_rejection() {
        let awaitable: Awaitable<u32> = Awaitable::rejected(Fault::new("Panic", "boom"));
        let chained = awaitable.then_or(|value| Ok(*value), |_| Ok(99));
        let seen = observed(&chained);
        assert_eq!(*seen.borrow(), Some(Ok(Rc::new(99))));
    }

    #[test]
    fn rescue_passes_resolution_through() {
        let awaitable = Awaitable::resolved(5u32);
        let chained = awaitable.rescue(|_| Ok(0));
        let seen = observed(&chained);
        assert_eq!(*seen.borrow(), Some(Ok(Rc::new(5))));
    }

    #[test]
    fn awaiting_yields_the_settlement() {
        block_on_local(async {
            let awaitable: Awaitable<u32> = Awaitable::unresolved();
            let handle = awaitable.clone();
            tokio::task::spawn_local(async move {
                tokio::task::yield_now().await;
                handle.resolve(11);
            });
            assert_eq!(awaitable.await, Ok(Rc::new(11)));
        });
    }
}

mod combinator_tests {
    use super::*;

    #[test]
    fn as_awaitable_wraps_plain_values() {
        let awaitable = as_awaitable(Eventual::Ready(5u32));
        assert!(awaitable.is_resolved());
    }

    #[test]
    fn as_awaitable_passes_awaitables_through_unchanged() {
        let inner: Awaitable<u32> = Awaitable::unresolved();
        let outer = as_awaitable(Eventual::Pending(inner.clone()));
        assert!(!outer.is_settled());

        // Same instance: settling one settles the other.
        inner.resolve(1);
        assert!(outer.is_resolved());
    }

    #[test]
    fn all_resolves_after_every_member() {
        let first: Awaitable<u32> = Awaitable::unresolved();
        let second: Awaitable<u32> = Awaitable::unresolved();
        let aggregate = all(vec![first.clone(), second.clone()]);

        first.resolve(1);
        assert!(!aggregate.is_settled());
        second.resolve(2);
        assert!(aggregate.is_resolved());
    }

    #[test]
    fn all_of_nothing_is_already_resolved() {
        let aggregate = all(Vec::<Awaitable<u32>>::new());
        assert!(aggregate.is_resolved());
    }

    #[test]
    fn all_rejects_on_first_rejection() {
        let first: Awaitable<u32> = Awaitable::unresolved();
        let second: Awaitable<u32> = Awaitable::unresolved();
        let aggregate = all(vec![first.clone(), second.clone()]);

        first.reject(Fault::new("Panic", "boom"));
        assert!(aggregate.is_rejected());
        second.resolve(2);
    }
}

mod sequential_tests {
    use super::*;

    #[test]
    fn next_task_waits_for_a_returned_awaitable() {
        block_on_local(async {
            let order = Rc::new(RefCell::new(Vec::new()));
            let gate: Awaitable<()> = Awaitable::unresolved();

            let tasks: Vec<SequentialTask> = vec![
                {
                    let order = order.clone();
                    let gate = gate.clone();
                    Box::new(move || {
                        order.borrow_mut().push("first");
                        Eventual::Pending(gate)
                    })
                },
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("second");
                        Eventual::Ready(())
                    })
                },
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("third");
                        Eventual::Ready(())
                    })
                },
            ];
            let aggregate = sequential(tasks, SequentialOptions::default());

            // However many ticks pass, the second task must wait for the
            // first task's awaitable to settle.
            ticks(5).await;
            assert_eq!(*order.borrow(), vec!["first"]);

            gate.resolve(());
            aggregate.await.expect("sequence should resolve");
            assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
        });
    }

    #[test]
    fn unhandled_fault_halts_remaining_tasks_and_rejects() {
        block_on_local(async {
            let order = Rc::new(RefCell::new(Vec::new()));

            let tasks: Vec<SequentialTask> = vec![
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("first");
                        Eventual::Ready(())
                    })
                },
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("second");
                        panic!("second task failed");
                    })
                },
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("third");
                        Eventual::Ready(())
                    })
                },
            ];
            let aggregate = sequential(tasks, SequentialOptions::default());

            let fault = aggregate.await.expect_err("aggregate should reject");
            assert_eq!(fault.name, "Panic");
            assert!(fault.message.contains("second task failed"));
            assert_eq!(*order.borrow(), vec!["first", "second"]);
        });
    }

    #[test]
    fn on_error_routes_the_fault_and_continues() {
        block_on_local(async {
            let order = Rc::new(RefCell::new(Vec::new()));
            let faults = Rc::new(RefCell::new(Vec::new()));

            let tasks: Vec<SequentialTask> = vec![
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("first");
                        panic!("first task failed");
                    })
                },
                {
                    let order = order.clone();
                    Box::new(move || {
                        order.borrow_mut().push("second");
                        Eventual::Ready(())
                    })
                },
            ];
            let options = SequentialOptions {
                on_error: Some(Box::new({
                    let faults = faults.clone();
                    move |fault: Fault| faults.borrow_mut().push(fault.message)
                })),
            };
            let aggregate = sequential(tasks, options);

            aggregate.await.expect("sequence should still resolve");
            assert_eq!(*order.borrow(), vec!["first", "second"]);
            assert_eq!(faults.borrow().len(), 1);
        });
    }
}
