use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use futures::task::noop_waker;

use crate::component::{function_component, FunctionComponent};
use crate::element::{Node, Props};
use crate::hooks::Scope;
use crate::{PrepassOptions, Render};

mod concurrency_tests;
mod context_tests;
mod hooks_tests;

pub(crate) fn block_on<T>(future: impl Future<Output = T>) -> T {
    futures::executor::block_on(future)
}

pub(crate) fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

/// Options with a budget large enough that wall-clock yields cannot occur;
/// tests asserting on intermediate states want suspensions to be the only
/// reason a poll returns pending.
pub(crate) fn no_yield_options() -> PrepassOptions {
    PrepassOptions {
        yield_budget: Duration::from_secs(60),
        ..PrepassOptions::default()
    }
}

/// Hand-driven future, for asserting on intermediate states the way a
/// suspended tree exposes them between polls.
pub(crate) struct Driver<F: Future> {
    future: Pin<Box<F>>,
}

impl<F: Future> Driver<F> {
    pub fn new(future: F) -> Self {
        Self {
            future: Box::pin(future),
        }
    }

    pub fn poll(&mut self) -> Poll<F::Output> {
        let waker = noop_waker();
        let mut cx = TaskContext::from_waker(&waker);
        self.future.as_mut().poll(&mut cx)
    }
}

pub(crate) fn counting_component(
    count: &Rc<Cell<usize>>,
    body: impl Fn(&mut Scope<'_>, &Props) -> Render + 'static,
) -> Rc<dyn FunctionComponent> {
    let count = Rc::clone(count);
    function_component(move |scope, props| {
        count.set(count.get() + 1);
        body(scope, props)
    })
}

/// Component that renders nothing, counting its invocations.
pub(crate) fn leaf(count: &Rc<Cell<usize>>) -> Rc<dyn FunctionComponent> {
    counting_component(count, |_, _| Ok(Node::Empty))
}
