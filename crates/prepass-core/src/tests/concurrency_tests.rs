use std::cell::Cell;
use std::rc::Rc;
use std::task::Poll;

use futures::channel::oneshot;

use crate::component::{function_component, Awaitable, FunctionComponent, Interrupt};
use crate::element::{Element, Props};
use crate::error::ErrorValue;
use crate::render_prepass_with;

use super::{counter, leaf, no_yield_options, Driver};

fn suspending_tree(
    outer_calls: &Rc<Cell<usize>>,
    inner_calls: &Rc<Cell<usize>>,
) -> (Element, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();
    let awaitable = Awaitable::new(async move {
        rx.await.map_err(|_| ErrorValue::msg("sender dropped"))?;
        Ok(())
    });

    let inner: Rc<dyn FunctionComponent> = leaf(inner_calls);
    let outer = {
        let outer_calls = Rc::clone(outer_calls);
        let settled = Rc::new(Cell::new(false));
        function_component(move |_scope, _props| {
            outer_calls.set(outer_calls.get() + 1);
            if !settled.replace(true) {
                return Err(Interrupt::Suspend(awaitable.clone()));
            }
            Ok(Element::component(Rc::clone(&inner), Props::empty()).into())
        })
    };

    (Element::component(outer, Props::empty()), tx)
}

#[test]
fn overlapping_runs_keep_their_state_apart() {
    let outer_a = counter();
    let inner_a = counter();
    let outer_b = counter();
    let inner_b = counter();

    let (tree_a, tx_a) = suspending_tree(&outer_a, &inner_a);
    let (tree_b, tx_b) = suspending_tree(&outer_b, &inner_b);

    let mut run_a = Driver::new(render_prepass_with(tree_a, None, no_yield_options()));
    let mut run_b = Driver::new(render_prepass_with(tree_b, None, no_yield_options()));

    // Interleave the synchronous phases: both runs are mid-drain at once.
    assert!(run_a.poll().is_pending());
    assert!(run_b.poll().is_pending());
    assert_eq!(outer_a.get(), 1);
    assert_eq!(outer_b.get(), 1);

    // Resolving one run completes it without advancing the other.
    tx_b.send(()).unwrap();
    assert!(matches!(run_b.poll(), Poll::Ready(Ok(()))));
    assert_eq!(outer_b.get(), 2);
    assert_eq!(inner_b.get(), 1);
    assert_eq!(outer_a.get(), 1);
    assert_eq!(inner_a.get(), 0);

    tx_a.send(()).unwrap();
    assert!(matches!(run_a.poll(), Poll::Ready(Ok(()))));
    assert_eq!(outer_a.get(), 2);
    assert_eq!(inner_a.get(), 1);
}
