use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::component::{function_component, Awaitable, Interrupt};
use crate::element::{Element, Node, Props};
use crate::hooks::{FloatBits, SetState};
use crate::{render_prepass, render_prepass_with, PrepassOptions};

use super::{block_on, counter};

#[test]
fn render_phase_updates_rerun_the_body_with_rewound_hooks() {
    let renders = Rc::new(RefCell::new(Vec::new()));
    let component = {
        let renders = Rc::clone(&renders);
        function_component(move |scope, _props| {
            let (count, set) = scope.use_state(|| 0i32);
            renders.borrow_mut().push(*count);
            if *count < 3 {
                set.update(|c| c + 1);
            }
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    assert_eq!(*renders.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn update_storms_abort_quietly_at_the_ceiling() {
    let renders = counter();
    let component = {
        let renders = Rc::clone(&renders);
        function_component(move |scope, _props| {
            renders.set(renders.get() + 1);
            let (_count, set) = scope.use_state(|| 0u32);
            set.update(|c| c + 1);
            Ok(Node::Empty)
        })
    };
    // Completes without error; a later full render pass raises the real
    // diagnostic.
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    assert_eq!(renders.get(), 26);
}

#[test]
fn the_rerender_ceiling_is_configurable() {
    let renders = counter();
    let component = {
        let renders = Rc::clone(&renders);
        function_component(move |scope, _props| {
            renders.set(renders.get() + 1);
            let (_count, set) = scope.use_state(|| 0u32);
            set.update(|c| c + 1);
            Ok(Node::Empty)
        })
    };
    let options = PrepassOptions {
        rerender_limit: 5,
        ..PrepassOptions::default()
    };
    block_on(render_prepass_with(
        Element::component(component, Props::empty()),
        None,
        options,
    ))
    .unwrap();
    assert_eq!(renders.get(), 6);
}

#[test]
fn dispatch_after_render_completion_is_a_silent_noop() {
    let setter: Rc<RefCell<Option<SetState<i32>>>> = Rc::new(RefCell::new(None));
    let component = {
        let setter = Rc::clone(&setter);
        function_component(move |scope, _props| {
            let (_count, set) = scope.use_state(|| 0i32);
            *setter.borrow_mut() = Some(set);
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    // The render is long over; the captured setter must not panic or loop.
    setter.borrow().as_ref().unwrap().set(5);
}

#[test]
fn use_reducer_applies_render_phase_actions_in_order() {
    let renders = Rc::new(RefCell::new(Vec::new()));
    let component = {
        let renders = Rc::clone(&renders);
        function_component(move |scope, _props| {
            let (value, dispatch) =
                scope.use_reducer(|state: &i32, action: i32| state + action, || 0);
            renders.borrow_mut().push(*value);
            if *value == 0 {
                dispatch.call(2);
                dispatch.call(3);
            }
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    assert_eq!(*renders.borrow(), vec![0, 5]);
}

#[test]
fn use_memo_caches_until_dependencies_change() {
    let stable_computes = counter();
    let keyed_computes = counter();
    let component = {
        let stable_computes = Rc::clone(&stable_computes);
        let keyed_computes = Rc::clone(&keyed_computes);
        function_component(move |scope, _props| {
            let (count, set) = scope.use_state(|| 0i32);
            let stable = {
                let stable_computes = Rc::clone(&stable_computes);
                scope.use_memo(0u8, move || {
                    stable_computes.set(stable_computes.get() + 1);
                    1
                })
            };
            assert_eq!(*stable, 1);
            let keyed = {
                let keyed_computes = Rc::clone(&keyed_computes);
                let count = *count;
                scope.use_memo(count, move || {
                    keyed_computes.set(keyed_computes.get() + 1);
                    count * 10
                })
            };
            assert_eq!(*keyed, *count * 10);
            if *count < 2 {
                set.update(|c| c + 1);
            }
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    assert_eq!(stable_computes.get(), 1);
    assert_eq!(keyed_computes.get(), 3);
}

#[test]
fn use_memo_always_recomputes_without_dependencies() {
    let computes = counter();
    let component = {
        let computes = Rc::clone(&computes);
        function_component(move |scope, _props| {
            let (count, set) = scope.use_state(|| 0i32);
            let computes = Rc::clone(&computes);
            scope.use_memo_always(move || computes.set(computes.get() + 1));
            if *count < 2 {
                set.update(|c| c + 1);
            }
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    assert_eq!(computes.get(), 3);
}

#[test]
fn use_ref_returns_the_same_box_on_every_render() {
    let component = function_component(move |scope, _props| {
        let (count, set) = scope.use_state(|| 0i32);
        let slot = scope.use_ref(|| 0usize);
        slot.update(|v| *v += 1);
        if *count < 2 {
            set.update(|c| c + 1);
        } else {
            // Third render: the same box accumulated across all three.
            assert_eq!(slot.get(), 3);
        }
        Ok(Node::Empty)
    });
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
}

#[test]
fn use_callback_is_stable_while_dependencies_hold() {
    let ptrs = Rc::new(RefCell::new(Vec::new()));
    let component = {
        let ptrs = Rc::clone(&ptrs);
        function_component(move |scope, _props| {
            let (count, set) = scope.use_state(|| 0i32);
            let callback = scope.use_callback(0u8, || 42);
            ptrs.borrow_mut().push(Rc::as_ptr(&callback) as *const () as usize);
            if *count < 2 {
                set.update(|c| c + 1);
            }
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    let ptrs = ptrs.borrow();
    assert_eq!(ptrs.len(), 3);
    assert!(ptrs.iter().all(|&p| p == ptrs[0]));
}

#[test]
fn hook_chain_survives_a_suspension() {
    let computes = counter();
    let component = {
        let computes = Rc::clone(&computes);
        let settled = Rc::new(Cell::new(false));
        function_component(move |scope, _props| {
            let slot = scope.use_ref(|| 0usize);
            slot.update(|v| *v += 1);
            let computes = Rc::clone(&computes);
            scope.use_memo(0u8, move || computes.set(computes.get() + 1));
            if !settled.replace(true) {
                return Err(Interrupt::Suspend(Awaitable::ready()));
            }
            assert_eq!(slot.get(), 2);
            Ok(Node::Empty)
        })
    };
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
    // The memo node was reused on resume, not reallocated.
    assert_eq!(computes.get(), 1);
}

#[test]
fn effect_hooks_never_run_in_a_prepass() {
    let component = function_component(|scope, _props| {
        scope.use_effect(|| panic!("effects must not run during a prepass"));
        scope.use_layout_effect(|| panic!("layout effects must not run during a prepass"));
        scope.use_imperative_handle(|| panic!("imperative handles must not run"));
        scope.use_debug_value("ignored");
        Ok(Node::Empty)
    });
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
}

#[test]
fn transitions_run_synchronously_and_report_not_pending() {
    let component = function_component(|scope, _props| {
        let (transition, pending) = scope.use_transition();
        assert!(!pending);
        let ran = Cell::new(false);
        transition.start(|| ran.set(true));
        assert!(ran.get());
        assert_eq!(scope.use_deferred_value(7), 7);
        Ok(Node::Empty)
    });
    block_on(render_prepass(Element::component(component, Props::empty()))).unwrap();
}

#[test]
fn float_bits_use_same_value_semantics() {
    assert_eq!(FloatBits(f64::NAN), FloatBits(f64::NAN));
    assert_ne!(FloatBits(0.0), FloatBits(-0.0));
    assert_eq!(FloatBits(1.5), FloatBits(1.5));
    assert_eq!(FloatBits::from(2.0f32), FloatBits(2.0));
}
