use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::component::{function_component, FunctionComponent};
use crate::context::{Context, ContextStore, LegacyValues, RawContext};
use crate::element::{Element, Node, Props};
use crate::{render_prepass, ClassCx, Lifecycles, Render, StatefulComponent};

use super::block_on;

fn reader(context: &Context<i32>, seen: &Rc<RefCell<Vec<i32>>>) -> Rc<dyn FunctionComponent> {
    let context = context.clone();
    let seen = Rc::clone(seen);
    function_component(move |scope, _props| {
        let value = scope.use_context(&context);
        seen.borrow_mut().push(*value);
        Ok(Node::Empty)
    })
}

#[test]
fn provider_values_are_scoped_to_their_subtree() {
    let context = Context::new(1i32);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let tree = Element::fragment(Node::elements([
        context.provider(
            2,
            Element::component(reader(&context, &seen), Props::empty()),
        ),
        Element::component(reader(&context, &seen), Props::empty()),
    ]));

    block_on(render_prepass(tree)).unwrap();
    assert_eq!(*seen.borrow(), vec![2, 1]);
}

#[test]
fn nested_providers_shadow_and_restore_to_the_enclosing_value() {
    let context = Context::new(1i32);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let tree = Element::fragment(Node::elements([
        context.provider(
            2,
            Node::elements([
                Element::component(reader(&context, &seen), Props::empty()),
                context.provider(
                    3,
                    Element::component(reader(&context, &seen), Props::empty()),
                ),
                Element::component(reader(&context, &seen), Props::empty()),
            ]),
        ),
        Element::component(reader(&context, &seen), Props::empty()),
    ]));

    block_on(render_prepass(tree)).unwrap();
    assert_eq!(*seen.borrow(), vec![2, 3, 2, 1]);
}

#[test]
fn consumers_invoke_their_render_prop_with_the_resolved_value() {
    let context = Context::new(1i32);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let consumer = |seen: &Rc<RefCell<Vec<i32>>>| {
        let seen = Rc::clone(seen);
        context.consumer(move |value| {
            seen.borrow_mut().push(*value);
            Node::Empty
        })
    };

    let tree = Element::fragment(Node::elements([
        context.provider(7, consumer(&seen)),
        consumer(&seen),
    ]));

    block_on(render_prepass(tree)).unwrap();
    assert_eq!(*seen.borrow(), vec![7, 1]);
}

#[test]
fn provider_restore_returns_to_the_enclosing_binding() {
    let mut store = ContextStore::default();
    let context = Context::new(0i32);
    let raw = context.raw();

    store.set_provider_value(&raw, Rc::new(1i32));
    let outer = store.flush_store_restore();
    store.set_provider_value(&raw, Rc::new(2i32));
    let inner = store.flush_store_restore();

    assert_eq!(*store.read(&context), 2);
    store.restore_store(inner);
    assert_eq!(*store.read(&context), 1);
    store.restore_store(outer);
    // Back to explicit absence, which reads as the default.
    assert_eq!(*store.read(&context), 0);
}

#[test]
fn legacy_restore_reinstates_absence_exactly() {
    let mut store = ContextStore::default();

    store.assign_legacy(vec![(
        Rc::from("theme"),
        Rc::new(String::from("dark")) as Rc<dyn Any>,
    )]);
    let token = store.flush_legacy_restore();
    assert!(store.read_legacy("theme").is_some());

    store.restore_legacy(token);
    assert!(store.read_legacy("theme").is_none());
}

#[test]
fn snapshots_capture_and_restore_both_maps() {
    let mut store = ContextStore::default();
    let context = Context::new(0i32);

    store.set_provider_value(&context.raw(), Rc::new(5i32));
    store.flush_store_restore();
    store.assign_legacy(vec![(
        Rc::from("theme"),
        Rc::new(String::from("dark")) as Rc<dyn Any>,
    )]);
    store.flush_legacy_restore();

    let snapshot = store.snapshot();

    store.set_provider_value(&context.raw(), Rc::new(9i32));
    store.flush_store_restore();
    store.assign_legacy(vec![(
        Rc::from("theme"),
        Rc::new(String::from("light")) as Rc<dyn Any>,
    )]);
    store.flush_legacy_restore();

    store.restore_snapshot(&snapshot);
    assert_eq!(*store.read(&context), 5);
    let theme = store.read_legacy("theme").unwrap();
    assert_eq!(theme.downcast_ref::<String>().unwrap(), "dark");
}

struct ProvidesTheme;

impl StatefulComponent for ProvidesTheme {
    fn lifecycles(&self) -> Lifecycles {
        Lifecycles::CHILD_CONTEXT
    }

    fn init(&self, _props: &Props, _context: &LegacyValues) -> Box<dyn Any> {
        Box::new(())
    }

    fn render(&self, cx: &mut ClassCx<'_>) -> Render {
        Ok(cx.props().children().clone())
    }

    fn child_context(&self, _cx: &ClassCx<'_>) -> Vec<(Rc<str>, Rc<dyn Any>)> {
        vec![(
            Rc::from("theme"),
            Rc::new(String::from("dark")) as Rc<dyn Any>,
        )]
    }
}

struct ReadsTheme {
    seen: Rc<RefCell<Vec<Option<String>>>>,
}

impl StatefulComponent for ReadsTheme {
    fn init(&self, _props: &Props, _context: &LegacyValues) -> Box<dyn Any> {
        Box::new(())
    }

    fn context_names(&self) -> Vec<Rc<str>> {
        vec![Rc::from("theme"), Rc::from("missing")]
    }

    fn render(&self, cx: &mut ClassCx<'_>) -> Render {
        let mask = cx.legacy_context();
        // Undeclared-or-unbound names are excluded from the mask entirely.
        assert!(mask.get("missing").is_none());
        self.seen
            .borrow_mut()
            .push(mask.get_as::<String>("theme").map(|s| (*s).clone()));
        Ok(Node::Empty)
    }
}

#[test]
fn class_child_context_is_masked_and_scoped() {
    let seen = Rc::new(RefCell::new(Vec::new()));

    let tree = Element::fragment(Node::elements([
        Element::stateful(
            Rc::new(ProvidesTheme),
            Props::empty().with_children(Element::stateful(
                Rc::new(ReadsTheme {
                    seen: Rc::clone(&seen),
                }),
                Props::empty(),
            )),
        ),
        Element::stateful(
            Rc::new(ReadsTheme {
                seen: Rc::clone(&seen),
            }),
            Props::empty(),
        ),
    ]));

    block_on(render_prepass(tree)).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![Some(String::from("dark")), None]
    );
}

struct ReadsTyped {
    context: Context<i32>,
    seen: Rc<RefCell<Vec<i32>>>,
}

impl StatefulComponent for ReadsTyped {
    fn init(&self, _props: &Props, _context: &LegacyValues) -> Box<dyn Any> {
        Box::new(())
    }

    fn context_handle(&self) -> Option<RawContext> {
        Some(self.context.raw())
    }

    fn render(&self, cx: &mut ClassCx<'_>) -> Render {
        let masked = cx
            .legacy_context()
            .single::<i32>()
            .expect("declared handle resolves");
        // The non-hook read form agrees with the masked value.
        assert_eq!(*cx.read_context(&self.context), *masked);
        self.seen.borrow_mut().push(*masked);
        Ok(Node::Empty)
    }
}

#[test]
fn a_declared_context_handle_wins_over_legacy_names() {
    let context = Context::new(1i32);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let element = |seen: &Rc<RefCell<Vec<i32>>>| {
        Element::stateful(
            Rc::new(ReadsTyped {
                context: context.clone(),
                seen: Rc::clone(seen),
            }),
            Props::empty(),
        )
    };

    let tree = Element::fragment(Node::elements([
        context.provider(5, element(&seen)),
        element(&seen),
    ]));

    block_on(render_prepass(tree)).unwrap();
    assert_eq!(*seen.borrow(), vec![5, 1]);
}
