//! The virtual element model the prepass walks.
//!
//! Elements form an explicit closed sum: every structural kind the traversal
//! distinguishes has its own variant, and [`Element::kind`] is the single
//! classification point. A [`Node`] is anything a component body can return:
//! an element, scalar text, nothing, or an arbitrarily nested list of those.
//! [`children_of`] flattens a node into the ordered element sequence the
//! traversal actually visits, dropping scalars on the way.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::component::{FunctionComponent, Lazy, StatefulComponent};
use crate::context::RawContext;

/// Anything a render can produce.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    /// Scalar text; carried by host renderers, invisible to the prepass.
    Text(Rc<str>),
    Element(Box<Element>),
    List(Rc<[Node]>),
}

impl Node {
    pub fn list(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::List(nodes.into_iter().collect())
    }

    pub fn elements(elements: impl IntoIterator<Item = Element>) -> Self {
        Node::List(
            elements
                .into_iter()
                .map(|element| Node::Element(Box::new(element)))
                .collect(),
        )
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(Box::new(element))
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(Rc::from(text))
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(Rc::from(text.as_str()))
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::List(nodes.into())
    }
}

impl From<Vec<Element>> for Node {
    fn from(elements: Vec<Element>) -> Self {
        Node::elements(elements)
    }
}

/// Structural kind of an element, as reported by [`Element::kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Fragment,
    Provider,
    Consumer,
    Lazy,
    Memo,
    ForwardRef,
    Portal,
    Host,
    Component,
    Stateful,
}

/// Pass-through wrapper flavors. The traversal treats them all identically;
/// the flavor only matters to a later real renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    Fragment,
    StrictMode,
    Profiler,
    ConcurrentMode,
    Suspense,
}

/// Props carried by component elements: an optional type-erased payload plus
/// child nodes. Payload absence is distinct from an empty payload so that a
/// component's declared defaults can fill in.
#[derive(Clone, Default)]
pub struct Props {
    payload: Option<Rc<dyn Any>>,
    children: Node,
}

impl Props {
    pub fn new<T: 'static>(payload: T) -> Self {
        Self {
            payload: Some(Rc::new(payload)),
            children: Node::Empty,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_children(mut self, children: impl Into<Node>) -> Self {
        self.children = children.into();
        self
    }

    /// Downcasts the payload; `None` when absent or of a different type.
    pub fn payload<T: 'static>(&self) -> Option<Rc<T>> {
        self.payload.as_ref()?.clone().downcast::<T>().ok()
    }

    pub fn children(&self) -> &Node {
        &self.children
    }

    pub(crate) fn raw_payload(&self) -> Option<Rc<dyn Any>> {
        self.payload.clone()
    }

    pub(crate) fn with_raw_payload(&self, payload: Option<Rc<dyn Any>>) -> Self {
        Self {
            payload,
            children: self.children.clone(),
        }
    }
}

#[derive(Clone)]
pub struct FragmentElement {
    pub flavor: FragmentKind,
    pub children: Node,
}

#[derive(Clone)]
pub struct ProviderElement {
    pub context: RawContext,
    pub value: Rc<dyn Any>,
    pub children: Node,
}

#[derive(Clone)]
pub struct ConsumerElement {
    pub context: RawContext,
    pub render: Rc<dyn Fn(Rc<dyn Any>) -> Node>,
}

#[derive(Clone)]
pub struct LazyElement {
    pub component: Lazy,
    pub props: Props,
}

#[derive(Clone)]
pub struct MemoElement {
    pub inner: Rc<dyn FunctionComponent>,
    pub props: Props,
}

#[derive(Clone)]
pub struct ForwardRefElement {
    pub render: Rc<dyn FunctionComponent>,
    pub props: Props,
}

/// Portals are host-environment-only; the prepass skips them entirely.
#[derive(Clone)]
pub struct PortalElement {
    pub children: Node,
}

#[derive(Clone)]
pub struct UserElement {
    pub component: Rc<dyn FunctionComponent>,
    pub props: Props,
}

#[derive(Clone)]
pub struct StatefulElement {
    pub component: Rc<dyn StatefulComponent>,
    pub props: Props,
}

/// Intrinsic host element: traversed for its children, never mounted.
#[derive(Clone)]
pub struct HostElement {
    pub tag: Rc<str>,
    pub children: Node,
}

#[derive(Clone)]
pub enum Element {
    Fragment(FragmentElement),
    Provider(ProviderElement),
    Consumer(ConsumerElement),
    Lazy(LazyElement),
    Memo(MemoElement),
    ForwardRef(ForwardRefElement),
    Portal(PortalElement),
    Host(HostElement),
    Component(UserElement),
    Stateful(StatefulElement),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Fragment(_) => ElementKind::Fragment,
            Element::Provider(_) => ElementKind::Provider,
            Element::Consumer(_) => ElementKind::Consumer,
            Element::Lazy(_) => ElementKind::Lazy,
            Element::Memo(_) => ElementKind::Memo,
            Element::ForwardRef(_) => ElementKind::ForwardRef,
            Element::Portal(_) => ElementKind::Portal,
            Element::Host(_) => ElementKind::Host,
            Element::Component(_) => ElementKind::Component,
            Element::Stateful(_) => ElementKind::Stateful,
        }
    }

    pub fn host(tag: impl Into<Rc<str>>, children: impl Into<Node>) -> Self {
        Element::Host(HostElement {
            tag: tag.into(),
            children: children.into(),
        })
    }

    pub fn fragment(children: impl Into<Node>) -> Self {
        Self::wrapper(FragmentKind::Fragment, children)
    }

    /// Suspense wrappers are transparent here: the prepass resolves the
    /// suspensions themselves, so the fallback is never consulted.
    pub fn suspense(children: impl Into<Node>) -> Self {
        Self::wrapper(FragmentKind::Suspense, children)
    }

    pub fn wrapper(flavor: FragmentKind, children: impl Into<Node>) -> Self {
        Element::Fragment(FragmentElement {
            flavor,
            children: children.into(),
        })
    }

    pub fn component(component: Rc<dyn FunctionComponent>, props: Props) -> Self {
        Element::Component(UserElement { component, props })
    }

    pub fn component_fn(
        f: impl Fn(&mut crate::hooks::Scope<'_>, &Props) -> crate::component::Render + 'static,
        props: Props,
    ) -> Self {
        Self::component(Rc::new(f), props)
    }

    pub fn stateful(component: Rc<dyn StatefulComponent>, props: Props) -> Self {
        Element::Stateful(StatefulElement { component, props })
    }

    pub fn memo(inner: Rc<dyn FunctionComponent>, props: Props) -> Self {
        Element::Memo(MemoElement { inner, props })
    }

    pub fn forward_ref(render: Rc<dyn FunctionComponent>, props: Props) -> Self {
        Element::ForwardRef(ForwardRefElement { render, props })
    }

    pub fn lazy(component: Lazy, props: Props) -> Self {
        Element::Lazy(LazyElement { component, props })
    }

    pub fn portal(children: impl Into<Node>) -> Self {
        Element::Portal(PortalElement {
            children: children.into(),
        })
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Host(host) => write!(f, "Element::Host({})", host.tag),
            other => write!(f, "Element::{:?}", other.kind()),
        }
    }
}

/// Flattens a node into the ordered element list the traversal walks.
///
/// Nested lists are flattened in place; empty and scalar children are
/// dropped, never visited.
pub fn children_of(node: &Node) -> Vec<Element> {
    let mut out = Vec::new();
    collect(node, &mut out);
    out
}

fn collect(node: &Node, out: &mut Vec<Element>) {
    match node {
        Node::Empty | Node::Text(_) => {}
        Node::Element(element) => out.push((**element).clone()),
        Node::List(nodes) => {
            for node in nodes.iter() {
                collect(node, out);
            }
        }
    }
}
