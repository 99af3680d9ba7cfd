//! Component contracts: function components, class-style stateful
//! components and their live instances, and lazily loaded components.
//!
//! A body never throws. It returns [`Render`]: either child nodes, or an
//! [`Interrupt`] saying why it stopped, which is either a pending
//! [`Awaitable`] the drain loop must settle before re-running the subtree or
//! a raised error for the boundary chain.

use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use bitflags::bitflags;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use tracing::debug;

use crate::context::{Context, ContextStore, LegacyValues, RawContext};
use crate::element::{Node, Props};
use crate::error::ErrorValue;
use crate::hooks::Scope;

/// Outcome of invoking a component body.
pub type Render = Result<Node, Interrupt>;

/// Why a component body stopped without producing children.
pub enum Interrupt {
    /// The body is waiting on asynchronous work; the subtree renders
    /// nothing until the awaitable settles, then re-runs.
    Suspend(Awaitable),
    /// The body raised an error; the nearest boundary recovers it, or the
    /// whole prepass fails with it.
    Raise(ErrorValue),
}

impl Interrupt {
    pub fn suspend(future: impl Future<Output = Result<(), ErrorValue>> + 'static) -> Self {
        Interrupt::Suspend(Awaitable::new(future))
    }

    pub fn raise(error: impl Into<anyhow::Error>) -> Self {
        Interrupt::Raise(ErrorValue::new(error))
    }
}

/// Shared handle to one pending asynchronous operation.
///
/// This is the single awaitable abstraction of the whole crate: component
/// suspensions, lazy loads, visitor prefetches and cooperative yields all
/// surface as one of these. Clones observe the same settlement.
#[derive(Clone)]
pub struct Awaitable {
    inner: Shared<LocalBoxFuture<'static, Result<(), ErrorValue>>>,
}

impl Awaitable {
    pub fn new(future: impl Future<Output = Result<(), ErrorValue>> + 'static) -> Self {
        Self {
            inner: future.boxed_local().shared(),
        }
    }

    /// Already settled successfully.
    pub fn ready() -> Self {
        Self::new(async { Ok(()) })
    }

    /// Already settled with an error.
    pub fn failed(error: ErrorValue) -> Self {
        Self::new(async move { Err(error) })
    }

    pub(crate) async fn wait(&self) -> Result<(), ErrorValue> {
        self.inner.clone().await
    }
}

/// A function component: invoked with a hook scope and its props.
pub trait FunctionComponent: 'static {
    fn render(&self, scope: &mut Scope<'_>, props: &Props) -> Render;

    /// Payload used when an element carries none.
    fn default_payload(&self) -> Option<Rc<dyn Any>> {
        None
    }
}

impl<F> FunctionComponent for F
where
    F: Fn(&mut Scope<'_>, &Props) -> Render + 'static,
{
    fn render(&self, scope: &mut Scope<'_>, props: &Props) -> Render {
        self(scope, props)
    }
}

/// Wraps a closure into a shareable function component, so several elements
/// can reference the same component value.
pub fn function_component(
    f: impl Fn(&mut Scope<'_>, &Props) -> Render + 'static,
) -> Rc<dyn FunctionComponent> {
    Rc::new(f)
}

bitflags! {
    /// Optional lifecycle capabilities a stateful component declares.
    ///
    /// Declared here rather than probed per call: trait default methods
    /// cannot reveal whether they were overridden, and the mount path needs
    /// to know (the derived-state and will-mount paths are mutually
    /// exclusive, and only declared boundaries catch errors).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lifecycles: u8 {
        const DERIVED_STATE = 1 << 0;
        const WILL_MOUNT = 1 << 1;
        const WILL_UNMOUNT = 1 << 2;
        const CHILD_CONTEXT = 1 << 3;
        const DID_CATCH = 1 << 4;
        const DERIVED_STATE_FROM_ERROR = 1 << 5;
    }
}

impl Lifecycles {
    pub fn catches_errors(self) -> bool {
        self.intersects(Self::DID_CATCH | Self::DERIVED_STATE_FROM_ERROR)
    }
}

/// Class-style component. One value of this trait describes the class; the
/// prepass constructs an [`Instance`] per mounted element.
pub trait StatefulComponent: 'static {
    fn lifecycles(&self) -> Lifecycles {
        Lifecycles::empty()
    }

    /// Payload used when an element carries none.
    fn default_payload(&self) -> Option<Rc<dyn Any>> {
        None
    }

    /// Initial state for a fresh instance.
    fn init(&self, props: &Props, context: &LegacyValues) -> Box<dyn Any>;

    /// Derives the next state from props; `None` keeps the current state.
    /// Runs only when [`Lifecycles::DERIVED_STATE`] is declared, in which
    /// case the legacy will-mount path never runs.
    fn derive_state(&self, _props: &Props, _state: &dyn Any) -> Option<Box<dyn Any>> {
        None
    }

    /// Legacy pre-render hook; may enqueue state through the instance.
    fn will_mount(&self, _instance: &Instance) {}

    fn render(&self, cx: &mut ClassCx<'_>) -> Render;

    /// Legacy child context merged into the subtree's name-keyed map. Runs
    /// only when [`Lifecycles::CHILD_CONTEXT`] is declared.
    fn child_context(&self, _cx: &ClassCx<'_>) -> Vec<(Rc<str>, Rc<dyn Any>)> {
        Vec::new()
    }

    /// Invoked right after render when the will-mount path ran, since no
    /// real commit will ever unmount this instance. A returned error is
    /// swallowed and the hook is not attempted again for this component.
    fn will_unmount(&self, _instance: &Instance) -> Result<(), ErrorValue> {
        Ok(())
    }

    /// Replacement state derived from a caught descendant error.
    fn derive_state_from_error(&self, _error: &ErrorValue) -> Option<Box<dyn Any>> {
        None
    }

    /// Error notification; may enqueue state through the instance.
    fn did_catch(&self, _error: &ErrorValue, _instance: &Instance) {}

    /// Singular typed context dependency; wins over [`context_names`].
    ///
    /// [`context_names`]: StatefulComponent::context_names
    fn context_handle(&self) -> Option<RawContext> {
        None
    }

    /// Declared legacy context names; only these appear in the mask.
    fn context_names(&self) -> Vec<Rc<str>> {
        Vec::new()
    }
}

/// Context handed to a class render.
pub struct ClassCx<'a> {
    pub(crate) instance: &'a Instance,
    pub(crate) ctx: &'a ContextStore,
}

impl<'a> ClassCx<'a> {
    pub fn props(&self) -> &Props {
        self.instance.props()
    }

    pub fn with_state<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.instance.with_state(f)
    }

    pub fn legacy_context(&self) -> &LegacyValues {
        self.instance.legacy_context()
    }

    /// Non-hook context read, for class components bound to a typed handle.
    pub fn read_context<T: 'static>(&self, context: &Context<T>) -> Rc<T> {
        self.ctx.read(context)
    }

    pub fn instance(&self) -> &Instance {
        self.instance
    }
}

pub(crate) enum StateUpdate {
    Replace(Box<dyn Any>),
    Apply(Box<dyn FnOnce(&dyn Any) -> Option<Box<dyn Any>>>),
}

/// Pending-state queue attached to a live instance. Open while the instance
/// is mounting or resuming; dispatches against a closed queue are ignored.
#[derive(Clone)]
pub(crate) struct Updater {
    queue: Rc<RefCell<Option<Vec<StateUpdate>>>>,
}

impl Updater {
    fn new() -> Self {
        Self {
            queue: Rc::new(RefCell::new(Some(Vec::new()))),
        }
    }

    fn push(&self, update: StateUpdate) {
        if let Some(queue) = self.queue.borrow_mut().as_mut() {
            queue.push(update);
        }
    }

    fn replace(&self, state: Box<dyn Any>) {
        let mut slot = self.queue.borrow_mut();
        if slot.is_some() {
            *slot = Some(vec![StateUpdate::Replace(state)]);
        }
    }

    fn drain(&self) -> Vec<StateUpdate> {
        let mut slot = self.queue.borrow_mut();
        match slot.as_mut() {
            Some(queue) => std::mem::take(queue),
            None => Vec::new(),
        }
    }

    fn close(&self) {
        *self.queue.borrow_mut() = None;
    }

    fn reopen(&self) {
        let mut slot = self.queue.borrow_mut();
        if slot.is_none() {
            *slot = Some(Vec::new());
        }
    }
}

/// Live class instance. Stays alive across suspensions of its subtree and
/// across error-boundary re-entries.
pub struct Instance {
    component: Rc<dyn StatefulComponent>,
    props: Props,
    context: LegacyValues,
    state: RefCell<Box<dyn Any>>,
    updater: Updater,
}

pub type InstanceRef = Rc<Instance>;

impl Instance {
    pub(crate) fn new(
        component: Rc<dyn StatefulComponent>,
        props: Props,
        context: LegacyValues,
    ) -> InstanceRef {
        let state = component.init(&props, &context);
        Rc::new(Self {
            component,
            props,
            context,
            state: RefCell::new(state),
            updater: Updater::new(),
        })
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn legacy_context(&self) -> &LegacyValues {
        &self.context
    }

    pub fn with_state<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        let state = self.state.borrow();
        state.downcast_ref::<S>().map(f)
    }

    /// Never mounted for real during a prepass.
    pub fn is_mounted(&self) -> bool {
        false
    }

    pub fn enqueue_force_update(&self) {}

    /// Queues a state transition; applied at the next drain if the instance
    /// is still render-in-progress, ignored otherwise.
    pub fn enqueue_set_state<S: 'static>(&self, update: impl FnOnce(&S) -> S + 'static) {
        self.updater.push(StateUpdate::Apply(Box::new(
            move |prev: &dyn Any| -> Option<Box<dyn Any>> {
                prev.downcast_ref::<S>()
                    .map(|state| Box::new(update(state)) as Box<dyn Any>)
            },
        )));
    }

    /// Queues a full state replacement, resetting any queued transitions.
    pub fn enqueue_replace_state<S: 'static>(&self, state: S) {
        self.updater.replace(Box::new(state));
    }

    pub(crate) fn component(&self) -> &Rc<dyn StatefulComponent> {
        &self.component
    }

    pub(crate) fn set_state_value(&self, state: Box<dyn Any>) {
        *self.state.borrow_mut() = state;
    }

    pub(crate) fn with_state_any<R>(&self, f: impl FnOnce(&dyn Any) -> R) -> R {
        let state = self.state.borrow();
        f(state.as_ref())
    }

    pub(crate) fn drain_pending(&self) {
        for update in self.updater.drain() {
            match update {
                StateUpdate::Replace(state) => *self.state.borrow_mut() = state,
                StateUpdate::Apply(apply) => {
                    let next = {
                        let state = self.state.borrow();
                        apply(state.as_ref())
                    };
                    if let Some(next) = next {
                        *self.state.borrow_mut() = next;
                    }
                }
            }
        }
    }

    pub(crate) fn close_updater(&self) {
        self.updater.close();
    }

    pub(crate) fn reopen_updater(&self) {
        self.updater.reopen();
    }
}

type Loader =
    Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<Rc<dyn FunctionComponent>, ErrorValue>>>;

pub(crate) enum LazyStatus {
    Uninitialized,
    Pending(Awaitable),
    Resolved(Rc<dyn FunctionComponent>),
    Failed,
}

/// Externally visible load status of a [`Lazy`] cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    Uninitialized,
    Pending,
    Resolved,
    Failed,
}

/// Lazily loaded function component.
///
/// The in-flight load is memoized on the cell itself, so every element
/// referencing the same cell shares one load. Distinct cells wrapping the
/// same loader are independent.
#[derive(Clone)]
pub struct Lazy {
    inner: Rc<LazyInner>,
}

struct LazyInner {
    loader: RefCell<Option<Loader>>,
    status: RefCell<LazyStatus>,
}

impl Lazy {
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = Result<Rc<dyn FunctionComponent>, ErrorValue>> + 'static,
    {
        Self {
            inner: Rc::new(LazyInner {
                loader: RefCell::new(Some(Box::new(move || loader().boxed_local()))),
                status: RefCell::new(LazyStatus::Uninitialized),
            }),
        }
    }

    pub fn status(&self) -> LoadStatus {
        match &*self.inner.status.borrow() {
            LazyStatus::Uninitialized => LoadStatus::Uninitialized,
            LazyStatus::Pending(_) => LoadStatus::Pending,
            LazyStatus::Resolved(_) => LoadStatus::Resolved,
            LazyStatus::Failed => LoadStatus::Failed,
        }
    }

    /// Kicks the loader off if nobody has, and hands back the shared
    /// awaitable tracking it. Settled cells return a ready awaitable: load
    /// failure is swallowed here, never surfaced as a rejection.
    pub(crate) fn start(&self) -> Awaitable {
        {
            let status = self.inner.status.borrow();
            match &*status {
                LazyStatus::Pending(awaitable) => return awaitable.clone(),
                LazyStatus::Resolved(_) | LazyStatus::Failed => return Awaitable::ready(),
                LazyStatus::Uninitialized => {}
            }
        }
        let loader = self.inner.loader.borrow_mut().take();
        match loader {
            Some(load) => {
                let inner = Rc::clone(&self.inner);
                let awaitable = Awaitable::new(async move {
                    match load().await {
                        Ok(component) => {
                            *inner.status.borrow_mut() = LazyStatus::Resolved(component);
                        }
                        Err(error) => {
                            debug!(%error, "lazy loader failed; its subtree renders nothing");
                            *inner.status.borrow_mut() = LazyStatus::Failed;
                        }
                    }
                    Ok(())
                });
                *self.inner.status.borrow_mut() = LazyStatus::Pending(awaitable.clone());
                awaitable
            }
            None => {
                *self.inner.status.borrow_mut() = LazyStatus::Failed;
                Awaitable::ready()
            }
        }
    }

    pub(crate) fn resolved(&self) -> Option<Rc<dyn FunctionComponent>> {
        match &*self.inner.status.borrow() {
            LazyStatus::Resolved(component) => Some(Rc::clone(component)),
            _ => None,
        }
    }
}
