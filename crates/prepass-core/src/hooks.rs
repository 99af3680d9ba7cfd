//! Hook emulation for function components.
//!
//! Each mount gets an unforgeable [`Identity`] and a linked list of hook
//! nodes. The list survives a suspend → resume cycle untouched, so a resumed
//! body replays the same hook sequence against the same state. State
//! dispatches made while the owning identity is still rendering are queued
//! as render-phase updates and replayed by rewinding the hook cursor;
//! dispatches made after the body returned are ignored, a later full render
//! pass will pick them up.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::trace;

use crate::collections::HashMap;
use crate::component::Render;
use crate::context::{Context, ContextStore};

/// Token distinguishing one component mount from every other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Identity(u64);

pub(crate) struct Hook {
    slot: RefCell<HookSlot>,
    next: RefCell<Option<Rc<Hook>>>,
}

impl Hook {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            slot: RefCell::new(HookSlot::Fresh),
            next: RefCell::new(None),
        })
    }
}

pub(crate) enum HookSlot {
    Fresh,
    Reducer { state: Rc<dyn Any>, queue: u64 },
    Memo { value: Rc<dyn Any>, deps: Option<Rc<dyn Any>> },
    Ref(Rc<dyn Any>),
}

/// Per-session hook state shared between the traversal and the dispatch
/// handles captured by component code.
pub(crate) struct HookRuntime {
    identity: Cell<Option<Identity>>,
    first: RefCell<Option<Rc<Hook>>>,
    cursor: RefCell<Option<Rc<Hook>>>,
    scheduled: Cell<bool>,
    updates: RefCell<HashMap<u64, Vec<Box<dyn Any>>>>,
    re_renders: Cell<u32>,
    next_identity: Cell<u64>,
    next_queue: Cell<u64>,
}

impl HookRuntime {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            identity: Cell::new(None),
            first: RefCell::new(None),
            cursor: RefCell::new(None),
            scheduled: Cell::new(false),
            updates: RefCell::new(HashMap::default()),
            re_renders: Cell::new(0),
            next_identity: Cell::new(1),
            next_queue: Cell::new(1),
        })
    }

    pub(crate) fn mint_identity(&self) -> Identity {
        let id = self.next_identity.get();
        self.next_identity.set(id + 1);
        Identity(id)
    }

    fn mint_queue(&self) -> u64 {
        let id = self.next_queue.get();
        self.next_queue.set(id + 1);
        id
    }

    /// Installs a mount's identity and hook-chain head. A resume passes the
    /// head captured by its frame; a fresh mount passes `None`.
    pub(crate) fn begin(&self, identity: Identity, head: Option<Rc<Hook>>) {
        self.identity.set(Some(identity));
        *self.first.borrow_mut() = head;
        *self.cursor.borrow_mut() = None;
    }

    /// Tears the mount down and hands back the hook-chain head so a
    /// suspending frame can keep it alive.
    pub(crate) fn end(&self) -> Option<Rc<Hook>> {
        self.identity.set(None);
        *self.cursor.borrow_mut() = None;
        self.scheduled.set(false);
        self.re_renders.set(0);
        self.first.borrow_mut().take()
    }

    pub(crate) fn clear_identity(&self) {
        self.identity.set(None);
    }

    /// Runs a component body, replaying it while render-phase updates keep
    /// arriving. Past the ceiling the last output stands; a later full
    /// render pass will surface the real diagnostic.
    pub(crate) fn render_with_hooks(
        &self,
        limit: u32,
        mut body: impl FnMut() -> Render,
    ) -> Render {
        *self.cursor.borrow_mut() = None;
        let mut out = body();
        while out.is_ok() && self.scheduled.get() && self.re_renders.get() < limit {
            self.scheduled.set(false);
            self.re_renders.set(self.re_renders.get() + 1);
            *self.cursor.borrow_mut() = None;
            out = body();
        }
        // Updates parked by a suspending body stay queued (they are keyed
        // per hook queue) and re-apply on resume; a completed body's
        // leftovers are dropped with it.
        if out.is_ok() {
            self.updates.borrow_mut().clear();
        }
        self.re_renders.set(0);
        self.scheduled.set(false);
        *self.cursor.borrow_mut() = None;
        out
    }

    fn current_identity(&self) -> Identity {
        match self.identity.get() {
            Some(identity) => identity,
            None => panic!("hooks may only be called while a function component is rendering"),
        }
    }

    /// Advances the cursor, reusing the existing node or appending one.
    fn next_hook(&self) -> Rc<Hook> {
        let cursor = self.cursor.borrow().clone();
        let next = match cursor {
            None => {
                let first = self.first.borrow().clone();
                match first {
                    Some(hook) => hook,
                    None => {
                        let hook = Hook::new();
                        *self.first.borrow_mut() = Some(Rc::clone(&hook));
                        hook
                    }
                }
            }
            Some(current) => {
                let following = current.next.borrow().clone();
                match following {
                    Some(hook) => hook,
                    None => {
                        let hook = Hook::new();
                        *current.next.borrow_mut() = Some(Rc::clone(&hook));
                        hook
                    }
                }
            }
        };
        *self.cursor.borrow_mut() = Some(Rc::clone(&next));
        next
    }

    fn dispatch(&self, identity: Identity, queue: u64, action: Box<dyn Any>) {
        if self.identity.get() == Some(identity) {
            self.scheduled.set(true);
            self.updates
                .borrow_mut()
                .entry(queue)
                .or_default()
                .push(action);
        } else {
            trace!("state dispatch after the owning render completed; ignored");
        }
    }

    fn take_updates(&self, queue: u64) -> Vec<Box<dyn Any>> {
        self.updates.borrow_mut().remove(&queue).unwrap_or_default()
    }
}

fn reducer_state<S: 'static>(hook: &Hook) -> Rc<S> {
    if let HookSlot::Reducer { state, .. } = &*hook.slot.borrow() {
        if let Ok(state) = state.clone().downcast::<S>() {
            return state;
        }
    }
    panic!("state hook changed type between renders; hooks must run in a stable order");
}

/// Dispatcher for a reducer hook. Cheap to clone and safe to call at any
/// time; calls made after the owning render completed are ignored.
pub struct Dispatch<A> {
    identity: Identity,
    queue: u64,
    runtime: Rc<HookRuntime>,
    _marker: PhantomData<fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity,
            queue: self.queue,
            runtime: Rc::clone(&self.runtime),
            _marker: PhantomData,
        }
    }
}

impl<A: 'static> Dispatch<A> {
    pub fn call(&self, action: A) {
        self.runtime
            .dispatch(self.identity, self.queue, Box::new(action));
    }
}

/// Action accepted by the state hook's dispatcher.
pub enum StateAction<T> {
    Set(T),
    With(Rc<dyn Fn(&T) -> T>),
}

fn basic_state_reducer<T>(state: &T, action: StateAction<T>) -> T {
    match action {
        StateAction::Set(value) => value,
        StateAction::With(f) => f(state),
    }
}

/// Setter half of [`Scope::use_state`].
pub struct SetState<T> {
    dispatch: Dispatch<StateAction<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<T: 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.dispatch.call(StateAction::Set(value));
    }

    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch.call(StateAction::With(Rc::new(f)));
    }
}

/// Allocate-once mutable box returned by [`Scope::use_ref`].
pub struct RefBox<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RefBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> RefBox<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.borrow_mut());
    }
}

impl<T: Clone> RefBox<T> {
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

/// Memo dependency wrapper comparing floats by bit pattern, so `NaN`
/// dependencies compare equal to themselves and `-0.0` differs from `0.0`.
#[derive(Clone, Copy, Debug)]
pub struct FloatBits(pub f64);

impl PartialEq for FloatBits {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatBits {}

impl From<f64> for FloatBits {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<f32> for FloatBits {
    fn from(value: f32) -> Self {
        Self(f64::from(value))
    }
}

/// Transition starter returned by [`Scope::use_transition`]. No scheduling
/// happens in a prepass: the callback runs synchronously.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transition;

impl Transition {
    pub fn start(&self, f: impl FnOnce()) {
        f();
    }
}

/// Hook dispatcher handed to a function component for the duration of one
/// body invocation. Holding it outside the body is impossible, which is what
/// makes "hooks outside render" unrepresentable from safe user code.
pub struct Scope<'a> {
    pub(crate) hooks: Rc<HookRuntime>,
    pub(crate) ctx: &'a ContextStore,
}

impl<'a> Scope<'a> {
    pub fn use_state<T: 'static>(&mut self, init: impl FnOnce() -> T) -> (Rc<T>, SetState<T>) {
        let (state, dispatch) = self.use_reducer(basic_state_reducer, init);
        (state, SetState { dispatch })
    }

    pub fn use_reducer<S, A, R>(
        &mut self,
        reducer: R,
        init: impl FnOnce() -> S,
    ) -> (Rc<S>, Dispatch<A>)
    where
        S: 'static,
        A: 'static,
        R: Fn(&S, A) -> S,
    {
        let identity = self.hooks.current_identity();
        let hook = self.hooks.next_hook();

        let existing = {
            if let HookSlot::Reducer { queue, .. } = &*hook.slot.borrow() {
                Some(*queue)
            } else {
                None
            }
        };
        // A resume lands on already-initialized nodes; only a truly fresh
        // node runs the initializer.
        let queue_id = match existing {
            Some(queue) => queue,
            None => {
                let state: Rc<dyn Any> = Rc::new(init());
                let queue = self.hooks.mint_queue();
                *hook.slot.borrow_mut() = HookSlot::Reducer { state, queue };
                queue
            }
        };

        let pending = self.hooks.take_updates(queue_id);
        if !pending.is_empty() {
            let mut next = reducer_state::<S>(&hook);
            for action in pending {
                if let Ok(action) = action.downcast::<A>() {
                    next = Rc::new(reducer(next.as_ref(), *action));
                }
            }
            if let HookSlot::Reducer { state, .. } = &mut *hook.slot.borrow_mut() {
                *state = next as Rc<dyn Any>;
            }
        }

        let state = reducer_state::<S>(&hook);
        let dispatch = Dispatch {
            identity,
            queue: queue_id,
            runtime: Rc::clone(&self.hooks),
            _marker: PhantomData,
        };
        (state, dispatch)
    }

    pub fn use_memo<T, D>(&mut self, deps: D, compute: impl FnOnce() -> T) -> Rc<T>
    where
        T: 'static,
        D: PartialEq + 'static,
    {
        self.hooks.current_identity();
        let hook = self.hooks.next_hook();
        {
            let slot = hook.slot.borrow();
            if let HookSlot::Memo {
                value,
                deps: Some(prev),
            } = &*slot
            {
                if prev.downcast_ref::<D>() == Some(&deps) {
                    if let Ok(value) = value.clone().downcast::<T>() {
                        return value;
                    }
                }
            }
        }
        let value = Rc::new(compute());
        *hook.slot.borrow_mut() = HookSlot::Memo {
            value: value.clone() as Rc<dyn Any>,
            deps: Some(Rc::new(deps)),
        };
        value
    }

    /// The "no dependency array" form: recomputes on every invocation.
    pub fn use_memo_always<T: 'static>(&mut self, compute: impl FnOnce() -> T) -> Rc<T> {
        self.hooks.current_identity();
        let hook = self.hooks.next_hook();
        let value = Rc::new(compute());
        *hook.slot.borrow_mut() = HookSlot::Memo {
            value: value.clone() as Rc<dyn Any>,
            deps: None,
        };
        value
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> RefBox<T> {
        self.hooks.current_identity();
        let hook = self.hooks.next_hook();
        {
            let slot = hook.slot.borrow();
            if let HookSlot::Ref(value) = &*slot {
                if let Ok(inner) = value.clone().downcast::<RefCell<T>>() {
                    return RefBox { inner };
                }
            }
        }
        let inner = Rc::new(RefCell::new(init()));
        *hook.slot.borrow_mut() = HookSlot::Ref(inner.clone() as Rc<dyn Any>);
        RefBox { inner }
    }

    pub fn use_callback<F, D>(&mut self, deps: D, callback: F) -> Rc<F>
    where
        F: 'static,
        D: PartialEq + 'static,
    {
        self.use_memo(deps, move || callback)
    }

    pub fn use_context<T: 'static>(&mut self, context: &Context<T>) -> Rc<T> {
        self.hooks.current_identity();
        self.ctx.read(context)
    }

    /// Non-hook context read; requires no live identity.
    pub fn read_context<T: 'static>(&self, context: &Context<T>) -> Rc<T> {
        self.ctx.read(context)
    }

    // Commit-phase side effects are irrelevant to a prepass; the real
    // renderer runs them.
    pub fn use_effect(&mut self, _effect: impl FnOnce() + 'static) {}

    pub fn use_layout_effect(&mut self, _effect: impl FnOnce() + 'static) {}

    pub fn use_imperative_handle(&mut self, _create: impl FnOnce() + 'static) {}

    pub fn use_debug_value(&mut self, _value: impl fmt::Debug) {}

    pub fn use_transition(&mut self) -> (Transition, bool) {
        (Transition, false)
    }

    pub fn use_deferred_value<T>(&mut self, value: T) -> T {
        value
    }
}
