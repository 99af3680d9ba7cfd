//! The traversal engine: depth-first walk over an explicit cursor stack.
//!
//! The native call stack is never used for descent: a suspension must be
//! resumable at arbitrary depth without unwinding, and a cooperative yield
//! packages the whole remaining stack into a frame and hands control back
//! to the event loop. Context restoration rides on the stack levels: each
//! level carries the undo tokens its element's mutations produced.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::collections::HashSet;
use crate::component::{Awaitable, InstanceRef, Lazy};
use crate::context::{ContextSnapshot, ContextStore, LegacyRestore, StoreRestore};
use crate::element::{children_of, Element, Props};
use crate::error::{ErrorValue, PrepassError};
use crate::hooks::{Hook, HookRuntime, Identity};
use crate::{FunctionComponent, PrepassOptions, Visitor};

/// One queued suspension of a function component.
pub(crate) struct HooksFrame {
    pub component: Rc<dyn FunctionComponent>,
    pub props: Props,
    pub awaitable: Awaitable,
    pub hook_head: Option<Rc<Hook>>,
    pub identity: Identity,
    pub snapshot: ContextSnapshot,
    pub boundary: Option<Rc<BoundaryFrame>>,
}

/// One queued suspension of a class instance.
pub(crate) struct ClassFrame {
    pub instance: InstanceRef,
    pub awaitable: Awaitable,
    pub snapshot: ContextSnapshot,
    pub boundary: Option<Rc<BoundaryFrame>>,
}

/// One queued lazy-component load.
pub(crate) struct LazyFrame {
    pub cell: Lazy,
    pub props: Props,
    pub awaitable: Awaitable,
    pub snapshot: ContextSnapshot,
    pub boundary: Option<Rc<BoundaryFrame>>,
}

/// Cooperative-yield checkpoint: the entire pending cursor stack.
pub(crate) struct YieldFrame {
    pub stack: Traversal,
    pub snapshot: ContextSnapshot,
    pub boundary: Option<Rc<BoundaryFrame>>,
}

/// Registration of an error boundary instance.
///
/// Created when a catching instance first mounts, scoped to its subtree the
/// same way a context binding is. Suspension frames capture a reference at
/// suspend time, so rejections route correctly however deep the nesting;
/// the ancestry is no longer implicit once the call stack is gone.
pub(crate) struct BoundaryFrame {
    pub instance: InstanceRef,
    pub snapshot: ContextSnapshot,
    pub pending_error: RefCell<Option<ErrorValue>>,
    pub reentries: Cell<u32>,
}

pub(crate) enum Frame {
    Hooks(HooksFrame),
    Class(ClassFrame),
    Lazy(LazyFrame),
    Boundary(Rc<BoundaryFrame>),
    Yield(YieldFrame),
}

pub(crate) struct Level {
    children: Vec<Element>,
    index: usize,
    store_restore: Option<StoreRestore>,
    legacy_restore: Option<LegacyRestore>,
    // Some(prev) reinstates `prev` as the current boundary on ascent.
    boundary_restore: Option<Option<Rc<BoundaryFrame>>>,
}

pub(crate) struct Traversal {
    levels: Vec<Level>,
}

impl Traversal {
    fn new(init: Vec<Element>) -> Self {
        Self {
            levels: vec![Level {
                children: init,
                index: 0,
                store_restore: None,
                legacy_restore: None,
                boundary_restore: None,
            }],
        }
    }

    fn is_done(&self) -> bool {
        self.levels.is_empty()
    }
}

pub(crate) struct RenderSession {
    pub ctx: ContextStore,
    pub hooks: Rc<HookRuntime>,
    pub boundary: Option<Rc<BoundaryFrame>>,
    pub pending_boundary: Option<Option<Rc<BoundaryFrame>>>,
    pub queue: VecDeque<Frame>,
    pub visitor: Visitor,
    pub options: PrepassOptions,
    pub unmount_blocked: HashSet<usize>,
}

impl RenderSession {
    pub(crate) fn new(visitor: Visitor, options: PrepassOptions) -> Self {
        Self {
            ctx: ContextStore::default(),
            hooks: HookRuntime::new(),
            boundary: None,
            pending_boundary: None,
            queue: VecDeque::new(),
            visitor,
            options,
            unmount_blocked: HashSet::default(),
        }
    }

    /// Walks `init` depth-first, queuing suspension frames as they are
    /// discovered. If the yield budget runs out mid-walk the remaining
    /// stack is parked at the front of the queue.
    pub(crate) fn visit_children(&mut self, init: Vec<Element>) -> Result<(), PrepassError> {
        self.run_traversal(Traversal::new(init))
    }

    /// Continues a parked cursor stack after a cooperative yield.
    pub(crate) fn resume_yield(&mut self, frame: YieldFrame) -> Result<(), PrepassError> {
        trace!("resuming traversal after cooperative yield");
        self.hooks.clear_identity();
        self.ctx.restore_snapshot(&frame.snapshot);
        self.boundary = frame.boundary.clone();
        self.run_traversal(frame.stack)
    }

    fn run_traversal(&mut self, mut stack: Traversal) -> Result<(), PrepassError> {
        self.visit_loop(&mut stack)?;
        if !stack.is_done() {
            trace!("yield budget exhausted; parking traversal stack");
            self.queue.push_front(Frame::Yield(YieldFrame {
                stack,
                snapshot: self.ctx.snapshot(),
                boundary: self.boundary.clone(),
            }));
        }
        Ok(())
    }

    fn visit_loop(&mut self, stack: &mut Traversal) -> Result<(), PrepassError> {
        let started = Instant::now();
        let mut visited = 0usize;

        while let Some(level) = stack.levels.last_mut() {
            // Budget checks gate on progress: every span handles at least
            // one element, so a tiny budget still terminates.
            if visited > 0 {
                if started.elapsed() > self.options.yield_budget {
                    break;
                }
                if let Some(limit) = self.options.yield_after {
                    if visited >= limit.get() {
                        break;
                    }
                }
            }

            let index = level.index;
            level.index += 1;

            if index < level.children.len() {
                let element = level.children[index].clone();
                visited += 1;
                let children = self.visit_element(&element)?;
                stack.levels.push(Level {
                    children,
                    index: 0,
                    store_restore: self.ctx.flush_store_restore(),
                    legacy_restore: self.ctx.flush_legacy_restore(),
                    boundary_restore: self.pending_boundary.take(),
                });
            } else if let Some(level) = stack.levels.pop() {
                // Level exhausted: ascend, undoing this level's context
                // and boundary mutations exactly once.
                self.ctx.restore_store(level.store_restore);
                self.ctx.restore_legacy(level.legacy_restore);
                if let Some(previous) = level.boundary_restore {
                    self.boundary = previous;
                }
            }
        }
        Ok(())
    }

    /// Classifier dispatch: turns one element into the children to descend
    /// into, mounting components along the way.
    fn visit_element(&mut self, element: &Element) -> Result<Vec<Element>, PrepassError> {
        match element {
            Element::Fragment(fragment) => Ok(children_of(&fragment.children)),
            Element::Provider(provider) => {
                self.ctx
                    .set_provider_value(&provider.context, provider.value.clone());
                Ok(children_of(&provider.children))
            }
            Element::Consumer(consumer) => {
                // The render prop runs synchronously against the resolved
                // value; it takes no component lifecycle path and cannot
                // suspend.
                let value = self.ctx.read_raw(&consumer.context);
                Ok(children_of(&(consumer.render)(value)))
            }
            Element::Lazy(lazy) => self.mount_lazy(&lazy.component, &lazy.props),
            Element::Memo(memo) => {
                // No prior render exists to diff against, so memoization is
                // a plain unwrap here.
                let visited = self.options.visit_all_component_types.then_some(element);
                self.mount_function(&memo.inner, &memo.props, visited)
            }
            Element::ForwardRef(forward) => {
                let visited = self.options.visit_all_component_types.then_some(element);
                self.mount_function(&forward.render, &forward.props, visited)
            }
            Element::Portal(_) => Ok(Vec::new()),
            Element::Host(host) => Ok(children_of(&host.children)),
            Element::Component(user) => {
                if self.should_skip(element) {
                    return Ok(children_of(user.props.children()));
                }
                self.mount_function(&user.component, &user.props, Some(element))
            }
            Element::Stateful(stateful) => {
                if self.should_skip(element) {
                    return Ok(children_of(stateful.props.children()));
                }
                self.mount_class(&stateful.component, &stateful.props, element)
            }
        }
    }

    fn should_skip(&self, element: &Element) -> bool {
        match &self.options.should_skip {
            Some(predicate) => predicate(element),
            None => false,
        }
    }

    /// Sends an error into the boundary chain captured with the failing
    /// frame. Without a reachable boundary the whole prepass fails.
    pub(crate) fn route_error(
        &mut self,
        boundary: Option<Rc<BoundaryFrame>>,
        error: ErrorValue,
    ) -> Result<(), PrepassError> {
        match boundary {
            Some(frame) => {
                if frame.reentries.get() + 1 >= self.options.rerender_limit {
                    debug!("error boundary exceeded its re-render ceiling; dropping subtree");
                    return Ok(());
                }
                frame.reentries.set(frame.reentries.get() + 1);
                debug!(%error, "routing error to nearest boundary");
                *frame.pending_error.borrow_mut() = Some(error);
                self.queue.push_back(Frame::Boundary(frame));
                Ok(())
            }
            None => Err(PrepassError::from(error)),
        }
    }
}
