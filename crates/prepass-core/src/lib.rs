#![doc = r"Suspension-resolving prepass over a virtual element tree.

A synchronous server renderer cannot cope with components that interrupt
their own render on pending asynchronous work. [`render_prepass`] walks the
whole tree ahead of that renderer: it discovers every suspension point
(data-fetching components, lazily loaded components, visitor prefetches),
waits for each one, and re-runs just the suspended subtree until the tree
renders without further interruption. It produces no markup; it only settles
the tree.

All state lives in a per-call session, so overlapping prepass runs in one
process never interfere."]

mod collections;
pub mod component;
pub mod context;
pub mod element;
pub mod error;
pub mod hooks;
mod render;
mod visit;

use std::num::NonZeroUsize;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug_span, Instrument};

pub use component::{
    function_component, Awaitable, ClassCx, FunctionComponent, Instance, InstanceRef, Interrupt,
    Lazy, Lifecycles, LoadStatus, Render, StatefulComponent,
};
pub use context::{Context, LegacyValues, RawContext};
pub use element::{
    children_of, ConsumerElement, Element, ElementKind, ForwardRefElement, FragmentElement,
    FragmentKind, HostElement, LazyElement, MemoElement, Node, PortalElement, Props,
    ProviderElement, StatefulElement, UserElement,
};
pub use error::{ErrorValue, PrepassError};
pub use hooks::{
    Dispatch, FloatBits, Identity, RefBox, Scope, SetState, StateAction, Transition,
};

use visit::{Frame, RenderSession};

/// Callback observing every user-level element the walk mounts. Class
/// components are reported together with their live instance. Returning an
/// awaitable suspends that element exactly like a data-fetch suspension,
/// which is how external prefetching hooks in.
pub type Visitor = Rc<dyn Fn(&Element, Option<&InstanceRef>) -> Option<Awaitable>>;

/// Tuning knobs for one prepass run. The numeric defaults are policy
/// carried over from comparable renderers, not load-bearing semantics.
#[derive(Clone)]
pub struct PrepassOptions {
    /// Wall-clock budget of one traversal span before a cooperative yield.
    pub yield_budget: Duration,
    /// Element-count override for the yield budget; makes yields
    /// deterministic under test.
    pub yield_after: Option<NonZeroUsize>,
    /// Ceiling on render-phase re-renders of a single component, and on
    /// re-entries of a non-recovering error boundary.
    pub rerender_limit: u32,
    /// Elements matching this predicate are not mounted; their children
    /// are walked as if through a host element.
    pub should_skip: Option<Rc<dyn Fn(&Element) -> bool>>,
    /// Also report memo- and forward-ref-wrapped mounts to the visitor.
    pub visit_all_component_types: bool,
}

impl Default for PrepassOptions {
    fn default() -> Self {
        Self {
            yield_budget: Duration::from_millis(5),
            yield_after: None,
            rerender_limit: 25,
            should_skip: None,
            visit_all_component_types: false,
        }
    }
}

/// Walks `root` and settles every suspension in it.
///
/// Fulfills once the tree renders without further interruption; fails with
/// the first error no boundary recovered, verbatim. No partial progress is
/// observable on failure.
pub async fn render_prepass(root: Element) -> Result<(), PrepassError> {
    render_prepass_with(root, None, PrepassOptions::default()).await
}

/// [`render_prepass`] with a visitor and explicit options.
pub async fn render_prepass_with(
    root: Element,
    visitor: Option<Visitor>,
    options: PrepassOptions,
) -> Result<(), PrepassError> {
    let visitor: Visitor =
        visitor.unwrap_or_else(|| Rc::new(|_: &Element, _: Option<&InstanceRef>| None));
    let mut session = RenderSession::new(visitor, options);
    async move {
        // The initial walk is synchronous: an error here rejects the whole
        // run before anything is awaited.
        session.visit_children(vec![root])?;
        flush_frames(&mut session).await
    }
    .instrument(debug_span!("prepass"))
    .await
}

/// Drains the frame queue to a fixed point.
///
/// Frames resolve strictly in discovery order, one at a time: a frame
/// found first is handled first no matter which promise settles sooner.
/// Yield checkpoints sit at the queue front and only hand the event loop a
/// turn before the walk continues.
async fn flush_frames(session: &mut RenderSession) -> Result<(), PrepassError> {
    while let Some(frame) = session.queue.pop_front() {
        match frame {
            Frame::Yield(frame) => {
                futures_lite::future::yield_now().await;
                session.resume_yield(frame)?;
            }
            Frame::Hooks(frame) => match frame.awaitable.wait().await {
                Ok(()) => {
                    let children = session.resume_function(&frame)?;
                    session.visit_children(children)?;
                }
                Err(error) => {
                    let boundary = frame.boundary.clone();
                    session.route_error(boundary, error)?;
                }
            },
            Frame::Class(frame) => match frame.awaitable.wait().await {
                Ok(()) => {
                    let children = session.resume_class(&frame)?;
                    session.visit_children(children)?;
                }
                Err(error) => {
                    let boundary = frame.boundary.clone();
                    session.route_error(boundary, error)?;
                }
            },
            Frame::Lazy(frame) => match frame.awaitable.wait().await {
                Ok(()) => {
                    let children = session.resume_lazy(&frame)?;
                    session.visit_children(children)?;
                }
                Err(error) => {
                    let boundary = frame.boundary.clone();
                    session.route_error(boundary, error)?;
                }
            },
            Frame::Boundary(frame) => {
                let children = session.resume_boundary(&frame)?;
                session.visit_children(children)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
