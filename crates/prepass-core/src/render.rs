//! Component mounters.
//!
//! Every component kind is mounted through here, and every kind can
//! suspend: a mount either returns the children to keep walking or parks a
//! frame on the queue and contributes nothing until the drain loop resumes
//! it. Resume paths restore the frame's captured context, identity and hook
//! state first, then re-enter the same render step the mount used.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::component::{
    ClassCx, FunctionComponent, Instance, InstanceRef, Interrupt, Lazy, Lifecycles, LoadStatus,
    StatefulComponent,
};
use crate::element::{children_of, Element, Props};
use crate::error::PrepassError;
use crate::hooks::{Hook, Identity, Scope};
use crate::visit::{BoundaryFrame, ClassFrame, Frame, HooksFrame, LazyFrame, RenderSession};

fn computed_props(defaults: Option<Rc<dyn Any>>, props: &Props) -> Props {
    match props.raw_payload() {
        Some(_) => props.clone(),
        None => props.with_raw_payload(defaults),
    }
}

impl RenderSession {
    /// Mounts a function component. `visited` carries the element to hand
    /// to the visitor; a visitor-returned awaitable suspends the mount
    /// before the body ever runs.
    pub(crate) fn mount_function(
        &mut self,
        component: &Rc<dyn FunctionComponent>,
        props: &Props,
        visited: Option<&Element>,
    ) -> Result<Vec<Element>, PrepassError> {
        let props = computed_props(component.default_payload(), props);

        if let Some(element) = visited {
            if let Some(awaitable) = (self.visitor)(element, None) {
                trace!("visitor suspended a function component");
                let identity = self.hooks.mint_identity();
                self.queue.push_back(Frame::Hooks(HooksFrame {
                    component: Rc::clone(component),
                    props,
                    awaitable,
                    hook_head: None,
                    identity,
                    snapshot: self.ctx.snapshot(),
                    boundary: self.boundary.clone(),
                }));
                return Ok(Vec::new());
            }
        }

        let identity = self.hooks.mint_identity();
        self.render_function(component, &props, identity, None)
    }

    pub(crate) fn resume_function(
        &mut self,
        frame: &HooksFrame,
    ) -> Result<Vec<Element>, PrepassError> {
        self.ctx.restore_snapshot(&frame.snapshot);
        self.boundary = frame.boundary.clone();
        self.render_function(
            &frame.component,
            &frame.props,
            frame.identity,
            frame.hook_head.clone(),
        )
    }

    fn render_function(
        &mut self,
        component: &Rc<dyn FunctionComponent>,
        props: &Props,
        identity: Identity,
        head: Option<Rc<Hook>>,
    ) -> Result<Vec<Element>, PrepassError> {
        self.hooks.begin(identity, head);
        let out = {
            let hooks = Rc::clone(&self.hooks);
            let ctx = &self.ctx;
            hooks.render_with_hooks(self.options.rerender_limit, || {
                let mut scope = Scope {
                    hooks: Rc::clone(&hooks),
                    ctx,
                };
                component.render(&mut scope, props)
            })
        };
        let head = self.hooks.end();

        match out {
            Ok(node) => Ok(children_of(&node)),
            Err(Interrupt::Suspend(awaitable)) => {
                debug!("function component suspended");
                self.queue.push_back(Frame::Hooks(HooksFrame {
                    component: Rc::clone(component),
                    props: props.clone(),
                    awaitable,
                    hook_head: head,
                    identity,
                    snapshot: self.ctx.snapshot(),
                    boundary: self.boundary.clone(),
                }));
                Ok(Vec::new())
            }
            Err(Interrupt::Raise(error)) => {
                let boundary = self.boundary.clone();
                self.route_error(boundary, error)?;
                Ok(Vec::new())
            }
        }
    }

    pub(crate) fn mount_class(
        &mut self,
        component: &Rc<dyn StatefulComponent>,
        props: &Props,
        element: &Element,
    ) -> Result<Vec<Element>, PrepassError> {
        let props = computed_props(component.default_payload(), props);
        let context = self.ctx.mask_legacy(component.as_ref());
        let instance = Instance::new(Rc::clone(component), props.clone(), context);
        let caps = component.lifecycles();

        // The modern derive-from-props path and the legacy will-mount path
        // are mutually exclusive; only one of them ever runs.
        let mut will_mount_ran = false;
        if caps.contains(Lifecycles::DERIVED_STATE) {
            let next = instance.with_state_any(|state| component.derive_state(&props, state));
            if let Some(next) = next {
                instance.set_state_value(next);
            }
        } else if caps.contains(Lifecycles::WILL_MOUNT) {
            component.will_mount(&instance);
            will_mount_ran = true;
        }
        instance.drain_pending();

        if caps.catches_errors() {
            let frame = Rc::new(BoundaryFrame {
                instance: Rc::clone(&instance),
                snapshot: self.ctx.snapshot(),
                pending_error: RefCell::new(None),
                reentries: Cell::new(0),
            });
            // Scoped like a context binding: the traversal reinstates the
            // previous boundary when this element's subtree is left.
            self.pending_boundary = Some(self.boundary.clone());
            self.boundary = Some(frame);
        }

        if let Some(awaitable) = (self.visitor)(element, Some(&instance)) {
            trace!("visitor suspended a class component");
            self.queue.push_back(Frame::Class(ClassFrame {
                instance,
                awaitable,
                snapshot: self.ctx.snapshot(),
                boundary: self.boundary.clone(),
            }));
            return Ok(Vec::new());
        }

        self.render_class(&instance, will_mount_ran)
    }

    pub(crate) fn resume_class(&mut self, frame: &ClassFrame) -> Result<Vec<Element>, PrepassError> {
        self.ctx.restore_snapshot(&frame.snapshot);
        self.boundary = frame.boundary.clone();
        self.render_class(&frame.instance, false)
    }

    /// Re-enters a boundary after an error was routed to it, running the
    /// recovery lifecycles before the re-render.
    pub(crate) fn resume_boundary(
        &mut self,
        frame: &Rc<BoundaryFrame>,
    ) -> Result<Vec<Element>, PrepassError> {
        self.ctx.restore_snapshot(&frame.snapshot);
        self.boundary = Some(Rc::clone(frame));
        let instance = Rc::clone(&frame.instance);
        let component = Rc::clone(instance.component());
        if let Some(error) = frame.pending_error.borrow_mut().take() {
            debug!(%error, "error boundary re-entering render");
            if let Some(next) = component.derive_state_from_error(&error) {
                instance.set_state_value(next);
            }
            instance.reopen_updater();
            component.did_catch(&error, &instance);
        }
        self.render_class(&instance, false)
    }

    fn render_class(
        &mut self,
        instance: &InstanceRef,
        will_mount_ran: bool,
    ) -> Result<Vec<Element>, PrepassError> {
        instance.drain_pending();
        let component = Rc::clone(instance.component());
        let caps = component.lifecycles();

        let out = {
            let mut cx = ClassCx {
                instance: instance.as_ref(),
                ctx: &self.ctx,
            };
            component.render(&mut cx)
        };

        match out {
            Ok(node) => {
                if caps.contains(Lifecycles::CHILD_CONTEXT) {
                    let patch = {
                        let cx = ClassCx {
                            instance: instance.as_ref(),
                            ctx: &self.ctx,
                        };
                        component.child_context(&cx)
                    };
                    if !patch.is_empty() {
                        self.ctx.assign_legacy(patch);
                    }
                }
                // No commit ever happens, so a will-mount that allocated
                // gets its unmount right away.
                if will_mount_ran && caps.contains(Lifecycles::WILL_UNMOUNT) {
                    self.force_unmount(&component, instance);
                }
                instance.close_updater();
                Ok(children_of(&node))
            }
            Err(Interrupt::Suspend(awaitable)) => {
                debug!("class component suspended");
                self.queue.push_back(Frame::Class(ClassFrame {
                    instance: Rc::clone(instance),
                    awaitable,
                    snapshot: self.ctx.snapshot(),
                    boundary: self.boundary.clone(),
                }));
                Ok(Vec::new())
            }
            Err(Interrupt::Raise(error)) => {
                let boundary = self.boundary.clone();
                self.route_error(boundary, error)?;
                Ok(Vec::new())
            }
        }
    }

    fn force_unmount(&mut self, component: &Rc<dyn StatefulComponent>, instance: &InstanceRef) {
        let key = Rc::as_ptr(component) as *const () as usize;
        if self.unmount_blocked.contains(&key) {
            return;
        }
        if let Err(error) = component.will_unmount(instance) {
            debug!(%error, "will_unmount failed; not attempting it again for this component");
            self.unmount_blocked.insert(key);
        }
    }

    pub(crate) fn mount_lazy(
        &mut self,
        cell: &Lazy,
        props: &Props,
    ) -> Result<Vec<Element>, PrepassError> {
        // Already settled cells synthesize (or skip) synchronously; only an
        // unsettled load suspends.
        if let Some(component) = cell.resolved() {
            return Ok(vec![Element::component(component, props.clone())]);
        }
        if cell.status() == LoadStatus::Failed {
            return Ok(Vec::new());
        }
        let awaitable = cell.start();
        self.queue.push_back(Frame::Lazy(LazyFrame {
            cell: cell.clone(),
            props: props.clone(),
            awaitable,
            snapshot: self.ctx.snapshot(),
            boundary: self.boundary.clone(),
        }));
        Ok(Vec::new())
    }

    pub(crate) fn resume_lazy(&mut self, frame: &LazyFrame) -> Result<Vec<Element>, PrepassError> {
        self.ctx.restore_snapshot(&frame.snapshot);
        self.hooks.clear_identity();
        self.boundary = frame.boundary.clone();
        match frame.cell.resolved() {
            Some(component) => Ok(vec![Element::component(component, frame.props.clone())]),
            None => Ok(Vec::new()),
        }
    }
}
