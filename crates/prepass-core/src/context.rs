//! Tree-scoped context propagation.
//!
//! Two mechanisms coexist: handle-keyed contexts (a [`Context<T>`] bound by
//! provider elements) and the legacy name-keyed map that class-style
//! components fork via their child-context hook. Both live in a
//! [`ContextStore`] owned by a single prepass session, never in process
//! globals, so concurrent runs cannot observe each other.

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collections::HashMap;
use crate::component::StatefulComponent;
use crate::element::{ConsumerElement, Element, Node, ProviderElement};

pub(crate) type ContextKey = u64;

static NEXT_CONTEXT_KEY: AtomicU64 = AtomicU64::new(1);

fn next_context_key() -> ContextKey {
    NEXT_CONTEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

/// Typed handle to a tree-scoped value.
///
/// Cloning the handle is cheap and clones refer to the same logical context.
/// Reading an unbound handle yields its default value.
pub struct Context<T> {
    key: ContextKey,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> PartialEq for Context<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Context<T> {}

impl<T: 'static> Context<T> {
    pub fn new(default: T) -> Self {
        Self {
            key: next_context_key(),
            default: Rc::new(default),
        }
    }

    pub fn raw(&self) -> RawContext {
        RawContext {
            key: self.key,
            default: self.default.clone() as Rc<dyn Any>,
        }
    }

    /// Element binding `value` to this context for its subtree.
    pub fn provider(&self, value: T, children: impl Into<Node>) -> Element {
        Element::Provider(ProviderElement {
            context: self.raw(),
            value: Rc::new(value) as Rc<dyn Any>,
            children: children.into(),
        })
    }

    /// Element invoking `render` with the currently bound value.
    pub fn consumer(&self, render: impl Fn(Rc<T>) -> Node + 'static) -> Element {
        let default = Rc::clone(&self.default);
        Element::Consumer(ConsumerElement {
            context: self.raw(),
            render: Rc::new(move |value: Rc<dyn Any>| match value.downcast::<T>() {
                Ok(value) => render(value),
                Err(_) => render(Rc::clone(&default)),
            }),
        })
    }
}

/// Erased context handle as stored inside provider and consumer elements.
#[derive(Clone)]
pub struct RawContext {
    pub(crate) key: ContextKey,
    pub(crate) default: Rc<dyn Any>,
}

/// Restore token for exactly one provider binding.
pub(crate) struct StoreRestore {
    key: ContextKey,
    prior: Option<Rc<dyn Any>>,
}

/// Restore token for one legacy-context patch.
pub(crate) struct LegacyRestore {
    prior: Vec<(Rc<str>, Option<Rc<dyn Any>>)>,
}

/// Full copy of both context maps, captured whenever a frame suspends.
#[derive(Clone, Default)]
pub(crate) struct ContextSnapshot {
    store: HashMap<ContextKey, Rc<dyn Any>>,
    legacy: HashMap<Rc<str>, Rc<dyn Any>>,
}

/* Context values are modified in place while the tree is walked. Each
   mutation parks its undo information in a `pending_*` slot; the traversal
   flushes that slot into the stack level it pushes for the mutating
   element's children and plays it back when the level pops. The maps thus
   restore themselves recursively on the way up, even though suspension
   breaks the native call stack. */
#[derive(Default)]
pub(crate) struct ContextStore {
    store: HashMap<ContextKey, Rc<dyn Any>>,
    legacy: HashMap<Rc<str>, Rc<dyn Any>>,
    pending_store: Option<StoreRestore>,
    pending_legacy: Option<LegacyRestore>,
}

impl ContextStore {
    /// Binds a provider value, recording the previous binding (or its
    /// explicit absence) as the pending restore token.
    pub fn set_provider_value(&mut self, context: &RawContext, value: Rc<dyn Any>) {
        self.pending_store = Some(StoreRestore {
            key: context.key,
            prior: self.store.get(&context.key).cloned(),
        });
        self.store.insert(context.key, value);
    }

    /// Reads the live binding, falling back to the handle's default.
    pub fn read_raw(&self, context: &RawContext) -> Rc<dyn Any> {
        self.store
            .get(&context.key)
            .cloned()
            .unwrap_or_else(|| context.default.clone())
    }

    pub fn read<T: 'static>(&self, context: &Context<T>) -> Rc<T> {
        match self.store.get(&context.key) {
            Some(value) => value
                .clone()
                .downcast::<T>()
                .unwrap_or_else(|_| Rc::clone(&context.default)),
            None => Rc::clone(&context.default),
        }
    }

    /// Overlays legacy names, recording every overwritten (or absent) prior
    /// value in the pending restore token.
    pub fn assign_legacy(&mut self, patch: Vec<(Rc<str>, Rc<dyn Any>)>) {
        let mut prior = Vec::with_capacity(patch.len());
        for (name, value) in patch {
            prior.push((name.clone(), self.legacy.get(&name).cloned()));
            self.legacy.insert(name, value);
        }
        self.pending_legacy = Some(LegacyRestore { prior });
    }

    pub fn read_legacy(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.legacy.get(name).cloned()
    }

    pub fn flush_store_restore(&mut self) -> Option<StoreRestore> {
        self.pending_store.take()
    }

    pub fn flush_legacy_restore(&mut self) -> Option<LegacyRestore> {
        self.pending_legacy.take()
    }

    /// Undoes exactly one provider binding. Restoring to `None` removes the
    /// key again: "no value yet" is a real state, not a default placeholder.
    pub fn restore_store(&mut self, token: Option<StoreRestore>) {
        if let Some(token) = token {
            match token.prior {
                Some(value) => {
                    self.store.insert(token.key, value);
                }
                None => {
                    self.store.remove(&token.key);
                }
            }
        }
    }

    pub fn restore_legacy(&mut self, token: Option<LegacyRestore>) {
        if let Some(token) = token {
            for (name, prior) in token.prior {
                match prior {
                    Some(value) => {
                        self.legacy.insert(name, value);
                    }
                    None => {
                        self.legacy.remove(&name);
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            store: self.store.clone(),
            legacy: self.legacy.clone(),
        }
    }

    /// Replaces the live maps with a frame's captured snapshot. Pending
    /// restore tokens are dropped: the resumed traversal owns a fresh stack.
    pub fn restore_snapshot(&mut self, snapshot: &ContextSnapshot) {
        self.store = snapshot.store.clone();
        self.legacy = snapshot.legacy.clone();
        self.pending_store = None;
        self.pending_legacy = None;
    }

    /// Resolves the legacy context a class component is allowed to see.
    ///
    /// A declared typed handle wins; otherwise only the declared names that
    /// are currently bound appear in the mask (absent names are excluded,
    /// not nulled); a component declaring neither sees an empty mask.
    pub fn mask_legacy(&self, component: &dyn StatefulComponent) -> LegacyValues {
        if let Some(handle) = component.context_handle() {
            return LegacyValues {
                single: Some(self.read_raw(&handle)),
                names: Rc::default(),
            };
        }
        let declared = component.context_names();
        if declared.is_empty() {
            return LegacyValues::default();
        }
        let mut names = HashMap::default();
        for name in declared {
            if let Some(value) = self.read_legacy(&name) {
                names.insert(name, value);
            }
        }
        LegacyValues {
            single: None,
            names: Rc::new(names),
        }
    }
}

/// Legacy context made visible to one class component.
#[derive(Clone, Default)]
pub struct LegacyValues {
    single: Option<Rc<dyn Any>>,
    names: Rc<HashMap<Rc<str>, Rc<dyn Any>>>,
}

impl LegacyValues {
    /// Value of the component's singular typed context, if it declared one.
    pub fn single<T: 'static>(&self) -> Option<Rc<T>> {
        self.single.as_ref()?.clone().downcast::<T>().ok()
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.names.get(name).cloned()
    }

    pub fn get_as<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name)?.downcast::<T>().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.single.is_none() && self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
