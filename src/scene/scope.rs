use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::resources::UniformValue;

/// One level of the uniform scope chain.
///
/// Lookups that miss locally fall through to the parent. Pushing a scope
/// allocates an empty child pointing at the current one; popping hands the
/// parent back unchanged, so nothing a child sets is visible after the pop.
#[derive(Debug, Default)]
pub struct UniformScope {
    parent: Option<Rc<UniformScope>>,
    locals: RefCell<FxHashMap<String, UniformValue>>,
}

impl UniformScope {
    #[must_use]
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Empty scope inheriting from `parent`.
    #[must_use]
    pub fn child(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(parent)),
            locals: RefCell::default(),
        })
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Rc<Self>> {
        self.parent.as_ref()
    }

    /// Number of ancestors; the root scope has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent.as_deref();
        while let Some(scope) = cursor {
            depth += 1;
            cursor = scope.parent.as_deref();
        }
        depth
    }

    /// Sets `name` in this scope only, shadowing any ancestor.
    pub fn set(&self, name: impl Into<String>, value: UniformValue) {
        self.locals.borrow_mut().insert(name.into(), value);
    }

    /// Nearest definition of `name`, walking up the chain.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            if let Some(value) = scope.locals.borrow().get(name) {
                return Some(value.clone());
            }
            cursor = scope.parent.as_deref();
        }
        None
    }

    #[must_use]
    pub fn has_local(&self, name: &str) -> bool {
        self.locals.borrow().contains_key(name)
    }

    /// Every visible name with its nearest value.
    #[must_use]
    pub fn flatten(&self) -> FxHashMap<String, UniformValue> {
        let mut chain = Vec::with_capacity(self.depth() + 1);
        let mut cursor = Some(self);
        while let Some(scope) = cursor {
            chain.push(scope);
            cursor = scope.parent.as_deref();
        }

        let mut flat = FxHashMap::default();
        for scope in chain.into_iter().rev() {
            for (name, value) in scope.locals.borrow().iter() {
                flat.insert(name.clone(), value.clone());
            }
        }
        flat
    }
}
