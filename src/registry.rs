use std::collections::HashMap;
use std::sync::Arc;

use crate::context::ResolutionContext;
use crate::errors::Result;
use crate::store::{ContextLevel, Id};

/// A metadata context a namespaced token may name, e.g. `course`.
pub trait MetadataContext: Send + Sync {
    fn name(&self) -> &'static str;
    fn level(&self) -> ContextLevel;
    /// Instance to use when the token doesn't carry `=<id>`.
    fn instance(&self, ctx: &ResolutionContext<'_>) -> Result<Option<Id>>;
}

/// Metadata contexts by name. Cheap to clone; contexts are shared.
#[derive(Clone, Default)]
pub struct ContextRegistry {
    contexts: HashMap<&'static str, Arc<dyn MetadataContext>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `user`, `course`, `coursecat` and `module`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtins::User);
        registry.register(builtins::Course);
        registry.register(builtins::Delegated("coursecat", ContextLevel::CourseCategory));
        registry.register(builtins::Delegated("module", ContextLevel::Module));
        registry
    }

    /// Adds `context`, replacing one already registered under its name.
    pub fn register(&mut self, context: impl MetadataContext + 'static) {
        self.contexts.insert(context.name(), Arc::new(context));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn MetadataContext>> {
        self.contexts.get(name).map(Arc::clone)
    }
}

pub mod builtins {
    use super::*;

    /// The current viewer; anonymous viewers have no instance.
    pub struct User;
    impl MetadataContext for User {
        fn name(&self) -> &'static str { "user" }
        fn level(&self) -> ContextLevel { ContextLevel::User }
        fn instance(&self, ctx: &ResolutionContext<'_>) -> Result<Option<Id>> {
            Ok(ctx.viewer.id())
        }
    }

    /// The course the text is rendered in.
    pub struct Course;
    impl MetadataContext for Course {
        fn name(&self) -> &'static str { "course" }
        fn level(&self) -> ContextLevel { ContextLevel::Course }
        fn instance(&self, ctx: &ResolutionContext<'_>) -> Result<Option<Id>> {
            Ok(ctx.scope)
        }
    }

    /// Asks the data source's instance resolver.
    pub struct Delegated(pub &'static str, pub ContextLevel);
    impl MetadataContext for Delegated {
        fn name(&self) -> &'static str { self.0 }
        fn level(&self) -> ContextLevel { self.1 }
        fn instance(&self, ctx: &ResolutionContext<'_>) -> Result<Option<Id>> {
            ctx.data.resolve_instance(self.0, ctx.scope)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Viewer;
    use crate::memory::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_instances() {
        let store = MemoryStore::new().with_instance("module", Some(5), 77);
        let ctx = ResolutionContext::new(Viewer::Authenticated(2), Some(5), &store);
        let reg = ContextRegistry::with_builtins();

        assert_eq!(reg.get("user").unwrap().instance(&ctx).unwrap(), Some(2));
        assert_eq!(reg.get("course").unwrap().instance(&ctx).unwrap(), Some(5));
        assert_eq!(reg.get("module").unwrap().instance(&ctx).unwrap(), Some(77));
        assert_eq!(reg.get("coursecat").unwrap().instance(&ctx).unwrap(), None);
        assert!(reg.get("cohort").is_none());
    }

    #[test]
    fn register_adds_context() {
        let mut reg = ContextRegistry::new();
        assert!(reg.get("course").is_none());
        reg.register(builtins::Course);
        assert_eq!(reg.get("course").unwrap().level(), ContextLevel::Course);
    }

    #[test]
    fn register_replaces_same_name() {
        let mut reg = ContextRegistry::with_builtins();
        reg.register(builtins::Delegated("course", ContextLevel::Course));
        let store = MemoryStore::new().with_instance("course", None, 9);
        let ctx = ResolutionContext::new(Viewer::Anonymous, Some(5), &store);
        assert_eq!(reg.get("course").unwrap().instance(&ctx).unwrap(), Some(9));
    }
}
