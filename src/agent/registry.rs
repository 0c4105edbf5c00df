//! Handler registry: message kind + name -> application callback
//!
//! Each received kind (actions, methods) keeps a map of name-specific
//! handlers and at most one catch-all. Resolution prefers the exact name and
//! falls back to the catch-all; anything else resolves to nothing.

use crate::error::AgentResult;
use crate::protocol::{validate_identifier, validate_topic_segment};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Error type a handler may return; it is logged and counted, never propagated
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every application callback
pub type HandlerResult = Result<(), HandlerError>;

/// Handler for one named action: receives only the action's facts
pub type ActionHandler = Arc<dyn Fn(Vec<Value>) -> HandlerResult + Send + Sync>;

/// Catch-all action handler: receives `(name, facts)`
pub type AnyActionHandler = Arc<dyn Fn(&str, Vec<Value>) -> HandlerResult + Send + Sync>;

/// Method handler, specific or catch-all: receives `(name, payload)`
pub type MethodHandler = Arc<dyn Fn(&str, Value) -> HandlerResult + Send + Sync>;

/// Outcome of a registry lookup
#[derive(Clone)]
pub enum Resolved<S, C> {
    Specific(S),
    CatchAll(C),
}

impl<S, C> Resolved<S, C> {
    pub fn is_catch_all(&self) -> bool {
        matches!(self, Resolved::CatchAll(_))
    }
}

/// Specific handlers plus an optional catch-all for one message kind
pub struct HandlerTable<S, C> {
    specific: HashMap<String, S>,
    catch_all: Option<C>,
}

impl<S: Clone, C: Clone> HandlerTable<S, C> {
    fn new() -> Self {
        Self {
            specific: HashMap::new(),
            catch_all: None,
        }
    }

    fn insert(&mut self, name: &str, handler: S) -> bool {
        self.specific.insert(name.to_string(), handler).is_some()
    }

    fn set_catch_all(&mut self, handler: C) -> bool {
        self.catch_all.replace(handler).is_some()
    }

    fn resolve(&self, name: &str) -> Option<Resolved<S, C>> {
        if let Some(handler) = self.specific.get(name) {
            return Some(Resolved::Specific(handler.clone()));
        }
        self.catch_all.clone().map(Resolved::CatchAll)
    }
}

struct Tables {
    actions: HandlerTable<ActionHandler, AnyActionHandler>,
    methods: HandlerTable<MethodHandler, MethodHandler>,
}

/// Concurrency-safe registry shared by the caller and the dispatch thread
///
/// One lock guards every table. Lookups clone the handler `Arc` out of the
/// lock, so callbacks always run with the lock released.
pub struct HandlerRegistry {
    tables: RwLock<Tables>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                actions: HandlerTable::new(),
                methods: HandlerTable::new(),
            }),
        }
    }

    pub fn register_action<F>(&self, name: &str, handler: F) -> AgentResult<()>
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        validate_identifier("action name", name)?;
        let replaced = self.write().actions.insert(name, Arc::new(handler));
        tracing::debug!(action = name, replaced, "Registered action handler");
        Ok(())
    }

    pub fn register_any_action<F>(&self, handler: F)
    where
        F: Fn(&str, Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        let replaced = self.write().actions.set_catch_all(Arc::new(handler));
        tracing::debug!(replaced, "Registered catch-all action handler");
    }

    pub fn register_method<F>(&self, name: &str, handler: F) -> AgentResult<()>
    where
        F: Fn(&str, Value) -> HandlerResult + Send + Sync + 'static,
    {
        validate_topic_segment("method name", name)?;
        let replaced = self.write().methods.insert(name, Arc::new(handler));
        tracing::debug!(method = name, replaced, "Registered method handler");
        Ok(())
    }

    pub fn register_any_method<F>(&self, handler: F)
    where
        F: Fn(&str, Value) -> HandlerResult + Send + Sync + 'static,
    {
        let replaced = self.write().methods.set_catch_all(Arc::new(handler));
        tracing::debug!(replaced, "Registered catch-all method handler");
    }

    pub fn resolve_action(&self, name: &str) -> Option<Resolved<ActionHandler, AnyActionHandler>> {
        self.read().actions.resolve(name)
    }

    pub fn resolve_method(&self, name: &str) -> Option<Resolved<MethodHandler, MethodHandler>> {
        self.read().methods.resolve(name)
    }

    // Handlers never run under the lock, so a poisoned guard still holds
    // consistent tables.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn recording_method(
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&str, Value) -> HandlerResult + Send + Sync + 'static {
        move |name: &str, _payload: Value| {
            log.lock().unwrap().push(format!("{tag}:{name}"));
            Ok(())
        }
    }

    #[test]
    fn test_unregistered_resolves_to_nothing() {
        let registry = HandlerRegistry::new();
        assert!(registry.resolve_action("anything").is_none());
        assert!(registry.resolve_method("anything").is_none());
    }

    #[test]
    fn test_specific_wins_over_catch_all() {
        let registry = HandlerRegistry::new();
        registry.register_any_action(|_, _| Ok(()));
        registry
            .register_action("reboot", |_| Ok(()))
            .unwrap();

        let resolved = registry.resolve_action("reboot").unwrap();
        assert!(!resolved.is_catch_all());

        let fallback = registry.resolve_action("shutdown").unwrap();
        assert!(fallback.is_catch_all());
    }

    #[test]
    fn test_re_registration_replaces_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new();
        registry
            .register_method("status", recording_method(log.clone(), "first"))
            .unwrap();
        registry
            .register_method("status", recording_method(log.clone(), "second"))
            .unwrap();

        match registry.resolve_method("status") {
            Some(Resolved::Specific(handler)) => handler("status", json!({})).unwrap(),
            _ => panic!("expected specific handler"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["second:status".to_string()]);
    }

    #[test]
    fn test_catch_all_is_replaced() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new();
        registry.register_any_method(recording_method(log.clone(), "old"));
        registry.register_any_method(recording_method(log.clone(), "new"));

        match registry.resolve_method("x") {
            Some(Resolved::CatchAll(handler)) => handler("x", json!(1)).unwrap(),
            _ => panic!("expected catch-all handler"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["new:x".to_string()]);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.register_action("", |_| Ok(())),
            Err(AgentError::InvalidArgument(_))
        ));
        for name in ["", "a/b", "+", "#"] {
            let result = registry.register_method(name, |_, _| Ok(()));
            assert!(
                matches!(result, Err(AgentError::InvalidArgument(_))),
                "method name {name:?} should be rejected"
            );
        }
        assert!(registry.resolve_action("").is_none());
    }

    #[test]
    fn test_action_names_are_not_topic_levels() {
        let registry = HandlerRegistry::new();
        for name in ["deploy/v2", "zone+1", "#all"] {
            registry.register_action(name, |_| Ok(())).unwrap();
            assert!(matches!(
                registry.resolve_action(name),
                Some(Resolved::Specific(_))
            ));
        }
    }

    #[test]
    fn test_concurrent_registration_and_resolution() {
        let registry = HandlerRegistry::new();
        let calls = AtomicUsize::new(0);
        registry.register_any_method(|_, _| Ok(()));

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let registry = &registry;
                scope.spawn(move || {
                    for round in 0..500 {
                        if (writer + round) % 2 == 0 {
                            registry
                                .register_method("status", move |_, _| Ok(()))
                                .unwrap();
                        } else {
                            registry.register_any_method(move |_, _| Ok(()));
                        }
                    }
                });
            }
            for _ in 0..4 {
                let (registry, calls) = (&registry, &calls);
                scope.spawn(move || {
                    for _ in 0..500 {
                        for name in ["status", "other"] {
                            let handler = match registry.resolve_method(name) {
                                Some(Resolved::Specific(handler)) => handler,
                                Some(Resolved::CatchAll(handler)) => handler,
                                None => panic!("{name} resolved to nothing"),
                            };
                            handler(name, json!({})).unwrap();
                            calls.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(calls.load(Ordering::Relaxed), 4 * 500 * 2);
        assert!(matches!(
            registry.resolve_method("status"),
            Some(Resolved::Specific(_))
        ));
    }

    #[test]
    fn test_kinds_are_independent() {
        let registry = HandlerRegistry::new();
        registry
            .register_action("same", |_| Ok(()))
            .unwrap();
        assert!(registry.resolve_method("same").is_none());
    }
}
