//! Native method hooks.
//!
//! A [`Hook`] intercepts calls to a method by owner type, name and optionally parameter
//! types, and runs a Rust closure in place of the method. Hooks are consulted before any
//! definition is looked up, so they also stand in for methods that have no body (the
//! tracker entry points) or live in modules that were never loaded (the base class
//! library).
//!
//! # Examples
//!
//! ```rust
//! use disposetrack::emulation::{Hook, HookManager, Value};
//!
//! let mut manager = HookManager::new();
//! manager.register(
//!     Hook::new("math-answer")
//!         .match_name("System.Math", "Answer")
//!         .pre(|_ctx| Ok(Some(Value::Int(42)))),
//! );
//! assert_eq!(manager.len(), 1);
//! ```

use std::{fmt, sync::Arc};

use crate::{
    emulation::Value,
    tracker::{DisposeRegistry, LineSink, ObjectIdentity},
    weaver::references::{REGISTER_METHOD, UNREGISTER_METHOD},
    Error, Result,
};

/// Information about an intercepted call.
#[derive(Debug)]
pub struct HookContext<'a> {
    /// Full name of the declaring type
    pub type_name: &'a str,
    /// Method name
    pub method_name: &'a str,
    /// Full names of the declared parameter types
    pub params: &'a [String],
    /// `this` for instance calls
    pub this: Option<&'a Value>,
    /// Arguments, not including `this`
    pub args: &'a [Value],
}

/// Closure run in place of a hooked method; `Ok(None)` means the method returns nothing.
pub type PreHookFn = Box<dyn Fn(&HookContext<'_>) -> Result<Option<Value>> + Send + Sync>;

/// A method interception rule.
pub struct Hook {
    name: String,
    type_name: Option<String>,
    method_name: Option<String>,
    params: Option<Vec<String>>,
    pre_hook: Option<PreHookFn>,
}

impl Hook {
    /// Creates a hook that matches every call until restricted.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            method_name: None,
            params: None,
            pre_hook: None,
        }
    }

    /// Returns the hook's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Restricts the hook to a method of a type.
    #[must_use]
    pub fn match_name(mut self, type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self.method_name = Some(method_name.into());
        self
    }

    /// Restricts the hook to an exact parameter list.
    #[must_use]
    pub fn match_params(mut self, params: &[&str]) -> Self {
        self.params = Some(params.iter().map(ToString::to_string).collect());
        self
    }

    /// Sets the closure that replaces the hooked method.
    #[must_use]
    pub fn pre<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.pre_hook = Some(Box::new(handler));
        self
    }

    /// Returns `true` if this hook intercepts the call described by `context`.
    #[must_use]
    pub fn matches(&self, context: &HookContext<'_>) -> bool {
        self.type_name
            .as_deref()
            .is_none_or(|t| t == context.type_name)
            && self
                .method_name
                .as_deref()
                .is_none_or(|m| m == context.method_name)
            && self
                .params
                .as_deref()
                .is_none_or(|p| p == context.params)
    }

    /// Runs the hook; a hook without closure swallows the call.
    ///
    /// # Errors
    ///
    /// Returns whatever error the closure returns.
    pub fn execute(&self, context: &HookContext<'_>) -> Result<Option<Value>> {
        match &self.pre_hook {
            Some(handler) => handler(context),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("method_name", &self.method_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of hooks; the first match wins.
#[derive(Debug, Default)]
pub struct HookManager {
    hooks: Vec<Hook>,
}

impl HookManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook behind the existing ones.
    pub fn register(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// The first hook matching `context`.
    #[must_use]
    pub fn find_matching(&self, context: &HookContext<'_>) -> Option<&Hook> {
        self.hooks.iter().find(|h| h.matches(context))
    }

    /// Number of registered hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if no hook is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Iterates over the hooks in match order.
    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.hooks.iter()
    }
}

fn object_argument(context: &HookContext<'_>) -> Result<ObjectIdentity> {
    let object = context
        .args
        .first()
        .and_then(Value::as_object)
        .ok_or_else(|| {
            Error::Emulation(format!(
                "{}::{} expects an object argument",
                context.type_name, context.method_name
            ))
        })?;
    Ok(ObjectIdentity::with_type_name(object, object.type_name()))
}

/// Hooks binding the static entry points of `tracker_type` to `registry`.
///
/// Covers `Register`, `Unregister`, `DumpUndisposedObjects` and `Reset`. Objects are
/// identified by their heap allocation and counted under their runtime type name.
#[must_use]
pub fn tracker_hooks(registry: &Arc<DisposeRegistry>, tracker_type: &str) -> Vec<Hook> {
    let register = Arc::clone(registry);
    let unregister = Arc::clone(registry);
    let dump = Arc::clone(registry);
    let reset = Arc::clone(registry);

    vec![
        Hook::new("tracker-register")
            .match_name(tracker_type, REGISTER_METHOD)
            .pre(move |ctx| {
                register.register(&object_argument(ctx)?);
                Ok(None)
            }),
        Hook::new("tracker-unregister")
            .match_name(tracker_type, UNREGISTER_METHOD)
            .pre(move |ctx| {
                unregister.unregister(&object_argument(ctx)?);
                Ok(None)
            }),
        Hook::new("tracker-dump")
            .match_name(tracker_type, "DumpUndisposedObjects")
            .pre(move |_| {
                dump.dump();
                Ok(None)
            }),
        Hook::new("tracker-reset")
            .match_name(tracker_type, "Reset")
            .pre(move |_| {
                reset.reset();
                Ok(None)
            }),
    ]
}

/// Hook sending `System.Console::WriteLine(System.String)` to `sink`.
#[must_use]
pub fn console_hook(sink: Arc<dyn LineSink>) -> Hook {
    Hook::new("console-writeline")
        .match_name("System.Console", "WriteLine")
        .match_params(&["System.String"])
        .pre(move |ctx| {
            let line = ctx.args.first().and_then(Value::as_str).unwrap_or_default();
            sink.write_line(line);
            Ok(None)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        emulation::ManagedObject,
        tracker::{BufferSink, OutputKind},
    };

    fn context<'a>(
        type_name: &'a str,
        method_name: &'a str,
        params: &'a [String],
        args: &'a [Value],
    ) -> HookContext<'a> {
        HookContext {
            type_name,
            method_name,
            params,
            this: None,
            args,
        }
    }

    #[test]
    fn test_matching() {
        let hook = Hook::new("writeline")
            .match_name("System.Console", "WriteLine")
            .match_params(&["System.String"]);
        let string = vec!["System.String".to_string()];
        let int = vec!["System.Int32".to_string()];

        assert!(hook.matches(&context("System.Console", "WriteLine", &string, &[])));
        assert!(!hook.matches(&context("System.Console", "WriteLine", &int, &[])));
        assert!(!hook.matches(&context("System.Console", "Write", &string, &[])));
        assert!(Hook::new("any").matches(&context("X", "Y", &[], &[])));
    }

    #[test]
    fn test_first_match_wins() {
        let mut manager = HookManager::new();
        manager.register(Hook::new("first").match_name("A", "M"));
        manager.register(Hook::new("second").match_name("A", "M"));
        let found = manager.find_matching(&context("A", "M", &[], &[])).unwrap();
        assert_eq!(found.name(), "first");
        assert!(manager.find_matching(&context("A", "N", &[], &[])).is_none());
    }

    #[test]
    fn test_tracker_hooks_route_to_registry() {
        let output = BufferSink::new();
        let registry = Arc::new(DisposeRegistry::new());
        registry.set_sink(Arc::new(output.clone()));
        registry.set_output_kind(OutputKind::REGISTRATION);

        let mut manager = HookManager::new();
        for hook in tracker_hooks(&registry, "DisposeTrack.DisposeTracker") {
            manager.register(hook);
        }

        let object = Value::Object(ManagedObject::new("Lib.Widget", None));
        let params = vec!["System.Object".to_string()];
        let args = [object];
        for method in ["Register", "Unregister"] {
            let ctx = context("DisposeTrack.DisposeTracker", method, &params, &args);
            manager.find_matching(&ctx).unwrap().execute(&ctx).unwrap();
        }

        assert_eq!(
            output.contents(),
            "*** Creating Lib.Widget 1\n*** Disposing Lib.Widget 1\n"
        );
    }

    #[test]
    fn test_tracker_hook_rejects_non_objects() {
        let registry = Arc::new(DisposeRegistry::new());
        let hooks = tracker_hooks(&registry, "T");
        let args = [Value::Null];
        let ctx = context("T", "Register", &[], &args);
        assert!(matches!(hooks[0].execute(&ctx), Err(Error::Emulation(_))));
    }

    #[test]
    fn test_console_hook() {
        let output = BufferSink::new();
        let hook = console_hook(Arc::new(output.clone()));
        let params = vec!["System.String".to_string()];
        let args = [Value::from("hello")];
        hook.execute(&context("System.Console", "WriteLine", &params, &args))
            .unwrap();
        assert_eq!(output.contents(), "hello\n");
    }
}
