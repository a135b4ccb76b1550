//! Core references: the tracker entry points the instrumented code calls.
//!
//! Resolution happens in two steps. [`EntryPoints::resolve`] and [`find_core_library`] only
//! look things up and fail without touching the target model; [`EntryPoints::import`] then
//! adds the assembly, type and member references the inserted calls need.

use crate::{
    model::{CodeModel, MethodDef, MethodModifiers, Token, TypeAttributes, TypeDef},
    Error, Result,
};

/// Full name of the default tracker type.
pub const TRACKER_TYPE: &str = "DisposeTrack.DisposeTracker";

/// Scope name of the built-in runtime module.
pub const RUNTIME_SCOPE: &str = "DisposeTrack";

/// Full name of the parameter type of both entry points.
pub const OBJECT_TYPE: &str = "System.Object";

/// Name of the registration entry point.
pub const REGISTER_METHOD: &str = "Register";

/// Name of the unregistration entry point.
pub const UNREGISTER_METHOD: &str = "Unregister";

/// Builds the built-in runtime module.
///
/// It mirrors the public surface of the tracker runtime: the static `DisposeTracker` class
/// and the `DoNotTrackAttribute` marker. The entry points have no bodies; they are provided
/// natively by [`crate::tracker::DisposeRegistry`].
#[must_use]
pub fn runtime_module() -> CodeModel {
    let mut model = CodeModel::new(RUNTIME_SCOPE);
    let core = model.add_assembly_ref("mscorlib");
    let object = model.import_type(core, "System", "Object");
    let attribute = model.import_type(core, "System", "Attribute");

    let entry_point = |name: &str| {
        MethodDef::new(name)
            .public()
            .static_()
            .param("obj", OBJECT_TYPE)
    };

    let mut tracker = TypeDef::class(RUNTIME_SCOPE, "DisposeTracker", object).flags(
        TypeAttributes::PUBLIC
            | TypeAttributes::ABSTRACT
            | TypeAttributes::SEALED
            | TypeAttributes::BEFORE_FIELD_INIT,
    );
    tracker.methods = vec![
        entry_point(REGISTER_METHOD),
        entry_point(UNREGISTER_METHOD),
        MethodDef::new("DumpUndisposedObjects").public().static_(),
        MethodDef::new("Reset").static_(),
        MethodDef::type_initializer(),
    ];
    model.add_type(tracker);

    let mut marker = TypeDef::class(RUNTIME_SCOPE, "DoNotTrackAttribute", attribute);
    marker.methods = vec![MethodDef::constructor()];
    model.add_type(marker);

    model
}

/// The tracker type and its entry points, as found in a runtime module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoints {
    scope: String,
    namespace: String,
    name: String,
}

/// Member references of the entry points inside the instrumented model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreReferences {
    /// `MemberRef` of `Register(System.Object)`
    pub register: Token,
    /// `MemberRef` of `Unregister(System.Object)`
    pub unregister: Token,
}

impl EntryPoints {
    /// Finds the tracker type and both entry points in `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if `tracker_type` is not defined by `runtime` and
    /// [`Error::MethodNotFound`] if it lacks a static `Register(System.Object)` or
    /// `Unregister(System.Object)`.
    pub fn resolve(runtime: &CodeModel, tracker_type: &str) -> Result<Self> {
        let (_, tracker) = runtime
            .type_defs()
            .find(|(token, _)| runtime.type_full_name(*token).as_deref() == Some(tracker_type))
            .ok_or_else(|| Error::TypeNotFound(tracker_type.to_string()))?;

        for method in [REGISTER_METHOD, UNREGISTER_METHOD] {
            let found = tracker
                .find_method(method, &[OBJECT_TYPE])
                .is_some_and(|m| m.modifiers.contains(MethodModifiers::STATIC));
            if !found {
                return Err(Error::MethodNotFound {
                    method: format!("{method}({OBJECT_TYPE})"),
                    owner: tracker_type.to_string(),
                });
            }
        }

        Ok(Self {
            scope: runtime.assembly.clone(),
            namespace: tracker.namespace.clone(),
            name: tracker.name.clone(),
        })
    }

    /// Adds the references the inserted calls need to `model`, reusing existing entries.
    pub fn import(&self, model: &mut CodeModel, core_library: Token) -> CoreReferences {
        model.import_type(core_library, "System", "Object");

        let scope = model.add_assembly_ref(&self.scope);
        let tracker = model.import_type(scope, &self.namespace, &self.name);
        CoreReferences {
            register: model.import_method(tracker, REGISTER_METHOD, &[OBJECT_TYPE], false),
            unregister: model.import_method(tracker, UNREGISTER_METHOD, &[OBJECT_TYPE], false),
        }
    }
}

/// Finds the core library scope referenced by `model`.
///
/// # Errors
///
/// Returns [`Error::MissingCoreReference`] if none of `candidates` is referenced.
pub fn find_core_library(model: &CodeModel, candidates: &[String]) -> Result<Token> {
    candidates
        .iter()
        .find_map(|name| model.find_assembly_ref(name))
        .ok_or_else(|| Error::MissingCoreReference(candidates.join(", ")))
}
