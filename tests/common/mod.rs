//! Fixture modules shared by the integration tests.
//!
//! `assembly_to_process()` mirrors the assembly the weaver is exercised against: a set of
//! small disposable classes, each probing one classification rule. `external_library()`
//! provides a disposable base class living in another scope.
#![allow(dead_code)]

use std::sync::Arc;

use disposetrack::{
    emulation::{console_hook, tracker_hooks, Interpreter},
    model::{BodyBuilder, CodeModel, FieldDef, MethodBody, MethodDef, Token, TypeDef, CONSTRUCTOR_NAME},
    tracker::{BufferSink, DisposeRegistry, LineSink, OutputKind},
    weaver::{references::TRACKER_TYPE, WeaverLog, DEFAULT_OPT_OUT_MARKER},
    WeaveStats, Weaver, WeaverConfig,
};

pub const ASSEMBLY: &str = "AssemblyToProcess";
pub const EXTERNAL: &str = "ExternalLibrary";

/// Well-known references of a fixture module.
pub struct Refs {
    pub object: Token,
    pub object_ctor: Token,
    pub disposable: Token,
    pub write_line: Token,
}

pub fn core_refs(model: &mut CodeModel) -> Refs {
    let core = model.add_assembly_ref("mscorlib");
    let object = model.import_type(core, "System", "Object");
    let console = model.import_type(core, "System", "Console");
    Refs {
        object,
        object_ctor: model.import_method(object, CONSTRUCTOR_NAME, &[], true),
        disposable: model.import_type(core, "System", "IDisposable"),
        write_line: model.import_method(console, "WriteLine", &["System.String"], false),
    }
}

fn body(builder: BodyBuilder) -> MethodBody {
    builder.build().expect("fixture body")
}

/// `ldarg.0; call base_ctor; <rest>; ret`
fn ctor_body(base_ctor: Token, rest: impl FnOnce(BodyBuilder) -> BodyBuilder) -> MethodBody {
    body(rest(BodyBuilder::new().ldarg(0).call(base_ctor)).ret())
}

fn empty_body() -> MethodBody {
    body(BodyBuilder::new().ret())
}

fn public_dispose(body: MethodBody) -> MethodDef {
    MethodDef::new("Dispose").public().virtual_().body(body)
}

fn protected_dispose(body: MethodBody) -> MethodDef {
    MethodDef::new("Dispose")
        .family()
        .virtual_()
        .param("disposing", "System.Boolean")
        .body(body)
}

fn add(model: &mut CodeModel, owner: Token, method: MethodDef) -> Token {
    model.add_method(owner, method).expect("fixture method")
}

pub fn external_library() -> CodeModel {
    let mut model = CodeModel::new(EXTERNAL);
    let refs = core_refs(&mut model);

    let base = model.add_type(
        TypeDef::class(EXTERNAL, "DisposableBase", refs.object).implements(refs.disposable),
    );
    add(
        &mut model,
        base,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| b)),
    );
    let dispose_bool = add(&mut model, base, protected_dispose(empty_body()));
    add(
        &mut model,
        base,
        public_dispose(body(
            BodyBuilder::new()
                .ldarg(0)
                .ldc_i4(1)
                .callvirt(dispose_bool)
                .ret(),
        )),
    );
    model
}

pub fn assembly_to_process() -> CodeModel {
    let mut model = CodeModel::new(ASSEMBLY);
    let refs = core_refs(&mut model);
    let class = |model: &mut CodeModel, name: &str, base: Token| {
        model.add_type(TypeDef::class(ASSEMBLY, name, base).implements(refs.disposable))
    };

    // public class AllObjectsDisposed : IDisposable
    let all_disposed = class(&mut model, "AllObjectsDisposed", refs.object);
    let all_disposed_ctor = add(
        &mut model,
        all_disposed,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| {
            b.ldstr("Created AllObjectsDisposed").call(refs.write_line)
        })),
    );
    add(
        &mut model,
        all_disposed,
        public_dispose(body(
            BodyBuilder::new()
                .ldstr("Disposed AllObjectsDisposed")
                .call(refs.write_line)
                .ret(),
        )),
    );

    // public class ObjectNotDisposed : IDisposable, never disposes the object it owns
    let not_disposed = class(&mut model, "ObjectNotDisposed", refs.object);
    let owned = model
        .add_field(
            not_disposed,
            FieldDef::new("_allObjectsDisposed", "AssemblyToProcess.AllObjectsDisposed"),
        )
        .expect("fixture field");
    add(
        &mut model,
        not_disposed,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| {
            b.ldarg(0).newobj(all_disposed_ctor).stfld(owned)
        })),
    );
    add(&mut model, not_disposed, public_dispose(empty_body()));

    // public class TwoConstructorsCallingEachOther : IDisposable
    //   ctor() : this("default") and ctor(string) : base()
    let calling = class(&mut model, "TwoConstructorsCallingEachOther", refs.object);
    let calling_primary = add(
        &mut model,
        calling,
        MethodDef::constructor()
            .param("name", "System.String")
            .body(ctor_body(refs.object_ctor, |b| b)),
    );
    add(
        &mut model,
        calling,
        MethodDef::constructor().body(body(
            BodyBuilder::new()
                .ldarg(0)
                .ldstr("default")
                .call(calling_primary)
                .ret(),
        )),
    );
    add(&mut model, calling, public_dispose(empty_body()));

    // public class TwoIndependentConstructors : IDisposable
    let independent = class(&mut model, "TwoIndependentConstructors", refs.object);
    add(
        &mut model,
        independent,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| b)),
    );
    add(
        &mut model,
        independent,
        MethodDef::constructor()
            .param("name", "System.String")
            .body(ctor_body(refs.object_ctor, |b| b)),
    );
    add(&mut model, independent, public_dispose(empty_body()));

    // public class DerivedClass : AllObjectsDisposed
    let derived = model.add_type(TypeDef::class(ASSEMBLY, "DerivedClass", all_disposed));
    add(
        &mut model,
        derived,
        MethodDef::constructor().body(ctor_body(all_disposed_ctor, |b| b)),
    );

    // public class NoDefaultCtor : IDisposable
    let no_default = class(&mut model, "NoDefaultCtor", refs.object);
    add(
        &mut model,
        no_default,
        MethodDef::constructor()
            .param("name", "System.String")
            .body(ctor_body(refs.object_ctor, |b| b)),
    );
    add(&mut model, no_default, public_dispose(empty_body()));

    // public class BaseClass, not disposable
    let plain_base = model.add_type(TypeDef::class(ASSEMBLY, "BaseClass", refs.object));
    let plain_base_ctor = add(
        &mut model,
        plain_base,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| b)),
    );

    // public class DerivedClassImplementsIDisposable : BaseClass, IDisposable
    let derived_disposable = class(&mut model, "DerivedClassImplementsIDisposable", plain_base);
    add(
        &mut model,
        derived_disposable,
        MethodDef::constructor().body(ctor_body(plain_base_ctor, |b| b)),
    );
    add(&mut model, derived_disposable, public_dispose(empty_body()));

    // public class DerivedFromExternalClass : ExternalLibrary.DisposableBase
    let external_scope = model.add_assembly_ref(EXTERNAL);
    let external_base = model.import_type(external_scope, EXTERNAL, "DisposableBase");
    let external_ctor = model.import_method(external_base, CONSTRUCTOR_NAME, &[], true);
    let from_external = model.add_type(TypeDef::class(
        ASSEMBLY,
        "DerivedFromExternalClass",
        external_base,
    ));
    add(
        &mut model,
        from_external,
        MethodDef::constructor().body(ctor_body(external_ctor, |b| b)),
    );
    add(&mut model, from_external, protected_dispose(empty_body()));

    // public class InternalClass : IDisposable
    //   Dispose() => Dispose(true); protected virtual Dispose(bool)
    let internal = class(&mut model, "InternalClass", refs.object);
    let internal_ctor = add(
        &mut model,
        internal,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| b)),
    );
    let internal_dispose_bool = add(&mut model, internal, protected_dispose(empty_body()));
    add(
        &mut model,
        internal,
        public_dispose(body(
            BodyBuilder::new()
                .ldarg(0)
                .ldc_i4(1)
                .callvirt(internal_dispose_bool)
                .ret(),
        )),
    );

    // public class DerivedFromInternalClass : InternalClass
    let from_internal = model.add_type(TypeDef::class(
        ASSEMBLY,
        "DerivedFromInternalClass",
        internal,
    ));
    add(
        &mut model,
        from_internal,
        MethodDef::constructor().body(ctor_body(internal_ctor, |b| b)),
    );
    add(&mut model, from_internal, protected_dispose(empty_body()));

    // [DoNotTrack] public class UntrackedClass : IDisposable
    let untracked = model.add_type(
        TypeDef::class(ASSEMBLY, "UntrackedClass", refs.object)
            .implements(refs.disposable)
            .attribute(DEFAULT_OPT_OUT_MARKER),
    );
    add(
        &mut model,
        untracked,
        MethodDef::constructor().body(ctor_body(refs.object_ctor, |b| b)),
    );
    add(&mut model, untracked, public_dispose(empty_body()));

    model
}

/// Weaves `model` with the default configuration and a silent log.
pub fn weave(model: &mut CodeModel) -> WeaveStats {
    Weaver::new(WeaverConfig::default())
        .with_log(WeaverLog::silent())
        .execute(model)
        .expect("weaving succeeds")
}

/// The woven fixture assembly plus a registry whose output goes to `output`.
pub struct Harness {
    pub model: CodeModel,
    pub external: CodeModel,
    pub registry: Arc<DisposeRegistry>,
    pub output: BufferSink,
}

impl Harness {
    pub fn new() -> Self {
        let mut model = assembly_to_process();
        weave(&mut model);

        let output = BufferSink::new();
        let registry = Arc::new(DisposeRegistry::new());
        registry.set_sink(Arc::new(output.clone()));
        Self {
            model,
            external: external_library(),
            registry,
            output,
        }
    }

    /// Resets the registry and selects the output channels.
    pub fn set_output_kind(&self, kind: OutputKind) {
        self.registry.reset();
        self.registry.set_output_kind(kind);
    }

    /// Interpreter writing console output to the same buffer as the registry.
    pub fn interpreter(&self) -> Interpreter<'_> {
        self.interpreter_with_console(Arc::new(self.output.clone()))
    }

    pub fn interpreter_with_console(&self, console: Arc<dyn LineSink>) -> Interpreter<'_> {
        Interpreter::new(&self.model)
            .with_module(&self.external)
            .with_hooks(tracker_hooks(&self.registry, TRACKER_TYPE))
            .with_hook(console_hook(console))
    }

    /// Full name of a fixture class.
    pub fn class(name: &str) -> String {
        format!("{ASSEMBLY}.{name}")
    }
}
