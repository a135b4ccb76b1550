//! The instrumentation pass.

use log::debug;

use crate::{
    model::{CodeModel, Instruction, OpCode, Token},
    weaver::{
        classifier::{self, Candidate},
        cleanup,
        optout::OptOut,
        references::{find_core_library, EntryPoints},
        WeaveStats, WeaverConfig, WeaverLog,
    },
    Result,
};

/// The three instructions that hand `this` to a tracker entry point.
fn tracker_call(entry_point: Token) -> Vec<Instruction> {
    vec![
        Instruction::new(OpCode::Nop),
        Instruction::new(OpCode::Ldarg0),
        Instruction::call(entry_point),
    ]
}

/// Instruments a [`CodeModel`] so its disposable objects report to the tracker.
///
/// Every selected dispose method starts with `nop; ldarg.0; call Unregister` and every
/// selected constructor ends with `nop; ldarg.0; call Register; ret`. Which methods are
/// selected is decided by the classifier and the constructor delegation analysis.
///
/// # Failure Atomicity
///
/// Resolving the tracker runtime and checking every body that will be patched happen
/// before the first mutation. A pass either instruments all candidates or leaves the model
/// untouched.
///
/// # Examples
///
/// ```rust
/// use disposetrack::model::{BodyBuilder, CodeModel, MethodDef, TypeDef, CONSTRUCTOR_NAME};
/// use disposetrack::weaver::{Weaver, WeaverConfig, WeaverLog};
///
/// let mut model = CodeModel::new("Library");
/// let core = model.add_assembly_ref("mscorlib");
/// let object = model.import_type(core, "System", "Object");
/// let object_ctor = model.import_method(object, CONSTRUCTOR_NAME, &[], true);
///
/// let widget = model.add_type(TypeDef::class("Library", "Widget", object));
/// model.add_method(
///     widget,
///     MethodDef::constructor().body(BodyBuilder::new().ldarg(0).call(object_ctor).ret().build()?),
/// )?;
/// model.add_method(
///     widget,
///     MethodDef::new("Dispose").public().body(BodyBuilder::new().ret().build()?),
/// )?;
///
/// let stats = Weaver::new(WeaverConfig::default())
///     .with_log(WeaverLog::silent())
///     .execute(&mut model)?;
/// assert_eq!(stats.types_patched, 1);
/// assert_eq!(stats.constructors_patched, 1);
/// # Ok::<(), disposetrack::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Weaver {
    config: WeaverConfig,
    opt_out: OptOut,
    log: WeaverLog,
}

impl Weaver {
    /// Creates a weaver with the given configuration and the default log.
    #[must_use]
    pub fn new(config: WeaverConfig) -> Self {
        let opt_out = OptOut::new(config.opt_out_marker.clone());
        Self {
            config,
            opt_out,
            log: WeaverLog::default(),
        }
    }

    /// Replaces the log callbacks.
    #[must_use]
    pub fn with_log(mut self, log: WeaverLog) -> Self {
        self.log = log;
        self
    }

    /// The configuration of this weaver.
    #[must_use]
    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    /// Selects the candidates of `model` without changing it.
    #[must_use]
    pub fn candidates(&self, model: &CodeModel) -> Vec<Candidate> {
        classifier::classify(model, &self.config, &self.opt_out, &self.log).candidates
    }

    /// Instruments `model` in place.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::TypeNotFound`] / [`crate::Error::MethodNotFound`] if the runtime
    ///   module does not provide the tracker entry points
    /// - [`crate::Error::MissingCoreReference`] if `model` does not reference a core library
    /// - [`crate::Error::Malformed`] if a method to patch has no body or a constructor does
    ///   not end with `ret`
    ///
    /// On error the model is unchanged.
    pub fn execute(&self, model: &mut CodeModel) -> Result<WeaveStats> {
        let entry_points =
            EntryPoints::resolve(&self.config.runtime, &self.config.tracker_type)
                .inspect_err(|e| self.log.error(&e.to_string()))?;
        let core_library = find_core_library(model, &self.config.core_libraries)
            .inspect_err(|e| self.log.error(&e.to_string()))?;

        let classification = classifier::classify(model, &self.config, &self.opt_out, &self.log);
        for candidate in &classification.candidates {
            Self::check(model, candidate).inspect_err(|e| self.log.error(&e.to_string()))?;
        }

        let references = entry_points.import(model, core_library);
        let mut stats = WeaveStats {
            opted_out_types: classification.opted_out,
            ..WeaveStats::default()
        };

        for candidate in &classification.candidates {
            self.log
                .info(&format!("Patching class {}", candidate.type_name));

            Self::patch_dispose(model, candidate.dispose_method, references.unregister)?;
            stats.dispose_methods_patched += 1;

            for constructor in &candidate.constructors {
                Self::patch_constructor(model, *constructor, references.register)?;
                stats.constructors_patched += 1;
            }
            stats.delegating_constructors_skipped += candidate.delegating.len();
            stats.types_patched += 1;
        }

        stats.markers_removed = cleanup::clean_references(model, &self.opt_out);
        debug!("Weaving '{}' done: {stats}", model.assembly);
        Ok(stats)
    }

    /// Verifies that every method of `candidate` can be patched.
    fn check(model: &CodeModel, candidate: &Candidate) -> Result<()> {
        let dispose = model
            .method(candidate.dispose_method)
            .ok_or_else(|| malformed_error!("Dispose method {} not found", candidate.dispose_method))?;
        if dispose.body.is_none() {
            return Err(malformed_error!(
                "{}::{} has no body",
                candidate.type_name,
                dispose.signature()
            ));
        }

        for token in &candidate.constructors {
            let constructor = model
                .method(*token)
                .ok_or_else(|| malformed_error!("Constructor {} not found", token))?;
            let ends_with_ret = constructor
                .body
                .as_ref()
                .and_then(|body| body.instructions.last())
                .is_some_and(|last| last.opcode == OpCode::Ret);
            if !ends_with_ret {
                return Err(malformed_error!(
                    "{}::{} does not end with ret",
                    candidate.type_name,
                    constructor.signature()
                ));
            }
        }
        Ok(())
    }

    /// Prepends the unregistration call; existing branches keep their targets.
    fn patch_dispose(model: &mut CodeModel, method: Token, unregister: Token) -> Result<()> {
        let body = model
            .method_mut(method)
            .and_then(|m| m.body.as_mut())
            .ok_or_else(|| malformed_error!("Dispose method {} has no body", method))?;

        body.instructions.insert_all(0, tracker_call(unregister));
        body.max_stack = body.max_stack.max(1);
        Ok(())
    }

    /// Inserts the registration call in front of the final `ret`; branches that jumped to
    /// that `ret` now run the registration first.
    fn patch_constructor(model: &mut CodeModel, method: Token, register: Token) -> Result<()> {
        let body = model
            .method_mut(method)
            .and_then(|m| m.body.as_mut())
            .ok_or_else(|| malformed_error!("Constructor {} has no body", method))?;

        let last = body
            .instructions
            .len()
            .checked_sub(1)
            .ok_or_else(|| malformed_error!("Constructor {} has an empty body", method))?;
        body.instructions
            .insert_all_redirecting(last, tracker_call(register));
        body.max_stack = body.max_stack.max(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        model::{BodyBuilder, MethodDef, Operand, TypeDef, CONSTRUCTOR_NAME},
        Error,
    };

    struct Fixture {
        model: CodeModel,
        object: Token,
        object_ctor: Token,
    }

    fn fixture() -> Fixture {
        let mut model = CodeModel::new("Woven");
        let core = model.add_assembly_ref("mscorlib");
        let object = model.import_type(core, "System", "Object");
        let object_ctor = model.import_method(object, CONSTRUCTOR_NAME, &[], true);
        Fixture {
            model,
            object,
            object_ctor,
        }
    }

    fn weaver() -> Weaver {
        Weaver::default().with_log(WeaverLog::silent())
    }

    fn opcodes(model: &CodeModel, method: Token) -> Vec<OpCode> {
        model
            .method(method)
            .unwrap()
            .body
            .as_ref()
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.opcode)
            .collect()
    }

    impl Fixture {
        fn disposable(&mut self, name: &str) -> (Token, Token, Token) {
            let owner = self.model.add_type(TypeDef::class("Woven", name, self.object));
            let ctor = self
                .model
                .add_method(
                    owner,
                    MethodDef::constructor().body(
                        BodyBuilder::new()
                            .ldarg(0)
                            .call(self.object_ctor)
                            .ret()
                            .build()
                            .unwrap(),
                    ),
                )
                .unwrap();
            let dispose = self
                .model
                .add_method(
                    owner,
                    MethodDef::new("Dispose")
                        .public()
                        .body(BodyBuilder::new().nop().ret().build().unwrap()),
                )
                .unwrap();
            (owner, ctor, dispose)
        }
    }

    #[test]
    fn test_patches_dispose_and_constructor() {
        let mut f = fixture();
        let (_, ctor, dispose) = f.disposable("Leafy");

        let stats = weaver().execute(&mut f.model).unwrap();
        assert_eq!(stats.types_patched, 1);
        assert_eq!(stats.dispose_methods_patched, 1);
        assert_eq!(stats.constructors_patched, 1);

        assert_eq!(
            opcodes(&f.model, dispose),
            vec![OpCode::Nop, OpCode::Ldarg0, OpCode::Call, OpCode::Nop, OpCode::Ret]
        );
        assert_eq!(
            opcodes(&f.model, ctor),
            vec![
                OpCode::Ldarg0,
                OpCode::Call,
                OpCode::Nop,
                OpCode::Ldarg0,
                OpCode::Call,
                OpCode::Ret
            ]
        );

        let unregister = f.model.method(dispose).unwrap().body.as_ref().unwrap().instructions[2]
            .operand
            .method()
            .unwrap();
        assert_eq!(
            f.model.method_full_name(unregister).as_deref(),
            Some("DisposeTrack.DisposeTracker::Unregister(System.Object)")
        );
        let register = f.model.method(ctor).unwrap().body.as_ref().unwrap().instructions[4]
            .operand
            .method()
            .unwrap();
        assert_eq!(
            f.model.method_full_name(register).as_deref(),
            Some("DisposeTrack.DisposeTracker::Register(System.Object)")
        );
        assert!(f.model.validate().is_ok());
    }

    #[test]
    fn test_branch_to_final_ret_is_redirected() {
        let mut f = fixture();
        let owner = f.model.add_type(TypeDef::class("Woven", "Early", f.object));
        // if (arg1 == null) goto end; nop; end: ret
        let ctor = f
            .model
            .add_method(
                owner,
                MethodDef::constructor().param("arg", "System.Object").body(
                    BodyBuilder::new()
                        .ldarg(1)
                        .branch(OpCode::Brfalse, "end")
                        .nop()
                        .label("end")
                        .ret()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();
        f.model
            .add_method(
                owner,
                MethodDef::new("Dispose").body(BodyBuilder::new().ret().build().unwrap()),
            )
            .unwrap();

        weaver().execute(&mut f.model).unwrap();

        let body = f.model.method(ctor).unwrap().body.as_ref().unwrap();
        assert_eq!(body.instructions[1].operand, Operand::Target(3));
        assert_eq!(body.instructions[3].opcode, OpCode::Nop);
        assert_eq!(body.instructions[6].opcode, OpCode::Ret);
    }

    #[test]
    fn test_dispose_branches_are_shifted() {
        let mut f = fixture();
        let owner = f.model.add_type(TypeDef::class("Woven", "Looping", f.object));
        let dispose = f
            .model
            .add_method(
                owner,
                MethodDef::new("Dispose").body(
                    BodyBuilder::new()
                        .label("top")
                        .ldarg(0)
                        .branch(OpCode::Brtrue, "top")
                        .ret()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();

        weaver().execute(&mut f.model).unwrap();

        let body = f.model.method(dispose).unwrap().body.as_ref().unwrap();
        assert_eq!(body.instructions[4].operand, Operand::Target(3));
        assert_eq!(body.max_stack, 8);
    }

    #[test]
    fn test_missing_core_library_leaves_model_untouched() {
        let mut model = CodeModel::new("Orphan");
        let vendor = model.add_assembly_ref("Vendor");
        let base = model.import_type(vendor, "Vendor", "Base");
        let owner = model.add_type(TypeDef::class("Orphan", "Thing", base));
        model
            .add_method(
                owner,
                MethodDef::new("Dispose").body(BodyBuilder::new().ret().build().unwrap()),
            )
            .unwrap();
        let before = model.clone();

        let result = weaver().execute(&mut model);
        assert!(matches!(result, Err(Error::MissingCoreReference(_))));
        assert_eq!(model, before);
    }

    #[test]
    fn test_constructor_without_ret_aborts_whole_pass() {
        let mut f = fixture();
        f.disposable("First");
        let owner = f.model.add_type(TypeDef::class("Woven", "Broken", f.object));
        f.model
            .add_method(
                owner,
                MethodDef::constructor().body(BodyBuilder::new().ldarg(0).throw().build().unwrap()),
            )
            .unwrap();
        f.model
            .add_method(
                owner,
                MethodDef::new("Dispose").body(BodyBuilder::new().ret().build().unwrap()),
            )
            .unwrap();
        let before = f.model.clone();

        let result = weaver().execute(&mut f.model);
        assert!(matches!(result, Err(Error::Malformed { .. })));
        assert_eq!(f.model, before);
    }

    #[test]
    fn test_dispose_without_body_aborts() {
        let mut f = fixture();
        let owner = f.model.add_type(TypeDef::class("Woven", "Extern", f.object));
        f.model
            .add_method(owner, MethodDef::new("Dispose"))
            .unwrap();
        let before = f.model.clone();

        let err = weaver().execute(&mut f.model).unwrap_err();
        assert!(err.to_string().contains("Woven.Extern::Dispose() has no body"));
        assert_eq!(f.model, before);
    }

    #[test]
    fn test_custom_runtime_without_entry_points() {
        let mut f = fixture();
        f.disposable("Leafy");
        let before = f.model.clone();

        let config = WeaverConfig::default().with_runtime(CodeModel::new("Empty"), "Empty.Tracker");
        let result = Weaver::new(config)
            .with_log(WeaverLog::silent())
            .execute(&mut f.model);
        assert!(matches!(result, Err(Error::TypeNotFound(_))));
        assert_eq!(f.model, before);
    }

    #[test]
    fn test_log_callbacks() {
        let mut f = fixture();
        f.disposable("Logged");
        let owner = f.model.add_type(TypeDef::class("Woven", "NoCtor", f.object));
        f.model
            .add_method(
                owner,
                MethodDef::new("Dispose").body(BodyBuilder::new().ret().build().unwrap()),
            )
            .unwrap();

        let infos = Arc::new(Mutex::new(Vec::new()));
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let (info_sink, warning_sink) = (infos.clone(), warnings.clone());
        let log = WeaverLog::silent()
            .on_info(move |m| info_sink.lock().unwrap().push(m.to_string()))
            .on_warning(move |m| warning_sink.lock().unwrap().push(m.to_string()));

        let stats = weaver().with_log(log).execute(&mut f.model).unwrap();
        assert_eq!(stats.types_patched, 2);
        assert_eq!(stats.constructors_patched, 1);
        assert_eq!(
            *infos.lock().unwrap(),
            vec!["Patching class Woven.Logged", "Patching class Woven.NoCtor"]
        );
        assert_eq!(warnings.lock().unwrap().len(), 1);
        assert!(warnings.lock().unwrap()[0].starts_with("Woven.NoCtor"));
    }

    #[test]
    fn test_opt_out_marker_is_removed() {
        let mut f = fixture();
        let (owner, ctor, _) = f.disposable("Untracked");
        f.model.types[owner.index().unwrap()]
            .custom_attributes
            .push(crate::model::CustomAttribute::new(
                "DisposeTrack.DoNotTrackAttribute",
            ));
        let before_ctor = f.model.method(ctor).unwrap().clone();

        let stats = weaver().execute(&mut f.model).unwrap();
        assert_eq!(stats.opted_out_types, 1);
        assert_eq!(stats.markers_removed, 1);
        assert!(stats.is_empty());
        assert_eq!(f.model.method(ctor).unwrap(), &before_ctor);
        assert!(f.model.types[0].custom_attributes.is_empty());
    }
}
