//! Stack-machine interpreter over loaded [`CodeModel`]s.

use log::trace;

use crate::{
    emulation::{
        value::{ManagedObject, TypeLocation},
        Hook, HookContext, HookManager, Value,
    },
    model::{CodeModel, MethodDef, MethodModifiers, OpCode, Operand, Token, TypeDef},
    Error, Result,
};

/// Default bound on nested calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

const VOID: &str = "System.Void";

/// A call site resolved as far as the loaded modules allow.
#[derive(Debug)]
struct CallTarget<'m> {
    owner: String,
    owner_location: Option<TypeLocation>,
    name: String,
    params: Vec<String>,
    has_this: bool,
    definition: Option<(usize, &'m MethodDef)>,
}

/// Executes method bodies of one or more [`CodeModel`]s.
///
/// Modules reference each other by scope name: a `TypeRef` whose scope matches the
/// `assembly` of a loaded module resolves to that module's definition. Calls are routed in
/// this order:
///
/// 1. a registered [`Hook`] matching owner, name and parameters
/// 2. the resolved definition, which must have a body
/// 3. otherwise the call is treated as a no-op returning nothing
///
/// The third rule lets bodies call into the base class library (`System.Object::.ctor`)
/// without modelling it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use disposetrack::emulation::{console_hook, Interpreter};
/// use disposetrack::model::{BodyBuilder, CodeModel, MethodDef, TypeDef};
/// use disposetrack::tracker::BufferSink;
///
/// let mut model = CodeModel::new("App");
/// let core = model.add_assembly_ref("mscorlib");
/// let object = model.import_type(core, "System", "Object");
/// let console = model.import_type(core, "System", "Console");
/// let write_line = model.import_method(console, "WriteLine", &["System.String"], false);
///
/// let program = model.add_type(TypeDef::class("App", "Program", object));
/// model.add_method(
///     program,
///     MethodDef::new("Main").static_().body(
///         BodyBuilder::new().ldstr("hello").call(write_line).ret().build()?,
///     ),
/// )?;
///
/// let output = BufferSink::new();
/// let interpreter = Interpreter::new(&model).with_hook(console_hook(Arc::new(output.clone())));
/// interpreter.call_static("App.Program", "Main", Vec::new())?;
/// assert_eq!(output.contents(), "hello\n");
/// # Ok::<(), disposetrack::Error>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'m> {
    modules: Vec<&'m CodeModel>,
    hooks: HookManager,
    max_call_depth: usize,
}

impl<'m> Interpreter<'m> {
    /// Creates an interpreter with `module` loaded.
    #[must_use]
    pub fn new(module: &'m CodeModel) -> Self {
        Self {
            modules: vec![module],
            hooks: HookManager::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Loads another module that the others may reference by scope name.
    #[must_use]
    pub fn with_module(mut self, module: &'m CodeModel) -> Self {
        self.modules.push(module);
        self
    }

    /// Registers a hook behind the existing ones.
    #[must_use]
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.register(hook);
        self
    }

    /// Registers several hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        for hook in hooks {
            self.hooks.register(hook);
        }
        self
    }

    /// Sets the bound on nested calls.
    #[must_use]
    pub fn with_max_call_depth(mut self, max: usize) -> Self {
        self.max_call_depth = max;
        self
    }

    /// The registered hooks.
    #[must_use]
    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    /// Allocates an object of `type_name` and runs the constructor taking `args.len()`
    /// arguments.
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if no loaded module defines the type,
    /// [`Error::MethodNotFound`] if no constructor takes that many arguments, or any error
    /// raised while running the constructor.
    pub fn create(&self, type_name: &str, args: Vec<Value>) -> Result<Value> {
        let location = self
            .find_type(type_name)
            .ok_or_else(|| Error::TypeNotFound(type_name.to_string()))?;
        let constructor = self
            .type_def(location)
            .and_then(|t| t.constructors().find(|c| c.params.len() == args.len()))
            .ok_or_else(|| Error::MethodNotFound {
                method: format!(".ctor with {} arguments", args.len()),
                owner: type_name.to_string(),
            })?;

        let object = ManagedObject::new(type_name, Some(location));
        let target = self.target_of(location.module, constructor)?;
        self.invoke(&target, Some(Value::Object(object.clone())), args, 0)?;
        Ok(Value::Object(object))
    }

    /// Calls the instance method `method` taking `args.len()` arguments on `this`,
    /// dispatching on the runtime type.
    ///
    /// # Errors
    ///
    /// [`Error::Emulation`] if `this` is not an object of a loaded type,
    /// [`Error::MethodNotFound`] if neither the type nor a base type defines the method,
    /// or any error raised while running it.
    pub fn call(&self, this: &Value, method: &str, args: Vec<Value>) -> Result<Option<Value>> {
        let object = this
            .as_object()
            .ok_or_else(|| Error::Emulation(format!("Cannot call {method} on {this:?}")))?;
        let location = object.location().ok_or_else(|| {
            Error::Emulation(format!("{} is not defined by a loaded module", object.type_name()))
        })?;

        let (module, definition) = self
            .find_in_hierarchy(location, |m| {
                m.name == method && !m.is_static() && m.params.len() == args.len()
            })
            .ok_or_else(|| Error::MethodNotFound {
                method: method.to_string(),
                owner: object.type_name().to_string(),
            })?;

        let target = self.target_of(module, definition)?;
        self.invoke(&target, Some(this.clone()), args, 0)
    }

    /// Calls the static method `method` of `type_name` taking `args.len()` arguments.
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] / [`Error::MethodNotFound`] if the method is not defined by
    /// a loaded module, or any error raised while running it.
    pub fn call_static(&self, type_name: &str, method: &str, args: Vec<Value>) -> Result<Option<Value>> {
        let location = self
            .find_type(type_name)
            .ok_or_else(|| Error::TypeNotFound(type_name.to_string()))?;
        let definition = self
            .type_def(location)
            .and_then(|t| {
                t.methods
                    .iter()
                    .find(|m| m.name == method && m.is_static() && m.params.len() == args.len())
            })
            .ok_or_else(|| Error::MethodNotFound {
                method: method.to_string(),
                owner: type_name.to_string(),
            })?;

        let target = self.target_of(location.module, definition)?;
        self.invoke(&target, None, args, 0)
    }

    fn find_type(&self, full_name: &str) -> Option<TypeLocation> {
        self.modules.iter().enumerate().find_map(|(module, model)| {
            model
                .type_defs()
                .find(|(token, _)| model.type_full_name(*token).as_deref() == Some(full_name))
                .map(|(token, _)| TypeLocation { module, token })
        })
    }

    fn type_def(&self, location: TypeLocation) -> Option<&'m TypeDef> {
        self.modules.get(location.module)?.type_def(location.token)
    }

    /// Resolves a `TypeDef` or `TypeRef` of `module` to a loaded definition.
    fn resolve_type(&self, module: usize, token: Token) -> Option<TypeLocation> {
        let model = self.modules.get(module)?;
        if model.type_def(token).is_some() {
            return Some(TypeLocation { module, token });
        }

        let scope = model.type_scope(token)?;
        let full_name = model.type_full_name(token)?;
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.assembly == scope)
            .find_map(|(index, candidate)| {
                candidate
                    .type_defs()
                    .find(|(t, _)| candidate.type_full_name(*t).as_deref() == Some(&full_name))
                    .map(|(token, _)| TypeLocation {
                        module: index,
                        token,
                    })
            })
    }

    fn base_of(&self, location: TypeLocation) -> Option<TypeLocation> {
        let base = self.type_def(location)?.base?;
        self.resolve_type(location.module, base)
    }

    /// Walks from `location` up the base chain and returns the first method matching
    /// `predicate`.
    fn find_in_hierarchy(
        &self,
        location: TypeLocation,
        predicate: impl Fn(&MethodDef) -> bool,
    ) -> Option<(usize, &'m MethodDef)> {
        let mut current = Some(location);
        let mut steps = 0;
        while let Some(location) = current {
            if steps > self.max_call_depth {
                return None;
            }
            if let Some(method) = self
                .type_def(location)
                .and_then(|t| t.methods.iter().find(|m| predicate(m)))
            {
                return Some((location.module, method));
            }
            current = self.base_of(location);
            steps += 1;
        }
        None
    }

    fn target_of(&self, module: usize, definition: &'m MethodDef) -> Result<CallTarget<'m>> {
        let model = self.modules[module];
        let owner_token = model
            .method_owner(definition.token)
            .ok_or(Error::InvalidToken(definition.token))?;
        Ok(CallTarget {
            owner: model
                .type_full_name(owner_token)
                .ok_or(Error::InvalidToken(owner_token))?,
            owner_location: Some(TypeLocation {
                module,
                token: owner_token,
            }),
            name: definition.name.clone(),
            params: definition
                .params
                .iter()
                .map(|p| p.param_type.clone())
                .collect(),
            has_this: !definition.is_static(),
            definition: Some((module, definition)),
        })
    }

    /// Resolves a method operand of `module`.
    fn resolve_method(&self, module: usize, token: Token) -> Result<CallTarget<'m>> {
        let model = self.modules[module];
        if let Some(definition) = model.method(token) {
            return self.target_of(module, definition);
        }

        let member = model.member_ref(token).ok_or(Error::InvalidToken(token))?;
        let owner = model
            .type_full_name(member.parent)
            .ok_or(Error::InvalidToken(member.parent))?;
        let owner_location = self.resolve_type(module, member.parent);
        let params: Vec<&str> = member.params.iter().map(String::as_str).collect();
        let definition = owner_location.and_then(|location| {
            self.type_def(location)
                .and_then(|t| t.find_method(&member.name, &params))
                .map(|m| (location.module, m))
        });

        Ok(CallTarget {
            owner,
            owner_location,
            name: member.name.clone(),
            params: member.params.clone(),
            has_this: member.has_this,
            definition,
        })
    }

    /// Key under which a field of `module` is stored on objects.
    fn field_key(&self, module: usize, token: Token) -> Result<String> {
        let model = self.modules[module];
        model
            .type_defs()
            .find_map(|(owner, type_def)| {
                type_def
                    .fields
                    .iter()
                    .find(|f| f.token == token)
                    .and_then(|f| Some(format!("{}::{}", model.type_full_name(owner)?, f.name)))
            })
            .ok_or(Error::InvalidToken(token))
    }

    fn invoke(
        &self,
        target: &CallTarget<'m>,
        this: Option<Value>,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Option<Value>> {
        let context = HookContext {
            type_name: &target.owner,
            method_name: &target.name,
            params: &target.params,
            this: this.as_ref(),
            args: &args,
        };
        if let Some(hook) = self.hooks.find_matching(&context) {
            trace!("Hook '{}' handles {}::{}", hook.name(), target.owner, target.name);
            return hook.execute(&context);
        }

        match target.definition {
            Some((module, definition)) => self.execute(module, definition, this, args, depth + 1),
            None => {
                trace!("Skipping unresolved call to {}::{}", target.owner, target.name);
                Ok(None)
            }
        }
    }

    fn execute(
        &self,
        module: usize,
        method: &'m MethodDef,
        this: Option<Value>,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Option<Value>> {
        if depth > self.max_call_depth {
            return Err(Error::RecursionLimit(self.max_call_depth));
        }

        let body = method.body.as_ref().ok_or_else(|| {
            Error::Emulation(format!("{} has no body", method.signature()))
        })?;
        let arguments: Vec<Value> = this.into_iter().chain(args).collect();
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        let pop = |stack: &mut Vec<Value>| {
            stack
                .pop()
                .ok_or_else(|| Error::Emulation(format!("Stack underflow in {}", method.signature())))
        };
        let argument = |index: u16| {
            arguments.get(usize::from(index)).cloned().ok_or_else(|| {
                Error::Emulation(format!("{} has no argument {index}", method.signature()))
            })
        };

        loop {
            let instruction = body.instructions.get(pc).ok_or_else(|| {
                Error::Emulation(format!("{} runs past its last instruction", method.signature()))
            })?;
            pc += 1;

            match (instruction.opcode, &instruction.operand) {
                (OpCode::Nop, _) => {}
                (OpCode::Ldarg0, _) => stack.push(argument(0)?),
                (OpCode::Ldarg1, _) => stack.push(argument(1)?),
                (OpCode::Ldarg2, _) => stack.push(argument(2)?),
                (OpCode::Ldarg3, _) => stack.push(argument(3)?),
                (OpCode::LdargS, Operand::Argument(index)) => stack.push(argument(*index)?),
                (OpCode::Ldnull, _) => stack.push(Value::Null),
                (OpCode::LdcI4, Operand::Int(value)) => stack.push(Value::Int(*value)),
                (OpCode::Ldstr, Operand::String(value)) => stack.push(Value::Str(value.clone())),
                (OpCode::Ldfld, Operand::Field(field)) => {
                    let key = self.field_key(module, *field)?;
                    let object = pop(&mut stack)?;
                    let object = object.as_object().ok_or_else(|| {
                        Error::Emulation(format!("ldfld {key} on {object:?}"))
                    })?;
                    stack.push(object.field(&key));
                }
                (OpCode::Stfld, Operand::Field(field)) => {
                    let key = self.field_key(module, *field)?;
                    let value = pop(&mut stack)?;
                    let object = pop(&mut stack)?;
                    let object = object.as_object().ok_or_else(|| {
                        Error::Emulation(format!("stfld {key} on {object:?}"))
                    })?;
                    object.set_field(key, value);
                }
                (OpCode::Call | OpCode::Callvirt, Operand::Method(token)) => {
                    let mut target = self.resolve_method(module, *token)?;
                    let args = pop_arguments(&mut stack, target.params.len())
                        .ok_or_else(|| Error::Emulation(format!("Stack underflow calling {}", target.name)))?;
                    let this = if target.has_this {
                        Some(pop(&mut stack)?)
                    } else {
                        None
                    };

                    if instruction.opcode == OpCode::Callvirt {
                        self.dispatch(&mut target, this.as_ref())?;
                    }
                    if let Some(value) = self.invoke(&target, this, args, depth)? {
                        stack.push(value);
                    }
                }
                (OpCode::Newobj, Operand::Method(token)) => {
                    let target = self.resolve_method(module, *token)?;
                    let args = pop_arguments(&mut stack, target.params.len())
                        .ok_or_else(|| Error::Emulation(format!("Stack underflow creating {}", target.owner)))?;
                    let object = ManagedObject::new(target.owner.clone(), target.owner_location);
                    self.invoke(&target, Some(Value::Object(object.clone())), args, depth)?;
                    stack.push(Value::Object(object));
                }
                (OpCode::Pop, _) => {
                    pop(&mut stack)?;
                }
                (OpCode::Dup, _) => {
                    let top = pop(&mut stack)?;
                    stack.push(top.clone());
                    stack.push(top);
                }
                (OpCode::Br, Operand::Target(target)) => pc = *target,
                (OpCode::Brtrue, Operand::Target(target)) => {
                    if pop(&mut stack)?.is_true() {
                        pc = *target;
                    }
                }
                (OpCode::Brfalse, Operand::Target(target)) => {
                    if !pop(&mut stack)?.is_true() {
                        pc = *target;
                    }
                }
                (OpCode::Ret, _) => {
                    if method.return_type == VOID {
                        return Ok(None);
                    }
                    return pop(&mut stack).map(Some);
                }
                (OpCode::Throw, _) => {
                    let exception = pop(&mut stack)?;
                    let name = exception
                        .as_object()
                        .map_or_else(|| format!("{exception:?}"), |o| o.type_name().to_string());
                    return Err(Error::Emulation(format!(
                        "{} threw {name}",
                        method.signature()
                    )));
                }
                (opcode, operand) => {
                    return Err(Error::Emulation(format!(
                        "Invalid operand {operand:?} for {opcode}"
                    )))
                }
            }
        }
    }

    /// Replaces the definition of a `callvirt` target with the override found on the
    /// runtime type of `this`.
    fn dispatch(&self, target: &mut CallTarget<'m>, this: Option<&Value>) -> Result<()> {
        let object = match this {
            Some(Value::Object(object)) => object,
            other => {
                return Err(Error::Emulation(format!(
                    "callvirt {}::{} on {other:?}",
                    target.owner, target.name
                )))
            }
        };

        let is_virtual = target
            .definition
            .is_none_or(|(_, m)| m.modifiers.contains(MethodModifiers::VIRTUAL));
        let Some(location) = object.location().filter(|_| is_virtual) else {
            return Ok(());
        };

        if let Some((module, method)) = self.find_in_hierarchy(location, |m| {
            !m.is_static()
                && m.body.is_some()
                && m.name == target.name
                && m.params.len() == target.params.len()
                && m
                    .params
                    .iter()
                    .zip(&target.params)
                    .all(|(p, expected)| &p.param_type == expected)
        }) {
            *target = self.target_of(module, method)?;
        }
        Ok(())
    }
}

/// Pops `count` arguments, returning them in declaration order.
fn pop_arguments(stack: &mut Vec<Value>, count: usize) -> Option<Vec<Value>> {
    let start = stack.len().checked_sub(count)?;
    Some(stack.split_off(start))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        emulation::{console_hook, tracker_hooks},
        model::{BodyBuilder, FieldDef, CONSTRUCTOR_NAME},
        tracker::{BufferSink, DisposeRegistry, OutputKind},
    };

    struct Fixture {
        model: CodeModel,
        object: Token,
        object_ctor: Token,
        write_line: Token,
    }

    fn fixture(assembly: &str) -> Fixture {
        let mut model = CodeModel::new(assembly);
        let core = model.add_assembly_ref("mscorlib");
        let object = model.import_type(core, "System", "Object");
        let object_ctor = model.import_method(object, CONSTRUCTOR_NAME, &[], true);
        let console = model.import_type(core, "System", "Console");
        let write_line = model.import_method(console, "WriteLine", &["System.String"], false);
        Fixture {
            model,
            object,
            object_ctor,
            write_line,
        }
    }

    impl Fixture {
        /// Class with a constructor printing `created` and a virtual `Describe` printing
        /// `described`.
        fn printing_class(&mut self, name: &str, base: Token, base_ctor: Token, created: &str, described: &str) -> Token {
            let owner = self.model.add_type(TypeDef::class("Lib", name, base));
            self.model
                .add_method(
                    owner,
                    MethodDef::constructor().body(
                        BodyBuilder::new()
                            .ldarg(0)
                            .call(base_ctor)
                            .ldstr(created)
                            .call(self.write_line)
                            .ret()
                            .build()
                            .unwrap(),
                    ),
                )
                .unwrap();
            self.model
                .add_method(
                    owner,
                    MethodDef::new("Describe").public().virtual_().body(
                        BodyBuilder::new()
                            .ldstr(described)
                            .call(self.write_line)
                            .ret()
                            .build()
                            .unwrap(),
                    ),
                )
                .unwrap();
            owner
        }
    }

    fn console() -> (BufferSink, Hook) {
        let output = BufferSink::new();
        let hook = console_hook(Arc::new(output.clone()));
        (output, hook)
    }

    #[test]
    fn test_create_and_virtual_dispatch() {
        let mut f = fixture("Lib");
        let (object, object_ctor) = (f.object, f.object_ctor);
        let base = f.printing_class("Base", object, object_ctor, "base ctor", "base");
        let base_ctor = f.model.types[0].methods[0].token;
        f.printing_class("Derived", base, base_ctor, "derived ctor", "derived");

        // Caller invoking Base::Describe through callvirt
        let base_describe = f.model.types[0].methods[1].token;
        let caller = f.model.add_type(TypeDef::class("Lib", "Caller", object));
        let derived_ctor = f.model.types[1].methods[0].token;
        f.model
            .add_method(
                caller,
                MethodDef::new("Run").static_().body(
                    BodyBuilder::new()
                        .newobj(derived_ctor)
                        .callvirt(base_describe)
                        .ret()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();

        let (output, hook) = console();
        let interpreter = Interpreter::new(&f.model).with_hook(hook);
        interpreter.call_static("Lib.Caller", "Run", Vec::new()).unwrap();
        assert_eq!(output.take(), "base ctor\nderived ctor\nderived\n");

        let created = interpreter.create("Lib.Base", Vec::new()).unwrap();
        interpreter.call(&created, "Describe", Vec::new()).unwrap();
        assert_eq!(output.take(), "base ctor\nbase\n");
    }

    #[test]
    fn test_fields_and_branches() {
        let mut f = fixture("Lib");
        let holder = f.model.add_type(TypeDef::class("Lib", "Holder", f.object));
        let inner = f
            .model
            .add_field(holder, FieldDef::new("inner", "System.Object"))
            .unwrap();
        // Stores arg1 and reports whether it was null.
        f.model
            .add_method(
                holder,
                MethodDef::new("Store")
                    .public()
                    .param("value", "System.Object")
                    .returns("System.Int32")
                    .body(
                        BodyBuilder::new()
                            .ldarg(0)
                            .ldarg(1)
                            .stfld(inner)
                            .ldarg(0)
                            .ldfld(inner)
                            .branch(OpCode::Brfalse, "null")
                            .ldc_i4(1)
                            .ret()
                            .label("null")
                            .ldc_i4(0)
                            .ret()
                            .build()
                            .unwrap(),
                    ),
            )
            .unwrap();
        f.model
            .add_method(
                holder,
                MethodDef::constructor().body(BodyBuilder::new().ret().build().unwrap()),
            )
            .unwrap();

        let interpreter = Interpreter::new(&f.model);
        let object = interpreter.create("Lib.Holder", Vec::new()).unwrap();
        assert_eq!(
            interpreter.call(&object, "Store", vec![Value::Null]).unwrap(),
            Some(Value::Int(0))
        );
        assert_eq!(
            interpreter
                .call(&object, "Store", vec![Value::from("x")])
                .unwrap(),
            Some(Value::Int(1))
        );
        assert_eq!(
            object.as_object().unwrap().field("Lib.Holder::inner"),
            Value::from("x")
        );
    }

    #[test]
    fn test_cross_module_base_class() {
        let mut library = fixture("Vendor");
        let (object, object_ctor) = (library.object, library.object_ctor);
        library.printing_class("Stream", object, object_ctor, "stream ctor", "stream");

        let mut app = fixture("App");
        let vendor = app.model.add_assembly_ref("Vendor");
        let stream = app.model.import_type(vendor, "Lib", "Stream");
        let stream_ctor = app.model.import_method(stream, CONSTRUCTOR_NAME, &[], true);
        let file = app.model.add_type(TypeDef::class("App", "File", stream));
        app.model
            .add_method(
                file,
                MethodDef::constructor().body(
                    BodyBuilder::new()
                        .ldarg(0)
                        .call(stream_ctor)
                        .ret()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();

        let (output, hook) = console();
        let interpreter = Interpreter::new(&app.model)
            .with_module(&library.model)
            .with_hook(hook);
        let created = interpreter.create("App.File", Vec::new()).unwrap();
        interpreter.call(&created, "Describe", Vec::new()).unwrap();
        assert_eq!(output.contents(), "stream ctor\nstream\n");
    }

    #[test]
    fn test_tracker_calls_reach_registry() {
        let mut f = fixture("Lib");
        let tracker_scope = f.model.add_assembly_ref("DisposeTrack");
        let tracker = f
            .model
            .import_type(tracker_scope, "DisposeTrack", "DisposeTracker");
        let register = f
            .model
            .import_method(tracker, "Register", &["System.Object"], false);
        let widget = f.model.add_type(TypeDef::class("Lib", "Widget", f.object));
        f.model
            .add_method(
                widget,
                MethodDef::constructor().body(
                    BodyBuilder::new()
                        .ldarg(0)
                        .call(register)
                        .ret()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();

        let output = BufferSink::new();
        let registry = Arc::new(DisposeRegistry::new());
        registry.set_sink(Arc::new(output.clone()));
        registry.set_output_kind(OutputKind::REGISTRATION);

        let interpreter = Interpreter::new(&f.model)
            .with_hooks(tracker_hooks(&registry, "DisposeTrack.DisposeTracker"));
        let _first = interpreter.create("Lib.Widget", Vec::new()).unwrap();
        let _second = interpreter.create("Lib.Widget", Vec::new()).unwrap();

        assert_eq!(
            output.contents(),
            "*** Creating Lib.Widget 1\n*** Creating Lib.Widget 2\n"
        );
        assert_eq!(registry.outstanding_count(), 2);
    }

    #[test]
    fn test_recursion_limit() {
        let mut f = fixture("Lib");
        let looping = f.model.add_type(TypeDef::class("Lib", "Looping", f.object));
        let method = f
            .model
            .add_method(looping, MethodDef::new("Spin").static_())
            .unwrap();
        f.model
            .set_body(method, BodyBuilder::new().call(method).ret().build().unwrap())
            .unwrap();

        let interpreter = Interpreter::new(&f.model).with_max_call_depth(16);
        assert!(matches!(
            interpreter.call_static("Lib.Looping", "Spin", Vec::new()),
            Err(Error::RecursionLimit(16))
        ));
    }

    #[test]
    fn test_errors() {
        let mut f = fixture("Lib");
        let thrower = f.model.add_type(TypeDef::class("Lib", "Thrower", f.object));
        let core = f.model.find_assembly_ref("mscorlib").unwrap();
        let exception = f.model.import_type(core, "System", "Exception");
        let exception_ctor = f.model.import_method(exception, CONSTRUCTOR_NAME, &[], true);
        f.model
            .add_method(
                thrower,
                MethodDef::new("Fail").static_().body(
                    BodyBuilder::new()
                        .newobj(exception_ctor)
                        .throw()
                        .build()
                        .unwrap(),
                ),
            )
            .unwrap();
        f.model
            .add_method(
                thrower,
                MethodDef::new("Underflow")
                    .static_()
                    .body(BodyBuilder::new().pop().ret().build().unwrap()),
            )
            .unwrap();

        let interpreter = Interpreter::new(&f.model);
        let err = interpreter
            .call_static("Lib.Thrower", "Fail", Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("threw System.Exception"));
        assert!(matches!(
            interpreter.call_static("Lib.Thrower", "Underflow", Vec::new()),
            Err(Error::Emulation(_))
        ));
        assert!(matches!(
            interpreter.create("Lib.Missing", Vec::new()),
            Err(Error::TypeNotFound(_))
        ));
        assert!(matches!(
            interpreter.call_static("Lib.Thrower", "Missing", Vec::new()),
            Err(Error::MethodNotFound { .. })
        ));
    }
}
