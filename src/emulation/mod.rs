//! Reference interpreter for instrumented code models.
//!
//! The interpreter executes method bodies of one or more [`crate::CodeModel`]s so that an
//! instrumented module can be run end to end: constructors register with a
//! [`crate::tracker::DisposeRegistry`], dispose methods unregister, and the host program's
//! console output lands next to the tracker output.
//!
//! It covers exactly the instruction set of [`crate::model::OpCode`]. Calls that leave the
//! loaded modules are answered by [`Hook`]s or ignored.
//!
//! # Key Components
//!
//! - [`Interpreter`] - Loads modules and runs methods
//! - [`Value`], [`ManagedObject`] - The evaluation stack and heap
//! - [`Hook`], [`HookManager`] - Native replacements for methods
//! - [`tracker_hooks`], [`console_hook`] - The stock natives
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use disposetrack::{
//!     emulation::{console_hook, tracker_hooks, Interpreter},
//!     tracker::{DisposeRegistry, StdoutSink},
//!     weaver::references::TRACKER_TYPE,
//!     CodeModel,
//! };
//!
//! let model = CodeModel::from_path(std::path::Path::new("woven.json"))?;
//! let registry = Arc::new(DisposeRegistry::new());
//!
//! let interpreter = Interpreter::new(&model)
//!     .with_hooks(tracker_hooks(&registry, TRACKER_TYPE))
//!     .with_hook(console_hook(Arc::new(StdoutSink)));
//! interpreter.call_static("App.Program", "Main", Vec::new())?;
//! # Ok::<(), disposetrack::Error>(())
//! ```

mod hook;
mod interpreter;
mod value;

pub use hook::{console_hook, tracker_hooks, Hook, HookContext, HookManager, PreHookFn};
pub use interpreter::{Interpreter, DEFAULT_MAX_CALL_DEPTH};
pub use value::{ManagedObject, TypeLocation, Value};
