//! # disposetrack Prelude
//!
//! The most commonly used types for instrumenting a module and tracking its objects.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all disposetrack operations
pub use crate::Error;

/// The result type used throughout disposetrack
pub use crate::Result;

// ================================================================================================
// Code Model
// ================================================================================================

/// Module, tokens and definitions
pub use crate::model::{
    BodyBuilder, CodeModel, CustomAttribute, FieldDef, Instruction, InstructionList, MethodDef,
    OpCode, Operand, Token, TypeDef, CONSTRUCTOR_NAME,
};

// ================================================================================================
// Instrumentation
// ================================================================================================

/// The weaver and its configuration
pub use crate::weaver::{WeaveStats, Weaver, WeaverConfig, WeaverLog};

// ================================================================================================
// Runtime Tracking
// ================================================================================================

/// The registry and its output configuration
pub use crate::tracker::{
    BufferSink, DisposeRegistry, LineSink, ObjectIdentity, OutputConfig, OutputKind, StdoutSink,
};

// ================================================================================================
// Emulation
// ================================================================================================

/// Running instrumented models
pub use crate::emulation::{console_hook, tracker_hooks, Interpreter, Value};
