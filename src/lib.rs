// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # disposetrack
//!
//! Finds objects that were never disposed.
//!
//! `disposetrack` has two halves that meet at two static entry points:
//!
//! - a **weaver** that rewrites a compiled module (modelled as a [`CodeModel`]) so every
//!   disposable class calls `DisposeTracker.Register(this)` at the end of its constructors
//!   and `DisposeTracker.Unregister(this)` at the start of its dispose method
//! - a **runtime registry** ([`tracker::DisposeRegistry`]) that keeps a weak identity of
//!   every registered object, numbers instances per type and prints what is still alive
//!   whenever something is disposed
//!
//! A reference [`emulation::Interpreter`] runs instrumented models with the tracker entry
//! points bound to a registry, which is how the end-to-end behavior is tested.
//!
//! ## Architecture
//!
//! - [`model`] - Code model: tokens, types, methods, instruction lists, JSON I/O
//! - [`weaver`] - Classification of disposable types and the instrumentation pass
//! - [`tracker`] - The runtime identity registry and its output configuration
//! - [`emulation`] - Reference interpreter with native hooks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use disposetrack::prelude::*;
//! use std::path::Path;
//!
//! let mut model = CodeModel::from_path(Path::new("AssemblyToProcess.json"))?;
//! let stats = Weaver::default().execute(&mut model)?;
//! println!("{stats}");
//! model.write_to_path(Path::new("AssemblyToProcess.json"))?;
//! # Ok::<(), disposetrack::Error>(())
//! ```
//!
//! ## Runtime Output
//!
//! With the default [`tracker::OutputKind`] every registration, every disposal and a dump
//! after each disposal are written to the configured [`tracker::LineSink`]:
//!
//! ```text
//! *** Creating AssemblyToProcess.AllObjectsDisposed 1
//! *** Creating AssemblyToProcess.ObjectNotDisposed 1
//! *** Disposing AssemblyToProcess.ObjectNotDisposed 1
//! **** Undisposed Object Dump:
//! 	AssemblyToProcess.AllObjectsDisposed: 1
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench --bench registry
//! cargo +nightly fuzz run model --release
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use disposetrack::prelude::*;
///
/// let registry = DisposeRegistry::new();
/// registry.set_output_kind(OutputKind::NONE);
/// assert_eq!(registry.outstanding_count(), 0);
/// ```
pub mod prelude;

/// The in-memory code model the weaver operates on.
///
/// A [`CodeModel`] is one compilation unit: type definitions owning methods and fields,
/// method bodies owning their [`model::InstructionList`], and token-addressed references
/// to external scopes, types and members.
///
/// # Key Types
///
/// - [`model::Token`] - Table and row of an entity
/// - [`model::TypeDef`], [`model::MethodDef`], [`model::FieldDef`] - Definitions
/// - [`model::TypeRef`], [`model::MemberRef`], [`model::AssemblyRef`] - References
/// - [`model::InstructionList`] - Branch-preserving instruction sequence
/// - [`model::BodyBuilder`] - Fluent body construction with labels
pub mod model;

/// The instrumentation pass.
///
/// See [`weaver::Weaver`] for the entry point and [`weaver::WeaverConfig`] for the knobs.
pub mod weaver;

/// The runtime registry of live disposable objects.
///
/// See [`tracker::DisposeRegistry`] for the registry and [`tracker::global`] for the
/// process-wide instance that the static entry points forward to.
pub mod tracker;

/// Execution of code models, used to run instrumented modules end to end.
pub mod emulation;

/// `disposetrack` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use disposetrack::{CodeModel, Result};
///
/// fn load_model(path: &str) -> Result<CodeModel> {
///     CodeModel::from_path(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `disposetrack` Error type
///
/// Returned by model I/O, the instrumentation pass and the reference interpreter. The
/// runtime registry never fails.
pub use error::Error;

/// One compilation unit, see [`model`].
pub use model::CodeModel;

/// The instrumentation pass, see [`weaver`].
pub use weaver::{WeaveStats, Weaver, WeaverConfig};

/// The runtime registry, see [`tracker`].
pub use tracker::{DisposeRegistry, ObjectIdentity, OutputKind};
