//! Selection of the types, dispose methods and constructors to instrument.
//!
//! A type is instrumented when it is a concrete, hand-written, not opted-out class that
//! declares a dispose method. Per type the classifier picks exactly one dispose method and
//! the constructors that must register, leaving out constructors that delegate to a
//! sibling constructor.

use log::debug;

use crate::{
    model::{CodeModel, MethodDef, Token, TypeDef},
    weaver::{delegation, optout::OptOut, WeaverConfig, WeaverLog},
};

/// Full name of the base type of all enums.
const ENUM_BASE: &str = "System.Enum";

/// A type selected for instrumentation.
///
/// Computed fresh for every pass and discarded once the model has been patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The type being instrumented
    pub type_token: Token,
    /// Full name of the type
    pub type_name: String,
    /// The dispose method that will unregister
    pub dispose_method: Token,
    /// Constructors that will register
    pub constructors: Vec<Token>,
    /// Constructors left alone because they delegate to a sibling constructor
    pub delegating: Vec<Token>,
}

/// Outcome of classifying a whole model.
#[derive(Debug, Default)]
pub struct Classification {
    /// Types to instrument, in declaration order
    pub candidates: Vec<Candidate>,
    /// Number of types skipped because of the opt-out marker
    pub opted_out: usize,
}

/// Returns `true` if the type is a class: it has a base type and is neither an interface
/// nor an enum.
#[must_use]
pub fn is_class(model: &CodeModel, type_def: &TypeDef) -> bool {
    let Some(base) = type_def.base else {
        return false;
    };
    !type_def.is_interface() && model.type_full_name(base).as_deref() != Some(ENUM_BASE)
}

/// Selects the dispose method to instrument among `disposers`.
///
/// The parameterless one wins. Without it, the first one is used unless the base type lives
/// in the same compilation unit: then the base type's own dispose method is instrumented
/// instead and this type is skipped.
fn select_dispose<'a>(
    model: &CodeModel,
    type_def: &TypeDef,
    disposers: &[&'a MethodDef],
) -> Option<&'a MethodDef> {
    if let Some(parameterless) = disposers.iter().find(|m| !m.has_parameters()) {
        return Some(parameterless);
    }

    let base = type_def.base?;
    if model.is_local_type(base) {
        return None;
    }
    disposers.first().copied()
}

/// Classifies every type of `model`.
pub fn classify(
    model: &CodeModel,
    config: &WeaverConfig,
    opt_out: &OptOut,
    log: &WeaverLog,
) -> Classification {
    let mut classification = Classification::default();

    for (type_token, type_def) in model.type_defs() {
        if !is_class(model, type_def) || type_def.is_abstract() || type_def.is_generated_code()
        {
            continue;
        }

        let type_name = model
            .type_full_name(type_token)
            .unwrap_or_else(|| type_def.name.clone());

        if opt_out.is_marked(&type_def.custom_attributes) {
            debug!("Skipping {type_name}: marked with {}", opt_out.marker());
            classification.opted_out += 1;
            continue;
        }

        let disposers: Vec<&MethodDef> = type_def
            .methods
            .iter()
            .filter(|m| !m.is_static() && config.is_dispose_name(&m.name))
            .collect();
        if disposers.is_empty() {
            continue;
        }

        let Some(dispose) = select_dispose(model, type_def, &disposers) else {
            debug!("Skipping {type_name}: the base class in this module handles disposal");
            continue;
        };

        let mut constructors = Vec::new();
        let mut delegating = Vec::new();
        for constructor in type_def.constructors() {
            if delegation::delegates_to_sibling(model, type_token, constructor) {
                debug!(
                    "Not registering in {}: delegates to a sibling constructor",
                    model
                        .method_full_name(constructor.token)
                        .unwrap_or_else(|| constructor.signature())
                );
                delegating.push(constructor.token);
            } else {
                constructors.push(constructor.token);
            }
        }

        if constructors.is_empty() && delegating.is_empty() {
            log.warning(&format!(
                "{type_name} has no instance constructor, only {} is patched",
                dispose.signature()
            ));
        }

        classification.candidates.push(Candidate {
            type_token,
            type_name,
            dispose_method: dispose.token,
            constructors,
            delegating,
        });
    }

    classification
}
