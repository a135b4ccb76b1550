//! Removal of opt-out markers after instrumentation.
//!
//! The marker only steers the weaver. Once a pass has run it is stripped from every type
//! and field so the instrumented module no longer needs the runtime that defines it.

use log::debug;

use crate::{model::CodeModel, weaver::optout::OptOut};

/// Removes the opt-out marker from every type and every field of `model`.
///
/// Returns the number of marker attributes removed.
pub fn clean_references(model: &mut CodeModel, opt_out: &OptOut) -> usize {
    let mut removed = 0;
    for type_def in &mut model.types {
        removed += opt_out.strip(&mut type_def.custom_attributes);
        for field in &mut type_def.fields {
            removed += opt_out.strip(&mut field.custom_attributes);
        }
    }

    if removed > 0 {
        debug!("Removed {removed} {} attributes", opt_out.marker());
    }
    removed
}
