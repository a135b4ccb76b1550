//! Opt-out query over custom attributes.

use crate::model::CustomAttribute;

/// Full name of the default opt-out marker attribute.
pub const DEFAULT_OPT_OUT_MARKER: &str = "DisposeTrack.DoNotTrackAttribute";

/// Answers whether an entity carries the opt-out marker.
///
/// Matching is by exact, namespace-qualified attribute type name; an attribute with the
/// same short name in another namespace does not opt anything out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptOut {
    marker: String,
}

impl OptOut {
    /// Creates a query for the given marker attribute type.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Full name of the marker attribute type.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Returns `true` if any attribute is the marker.
    #[must_use]
    pub fn is_marked(&self, attributes: &[CustomAttribute]) -> bool {
        attributes.iter().any(|a| a.attribute_type == self.marker)
    }

    /// Removes every marker attribute and returns how many were removed.
    pub fn strip(&self, attributes: &mut Vec<CustomAttribute>) -> usize {
        let before = attributes.len();
        attributes.retain(|a| a.attribute_type != self.marker);
        before - attributes.len()
    }
}

impl Default for OptOut {
    fn default() -> Self {
        Self::new(DEFAULT_OPT_OUT_MARKER)
    }
}
