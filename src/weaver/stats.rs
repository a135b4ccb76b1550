use std::fmt;

/// Counters describing what a weaving pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaveStats {
    /// Number of types instrumented.
    pub types_patched: usize,
    /// Number of dispose methods that now unregister.
    pub dispose_methods_patched: usize,
    /// Number of constructors that now register.
    pub constructors_patched: usize,
    /// Number of constructors left alone because they delegate to a sibling.
    pub delegating_constructors_skipped: usize,
    /// Number of types skipped because of the opt-out marker.
    pub opted_out_types: usize,
    /// Number of opt-out marker attributes removed.
    pub markers_removed: usize,
}

impl WeaveStats {
    /// Returns `true` if the pass changed no method body.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dispose_methods_patched == 0 && self.constructors_patched == 0
    }
}

impl fmt::Display for WeaveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} types patched ({} dispose methods, {} constructors), \
             {} delegating constructors skipped, {} opted out, {} markers removed",
            self.types_patched,
            self.dispose_methods_patched,
            self.constructors_patched,
            self.delegating_constructors_skipped,
            self.opted_out_types,
            self.markers_removed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let stats = WeaveStats {
            types_patched: 2,
            dispose_methods_patched: 2,
            constructors_patched: 3,
            delegating_constructors_skipped: 1,
            opted_out_types: 1,
            markers_removed: 1,
        };
        assert_eq!(
            stats.to_string(),
            "2 types patched (2 dispose methods, 3 constructors), \
             1 delegating constructors skipped, 1 opted out, 1 markers removed"
        );
        assert!(!stats.is_empty());
        assert!(WeaveStats::default().is_empty());
    }
}
