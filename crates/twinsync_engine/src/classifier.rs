//! Change classifier: decides whether a new state differs meaningfully.

use crate::schema::{self, ToleranceClass, ToleranceTable};
use twinsync_model::{Domain, EntityState};

/// Outcome of classifying one state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    /// The change is worth mirroring.
    Significant,
    /// The change is noise.
    Insignificant,
}

impl Significance {
    /// Returns true for [`Significance::Significant`].
    pub fn is_significant(&self) -> bool {
        matches!(self, Significance::Significant)
    }
}

/// Compares snapshots against the per-domain tolerance table.
///
/// Runs before the loop guard so that attribute jitter never reaches the
/// echo cache.
#[derive(Debug, Clone, Default)]
pub struct ChangeClassifier {
    tolerances: ToleranceTable,
}

impl ChangeClassifier {
    /// Creates a classifier.
    pub fn new(tolerances: ToleranceTable) -> Self {
        Self { tolerances }
    }

    /// Returns the tolerance table.
    pub fn tolerances(&self) -> &ToleranceTable {
        &self.tolerances
    }

    /// Classifies the transition from `old` to `new`.
    pub fn classify(&self, old: Option<&EntityState>, new: &EntityState) -> Significance {
        let Some(old) = old else {
            return Significance::Significant;
        };

        if old.domain != new.domain || self.state_tokens_differ(&new.domain, &old.state, &new.state)
        {
            return Significance::Significant;
        }

        let moved = schema::attributes_for(&new.domain).iter().any(|spec| {
            self.tolerances
                .values_differ(spec.tolerance, old.attribute(spec.key), new.attribute(spec.key))
        });

        if moved {
            Significance::Significant
        } else {
            Significance::Insignificant
        }
    }

    /// Compares discrete state tokens; numeric domains use the generic tolerance.
    pub fn state_tokens_differ(&self, domain: &Domain, a: &str, b: &str) -> bool {
        if domain.has_numeric_state() {
            if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                return self.tolerances.numbers_differ(ToleranceClass::Generic, x, y);
            }
        }
        a != b
    }
}
