//! Transition type detection.

use crate::schema::{self, ToleranceTable};
use twinsync_model::EntityState;

/// Whether a change happens at once or ramps over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A discrete flip (on/off, open/close, mode change).
    Instant,
    /// A ramp of a progressive attribute (brightness, position, ...).
    Progressive,
}

impl TransitionKind {
    /// Returns true for [`TransitionKind::Progressive`].
    pub fn is_progressive(&self) -> bool {
        matches!(self, TransitionKind::Progressive)
    }
}

/// Classifies significant changes as Instant or Progressive.
#[derive(Debug, Clone, Default)]
pub struct TransitionDetector {
    tolerances: ToleranceTable,
}

impl TransitionDetector {
    /// Creates a detector.
    pub fn new(tolerances: ToleranceTable) -> Self {
        Self { tolerances }
    }

    /// Detects the transition kind of `old -> new`.
    ///
    /// Progressive requires at least one progressive attribute, present on
    /// both sides, to have moved, and no tracked attribute to appear,
    /// disappear or change discretely. A state token that changes alongside
    /// a ramp (`closed` to `opening` while the position moves) stays part
    /// of the ramp.
    pub fn detect(&self, old: Option<&EntityState>, new: &EntityState) -> TransitionKind {
        let Some(old) = old else {
            return TransitionKind::Instant;
        };
        if old.domain != new.domain {
            return TransitionKind::Instant;
        }

        let mut ramped = false;
        for spec in schema::attributes_for(&new.domain) {
            let before = old.attribute(spec.key);
            let after = new.attribute(spec.key);
            if !self.tolerances.values_differ(spec.tolerance, before, after) {
                continue;
            }
            if !spec.progressive || before.is_none() || after.is_none() {
                return TransitionKind::Instant;
            }
            ramped = true;
        }

        if ramped {
            TransitionKind::Progressive
        } else {
            TransitionKind::Instant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinsync_model::attrs;

    fn detect(old: &EntityState, new: &EntityState) -> TransitionKind {
        TransitionDetector::default().detect(Some(old), new)
    }

    #[test]
    fn brightness_ramp_is_progressive() {
        let old = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 100);
        let new = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 140);
        assert_eq!(detect(&old, &new), TransitionKind::Progressive);
    }

    #[test]
    fn plain_flip_is_instant() {
        let old = EntityState::new("light.a", "off");
        let new = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 140);
        assert_eq!(detect(&old, &new), TransitionKind::Instant);
        assert_eq!(
            TransitionDetector::default().detect(None, &new),
            TransitionKind::Instant
        );
    }

    #[test]
    fn cover_motion_is_progressive() {
        let old = EntityState::new("cover.a", "open").with_attribute(attrs::CURRENT_POSITION, 40);
        let new = EntityState::new("cover.a", "open").with_attribute(attrs::CURRENT_POSITION, 45);
        assert!(detect(&old, &new).is_progressive());
    }

    #[test]
    fn cover_starting_to_move_is_progressive() {
        let old = EntityState::new("cover.a", "closed").with_attribute(attrs::CURRENT_POSITION, 0);
        let new = EntityState::new("cover.a", "opening").with_attribute(attrs::CURRENT_POSITION, 10);
        assert!(detect(&old, &new).is_progressive());

        let old = EntityState::new("cover.a", "opening").with_attribute(attrs::CURRENT_POSITION, 60);
        let new = EntityState::new("cover.a", "open").with_attribute(attrs::CURRENT_POSITION, 100);
        assert!(detect(&old, &new).is_progressive());
    }

    #[test]
    fn state_flip_without_movement_is_instant() {
        let old = EntityState::new("cover.a", "open").with_attribute(attrs::CURRENT_POSITION, 40);
        let new = EntityState::new("cover.a", "closing").with_attribute(attrs::CURRENT_POSITION, 40);
        assert_eq!(detect(&old, &new), TransitionKind::Instant);

        let old = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 100);
        let new = EntityState::new("light.a", "off");
        assert_eq!(detect(&old, &new), TransitionKind::Instant);
    }

    #[test]
    fn appearing_attribute_is_instant() {
        let old = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 100);
        let new = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 100)
            .with_attribute(attrs::HS_COLOR, vec![30.0, 80.0]);
        assert_eq!(detect(&old, &new), TransitionKind::Instant);
    }

    #[test]
    fn non_progressive_attribute_is_instant() {
        let old = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 100)
            .with_attribute(attrs::EFFECT, "none");
        let new = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 150)
            .with_attribute(attrs::EFFECT, "rainbow");
        assert_eq!(detect(&old, &new), TransitionKind::Instant);

        let old = EntityState::new("media_player.a", "playing")
            .with_attribute(attrs::VOLUME_LEVEL, 0.2);
        let new = EntityState::new("media_player.a", "playing")
            .with_attribute(attrs::VOLUME_LEVEL, 0.6);
        assert_eq!(detect(&old, &new), TransitionKind::Instant);
    }
}
