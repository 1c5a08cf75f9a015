//! Human-readable summary of a detection result.

use crate::detection::HandObservation;

pub const NO_HANDS: &str = "No hands detected";

/// Status line for the hands in one result
///
/// Only well-formed observations count, matching what the renderer draws.
pub fn describe(hands: &[HandObservation]) -> String {
    match hands.iter().filter(|hand| hand.is_well_formed()).count() {
        0 => NO_HANDS.to_string(),
        1 => "1 hand detected".to_string(),
        n => format!("{} hands detected", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Handedness, Landmark, LANDMARK_COUNT};

    fn hand(handedness: Handedness) -> HandObservation {
        HandObservation::new(handedness, vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT])
    }

    #[test]
    fn counts_with_pluralization() {
        assert_eq!(describe(&[]), "No hands detected");
        assert_eq!(describe(&[hand(Handedness::Left)]), "1 hand detected");
        assert_eq!(
            describe(&[hand(Handedness::Left), hand(Handedness::Right)]),
            "2 hands detected"
        );
    }

    #[test]
    fn malformed_observations_are_not_counted() {
        let broken = HandObservation::new(Handedness::Right, vec![Landmark::default(); 3]);
        assert_eq!(describe(&[broken.clone()]), NO_HANDS);
        assert_eq!(describe(&[broken, hand(Handedness::Left)]), "1 hand detected");
    }
}
