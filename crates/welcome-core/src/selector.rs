//! Closest-visitor selection.

use crate::types::FaceObservation;

/// Faces farther than this are ignored unless configured otherwise.
pub const DEFAULT_MAX_DISTANCE_M: f32 = 1.0;

/// Pick the visitor to engage from the faces currently in view.
///
/// Only faces within `max_distance_m` are considered. The widest bounding box
/// wins; on equal widths the earliest observation keeps the lead. A face must
/// have a non-zero width to qualify.
pub fn select_closest(
    observations: &[FaceObservation],
    max_distance_m: f32,
) -> Option<&FaceObservation> {
    let mut closest = None;
    let mut max_width = 0u32;

    for obs in observations {
        // NaN distances fail this comparison and are skipped.
        if !(obs.distance_m <= max_distance_m) {
            continue;
        }
        if obs.bounding_box_width > max_width {
            max_width = obs.bounding_box_width;
            closest = Some(obs);
        }
    }

    closest
}
