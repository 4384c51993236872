use serde::{Deserialize, Serialize};
use std::fmt;

/// One face currently visible to the robot, as reported by the vision subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    /// Identifier assigned at registration; absent or empty for unregistered faces.
    #[serde(default)]
    pub face_id: Option<String>,
    /// Width of the face bounding box in pixels (larger = closer).
    pub bounding_box_width: u32,
    pub distance_m: f32,
    /// Tracker identifier used to request a face image for this person.
    pub person_id: String,
}

impl FaceObservation {
    /// The face id, if present and non-empty.
    pub fn known_face_id(&self) -> Option<&str> {
        self.face_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A remembered visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub face_id: String,
    pub display_name: String,
    /// RFC 3339 timestamp of the last write.
    pub created_at: String,
}

/// Phase of the current interaction session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Greeting,
    Prompting,
    Listening,
    CapturingImage,
    Registering,
}

impl SessionState {
    pub fn is_idle(self) -> bool {
        self == SessionState::Idle
    }
}

/// Identifies one session from leaving Idle until returning to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of the controller, reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session: Option<SessionId>,
    pub target_face_id: Option<String>,
}
