//! welcome-core — Visitor greeting engine.
//!
//! Picks the closest visible face, looks it up in the identity store and
//! drives either a personalized greeting or a name-capture-and-registration
//! dialogue through injected speech, camera and registration collaborators.

pub mod collaborator;
pub mod controller;
pub mod phrases;
pub mod runtime;
pub mod selector;
pub mod store;
pub mod types;

pub use collaborator::{
    CollaboratorError, FaceImage, FaceRegistrar, ImageCapture, SpeechInput, SpeechOutput,
};
pub use controller::{Command, Completion, Controller};
pub use runtime::{spawn_controller, Collaborators, ControllerError, ControllerHandle};
pub use selector::{select_closest, DEFAULT_MAX_DISTANCE_M};
pub use store::{IdentityStore, SqliteIdentityStore, StoreError};
pub use types::{FaceObservation, IdentityRecord, SessionId, SessionState, SessionStatus};

use std::path::PathBuf;

/// Base directory for persisted data (`$XDG_DATA_HOME/welcome`, falling back
/// to `~/.local/share/welcome`).
pub fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("welcome")
}

/// Default location of the identity database.
pub fn default_db_path() -> PathBuf {
    default_data_dir().join("faces.db")
}
