//! Contracts for the external subsystems the controller drives.
//!
//! Every call is asynchronous; the runtime awaits it on a task and feeds the
//! outcome back to the controller as a [`Completion`](crate::Completion).

use std::future::Future;
use thiserror::Error;

/// Face crop handed from the camera to the registrar.
pub type FaceImage = image::DynamicImage;

/// Failure reported by a collaborator, with its native error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("code {code}: {message}")]
pub struct CollaboratorError {
    pub code: i32,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Text-to-speech output.
pub trait SpeechOutput: Send + Sync + 'static {
    /// Speak `text`, resolving once playback has finished.
    fn speak(&self, text: &str) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    /// Interrupt any ongoing utterance.
    fn stop(&self);
}

/// Speech recognition input.
pub trait SpeechInput: Send + Sync + 'static {
    /// Listen for one utterance and return its transcript.
    fn listen(&self) -> impl Future<Output = Result<String, CollaboratorError>> + Send;

    /// Abort any ongoing recognition.
    fn stop(&self);
}

/// Access to the face image of a tracked person.
pub trait ImageCapture: Send + Sync + 'static {
    fn capture_image(&self, person_id: &str) -> impl Future<Output = Option<FaceImage>> + Send;
}

/// Face registration service; returns the newly assigned face id.
pub trait FaceRegistrar: Send + Sync + 'static {
    fn register_face(
        &self,
        image: FaceImage,
        name: &str,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send;
}
