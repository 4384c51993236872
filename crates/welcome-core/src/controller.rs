//! Interaction controller: one greeting session at a time.
//!
//! The controller is a plain state machine. Detection events and collaborator
//! completions go in, at most one collaborator [`Command`] comes out. It never
//! issues a second command before the completion of the first has been fed
//! back, and every session path ends in [`SessionState::Idle`].

use crate::collaborator::{CollaboratorError, FaceImage};
use crate::phrases;
use crate::selector::select_closest;
use crate::store::IdentityStore;
use crate::types::{FaceObservation, SessionId, SessionState, SessionStatus};

/// A collaborator call the runtime must perform for the current session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Speak { session: SessionId, text: String },
    Listen { session: SessionId },
    CaptureImage { session: SessionId, person_id: String },
    Register { session: SessionId, image: FaceImage, name: String },
}

impl Command {
    pub fn session(&self) -> SessionId {
        match self {
            Command::Speak { session, .. }
            | Command::Listen { session }
            | Command::CaptureImage { session, .. }
            | Command::Register { session, .. } => *session,
        }
    }
}

/// Outcome of a collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    SpeechFinished,
    SpeechFailed(CollaboratorError),
    Recognized(String),
    RecognitionFailed(CollaboratorError),
    ImageCaptured(Option<FaceImage>),
    Registered(String),
    RegistrationFailed(CollaboratorError),
}

impl Completion {
    /// Short label for log lines (images are not worth printing).
    pub fn kind(&self) -> &'static str {
        match self {
            Completion::SpeechFinished => "speech_finished",
            Completion::SpeechFailed(_) => "speech_failed",
            Completion::Recognized(_) => "recognized",
            Completion::RecognitionFailed(_) => "recognition_failed",
            Completion::ImageCaptured(_) => "image_captured",
            Completion::Registered(_) => "registered",
            Completion::RegistrationFailed(_) => "registration_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Utterance {
    Greeting,
    NamePrompt,
    /// Last words of a session: reprompt, apology, confirmation.
    Closing,
}

/// The single collaborator call the session is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    Speech(Utterance),
    Recognition,
    Image,
    Registration,
}

struct SessionContext {
    id: SessionId,
    target: FaceObservation,
    name: Option<String>,
    awaiting: Awaiting,
}

pub struct Controller<S> {
    store: S,
    max_distance_m: f32,
    state: SessionState,
    session: Option<SessionContext>,
    next_session: u64,
    torn_down: bool,
}

impl<S: IdentityStore> Controller<S> {
    pub fn new(store: S, max_distance_m: f32) -> Self {
        Self {
            store,
            max_distance_m,
            state: SessionState::Idle,
            session: None,
            next_session: 0,
            torn_down: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            session: self.session.as_ref().map(|ctx| ctx.id),
            target_face_id: self
                .session
                .as_ref()
                .and_then(|ctx| ctx.target.face_id.clone()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Handle a change in the set of visible faces.
    ///
    /// Starts a session only when idle and a face qualifies; otherwise the
    /// event is dropped.
    pub fn on_observations(&mut self, observations: &[FaceObservation]) -> Option<Command> {
        if self.torn_down {
            return None;
        }
        if !self.state.is_idle() {
            tracing::debug!(state = ?self.state, "session active; detection event dropped");
            return None;
        }
        let Some(target) = select_closest(observations, self.max_distance_m) else {
            tracing::debug!(
                faces = observations.len(),
                max_distance_m = self.max_distance_m,
                "no face within range"
            );
            return None;
        };
        let target = target.clone();

        let id = SessionId(self.next_session);
        self.next_session += 1;
        tracing::info!(
            session = %id,
            person_id = %target.person_id,
            face_id = ?target.face_id,
            width = target.bounding_box_width,
            distance_m = target.distance_m,
            "session started"
        );

        let known_name = target.known_face_id().and_then(|face_id| self.lookup(face_id));
        self.session = Some(SessionContext {
            id,
            target,
            name: None,
            awaiting: Awaiting::Speech(Utterance::Greeting),
        });

        match known_name {
            Some(name) => {
                tracing::info!(session = %id, name = %name, "known visitor");
                self.state = SessionState::Greeting;
                self.speak(Utterance::Greeting, phrases::greeting(&name))
            }
            None => {
                tracing::info!(session = %id, "unknown visitor; asking for name");
                self.state = SessionState::Prompting;
                self.speak(Utterance::NamePrompt, phrases::NAME_PROMPT.to_string())
            }
        }
    }

    /// Feed back the outcome of the command issued for `session`.
    pub fn on_completion(&mut self, session: SessionId, completion: Completion) -> Option<Command> {
        if self.torn_down {
            tracing::debug!(
                session = %session,
                kind = completion.kind(),
                "completion after teardown ignored"
            );
            return None;
        }
        let awaiting = match &self.session {
            Some(ctx) if ctx.id == session => ctx.awaiting,
            Some(ctx) => {
                tracing::warn!(session = %session, current = %ctx.id, "stale completion ignored");
                return None;
            }
            None => {
                tracing::warn!(session = %session, "completion with no active session ignored");
                return None;
            }
        };

        match (awaiting, completion) {
            (Awaiting::Speech(utterance), Completion::SpeechFinished) => {
                self.speech_finished(utterance)
            }
            (Awaiting::Speech(utterance), Completion::SpeechFailed(err)) => {
                tracing::error!(
                    session = %session,
                    utterance = ?utterance,
                    code = err.code,
                    message = %err.message,
                    "speech output failed"
                );
                self.end_session();
                None
            }
            (Awaiting::Recognition, Completion::Recognized(text)) => self.name_heard(&text),
            (Awaiting::Recognition, Completion::RecognitionFailed(err)) => {
                tracing::error!(
                    session = %session,
                    code = err.code,
                    message = %err.message,
                    "speech recognition failed"
                );
                self.speak(Utterance::Closing, phrases::NOTHING_HEARD.to_string())
            }
            (Awaiting::Image, Completion::ImageCaptured(None)) => {
                tracing::warn!(session = %session, "no face image available");
                self.speak(Utterance::Closing, phrases::FACE_NOT_SEEN.to_string())
            }
            (Awaiting::Image, Completion::ImageCaptured(Some(image))) => self.register(image),
            (Awaiting::Registration, Completion::Registered(face_id)) => self.registered(&face_id),
            (Awaiting::Registration, Completion::RegistrationFailed(err)) => {
                tracing::error!(
                    session = %session,
                    code = err.code,
                    message = %err.message,
                    "face registration failed"
                );
                self.speak(
                    Utterance::Closing,
                    phrases::registration_failure(err.code).to_string(),
                )
            }
            (awaiting, completion) => {
                tracing::warn!(
                    session = %session,
                    awaiting = ?awaiting,
                    kind = completion.kind(),
                    "unexpected completion ignored"
                );
                None
            }
        }
    }

    /// Stop reacting to anything. The active session, if any, is discarded.
    pub fn teardown(&mut self) {
        if let Some(ctx) = self.session.take() {
            tracing::info!(session = %ctx.id, state = ?self.state, "session abandoned at teardown");
        }
        self.state = SessionState::Idle;
        self.torn_down = true;
    }

    fn lookup(&self, face_id: &str) -> Option<String> {
        match self.store.get(face_id) {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name),
            Ok(_) => {
                tracing::warn!(face_id, "face id has no stored name; treating visitor as unknown");
                None
            }
            Err(e) => {
                tracing::error!(
                    face_id,
                    error = %e,
                    "identity lookup failed; treating visitor as unknown"
                );
                None
            }
        }
    }

    fn speak(&mut self, utterance: Utterance, text: String) -> Option<Command> {
        let ctx = self.session.as_mut()?;
        ctx.awaiting = Awaiting::Speech(utterance);
        Some(Command::Speak {
            session: ctx.id,
            text,
        })
    }

    fn speech_finished(&mut self, utterance: Utterance) -> Option<Command> {
        match utterance {
            Utterance::NamePrompt => {
                let ctx = self.session.as_mut()?;
                ctx.awaiting = Awaiting::Recognition;
                self.state = SessionState::Listening;
                Some(Command::Listen { session: ctx.id })
            }
            Utterance::Greeting | Utterance::Closing => {
                self.end_session();
                None
            }
        }
    }

    fn name_heard(&mut self, text: &str) -> Option<Command> {
        let name = text.trim();
        if name.is_empty() {
            tracing::info!("empty recognition result; asking again next time");
            return self.speak(Utterance::Closing, phrases::NAME_NOT_CAUGHT.to_string());
        }

        let ctx = self.session.as_mut()?;
        tracing::info!(session = %ctx.id, name, "name recognized");
        ctx.name = Some(name.to_string());
        ctx.awaiting = Awaiting::Image;
        self.state = SessionState::CapturingImage;
        Some(Command::CaptureImage {
            session: ctx.id,
            person_id: ctx.target.person_id.clone(),
        })
    }

    fn register(&mut self, image: FaceImage) -> Option<Command> {
        let ctx = self.session.as_mut()?;
        let Some(name) = ctx.name.clone() else {
            tracing::error!(session = %ctx.id, "image captured without a name; ending session");
            self.end_session();
            return None;
        };
        ctx.awaiting = Awaiting::Registration;
        self.state = SessionState::Registering;
        Some(Command::Register {
            session: ctx.id,
            image,
            name,
        })
    }

    fn registered(&mut self, face_id: &str) -> Option<Command> {
        let (id, name) = {
            let ctx = self.session.as_ref()?;
            (ctx.id, ctx.name.clone().unwrap_or_default())
        };
        if let Err(e) = self.store.set(face_id, &name) {
            tracing::error!(session = %id, face_id, error = %e, "failed to store new identity");
        }
        tracing::info!(session = %id, face_id, name = %name, "visitor registered");
        self.speak(Utterance::Closing, phrases::confirmation(&name))
    }

    fn end_session(&mut self) {
        if let Some(ctx) = self.session.take() {
            tracing::info!(session = %ctx.id, state = ?self.state, "session ended");
        }
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqliteIdentityStore, StoreError};

    /// Store whose backend is gone: every read and write fails.
    struct UnavailableStore;

    fn unavailable() -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
    }

    impl IdentityStore for UnavailableStore {
        fn get(&self, _face_id: &str) -> Result<Option<String>, StoreError> {
            Err(unavailable())
        }

        fn set(&mut self, _face_id: &str, _name: &str) -> Result<(), StoreError> {
            Err(unavailable())
        }

        fn delete(&mut self, _face_id: &str) -> Result<bool, StoreError> {
            Err(unavailable())
        }
    }

    fn controller() -> Controller<SqliteIdentityStore> {
        Controller::new(SqliteIdentityStore::open_in_memory().unwrap(), 1.0)
    }

    fn face(face_id: &str, width: u32, distance: f32) -> FaceObservation {
        FaceObservation {
            face_id: Some(face_id.to_string()),
            bounding_box_width: width,
            distance_m: distance,
            person_id: "person-1".into(),
        }
    }

    fn image() -> FaceImage {
        image::DynamicImage::new_luma8(96, 96)
    }

    fn spoken(cmd: Option<Command>) -> (SessionId, String) {
        match cmd {
            Some(Command::Speak { session, text }) => (session, text),
            other => panic!("expected Speak, got {other:?}"),
        }
    }

    /// Walk an unknown visitor up to the registration call.
    fn drive_to_registering<S: IdentityStore>(
        c: &mut Controller<S>,
        obs: FaceObservation,
    ) -> SessionId {
        let (s, text) = spoken(c.on_observations(&[obs]));
        assert_eq!(text, phrases::NAME_PROMPT);
        assert_eq!(c.state(), SessionState::Prompting);

        let next = c.on_completion(s, Completion::SpeechFinished);
        assert_eq!(next, Some(Command::Listen { session: s }));
        assert_eq!(c.state(), SessionState::Listening);

        let cmd = c.on_completion(s, Completion::Recognized("  Alice ".into()));
        assert_eq!(
            cmd,
            Some(Command::CaptureImage {
                session: s,
                person_id: "person-1".into()
            })
        );
        assert_eq!(c.state(), SessionState::CapturingImage);

        match c.on_completion(s, Completion::ImageCaptured(Some(image()))) {
            Some(Command::Register { session, name, .. }) => {
                assert_eq!(session, s);
                assert_eq!(name, "Alice");
            }
            other => panic!("expected Register, got {other:?}"),
        }
        assert_eq!(c.state(), SessionState::Registering);
        s
    }

    #[test]
    fn test_unknown_visitor_registers() {
        let mut c = controller();
        let s = drive_to_registering(&mut c, face("", 140, 0.4));

        let (_, text) = spoken(c.on_completion(s, Completion::Registered("F123".into())));
        assert_eq!(text, phrases::confirmation("Alice"));
        assert_eq!(c.store().get("F123").unwrap().as_deref(), Some("Alice"));

        assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.status().session, None);
    }

    #[test]
    fn test_known_visitor_greeted() {
        let mut c = controller();
        let s = drive_to_registering(&mut c, face("", 140, 0.4));
        spoken(c.on_completion(s, Completion::Registered("F123".into())));
        c.on_completion(s, Completion::SpeechFinished);

        let (s2, text) = spoken(c.on_observations(&[face("F123", 130, 0.6)]));
        assert_ne!(s2, s);
        assert!(text.contains("Alice"));
        assert_eq!(c.state(), SessionState::Greeting);
        assert_eq!(c.status().target_face_id.as_deref(), Some("F123"));

        assert_eq!(c.on_completion(s2, Completion::SpeechFinished), None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_greeting_speech_error_returns_idle() {
        let mut c = controller();
        c.store.set("F1", "Bob").unwrap();
        let (s, _) = spoken(c.on_observations(&[face("F1", 100, 0.5)]));
        let err = CollaboratorError::new(-1, "tts busy");
        let next = c.on_completion(s, Completion::SpeechFailed(err));
        assert_eq!(next, None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_known_but_unnamed_degrades() {
        let mut c = controller();
        let s = drive_to_registering(&mut c, face("F999", 120, 0.5));
        spoken(c.on_completion(s, Completion::Registered("F1000".into())));
        assert_eq!(c.store().get("F1000").unwrap().as_deref(), Some("Alice"));
    }

    #[test]
    fn test_detection_dropped_while_active() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));

        assert_eq!(c.on_observations(&[face("", 200, 0.2)]), None);
        c.on_completion(s, Completion::SpeechFinished);
        assert_eq!(c.on_observations(&[face("", 200, 0.2)]), None);
        assert_eq!(c.status().session, Some(s));
        assert_eq!(c.state(), SessionState::Listening);

        c.on_completion(s, Completion::RecognitionFailed(CollaboratorError::new(1, "no audio")));
        c.on_completion(s, Completion::SpeechFinished);
        assert!(c.state().is_idle());

        let (s2, _) = spoken(c.on_observations(&[face("", 200, 0.2)]));
        assert_eq!(s2, SessionId(s.0 + 1));
    }

    #[test]
    fn test_no_qualifying_face_stays_idle() {
        let mut c = controller();
        assert_eq!(c.on_observations(&[]), None);
        assert_eq!(c.on_observations(&[face("", 300, 1.5)]), None);
        assert!(c.state().is_idle());
        assert_eq!(c.status().session, None);
    }

    #[test]
    fn test_whitespace_name_reprompts() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        c.on_completion(s, Completion::SpeechFinished);

        let (_, text) = spoken(c.on_completion(s, Completion::Recognized("  ".into())));
        assert_eq!(text, phrases::NAME_NOT_CAUGHT);
        assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
        assert!(c.state().is_idle());
        assert!(c.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_recognition_error_apologizes() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        c.on_completion(s, Completion::SpeechFinished);

        let err = CollaboratorError::new(20, "no audio");
        let (_, text) = spoken(c.on_completion(s, Completion::RecognitionFailed(err)));
        assert_eq!(text, phrases::NOTHING_HEARD);
        c.on_completion(s, Completion::SpeechFinished);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_prompt_speech_error_ends_without_retry() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        let err = CollaboratorError::new(5, "tts down");
        let next = c.on_completion(s, Completion::SpeechFailed(err));
        assert_eq!(next, None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_missing_image_apologizes() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        c.on_completion(s, Completion::SpeechFinished);
        c.on_completion(s, Completion::Recognized("Carol".into()));

        let (_, text) = spoken(c.on_completion(s, Completion::ImageCaptured(None)));
        assert_eq!(text, phrases::FACE_NOT_SEEN);
        assert_eq!(c.state(), SessionState::CapturingImage);

        // A failed closing utterance still ends the session.
        let err = CollaboratorError::new(3, "cut off");
        let next = c.on_completion(s, Completion::SpeechFailed(err));
        assert_eq!(next, None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_registration_failure_messages() {
        for (code, expected) in [
            (101303, phrases::registration_failure(phrases::CAMERA_NOT_AUTHORIZED)),
            (101305, phrases::registration_failure(phrases::FACE_TOO_BLURRY)),
            (999999, "Face registration failed. Please try again."),
        ] {
            let mut c = controller();
            let s = drive_to_registering(&mut c, face("", 140, 0.4));
            let err = CollaboratorError::new(code, "rejected");
            let (_, text) = spoken(c.on_completion(s, Completion::RegistrationFailed(err)));
            assert_eq!(text, expected);
            assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
            assert!(c.state().is_idle());
            assert!(c.store().list().unwrap().is_empty());
        }
    }

    #[test]
    fn test_stale_and_mismatched_completions_ignored() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        c.on_completion(s, Completion::SpeechFailed(CollaboratorError::new(1, "x")));

        let (s2, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
        assert_eq!(c.state(), SessionState::Prompting);

        assert_eq!(c.on_completion(s2, Completion::Recognized("Dave".into())), None);
        assert_eq!(c.state(), SessionState::Prompting);
        let next = c.on_completion(s2, Completion::SpeechFinished);
        assert_eq!(next, Some(Command::Listen { session: s2 }));
    }

    #[test]
    fn test_teardown_ignores_everything_after() {
        let mut c = controller();
        let (s, _) = spoken(c.on_observations(&[face("", 140, 0.4)]));
        c.teardown();
        assert!(c.is_torn_down());
        assert!(c.state().is_idle());
        assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
        assert_eq!(c.on_observations(&[face("", 140, 0.4)]), None);
        assert!(c.state().is_idle());
    }

    #[test]
    fn test_store_failures_do_not_break_session() {
        let mut c = Controller::new(UnavailableStore, 1.0);

        // Lookup fails for a known face id: the visitor is asked for a name.
        let s = drive_to_registering(&mut c, face("F1", 120, 0.5));

        // Write fails: the visitor is still told they were remembered.
        let (_, text) = spoken(c.on_completion(s, Completion::Registered("F2".into())));
        assert_eq!(text, phrases::confirmation("Alice"));
        assert_eq!(c.on_completion(s, Completion::SpeechFinished), None);
        assert!(c.state().is_idle());
        assert_eq!(c.status().session, None);
    }
}
