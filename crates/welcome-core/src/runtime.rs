//! Threaded runtime around [`Controller`].
//!
//! The controller and its identity store live on one dedicated OS thread
//! that drains a single event queue. Detection events, status queries and
//! collaborator completions all arrive through that queue, so controller
//! state is only ever touched from one place. Collaborator calls run as tokio
//! tasks and post their outcome back into the queue.

use crate::collaborator::{FaceRegistrar, ImageCapture, SpeechInput, SpeechOutput};
use crate::controller::{Command, Completion, Controller};
use crate::store::IdentityStore;
use crate::types::{FaceObservation, SessionId, SessionStatus};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const EVENT_QUEUE_DEPTH: usize = 32;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("controller thread exited")]
    ChannelClosed,
    #[error("no tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
    #[error("failed to spawn controller thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The external subsystems a controller drives.
pub struct Collaborators<V, L, C, R> {
    pub speech: V,
    pub listener: L,
    pub camera: C,
    pub registrar: R,
}

/// Messages processed by the controller thread.
enum Event {
    Observations(Vec<FaceObservation>),
    Completion {
        session: SessionId,
        completion: Completion,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the controller thread.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Event>,
}

impl ControllerHandle {
    /// Report the faces currently in view.
    pub async fn observations_changed(
        &self,
        observations: Vec<FaceObservation>,
    ) -> Result<(), ControllerError> {
        self.tx
            .send(Event::Observations(observations))
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<SessionStatus, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Event::Status { reply: reply_tx })
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Tear the controller down: abandon the active session, stop speech
    /// output and input, and exit the thread. Completions still in flight
    /// are discarded.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Event::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelClosed)
    }
}

/// Spawn the controller on a dedicated OS thread.
///
/// Must be called from within a tokio runtime; collaborator calls are spawned
/// onto it. The thread exits on [`ControllerHandle::shutdown`] or once every
/// handle has been dropped.
pub fn spawn_controller<S, V, L, C, R>(
    store: S,
    collaborators: Collaborators<V, L, C, R>,
    max_distance_m: f32,
) -> Result<ControllerHandle, ControllerError>
where
    S: IdentityStore + Send + 'static,
    V: SpeechOutput,
    L: SpeechInput,
    C: ImageCapture,
    R: FaceRegistrar,
{
    let rt = Handle::try_current()?;
    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE_DEPTH);

    let mut dispatcher = Dispatcher {
        speech: Arc::new(collaborators.speech),
        listener: Arc::new(collaborators.listener),
        camera: Arc::new(collaborators.camera),
        registrar: Arc::new(collaborators.registrar),
        events: tx.downgrade(),
        rt,
        in_flight: None,
    };
    let mut controller = Controller::new(store, max_distance_m);

    std::thread::Builder::new()
        .name("welcome-controller".into())
        .spawn(move || {
            tracing::info!(max_distance_m, "controller thread started");
            while let Some(event) = rx.blocking_recv() {
                match event {
                    Event::Observations(observations) => {
                        if let Some(command) = controller.on_observations(&observations) {
                            dispatcher.dispatch(command);
                        }
                    }
                    Event::Completion {
                        session,
                        completion,
                    } => {
                        if let Some(command) = controller.on_completion(session, completion) {
                            dispatcher.dispatch(command);
                        }
                    }
                    Event::Status { reply } => {
                        let _ = reply.send(controller.status());
                    }
                    Event::Shutdown { reply } => {
                        controller.teardown();
                        dispatcher.teardown();
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            if !controller.is_torn_down() {
                controller.teardown();
                dispatcher.teardown();
            }
            tracing::info!("controller thread exiting");
        })?;

    Ok(ControllerHandle { tx })
}

/// Runs controller commands against the collaborators.
struct Dispatcher<V, L, C, R> {
    speech: Arc<V>,
    listener: Arc<L>,
    camera: Arc<C>,
    registrar: Arc<R>,
    /// Weak so that dropping every handle still closes the queue.
    events: mpsc::WeakSender<Event>,
    rt: Handle,
    in_flight: Option<JoinHandle<()>>,
}

impl<V, L, C, R> Dispatcher<V, L, C, R>
where
    V: SpeechOutput,
    L: SpeechInput,
    C: ImageCapture,
    R: FaceRegistrar,
{
    fn dispatch(&mut self, command: Command) {
        let session = command.session();
        let events = self.events.clone();
        tracing::debug!(session = %session, command = command_name(&command), "dispatching");

        let task = match command {
            Command::Speak { text, .. } => {
                let speech = Arc::clone(&self.speech);
                self.rt.spawn(async move {
                    let completion = match speech.speak(&text).await {
                        Ok(()) => Completion::SpeechFinished,
                        Err(e) => Completion::SpeechFailed(e),
                    };
                    deliver(events, session, completion).await;
                })
            }
            Command::Listen { .. } => {
                let listener = Arc::clone(&self.listener);
                self.rt.spawn(async move {
                    let completion = match listener.listen().await {
                        Ok(text) => Completion::Recognized(text),
                        Err(e) => Completion::RecognitionFailed(e),
                    };
                    deliver(events, session, completion).await;
                })
            }
            Command::CaptureImage { person_id, .. } => {
                let camera = Arc::clone(&self.camera);
                self.rt.spawn(async move {
                    let image = camera.capture_image(&person_id).await;
                    deliver(events, session, Completion::ImageCaptured(image)).await;
                })
            }
            Command::Register { image, name, .. } => {
                let registrar = Arc::clone(&self.registrar);
                self.rt.spawn(async move {
                    let completion = match registrar.register_face(image, &name).await {
                        Ok(face_id) => Completion::Registered(face_id),
                        Err(e) => Completion::RegistrationFailed(e),
                    };
                    deliver(events, session, completion).await;
                })
            }
        };
        self.in_flight = Some(task);
    }

    fn teardown(&mut self) {
        self.speech.stop();
        self.listener.stop();
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Speak { .. } => "speak",
        Command::Listen { .. } => "listen",
        Command::CaptureImage { .. } => "capture_image",
        Command::Register { .. } => "register",
    }
}

async fn deliver(events: mpsc::WeakSender<Event>, session: SessionId, completion: Completion) {
    let Some(tx) = events.upgrade() else {
        tracing::debug!(
            session = %session,
            kind = completion.kind(),
            "controller gone; completion dropped"
        );
        return;
    };
    let kind = completion.kind();
    if tx
        .send(Event::Completion {
            session,
            completion,
        })
        .await
        .is_err()
    {
        tracing::debug!(session = %session, kind, "controller gone; completion dropped");
    }
}
