use welcome_core::{ControllerHandle, FaceObservation};
use zbus::interface;

pub const BUS_NAME: &str = "org.welcome.Greeter1";
pub const OBJECT_PATH: &str = "/org/welcome/Greeter1";

/// D-Bus interface for the welcome daemon.
///
/// The vision subsystem pushes the faces it sees through
/// `ReportObservations`; tooling reads `Status`.
pub struct GreeterService {
    controller: ControllerHandle,
}

impl GreeterService {
    pub fn new(controller: ControllerHandle) -> Self {
        Self { controller }
    }
}

/// Parse a JSON array of observations.
fn parse_observations(json: &str) -> Result<Vec<FaceObservation>, serde_json::Error> {
    serde_json::from_str(json)
}

#[interface(name = "org.welcome.Greeter1")]
impl GreeterService {
    /// Report the faces currently in view, as a JSON array of observations.
    ///
    /// Returns false when the payload is malformed or the controller is gone.
    async fn report_observations(&self, observations: &str) -> bool {
        let observations = match parse_observations(observations) {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!(error = %e, "malformed observations payload");
                return false;
            }
        };
        tracing::debug!(faces = observations.len(), "observations reported");
        match self.controller.observations_changed(observations).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "controller unavailable");
                false
            }
        }
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self
            .controller
            .status()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": status.state,
            "session": status.session,
            "target_face_id": status.target_face_id,
        })
        .to_string())
    }
}
