use anyhow::Result;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;
use welcome_core::{spawn_controller, Collaborators, SqliteIdentityStore};

mod camera;
mod config;
mod dbus_interface;
mod registrar;
mod speech;

use config::{BusKind, Config};
use dbus_interface::{GreeterService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        max_distance_m = config.max_distance_m,
        "welcomed starting"
    );

    let store = SqliteIdentityStore::open(&config.db_path)?;
    let collaborators = Collaborators {
        speech: speech::ConsoleSpeech::new(config.speech_rate),
        listener: speech::ConsoleListener::new(
            config.language.clone(),
            Duration::from_secs(config.listen_timeout_secs),
        ),
        camera: camera::SnapshotCamera::new(config.snapshot_dir.clone()),
        registrar: registrar::LocalRegistrar::new(config.gallery_dir.clone(), config.min_face_px),
    };
    let controller = spawn_controller(store, collaborators, config.max_distance_m)?;

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, GreeterService::new(controller.clone()))?
        .build()
        .await?;

    tracing::info!(bus = ?config.bus, name = BUS_NAME, "welcomed ready");

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupted; welcomed shutting down");
        }
        _ = terminate.recv() => tracing::info!("SIGTERM received; welcomed shutting down"),
    }

    // Stop accepting detections before tearing the controller down.
    connection
        .object_server()
        .remove::<GreeterService, _>(OBJECT_PATH)
        .await?;
    controller.shutdown().await?;

    Ok(())
}
