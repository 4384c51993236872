//! Face image source backed by snapshots the vision subsystem drops on disk.

use std::future::Future;
use std::path::{Path, PathBuf};
use welcome_core::{FaceImage, ImageCapture};

const SNAPSHOT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct SnapshotCamera {
    dir: PathBuf,
}

impl SnapshotCamera {
    pub fn new(dir: PathBuf) -> Self {
        tracing::info!(dir = %dir.display(), "snapshot camera ready");
        Self { dir }
    }
}

/// Person ids become file names; refuse anything that could escape the directory.
fn is_safe_id(person_id: &str) -> bool {
    !person_id.is_empty()
        && person_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn load_snapshot(dir: &Path, person_id: &str) -> Option<FaceImage> {
    for ext in SNAPSHOT_EXTENSIONS {
        let path = dir.join(format!("{person_id}.{ext}"));
        if !path.exists() {
            continue;
        }
        match image::open(&path) {
            Ok(img) => {
                tracing::debug!(
                    path = %path.display(),
                    width = img.width(),
                    height = img.height(),
                    "snapshot loaded"
                );
                return Some(img);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable snapshot");
            }
        }
    }
    None
}

impl ImageCapture for SnapshotCamera {
    fn capture_image(&self, person_id: &str) -> impl Future<Output = Option<FaceImage>> + Send {
        let dir = self.dir.clone();
        let person_id = person_id.to_string();
        async move {
            if !is_safe_id(&person_id) {
                tracing::warn!(
                    person_id = %person_id,
                    "refusing snapshot lookup for unsafe person id"
                );
                return None;
            }
            match tokio::task::spawn_blocking(move || load_snapshot(&dir, &person_id)).await {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(error = %e, "snapshot loader task failed");
                    None
                }
            }
        }
    }
}
