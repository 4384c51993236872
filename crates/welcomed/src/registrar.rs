//! Local face registration: quality gate, id assignment, gallery storage.

use std::future::Future;
use std::path::{Path, PathBuf};
use welcome_core::phrases::FACE_TOO_BLURRY;
use welcome_core::{CollaboratorError, FaceImage, FaceRegistrar};

/// Gallery could not be written. Not in the spoken error table.
pub const REGISTRATION_STORAGE_FAILED: i32 = 101500;

/// Below this pixel standard deviation the crop is treated as featureless.
const MIN_CONTRAST_STDDEV: f32 = 4.0;

pub struct LocalRegistrar {
    gallery_dir: PathBuf,
    min_face_px: u32,
}

impl LocalRegistrar {
    pub fn new(gallery_dir: PathBuf, min_face_px: u32) -> Self {
        tracing::info!(gallery = %gallery_dir.display(), min_face_px, "local registrar ready");
        Self {
            gallery_dir,
            min_face_px,
        }
    }
}

fn stddev(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f32;
    let mean = data.iter().map(|&b| b as f32).sum::<f32>() / n;
    let variance = data.iter().map(|&b| (b as f32 - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}

/// Reject crops too small or too flat to enroll.
fn check_quality(image: &FaceImage, min_face_px: u32) -> Result<(), CollaboratorError> {
    let (width, height) = (image.width(), image.height());
    if width < min_face_px || height < min_face_px {
        return Err(CollaboratorError::new(
            FACE_TOO_BLURRY,
            format!("face image {width}x{height} is below {min_face_px}px"),
        ));
    }
    let contrast = stddev(image.to_luma8().as_raw());
    if contrast < MIN_CONTRAST_STDDEV {
        return Err(CollaboratorError::new(
            FACE_TOO_BLURRY,
            format!("face image contrast {contrast:.2} too low"),
        ));
    }
    Ok(())
}

fn storage_err(e: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::new(REGISTRATION_STORAGE_FAILED, e.to_string())
}

fn register_blocking(
    gallery_dir: &Path,
    min_face_px: u32,
    image: &FaceImage,
    name: &str,
) -> Result<String, CollaboratorError> {
    check_quality(image, min_face_px)?;

    std::fs::create_dir_all(gallery_dir).map_err(storage_err)?;

    let face_id = uuid::Uuid::new_v4().to_string();
    let path = gallery_dir.join(format!("{face_id}.png"));
    image.save(&path).map_err(storage_err)?;

    tracing::info!(face_id = %face_id, name, path = %path.display(), "face registered");
    Ok(face_id)
}

impl FaceRegistrar for LocalRegistrar {
    fn register_face(
        &self,
        image: FaceImage,
        name: &str,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send {
        let gallery_dir = self.gallery_dir.clone();
        let min_face_px = self.min_face_px;
        let name = name.to_string();
        async move {
            tokio::task::spawn_blocking(move || {
                register_blocking(&gallery_dir, min_face_px, &image, &name)
            })
            .await
            .unwrap_or_else(|e| {
                Err(CollaboratorError::new(
                    REGISTRATION_STORAGE_FAILED,
                    format!("registrar task failed: {e}"),
                ))
            })
        }
    }
}
