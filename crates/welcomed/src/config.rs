use std::path::PathBuf;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite identity database.
    pub db_path: PathBuf,
    /// Faces farther than this (meters) never start a session.
    pub max_distance_m: f32,
    /// Directory holding `<person_id>.png|jpg` face snapshots from the vision subsystem.
    pub snapshot_dir: PathBuf,
    /// Directory where registered face images are kept.
    pub gallery_dir: PathBuf,
    /// Speech rate multiplier (1.0 = normal pace).
    pub speech_rate: f32,
    /// Recognition language tag.
    pub language: String,
    /// How long to wait for the visitor to answer.
    pub listen_timeout_secs: u64,
    /// Minimum face image side length accepted for registration.
    pub min_face_px: u32,
    pub bus: BusKind,
}

impl Config {
    /// Load configuration from `WELCOME_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = welcome_core::default_data_dir();

        let db_path = std::env::var("WELCOME_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("faces.db"));

        Self {
            db_path,
            max_distance_m: checked_max_distance(env_f32(
                "WELCOME_MAX_DISTANCE_M",
                welcome_core::DEFAULT_MAX_DISTANCE_M,
            )),
            snapshot_dir: env_path("WELCOME_SNAPSHOT_DIR", data_dir.join("snapshots")),
            gallery_dir: env_path("WELCOME_GALLERY_DIR", data_dir.join("gallery")),
            speech_rate: env_f32("WELCOME_SPEECH_RATE", 0.8),
            language: std::env::var("WELCOME_LANGUAGE").unwrap_or_else(|_| "en-US".to_string()),
            listen_timeout_secs: env_u64("WELCOME_LISTEN_TIMEOUT_SECS", 8),
            min_face_px: env_u32("WELCOME_MIN_FACE_PX", 64),
            bus: std::env::var("WELCOME_BUS")
                .ok()
                .and_then(|v| parse_bus(&v))
                .unwrap_or(BusKind::Session),
        }
    }
}

/// The distance limit must be positive and finite; anything else falls back
/// to the default.
fn checked_max_distance(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        return value;
    }
    tracing::warn!(
        value,
        default = welcome_core::DEFAULT_MAX_DISTANCE_M,
        "WELCOME_MAX_DISTANCE_M must be a positive number; using default"
    );
    welcome_core::DEFAULT_MAX_DISTANCE_M
}

fn parse_bus(value: &str) -> Option<BusKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "session" => Some(BusKind::Session),
        "system" => Some(BusKind::System),
        _ => None,
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bus() {
        assert_eq!(parse_bus("system"), Some(BusKind::System));
        assert_eq!(parse_bus(" Session "), Some(BusKind::Session));
        assert_eq!(parse_bus("tcp"), None);
    }

    #[test]
    fn test_env_helpers_fall_back_on_garbage() {
        std::env::set_var("WELCOME_TEST_BAD_F32", "not-a-number");
        assert_eq!(env_f32("WELCOME_TEST_BAD_F32", 1.0), 1.0);
        std::env::set_var("WELCOME_TEST_GOOD_U64", "12");
        assert_eq!(env_u64("WELCOME_TEST_GOOD_U64", 8), 12);
        assert_eq!(env_u32("WELCOME_TEST_UNSET_U32", 64), 64);
    }

    #[test]
    fn test_checked_max_distance() {
        let default = welcome_core::DEFAULT_MAX_DISTANCE_M;
        assert_eq!(checked_max_distance(1.5), 1.5);
        assert_eq!(checked_max_distance(f32::NAN), default);
        assert_eq!(checked_max_distance(f32::INFINITY), default);
        assert_eq!(checked_max_distance(-1.0), default);
        assert_eq!(checked_max_distance(0.0), default);
    }
}
