use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_MODEL_URL: &str = "BIOSORT_MODEL_URL";
pub const ENV_REMOTE_CAMERA_URL: &str = "BIOSORT_REMOTE_CAMERA_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Base address of `model.json` / `metadata.json`.
    pub model_url: Option<String>,
    /// Base address of the network camera (`/capture` is appended).
    pub remote_camera_url: Option<String>,
    pub cache_dir: PathBuf,
    pub use_gpu: bool,
    /// Fetch and build the model again on every classification.
    pub reload_model_each_call: bool,
    pub model_timeout_secs: u64,
    pub capture_timeout_secs: u64,
    pub camera: CameraConfig,
    pub demo: DemoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_url: None,
            remote_camera_url: None,
            cache_dir: default_cache_dir(),
            use_gpu: true,
            reload_model_each_call: false,
            model_timeout_secs: 60,
            capture_timeout_secs: 10,
            camera: CameraConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraConfig {
    pub program: String,
    /// `{device}` is replaced with the device for the requested facing mode.
    pub args: Vec<String>,
    pub environment_device: String,
    pub user_device: String,
    /// How long to wait for the first frame.
    pub warmup_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args: [
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "v4l2",
                "-i",
                "{device}",
                "-f",
                "mjpeg",
                "-q:v",
                "3",
                "-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            environment_device: "/dev/video0".to_string(),
            user_device: "/dev/video1".to_string(),
            warmup_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DemoConfig {
    pub seed: Option<u64>,
    pub delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: None,
            delay_ms: 1500,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("biosort")
        .join("models")
}

/// `$CONFIG_DIR/biosort/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("biosort").join("config.json"))
}

impl AppConfig {
    /// Read a config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            AppError::config(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    log::debug!("Using config {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(ENV_MODEL_URL) {
            self.model_url = Some(url);
        }
        if let Some(url) = non_empty(ENV_REMOTE_CAMERA_URL) {
            self.remote_camera_url = Some(url);
        }
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo.delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "model_url": "https://models.example/waste/", "camera": { "warmup_ms": 250 } }"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.model_url.as_deref(), Some("https://models.example/waste/"));
        assert_eq!(config.camera.warmup_ms, 250);
        assert_eq!(config.camera.program, "ffmpeg");
        assert_eq!(config.model_timeout_secs, 60);
        assert!(!config.reload_model_each_call);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&tmp.path().join("nope.json"))).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{ model_url: ").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AppConfig {
            model_url: Some("file:///opt/model".into()),
            ..AppConfig::default()
        };
        config.apply_env(|key| match key {
            ENV_REMOTE_CAMERA_URL => Some("http://10.0.0.7:5000".into()),
            ENV_MODEL_URL => Some("  ".into()),
            _ => None,
        });

        assert_eq!(config.model_url.as_deref(), Some("file:///opt/model"));
        assert_eq!(config.remote_camera_url.as_deref(), Some("http://10.0.0.7:5000"));
    }
}
