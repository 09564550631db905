pub mod analysis;
pub mod classifier;
pub mod input;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::analysis::AnalysisSession;
use crate::services::classifier::impl_fake::DemoClassifier;
use crate::services::classifier::impl_onnx::OnnxClassifier;
use crate::services::classifier::interface::Classifier;
use crate::services::classifier::model_manager::{ModelLocator, ModelManager};
use crate::services::source::camera::interface::{CameraDevice, FacingMode};
use crate::services::source::remote::RemoteCamera;
use crate::services::source::InputController;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// ONNX model at the configured model URL.
    Onnx,
    /// Canned demo predictions, no model needed.
    Demo,
}

/// Everything the commands operate on.
pub struct AppState {
    pub config: AppConfig,
    pub session: Mutex<AnalysisSession>,
    pub input: Mutex<InputController>,
    pub classifier: Arc<dyn Classifier>,
    pub onnx: Option<Arc<OnnxClassifier>>,
}

impl AppState {
    /// Wire up a state around any classifier (tests use the fixed one).
    pub fn new(
        config: AppConfig,
        classifier: Arc<dyn Classifier>,
        camera: Arc<dyn CameraDevice>,
    ) -> Result<Self, AppError> {
        let mut input = InputController::new(camera, FacingMode::Environment);
        if let Some(url) = config.remote_camera_url.as_deref() {
            input.set_remote(RemoteCamera::new(url, config.capture_timeout())?);
        }

        Ok(Self {
            config,
            session: Mutex::new(AnalysisSession::new()),
            input: Mutex::new(input),
            classifier,
            onnx: None,
        })
    }

    /// Build the state for a backend. Without an explicit backend, a configured
    /// model URL selects ONNX and its absence selects the demo.
    pub fn with_backend(
        config: AppConfig,
        backend: Option<Backend>,
        camera: Arc<dyn CameraDevice>,
    ) -> Result<Self, AppError> {
        let backend = backend.unwrap_or(if config.model_url.is_some() {
            Backend::Onnx
        } else {
            log::warn!("No model URL configured, running the demo classifier");
            Backend::Demo
        });

        match backend {
            Backend::Demo => {
                let demo = DemoClassifier::new(config.demo.seed, config.demo_delay());
                Self::new(config, Arc::new(demo), camera)
            }
            Backend::Onnx => {
                let url = config.model_url.as_deref().ok_or_else(|| {
                    AppError::config("No model URL configured (use --model-url or BIOSORT_MODEL_URL)")
                })?;
                let locator = ModelLocator::parse(url)?;
                let model_manager = ModelManager::new(
                    config.cache_dir.clone(),
                    config.model_timeout(),
                    config.use_gpu,
                    !config.reload_model_each_call,
                )?;
                let onnx = Arc::new(OnnxClassifier::new(locator, model_manager));
                let mut state = Self::new(config, onnx.clone(), camera)?;
                state.onnx = Some(onnx);
                Ok(state)
            }
        }
    }
}
