use crate::error::AppError;
use crate::models::classify_types::PredictionEntry;
use crate::services::classifier::interface::Classifier;
use crate::services::classifier::model_manager::{ModelLocator, ModelManager};
use async_trait::async_trait;
use image::DynamicImage;

/// Classifier backed by the ONNX model found at a locator.
pub struct OnnxClassifier {
    locator: ModelLocator,
    model_manager: ModelManager,
}

impl OnnxClassifier {
    pub fn new(locator: ModelLocator, model_manager: ModelManager) -> Self {
        Self {
            locator,
            model_manager,
        }
    }

    pub fn locator(&self) -> &ModelLocator {
        &self.locator
    }

    pub fn model_manager(&self) -> &ModelManager {
        &self.model_manager
    }
}

#[async_trait]
impl Classifier for OnnxClassifier {
    async fn classify(&self, image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        self.model_manager.classify(&self.locator, image).await
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
