use crate::error::AppError;
use crate::models::classify_types::PredictionEntry;
use async_trait::async_trait;
use image::DynamicImage;

/// Turns one fully decoded image into one probability per waste category.
///
/// The output order is unspecified; ranking happens in `services::ranking`.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError>;

    fn name(&self) -> &str;
}
