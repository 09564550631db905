use crate::error::AppError;
use crate::models::classify_types::{PredictionEntry, WasteCategory};
use crate::services::classifier::interface::Classifier;
use async_trait::async_trait;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Confidence (percent) of each demo prediction.
pub const DEMO_PREDICTIONS: [(WasteCategory, f32); 4] = [
    (WasteCategory::Chemical, 92.4),
    (WasteCategory::Infectious, 88.9),
    (WasteCategory::Plastic, 95.1),
    (WasteCategory::General, 78.5),
];

/// Always answers with the same probabilities. Test data provider.
pub struct FixedClassifier {
    entries: Vec<PredictionEntry>,
}

impl FixedClassifier {
    pub fn new(entries: Vec<PredictionEntry>) -> Self {
        Self { entries }
    }

    pub fn from_probabilities(probabilities: &[(WasteCategory, f32)]) -> Self {
        Self::new(
            probabilities
                .iter()
                .map(|&(category, probability)| PredictionEntry::new(category, probability))
                .collect(),
        )
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        Ok(self.entries.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Stand-in for a real model: picks one demo prediction after a short delay.
///
/// The remaining probability mass is spread over the other categories so the
/// ranking view has something to show. Seeded, so runs are reproducible.
pub struct DemoClassifier {
    rng: Mutex<StdRng>,
    delay: Duration,
}

impl DemoClassifier {
    pub fn new(seed: Option<u64>, delay: Duration) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng: Mutex::new(rng),
            delay,
        }
    }

    fn draw(&self) -> Result<Vec<PredictionEntry>, AppError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| AppError::inference("Demo generator lock poisoned"))?;

        let (winner, confidence) = DEMO_PREDICTIONS[rng.random_range(0..DEMO_PREDICTIONS.len())];
        let top = confidence / 100.0;

        let others: Vec<WasteCategory> = WasteCategory::ALL
            .iter()
            .copied()
            .filter(|c| *c != winner)
            .collect();
        let weights: Vec<f32> = others.iter().map(|_| rng.random::<f32>() + 0.01).collect();
        let weight_sum: f32 = weights.iter().sum();

        let mut entries = vec![PredictionEntry::new(winner, top)];
        for (category, weight) in others.into_iter().zip(weights) {
            entries.push(PredictionEntry::new(category, (1.0 - top) * weight / weight_sum));
        }
        Ok(entries)
    }
}

#[async_trait]
impl Classifier for DemoClassifier {
    async fn classify(&self, _image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.draw()
    }

    fn name(&self) -> &str {
        "demo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ranking::rank;

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(2, 2)
    }

    #[tokio::test]
    async fn test_fixed_classifier_returns_table() {
        let classifier = FixedClassifier::from_probabilities(&[
            (WasteCategory::Plastic, 0.95),
            (WasteCategory::Chemical, 0.05),
        ]);
        let entries = classifier.classify(&image()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, WasteCategory::Plastic);
    }

    #[tokio::test]
    async fn test_demo_is_reproducible_with_seed() {
        let a = DemoClassifier::new(Some(7), Duration::ZERO);
        let b = DemoClassifier::new(Some(7), Duration::ZERO);

        for _ in 0..5 {
            let left = rank(&a.classify(&image()).await.unwrap()).unwrap();
            let right = rank(&b.classify(&image()).await.unwrap()).unwrap();
            assert_eq!(left, right);
        }
    }

    #[tokio::test]
    async fn test_demo_covers_all_categories_and_sums_to_one() {
        let demo = DemoClassifier::new(Some(42), Duration::ZERO);
        let entries = demo.classify(&image()).await.unwrap();

        assert_eq!(entries.len(), 4);
        let sum: f32 = entries.iter().map(|e| e.probability).sum();
        assert!((sum - 1.0).abs() < 1e-4);

        let set = rank(&entries).unwrap();
        let expected = DEMO_PREDICTIONS
            .iter()
            .find(|(c, _)| *c == set.top().category)
            .map(|(_, p)| p / 100.0)
            .unwrap();
        assert!((set.top().probability - expected).abs() < 1e-6);
    }
}
