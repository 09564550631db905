use crate::error::AppError;
use crate::models::classify_types::{PredictionEntry, PredictionSet, WasteCategory};

/// Rank raw classifier output into a full `PredictionSet`.
///
/// Entries are first placed in enumeration order, then stable-sorted by
/// descending probability, so equal probabilities keep enumeration order and
/// the top entry is deterministic. Categories the classifier left out get
/// probability 0. NaN is treated as 0 and values are clamped to [0, 1].
pub fn rank(raw: &[PredictionEntry]) -> Result<PredictionSet, AppError> {
    let mut slots: [Option<f32>; 4] = [None; 4];

    for entry in raw {
        let slot = &mut slots[entry.category.index()];
        if slot.is_some() {
            return Err(AppError::inference(format!(
                "Classifier returned {} more than once",
                entry.category
            )));
        }
        *slot = Some(sanitize(entry.probability));
    }

    let mut entries: Vec<PredictionEntry> = WasteCategory::ALL
        .iter()
        .map(|&category| {
            let probability = slots[category.index()].unwrap_or_else(|| {
                log::warn!("No probability for {}, assuming 0", category);
                0.0
            });
            PredictionEntry::new(category, probability)
        })
        .collect();

    // Vec::sort_by is stable.
    entries.sort_by(|a, b| b.probability.total_cmp(&a.probability));

    Ok(PredictionSet { entries })
}

// Also folds -0.0 into 0.0, which total_cmp would otherwise order below it.
fn sanitize(probability: f32) -> f32 {
    if probability.is_nan() || probability <= 0.0 {
        0.0
    } else {
        probability.min(1.0)
    }
}
