use crate::error::AppError;
use crate::models::classify_types::{PredictionEntry, WasteCategory};
use crate::models::model_types::{Normalization, OutputKind, TensorLayout};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Center-crop to a square, resize to `size` and build a `1 x 3 x size x size`
/// (or NHWC) tensor.
pub fn preprocess_image(
    img: &DynamicImage,
    size: u32,
    layout: TensorLayout,
    normalization: Normalization,
) -> Result<Array4<f32>, AppError> {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return Err(AppError::inference("Cannot classify an empty image"));
    }

    let side = w.min(h);
    let crop_x = (w - side) / 2;
    let crop_y = (h - side) / 2;
    let cropped = img.crop_imm(crop_x, crop_y, side, side);
    let resized = cropped.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // Pass 1: normalize pixels sequentially (HWC).
    let raw = rgb.into_raw();
    let hw = (size * size) as usize;
    let mut interleaved = vec![0f32; 3 * hw];
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        let off = i * 3;
        for c in 0..3 {
            interleaved[off + c] = normalize(pixel[c], c, normalization);
        }
    }

    let side = size as usize;
    let tensor = match layout {
        TensorLayout::Nhwc => Array4::from_shape_vec((1, side, side, 3), interleaved),
        TensorLayout::Nchw => {
            // Pass 2: transpose HWC -> CHW in tiles so the source and all three
            // destination channels stay cache resident.
            let mut data = vec![0f32; 3 * hw];
            const TILE: usize = 1024;
            for base in (0..hw).step_by(TILE) {
                let end = (base + TILE).min(hw);
                for i in base..end {
                    let src = i * 3;
                    data[i] = interleaved[src];
                    data[hw + i] = interleaved[src + 1];
                    data[2 * hw + i] = interleaved[src + 2];
                }
            }
            Array4::from_shape_vec((1, 3, side, side), data)
        }
    }
    .map_err(|e| AppError::inference(format!("Failed to create tensor: {}", e)))?;

    Ok(tensor)
}

fn normalize(value: u8, channel: usize, normalization: Normalization) -> f32 {
    match normalization {
        Normalization::SignedUnit => value as f32 / 127.5 - 1.0,
        Normalization::Imagenet => (value as f32 / 255.0 - MEAN[channel]) / STD[channel],
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Run one forward pass. `labels[i]` names output index `i`.
pub fn run_inference_with_model(
    model: &mut Session,
    input: Array4<f32>,
    labels: &[WasteCategory],
    output: OutputKind,
) -> Result<Vec<PredictionEntry>, AppError> {
    let input_name = model.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input)
        .map_err(|e| AppError::inference(format!("Failed to create tensor value: {}", e)))?;

    let outputs = model
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError::inference(format!("Inference failed: {}", e)))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError::inference("Model produced no outputs"))?;

    let (_, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError::inference(format!("Failed to extract output tensor: {}", e)))?;

    if data.len() != labels.len() {
        return Err(AppError::inference(format!(
            "Model produced {} scores for {} labels",
            data.len(),
            labels.len()
        )));
    }

    let probabilities = match output {
        OutputKind::Probabilities => data.to_vec(),
        OutputKind::Logits => softmax(data),
    };

    Ok(labels
        .iter()
        .zip(probabilities)
        .map(|(&category, probability)| PredictionEntry::new(category, probability))
        .collect())
}
