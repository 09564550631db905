use serde::Deserialize;

/// Contents of `model.json`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelTopology {
    pub format: String,
    /// Weights file, relative to the model locator.
    pub weights: String,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    pub output: OutputKind,
}

impl Default for ModelTopology {
    fn default() -> Self {
        Self {
            format: "onnx".to_string(),
            weights: "model.onnx".to_string(),
            layout: TensorLayout::Nchw,
            normalization: Normalization::SignedUnit,
            output: OutputKind::Probabilities,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    Nchw,
    Nhwc,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `x / 127.5 - 1`, the Teachable Machine convention.
    SignedUnit,
    /// ImageNet mean/std.
    Imagenet,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Probabilities,
    Logits,
}

/// Contents of `metadata.json`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(rename = "imageSize", default = "default_image_size")]
    pub image_size: u32,
    #[serde(rename = "modelName", default)]
    pub model_name: Option<String>,
}

fn default_image_size() -> u32 {
    224
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_defaults() {
        let topology: ModelTopology = serde_json::from_str("{}").unwrap();
        assert_eq!(topology, ModelTopology::default());

        let topology: ModelTopology =
            serde_json::from_str(r#"{"weights":"w/waste.onnx","layout":"nhwc","output":"logits"}"#)
                .unwrap();
        assert_eq!(topology.weights, "w/waste.onnx");
        assert_eq!(topology.layout, TensorLayout::Nhwc);
        assert_eq!(topology.output, OutputKind::Logits);
        assert_eq!(topology.normalization, Normalization::SignedUnit);
    }

    #[test]
    fn test_teachable_machine_metadata() {
        let metadata: ModelMetadata = serde_json::from_str(
            r#"{
                "tfjsVersion": "1.3.1",
                "tmVersion": "2.4.7",
                "packageVersion": "0.8.4-alpha2",
                "packageName": "@teachablemachine/image",
                "timeStamp": "2024-01-01T00:00:00.000Z",
                "userMetadata": {},
                "modelName": "tm-my-image-model",
                "labels": ["Chemical Waste", "Infectious Waste", "Plastic/Recyclable Waste", "General Waste"],
                "imageSize": 224
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.labels.len(), 4);
        assert_eq!(metadata.image_size, 224);
        assert_eq!(metadata.model_name.as_deref(), Some("tm-my-image-model"));
    }
}
