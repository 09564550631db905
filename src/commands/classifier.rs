use super::AppState;
use crate::error::AppError;
use crate::models::classify_types::ModelStatus;

/// Status of the configured model, `None` when no model backend is in use.
pub async fn get_model_status(state: &AppState) -> Option<ModelStatus> {
    match &state.onnx {
        Some(onnx) => Some(onnx.model_manager().status(onnx.locator()).await),
        None => None,
    }
}

/// Fetch (if remote) and load the configured model ahead of the first image.
pub async fn load_model(state: &AppState) -> Result<ModelStatus, AppError> {
    let onnx = state.onnx.as_ref().ok_or_else(|| {
        AppError::config("No model backend configured. Pass --model-url or --backend onnx.")
    })?;

    let model = onnx.model_manager().load_model(onnx.locator()).await?;
    log::info!(
        "Model ready: {} labels from {}",
        model.labels.len(),
        onnx.locator()
    );
    Ok(onnx.model_manager().status(onnx.locator()).await)
}
