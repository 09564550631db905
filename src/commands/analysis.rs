use super::AppState;
use crate::models::image_types::ImageHandle;
use crate::services::analysis::PresentationView;
use crate::services::source::camera::interface::FacingMode;
use crate::services::source::{InputMode, RemoteStatus};
use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct InputView {
    pub mode: InputMode,
    pub facing: FacingMode,
    pub active_tracks: usize,
    pub preview: Option<ImageHandle>,
    /// `data:` URL of the preview, for surfaces that display it.
    pub preview_url: Option<String>,
    pub remote: RemoteStatus,
}

/// Everything a display surface needs for one frame.
#[derive(Debug, Serialize, Clone)]
pub struct AppSnapshot {
    pub analysis: PresentationView,
    pub input: InputView,
}

pub async fn get_analysis_state(state: &AppState) -> AppSnapshot {
    let analysis = state.session.lock().await.view();
    let input = state.input.lock().await;
    AppSnapshot {
        analysis,
        input: InputView {
            mode: input.mode(),
            facing: input.facing(),
            active_tracks: input.active_tracks(),
            preview: input.preview().cloned(),
            preview_url: input.preview().map(ImageHandle::to_data_url),
            remote: input.remote_status().clone(),
        },
    }
}

/// Clear the result, the preview and any open camera. In-flight results are
/// dropped when they arrive.
pub async fn reset(state: &AppState) {
    state.session.lock().await.reset();
    state.input.lock().await.clear();
    log::info!("Reset");
}

/// Dismiss the connection error and any analysis error.
pub async fn dismiss_error(state: &AppState) {
    state.input.lock().await.dismiss_error();
    let mut session = state.session.lock().await;
    if session.error().is_some() {
        session.reset();
    }
}
