use super::AppState;
use crate::error::{AppError, ErrorKind};
use crate::models::image_types::ImageHandle;
use crate::services::analysis::{self, AnalysisState};
use crate::services::source::camera::interface::FacingMode;
use crate::services::source::{Acquisition, ImageSource};
use std::path::PathBuf;

async fn ensure_idle(state: &AppState) -> Result<(), AppError> {
    if state.session.lock().await.is_analyzing() {
        return Err(AppError::new(ErrorKind::Busy, "Analysis already in progress"));
    }
    Ok(())
}

async fn run(state: &AppState, image: ImageHandle) -> Result<AnalysisState, AppError> {
    analysis::analyze(&state.session, state.classifier.as_ref(), image).await
}

/// Acquire from `source` and analyze the result.
///
/// `Ok(None)` means the source produced nothing to analyze (e.g. a drop with
/// no images in it).
pub async fn acquire_and_analyze(
    state: &AppState,
    source: ImageSource,
) -> Result<Option<AnalysisState>, AppError> {
    let analyzing = state.session.lock().await.is_analyzing();
    if analyzing && !matches!(source, ImageSource::Dropped(_)) {
        return Err(AppError::new(ErrorKind::Busy, "Analysis already in progress"));
    }

    let remote = matches!(source, ImageSource::RemoteCamera);
    let acquired = state.input.lock().await.acquire(source, analyzing).await;

    let image = match acquired {
        Ok(Acquisition::Image(image)) => image,
        Ok(Acquisition::Nothing) => return Ok(None),
        Ok(Acquisition::Remote(camera)) => {
            // The old result goes away before we start waiting on the network.
            state.session.lock().await.reset();
            let captured = camera.capture().await;
            state.input.lock().await.finish_remote(captured)?
        }
        Err(e) => {
            // A failed remote capture leaves nothing on screen.
            if remote {
                state.session.lock().await.reset();
            }
            return Err(e);
        }
    };

    run(state, image).await.map(Some)
}

async fn acquire_one(state: &AppState, source: ImageSource) -> Result<AnalysisState, AppError> {
    acquire_and_analyze(state, source)
        .await?
        .ok_or_else(|| AppError::acquisition("No image was acquired"))
}

pub async fn classify_file(state: &AppState, path: PathBuf) -> Result<AnalysisState, AppError> {
    acquire_one(state, ImageSource::LocalFile(path)).await
}

/// Non-image drops, drops in camera mode and drops while analyzing are ignored.
pub async fn classify_drop(
    state: &AppState,
    paths: Vec<PathBuf>,
) -> Result<Option<AnalysisState>, AppError> {
    acquire_and_analyze(state, ImageSource::Dropped(paths)).await
}

pub async fn start_camera(state: &AppState, facing: Option<FacingMode>) -> Result<(), AppError> {
    ensure_idle(state).await?;
    let mut input = state.input.lock().await;
    if let Some(facing) = facing {
        input.set_facing(facing);
    }
    input.start_camera().await
}

pub async fn capture_camera(state: &AppState) -> Result<AnalysisState, AppError> {
    acquire_one(state, ImageSource::LiveCamera).await
}

pub async fn stop_camera(state: &AppState) {
    state.input.lock().await.stop_camera();
}

pub async fn capture_remote(state: &AppState) -> Result<AnalysisState, AppError> {
    acquire_one(state, ImageSource::RemoteCamera).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::classify_types::WasteCategory;
    use crate::services::classifier::impl_fake::FixedClassifier;
    use crate::services::source::camera::impl_fake::FakeCamera;
    use crate::services::source::InputMode;
    use std::sync::Arc;

    fn state(camera: FakeCamera) -> AppState {
        let classifier = FixedClassifier::from_probabilities(&[
            (WasteCategory::Infectious, 0.7),
            (WasteCategory::General, 0.3),
        ]);
        AppState::new(AppConfig::default(), Arc::new(classifier), Arc::new(camera)).unwrap()
    }

    #[tokio::test]
    async fn test_camera_capture_is_classified() {
        let state = state(FakeCamera::new());
        start_camera(&state, None).await.unwrap();
        assert_eq!(state.input.lock().await.mode(), InputMode::Camera);

        let result = capture_camera(&state).await.unwrap();
        match result {
            AnalysisState::Done { predictions, .. } => {
                assert_eq!(predictions.top().category, WasteCategory::Infectious)
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(state.input.lock().await.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_file_with_wrong_type_leaves_state_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();

        let state = state(FakeCamera::new());
        let err = classify_file(&state, path).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Acquisition);
        assert!(matches!(
            state.session.lock().await.state(),
            AnalysisState::Idle { error: None }
        ));
    }

    #[tokio::test]
    async fn test_remote_without_url_is_config_error() {
        let state = state(FakeCamera::new());
        let err = capture_remote(&state).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }
}
