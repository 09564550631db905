use async_trait::async_trait;
use biosort_lib::error::{AppError, ErrorKind};
use biosort_lib::models::classify_types::{PredictionEntry, WasteCategory};
use biosort_lib::models::image_types::{ImageHandle, ImageOrigin};
use biosort_lib::services::analysis::{analyze, AnalysisSession, AnalysisState};
use biosort_lib::services::classifier::impl_fake::FixedClassifier;
use biosort_lib::services::classifier::interface::Classifier;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

fn png_handle() -> ImageHandle {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb([200, 30, 30])));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    ImageHandle::new(bytes.into_inner(), "image/png", ImageOrigin::LiveCamera)
}

fn plastic_classifier() -> FixedClassifier {
    FixedClassifier::from_probabilities(&[
        (WasteCategory::Plastic, 0.95),
        (WasteCategory::Chemical, 0.05),
        (WasteCategory::Infectious, 0.0),
        (WasteCategory::General, 0.0),
    ])
}

/// Holds its answer until the gate is opened.
struct GatedClassifier {
    gate: Arc<Notify>,
    answer: Vec<PredictionEntry>,
}

#[async_trait]
impl Classifier for GatedClassifier {
    async fn classify(&self, _image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        self.gate.notified().await;
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _image: &DynamicImage) -> Result<Vec<PredictionEntry>, AppError> {
        Err(AppError::model("Failed to fetch model.json: 404"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

async fn wait_until_analyzing(session: &Mutex<AnalysisSession>) {
    while !session.lock().await.is_analyzing() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_plastic_wins_end_to_end() {
    let session = Mutex::new(AnalysisSession::new());
    let state = analyze(&session, &plastic_classifier(), png_handle()).await.unwrap();

    let AnalysisState::Done { predictions, .. } = state else {
        panic!("expected a result, got {:?}", state);
    };
    assert_eq!(predictions.top().category, WasteCategory::Plastic);
    assert_eq!(predictions.ranked()[0].category, WasteCategory::Plastic);
    assert_eq!(predictions.ranked()[1].category, WasteCategory::Chemical);
    assert_eq!(predictions.len(), 4);
}

#[tokio::test]
async fn test_late_result_does_not_overwrite_newer_generation() {
    let session = Mutex::new(AnalysisSession::new());
    let gate = Arc::new(Notify::new());
    let slow = GatedClassifier {
        gate: gate.clone(),
        answer: vec![
            PredictionEntry::new(WasteCategory::Chemical, 0.99),
            PredictionEntry::new(WasteCategory::General, 0.01),
        ],
    };
    let fast = plastic_classifier();

    let first = analyze(&session, &slow, png_handle());
    let second = async {
        wait_until_analyzing(&session).await;
        session.lock().await.reset();
        let state = analyze(&session, &fast, png_handle()).await.unwrap();
        gate.notify_one();
        state
    };

    let (first_state, second_state) = tokio::join!(first, second);
    let first_state = first_state.unwrap();

    for state in [&first_state, &second_state, session.lock().await.state()] {
        match state {
            AnalysisState::Done { predictions, .. } => {
                assert_eq!(predictions.top().category, WasteCategory::Plastic)
            }
            other => panic!("expected the newer result, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_new_acquisition_clears_previous_result() {
    let session = Mutex::new(AnalysisSession::new());
    analyze(&session, &plastic_classifier(), png_handle()).await.unwrap();
    assert!(session.lock().await.predictions().is_some());

    let gate = Arc::new(Notify::new());
    let slow = GatedClassifier {
        gate: gate.clone(),
        answer: vec![PredictionEntry::new(WasteCategory::General, 0.8)],
    };

    let next = analyze(&session, &slow, png_handle());
    let observer = async {
        wait_until_analyzing(&session).await;
        {
            let s = session.lock().await;
            assert!(s.predictions().is_none());
            assert!(s.top_entry().is_none());
            assert!(s.ranked().is_empty());
            assert_eq!(s.view().status, "running");
        }
        gate.notify_one();
    };

    let (state, ()) = tokio::join!(next, observer);
    let AnalysisState::Done { predictions, .. } = state.unwrap() else {
        panic!("expected a result");
    };
    assert_eq!(predictions.top().category, WasteCategory::General);
}

#[tokio::test]
async fn test_second_acquisition_while_running_is_busy() {
    let session = Mutex::new(AnalysisSession::new());
    let gate = Arc::new(Notify::new());
    let slow = GatedClassifier {
        gate: gate.clone(),
        answer: vec![PredictionEntry::new(WasteCategory::Infectious, 0.6)],
    };

    let running = analyze(&session, &slow, png_handle());
    let intruder = async {
        wait_until_analyzing(&session).await;
        let err = analyze(&session, &plastic_classifier(), png_handle())
            .await
            .unwrap_err();
        gate.notify_one();
        err
    };

    let (state, err) = tokio::join!(running, intruder);
    assert_eq!(err.kind, ErrorKind::Busy);
    assert!(matches!(state.unwrap(), AnalysisState::Done { .. }));
}

#[tokio::test]
async fn test_failure_returns_to_idle_with_message() {
    let session = Mutex::new(AnalysisSession::new());
    let state = analyze(&session, &FailingClassifier, png_handle()).await.unwrap();

    match state {
        AnalysisState::Idle { error: Some(message) } => assert!(message.contains("model.json")),
        other => panic!("expected an error state, got {:?}", other),
    }
    let s = session.lock().await;
    assert!(!s.is_analyzing());
    assert!(s.predictions().is_none());
}

#[tokio::test]
async fn test_undecodable_image_is_reported() {
    let session = Mutex::new(AnalysisSession::new());
    let junk = ImageHandle::new(vec![0u8; 32], "image/png", ImageOrigin::LiveCamera);
    let state = analyze(&session, &plastic_classifier(), junk).await.unwrap();
    assert!(matches!(state, AnalysisState::Idle { error: Some(_) }));
}
