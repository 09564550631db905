//! Analysis lifecycle: one explicit state value, moved only by `transition`.
//!
//! Every acquisition gets a fresh generation number. Reset also advances the
//! generation, so a result that arrives for an older generation is dropped
//! instead of overwriting what is on screen.

use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::{PredictionEntry, PredictionSet};
use crate::models::image_types::ImageHandle;
use crate::services::classifier::interface::Classifier;
use crate::services::{image_service, ranking};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    Idle {
        error: Option<String>,
    },
    Running {
        generation: u64,
        image: ImageHandle,
    },
    Done {
        generation: u64,
        image: ImageHandle,
        predictions: PredictionSet,
    },
}

impl Default for AnalysisState {
    fn default() -> Self {
        AnalysisState::Idle { error: None }
    }
}

#[derive(Debug)]
pub enum Event {
    Acquired { generation: u64, image: ImageHandle },
    InferenceSucceeded { generation: u64, predictions: PredictionSet },
    InferenceFailed { generation: u64, error: AppError },
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Classify { generation: u64, image: ImageHandle },
}

pub fn transition(state: AnalysisState, event: Event) -> (AnalysisState, Vec<Effect>) {
    match (state, event) {
        (state @ AnalysisState::Running { .. }, Event::Acquired { .. }) => (state, vec![]),

        // The previous result is dropped here, before inference starts.
        (_, Event::Acquired { generation, image }) => (
            AnalysisState::Running {
                generation,
                image: image.clone(),
            },
            vec![Effect::Classify { generation, image }],
        ),

        (
            AnalysisState::Running {
                generation: current,
                image,
            },
            Event::InferenceSucceeded {
                generation,
                predictions,
            },
        ) if current == generation => (
            AnalysisState::Done {
                generation,
                image,
                predictions,
            },
            vec![],
        ),

        (
            AnalysisState::Running {
                generation: current,
                ..
            },
            Event::InferenceFailed { generation, error },
        ) if current == generation => (
            AnalysisState::Idle {
                error: Some(error.message),
            },
            vec![],
        ),

        (_, Event::Reset) => (AnalysisState::Idle { error: None }, vec![]),

        // Late results for a superseded generation.
        (state, Event::InferenceSucceeded { .. }) | (state, Event::InferenceFailed { .. }) => {
            (state, vec![])
        }
    }
}

/// Work order for one inference, tagged with its generation.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub generation: u64,
    pub image: ImageHandle,
}

/// What display surfaces read.
#[derive(Debug, Serialize, Clone)]
pub struct PresentationView {
    pub status: &'static str,
    pub analyzing: bool,
    pub generation: u64,
    pub image: Option<ImageHandle>,
    pub top: Option<PredictionEntry>,
    pub ranked: Vec<PredictionEntry>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct AnalysisSession {
    state: AnalysisState,
    generation: u64,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self.state, AnalysisState::Running { .. })
    }

    pub fn predictions(&self) -> Option<&PredictionSet> {
        match &self.state {
            AnalysisState::Done { predictions, .. } => Some(predictions),
            _ => None,
        }
    }

    pub fn top_entry(&self) -> Option<&PredictionEntry> {
        self.predictions().map(|p| p.top())
    }

    pub fn ranked(&self) -> &[PredictionEntry] {
        self.predictions().map(|p| p.ranked()).unwrap_or(&[])
    }

    pub fn image(&self) -> Option<&ImageHandle> {
        match &self.state {
            AnalysisState::Running { image, .. } | AnalysisState::Done { image, .. } => Some(image),
            AnalysisState::Idle { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            AnalysisState::Idle { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn view(&self) -> PresentationView {
        let status = match self.state {
            AnalysisState::Idle { .. } => "idle",
            AnalysisState::Running { .. } => "running",
            AnalysisState::Done { .. } => "done",
        };
        PresentationView {
            status,
            analyzing: self.is_analyzing(),
            generation: self.generation,
            image: self.image().cloned(),
            top: self.top_entry().copied(),
            ranked: self.ranked().to_vec(),
            error: self.error().map(str::to_string),
        }
    }

    fn dispatch(&mut self, event: Event) -> Vec<Effect> {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = transition(state, event);
        self.state = state;
        effects
    }

    /// Enter `Running` for a new image. Refused while an analysis is in flight.
    pub fn begin(&mut self, image: ImageHandle) -> Result<Ticket, AppError> {
        if self.is_analyzing() {
            return Err(AppError::new(ErrorKind::Busy, "Analysis already in progress"));
        }

        self.generation += 1;
        let effects = self.dispatch(Event::Acquired {
            generation: self.generation,
            image,
        });

        match effects.into_iter().next() {
            Some(Effect::Classify { generation, image }) => Ok(Ticket { generation, image }),
            None => Err(AppError::new(ErrorKind::Busy, "Analysis already in progress")),
        }
    }

    /// Apply the outcome of the inference for `generation`.
    ///
    /// Returns false when the result was stale and got dropped.
    pub fn complete(&mut self, generation: u64, result: Result<PredictionSet, AppError>) -> bool {
        let current = matches!(
            self.state,
            AnalysisState::Running { generation: g, .. } if g == generation
        );
        if !current {
            log::debug!(
                "Dropping result of generation {} (current generation {})",
                generation,
                self.generation
            );
            return false;
        }

        let event = match result {
            Ok(predictions) => {
                log::info!(
                    "Generation {}: {} ({:.1}%)",
                    generation,
                    predictions.top().category,
                    predictions.top().percentage()
                );
                Event::InferenceSucceeded {
                    generation,
                    predictions,
                }
            }
            Err(error) => {
                log::warn!("Generation {} failed: {}", generation, error);
                Event::InferenceFailed { generation, error }
            }
        };
        self.dispatch(event);
        true
    }

    /// Back to idle. Anything still in flight becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.dispatch(Event::Reset);
    }
}

/// Decode, classify and rank one image.
pub async fn run_classification(
    classifier: &dyn Classifier,
    image: ImageHandle,
) -> Result<PredictionSet, AppError> {
    let decoded = image_service::decode_handle_async(image).await?;
    let raw = classifier.classify(&decoded).await?;
    ranking::rank(&raw)
}

/// Full cycle for one acquired image: begin, classify, complete.
///
/// Only `Busy` is returned as an error; inference failures end up in the
/// session state as `Idle { error }`.
pub async fn analyze(
    session: &Mutex<AnalysisSession>,
    classifier: &dyn Classifier,
    image: ImageHandle,
) -> Result<AnalysisState, AppError> {
    let ticket = session.lock().await.begin(image)?;
    log::debug!(
        "Generation {}: classifying image #{} with {}",
        ticket.generation,
        ticket.image.id(),
        classifier.name()
    );

    let result = run_classification(classifier, ticket.image).await;

    let mut session = session.lock().await;
    session.complete(ticket.generation, result);
    Ok(session.state().clone())
}
