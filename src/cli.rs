use crate::commands::Backend;
use crate::config::AppConfig;
use crate::services::source::camera::interface::FacingMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sort biomedical waste photos into chemical, infectious, plastic and general.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// JSON config file (default: <config dir>/biosort/config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Model base URL or directory holding model.json and metadata.json.
    #[arg(long, global = true)]
    pub model_url: Option<String>,
    /// Classifier backend (default: onnx when a model URL is set, demo otherwise).
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,
    /// Seed for the demo backend.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Print state as JSON instead of text.
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Classify one image file.
    Classify { path: PathBuf },
    /// Classify the first image among several dropped paths.
    Drop {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Open the camera, capture a still and classify it.
    Camera {
        #[arg(long, value_enum, default_value_t = FacingMode::Environment)]
        facing: FacingMode,
        /// Let the stream run this long before capturing.
        #[arg(long, default_value_t = 500)]
        capture_after_ms: u64,
    },
    /// Fetch a still from the network camera and classify it.
    Remote {
        /// Camera base URL; /capture is appended.
        #[arg(long)]
        url: Option<String>,
    },
    /// Fetch and load the model, then print its status.
    Model,
    /// Interactive session (default).
    Interactive,
}

impl Args {
    /// Apply flags on top of the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.model_url {
            config.model_url = Some(url.clone());
        }
        if let Some(seed) = self.seed {
            config.demo.seed = Some(seed);
        }
        if let Some(Command::Remote { url: Some(url) }) = &self.command {
            config.remote_camera_url = Some(url.clone());
        }
    }
}
