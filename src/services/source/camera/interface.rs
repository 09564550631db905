use crate::error::AppError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, pointed at the item.
    #[default]
    Environment,
    User,
}

/// Something that can open a live video stream.
pub trait CameraDevice: Send + Sync {
    fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>, AppError>;
}

/// An open stream. Holds the device until `stop` is called or it is dropped.
pub trait CameraStream: Send {
    /// Current frame at full resolution.
    fn snapshot(&mut self) -> Result<DynamicImage, AppError>;

    /// Number of tracks still holding the device.
    fn active_tracks(&self) -> usize;

    /// Release every track. Safe to call more than once.
    fn stop(&mut self);
}
