use super::interface::{CameraDevice, CameraStream, FacingMode};
use crate::error::AppError;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory camera for tests. Counts open tracks so callers can check the
/// device gets released.
pub struct FakeCamera {
    deny: bool,
    frame: DynamicImage,
    open_tracks: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            deny: false,
            frame: DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([40, 160, 90]))),
            open_tracks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails every `open` like a refused permission prompt.
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    pub fn with_frame(mut self, frame: DynamicImage) -> Self {
        self.frame = frame;
        self
    }

    /// Tracks currently open across all streams.
    pub fn open_tracks(&self) -> Arc<AtomicUsize> {
        self.open_tracks.clone()
    }
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for FakeCamera {
    fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>, AppError> {
        if self.deny {
            return Err(AppError::camera("Unable to access camera: permission denied"));
        }
        self.open_tracks.fetch_add(1, Ordering::SeqCst);
        log::debug!("Fake camera opened ({:?})", facing);
        Ok(Box::new(FakeStream {
            frame: self.frame.clone(),
            open_tracks: self.open_tracks.clone(),
            live: true,
        }))
    }
}

struct FakeStream {
    frame: DynamicImage,
    open_tracks: Arc<AtomicUsize>,
    live: bool,
}

impl CameraStream for FakeStream {
    fn snapshot(&mut self) -> Result<DynamicImage, AppError> {
        if !self.live {
            return Err(AppError::camera("Camera is not running"));
        }
        Ok(self.frame.clone())
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.open_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.stop();
    }
}
