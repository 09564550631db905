pub mod camera;
pub mod local_file;
pub mod remote;

use crate::error::AppError;
use crate::models::image_types::{ImageHandle, ImageOrigin};
use crate::services::image_service::encode_jpeg;
use camera::interface::{CameraDevice, CameraStream, FacingMode};
use remote::RemoteCamera;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Upload,
    Camera,
}

/// Last outcome of a remote capture.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemoteStatus {
    NoImage,
    Connected,
    ConnectionError { message: String },
}

/// Where the next image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    LocalFile(PathBuf),
    Dropped(Vec<PathBuf>),
    LiveCamera,
    RemoteCamera,
}

/// Outcome of `InputController::acquire`.
#[derive(Debug)]
pub enum Acquisition {
    Image(ImageHandle),
    /// The still has to be fetched over the network. Await
    /// `RemoteCamera::capture` and hand the result to `finish_remote`.
    Remote(RemoteCamera),
    /// Nothing usable, e.g. a drop without images.
    Nothing,
}

/// Turns user input into image handles and owns the camera while it is open.
pub struct InputController {
    camera: Arc<dyn CameraDevice>,
    facing: FacingMode,
    remote: Option<RemoteCamera>,
    mode: InputMode,
    stream: Option<Box<dyn CameraStream>>,
    preview: Option<ImageHandle>,
    remote_status: RemoteStatus,
}

impl InputController {
    pub fn new(camera: Arc<dyn CameraDevice>, facing: FacingMode) -> Self {
        Self {
            camera,
            facing,
            remote: None,
            mode: InputMode::Upload,
            stream: None,
            preview: None,
            remote_status: RemoteStatus::NoImage,
        }
    }

    pub fn set_remote(&mut self, remote: RemoteCamera) {
        self.remote = Some(remote);
    }

    pub fn set_facing(&mut self, facing: FacingMode) {
        self.facing = facing;
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn preview(&self) -> Option<&ImageHandle> {
        self.preview.as_ref()
    }

    pub fn remote_status(&self) -> &RemoteStatus {
        &self.remote_status
    }

    pub fn active_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_tracks())
    }

    /// Dispatch on the source kind.
    pub async fn acquire(
        &mut self,
        source: ImageSource,
        analyzing: bool,
    ) -> Result<Acquisition, AppError> {
        let image = match source {
            ImageSource::LocalFile(path) => Some(self.select_file(&path).await?),
            ImageSource::Dropped(paths) => self.drop_files(&paths, analyzing).await?,
            ImageSource::LiveCamera => Some(self.capture()?),
            ImageSource::RemoteCamera => return self.begin_remote().map(Acquisition::Remote),
        };
        Ok(image.map_or(Acquisition::Nothing, Acquisition::Image))
    }

    /// Picking a file always switches back to upload mode.
    pub async fn select_file(&mut self, path: &Path) -> Result<ImageHandle, AppError> {
        self.stop_camera();
        let handle = local_file::read_image_file(path).await?;
        log::info!("Selected {} ({} bytes)", path.display(), handle.len());
        self.preview = Some(handle.clone());
        Ok(handle)
    }

    /// Drops only count in upload mode while idle. The first image wins,
    /// anything else is ignored.
    pub async fn drop_files(
        &mut self,
        paths: &[PathBuf],
        analyzing: bool,
    ) -> Result<Option<ImageHandle>, AppError> {
        if self.mode != InputMode::Upload || analyzing {
            log::debug!("Ignoring drop of {} path(s)", paths.len());
            return Ok(None);
        }
        let Some(path) = local_file::first_image(paths) else {
            log::debug!("Drop contained no image files");
            return Ok(None);
        };
        let handle = local_file::read_image_file(path).await?;
        self.preview = Some(handle.clone());
        Ok(Some(handle))
    }

    /// Open the camera. On failure we are back in upload mode with nothing held.
    pub async fn start_camera(&mut self) -> Result<(), AppError> {
        self.stop_camera();
        self.preview = None;

        let device = self.camera.clone();
        let facing = self.facing;
        let opened = tokio::task::spawn_blocking(move || device.open(facing))
            .await
            .map_err(|e| AppError::camera(format!("Camera task failed: {}", e)))?;

        match opened {
            Ok(stream) => {
                self.stream = Some(stream);
                self.mode = InputMode::Camera;
                Ok(())
            }
            Err(e) => {
                log::error!("Camera error: {}", e);
                self.mode = InputMode::Upload;
                Err(e)
            }
        }
    }

    /// Grab the current frame as a JPEG and release the camera.
    pub fn capture(&mut self) -> Result<ImageHandle, AppError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(AppError::camera("Camera is not running"));
        };

        let frame = stream.snapshot();
        self.stop_camera();

        let frame = frame?;
        let bytes = encode_jpeg(&frame)?;
        let handle = ImageHandle::new(bytes, "image/jpeg", ImageOrigin::LiveCamera);
        log::info!(
            "Captured {}x{} frame ({} bytes)",
            frame.width(),
            frame.height(),
            handle.len()
        );
        self.preview = Some(handle.clone());
        Ok(handle)
    }

    pub fn stop_camera(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.mode = InputMode::Upload;
    }

    /// Start a remote capture: the camera is closed and the preview cleared
    /// before the request goes out.
    pub fn begin_remote(&mut self) -> Result<RemoteCamera, AppError> {
        self.stop_camera();
        self.preview = None;
        self.remote
            .clone()
            .ok_or_else(|| AppError::config("No remote camera configured"))
    }

    /// Record the outcome of a remote capture. Failures leave a connection
    /// error to show.
    pub fn finish_remote(
        &mut self,
        result: Result<ImageHandle, AppError>,
    ) -> Result<ImageHandle, AppError> {
        match result {
            Ok(handle) => {
                self.remote_status = RemoteStatus::Connected;
                self.preview = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                log::error!("Remote capture failed: {}", e);
                self.remote_status = RemoteStatus::ConnectionError {
                    message: e.message.clone(),
                };
                self.preview = None;
                Err(e)
            }
        }
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.remote_status, RemoteStatus::ConnectionError { .. }) {
            self.remote_status = RemoteStatus::NoImage;
        }
    }

    /// Back to a blank upload screen.
    pub fn clear(&mut self) {
        self.stop_camera();
        self.preview = None;
        self.remote_status = RemoteStatus::NoImage;
    }
}

impl Drop for InputController {
    fn drop(&mut self) {
        self.stop_camera();
    }
}

#[cfg(test)]
mod tests {
    use super::camera::impl_fake::FakeCamera;
    use super::*;
    use std::sync::atomic::Ordering;

    fn controller(camera: FakeCamera) -> InputController {
        InputController::new(Arc::new(camera), FacingMode::Environment)
    }

    #[tokio::test]
    async fn test_capture_releases_camera() {
        let camera = FakeCamera::new();
        let tracks = camera.open_tracks();
        let mut input = controller(camera);

        input.start_camera().await.unwrap();
        assert_eq!(input.mode(), InputMode::Camera);
        assert_eq!(input.active_tracks(), 1);

        let handle = input.capture().unwrap();
        assert_eq!(handle.mime(), "image/jpeg");
        assert_eq!(handle.origin(), &ImageOrigin::LiveCamera);
        assert_eq!(input.mode(), InputMode::Upload);
        assert_eq!(input.active_tracks(), 0);
        assert_eq!(tracks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_camera_reverts_to_upload() {
        let mut input = controller(FakeCamera::denied());
        let err = input.start_camera().await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::CameraAccess);
        assert_eq!(input.mode(), InputMode::Upload);
        assert_eq!(input.active_tracks(), 0);
    }

    #[tokio::test]
    async fn test_restart_stops_previous_stream() {
        let camera = FakeCamera::new();
        let tracks = camera.open_tracks();
        let mut input = controller(camera);

        input.start_camera().await.unwrap();
        input.start_camera().await.unwrap();
        assert_eq!(tracks.load(Ordering::SeqCst), 1);

        drop(input);
        assert_eq!(tracks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_without_camera_fails() {
        let mut input = controller(FakeCamera::new());
        assert!(input.capture().is_err());
    }

    #[tokio::test]
    async fn test_drop_ignored_in_camera_mode_or_while_analyzing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("glove.png");
        image::RgbImage::new(2, 2).save(&path).unwrap();
        let paths = vec![path];

        let mut input = controller(FakeCamera::new());
        assert!(input.drop_files(&paths, true).await.unwrap().is_none());

        input.start_camera().await.unwrap();
        assert!(input.drop_files(&paths, false).await.unwrap().is_none());

        input.stop_camera();
        let handle = input.drop_files(&paths, false).await.unwrap().unwrap();
        assert_eq!(input.preview(), Some(&handle));
    }

    #[tokio::test]
    async fn test_remote_without_configuration() {
        let mut input = controller(FakeCamera::new());
        let err = input.acquire(ImageSource::RemoteCamera, false).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Config);
        assert_eq!(input.remote_status(), &RemoteStatus::NoImage);
    }

    #[tokio::test]
    async fn test_remote_acquisition_closes_camera_and_clears_preview() {
        let camera = FakeCamera::new();
        let tracks = camera.open_tracks();
        let mut input = controller(camera);
        input.set_remote(RemoteCamera::new("http://127.0.0.1:9", std::time::Duration::from_secs(1)).unwrap());

        input.start_camera().await.unwrap();
        let acquired = input.acquire(ImageSource::RemoteCamera, false).await.unwrap();
        assert!(matches!(acquired, Acquisition::Remote(_)));
        assert_eq!(tracks.load(Ordering::SeqCst), 0);
        assert_eq!(input.mode(), InputMode::Upload);
        assert!(input.preview().is_none());

        let err = input
            .finish_remote(Err(AppError::remote("Camera answered HTTP 503")))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::RemoteCapture);
        assert!(matches!(input.remote_status(), RemoteStatus::ConnectionError { .. }));
    }

    #[tokio::test]
    async fn test_file_selection_closes_camera() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vial.png");
        image::RgbImage::new(2, 2).save(&path).unwrap();

        let camera = FakeCamera::new();
        let tracks = camera.open_tracks();
        let mut input = controller(camera);
        input.start_camera().await.unwrap();

        let acquired = input.acquire(ImageSource::LocalFile(path), false).await.unwrap();
        assert!(matches!(acquired, Acquisition::Image(_)));
        assert_eq!(tracks.load(Ordering::SeqCst), 0);
        assert_eq!(input.mode(), InputMode::Upload);
    }
}
