use super::interface::{CameraDevice, CameraStream, FacingMode};
use super::mjpeg::MjpegSplitter;
use crate::config::CameraConfig;
use crate::error::AppError;
use image::DynamicImage;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Latest complete JPEG frame, shared with the reader thread.
#[derive(Default)]
struct FrameSlot {
    frame: Mutex<Option<Vec<u8>>>,
    ready: Condvar,
}

impl FrameSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Vec<u8>>> {
        self.frame.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Live camera backed by an external capture program writing MJPEG to stdout
/// (ffmpeg reading v4l2 by default).
pub struct CommandCamera {
    config: CameraConfig,
}

impl CommandCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    fn device_for(&self, facing: FacingMode) -> &str {
        match facing {
            FacingMode::Environment => &self.config.environment_device,
            FacingMode::User => &self.config.user_device,
        }
    }

    fn command_args(&self, facing: FacingMode) -> Vec<String> {
        let device = self.device_for(facing);
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{device}", device))
            .collect()
    }
}

impl CameraDevice for CommandCamera {
    fn open(&self, facing: FacingMode) -> Result<Box<dyn CameraStream>, AppError> {
        let args = self.command_args(facing);
        log::info!(
            "Opening {:?} camera: {} {}",
            facing,
            self.config.program,
            args.join(" ")
        );

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                AppError::camera(format!(
                    "Unable to access camera ({}): {}",
                    self.config.program, e
                ))
            })?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::camera("Unable to access camera: no video output"));
        };

        let slot = Arc::new(FrameSlot::default());
        let reader_slot = slot.clone();
        let reader = std::thread::spawn(move || {
            let mut splitter = MjpegSplitter::new();
            let mut chunk = vec![0u8; 64 * 1024];
            loop {
                let n = match stdout.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        log::debug!("Camera stream read error: {}", e);
                        break;
                    }
                };
                if let Some(frame) = splitter.push(&chunk[..n]).pop() {
                    *reader_slot.lock() = Some(frame);
                    reader_slot.ready.notify_all();
                }
            }
            log::debug!("Camera reader finished");
            // Wake anyone still waiting for a first frame.
            reader_slot.ready.notify_all();
        });

        let mut stream = CommandStream {
            child: Some(child),
            reader: Some(reader),
            slot,
        };

        if !stream.wait_first_frame(Duration::from_millis(self.config.warmup_ms)) {
            stream.stop();
            return Err(AppError::camera(format!(
                "Unable to access camera: no frames from {} within {} ms",
                self.device_for(facing),
                self.config.warmup_ms
            )));
        }

        log::info!("Camera stream started");
        Ok(Box::new(stream))
    }
}

struct CommandStream {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    slot: Arc<FrameSlot>,
}

impl CommandStream {
    fn wait_first_frame(&mut self, warmup: Duration) -> bool {
        let deadline = std::time::Instant::now() + warmup;
        let mut guard = self.slot.lock();
        while guard.is_none() {
            if self.reader.as_ref().is_some_and(|r| r.is_finished()) {
                return false;
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            // Short waits so an exited reader is noticed quickly.
            let step = (deadline - now).min(Duration::from_millis(100));
            guard = self
                .slot
                .ready
                .wait_timeout(guard, step)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        true
    }
}

impl CameraStream for CommandStream {
    fn snapshot(&mut self) -> Result<DynamicImage, AppError> {
        if self.child.is_none() {
            return Err(AppError::camera("Camera is not running"));
        }
        let frame = self
            .slot
            .lock()
            .clone()
            .ok_or_else(|| AppError::camera("No frame available yet"))?;
        image::load_from_memory(&frame)
            .map_err(|e| AppError::camera(format!("Failed to decode camera frame: {}", e)))
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.child.is_some())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("Camera process already exited: {}", e);
            }
            let _ = child.wait();
            log::info!("Camera stream stopped");
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

impl Drop for CommandStream {
    fn drop(&mut self) {
        self.stop();
    }
}
