use base64::Engine;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageOrigin {
    LocalFile { path: PathBuf },
    LiveCamera,
    RemoteCamera { url: String },
}

/// Encoded image bytes held in memory for display and inference.
///
/// Clones share the same buffer.
#[derive(Debug, Serialize, Clone)]
pub struct ImageHandle {
    id: u64,
    mime: String,
    origin: ImageOrigin,
    size: usize,
    #[serde(skip)]
    bytes: Arc<[u8]>,
}

impl ImageHandle {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, origin: ImageOrigin) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            mime: mime.into(),
            origin,
            size: bytes.len(),
            bytes,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn origin(&self) -> &ImageOrigin {
        &self.origin
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Displayable `data:` URL of the image.
    pub fn to_data_url(&self) -> String {
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime, b64)
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_get_distinct_ids() {
        let a = ImageHandle::new(vec![1, 2, 3], "image/png", ImageOrigin::LiveCamera);
        let b = ImageHandle::new(vec![1, 2, 3], "image/png", ImageOrigin::LiveCamera);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_data_url() {
        let handle = ImageHandle::new(b"abc".to_vec(), "image/jpeg", ImageOrigin::LiveCamera);
        assert_eq!(handle.to_data_url(), "data:image/jpeg;base64,YWJj");
        assert_eq!(handle.len(), 3);
    }
}
