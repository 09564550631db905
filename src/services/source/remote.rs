use crate::error::AppError;
use crate::models::image_types::{ImageHandle, ImageOrigin};
use reqwest::Url;
use std::time::Duration;

/// Network camera answering `GET {base}/capture` with a still image.
#[derive(Debug, Clone)]
pub struct RemoteCamera {
    capture_url: Url,
    client: reqwest::Client,
}

impl RemoteCamera {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let capture_url = format!("{}/capture", base_url.trim().trim_end_matches('/'));
        let capture_url = Url::parse(&capture_url).map_err(|e| {
            AppError::config(format!("Invalid remote camera URL {}: {}", base_url, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            capture_url,
            client,
        })
    }

    pub fn capture_url(&self) -> &Url {
        &self.capture_url
    }

    pub async fn capture(&self) -> Result<ImageHandle, AppError> {
        log::info!("Requesting capture from {}", self.capture_url);

        let response = self
            .client
            .get(self.capture_url.clone())
            .send()
            .await
            .map_err(|e| AppError::remote(format!("Camera unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::remote(format!(
                "Camera at {} answered HTTP {}",
                self.capture_url, status
            )));
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::remote(format!("Failed to read capture body: {}", e)))?;

        if bytes.is_empty() {
            return Err(AppError::remote("Camera returned an empty image"));
        }

        let mime = header_mime.unwrap_or_else(|| {
            image::guess_format(&bytes)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "image/jpeg".to_string())
        });

        Ok(ImageHandle::new(
            bytes.to_vec(),
            mime,
            ImageOrigin::RemoteCamera {
                url: self.capture_url.to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_url_joins_base() {
        let camera = RemoteCamera::new("http://192.168.1.50:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(camera.capture_url().as_str(), "http://192.168.1.50:5000/capture");

        let camera = RemoteCamera::new("http://pi.local/cam", Duration::from_secs(1)).unwrap();
        assert_eq!(camera.capture_url().as_str(), "http://pi.local/cam/capture");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RemoteCamera::new("not a url", Duration::from_secs(1)).err().unwrap();
        assert_eq!(err.kind, crate::error::ErrorKind::Config);
    }
}
