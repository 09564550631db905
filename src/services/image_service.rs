use crate::error::AppError;
use crate::models::image_types::ImageHandle;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

const SNAPSHOT_QUALITY: u8 = 92;

/// MIME type for a file, derived from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Fully decode the handle's bytes, honoring EXIF orientation.
pub fn decode_handle(handle: &ImageHandle) -> Result<DynamicImage, AppError> {
    let start = Instant::now();
    let bytes = handle.bytes();

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::acquisition(format!("Failed to read image: {}", e)))?
        .decode()
        .map_err(|e| AppError::acquisition(format!("Failed to decode image: {}", e)))?;

    let orientation = read_orientation(bytes);
    let img = if orientation != 1 {
        apply_orientation(img, orientation)
    } else {
        img
    };

    log::debug!(
        "Decoded image #{} ({}x{}, orientation {}) in {:.1}ms",
        handle.id(),
        img.width(),
        img.height(),
        orientation,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(img)
}

/// Decode on the blocking pool; resolves only once the whole image is decoded.
pub async fn decode_handle_async(handle: ImageHandle) -> Result<DynamicImage, AppError> {
    tokio::task::spawn_blocking(move || decode_handle(&handle))
        .await
        .map_err(|e| AppError::acquisition(format!("Decode task failed: {}", e)))?
}

/// Encode a frame as a JPEG still.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, SNAPSHOT_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| AppError::acquisition(format!("Failed to encode snapshot: {}", e)))?;
    Ok(buffer.into_inner())
}

/// EXIF orientation of an encoded image, 1 when absent.
fn read_orientation(bytes: &[u8]) -> u32 {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    match exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        Some(field) => match field.value {
            exif::Value::Short(ref v) => *v.first().unwrap_or(&1) as u32,
            exif::Value::Long(ref v) => *v.first().unwrap_or(&1),
            _ => 1,
        },
        None => 1,
    }
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.fliph().rotate90(),
        6 => img.rotate90(),
        7 => img.fliph().rotate270(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image_types::ImageOrigin;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("bottle.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("glove.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "application/octet-stream");
        assert!(is_image_mime("image/webp"));
        assert!(!is_image_mime("text/plain"));
    }

    #[test]
    fn test_jpeg_round_trip_keeps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([10, 200, 30])));
        let bytes = encode_jpeg(&img).unwrap();
        let handle = ImageHandle::new(bytes, "image/jpeg", ImageOrigin::LiveCamera);

        let decoded = decode_handle(&handle).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let handle = ImageHandle::new(vec![0, 1, 2, 3], "image/png", ImageOrigin::LiveCamera);
        let err = decode_handle(&handle).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Acquisition);
    }

    #[test]
    fn test_orientation_six_rotates_quarter_turn() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 2));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
    }
}
