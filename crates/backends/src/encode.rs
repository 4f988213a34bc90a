//! Image encoding for inline data URLs

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};
use lookout_core::AnalysisError;
use std::io::Cursor;
use std::path::Path;

/// A base64 payload and the MIME type it was encoded as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub base64: String,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Encode the file as-is
pub async fn encode_file(path: &Path) -> Result<EncodedImage, AnalysisError> {
    let bytes = tokio::fs::read(path).await?;
    let format = detect_format(path, &bytes)?;
    Ok(EncodedImage {
        mime_type: format.to_mime_type(),
        base64: general_purpose::STANDARD.encode(&bytes),
    })
}

/// Downscale to fit `max_edge` x `max_edge` and re-encode in the original format
///
/// Alpha and palette images are flattened to RGB first. Decoding runs on the
/// blocking pool.
pub async fn encode_thumbnail(path: &Path, max_edge: u32) -> Result<EncodedImage, AnalysisError> {
    let bytes = tokio::fs::read(path).await?;
    let format = detect_format(path, &bytes)?;

    let buffer = tokio::task::spawn_blocking(move || thumbnail_bytes(&bytes, format, max_edge))
        .await
        .map_err(|e| AnalysisError::local_io(format!("thumbnail task failed: {}", e)))??;

    Ok(EncodedImage {
        mime_type: format.to_mime_type(),
        base64: general_purpose::STANDARD.encode(&buffer),
    })
}

fn detect_format(path: &Path, bytes: &[u8]) -> Result<ImageFormat, AnalysisError> {
    image::guess_format(bytes)
        .or_else(|_| ImageFormat::from_path(path))
        .map_err(|e| AnalysisError::local_io(format!("unrecognised image {}: {}", path.display(), e)))
}

fn thumbnail_bytes(bytes: &[u8], format: ImageFormat, max_edge: u32) -> Result<Vec<u8>, AnalysisError> {
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| AnalysisError::local_io(format!("failed to decode image: {}", e)))?;

    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    let thumb = if img.width() > max_edge || img.height() > max_edge {
        img.thumbnail(max_edge, max_edge)
    } else {
        img
    };

    let mut buffer = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| AnalysisError::local_io(format!("failed to encode thumbnail: {}", e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 128]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    fn decode(encoded: &EncodedImage) -> DynamicImage {
        let bytes = general_purpose::STANDARD.decode(&encoded.base64).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_encode_file_keeps_original_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(temp_dir.path(), "cat.png", 64, 32);

        let encoded = encode_file(&path).await.unwrap();
        let original = std::fs::read(&path).unwrap();

        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!(general_purpose::STANDARD.decode(&encoded.base64).unwrap(), original);
        assert!(encoded.data_url().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_thumbnail_fits_bounds_and_drops_alpha() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(temp_dir.path(), "wide.PNG", 200, 100);

        let encoded = encode_thumbnail(&path, 40).await.unwrap();
        let thumb = decode(&encoded);

        assert_eq!(encoded.mime_type, "image/png");
        assert_eq!(thumb.dimensions(), (40, 20));
        assert!(!thumb.color().has_alpha());
    }

    #[tokio::test]
    async fn test_small_images_are_not_upscaled() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_png(temp_dir.path(), "tiny.png", 10, 8);

        let thumb = decode(&encode_thumbnail(&path, 40).await.unwrap());
        assert_eq!(thumb.dimensions(), (10, 8));
    }

    #[tokio::test]
    async fn test_missing_file_is_local_io() {
        let err = encode_file(Path::new("/nonexistent/lookout/cat.jpg")).await.unwrap_err();
        assert_eq!(err.kind(), lookout_core::ErrorKind::LocalIo);
    }

    #[tokio::test]
    async fn test_garbage_is_local_io() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = encode_thumbnail(&path, 40).await.unwrap_err();
        assert_eq!(err.kind(), lookout_core::ErrorKind::LocalIo);
    }
}
