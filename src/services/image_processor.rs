// src/services/image_processor.rs
use crate::errors::ScanError;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};

/// Receipts arrive straight from phone cameras in assorted formats and
/// sizes; both providers are sent an inline `image/jpeg` payload.
pub struct ImageProcessor;

const MAX_DIMENSION: u32 = 2048;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decode, downscale long edges past 2048px, and re-encode as JPEG.
    pub fn prepare_jpeg(&self, data: &[u8]) -> Result<Vec<u8>, ScanError> {
        if data.is_empty() {
            return Err(ScanError::Validation("empty upload".to_string()));
        }

        let img = image::load_from_memory(data)
            .map_err(|e| ScanError::ImageProcessing(format!("invalid image format: {e}")))?;

        let (width, height) = img.dimensions();
        let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
            img.resize(
                MAX_DIMENSION,
                MAX_DIMENSION,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            img
        };

        // JPEG has no alpha channel; screenshots and PNGs often do.
        let img = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Jpeg)
            .map_err(|e| ScanError::ImageProcessing(format!("jpeg encode failed: {e}")))?;

        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_upload_is_rejected() {
        let err = ImageProcessor::new().prepare_jpeg(&[]).unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = ImageProcessor::new().prepare_jpeg(b"not an image").unwrap_err();
        assert!(matches!(err, ScanError::ImageProcessing(_)));
    }

    #[test]
    fn png_with_alpha_is_reencoded_as_jpeg() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([200, 200, 200, 255]),
        ));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), ImgFormat::Png)
            .unwrap();

        let jpeg = ImageProcessor::new().prepare_jpeg(&png).unwrap();
        assert_eq!(
            image::guess_format(&jpeg).unwrap(),
            ImgFormat::Jpeg
        );
    }

    #[test]
    fn oversized_image_is_downscaled() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4000, 1000));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), ImgFormat::Png)
            .unwrap();

        let jpeg = ImageProcessor::new().prepare_jpeg(&png).unwrap();
        let reloaded = image::load_from_memory(&jpeg).unwrap();
        assert!(reloaded.dimensions().0 <= MAX_DIMENSION);
        assert!(reloaded.dimensions().1 <= MAX_DIMENSION);
    }
}
