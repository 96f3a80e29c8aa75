//! Thumbnail generation

use std::io::Cursor;

use bytes::Bytes;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Invalid thumbnail dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Resizes images into a bounding box
pub trait ThumbnailGenerator: Send + Sync + 'static {
    /// Scale `source` to fit inside `max_width` x `max_height`.
    ///
    /// The aspect ratio is always preserved; the result is never cropped.
    fn resize(&self, source: &[u8], max_width: u32, max_height: u32)
        -> Result<Bytes, ThumbnailError>;
}

/// Thumbnail generator backed by the `image` crate.
///
/// The thumbnail is encoded in the format of the source image.
#[derive(Debug, Clone, Copy)]
pub struct ImageThumbnailer {
    filter: FilterType,
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl ImageThumbnailer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThumbnailGenerator for ImageThumbnailer {
    fn resize(
        &self,
        source: &[u8],
        max_width: u32,
        max_height: u32,
    ) -> Result<Bytes, ThumbnailError> {
        if max_width == 0 || max_height == 0 {
            return Err(ThumbnailError::InvalidDimensions {
                width: max_width,
                height: max_height,
            });
        }

        let format = image::guess_format(source)?;
        let img = image::load_from_memory_with_format(source, format)?;
        let resized = img.resize(max_width, max_height, self.filter);

        let mut out = Cursor::new(Vec::new());
        resized.write_to(&mut out, format)?;

        debug!(
            from = ?(img.width(), img.height()),
            to = ?(resized.width(), resized.height()),
            "Thumbnail generated"
        );

        Ok(Bytes::from(out.into_inner()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    /// Encode a solid image of the given size
    pub(crate) fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 90]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    fn dimensions(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_landscape_fits_width() {
        let source = encoded_image(200, 100, ImageFormat::Png);
        let thumb = ImageThumbnailer::new().resize(&source, 50, 50).unwrap();
        assert_eq!(dimensions(&thumb), (50, 25));
    }

    #[test]
    fn test_portrait_fits_height() {
        let source = encoded_image(90, 300, ImageFormat::Png);
        let thumb = ImageThumbnailer::new().resize(&source, 100, 100).unwrap();
        assert_eq!(dimensions(&thumb), (30, 100));
    }

    #[test]
    fn test_keeps_source_format() {
        let source = encoded_image(64, 64, ImageFormat::Jpeg);
        let thumb = ImageThumbnailer::new().resize(&source, 16, 16).unwrap();
        assert_eq!(image::guess_format(&thumb).unwrap(), ImageFormat::Jpeg);
        assert_eq!(dimensions(&thumb), (16, 16));
    }

    #[test]
    fn test_rejects_non_image() {
        let result = ImageThumbnailer::new().resize(b"%PDF-1.7 not an image", 50, 50);
        assert!(matches!(result, Err(ThumbnailError::Image(_))));
    }

    #[test]
    fn test_rejects_empty_box() {
        let source = encoded_image(10, 10, ImageFormat::Png);
        let result = ImageThumbnailer::new().resize(&source, 0, 50);
        assert!(matches!(
            result,
            Err(ThumbnailError::InvalidDimensions { width: 0, height: 50 })
        ));
    }
}
