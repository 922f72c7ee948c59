//! Raster re-encoding to the canonical PNG format

use std::io::Cursor;

use image::ImageFormat;
use tracing::debug;

use crate::error::{Error, Result};

/// MIME type of every image block Mailroom emits
pub const CANONICAL_IMAGE_MIME: &str = "image/png";

/// Decode any supported raster format and re-encode it as PNG
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let source_format = image::guess_format(bytes).ok();
    let img = image::load_from_memory(bytes).map_err(|e| Error::conversion("image", e))?;

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| Error::conversion("image", e))?;

    debug!(
        "Re-encoded {:?} image {}x{} to PNG ({} -> {} bytes)",
        source_format,
        img.width(),
        img.height(),
        bytes.len(),
        out.get_ref().len()
    );
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Encode a small gradient in the requested format
    pub(crate) fn sample_image(format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(6, 4, |x, y| Rgb([(x * 40) as u8, (y * 60) as u8, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_every_source_format_becomes_png() {
        for format in [
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::WebP,
            ImageFormat::Gif,
            ImageFormat::Bmp,
        ] {
            let png = to_png(&sample_image(format)).unwrap();
            assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png, "{format:?}");
            let decoded = image::load_from_memory(&png).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (6, 4));
        }
    }

    #[test]
    fn test_garbage_is_a_conversion_error() {
        let err = to_png(b"definitely not pixels").unwrap_err();
        assert!(matches!(err, Error::Conversion { format: "image", .. }));
    }
}
