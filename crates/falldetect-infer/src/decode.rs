//! Image format sniffing and decoding.

use image::{DynamicImage, ImageFormat};

use falldetect_core::{Error, Result};

/// Identify the encoding from magic bytes. Rejects empty payloads and
/// formats this build cannot decode.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat> {
    if bytes.is_empty() {
        return Err(Error::InvalidInput("empty payload".to_string()));
    }
    let format = image::guess_format(bytes)
        .map_err(|_| Error::InvalidInput("payload is not a recognized image".to_string()))?;
    if !format.reading_enabled() {
        return Err(Error::InvalidInput(format!(
            "unsupported image format: {:?}",
            format
        )));
    }
    Ok(format)
}

/// Decode to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let format = sniff_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::InvalidInput(format!("image decode failed: {}", e)))?;
    Ok(DynamicImage::ImageRgb8(image.into_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::new_rgba8(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_sniff_png() {
        assert_eq!(sniff_format(&png_bytes(4, 3)).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_rejects_non_images() {
        assert_eq!(sniff_format(b"").unwrap_err().kind(), "invalid_input");
        assert_eq!(
            sniff_format(b"definitely not an image").unwrap_err().kind(),
            "invalid_input"
        );
    }

    #[test]
    fn test_decode_converts_to_rgb() {
        let image = decode_image(&png_bytes(7, 5)).unwrap();
        assert_eq!((image.width(), image.height()), (7, 5));
        assert!(matches!(image, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_truncated_payload_is_invalid_input() {
        let bytes = png_bytes(16, 16);
        let err = decode_image(&bytes[..20]).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
