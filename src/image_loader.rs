// Image loading module
// Handles decoding image files into raw pixel buffers and saving masks

use anyhow::{Context, Result};
use std::path::Path;

/// Number of channels in a display image
pub const RGB_CHANNELS: u8 = 3;

/// Number of channels in a raw mask
pub const MASK_CHANNELS: u8 = 1;

/// A fixed-size u8 raster, either RGB (display images) or single-channel
/// (raw masks). This is the unit passed between every other component; it is
/// moved, never aliased, on handoff between load, fit and display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Channels per pixel (3 for RGB, 1 for masks)
    pub channels: u8,
    /// Raw pixel data, length = width * height * channels
    pub pixels: Vec<u8>,
}

impl ImageBuffer {
    /// Create an RGB image from raw pixel data.
    ///
    /// Panics if the data length does not match the dimensions; buffers are
    /// only ever built from decoded images or by the resampler, so a mismatch
    /// is a programming error.
    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize * RGB_CHANNELS as usize,
            "RGB buffer length must match {width}x{height}"
        );
        Self {
            width,
            height,
            channels: RGB_CHANNELS,
            pixels,
        }
    }

    /// Create a single-channel mask from raw data.
    pub fn mask(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize,
            "mask buffer length must match {width}x{height}"
        );
        Self {
            width,
            height,
            channels: MASK_CHANNELS,
            pixels,
        }
    }

    /// Zero-filled RGB image.
    pub fn rgb_zeroed(width: u32, height: u32) -> Self {
        Self::rgb(
            width,
            height,
            vec![0u8; width as usize * height as usize * RGB_CHANNELS as usize],
        )
    }
}

/// Decode an image file into an RGB buffer, converting from whatever channel
/// layout the file uses.
pub fn decode_image(path: &Path) -> Result<ImageBuffer> {
    let img =
        image::open(path).with_context(|| format!("Failed to decode image: {}", path.display()))?;

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    Ok(ImageBuffer::rgb(width, height, rgb.into_raw()))
}

/// Save a single-channel mask as a grayscale PNG.
pub fn save_mask(mask: &ImageBuffer, path: &Path) -> Result<()> {
    let img = image::GrayImage::from_raw(mask.width, mask.height, mask.pixels.clone())
        .context("Mask buffer length does not match its dimensions")?;

    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to save mask: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_buffer_length_invariant_holds() {
        let img = ImageBuffer::rgb_zeroed(7, 5);
        assert_eq!(img.pixels.len(), 7 * 5 * 3);
        assert_eq!(img.channels, RGB_CHANNELS);
    }

    #[test]
    fn mask_buffer_is_single_channel() {
        let mask = ImageBuffer::mask(4, 3, vec![0u8; 12]);
        assert_eq!(mask.channels, MASK_CHANNELS);
        assert_eq!(mask.pixels.len(), 12);
    }

    #[test]
    #[should_panic]
    fn mismatched_rgb_length_panics() {
        ImageBuffer::rgb(4, 4, vec![0u8; 10]);
    }

    #[test]
    fn decode_missing_file_fails() {
        assert!(decode_image(Path::new("/nonexistent/segview-test.png")).is_err());
    }

    #[test]
    fn saved_mask_reloads_with_same_pixels() {
        let dir = std::env::temp_dir().join("segview-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mask.png");

        let mask = ImageBuffer::mask(3, 2, vec![0, 64, 128, 192, 255, 7]);
        save_mask(&mask, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(reloaded.dimensions(), (3, 2));
        assert_eq!(reloaded.into_raw(), mask.pixels);
    }
}
