// Display fitting module
// Nearest-neighbor downscaling and scale-to-fit for the display surface

use crate::image_loader::ImageBuffer;
use log::info;

/// Margin kept between the fitted image and the screen edges
pub const DISPLAY_MARGIN: f32 = 0.05;

/// Downscale an image with nearest-neighbor sampling. `factor` must be
/// greater than 1.0; this never upscales.
///
/// Output dimensions round half-up (`floor(dim / factor + 0.5)`, at least 1).
/// Each output pixel samples `floor((coord + 0.5) * factor - 0.5)` in the
/// source, clamped into bounds: the unclamped form can land one past the
/// final row or column for some size/factor pairs.
pub fn downscale(img: &ImageBuffer, factor: f32) -> ImageBuffer {
    debug_assert!(factor > 1.0, "downscale factor must be > 1.0");

    let width = img.width as usize;
    let height = img.height as usize;
    let channels = img.channels as usize;

    let new_width = ((img.width as f32 / factor + 0.5) as u32).max(1) as usize;
    let new_height = ((img.height as f32 / factor + 0.5) as u32).max(1) as usize;

    info!(
        "Resizing image from {}x{} to {}x{} (factor {:.3})",
        img.width, img.height, new_width, new_height, factor
    );

    // Source column per output column, computed once per image.
    let src_cols: Vec<usize> = (0..new_width)
        .map(|x| source_index(x, factor, width))
        .collect();

    let mut pixels = vec![0u8; new_width * new_height * channels];
    for y in 0..new_height {
        let src_y = source_index(y, factor, height);
        let src_row = src_y * width * channels;
        let dst_row = y * new_width * channels;

        for (x, &src_x) in src_cols.iter().enumerate() {
            let src_index = src_row + src_x * channels;
            let dst_index = dst_row + x * channels;
            pixels[dst_index..dst_index + channels]
                .copy_from_slice(&img.pixels[src_index..src_index + channels]);
        }
    }

    ImageBuffer {
        width: new_width as u32,
        height: new_height as u32,
        channels: img.channels,
        pixels,
    }
}

/// Nearest-neighbor source coordinate for an output coordinate, clamped into
/// `[0, dim)`.
fn source_index(out: usize, factor: f32, dim: usize) -> usize {
    let src = ((out as f32 + 0.5) * factor - 0.5).floor();
    (src.max(0.0) as usize).min(dim - 1)
}

/// Fit an image within the given screen bounds, keeping a margin between the
/// image and the screen edges. Returns the image unchanged when it already
/// fits; upscaling is never performed, so fitting is idempotent.
pub fn fit_to_display(img: ImageBuffer, screen_w: u32, screen_h: u32, margin: f32) -> ImageBuffer {
    let max_width = (screen_w as f32 * (1.0 - margin)) as u32;
    let max_height = (screen_h as f32 * (1.0 - margin)) as u32;

    if img.height <= max_height && img.width <= max_width {
        return img;
    }

    info!(
        "Image size {}x{} exceeds maximum allowed size {}x{}",
        img.width, img.height, max_width, max_height
    );

    let scale_x = img.width as f32 / max_width as f32;
    let scale_y = img.height as f32 / max_height as f32;
    let factor = scale_x.max(scale_y);

    downscale(&img, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgb(width: u32, height: u32) -> ImageBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(x as u8);
                pixels.push(y as u8);
                pixels.push((x ^ y) as u8);
            }
        }
        ImageBuffer::rgb(width, height, pixels)
    }

    #[test]
    fn source_indices_stay_in_bounds() {
        for dim in [1usize, 2, 3, 5, 17, 33, 640, 1368, 4000] {
            for factor in [1.01f32, 1.3, 1.5, 2.0, 2.5, 2.924, 3.7, 10.0] {
                let out_dim = (((dim as f32 / factor + 0.5) as u32).max(1)) as usize;
                for out in 0..out_dim {
                    let src = source_index(out, factor, dim);
                    assert!(src < dim, "dim={dim} factor={factor} out={out} src={src}");
                }
            }
        }
    }

    #[test]
    fn output_dimensions_round_half_up() {
        let img = gradient_rgb(10, 7);
        let out = downscale(&img, 3.0);
        assert_eq!((out.width, out.height), (3, 2));
        assert_eq!(out.pixels.len(), 3 * 2 * 3);
    }

    #[test]
    fn downscale_by_two_picks_expected_pixels() {
        let img = gradient_rgb(4, 4);
        let out = downscale(&img, 2.0);
        assert_eq!((out.width, out.height), (2, 2));
        // Output (1, 0) samples source (2, 0): floor(1.5 * 2 - 0.5) = 2.
        assert_eq!(out.pixels[3], 2);
        assert_eq!(out.pixels[4], 0);
    }

    #[test]
    fn extreme_factor_never_produces_empty_raster() {
        let img = gradient_rgb(2, 2);
        let out = downscale(&img, 10.0);
        assert_eq!((out.width, out.height), (1, 1));
    }

    #[test]
    fn fit_leaves_small_images_untouched() {
        let img = gradient_rgb(100, 80);
        let fitted = fit_to_display(img.clone(), 1920, 1080, DISPLAY_MARGIN);
        assert_eq!(fitted, img);
    }

    #[test]
    fn fit_never_upscales() {
        let img = gradient_rgb(60, 40);
        let fitted = fit_to_display(img, 10_000, 10_000, DISPLAY_MARGIN);
        assert_eq!((fitted.width, fitted.height), (60, 40));
    }

    #[test]
    fn fit_is_idempotent() {
        let img = gradient_rgb(250, 190);
        let once = fit_to_display(img, 200, 200, DISPLAY_MARGIN);
        let twice = fit_to_display(once.clone(), 200, 200, DISPLAY_MARGIN);
        assert_eq!(once, twice);
    }

    #[test]
    fn fit_4000x3000_onto_1080p_screen() {
        // max = 1824x1026, factor = max(4000/1824, 3000/1026) = 2.924
        let img = gradient_rgb(4000, 3000);
        let fitted = fit_to_display(img, 1920, 1080, DISPLAY_MARGIN);
        assert_eq!((fitted.width, fitted.height), (1368, 1026));
        assert!(fitted.width <= 1824 && fitted.height <= 1026);
    }

    #[test]
    fn masks_downscale_single_channel() {
        let mask = ImageBuffer::mask(6, 6, (0..36).map(|v| v as u8).collect());
        let out = downscale(&mask, 2.0);
        assert_eq!(out.channels, 1);
        assert_eq!(out.pixels.len(), 9);
    }
}
