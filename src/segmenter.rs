// Segmentation backend seam
// The model collaborator trait plus a built-in region-growing segmenter

use crate::image_loader::ImageBuffer;
use crate::prompt::Point;
use log::debug;
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("No encoded image; call encode_image first")]
    NotEncoded,
    #[error("Encoded image is {encoded_w}x{encoded_h} but masks were requested for {got_w}x{got_h}")]
    EncodingMismatch {
        encoded_w: u32,
        encoded_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

/// The prompt-driven segmentation collaborator.
///
/// `encode_image` must complete for an image before `compute_masks` is
/// called against it. Both calls are synchronous; any parallelism inside the
/// backend is opaque to the session loop.
pub trait Segmenter {
    /// Precompute the per-image state. Returns how long encoding took.
    fn encode_image(&mut self, img: &ImageBuffer, threads: usize)
        -> Result<Duration, SegmentError>;

    /// Compute candidate masks for a point prompt. Returns zero or more
    /// single-channel masks sized like the image, primary mask first.
    fn compute_masks(
        &mut self,
        img: &ImageBuffer,
        threads: usize,
        point: Point,
    ) -> Result<Vec<ImageBuffer>, SegmentError>;
}

/// Luma tolerances for the three candidate regions, tightest first. The
/// tightest region is the primary mask.
const GROW_TOLERANCES: [u8; 3] = [12, 28, 48];

/// Smoothed luma plane cached by `encode_image`.
struct LumaPlane {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Built-in segmentation backend: region growing over a smoothed luma plane.
///
/// Encoding converts the image to luma and box-smooths it once; each prompt
/// then grows a 4-connected region around the clicked luma value at three
/// tolerances. Not a learned model, but it honors the full `Segmenter`
/// contract and keeps the viewer usable without one.
pub struct RegionGrowSegmenter {
    encoded: Option<LumaPlane>,
}

impl RegionGrowSegmenter {
    pub fn new() -> Self {
        Self { encoded: None }
    }
}

impl Default for RegionGrowSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for RegionGrowSegmenter {
    fn encode_image(
        &mut self,
        img: &ImageBuffer,
        threads: usize,
    ) -> Result<Duration, SegmentError> {
        let start = Instant::now();

        let luma = luma_plane(img, threads);
        let smoothed = box_smooth(&luma, img.width as usize, img.height as usize, threads);

        self.encoded = Some(LumaPlane {
            width: img.width,
            height: img.height,
            data: smoothed,
        });

        Ok(start.elapsed())
    }

    fn compute_masks(
        &mut self,
        img: &ImageBuffer,
        _threads: usize,
        point: Point,
    ) -> Result<Vec<ImageBuffer>, SegmentError> {
        let plane = self.encoded.as_ref().ok_or(SegmentError::NotEncoded)?;
        if plane.width != img.width || plane.height != img.height {
            return Err(SegmentError::EncodingMismatch {
                encoded_w: plane.width,
                encoded_h: plane.height,
                got_w: img.width,
                got_h: img.height,
            });
        }

        let start = Instant::now();
        let width = plane.width as usize;
        let height = plane.height as usize;

        // Prompt coordinates can land on the last row/column boundary or the
        // UI margin; clamp instead of failing.
        let seed_x = (point.x.max(0.0) as usize).min(width - 1);
        let seed_y = (point.y.max(0.0) as usize).min(height - 1);
        let seed_value = plane.data[seed_y * width + seed_x];

        let mut masks: Vec<ImageBuffer> = Vec::with_capacity(GROW_TOLERANCES.len());
        let mut last_count = 0usize;
        for tolerance in GROW_TOLERANCES {
            let (mask, count) =
                grow_region(&plane.data, width, height, seed_x, seed_y, seed_value, tolerance);
            // A looser tolerance that grew nothing new is a duplicate.
            if count == last_count {
                continue;
            }
            last_count = count;
            masks.push(ImageBuffer::mask(plane.width, plane.height, mask));
        }

        debug!(
            "Computed {} masks for ({:.1}, {:.1}) in {} ms",
            masks.len(),
            point.x,
            point.y,
            start.elapsed().as_millis()
        );

        Ok(masks)
    }
}

/// Convert RGB pixels to a luma plane, split across row bands.
fn luma_plane(img: &ImageBuffer, threads: usize) -> Vec<u8> {
    let width = img.width as usize;
    let height = img.height as usize;
    let mut luma = vec![0u8; width * height];

    let band_rows = height.div_ceil(threads.max(1)).max(1);
    let pixels = &img.pixels;

    thread::scope(|s| {
        for (band, out) in luma.chunks_mut(band_rows * width).enumerate() {
            let offset = band * band_rows * width;
            s.spawn(move || {
                for (i, value) in out.iter_mut().enumerate() {
                    let base = (offset + i) * 3;
                    let r = pixels[base] as u32;
                    let g = pixels[base + 1] as u32;
                    let b = pixels[base + 2] as u32;
                    *value = ((r * 299 + g * 587 + b * 114) / 1000) as u8;
                }
            });
        }
    });

    luma
}

/// 3x3 box smoothing with edge clamping, split across row bands.
fn box_smooth(src: &[u8], width: usize, height: usize, threads: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    let band_rows = height.div_ceil(threads.max(1)).max(1);

    thread::scope(|s| {
        for (band, rows) in out.chunks_mut(band_rows * width).enumerate() {
            let row_offset = band * band_rows;
            s.spawn(move || {
                for (i, value) in rows.iter_mut().enumerate() {
                    let x = i % width;
                    let y = row_offset + i / width;

                    let x0 = x.saturating_sub(1);
                    let x1 = (x + 1).min(width - 1);
                    let y0 = y.saturating_sub(1);
                    let y1 = (y + 1).min(height - 1);

                    let mut sum = 0u32;
                    let mut count = 0u32;
                    for sy in y0..=y1 {
                        for sx in x0..=x1 {
                            sum += src[sy * width + sx] as u32;
                            count += 1;
                        }
                    }
                    *value = (sum / count) as u8;
                }
            });
        }
    });

    out
}

/// BFS region growth from the seed over 4-connected neighbors whose luma is
/// within `tolerance` of the seed value. Returns the 0/255 mask and the
/// number of pixels it covers.
fn grow_region(
    plane: &[u8],
    width: usize,
    height: usize,
    seed_x: usize,
    seed_y: usize,
    seed_value: u8,
    tolerance: u8,
) -> (Vec<u8>, usize) {
    let mut mask = vec![0u8; width * height];
    let mut queue = VecDeque::new();
    let mut count = 0usize;

    let within = |value: u8| (value as i16 - seed_value as i16).unsigned_abs() <= tolerance as u16;

    let seed_index = seed_y * width + seed_x;
    if within(plane[seed_index]) {
        mask[seed_index] = 255;
        count += 1;
        queue.push_back((seed_x, seed_y));
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx >= width || ny >= height {
                continue;
            }
            let index = ny * width + nx;
            if mask[index] == 0 && within(plane[index]) {
                mask[index] = 255;
                count += 1;
                queue.push_back((nx, ny));
            }
        }
    }

    (mask, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_columns(width: u32, height: u32, column_value: impl Fn(u32) -> u8) -> ImageBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _y in 0..height {
            for x in 0..width {
                let v = column_value(x);
                pixels.extend_from_slice(&[v, v, v]);
            }
        }
        ImageBuffer::rgb(width, height, pixels)
    }

    fn coverage(mask: &ImageBuffer) -> usize {
        mask.pixels.iter().filter(|&&v| v == 255).count()
    }

    #[test]
    fn compute_before_encode_fails() {
        let mut seg = RegionGrowSegmenter::new();
        let img = solid_columns(4, 4, |_| 100);
        let err = seg
            .compute_masks(&img, 1, Point { x: 0.0, y: 0.0 })
            .unwrap_err();
        assert!(matches!(err, SegmentError::NotEncoded));
    }

    #[test]
    fn stale_encoding_is_rejected() {
        let mut seg = RegionGrowSegmenter::new();
        let img = solid_columns(4, 4, |_| 100);
        seg.encode_image(&img, 1).unwrap();

        let other = solid_columns(8, 8, |_| 100);
        let err = seg
            .compute_masks(&other, 1, Point { x: 0.0, y: 0.0 })
            .unwrap_err();
        assert!(matches!(err, SegmentError::EncodingMismatch { .. }));
    }

    #[test]
    fn uniform_image_collapses_to_one_mask() {
        let mut seg = RegionGrowSegmenter::new();
        let img = solid_columns(8, 8, |_| 100);
        seg.encode_image(&img, 1).unwrap();

        let masks = seg
            .compute_masks(&img, 1, Point { x: 3.0, y: 3.0 })
            .unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(coverage(&masks[0]), 64);
    }

    #[test]
    fn ramp_image_yields_nested_regions_primary_first() {
        // Columns ramp by 10 per step, so each tolerance tier reaches
        // further right than the last.
        let mut seg = RegionGrowSegmenter::new();
        let img = solid_columns(16, 8, |x| (x * 10).min(255) as u8);
        seg.encode_image(&img, 1).unwrap();

        let masks = seg
            .compute_masks(&img, 1, Point { x: 0.0, y: 4.0 })
            .unwrap();
        assert_eq!(masks.len(), 3);

        let sizes: Vec<usize> = masks.iter().map(coverage).collect();
        assert!(sizes[0] < sizes[1] && sizes[1] < sizes[2]);

        for mask in &masks {
            assert_eq!(mask.channels, 1);
            assert_eq!((mask.width, mask.height), (img.width, img.height));
            // Every mask contains the seed pixel.
            assert_eq!(mask.pixels[4 * 16], 255);
        }
    }

    #[test]
    fn prompt_outside_the_image_is_clamped() {
        let mut seg = RegionGrowSegmenter::new();
        let img = solid_columns(8, 8, |_| 50);
        seg.encode_image(&img, 1).unwrap();

        let masks = seg
            .compute_masks(&img, 1, Point { x: 500.0, y: -3.0 })
            .unwrap();
        assert_eq!(masks.len(), 1);
        assert_eq!(coverage(&masks[0]), 64);
    }

    #[test]
    fn banded_encode_matches_single_threaded() {
        let img = solid_columns(33, 17, |x| (x * 7 % 251) as u8);

        let mut single = RegionGrowSegmenter::new();
        single.encode_image(&img, 1).unwrap();
        let mut banded = RegionGrowSegmenter::new();
        banded.encode_image(&img, 4).unwrap();

        let point = Point { x: 10.0, y: 10.0 };
        let a = single.compute_masks(&img, 1, point).unwrap();
        let b = banded.compute_masks(&img, 4, point).unwrap();
        assert_eq!(a, b);
    }
}
