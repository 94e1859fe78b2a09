// Mask overlay module
// Turns raw single-channel masks into a color-coded overlay draw plan

use crate::image_loader::ImageBuffer;

/// Most masks ever rendered simultaneously in multi-mask mode
pub const MAX_RENDERED_MASKS: usize = 3;

/// Overlay alpha in single-mask mode (~50%)
pub const SINGLE_MASK_ALPHA: u8 = 128;

/// Overlay alpha per mask in multi-mask mode (~67%)
pub const MULTI_MASK_ALPHA: u8 = 172;

/// Tint color for the single-mask overlay (pure blue)
pub const SINGLE_MASK_TINT: [u8; 3] = [0, 0, 255];

/// A tint applied to a mask texture at draw time via color modulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tint {
    pub rgb: [u8; 3],
    pub alpha: u8,
}

/// One overlay draw: which mask texture to draw and with what tint.
/// The plan preserves mask order; later entries draw on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayDraw {
    pub mask_index: usize,
    pub tint: Tint,
}

/// Replicate a single-channel mask into all three color channels so tinting
/// via color modulation works uniformly on an RGB texture.
pub fn broadcast_to_rgb(mask: &ImageBuffer) -> ImageBuffer {
    debug_assert_eq!(mask.channels, 1, "broadcast expects a raw mask");

    let mut pixels = Vec::with_capacity(mask.pixels.len() * 3);
    for &value in &mask.pixels {
        pixels.extend_from_slice(&[value, value, value]);
    }

    ImageBuffer::rgb(mask.width, mask.height, pixels)
}

/// Build the overlay draw plan for the current mask set.
///
/// Single-mask mode renders only the primary mask, tinted blue at ~50%
/// alpha. Multi-mask mode renders up to [`MAX_RENDERED_MASKS`] masks tinted
/// red, green and blue in mask order at ~67% alpha; masks beyond that are
/// not rendered.
pub fn build_overlays(masks: &[ImageBuffer], show_all: bool) -> Vec<OverlayDraw> {
    if show_all {
        masks
            .iter()
            .take(MAX_RENDERED_MASKS)
            .enumerate()
            .map(|(i, _)| OverlayDraw {
                mask_index: i,
                tint: Tint {
                    rgb: [
                        if i == 0 { 255 } else { 0 },
                        if i == 1 { 255 } else { 0 },
                        if i == 2 { 255 } else { 0 },
                    ],
                    alpha: MULTI_MASK_ALPHA,
                },
            })
            .collect()
    } else {
        masks
            .first()
            .map(|_| OverlayDraw {
                mask_index: 0,
                tint: Tint {
                    rgb: SINGLE_MASK_TINT,
                    alpha: SINGLE_MASK_ALPHA,
                },
            })
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masks(count: usize) -> Vec<ImageBuffer> {
        (0..count)
            .map(|i| ImageBuffer::mask(2, 2, vec![i as u8; 4]))
            .collect()
    }

    #[test]
    fn overlay_count_matches_policy() {
        for count in 0..6 {
            let set = masks(count);
            assert_eq!(build_overlays(&set, false).len(), count.min(1));
            assert_eq!(
                build_overlays(&set, true).len(),
                count.min(MAX_RENDERED_MASKS)
            );
        }
    }

    #[test]
    fn single_mask_mode_is_blue_at_half_alpha() {
        let plan = build_overlays(&masks(3), false);
        assert_eq!(
            plan,
            vec![OverlayDraw {
                mask_index: 0,
                tint: Tint {
                    rgb: [0, 0, 255],
                    alpha: SINGLE_MASK_ALPHA
                },
            }]
        );
    }

    #[test]
    fn multi_mask_mode_is_rgb_in_order() {
        let plan = build_overlays(&masks(3), true);
        let tints: Vec<[u8; 3]> = plan.iter().map(|o| o.tint.rgb).collect();
        assert_eq!(tints, vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        assert!(plan.iter().all(|o| o.tint.alpha == MULTI_MASK_ALPHA));
        let indices: Vec<usize> = plan.iter().map(|o| o.mask_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn masks_beyond_three_are_not_rendered() {
        let plan = build_overlays(&masks(5), true);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|o| o.mask_index < 3));
    }

    #[test]
    fn broadcast_replicates_gray_values() {
        let mask = ImageBuffer::mask(2, 1, vec![7, 200]);
        let rgb = broadcast_to_rgb(&mask);
        assert_eq!(rgb.channels, 3);
        assert_eq!(rgb.pixels, vec![7, 7, 7, 200, 200, 200]);
    }
}
