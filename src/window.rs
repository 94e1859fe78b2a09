// Window module
// Software window backend on minifb: input polling and CPU compositing

use crate::backend::{Event, Frame, TextureFormat, TextureId, WindowBackend, WindowError};
use crate::image_loader::ImageBuffer;
use crate::overlay::{broadcast_to_rgb, Tint};
use log::warn;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use std::collections::HashMap;

/// Display size reported when the platform offers no query
const DEFAULT_DISPLAY_BOUNDS: (u32, u32) = (1920, 1080);

/// Radius of the prompt marker dot
const PROMPT_MARKER_RADIUS: i32 = 5;

/// Prompt marker color (0x00RRGGBB)
const PROMPT_MARKER_COLOR: u32 = 0x00FF_0000;

/// Software `WindowBackend` built on minifb.
///
/// Textures live in CPU memory and every frame is composited into a u32
/// buffer before being pushed to the window. minifb has no drag-and-drop
/// support, so this backend never emits `Event::FileDropped`; hover mode,
/// show-all and save are driven from the keyboard (H, M, S), quit from
/// Escape or the window close button.
pub struct MinifbWindow {
    window: Window,
    title: String,
    width: u32,
    height: u32,
    buffer: Vec<u32>,
    textures: HashMap<TextureId, ImageBuffer>,
    next_texture: u64,
    left_was_down: bool,
    last_pointer: Option<(f32, f32)>,
}

impl MinifbWindow {
    /// Display bounds before any window exists, used to fit the initial
    /// image. Same assumption as [`WindowBackend::display_bounds`].
    pub fn display_bounds_hint() -> Option<(u32, u32)> {
        Some(DEFAULT_DISPLAY_BOUNDS)
    }

    /// Open a window sized to the fitted image.
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self, WindowError> {
        let window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .map_err(|e| WindowError::Create(e.to_string()))?;

        Ok(Self {
            window,
            title: title.to_string(),
            width,
            height,
            buffer: vec![0u32; width as usize * height as usize],
            textures: HashMap::new(),
            next_texture: 1,
            left_was_down: false,
            last_pointer: None,
        })
    }
}

impl WindowBackend for MinifbWindow {
    fn display_bounds(&self) -> Option<(u32, u32)> {
        // minifb cannot query the display; assume a common desktop size so
        // oversized images are still fitted.
        Some(DEFAULT_DISPLAY_BOUNDS)
    }

    fn poll_events(&mut self, events: &mut Vec<Event>) {
        events.clear();

        if !self.window.is_open() || self.window.is_key_down(Key::Escape) {
            events.push(Event::CloseRequested);
            return;
        }

        if self.window.is_key_pressed(Key::H, KeyRepeat::No) {
            events.push(Event::ToggleHoverMode);
        }
        if self.window.is_key_pressed(Key::M, KeyRepeat::No) {
            events.push(Event::ToggleShowAll);
        }
        if self.window.is_key_pressed(Key::S, KeyRepeat::No) {
            events.push(Event::SaveRequested);
        }

        if let Some((x, y)) = self.window.get_mouse_pos(MouseMode::Clamp) {
            if self.last_pointer != Some((x, y)) {
                self.last_pointer = Some((x, y));
                events.push(Event::PointerMoved { x, y });
            }

            let left_down = self.window.get_mouse_down(MouseButton::Left);
            if left_down && !self.left_was_down {
                events.push(Event::LeftPressed { x, y });
            }
            self.left_was_down = left_down;
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.window.set_title(title);
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), WindowError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        // minifb windows are fixed-size; recreate the window for the new
        // image dimensions.
        self.window = Window::new(
            &self.title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .map_err(|e| WindowError::Create(e.to_string()))?;

        self.width = width;
        self.height = height;
        self.buffer = vec![0u32; width as usize * height as usize];
        self.left_was_down = false;
        self.last_pointer = None;
        Ok(())
    }

    fn upload_texture(
        &mut self,
        img: &ImageBuffer,
        format: TextureFormat,
    ) -> Result<TextureId, WindowError> {
        let expected_channels = match format {
            TextureFormat::Rgb => 3,
            TextureFormat::Gray => 1,
        };
        if img.channels != expected_channels {
            return Err(WindowError::Upload(format!(
                "texture format {:?} expects {} channels, image has {}",
                format, expected_channels, img.channels
            )));
        }

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, img.clone());
        Ok(id)
    }

    fn release_textures(&mut self, ids: &[TextureId]) {
        for id in ids {
            if self.textures.remove(id).is_none() {
                warn!("Released unknown texture {:?}", id);
            }
        }
    }

    fn present(&mut self, frame: &Frame) -> Result<(), WindowError> {
        let Self {
            window,
            buffer,
            textures,
            width,
            height,
            ..
        } = self;
        let (width, height) = (*width, *height);

        let lookup = |id: TextureId| {
            textures
                .get(&id)
                .ok_or_else(|| WindowError::Update(format!("unknown texture {:?}", id)))
        };

        blit_base(buffer, width, height, lookup(frame.base)?);

        // Additive blending is scoped to the overlay draws; the marker below
        // is drawn opaquely again.
        for layer in frame.overlays {
            blend_overlay(buffer, width, height, lookup(layer.texture)?, layer.tint);
        }

        if let Some(marker) = frame.marker {
            draw_marker(buffer, width, height, marker.x as i32, marker.y as i32);
        }

        window
            .update_with_buffer(buffer, width as usize, height as usize)
            .map_err(|e| WindowError::Update(e.to_string()))
    }
}

/// Copy the base RGB image into the 0RGB window buffer.
fn blit_base(buffer: &mut [u32], width: u32, height: u32, img: &ImageBuffer) {
    let copy_w = width.min(img.width) as usize;
    let copy_h = height.min(img.height) as usize;

    buffer.fill(0);
    for y in 0..copy_h {
        for x in 0..copy_w {
            let src = (y * img.width as usize + x) * 3;
            let (r, g, b) = (
                img.pixels[src] as u32,
                img.pixels[src + 1] as u32,
                img.pixels[src + 2] as u32,
            );
            buffer[y * width as usize + x] = (r << 16) | (g << 8) | b;
        }
    }
}

/// Blend one overlay texture. Raw masks arrive single-channel and are
/// broadcast to RGB here, before the tint is applied.
fn blend_overlay(buffer: &mut [u32], width: u32, height: u32, tex: &ImageBuffer, tint: Tint) {
    if tex.channels == 1 {
        blend_additive(buffer, width, height, &broadcast_to_rgb(tex), tint);
    } else {
        blend_additive(buffer, width, height, tex, tint);
    }
}

/// Saturating additive blend of a tinted RGB texture, the software analogue
/// of `glBlendFunc(GL_SRC_ALPHA, GL_ONE)` with color modulation.
fn blend_additive(buffer: &mut [u32], width: u32, height: u32, tex: &ImageBuffer, tint: Tint) {
    let copy_w = width.min(tex.width) as usize;
    let copy_h = height.min(tex.height) as usize;
    let alpha = tint.alpha as u32;

    for y in 0..copy_h {
        for x in 0..copy_w {
            let src = (y * tex.width as usize + x) * 3;
            let dst = &mut buffer[y * width as usize + x];

            let mut out = 0u32;
            for (c, shift) in [(0usize, 16u32), (1, 8), (2, 0)] {
                let add = tex.pixels[src + c] as u32 * tint.rgb[c] as u32 * alpha / (255 * 255);
                let channel = ((*dst >> shift) & 0xFF) + add;
                out |= channel.min(255) << shift;
            }
            *dst = out;
        }
    }
}

/// Filled dot at the prompt position.
fn draw_marker(buffer: &mut [u32], width: u32, height: u32, cx: i32, cy: i32) {
    for dy in -PROMPT_MARKER_RADIUS..=PROMPT_MARKER_RADIUS {
        for dx in -PROMPT_MARKER_RADIUS..=PROMPT_MARKER_RADIUS {
            if dx * dx + dy * dy > PROMPT_MARKER_RADIUS * PROMPT_MARKER_RADIUS {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                continue;
            }
            buffer[y as usize * width as usize + x as usize] = PROMPT_MARKER_COLOR;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_converts_rgb_to_packed_u32() {
        let img = ImageBuffer::rgb(2, 1, vec![255, 0, 0, 0, 128, 64]);
        let mut buffer = vec![0u32; 2];
        blit_base(&mut buffer, 2, 1, &img);
        assert_eq!(buffer, vec![0x00FF_0000, 0x0000_8040]);
    }

    #[test]
    fn additive_blend_saturates() {
        let mut buffer = vec![0x00F0_0000u32];
        let tex = ImageBuffer::rgb(1, 1, vec![255, 255, 255]);
        let tint = Tint {
            rgb: [255, 0, 0],
            alpha: 255,
        };
        blend_additive(&mut buffer, 1, 1, &tex, tint);
        assert_eq!(buffer[0], 0x00FF_0000);
    }

    #[test]
    fn tint_modulates_each_channel() {
        let mut buffer = vec![0u32];
        let tex = ImageBuffer::rgb(1, 1, vec![255, 255, 255]);
        let tint = Tint {
            rgb: [0, 0, 255],
            alpha: 128,
        };
        blend_additive(&mut buffer, 1, 1, &tex, tint);
        // Only blue receives 255 * 255 * 128 / 255^2 = 128.
        assert_eq!(buffer[0], 0x0000_0080);
    }

    #[test]
    fn gray_masks_blend_like_their_rgb_broadcast() {
        let mask = ImageBuffer::mask(2, 1, vec![100, 200]);
        let tint = Tint {
            rgb: [0, 0, 255],
            alpha: 172,
        };

        let mut from_gray = vec![0x0010_2030u32; 2];
        blend_overlay(&mut from_gray, 2, 1, &mask, tint);

        let mut from_rgb = vec![0x0010_2030u32; 2];
        blend_overlay(&mut from_rgb, 2, 1, &broadcast_to_rgb(&mask), tint);

        assert_eq!(from_gray, from_rgb);
    }

    #[test]
    fn marker_clips_at_buffer_edges() {
        let mut buffer = vec![0u32; 16];
        draw_marker(&mut buffer, 4, 4, 0, 0);
        assert_eq!(buffer[0], PROMPT_MARKER_COLOR);
        // Out-of-bounds centers must not panic.
        draw_marker(&mut buffer, 4, 4, -10, 100);
    }
}
