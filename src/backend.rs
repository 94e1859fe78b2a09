// Window backend seam
// Trait boundary to the windowing/input system and its texture storage

use crate::image_loader::ImageBuffer;
use crate::overlay::Tint;
use crate::prompt::Point;
use std::path::PathBuf;
use thiserror::Error;

/// Input events delivered by the window backend, one batch per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Pointer moved to a new window position
    PointerMoved { x: f32, y: f32 },
    /// Left mouse button pressed at a window position
    LeftPressed { x: f32, y: f32 },
    /// A file was dropped onto the window
    FileDropped(PathBuf),
    /// The segment-on-hover toggle was flipped
    ToggleHoverMode,
    /// The show-all-masks toggle was flipped
    ToggleShowAll,
    /// The user asked to save the primary mask
    SaveRequested,
    /// Quit key or window close
    CloseRequested,
}

/// Pixel layout of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb,
    Gray,
}

/// Opaque handle to a texture owned by the window backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// One overlay layer: a mask texture modulated by a tint color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayer {
    pub texture: TextureId,
    pub tint: Tint,
}

/// Everything the backend needs to present one frame. Overlays are drawn in
/// order on top of the base image with additive blending; the blend mode is
/// scoped to the overlay draws and must not leak into other drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub base: TextureId,
    pub overlays: &'a [OverlayLayer],
    pub marker: Option<Point>,
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Window creation failed: {0}")]
    Create(String),
    #[error("Window update failed: {0}")]
    Update(String),
    #[error("Texture upload failed: {0}")]
    Upload(String),
}

/// The windowing/input/GPU collaborator consumed by the session loop.
pub trait WindowBackend {
    /// Size of the display the window runs on, if it can be determined.
    fn display_bounds(&self) -> Option<(u32, u32)>;

    /// Drain this frame's input events into `events` (cleared first).
    fn poll_events(&mut self, events: &mut Vec<Event>);

    fn set_title(&mut self, title: &str);

    /// Resize the window to fit a newly loaded image.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), WindowError>;

    fn upload_texture(
        &mut self,
        img: &ImageBuffer,
        format: TextureFormat,
    ) -> Result<TextureId, WindowError>;

    fn release_textures(&mut self, ids: &[TextureId]);

    fn present(&mut self, frame: &Frame) -> Result<(), WindowError>;
}

/// Scoped owner of a group of texture handles. Superseded handles are
/// released before their slot is overwritten, and the whole set is drained
/// when the session ends, so handles cannot leak across frames.
#[derive(Debug, Default)]
pub struct TextureSet {
    ids: Vec<TextureId>,
}

impl TextureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[TextureId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Release the current handles, then take ownership of `new_ids`.
    pub fn replace<W: WindowBackend + ?Sized>(&mut self, window: &mut W, new_ids: Vec<TextureId>) {
        self.clear(window);
        self.ids = new_ids;
    }

    /// Release every owned handle.
    pub fn clear<W: WindowBackend + ?Sized>(&mut self, window: &mut W) {
        if !self.ids.is_empty() {
            window.release_textures(&self.ids);
            self.ids.clear();
        }
    }
}
