// Session loop module
// Per-frame orchestration: input, image swaps, mask computation, presentation

use crate::backend::{
    Event, Frame, OverlayLayer, TextureFormat, TextureId, TextureSet, WindowBackend, WindowError,
};
use crate::fit::{fit_to_display, DISPLAY_MARGIN};
use crate::image_loader::{self, ImageBuffer};
use crate::overlay;
use crate::prompt::{Point, PromptTracker};
use crate::segmenter::Segmenter;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// Window title while idle
pub const WINDOW_TITLE: &str = "segview";

/// Window title while re-encoding a dropped image
const ENCODING_TITLE: &str = "Encoding new image...";

/// What the session should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Closed,
}

/// View state owned by the session loop. All mutation happens on the loop
/// thread between frame begin and frame end.
pub struct DisplayState {
    pub current_image: ImageBuffer,
    pub current_masks: Vec<ImageBuffer>,
    pub segment_on_hover: bool,
    pub show_all_masks: bool,
}

/// The per-frame orchestrator over the window and segmenter collaborators.
///
/// Mask computation is synchronous: a triggered frame stalls until the
/// segmenter returns, and no second request is ever issued while one is
/// outstanding. Texture handles are owned here through [`TextureSet`]s, so
/// superseded overlays are released before replacement and everything is
/// drained on shutdown.
pub struct Session<W: WindowBackend, S: Segmenter> {
    window: W,
    segmenter: S,
    state: DisplayState,
    tracker: PromptTracker,
    base_texture: TextureSet,
    overlay_textures: TextureSet,
    threads: usize,
    output_path: PathBuf,
    events: Vec<Event>,
}

impl<W: WindowBackend, S: Segmenter> Session<W, S> {
    /// Set up a session around an already-fitted image: encode it (fatal on
    /// failure, no valid session can start without it) and upload the base
    /// texture.
    pub fn new(
        mut window: W,
        mut segmenter: S,
        image: ImageBuffer,
        threads: usize,
        output_path: PathBuf,
    ) -> Result<Self> {
        let elapsed = segmenter
            .encode_image(&image, threads)
            .context("Failed to encode initial image")?;
        info!("Encoded initial image in {} ms", elapsed.as_millis());

        let id = window
            .upload_texture(&image, TextureFormat::Rgb)
            .context("Failed to upload base image")?;
        let mut base_texture = TextureSet::new();
        base_texture.replace(&mut window, vec![id]);

        Ok(Self {
            window,
            segmenter,
            state: DisplayState {
                current_image: image,
                current_masks: Vec::new(),
                segment_on_hover: false,
                show_all_masks: false,
            },
            tracker: PromptTracker::new(),
            base_texture,
            overlay_textures: TextureSet::new(),
            threads,
            output_path,
            events: Vec::new(),
        })
    }

    /// Drive frames until the window closes.
    pub fn run(mut self) -> Result<()> {
        loop {
            if self.step()? == FrameOutcome::Closed {
                return Ok(());
            }
        }
    }

    /// Run one frame: poll input, react, present.
    pub fn step(&mut self) -> Result<FrameOutcome> {
        let mut events = std::mem::take(&mut self.events);
        self.window.poll_events(&mut events);

        let mut swapped = false;
        let mut closed = false;
        for event in &events {
            match event {
                Event::CloseRequested => {
                    closed = true;
                    break;
                }
                Event::FileDropped(path) => {
                    let path = path.clone();
                    swapped |= self.load_dropped_image(&path)?;
                }
                Event::ToggleHoverMode => {
                    let enabled = !self.tracker.hover_mode();
                    self.tracker.set_hover_mode(enabled);
                    self.state.segment_on_hover = enabled;
                    info!("Segment on hover: {}", enabled);
                }
                Event::ToggleShowAll => {
                    self.state.show_all_masks = !self.state.show_all_masks;
                    info!("Show all masks: {}", self.state.show_all_masks);
                }
                Event::SaveRequested => self.save_primary_mask(),
                _ => {}
            }
        }

        if closed {
            self.events = events;
            self.shutdown();
            return Ok(FrameOutcome::Closed);
        }

        let trigger = self.tracker.process(&events);
        self.events = events;

        if swapped {
            // A fresh image replaces the mask set wholesale; do not compute
            // at the stale pointer position.
            self.tracker.reset();
        } else if let Some(point) = trigger {
            self.compute_masks_at(point)?;
        }

        let overlays = self.overlay_layers();
        let frame = Frame {
            base: self.base_texture.ids()[0],
            overlays: &overlays,
            marker: Some(self.tracker.position()),
        };
        self.window
            .present(&frame)
            .context("Failed to present frame")?;

        Ok(FrameOutcome::Continue)
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Resolve the overlay draw plan against the uploaded mask textures.
    fn overlay_layers(&self) -> Vec<OverlayLayer> {
        overlay::build_overlays(&self.state.current_masks, self.state.show_all_masks)
            .into_iter()
            .map(|draw| OverlayLayer {
                texture: self.overlay_textures.ids()[draw.mask_index],
                tint: draw.tint,
            })
            .collect()
    }

    /// Synchronous mask computation for a prompt. Model failures are logged
    /// and leave the previous mask set in place; backend failures are fatal.
    fn compute_masks_at(&mut self, point: Point) -> Result<()> {
        info!("Prompt at ({:.1}, {:.1})", point.x, point.y);

        let masks = match self
            .segmenter
            .compute_masks(&self.state.current_image, self.threads, point)
        {
            Ok(masks) => masks,
            Err(e) => {
                error!("Mask computation failed: {e}");
                return Ok(());
            }
        };

        let ids = upload_mask_textures(&mut self.window, &masks)
            .context("Failed to upload mask textures")?;
        self.overlay_textures.replace(&mut self.window, ids);
        self.state.current_masks = masks;
        Ok(())
    }

    /// Handle a dropped file. Decode and encode failures are recoverable and
    /// keep the previous image; returns whether the image was swapped.
    fn load_dropped_image(&mut self, path: &Path) -> Result<bool> {
        let image = match image_loader::decode_image(path) {
            Ok(image) => image,
            Err(e) => {
                error!("Failed to load dropped image: {e:#}");
                return Ok(false);
            }
        };
        info!(
            "Loaded dropped image '{}' ({}x{})",
            path.display(),
            image.width,
            image.height
        );

        let image = match self.window.display_bounds() {
            Some((screen_w, screen_h)) => fit_to_display(image, screen_w, screen_h, DISPLAY_MARGIN),
            None => {
                warn!("Cannot determine display size; using native resolution");
                image
            }
        };

        self.window.set_title(ENCODING_TITLE);
        match self.segmenter.encode_image(&image, self.threads) {
            Ok(elapsed) => info!("Encoded dropped image in {} ms", elapsed.as_millis()),
            Err(e) => {
                error!("Failed to encode dropped image: {e}");
                self.window.set_title(WINDOW_TITLE);
                return Ok(false);
            }
        }

        let id = self
            .window
            .upload_texture(&image, TextureFormat::Rgb)
            .context("Failed to upload base image")?;
        self.window
            .resize(image.width, image.height)
            .context("Failed to resize window")?;
        self.window.set_title(WINDOW_TITLE);

        self.base_texture.replace(&mut self.window, vec![id]);
        self.overlay_textures.clear(&mut self.window);
        self.state.current_masks.clear();
        self.state.current_image = image;
        Ok(true)
    }

    fn save_primary_mask(&self) {
        match self.state.current_masks.first() {
            Some(mask) => match image_loader::save_mask(mask, &self.output_path) {
                Ok(()) => info!("Saved primary mask to {}", self.output_path.display()),
                Err(e) => error!("Failed to save mask: {e:#}"),
            },
            None => warn!("No mask to save yet"),
        }
    }

    /// Release every texture before the session ends.
    fn shutdown(&mut self) {
        info!("Exiting session");
        self.overlay_textures.clear(&mut self.window);
        self.base_texture.clear(&mut self.window);
    }
}

/// Upload one single-channel texture per mask; the backend broadcasts them
/// to RGB when the tint is applied. On a partial failure the already-uploaded
/// textures are released again before the error surfaces.
fn upload_mask_textures<W: WindowBackend>(
    window: &mut W,
    masks: &[ImageBuffer],
) -> Result<Vec<TextureId>, WindowError> {
    let mut ids = Vec::with_capacity(masks.len());
    for mask in masks {
        match window.upload_texture(mask, TextureFormat::Gray) {
            Ok(id) => ids.push(id),
            Err(e) => {
                window.release_textures(&ids);
                return Err(e);
            }
        }
    }
    Ok(ids)
}
