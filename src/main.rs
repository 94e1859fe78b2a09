// segview - an interactive point-prompt segmentation viewer
// Click the displayed image to request candidate object masks and see them
// rendered as color-coded overlays

mod backend;
mod cli;
mod fit;
mod image_loader;
mod overlay;
mod prompt;
mod segmenter;
mod session;
mod window;

use anyhow::Result;
use log::{info, warn};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = cli::parse_args();
    info!("seed = {}", args.seed);
    if let Some(model) = &args.model {
        warn!(
            "No external model backend is wired in; ignoring --model {} and using the built-in region grower",
            model.display()
        );
    }

    // Load the image; failure here is fatal, no session can start without it
    let image = image_loader::decode_image(&args.input)?;
    info!(
        "Loaded image '{}' ({}x{})",
        args.input.display(),
        image.width,
        image.height
    );

    // Fit the image to the display before the window exists
    let image = match window::MinifbWindow::display_bounds_hint() {
        Some((screen_w, screen_h)) => {
            fit::fit_to_display(image, screen_w, screen_h, fit::DISPLAY_MARGIN)
        }
        None => {
            warn!("Cannot determine display size; using native resolution");
            image
        }
    };

    let win = window::MinifbWindow::new(session::WINDOW_TITLE, image.width, image.height)?;
    let seg = segmenter::RegionGrowSegmenter::new();

    // Initial encode happens inside Session::new and is fatal on failure
    let session = session::Session::new(win, seg, image, args.threads, args.output)?;

    info!("Controls: click to segment, H toggles hover mode, M toggles all masks, S saves the primary mask, Escape quits");
    info!("This window backend has no drag-and-drop; choose the image up front with --inp");
    session.run()
}
