//! Headless shell: argument parsing, startup scan, event pump and
//! snapshot output.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use image::Rgba;
use tracing::{error, info, warn};

use crate::loader::ImageLoader;
use crate::models::ImageList;
use crate::scanner;
use crate::settings::Settings;
use crate::viewer::{PictureViewer, SoftwareSurface, ZoomMode};

/// Zoom factor applied per step, matching the viewer's zoom buttons.
const ZOOM_STEP_FACTOR: f64 = 1.2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Picture viewer engine, headless shell")]
struct Args {
    /// Image file to show, or directory to browse
    path: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Zoom once loaded: "fit", "100", or an absolute scale factor
    #[arg(long)]
    zoom: Option<String>,

    /// Zoom-in steps applied after --zoom
    #[arg(long, default_value_t = 0)]
    zoom_in: u32,

    /// Zoom-out steps applied after --zoom
    #[arg(long, default_value_t = 0)]
    zoom_out: u32,

    /// Advance this many images before rendering
    #[arg(long, default_value_t = 0)]
    forward: u32,

    /// Step back this many images before rendering
    #[arg(long, default_value_t = 0)]
    backward: u32,

    /// Render with the fullscreen background policy
    #[arg(long)]
    fullscreen: bool,

    /// Longest decode edge in pixels, 0 keeps full resolution
    #[arg(long, default_value_t = 0)]
    quality: u32,

    /// Custom background color as #rrggbb
    #[arg(long)]
    background: Option<String>,

    /// Background color used while fullscreen, as #rrggbb
    #[arg(long)]
    background_fullscreen: Option<String>,

    /// Write the final frame to this PNG file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Give up waiting for decodes after this many milliseconds
    #[arg(long, default_value_t = 5000)]
    wait_ms: u64,
}

enum ZoomArg {
    Fit,
    Hundred,
    Scale(f64),
}

fn parse_zoom(raw: &str) -> anyhow::Result<ZoomArg> {
    match raw {
        "fit" => Ok(ZoomArg::Fit),
        "100" => Ok(ZoomArg::Hundred),
        other => {
            let scale: f64 = other
                .parse()
                .with_context(|| format!("invalid zoom {other:?}"))?;
            anyhow::ensure!(scale > 0.0, "zoom must be positive, got {scale}");
            Ok(ZoomArg::Scale(scale))
        }
    }
}

fn parse_color(raw: &str) -> anyhow::Result<Rgba<u8>> {
    let hex = raw.strip_prefix('#').unwrap_or(raw);
    anyhow::ensure!(hex.len() == 6, "expected #rrggbb, got {raw:?}");
    let r = u8::from_str_radix(&hex[0..2], 16)
        .with_context(|| format!("bad color component in {raw:?}"))?;
    let g = u8::from_str_radix(&hex[2..4], 16)
        .with_context(|| format!("bad color component in {raw:?}"))?;
    let b = u8::from_str_radix(&hex[4..6], 16)
        .with_context(|| format!("bad color component in {raw:?}"))?;
    Ok(Rgba([r, g, b, 0xff]))
}

/// Remembers the windowed scale across a fullscreen switch. Entering
/// fullscreen fits the image to the screen; leaving restores the
/// zoom the user had before.
pub struct FullscreenState {
    saved_scale: Cell<Option<f64>>,
}

impl FullscreenState {
    pub fn new() -> Self {
        Self {
            saved_scale: Cell::new(None),
        }
    }

    pub fn enter(&self, viewer: &PictureViewer) {
        self.saved_scale.set(Some(viewer.get_scale()));
        viewer.set_fullscreen(true);
        viewer.zoom_fit();
    }

    pub fn leave(&self, viewer: &PictureViewer) {
        viewer.set_fullscreen(false);
        if let Some(scale) = self.saved_scale.take() {
            viewer.set_zoom_mode(ZoomMode::Custom);
            if scale > 0.0 {
                viewer.set_scale(scale);
            }
        }
    }
}

impl Default for FullscreenState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RsttoApp {
    args: Args,
}

impl RsttoApp {
    pub fn new() -> Self {
        Self {
            args: Args::parse(),
        }
    }

    pub fn run(&self) -> i32 {
        match self.try_run() {
            Ok(()) => 0,
            Err(error) => {
                error!("{error:#}");
                1
            }
        }
    }

    fn try_run(&self) -> anyhow::Result<()> {
        let settings = Rc::new(Settings::new());
        settings.set_image_quality(self.args.quality);
        if let Some(raw) = &self.args.background {
            settings.set_bg_color(Some(parse_color(raw)?));
            settings.set_bg_color_override(true);
        }
        if let Some(raw) = &self.args.background_fullscreen {
            settings.set_bg_color_fullscreen(parse_color(raw)?);
        }

        let loader = Rc::new(ImageLoader::new());
        let list = ImageList::new();
        let surface = SoftwareSurface::new();
        let viewer = PictureViewer::new(loader.clone(), settings, Box::new(surface.clone()));
        viewer.resize(self.args.width, self.args.height);

        let mut target = None;
        if let Some(path) = &self.args.path {
            let outcome = scanner::discover(path)?;
            for file in &outcome.files {
                if let Err(error) = list.add_file(file) {
                    warn!(%error, "skipping file");
                }
            }
            if list.is_empty() {
                warn!(path = %path.display(), "no images found");
            }
            target = outcome.target;
        }

        let iter = list.get_iter();
        if let Some(target) = &target {
            let opened = (0..list.len())
                .filter_map(|position| list.image_at(position))
                .find(|image| image.path() == target);
            if let Some(opened) = opened {
                iter.find_image(&opened);
            }
        }
        viewer.set_iter(Some(iter.clone()));
        for _ in 0..self.args.forward {
            iter.next();
        }
        for _ in 0..self.args.backward {
            iter.previous();
        }

        // Pump decode events and repaints until the current image
        // settles, bounded by the wait deadline.
        let deadline = Instant::now() + Duration::from_millis(self.args.wait_ms);
        loop {
            loader.drain_blocking(&list, Duration::from_millis(50));
            while viewer.pump_repaint() {}

            let settled = match iter.get_image() {
                None => true,
                Some(image) => image.is_loaded() || image.is_broken(),
            };
            if settled {
                break;
            }
            if Instant::now() >= deadline {
                warn!("image load timed out");
                break;
            }
        }

        if let Some(raw) = &self.args.zoom {
            match parse_zoom(raw)? {
                ZoomArg::Fit => viewer.zoom_fit(),
                ZoomArg::Hundred => viewer.zoom_100(),
                ZoomArg::Scale(scale) => {
                    viewer.zoom_100();
                    viewer.set_scale(scale);
                }
            }
        }
        for _ in 0..self.args.zoom_in {
            viewer.zoom_in(ZOOM_STEP_FACTOR);
        }
        for _ in 0..self.args.zoom_out {
            viewer.zoom_out(ZOOM_STEP_FACTOR);
        }
        if self.args.fullscreen {
            FullscreenState::new().enter(&viewer);
        }
        while viewer.pump_repaint() {}

        if let Some(image) = iter.get_image() {
            let position = iter.get_position().map_or(0, |p| p + 1);
            info!(
                path = %image.path().display(),
                position,
                total = list.len(),
                scale = viewer.get_scale(),
                "displayed"
            );
        }

        if let Some(out) = &self.args.out {
            let inner = surface.borrow();
            let frame = inner.frame().context("no frame painted")?;
            frame
                .save(out)
                .with_context(|| format!("cannot write {}", out.display()))?;
            info!(path = %out.display(), "snapshot written");
        }
        Ok(())
    }
}

impl Default for RsttoApp {
    fn default() -> Self {
        Self::new()
    }
}
