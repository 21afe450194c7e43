//! The picture viewport: scale model, pan and box-zoom pointer
//! handling, navigator binding and the repaint pass.
//!
//! The viewer owns two [`Adjustment`]s describing the scrollable range
//! in logical image coordinates divided by the pixbuf's decode scale.
//! Every pan, zoom, image change and resize lands in the repaint queue
//! and is resolved by a single [`pump_repaint`](PictureViewer::pump_repaint)
//! pass that recomputes scale and adjustments, re-extracts the visible
//! sub-region when asked to, and presents one composed frame.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::loader::ImageLoader;
use crate::models::{Image, ImageListIter};
use crate::observers::HandlerId;
use crate::settings::Settings;
use crate::viewer::adjustment::Adjustment;
use crate::viewer::render::{self, AxisSpan, FrameParams, Selection, SourceGeometry};
use crate::viewer::repaint::RepaintQueue;
use crate::viewer::surface::RenderSurface;

/// Which bitmap generation the viewport shows for the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayState {
    /// Full-resolution pixbuf.
    #[default]
    Normal,
    /// Thumbnail stand-in while the full decode is under way.
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomMode {
    Custom,
    HundredPercent,
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MotionState {
    #[default]
    Idle,
    Panning,
    BoxZoom,
}

#[derive(Default)]
struct Motion {
    state: MotionState,
    press_x: f64,
    press_y: f64,
    current_x: f64,
    current_y: f64,
    h_value: f64,
    v_value: f64,
}

struct ImageBinding {
    image: Weak<Image>,
    prepared: HandlerId,
    updated: HandlerId,
}

struct IterBinding {
    iter: Rc<ImageListIter>,
    changed: HandlerId,
}

pub struct PictureViewer {
    hadjustment: Rc<Adjustment>,
    vadjustment: Rc<Adjustment>,
    repaint: Rc<RepaintQueue>,
    state: Cell<DisplayState>,
    zoom_mode: Cell<ZoomMode>,
    motion: RefCell<Motion>,
    image: RefCell<Option<ImageBinding>>,
    iter: RefCell<Option<IterBinding>>,
    alloc: Cell<(u32, u32)>,
    fullscreen: Cell<bool>,
    dst: RefCell<Option<RgbaImage>>,
    menu_callback: RefCell<Option<Box<dyn Fn()>>>,
    loader: Rc<ImageLoader>,
    settings: Rc<Settings>,
    surface: RefCell<Box<dyn RenderSurface>>,
}

impl PictureViewer {
    pub fn new(
        loader: Rc<ImageLoader>,
        settings: Rc<Settings>,
        surface: Box<dyn RenderSurface>,
    ) -> Rc<Self> {
        let viewer = Rc::new(Self {
            hadjustment: Rc::new(Adjustment::new()),
            vadjustment: Rc::new(Adjustment::new()),
            repaint: Rc::new(RepaintQueue::new()),
            state: Cell::new(DisplayState::Normal),
            zoom_mode: Cell::new(ZoomMode::Fit),
            motion: RefCell::new(Motion::default()),
            image: RefCell::new(None),
            iter: RefCell::new(None),
            alloc: Cell::new((0, 0)),
            fullscreen: Cell::new(false),
            dst: RefCell::new(None),
            menu_callback: RefCell::new(None),
            loader,
            settings,
            surface: RefCell::new(surface),
        });

        // Any pan, from dragging or from a host scrollbar, recomputes
        // the visible crop.
        let repaint = viewer.repaint.clone();
        viewer
            .hadjustment
            .connect_value_changed(move || repaint.request(true));
        let repaint = viewer.repaint.clone();
        viewer
            .vadjustment
            .connect_value_changed(move || repaint.request(true));

        viewer
    }

    pub fn hadjustment(&self) -> &Rc<Adjustment> {
        &self.hadjustment
    }

    pub fn vadjustment(&self) -> &Rc<Adjustment> {
        &self.vadjustment
    }

    pub fn zoom_mode(&self) -> ZoomMode {
        self.zoom_mode.get()
    }

    pub fn image(&self) -> Option<Rc<Image>> {
        self.image.borrow().as_ref().and_then(|b| b.image.upgrade())
    }

    /// Scale of the current image, `0.0` without one. The `-1.0`
    /// sentinel of a never-painted image passes through unchanged.
    pub fn get_scale(&self) -> f64 {
        self.image().map(|image| image.scale()).unwrap_or(0.0)
    }

    /// Host window allocation, in pixels.
    pub fn resize(&self, width: u32, height: u32) {
        self.alloc.set((width, height));
        self.repaint.request(true);
    }

    /// Fullscreen only affects the background color selection.
    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.fullscreen.set(fullscreen);
        self.repaint.request(true);
    }

    pub fn set_context_menu(&self, callback: impl Fn() + 'static) {
        *self.menu_callback.borrow_mut() = Some(Box::new(callback));
    }

    pub fn request_repaint(&self, refresh: bool) {
        self.repaint.request(refresh);
    }

    /// Apply the scale, keeping the viewport center fixed.
    ///
    /// The adjustments are repositioned against the new range right
    /// away; the repaint pass re-derives the full geometry afterwards.
    /// Requires a loaded pixbuf, does nothing in the preview stage.
    pub fn set_scale(&self, new_scale: f64) {
        let Some(image) = self.image() else {
            return;
        };
        if image.pixbuf().is_none() {
            return;
        }
        let Some((logical_width, logical_height)) = image.logical_size() else {
            return;
        };
        let old_scale = image.scale();

        reposition_axis(&self.hadjustment, logical_width, new_scale, old_scale);
        reposition_axis(&self.vadjustment, logical_height, new_scale, old_scale);

        image.set_scale(new_scale);
        self.repaint.request(true);
    }

    pub fn zoom_fit(&self) {
        self.set_zoom_mode(ZoomMode::Fit);
    }

    pub fn zoom_100(&self) {
        self.set_zoom_mode(ZoomMode::HundredPercent);
    }

    pub fn zoom_in(&self, factor: f64) {
        self.set_zoom_mode(ZoomMode::Custom);
        let scale = self.get_scale();
        if scale > 0.0 {
            self.set_scale(scale * factor);
        }
    }

    pub fn zoom_out(&self, factor: f64) {
        self.set_zoom_mode(ZoomMode::Custom);
        let scale = self.get_scale();
        if scale > 0.0 {
            self.set_scale(scale / factor);
        }
    }

    pub(crate) fn set_zoom_mode(&self, mode: ZoomMode) {
        self.zoom_mode.set(mode);
        let Some(image) = self.image() else {
            return;
        };
        match mode {
            ZoomMode::Custom => image.set_fit_to_screen(false),
            ZoomMode::Fit => {
                image.set_fit_to_screen(true);
                let scale = self.calculate_fit_scale();
                if scale > 0.0 {
                    self.set_scale(scale);
                }
            }
            ZoomMode::HundredPercent => {
                image.set_fit_to_screen(false);
                self.set_scale(1.0);
            }
        }
    }

    /// Scale at which the whole image fits the allocation, `-1.0`
    /// without an image or with unknown dimensions.
    fn calculate_fit_scale(&self) -> f64 {
        let Some(image) = self.image() else {
            return -1.0;
        };
        let (alloc_width, alloc_height) = self.alloc.get();
        render::fit_scale(
            alloc_width,
            alloc_height,
            image.width(),
            image.height(),
            image.orientation(),
        )
    }

    /// Follow an iterator: every position change shows its image.
    pub fn set_iter(self: &Rc<Self>, iter: Option<Rc<ImageListIter>>) {
        if let Some(binding) = self.iter.borrow_mut().take() {
            binding.iter.disconnect_changed(binding.changed);
        }
        match iter {
            Some(iter) => {
                let weak_self = Rc::downgrade(self);
                let weak_iter = Rc::downgrade(&iter);
                let changed = iter.connect_changed(move || {
                    if let (Some(viewer), Some(iter)) = (weak_self.upgrade(), weak_iter.upgrade())
                    {
                        viewer.set_image(iter.get_image());
                    }
                });
                let image = iter.get_image();
                *self.iter.borrow_mut() = Some(IterBinding { iter, changed });
                self.set_image(image);
            }
            None => self.set_image(None),
        }
    }

    /// Show an image. The previous image keeps its thumbnail but drops
    /// the full pixbuf, so memory tracks the navigation window.
    pub fn set_image(self: &Rc<Self>, image: Option<Rc<Image>>) {
        if let (Some(new), Some(current)) = (&image, &self.image()) {
            if Rc::ptr_eq(new, current) {
                return;
            }
        }

        if let Some(binding) = self.image.borrow_mut().take() {
            if let Some(previous) = binding.image.upgrade() {
                previous.disconnect_prepared(binding.prepared);
                previous.disconnect_updated(binding.updated);
                previous.unload();
            }
        }

        match image {
            Some(image) => {
                debug!(path = %image.path().display(), "showing image");

                let weak = Rc::downgrade(self);
                let prepared = image.connect_prepared(move || {
                    if let Some(viewer) = weak.upgrade() {
                        viewer.state.set(DisplayState::Preview);
                        viewer.repaint.request(true);
                    }
                });
                let weak = Rc::downgrade(self);
                let updated = image.connect_updated(move || {
                    if let Some(viewer) = weak.upgrade() {
                        viewer.state.set(DisplayState::Normal);
                        viewer.repaint.request(true);
                    }
                });

                self.state.set(if image.is_loaded() {
                    DisplayState::Normal
                } else {
                    DisplayState::Preview
                });

                *self.image.borrow_mut() = Some(ImageBinding {
                    image: Rc::downgrade(&image),
                    prepared,
                    updated,
                });
                self.loader.request(&image, self.settings.image_quality());
                self.repaint.request(true);
            }
            None => {
                self.repaint.request(true);
            }
        }
    }

    /// Button 1 starts a pan, or a box-zoom selection with ctrl held.
    /// Button 3 invokes the context-menu callback.
    pub fn button_press(&self, x: f64, y: f64, button: u32, ctrl: bool) {
        if button == 1 {
            let mut motion = self.motion.borrow_mut();
            motion.press_x = x;
            motion.press_y = y;
            motion.current_x = x;
            motion.current_y = y;
            motion.h_value = self.hadjustment.value();
            motion.v_value = self.vadjustment.value();

            if self.image().is_some() && self.state.get() == DisplayState::Normal {
                motion.state = if ctrl {
                    MotionState::BoxZoom
                } else {
                    MotionState::Panning
                };
            }
        } else if button == 3 {
            if let Some(callback) = &*self.menu_callback.borrow() {
                callback();
            }
        }
    }

    pub fn motion(&self, x: f64, y: f64) {
        let (state, press_x, press_y, h_value, v_value) = {
            let mut motion = self.motion.borrow_mut();
            motion.current_x = x;
            motion.current_y = y;
            (
                motion.state,
                motion.press_x,
                motion.press_y,
                motion.h_value,
                motion.v_value,
            )
        };
        match state {
            MotionState::Panning => {
                self.hadjustment.set_value(h_value + (press_x - x));
                self.vadjustment.set_value(v_value + (press_y - y));
            }
            MotionState::BoxZoom => self.repaint.request(false),
            MotionState::Idle => {}
        }
    }

    pub fn button_release(&self, button: u32) {
        if button != 1 {
            return;
        }
        let state = {
            let mut motion = self.motion.borrow_mut();
            let state = motion.state;
            motion.state = MotionState::Idle;
            state
        };
        if state == MotionState::BoxZoom {
            self.set_zoom_mode(ZoomMode::Custom);
        }
        self.repaint.request(false);
    }

    /// Run a pending repaint, if any. Returns whether one fired; the
    /// pass itself can request a follow-up when clamping moved an
    /// adjustment, so hosts pump until this settles to false.
    pub fn pump_repaint(&self) -> bool {
        let Some(task) = self.repaint.take() else {
            return false;
        };
        self.repaint_pass(task.refresh);
        true
    }

    /// Pick the source bitmap for the display state, with the scales
    /// relating it to logical coordinates.
    fn resolve_source(&self, image: &Image) -> Option<(Arc<RgbaImage>, f64, f64)> {
        if image.width() == 0 {
            return None;
        }
        match self.state.get() {
            DisplayState::Normal => image.pixbuf().map(|pixbuf| {
                let image_scale = pixbuf.width() as f64 / image.width() as f64;
                (pixbuf, image_scale, 1.0)
            }),
            DisplayState::Preview => image.thumbnail().map(|thumbnail| {
                let thumb_scale = thumbnail.width() as f64 / image.width() as f64;
                (thumbnail, 1.0, thumb_scale)
            }),
        }
    }

    /// An unset scale, or a sticky fit request, resolves to the fit
    /// scale and persists both back into the image.
    fn resolve_scale(&self, image: &Image) -> f64 {
        let mut scale = image.scale();
        if scale <= 0.0 || image.fit_to_screen() {
            let fit = self.calculate_fit_scale();
            if fit > 0.0 {
                image.set_fit_to_screen(true);
                image.set_scale(fit);
                scale = fit;
            }
        }
        scale
    }

    /// Reconfigure both axes for the given scale. Skipped until the
    /// full pixbuf exists; the preview stage paints with whatever
    /// ranges are current.
    fn calculate_adjustments(&self, image: &Image, scale: f64) {
        let Some(pixbuf) = image.pixbuf() else {
            return;
        };
        if image.width() == 0 {
            return;
        }
        let (alloc_width, alloc_height) = self.alloc.get();
        let image_scale = pixbuf.width() as f64 / image.width() as f64;
        let (h_logical, v_logical) = if image.orientation().swaps_axes() {
            (image.height() as f64, image.width() as f64)
        } else {
            (image.width() as f64, image.height() as f64)
        };

        self.hadjustment.configure(
            0.0,
            h_logical * (scale / image_scale),
            alloc_width as f64 / image_scale,
            1.0,
            100.0,
        );
        self.vadjustment.configure(
            0.0,
            v_logical * (scale / image_scale),
            alloc_height as f64 / image_scale,
            1.0,
            100.0,
        );
    }

    fn repaint_pass(&self, refresh: bool) {
        let (alloc_width, alloc_height) = self.alloc.get();
        let image = self.image();

        let resolved = image.as_ref().and_then(|image| {
            let source = self.resolve_source(image)?;
            let scale = self.resolve_scale(image);
            (scale > 0.0).then_some((source, scale))
        });

        match (&image, resolved) {
            (Some(image), Some(((source, image_scale, thumb_scale), scale))) => {
                self.calculate_adjustments(image, scale);
                if refresh {
                    let geom = SourceGeometry {
                        orientation: image.orientation(),
                        scale,
                        image_scale,
                        thumb_scale,
                        alloc_width,
                        alloc_height,
                        image_width: image.width() as f64,
                        image_height: image.height() as f64,
                        h: AxisSpan {
                            value: self.hadjustment.value(),
                            upper: self.hadjustment.upper(),
                            page_size: self.hadjustment.page_size(),
                        },
                        v: AxisSpan {
                            value: self.vadjustment.value(),
                            upper: self.vadjustment.upper(),
                            page_size: self.vadjustment.page_size(),
                        },
                    };
                    *self.dst.borrow_mut() = Some(render::extract(&source, &geom));
                }
            }
            _ => {
                if refresh {
                    *self.dst.borrow_mut() = None;
                }
            }
        }

        let selection = {
            let motion = self.motion.borrow();
            (motion.state == MotionState::BoxZoom).then_some(Selection {
                press_x: motion.press_x,
                press_y: motion.press_y,
                current_x: motion.current_x,
                current_y: motion.current_y,
            })
        };
        let background = self.settings.resolve_background(self.fullscreen.get());
        let src_has_alpha = image.as_ref().map(|i| i.has_alpha()).unwrap_or(false);

        let dst = self.dst.borrow();
        let frame = render::compose(&FrameParams {
            alloc_width,
            alloc_height,
            background,
            dst: dst.as_ref(),
            src_has_alpha,
            selection,
        });
        drop(dst);

        self.surface.borrow_mut().present(&frame);
    }
}

/// Rescale one axis around its viewport center. A sentinel previous
/// scale has no usable ratio, the value falls to the lower bound.
fn reposition_axis(adjustment: &Adjustment, logical: f64, new_scale: f64, old_scale: f64) {
    let page_size = adjustment.page_size();
    let value = if old_scale > 0.0 {
        (adjustment.value() + page_size / 2.0) * new_scale / old_scale - page_size / 2.0
    } else {
        adjustment.lower()
    };
    adjustment.configure(
        adjustment.lower(),
        logical * new_scale,
        page_size,
        adjustment.step_increment(),
        adjustment.page_increment(),
    );
    adjustment.set_value(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageId, ImageList, Orientation};
    use crate::settings::DEFAULT_BACKGROUND;
    use crate::viewer::surface::SoftwareSurface;
    use image::Rgba;
    use std::path::PathBuf;

    fn viewer_fixture() -> (Rc<PictureViewer>, Rc<RefCell<SoftwareSurface>>) {
        let loader = Rc::new(ImageLoader::new());
        let settings = Rc::new(Settings::new());
        let surface = SoftwareSurface::new();
        let viewer = PictureViewer::new(loader, settings, Box::new(surface.clone()));
        viewer.resize(400, 300);
        (viewer, surface)
    }

    fn pump(viewer: &PictureViewer) {
        while viewer.pump_repaint() {}
    }

    fn loaded_image(id: u64, width: u32, height: u32, color: Rgba<u8>) -> Rc<Image> {
        let image = Rc::new(Image::new(ImageId(id), PathBuf::from(format!("{id}.png"))));
        let thumb = RgbaImage::from_pixel(width.div_ceil(10).max(1), height.div_ceil(10).max(1), color);
        image.apply_prepared(width, height, Orientation::None, false, Arc::new(thumb));
        image.apply_updated(Arc::new(RgbaImage::from_pixel(width, height, color)), false);
        image
    }

    #[test]
    fn test_first_paint_resolves_fit_scale() {
        let (viewer, surface) = viewer_fixture();
        let image = loaded_image(1, 800, 300, Rgba([200, 40, 40, 255]));

        viewer.set_image(Some(image.clone()));
        pump(&viewer);

        assert!((viewer.get_scale() - 0.5).abs() < 0.01);
        assert!(image.fit_to_screen());

        let inner = surface.borrow();
        let frame = inner.frame().unwrap();
        assert_eq!(frame.dimensions(), (400, 300));
        // 400x150 blit centered vertically.
        assert_eq!(*frame.get_pixel(200, 150), Rgba([200, 40, 40, 255]));
        assert_eq!(*frame.get_pixel(200, 10), DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_zoom_in_preserves_viewport_center() {
        let (viewer, _surface) = viewer_fixture();
        let image = loaded_image(1, 800, 600, Rgba([10, 10, 10, 255]));

        viewer.set_image(Some(image.clone()));
        pump(&viewer);
        assert!((viewer.get_scale() - 0.5).abs() < 0.01);

        viewer.zoom_in(2.0);
        pump(&viewer);

        assert!((viewer.get_scale() - 1.0).abs() < 0.01);
        assert!(!image.fit_to_screen());
        // Centered: (0 + 400/2) * 2 - 400/2 on the horizontal axis.
        assert!((viewer.hadjustment().value() - 200.0).abs() < 0.01);
        assert!((viewer.vadjustment().value() - 150.0).abs() < 0.01);

        viewer.zoom_out(2.0);
        pump(&viewer);
        assert!((viewer.get_scale() - 0.5).abs() < 0.01);
        assert!((viewer.hadjustment().value() - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_pan_offsets_and_clamps() {
        let (viewer, _surface) = viewer_fixture();
        let image = loaded_image(1, 800, 600, Rgba([10, 10, 10, 255]));
        viewer.set_image(Some(image.clone()));
        pump(&viewer);
        viewer.zoom_in(2.0);
        pump(&viewer);

        viewer.button_press(100.0, 100.0, 1, false);
        viewer.motion(60.0, 100.0);
        assert!((viewer.hadjustment().value() - 240.0).abs() < 0.01);

        // Dragging far right clamps against the upper bound.
        viewer.motion(-10_000.0, 100.0);
        assert!((viewer.hadjustment().value() - 400.0).abs() < 0.01);

        viewer.button_release(1);
        assert!(viewer.pump_repaint());

        // Motion without a held button no longer pans.
        viewer.motion(500.0, 500.0);
        assert!((viewer.hadjustment().value() - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_box_zoom_selects_then_enters_custom() {
        let (viewer, surface) = viewer_fixture();
        let image = loaded_image(1, 800, 600, Rgba([10, 200, 10, 255]));
        viewer.set_image(Some(image.clone()));
        pump(&viewer);
        assert!(image.fit_to_screen());

        viewer.button_press(50.0, 50.0, 1, true);
        viewer.motion(120.0, 90.0);
        pump(&viewer);

        {
            let inner = surface.borrow();
            let frame = inner.frame().unwrap();
            assert_eq!(*frame.get_pixel(50, 50), Rgba([255, 255, 255, 255]));
        }

        viewer.button_release(1);
        assert!(!image.fit_to_screen());
        assert_eq!(viewer.zoom_mode(), ZoomMode::Custom);
        pump(&viewer);

        let inner = surface.borrow();
        let frame = inner.frame().unwrap();
        assert_eq!(*frame.get_pixel(50, 50), Rgba([10, 200, 10, 255]));
    }

    #[test]
    fn test_iter_navigation_swaps_images_and_unloads() {
        let (viewer, surface) = viewer_fixture();
        let list = ImageList::new();
        let a = list.add_file(&PathBuf::from("a.png")).unwrap();
        let b = list.add_file(&PathBuf::from("b.png")).unwrap();
        a.apply_prepared(8, 6, Orientation::None, false, Arc::new(RgbaImage::from_pixel(4, 3, Rgba([200, 0, 0, 255]))));
        a.apply_updated(Arc::new(RgbaImage::from_pixel(8, 6, Rgba([200, 0, 0, 255]))), false);
        b.apply_prepared(8, 6, Orientation::None, false, Arc::new(RgbaImage::from_pixel(4, 3, Rgba([0, 0, 200, 255]))));
        b.apply_updated(Arc::new(RgbaImage::from_pixel(8, 6, Rgba([0, 0, 200, 255]))), false);

        let iter = list.get_iter();
        viewer.set_iter(Some(iter.clone()));
        pump(&viewer);
        {
            let inner = surface.borrow();
            assert_eq!(*inner.frame().unwrap().get_pixel(200, 150), Rgba([200, 0, 0, 255]));
        }

        iter.next();
        pump(&viewer);

        // Leaving an image drops its pixbuf but keeps the thumbnail.
        assert!(!a.is_loaded());
        assert!(a.thumbnail().is_some());
        let inner = surface.borrow();
        assert_eq!(*inner.frame().unwrap().get_pixel(200, 150), Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn test_clearing_the_image_paints_the_placeholder() {
        let (viewer, surface) = viewer_fixture();
        let image = loaded_image(1, 8, 6, Rgba([200, 0, 0, 255]));
        viewer.set_image(Some(image.clone()));
        pump(&viewer);

        viewer.set_image(None);
        pump(&viewer);

        assert!(!image.is_loaded());
        let inner = surface.borrow();
        let frame = inner.frame().unwrap();
        // Glyph body pixel vs untouched corner.
        assert_ne!(*frame.get_pixel(128, 180), DEFAULT_BACKGROUND);
        assert_eq!(*frame.get_pixel(2, 2), DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_preview_stage_paints_the_thumbnail() {
        let (viewer, surface) = viewer_fixture();
        viewer.resize(40, 30);
        let image = Rc::new(Image::new(ImageId(9), PathBuf::from("9.png")));
        image.apply_prepared(
            80,
            60,
            Orientation::None,
            false,
            Arc::new(RgbaImage::from_pixel(8, 6, Rgba([99, 99, 0, 255]))),
        );

        viewer.set_image(Some(image.clone()));
        pump(&viewer);

        let inner = surface.borrow();
        let frame = inner.frame().unwrap();
        assert_eq!(frame.dimensions(), (40, 30));
        assert_eq!(*frame.get_pixel(20, 15), Rgba([99, 99, 0, 255]));
    }

    #[test]
    fn test_context_menu_callback_fires_on_button_3() {
        let (viewer, _surface) = viewer_fixture();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        viewer.set_context_menu(move || f.set(f.get() + 1));

        viewer.button_press(10.0, 10.0, 1, false);
        assert_eq!(fired.get(), 0);
        viewer.button_press(10.0, 10.0, 3, false);
        assert_eq!(fired.get(), 1);
    }
}
