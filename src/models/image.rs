use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use crate::observers::{HandlerId, Observers};

/// Identity of an image within its owning list. Stable for the lifetime
/// of the entity and safe to ship across the loader threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub u64);

/// Stored EXIF orientation. Bitmaps keep the stored orientation; the
/// viewer rotates the visible crop at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Collapse the eight EXIF cases onto the four rotations; mirrored
    /// variants keep their rotation component.
    pub fn from_exif(orientation: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Exif;
        match orientation {
            Exif::NoTransforms | Exif::FlipHorizontal | Exif::FlipVertical => Self::None,
            Exif::Rotate90 | Exif::Rotate90FlipH => Self::Rotate90,
            Exif::Rotate180 => Self::Rotate180,
            Exif::Rotate270 | Exif::Rotate270FlipH => Self::Rotate270,
        }
    }

    /// Whether the rendered orientation swaps the stored width/height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            matches!(
                e.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif"
            )
        })
        .unwrap_or(false)
}

/// One picture resource plus the view state that survives navigation.
///
/// Dimensions and orientation stay zeroed/default until the loader has
/// read the file header; bitmaps arrive asynchronously via
/// [`apply_prepared`](Image::apply_prepared) and
/// [`apply_updated`](Image::apply_updated), each of which fires the
/// corresponding typed observer list.
pub struct Image {
    id: ImageId,
    path: PathBuf,
    width: Cell<u32>,
    height: Cell<u32>,
    orientation: Cell<Orientation>,
    pixbuf: RefCell<Option<Arc<RgbaImage>>>,
    thumbnail: RefCell<Option<Arc<RgbaImage>>>,
    has_alpha: Cell<bool>,
    broken: Cell<bool>,
    // Per-image view state, persisted across navigation. -1.0 means
    // "unset": the next repaint resolves it to the fit scale.
    scale: Cell<f64>,
    fit_to_screen: Cell<bool>,
    prepared: Observers,
    updated: Observers,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("width", &self.width.get())
            .field("height", &self.height.get())
            .field("orientation", &self.orientation.get())
            .field("broken", &self.broken.get())
            .finish_non_exhaustive()
    }
}

impl Image {
    pub fn new(id: ImageId, path: PathBuf) -> Self {
        Self {
            id,
            path,
            width: Cell::new(0),
            height: Cell::new(0),
            orientation: Cell::new(Orientation::None),
            pixbuf: RefCell::new(None),
            thumbnail: RefCell::new(None),
            has_alpha: Cell::new(false),
            broken: Cell::new(false),
            scale: Cell::new(-1.0),
            fit_to_screen: Cell::new(false),
            prepared: Observers::new(),
            updated: Observers::new(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored width in pixels, 0 until the header has been read.
    pub fn width(&self) -> u32 {
        self.width.get()
    }

    pub fn height(&self) -> u32 {
        self.height.get()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation.get()
    }

    /// Orientation-corrected dimensions, or None while unknown.
    pub fn logical_size(&self) -> Option<(f64, f64)> {
        let (w, h) = (self.width.get(), self.height.get());
        if w == 0 || h == 0 {
            return None;
        }
        if self.orientation.get().swaps_axes() {
            Some((h as f64, w as f64))
        } else {
            Some((w as f64, h as f64))
        }
    }

    pub fn pixbuf(&self) -> Option<Arc<RgbaImage>> {
        self.pixbuf.borrow().clone()
    }

    pub fn thumbnail(&self) -> Option<Arc<RgbaImage>> {
        self.thumbnail.borrow().clone()
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha.get()
    }

    pub fn is_broken(&self) -> bool {
        self.broken.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.pixbuf.borrow().is_some()
    }

    pub fn scale(&self) -> f64 {
        self.scale.get()
    }

    pub fn set_scale(&self, scale: f64) {
        self.scale.set(scale);
    }

    pub fn fit_to_screen(&self) -> bool {
        self.fit_to_screen.get()
    }

    pub fn set_fit_to_screen(&self, fit: bool) {
        self.fit_to_screen.set(fit);
    }

    /// Drop the full-resolution bitmap, keeping the thumbnail so
    /// re-display can start from a preview without touching the disk.
    pub fn unload(&self) {
        *self.pixbuf.borrow_mut() = None;
    }

    pub fn connect_prepared(&self, callback: impl Fn() + 'static) -> HandlerId {
        self.prepared.connect(callback)
    }

    pub fn disconnect_prepared(&self, id: HandlerId) -> bool {
        self.prepared.disconnect(id)
    }

    pub fn connect_updated(&self, callback: impl Fn() + 'static) -> HandlerId {
        self.updated.connect(callback)
    }

    pub fn disconnect_updated(&self, id: HandlerId) -> bool {
        self.updated.disconnect(id)
    }

    /// Header facts plus the thumbnail bitmap. Fires "prepared".
    pub(crate) fn apply_prepared(
        &self,
        width: u32,
        height: u32,
        orientation: Orientation,
        has_alpha: bool,
        thumbnail: Arc<RgbaImage>,
    ) {
        self.width.set(width);
        self.height.set(height);
        self.orientation.set(orientation);
        self.has_alpha.set(has_alpha);
        self.broken.set(false);
        *self.thumbnail.borrow_mut() = Some(thumbnail);
        self.prepared.emit();
    }

    /// Full-resolution bitmap (possibly decode-downscaled). Fires "updated".
    pub(crate) fn apply_updated(&self, pixbuf: Arc<RgbaImage>, has_alpha: bool) {
        self.has_alpha.set(has_alpha);
        self.broken.set(false);
        *self.pixbuf.borrow_mut() = Some(pixbuf);
        self.updated.emit();
    }

    /// Decode failed; fires "updated" so observers repaint to the
    /// placeholder.
    pub(crate) fn mark_broken(&self) {
        self.broken.set(true);
        self.updated.emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn solid(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn test_view_state_initialized_at_construction() {
        let img = Image::new(ImageId(1), PathBuf::from("a.png"));
        assert_eq!(img.scale(), -1.0);
        assert!(!img.fit_to_screen());
        assert_eq!(img.width(), 0);
        assert!(img.logical_size().is_none());
    }

    #[test]
    fn test_logical_size_swaps_for_rotated() {
        let img = Image::new(ImageId(1), PathBuf::from("a.png"));
        img.apply_prepared(800, 300, Orientation::Rotate90, false, solid(256, 96));
        assert_eq!(img.logical_size(), Some((300.0, 800.0)));

        img.apply_prepared(800, 300, Orientation::Rotate180, false, solid(256, 96));
        assert_eq!(img.logical_size(), Some((800.0, 300.0)));
    }

    #[test]
    fn test_prepared_and_updated_fire_observers() {
        let img = Image::new(ImageId(1), PathBuf::from("a.png"));
        let prepared = Rc::new(Cell::new(0));
        let updated = Rc::new(Cell::new(0));

        let p = prepared.clone();
        img.connect_prepared(move || p.set(p.get() + 1));
        let u = updated.clone();
        let id = img.connect_updated(move || u.set(u.get() + 1));

        img.apply_prepared(10, 10, Orientation::None, false, solid(4, 4));
        img.apply_updated(solid(10, 10), false);
        assert_eq!(prepared.get(), 1);
        assert_eq!(updated.get(), 1);
        assert!(img.is_loaded());

        img.disconnect_updated(id);
        img.apply_updated(solid(10, 10), false);
        assert_eq!(updated.get(), 1);
    }

    #[test]
    fn test_unload_keeps_thumbnail() {
        let img = Image::new(ImageId(1), PathBuf::from("a.png"));
        img.apply_prepared(10, 10, Orientation::None, false, solid(4, 4));
        img.apply_updated(solid(10, 10), false);

        img.unload();
        assert!(!img.is_loaded());
        assert!(img.thumbnail().is_some());
    }

    #[test]
    fn test_mark_broken_fires_updated() {
        let img = Image::new(ImageId(1), PathBuf::from("a.png"));
        let updated = Rc::new(Cell::new(0));
        let u = updated.clone();
        img.connect_updated(move || u.set(u.get() + 1));

        img.mark_broken();
        assert!(img.is_broken());
        assert_eq!(updated.get(), 1);
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("photo.JPG")));
        assert!(is_image_path(Path::new("dir/photo.webp")));
        assert!(!is_image_path(Path::new("movie.mp4")));
        assert!(!is_image_path(Path::new("noext")));
    }
}
