//! Output seam between the viewer and whatever shows its frames.

use image::RgbaImage;
use std::cell::RefCell;
use std::rc::Rc;

/// Receives every frame the viewer paints.
pub trait RenderSurface {
    fn present(&mut self, frame: &RgbaImage);
}

/// In-memory surface that keeps the latest frame around, used by the
/// headless shell for snapshots and by tests to inspect paint output.
#[derive(Default)]
pub struct SoftwareSurface {
    frame: Option<RgbaImage>,
    presents: u64,
}

impl SoftwareSurface {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    /// Number of frames presented so far.
    pub fn presents(&self) -> u64 {
        self.presents
    }
}

impl RenderSurface for SoftwareSurface {
    fn present(&mut self, frame: &RgbaImage) {
        self.frame = Some(frame.clone());
        self.presents += 1;
    }
}

impl RenderSurface for Rc<RefCell<SoftwareSurface>> {
    fn present(&mut self, frame: &RgbaImage) {
        self.borrow_mut().present(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_shared_surface_keeps_latest_frame() {
        let surface = SoftwareSurface::new();
        let mut handle = surface.clone();

        handle.present(&RgbaImage::from_pixel(2, 2, Rgba([1, 1, 1, 255])));
        handle.present(&RgbaImage::from_pixel(4, 4, Rgba([2, 2, 2, 255])));

        let inner = surface.borrow();
        assert_eq!(inner.presents(), 2);
        assert_eq!(inner.frame().unwrap().dimensions(), (4, 4));
    }
}
