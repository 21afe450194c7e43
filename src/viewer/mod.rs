//! The picture viewport and its supporting machinery.
//!
//! This module provides:
//! - `PictureViewer` - Scale model, pointer handling, repaint pass
//! - `Adjustment` - One scrollable axis with change notification
//! - `RepaintQueue` - Coalesced deferred repaint scheduling
//! - `render` - Pure sub-region extraction and frame composition
//! - `RenderSurface` - Output seam receiving composed frames

pub mod adjustment;
pub mod picture_viewer;
pub mod render;
pub mod repaint;
pub mod surface;

pub use adjustment::Adjustment;
pub use picture_viewer::{DisplayState, PictureViewer, ZoomMode};
pub use repaint::RepaintQueue;
pub use surface::{RenderSurface, SoftwareSurface};
