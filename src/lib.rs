//! Picture viewer engine: viewport math, async image loading and
//! list navigation, rendered through an injectable surface.
//!
//! The binary in `main.rs` wraps this in a small headless shell that
//! scans a directory, pumps the loader and repaint queue, and writes
//! snapshot frames.

pub mod app;
pub mod loader;
pub mod models;
pub mod observers;
pub mod scanner;
pub mod settings;
pub mod viewer;
