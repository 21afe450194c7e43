//! Viewer settings, read by the paint and load paths.

use std::cell::Cell;

use image::Rgba;

/// Viewport background when no custom color is configured.
pub const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([0xd6, 0xd2, 0xcf, 0xff]);

pub struct Settings {
    bg_color: Cell<Option<Rgba<u8>>>,
    bg_color_override: Cell<bool>,
    bg_color_fullscreen: Cell<Rgba<u8>>,
    /// Longest-side bound for full decodes, in pixels. 0 disables the
    /// bound.
    image_quality: Cell<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bg_color: Cell::new(None),
            bg_color_override: Cell::new(false),
            bg_color_fullscreen: Cell::new(Rgba([0, 0, 0, 0xff])),
            image_quality: Cell::new(0),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bg_color(&self, color: Option<Rgba<u8>>) {
        self.bg_color.set(color);
    }

    pub fn set_bg_color_override(&self, enabled: bool) {
        self.bg_color_override.set(enabled);
    }

    pub fn set_bg_color_fullscreen(&self, color: Rgba<u8>) {
        self.bg_color_fullscreen.set(color);
    }

    pub fn set_image_quality(&self, max_size: u32) {
        self.image_quality.set(max_size);
    }

    pub fn image_quality(&self) -> u32 {
        self.image_quality.get()
    }

    /// The custom color applies only when set and the override flag is
    /// on; fullscreen always wins.
    pub fn resolve_background(&self, fullscreen: bool) -> Rgba<u8> {
        if fullscreen {
            return self.bg_color_fullscreen.get();
        }
        match self.bg_color.get() {
            Some(color) if self.bg_color_override.get() => color,
            _ => DEFAULT_BACKGROUND,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.resolve_background(false), DEFAULT_BACKGROUND);
        assert_eq!(settings.resolve_background(true), Rgba([0, 0, 0, 0xff]));
    }

    #[test]
    fn test_custom_background_needs_override() {
        let settings = Settings::new();
        let teal = Rgba([0x00, 0x80, 0x80, 0xff]);

        settings.set_bg_color(Some(teal));
        assert_eq!(settings.resolve_background(false), DEFAULT_BACKGROUND);

        settings.set_bg_color_override(true);
        assert_eq!(settings.resolve_background(false), teal);

        // Override without a color still falls back.
        settings.set_bg_color(None);
        assert_eq!(settings.resolve_background(false), DEFAULT_BACKGROUND);
    }

    #[test]
    fn test_fullscreen_background_wins() {
        let settings = Settings::new();
        settings.set_bg_color(Some(Rgba([1, 2, 3, 0xff])));
        settings.set_bg_color_override(true);
        settings.set_bg_color_fullscreen(Rgba([9, 9, 9, 0xff]));
        assert_eq!(settings.resolve_background(true), Rgba([9, 9, 9, 0xff]));
    }
}
