//! Pure rendering math and frame composition.
//!
//! Everything here is stateless: the viewer snapshots its adjustments
//! into a [`SourceGeometry`], extraction crops the visible sub-region
//! out of the source bitmap (in the source's unrotated frame), rotates
//! and rescales it, and composition assembles the final RGBA frame.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;

use crate::models::Orientation;

/// Opacity of the box-zoom selection fill, out of 255.
const SELECTION_ALPHA: u8 = 200;
/// Opacity of the no-image placeholder glyph, out of 255.
const PLACEHOLDER_ALPHA: u8 = 40;
/// Fraction of the shorter viewport edge covered by the placeholder.
const PLACEHOLDER_FRACTION: f64 = 0.8;
/// Edge length of one checkerboard square, in pixels.
const CHECKER_SQUARE: u32 = 10;

const SELECTION_FILL: Rgba<u8> = Rgba([53, 132, 228, 255]);
const SELECTION_OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PLACEHOLDER_GRAY: Rgba<u8> = Rgba([0x46, 0x46, 0x46, PLACEHOLDER_ALPHA]);

/// Two-by-two block tile behind transparent images.
static CHECKER_TILE: Lazy<RgbaImage> = Lazy::new(|| {
    let side = CHECKER_SQUARE * 2;
    RgbaImage::from_fn(side, side, |x, y| {
        let i = x / CHECKER_SQUARE;
        let a = y / CHECKER_SQUARE;
        if i == a {
            Rgba([0xcc, 0xcc, 0xcc, 0xff])
        } else {
            Rgba([0xdd, 0xdd, 0xdd, 0xff])
        }
    })
});

/// Snapshot of one adjustment axis.
#[derive(Debug, Clone, Copy)]
pub struct AxisSpan {
    pub value: f64,
    pub upper: f64,
    pub page_size: f64,
}

/// Inputs for the sub-region extraction, all in the coordinate model of
/// the viewport: adjustment values address logical image space divided
/// by `image_scale`, the source bitmap may be the quality-bounded
/// pixbuf (`image_scale`) or the thumbnail (`thumb_scale`).
pub struct SourceGeometry {
    pub orientation: Orientation,
    pub scale: f64,
    pub image_scale: f64,
    pub thumb_scale: f64,
    pub alloc_width: u32,
    pub alloc_height: u32,
    pub image_width: f64,
    pub image_height: f64,
    pub h: AxisSpan,
    pub v: AxisSpan,
}

struct SrcRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Fit-to-viewport scale, `-1.0` when there is nothing to fit.
pub fn fit_scale(
    alloc_width: u32,
    alloc_height: u32,
    image_width: u32,
    image_height: u32,
    orientation: Orientation,
) -> f64 {
    if image_width == 0 || image_height == 0 {
        return -1.0;
    }
    let (width, height) = if orientation.swaps_axes() {
        (image_height as f64, image_width as f64)
    } else {
        (image_width as f64, image_height as f64)
    };
    let h_scale = alloc_width as f64 / width;
    let v_scale = alloc_height as f64 / height;
    h_scale.min(v_scale)
}

/// The visible rectangle in source-bitmap pixels, clamped to its
/// bounds. Offsets follow the rotation: the adjustment axes describe
/// the rotated presentation, the crop happens in the unrotated frame.
fn source_rect(geom: &SourceGeometry, src_width: u32, src_height: u32) -> SrcRect {
    let to_src = geom.thumb_scale * geom.image_scale;
    let alloc_w = geom.alloc_width as f64;
    let alloc_h = geom.alloc_height as f64;
    let h = &geom.h;
    let v = &geom.v;

    let (x, y, width, height) = match geom.orientation {
        Orientation::None => {
            let x = h.value * geom.image_scale;
            let y = v.value * geom.image_scale;
            (
                x / geom.scale * to_src,
                y / geom.scale * to_src,
                (alloc_w / geom.scale).min(geom.image_width) * to_src,
                (alloc_h / geom.scale).min(geom.image_height) * to_src,
            )
        }
        Orientation::Rotate90 => {
            let x = v.value * geom.image_scale;
            let y = ((h.upper - (h.value + h.page_size)) * geom.image_scale).max(0.0);
            (
                x / geom.scale * to_src,
                y / geom.scale * to_src,
                (alloc_h / geom.scale).min(geom.image_width) * to_src,
                (alloc_w / geom.scale).min(geom.image_height) * to_src,
            )
        }
        Orientation::Rotate180 => {
            let x = ((h.upper - (h.value + h.page_size)) * geom.image_scale).max(0.0);
            let y = ((v.upper - (v.value + v.page_size)) * geom.image_scale).max(0.0);
            (
                x / geom.scale * to_src,
                y / geom.scale * to_src,
                (alloc_w / geom.scale).min(geom.image_width) * to_src,
                (alloc_h / geom.scale).min(geom.image_height) * to_src,
            )
        }
        Orientation::Rotate270 => {
            let x = ((v.upper - (v.value + v.page_size)) * geom.image_scale).max(0.0);
            let y = h.value * geom.image_scale;
            (
                x / geom.scale * to_src,
                y / geom.scale * to_src,
                (alloc_h / geom.scale).min(geom.image_width) * to_src,
                (alloc_w / geom.scale).min(geom.image_height) * to_src,
            )
        }
    };

    let max_x = src_width.saturating_sub(1) as i64;
    let max_y = src_height.saturating_sub(1) as i64;
    let x = (x as i64).clamp(0, max_x);
    let y = (y as i64).clamp(0, max_y);
    let width = (width as i64).clamp(1, src_width as i64 - x);
    let height = (height as i64).clamp(1, src_height as i64 - y);
    SrcRect {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    }
}

/// Crop the visible sub-region, rotate it into presentation
/// orientation and rescale it to destination size with bilinear
/// filtering.
pub fn extract(source: &RgbaImage, geom: &SourceGeometry) -> RgbaImage {
    let rect = source_rect(geom, source.width(), source.height());
    let crop = imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image();

    let rotated = match geom.orientation {
        Orientation::None => crop,
        Orientation::Rotate90 => imageops::rotate90(&crop),
        Orientation::Rotate180 => imageops::rotate180(&crop),
        Orientation::Rotate270 => imageops::rotate270(&crop),
    };

    let to_dst = geom.scale / geom.thumb_scale / geom.image_scale;
    let dst_width = ((rotated.width() as f64 * to_dst) as i64).max(1) as u32;
    let dst_height = ((rotated.height() as f64 * to_dst) as i64).max(1) as u32;
    imageops::resize(&rotated, dst_width, dst_height, FilterType::Triangle)
}

/// Box-zoom drag corners in viewport coordinates, unnormalized.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    pub press_x: f64,
    pub press_y: f64,
    pub current_x: f64,
    pub current_y: f64,
}

pub struct FrameParams<'a> {
    pub alloc_width: u32,
    pub alloc_height: u32,
    pub background: Rgba<u8>,
    pub dst: Option<&'a RgbaImage>,
    pub src_has_alpha: bool,
    pub selection: Option<Selection>,
}

fn blend_channel(under: u8, over: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((over as u32 * a + under as u32 * (255 - a)) / 255) as u8
}

fn draw_checkerboard(frame: &mut RgbaImage, x0: i64, y0: i64, width: u32, height: u32) {
    let tile = &*CHECKER_TILE;
    let side = tile.width();
    for dy in 0..height {
        let py = y0 + dy as i64;
        if py < 0 || py >= frame.height() as i64 {
            continue;
        }
        for dx in 0..width {
            let px = x0 + dx as i64;
            if px < 0 || px >= frame.width() as i64 {
                continue;
            }
            let c = tile.get_pixel(dx % side, dy % side);
            frame.put_pixel(px as u32, py as u32, *c);
        }
    }
}

fn draw_selection(frame: &mut RgbaImage, selection: &Selection, x0: i64, y0: i64, dst: &RgbaImage) {
    let (mut sx0, mut sx1) = if selection.press_x < selection.current_x {
        (selection.press_x, selection.current_x)
    } else {
        (selection.current_x, selection.press_x)
    };
    let (mut sy0, mut sy1) = if selection.press_y < selection.current_y {
        (selection.press_y, selection.current_y)
    } else {
        (selection.current_y, selection.press_y)
    };

    // Clamp to the blit rectangle.
    sx0 = sx0.max(x0 as f64);
    sy0 = sy0.max(y0 as f64);
    sx1 = sx1.min((x0 + dst.width() as i64) as f64);
    sy1 = sy1.min((y0 + dst.height() as i64) as f64);

    let rx0 = sx0 as i64;
    let ry0 = sy0 as i64;
    let rx1 = sx1 as i64;
    let ry1 = sy1 as i64;
    if rx1 <= rx0 || ry1 <= ry0 {
        return;
    }

    if rx1 - rx0 >= 2 && ry1 - ry0 >= 2 {
        for py in ry0..ry1 {
            for px in rx0..rx1 {
                if px < 0 || py < 0 || px >= frame.width() as i64 || py >= frame.height() as i64 {
                    continue;
                }
                let p = frame.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    p.0[c] = blend_channel(SELECTION_FILL.0[c], p.0[c], SELECTION_ALPHA);
                }
            }
        }
    }

    for py in ry0..ry1 {
        for px in rx0..rx1 {
            if px != rx0 && px != rx1 - 1 && py != ry0 && py != ry1 - 1 {
                continue;
            }
            if px < 0 || py < 0 || px >= frame.width() as i64 || py >= frame.height() as i64 {
                continue;
            }
            frame.put_pixel(px as u32, py as u32, SELECTION_OUTLINE);
        }
    }
}

fn placeholder_icon(size: u32) -> RgbaImage {
    let s = size as f64;
    RgbaImage::from_fn(size, size, |px, py| {
        let x = px as f64 + 0.5;
        let y = py as f64 + 0.5;
        let in_body = x >= 0.08 * s && x < 0.92 * s && y >= 0.30 * s && y < 0.85 * s;
        let in_hump = x >= 0.34 * s && x < 0.58 * s && y >= 0.20 * s && y < 0.30 * s;
        let dx = x - 0.50 * s;
        let dy = y - 0.575 * s;
        let in_lens_hole = dx * dx + dy * dy < (0.12 * s) * (0.12 * s);
        if (in_body || in_hump) && !in_lens_hole {
            PLACEHOLDER_GRAY
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Assemble the frame: background, optional checkerboard, the blit,
/// the box-zoom overlay; a faint camera glyph when nothing to show.
pub fn compose(params: &FrameParams) -> RgbaImage {
    let mut frame = RgbaImage::from_pixel(params.alloc_width, params.alloc_height, params.background);

    match params.dst {
        Some(dst) => {
            let x0 = ((params.alloc_width as i64 - dst.width() as i64) / 2).max(0);
            let y0 = ((params.alloc_height as i64 - dst.height() as i64) / 2).max(0);

            if params.src_has_alpha {
                draw_checkerboard(&mut frame, x0, y0, dst.width(), dst.height());
            }
            imageops::overlay(&mut frame, dst, x0, y0);

            if let Some(selection) = &params.selection {
                draw_selection(&mut frame, selection, x0, y0, dst);
            }
        }
        None => {
            let size = (params.alloc_width.min(params.alloc_height) as f64 * PLACEHOLDER_FRACTION)
                as u32;
            if size > 0 {
                let icon = placeholder_icon(size);
                let x0 = (params.alloc_width as i64 - size as i64) / 2;
                let y0 = (params.alloc_height as i64 - size as i64) / 2;
                imageops::overlay(&mut frame, &icon, x0, y0);
            }
        }
    }
    frame
}
