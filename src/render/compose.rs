use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageResult, Rgba, RgbaImage};

/// Loads an image scaled to `height` pixels, keeping its aspect ratio.
/// A missing file is not an error.
pub fn load_scaled(path: &Path, height: u32) -> ImageResult<Option<RgbaImage>> {
    if !path.exists() {
        return Ok(None);
    }

    let img = image::open(path)?.to_rgba8();
    let width = (height as f64 * img.width() as f64 / img.height().max(1) as f64) as u32;

    Ok(Some(imageops::resize(
        &img,
        width.max(1),
        height,
        FilterType::Lanczos3,
    )))
}

/// Loads a white-on-transparent icon as black-on-transparent, `size` pixels square.
pub fn load_icon(path: &Path, size: u32) -> ImageResult<Option<RgbaImage>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut icon = image::open(path)?.to_rgba8();
    invert_rgb(&mut icon);

    Ok(Some(imageops::resize(&icon, size, size, FilterType::Lanczos3)))
}

pub fn invert_rgb(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}

/// Blends `src` onto `dst` with its top-left corner at (`x`, `y`). Source
/// alpha is scaled by `opacity`; pixels outside `dst` are clipped.
pub fn composite(dst: &mut GrayImage, src: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let (width, height) = (dst.width() as i64, dst.height() as i64);

    for (sx, sy, px) in src.enumerate_pixels() {
        let (dx, dy) = (x + sx as i64, y + sy as i64);
        if dx < 0 || dy < 0 || dx >= width || dy >= height {
            continue;
        }

        let alpha = px[3] as f32 / 255.0 * opacity;
        if alpha <= 0.0 {
            continue;
        }

        let under = dst.get_pixel_mut(dx as u32, dy as u32);
        let blended = luma(px) * alpha + under[0] as f32 * (1.0 - alpha);
        under[0] = blended.round().clamp(0.0, 255.0) as u8;
    }
}

fn luma(px: &Rgba<u8>) -> f32 {
    (px[0] as f32 * 299.0 + px[1] as f32 * 587.0 + px[2] as f32 * 114.0) / 1000.0
}
