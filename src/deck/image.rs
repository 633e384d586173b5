//! Image helpers shared by the asset manager and the renderer.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage, imageops};

use crate::error::{DpError, Result};

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Parse a `rrggbb` or `#rrggbb` colour.
pub fn parse_color(value: &str) -> Result<Rgb<u8>> {
    let digits = value.trim().trim_start_matches('#');
    let bytes = hex::decode(digits).map_err(|_| DpError::InvalidColor(value.to_string()))?;
    match bytes.as_slice() {
        [r, g, b] => Ok(Rgb([*r, *g, *b])),
        _ => Err(DpError::InvalidColor(value.to_string())),
    }
}

/// Load an image file from disk.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    if !path.exists() {
        return Err(DpError::ImageNotFound {
            path: path.display().to_string(),
        });
    }
    image::open(path).map_err(|e| DpError::ImageProcessing(format!("{}: {e}", path.display())))
}

/// Scale `icon` to fit inside `width` x `height` keeping its aspect ratio,
/// then alpha-blend it centred on the area whose top-left corner is `(x, y)`.
pub fn overlay_fit(canvas: &mut RgbImage, icon: &DynamicImage, x: u32, y: u32, width: u32, height: u32) {
    if width == 0 || height == 0 || icon.width() == 0 || icon.height() == 0 {
        return;
    }
    let scaled = icon
        .resize(width, height, imageops::FilterType::Lanczos3)
        .to_rgba8();
    let (sw, sh) = scaled.dimensions();
    let ox = x + (width - sw.min(width)) / 2;
    let oy = y + (height - sh.min(height)) / 2;

    for (px, py, pixel) in scaled.enumerate_pixels() {
        let (cx, cy) = (ox + px, oy + py);
        if cx >= canvas.width() || cy >= canvas.height() {
            continue;
        }
        let [r, g, b, a] = pixel.0;
        blend(canvas.get_pixel_mut(cx, cy), Rgb([r, g, b]), a);
    }
}

/// Blend `color` over `dst` with coverage `alpha`.
pub fn blend(dst: &mut Rgb<u8>, color: Rgb<u8>, alpha: u8) {
    let a = u16::from(alpha);
    for (d, s) in dst.0.iter_mut().zip(color.0) {
        let mixed = (u16::from(s) * a + u16::from(*d) * (255 - a)) / 255;
        *d = u8::try_from(mixed).unwrap_or(u8::MAX);
    }
}
