//! Text rasterization with fontdue.

use fontdue::Font;
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use image::{Rgb, RgbImage};

use super::image::blend;

/// Where a run of text is placed on the key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// Centred in both directions.
    Center,
    /// Horizontally centred, bottom edge `margin` pixels above the key bottom.
    Bottom { margin: f32 },
}

struct Glyph {
    x: f32,
    y: f32,
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

fn layout(font: &Font, text: &str, px: f32) -> Vec<Glyph> {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings::default());
    layout.append(&[font], &TextStyle::new(text, px.max(1.0), 0));
    layout
        .glyphs()
        .iter()
        .filter(|g| g.width > 0 && g.height > 0)
        .map(|g| {
            let (_, coverage) = font.rasterize_config(g.key);
            Glyph {
                x: g.x,
                y: g.y,
                width: g.width,
                height: g.height,
                coverage,
            }
        })
        .collect()
}

/// Pixel bounds `(min_x, min_y, max_x, max_y)` of laid out glyphs.
fn bounds(glyphs: &[Glyph]) -> Option<(f32, f32, f32, f32)> {
    glyphs.iter().fold(None, |acc, g| {
        let (x0, y0, x1, y1) = (g.x, g.y, g.x + g.width as f32, g.y + g.height as f32);
        Some(match acc {
            None => (x0, y0, x1, y1),
            Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
        })
    })
}

/// Draw `text` onto `canvas`. Returns false when nothing was drawn.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn draw_text(
    canvas: &mut RgbImage,
    font: &Font,
    text: &str,
    px: f32,
    color: Rgb<u8>,
    anchor: Anchor,
) -> bool {
    let glyphs = layout(font, text, px);
    let Some((min_x, min_y, max_x, max_y)) = bounds(&glyphs) else {
        return false;
    };
    let (cw, ch) = (canvas.width() as f32, canvas.height() as f32);
    let dx = (cw - (max_x - min_x)) / 2.0 - min_x;
    let dy = match anchor {
        Anchor::Center => (ch - (max_y - min_y)) / 2.0 - min_y,
        Anchor::Bottom { margin } => ch - margin - max_y,
    };

    for glyph in &glyphs {
        let gx = (glyph.x + dx).round() as i64;
        let gy = (glyph.y + dy).round() as i64;
        for row in 0..glyph.height {
            for col in 0..glyph.width {
                let alpha = glyph.coverage[row * glyph.width + col];
                let (x, y) = (gx + col as i64, gy + row as i64);
                if alpha == 0 || x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
                    continue;
                }
                blend(canvas.get_pixel_mut(x as u32, y as u32), color, alpha);
            }
        }
    }
    true
}
