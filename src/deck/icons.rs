//! Built-in icons, drawn procedurally so the binary ships no image files.

use image::{DynamicImage, Rgba, RgbaImage};

const SIZE: u32 = 72;

const IDLE: Rgba<u8> = Rgba([70, 70, 80, 255]);
const ACTIVE: Rgba<u8> = Rgba([0, 140, 255, 255]);
const ACCENT: Rgba<u8> = Rgba([230, 230, 230, 255]);
const PANEL: Rgba<u8> = Rgba([230, 170, 40, 255]);

/// Names of every built-in icon.
pub const BUILTIN_ICONS: &[&str] = &[
    "empty",
    "default",
    "default_pressed",
    "button_default",
    "default_panel",
    "default_panel_pressed",
    "parent",
    "parent_pressed",
    "next_page",
    "next_page_pressed",
    "previous_page",
    "previous_page_pressed",
];

#[derive(Clone, Copy)]
enum Arrow {
    Up,
    Left,
    Right,
}

/// Draw a built-in icon by name.
pub fn builtin(name: &str) -> Option<DynamicImage> {
    let pressed = name.ends_with("_pressed");
    let frame = if pressed { ACTIVE } else { IDLE };
    let mut img = RgbaImage::new(SIZE, SIZE);

    match name.trim_end_matches("_pressed") {
        "empty" => {}
        "default" | "button_default" => rounded_square(&mut img, frame),
        "default_panel" => folder(&mut img, if pressed { ACTIVE } else { PANEL }),
        "parent" => {
            rounded_square(&mut img, frame);
            arrow(&mut img, Arrow::Up);
        }
        "next_page" => {
            rounded_square(&mut img, frame);
            arrow(&mut img, Arrow::Right);
        }
        "previous_page" => {
            rounded_square(&mut img, frame);
            arrow(&mut img, Arrow::Left);
        }
        _ => return None,
    }
    Some(DynamicImage::ImageRgba8(img))
}

fn rounded_square(img: &mut RgbaImage, color: Rgba<u8>) {
    let (lo, hi, r) = (6_i32, 65_i32, 10_i32);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (x, y) = (x as i32, y as i32);
        if x < lo || x > hi || y < lo || y > hi {
            continue;
        }
        let cx = x.clamp(lo + r, hi - r);
        let cy = y.clamp(lo + r, hi - r);
        if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
            *px = color;
        }
    }
}

fn folder(img: &mut RgbaImage, color: Rgba<u8>) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        let tab = (10..=32).contains(&x) && (14..22).contains(&y);
        let body = (10..=62).contains(&x) && (20..=58).contains(&y);
        if tab || body {
            *px = color;
        }
    }
}

fn arrow(img: &mut RgbaImage, direction: Arrow) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        // Work in a frame where the arrow points up.
        let (u, v) = match direction {
            Arrow::Up => (x as i32, y as i32),
            Arrow::Right => (y as i32, SIZE as i32 - 1 - x as i32),
            Arrow::Left => (SIZE as i32 - 1 - y as i32, x as i32),
        };
        let head = (20..=38).contains(&v) && (u - 36).abs() <= (v - 20);
        let shaft = (38..=54).contains(&v) && (u - 36).abs() <= 5;
        if head || shaft {
            *px = ACCENT;
        }
    }
}
