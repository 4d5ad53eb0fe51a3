//! Procedurally drawn microphone icon, shared by the tray and dialog windows.

use eframe::egui;
use image::{Rgba, RgbaImage};

const LIVE_BG: [u8; 3] = [0x2e, 0x9e, 0x5b];
const MUTED_BG: [u8; 3] = [0xd6, 0x33, 0x33];
const GLYPH: [u8; 3] = [0xff, 0xff, 0xff];

/// Supersampling factor per axis.
const SAMPLES: u32 = 4;

fn dist_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

fn in_disc(u: f32, v: f32) -> bool {
    (u - 0.5).powi(2) + (v - 0.5).powi(2) <= 0.48 * 0.48
}

/// Microphone glyph in unit coordinates: capsule, cradle, stem, base.
fn in_microphone(u: f32, v: f32) -> bool {
    let capsule = dist_to_segment((u, v), (0.5, 0.30), (0.5, 0.45)) <= 0.10;
    let r = ((u - 0.5).powi(2) + (v - 0.45).powi(2)).sqrt();
    let cradle = v >= 0.45 && (0.155..=0.20).contains(&r);
    let stem = (u - 0.5).abs() <= 0.025 && (0.62..=0.74).contains(&v);
    let base = (u - 0.5).abs() <= 0.12 && (0.72..=0.77).contains(&v);
    capsule || cradle || stem || base
}

/// Whether a sample is glyph-coloured. The mute slash cuts a background gap
/// through the microphone so it stays visible at tray sizes.
fn in_glyph(u: f32, v: f32, muted: bool) -> bool {
    if muted {
        let d = dist_to_segment((u, v), (0.24, 0.24), (0.76, 0.76));
        if d <= 0.04 {
            return true;
        }
        if d <= 0.075 {
            return false;
        }
    }
    in_microphone(u, v)
}

/// Render the icon at `size` x `size` pixels.
pub fn render(muted: bool, size: u32) -> RgbaImage {
    let bg = if muted { MUTED_BG } else { LIVE_BG };
    let total = SAMPLES * SAMPLES;
    RgbaImage::from_fn(size, size, |x, y| {
        let mut disc_hits = 0;
        let mut glyph_hits = 0;
        for sy in 0..SAMPLES {
            for sx in 0..SAMPLES {
                let u = (x as f32 + (sx as f32 + 0.5) / SAMPLES as f32) / size as f32;
                let v = (y as f32 + (sy as f32 + 0.5) / SAMPLES as f32) / size as f32;
                if in_disc(u, v) {
                    disc_hits += 1;
                    if in_glyph(u, v, muted) {
                        glyph_hits += 1;
                    }
                }
            }
        }
        if disc_hits == 0 {
            return Rgba([0, 0, 0, 0]);
        }
        let g = glyph_hits as f32 / disc_hits as f32;
        let mix = |a: u8, b: u8| (a as f32 * (1.0 - g) + b as f32 * g).round() as u8;
        Rgba([
            mix(bg[0], GLYPH[0]),
            mix(bg[1], GLYPH[1]),
            mix(bg[2], GLYPH[2]),
            (255 * disc_hits / total) as u8,
        ])
    })
}

/// Window icon for `ViewportBuilder::with_icon`.
pub fn app_icon() -> egui::IconData {
    let img = render(false, 64);
    let (w, h) = img.dimensions();
    egui::IconData {
        rgba: img.into_raw(),
        width: w,
        height: h,
    }
}
