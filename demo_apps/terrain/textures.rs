//! Procedural textures for the terrain demo.
//!
//! Everything is tileable value noise, so the demo ships without image
//! assets and the same seed always yields the same island.

use image::{Rgba, RgbaImage};

fn hash(x: i32, y: i32, seed: u32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x27d4_eb2d)
        ^ (y as u32).wrapping_mul(0x1656_67b1)
        ^ seed.wrapping_mul(0x9e37_79b9);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    h ^= h >> 12;
    h = h.wrapping_mul(0x297a_2d39);
    h ^= h >> 15;
    h as f32 / u32::MAX as f32
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Value noise on a lattice that wraps every `period` cells.
fn value_noise(x: f32, y: f32, period: i32, seed: u32) -> f32 {
    let (x0, y0) = (x.floor(), y.floor());
    let (ix, iy) = (x0 as i32, y0 as i32);
    let corner = |dx: i32, dy: i32| {
        hash(
            (ix + dx).rem_euclid(period),
            (iy + dy).rem_euclid(period),
            seed,
        )
    };
    let (sx, sy) = (smooth(x - x0), smooth(y - y0));
    lerp(
        lerp(corner(0, 0), corner(1, 0), sx),
        lerp(corner(0, 1), corner(1, 1), sx),
        sy,
    )
}

/// Fractal sum of `octaves` noise layers over the unit square, in `0..1`.
pub fn fbm(u: f32, v: f32, octaves: u32, base_period: i32, seed: u32) -> f32 {
    let mut sum = 0.0;
    let mut amplitude = 0.5;
    let mut norm = 0.0;
    for octave in 0..octaves {
        let period = base_period << octave;
        let p = period as f32;
        sum += amplitude * value_noise(u * p, v * p, period, seed.wrapping_add(octave));
        norm += amplitude;
        amplitude *= 0.5;
    }
    sum / norm
}

fn grey(value: f32) -> Rgba<u8> {
    let v = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([v, v, v, 255])
}

/// Island heightmap: noise that falls away toward the edges so the terrain
/// sinks below the water line at the borders.
pub fn heightmap(size: u32) -> RgbaImage {
    let scale = size as f32;
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = (x as f32 / scale, y as f32 / scale);
        let ridge = fbm(u, v, 7, 4, 11);
        let distance = ((u - 0.5).powi(2) + (v - 0.5).powi(2)).sqrt() * 2.0;
        let falloff = (1.0 - distance * distance).max(0.0);
        grey((ridge * 1.4 - 0.2) * falloff)
    })
}

/// Two independent noise fields in red and blue for the water ripples.
pub fn water_noise(size: u32) -> RgbaImage {
    let scale = size as f32;
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = (x as f32 / scale, y as f32 / scale);
        let r = fbm(u, v, 5, 8, 3);
        let b = fbm(u, v, 5, 8, 5);
        Rgba([
            (r * 255.0) as u8,
            128,
            (b * 255.0) as u8,
            255,
        ])
    })
}

/// Slightly blue-tinted speckle for the snow caps.
pub fn snow(size: u32) -> RgbaImage {
    let scale = size as f32;
    RgbaImage::from_fn(size, size, |x, y| {
        let n = fbm(x as f32 / scale, y as f32 / scale, 4, 16, 23);
        let base = 0.8 + 0.2 * n;
        Rgba([
            (base * 245.0) as u8,
            (base * 250.0) as u8,
            (base * 255.0) as u8,
            255,
        ])
    })
}
