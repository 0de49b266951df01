//! Procedural triangle soups, three floats per vertex.

/// `n x n` quads on the unit square of the XZ plane at `y = 0`.
///
/// Returns `n * n * 6 * 3` floats. Each quad is split into the triangles
/// `(x, y) (x, y+1) (x+1, y+1)` and `(x, y) (x+1, y+1) (x+1, y)`, with all
/// coordinates divided by `n`.
#[must_use]
pub fn grid(n: u32) -> Vec<f32> {
    let size = n as usize;
    let mut buffer = Vec::with_capacity(size * size * 6 * 3);
    let step = |i: u32| i as f32 / n as f32;

    for y in 0..n {
        for x in 0..n {
            let (x0, x1) = (step(x), step(x + 1));
            let (z0, z1) = (step(y), step(y + 1));
            buffer.extend_from_slice(&[
                x0, 0.0, z0, //
                x0, 0.0, z1, //
                x1, 0.0, z1, //
                x0, 0.0, z0, //
                x1, 0.0, z1, //
                x1, 0.0, z0,
            ]);
        }
    }
    buffer
}

/// Skybox cube spanning `[-1, 1]` on every axis, 36 vertices.
#[must_use]
#[rustfmt::skip]
pub fn cube() -> Vec<f32> {
    vec![
        // back
        1.0, 1.0, 1.0,  1.0, -1.0, 1.0,  -1.0, -1.0, 1.0,
        1.0, 1.0, 1.0,  -1.0, -1.0, 1.0,  -1.0, 1.0, 1.0,
        // front
        -1.0, 1.0, -1.0,  -1.0, -1.0, -1.0,  1.0, 1.0, -1.0,
        1.0, 1.0, -1.0,  -1.0, -1.0, -1.0,  1.0, -1.0, -1.0,
        // left
        -1.0, 1.0, 1.0,  -1.0, -1.0, -1.0,  -1.0, 1.0, -1.0,
        -1.0, 1.0, 1.0,  -1.0, -1.0, 1.0,  -1.0, -1.0, -1.0,
        // right
        1.0, 1.0, 1.0,  1.0, 1.0, -1.0,  1.0, -1.0, -1.0,
        1.0, 1.0, 1.0,  1.0, -1.0, -1.0,  1.0, -1.0, 1.0,
        // top
        1.0, 1.0, 1.0,  -1.0, 1.0, 1.0,  -1.0, 1.0, -1.0,
        1.0, 1.0, -1.0,  1.0, 1.0, 1.0,  -1.0, 1.0, -1.0,
        // bottom
        -1.0, -1.0, -1.0,  -1.0, -1.0, 1.0,  1.0, -1.0, 1.0,
        -1.0, -1.0, -1.0,  1.0, -1.0, 1.0,  1.0, -1.0, -1.0,
    ]
}

/// Two triangles covering clip space at `z = 0`.
#[must_use]
pub fn screen_quad() -> Vec<f32> {
    vec![
        -1.0, 1.0, 0.0, //
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0, //
        -1.0, 1.0, 0.0, //
        1.0, -1.0, 0.0, //
        1.0, 1.0, 0.0,
    ]
}
