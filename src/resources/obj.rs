//! Minimal Wavefront OBJ reader.
//!
//! Supports `v`, `vt`, `vn` and `f`. Faces with more than three corners are
//! fanned into triangles around their first corner. Indices are 1-based; a
//! negative index counts back from the most recently defined element, so
//! `-1` is the last one. Blank lines, `#` comments and every other keyword
//! are skipped.

use crate::errors::{ArborError, Result};

/// Flat per-attribute arrays, already expanded to one entry per triangle corner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjMesh {
    /// Three floats per corner.
    pub position: Vec<f32>,
    /// Two floats per corner, only for corners that name a texcoord.
    pub texcoord: Vec<f32>,
    /// Three floats per corner, only for corners that name a normal.
    pub normal: Vec<f32>,
}

impl ObjMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.position.len() / 3
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }
}

struct Lists {
    positions: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
}

pub fn parse_obj(text: &str) -> Result<ObjMesh> {
    let mut lists = Lists {
        positions: Vec::new(),
        texcoords: Vec::new(),
        normals: Vec::new(),
    };
    let mut mesh = ObjMesh::default();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => lists.positions.push(floats::<3>(&args, line_no)?),
            "vn" => lists.normals.push(floats::<3>(&args, line_no)?),
            "vt" => lists.texcoords.push(floats::<2>(&args, line_no)?),
            "f" => {
                if args.len() < 3 {
                    return Err(obj_error(line_no, "face needs at least three corners"));
                }
                for tri in 0..args.len() - 2 {
                    for corner in [args[0], args[tri + 1], args[tri + 2]] {
                        add_corner(&lists, &mut mesh, corner, line_no)?;
                    }
                }
            }
            _ => log::trace!("OBJ line {line_no}: skipping '{keyword}'"),
        }
    }

    Ok(mesh)
}

fn add_corner(lists: &Lists, mesh: &mut ObjMesh, corner: &str, line: usize) -> Result<()> {
    for (slot, field) in corner.split('/').enumerate() {
        if field.is_empty() {
            continue;
        }
        let raw: i64 = field
            .parse()
            .map_err(|_| obj_error(line, format!("bad index '{field}'")))?;
        match slot {
            0 => mesh
                .position
                .extend_from_slice(&lists.positions[resolve(raw, lists.positions.len(), line)?]),
            1 => mesh
                .texcoord
                .extend_from_slice(&lists.texcoords[resolve(raw, lists.texcoords.len(), line)?]),
            2 => mesh
                .normal
                .extend_from_slice(&lists.normals[resolve(raw, lists.normals.len(), line)?]),
            _ => return Err(obj_error(line, format!("too many fields in '{corner}'"))),
        }
    }
    Ok(())
}

/// 1-based or negative OBJ index into a zero-based list of `len` elements.
fn resolve(raw: i64, len: usize, line: usize) -> Result<usize> {
    let len_i = len as i64;
    let index = if raw > 0 { raw - 1 } else { len_i + raw };
    if raw == 0 || index < 0 || index >= len_i {
        return Err(obj_error(line, format!("index {raw} out of range ({len} defined)")));
    }
    Ok(index as usize)
}

fn floats<const N: usize>(args: &[&str], line: usize) -> Result<[f32; N]> {
    if args.len() < N {
        return Err(obj_error(line, format!("expected {N} numbers, got {}", args.len())));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg
            .parse()
            .map_err(|_| obj_error(line, format!("bad number '{arg}'")))?;
    }
    Ok(out)
}

fn obj_error(line: usize, message: impl Into<String>) -> ArborError {
    ArborError::ObjParse {
        line,
        message: message.into(),
    }
}
